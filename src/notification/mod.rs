pub mod interface;
pub mod logging;
pub mod webhook;

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use ::anyhow::Result;

pub use interface::{CommentNotification, Notifier};

pub fn make_provider(config: &Config) -> Result<Arc<dyn Notifier>> {
    match config.notification_interface.as_str() {
        "log" => {
            ::log::info!("Notifications are written to the log");
            Ok(Arc::new(logging::LogNotifier))
        }
        "webhook" => {
            if let Some(url) = config.notification_webhook_url.clone() {
                ::log::info!("Notifications are posted to {}", url);
                let timeout = Duration::from_secs(config.notification_timeout_seconds);
                Ok(Arc::new(webhook::WebhookNotifier::new(url, timeout)?))
            } else {
                Err(anyhow::anyhow!(
                    "Missing notification webhook URL configuration"
                ))
            }
        }
        interface => Err(anyhow::anyhow!(
            "Unknown notification interface: {}",
            interface
        )),
    }
}

/// Builds the notification telling `to_addr` that `commenter` wrote `text`
/// on the page at `item_url`.
pub fn comment_notification(
    from_addr: &str,
    to_addr: &str,
    commenter: &str,
    item_title: Option<&str>,
    item_url: &str,
    text: &str,
) -> CommentNotification {
    let subject = format!(
        "{} commented on {}",
        commenter,
        item_title.unwrap_or(item_url)
    );
    let quoted: Vec<String> = text.lines().map(|line| format!("> {}", line)).collect();
    let body = format!(
        "{} wrote:\n\n{}\n\nRead the discussion at {}\n",
        commenter,
        quoted.join("\n"),
        item_url
    );

    CommentNotification {
        from_addr: from_addr.to_string(),
        to_addr: to_addr.to_string(),
        subject,
        body,
    }
}
