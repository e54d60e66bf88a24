use crate::notification::interface::{CommentNotification, Notifier};

/// Writes notifications to the log instead of delivering them.
pub struct LogNotifier;

#[async_trait::async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: &CommentNotification) -> Result<(), anyhow::Error> {
        ::log::info!(
            "notification from {} to {}: {}\n{}",
            notification.from_addr,
            notification.to_addr,
            notification.subject,
            notification.body
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}
