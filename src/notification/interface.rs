use ::anyhow::Result;
use serde::Serialize;

/// One message telling a user about a new comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentNotification {
    pub from_addr: String,
    pub to_addr: String,
    pub subject: String,
    pub body: String,
}

#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &CommentNotification) -> Result<()>;
    fn name(&self) -> &str;
}
