pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::*;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries the entity name.
    #[error("{0} violates a unique constraint")]
    Conflict(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Persistence contract for users, sites, items and comments.
#[async_trait]
pub trait Store: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;

    // Users
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn get_user(&self, id: i64) -> StoreResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn update_user_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
    ) -> StoreResult<User>;
    async fn set_user_password(&self, id: i64, password_hash: &str) -> StoreResult<()>;

    // Sites
    async fn insert_site(&self, owner_id: i64, domain: &str) -> StoreResult<Site>;
    async fn get_site(&self, id: i64) -> StoreResult<Option<Site>>;
    /// Returns every site whose domain is one of `domains`, in no particular
    /// order.
    async fn find_sites_by_domains(&self, domains: &[String]) -> StoreResult<Vec<Site>>;
    async fn list_sites_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Site>>;

    // Items
    async fn get_item(&self, id: i64) -> StoreResult<Option<Item>>;
    async fn get_item_by_url(&self, url: &str) -> StoreResult<Option<Item>>;
    /// One page of items, newest first.
    async fn list_items(&self, offset: i64, limit: i64) -> StoreResult<Vec<Item>>;
    /// Fails with `StoreError::Conflict` if an item with this URL exists.
    async fn insert_item(
        &self,
        url: &str,
        title: Option<&str>,
        site_id: Option<i64>,
    ) -> StoreResult<Item>;
    /// Items without a site whose URL contains `fragment`, case-insensitively.
    async fn list_unclaimed_items_containing(&self, fragment: &str) -> StoreResult<Vec<Item>>;
    /// Sets the site of the given items that have none yet. Returns the number
    /// of items changed.
    async fn claim_items(&self, item_ids: &[i64], site_id: i64) -> StoreResult<u64>;

    // Comments
    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn get_comment(&self, id: i64) -> StoreResult<Option<Comment>>;
    /// All comments of an item with their author names, in no particular
    /// order.
    async fn list_comments_for_item(&self, item_id: i64) -> StoreResult<Vec<CommentRecord>>;
}
