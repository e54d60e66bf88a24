use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{Store, StoreError, StoreResult};
use crate::models::*;

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: BTreeMap<i64, User>,
    sites: BTreeMap<i64, Site>,
    items: BTreeMap<i64, Item>,
    comments: BTreeMap<i64, Comment>,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process `Store` used for tests and single-node development.
///
/// Every operation takes the table lock for its whole duration, so the
/// uniqueness checks below behave like the database constraints.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .values()
            .any(|u| u.username == user.username || u.email == user.email)
        {
            return Err(StoreError::Conflict("user".to_string()));
        }

        let user = User {
            id: tables.allocate_id(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            created: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn update_user_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
    ) -> StoreResult<User> {
        let mut tables = self.tables.write().await;

        if tables
            .users
            .values()
            .any(|u| u.id != id && (u.username == username || u.email == email))
        {
            return Err(StoreError::Conflict("user".to_string()));
        }

        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| StoreError::Other(anyhow::anyhow!("user {} does not exist", id)))?;
        user.username = username.to_string();
        user.email = email.to_string();
        Ok(user.clone())
    }

    async fn set_user_password(&self, id: i64, password_hash: &str) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.get_mut(&id) {
            user.password_hash = Some(password_hash.to_string());
        }
        Ok(())
    }

    async fn insert_site(&self, owner_id: i64, domain: &str) -> StoreResult<Site> {
        let mut tables = self.tables.write().await;

        if tables.sites.values().any(|s| s.domain == domain) {
            return Err(StoreError::Conflict("site".to_string()));
        }
        if !tables.users.contains_key(&owner_id) {
            return Err(StoreError::Other(anyhow::anyhow!(
                "user {} does not exist",
                owner_id
            )));
        }

        let site = Site {
            id: tables.allocate_id(),
            domain: domain.to_string(),
            owner_id,
            created: Utc::now(),
        };
        tables.sites.insert(site.id, site.clone());
        Ok(site)
    }

    async fn get_site(&self, id: i64) -> StoreResult<Option<Site>> {
        Ok(self.tables.read().await.sites.get(&id).cloned())
    }

    async fn find_sites_by_domains(&self, domains: &[String]) -> StoreResult<Vec<Site>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sites
            .values()
            .filter(|s| domains.iter().any(|d| *d == s.domain))
            .cloned()
            .collect())
    }

    async fn list_sites_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Site>> {
        let tables = self.tables.read().await;
        let mut sites: Vec<Site> = tables
            .sites
            .values()
            .filter(|s| s.owner_id == owner_id)
            .cloned()
            .collect();
        sites.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(sites)
    }

    async fn get_item(&self, id: i64) -> StoreResult<Option<Item>> {
        Ok(self.tables.read().await.items.get(&id).cloned())
    }

    async fn get_item_by_url(&self, url: &str) -> StoreResult<Option<Item>> {
        let tables = self.tables.read().await;
        Ok(tables.items.values().find(|i| i.url == url).cloned())
    }

    async fn list_items(&self, offset: i64, limit: i64) -> StoreResult<Vec<Item>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Item> = tables.items.values().cloned().collect();
        items.sort_by(|a, b| b.created.cmp(&a.created).then(b.id.cmp(&a.id)));
        Ok(items
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn insert_item(
        &self,
        url: &str,
        title: Option<&str>,
        site_id: Option<i64>,
    ) -> StoreResult<Item> {
        let mut tables = self.tables.write().await;

        if tables.items.values().any(|i| i.url == url) {
            return Err(StoreError::Conflict("item".to_string()));
        }

        let item = Item {
            id: tables.allocate_id(),
            url: url.to_string(),
            title: title.map(|t| t.to_string()),
            site_id,
            created: Utc::now(),
        };
        tables.items.insert(item.id, item.clone());
        Ok(item)
    }

    async fn list_unclaimed_items_containing(&self, fragment: &str) -> StoreResult<Vec<Item>> {
        let needle = fragment.to_lowercase();
        let tables = self.tables.read().await;
        Ok(tables
            .items
            .values()
            .filter(|i| i.site_id.is_none() && i.url.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn claim_items(&self, item_ids: &[i64], site_id: i64) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut changed = 0;

        for id in item_ids {
            if let Some(item) = tables.items.get_mut(id) {
                if item.site_id.is_none() {
                    item.site_id = Some(site_id);
                    changed += 1;
                }
            }
        }

        Ok(changed)
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.tables.write().await;

        if !tables.items.contains_key(&comment.item_id) {
            return Err(StoreError::Other(anyhow::anyhow!(
                "item {} does not exist",
                comment.item_id
            )));
        }
        if let Some(parent_id) = comment.reply_to_id {
            // Mirrors the composite (reply_to_id, item_id) foreign key.
            match tables.comments.get(&parent_id) {
                Some(parent) if parent.item_id == comment.item_id => {}
                _ => {
                    return Err(StoreError::Other(anyhow::anyhow!(
                        "comment {} is not on item {}",
                        parent_id,
                        comment.item_id
                    )))
                }
            }
        }

        let comment = Comment {
            id: tables.allocate_id(),
            item_id: comment.item_id,
            user_id: comment.user_id,
            text: comment.text,
            reply_to_id: comment.reply_to_id,
            created: Utc::now(),
        };
        tables.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: i64) -> StoreResult<Option<Comment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn list_comments_for_item(&self, item_id: i64) -> StoreResult<Vec<CommentRecord>> {
        let tables = self.tables.read().await;
        let mut records = Vec::new();

        for comment in tables.comments.values().filter(|c| c.item_id == item_id) {
            let username = tables
                .users
                .get(&comment.user_id)
                .map(|u| u.username.clone())
                .ok_or_else(|| {
                    StoreError::Other(anyhow::anyhow!(
                        "comment {} has no author {}",
                        comment.id,
                        comment.user_id
                    ))
                })?;

            records.push(CommentRecord {
                id: comment.id,
                item_id: comment.item_id,
                user_id: comment.user_id,
                username,
                text: comment.text.clone(),
                reply_to_id: comment.reply_to_id,
                created: comment.created,
            });
        }

        Ok(records)
    }
}
