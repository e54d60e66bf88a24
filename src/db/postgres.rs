use async_trait::async_trait;
use sqlx::PgPool;

use super::{Store, StoreError, StoreResult};
use crate::models::*;

/// Postgres implementation of `Store`.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

/// Turns unique violations into `StoreError::Conflict` and everything else
/// into `StoreError::Other`.
fn classify(entity: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(entity.to_string());
        }
    }
    StoreError::Other(err.into())
}

fn other(err: sqlx::Error) -> StoreError {
    StoreError::Other(err.into())
}

const USER_COLUMNS: &str = "id, username, email, password_hash, created";
const SITE_COLUMNS: &str = "id, domain, owner_id, created";
const ITEM_COLUMNS: &str = "id, url, title, site_id, created";
const COMMENT_COLUMNS: &str = "id, item_id, user_id, text, reply_to_id, created";

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(other)?;
        Ok(())
    }

    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let query = format!(
            "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING {}",
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&query)
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| classify("user", err))
    }

    async fn get_user(&self, id: i64) -> StoreResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE username = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let query = format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS);

        sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)
    }

    async fn update_user_profile(
        &self,
        id: i64,
        username: &str,
        email: &str,
    ) -> StoreResult<User> {
        let query = format!(
            "UPDATE users SET username = $2, email = $3 WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(username)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| classify("user", err))?;

        user.ok_or_else(|| StoreError::Other(anyhow::anyhow!("user {} does not exist", id)))
    }

    async fn set_user_password(&self, id: i64, password_hash: &str) -> StoreResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id)
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(other)?;

        Ok(())
    }

    async fn insert_site(&self, owner_id: i64, domain: &str) -> StoreResult<Site> {
        let query = format!(
            "INSERT INTO sites (domain, owner_id) VALUES ($1, $2) RETURNING {}",
            SITE_COLUMNS
        );

        sqlx::query_as::<_, Site>(&query)
            .bind(domain)
            .bind(owner_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| classify("site", err))
    }

    async fn get_site(&self, id: i64) -> StoreResult<Option<Site>> {
        let query = format!("SELECT {} FROM sites WHERE id = $1", SITE_COLUMNS);

        sqlx::query_as::<_, Site>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)
    }

    async fn find_sites_by_domains(&self, domains: &[String]) -> StoreResult<Vec<Site>> {
        if domains.is_empty() {
            return Ok(Vec::new());
        }

        let query = format!("SELECT {} FROM sites WHERE domain = ANY($1)", SITE_COLUMNS);

        sqlx::query_as::<_, Site>(&query)
            .bind(domains)
            .fetch_all(&self.pool)
            .await
            .map_err(other)
    }

    async fn list_sites_for_owner(&self, owner_id: i64) -> StoreResult<Vec<Site>> {
        let query = format!(
            "SELECT {} FROM sites WHERE owner_id = $1 ORDER BY created DESC, id DESC",
            SITE_COLUMNS
        );

        sqlx::query_as::<_, Site>(&query)
            .bind(owner_id)
            .fetch_all(&self.pool)
            .await
            .map_err(other)
    }

    async fn get_item(&self, id: i64) -> StoreResult<Option<Item>> {
        let query = format!("SELECT {} FROM items WHERE id = $1", ITEM_COLUMNS);

        sqlx::query_as::<_, Item>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)
    }

    async fn get_item_by_url(&self, url: &str) -> StoreResult<Option<Item>> {
        let query = format!("SELECT {} FROM items WHERE url = $1", ITEM_COLUMNS);

        sqlx::query_as::<_, Item>(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)
    }

    async fn list_items(&self, offset: i64, limit: i64) -> StoreResult<Vec<Item>> {
        let query = format!(
            "SELECT {} FROM items ORDER BY created DESC, id DESC LIMIT $1 OFFSET $2",
            ITEM_COLUMNS
        );

        sqlx::query_as::<_, Item>(&query)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await
            .map_err(other)
    }

    async fn insert_item(
        &self,
        url: &str,
        title: Option<&str>,
        site_id: Option<i64>,
    ) -> StoreResult<Item> {
        let query = format!(
            "INSERT INTO items (url, title, site_id) VALUES ($1, $2, $3) RETURNING {}",
            ITEM_COLUMNS
        );

        sqlx::query_as::<_, Item>(&query)
            .bind(url)
            .bind(title)
            .bind(site_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| classify("item", err))
    }

    async fn list_unclaimed_items_containing(&self, fragment: &str) -> StoreResult<Vec<Item>> {
        let pattern = format!(
            "%{}%",
            fragment
                .replace('\\', "\\\\")
                .replace('%', "\\%")
                .replace('_', "\\_")
        );
        let query = format!(
            "SELECT {} FROM items WHERE site_id IS NULL AND url ILIKE $1 ORDER BY id",
            ITEM_COLUMNS
        );

        sqlx::query_as::<_, Item>(&query)
            .bind(pattern)
            .fetch_all(&self.pool)
            .await
            .map_err(other)
    }

    async fn claim_items(&self, item_ids: &[i64], site_id: i64) -> StoreResult<u64> {
        if item_ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            "UPDATE items SET site_id = $2 WHERE id = ANY($1) AND site_id IS NULL",
        )
        .bind(item_ids)
        .bind(site_id)
        .execute(&self.pool)
        .await
        .map_err(other)?;

        Ok(result.rows_affected())
    }

    async fn insert_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let query = format!(
            "INSERT INTO comments (item_id, user_id, text, reply_to_id) \
             VALUES ($1, $2, $3, $4) RETURNING {}",
            COMMENT_COLUMNS
        );

        sqlx::query_as::<_, Comment>(&query)
            .bind(comment.item_id)
            .bind(comment.user_id)
            .bind(&comment.text)
            .bind(comment.reply_to_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| classify("comment", err))
    }

    async fn get_comment(&self, id: i64) -> StoreResult<Option<Comment>> {
        let query = format!("SELECT {} FROM comments WHERE id = $1", COMMENT_COLUMNS);

        sqlx::query_as::<_, Comment>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(other)
    }

    async fn list_comments_for_item(&self, item_id: i64) -> StoreResult<Vec<CommentRecord>> {
        sqlx::query_as::<_, CommentRecord>(
            r#"
            SELECT c.id, c.item_id, c.user_id, u.username, c.text, c.reply_to_id, c.created
            FROM comments c
            JOIN users u ON u.id = c.user_id
            WHERE c.item_id = $1
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await
        .map_err(other)
    }
}
