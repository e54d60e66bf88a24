use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A registered account. `password_hash` is absent for accounts created
/// through an external identity provider.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub created: DateTime<Utc>,
}

/// A domain claimed by a user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Site {
    pub id: i64,
    pub domain: String,
    pub owner_id: i64,
    pub created: DateTime<Utc>,
}

/// A commentable page, identified by its URL.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct Item {
    pub id: i64,
    pub url: String,
    pub title: Option<String>,
    pub site_id: Option<i64>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub text: String,
    pub reply_to_id: Option<i64>,
    pub created: DateTime<Utc>,
}

/// A comment joined with its author's username, as loaded for thread
/// assembly.
#[derive(Debug, Clone, FromRow, PartialEq)]
pub struct CommentRecord {
    pub id: i64,
    pub item_id: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub reply_to_id: Option<i64>,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub item_id: i64,
    pub user_id: i64,
    pub text: String,
    pub reply_to_id: Option<i64>,
}

// --- Views ---

/// Public representation of an `Item`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ItemView {
    pub id: i64,
    pub title: Option<String>,
    pub url: String,
    pub created: DateTime<Utc>,
    /// Id of the owner of the site the item belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<i64>,
}

impl ItemView {
    pub fn new(item: &Item, owner: Option<i64>) -> Self {
        Self {
            id: item.id,
            title: item.title.clone(),
            url: item.url.clone(),
            created: item.created,
            owner,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentView {
    pub id: i64,
    pub item: i64,
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replies: Vec<CommentView>,
}

impl CommentView {
    pub fn from_record(record: &CommentRecord) -> Self {
        Self {
            id: record.id,
            item: record.item_id,
            user_id: record.user_id,
            username: record.username.clone(),
            text: record.text.clone(),
            created: record.created,
            reply_to: record.reply_to_id,
            replies: Vec::new(),
        }
    }

    pub fn from_comment(comment: &Comment, author: &User) -> Self {
        Self {
            id: comment.id,
            item: comment.item_id,
            user_id: author.id,
            username: author.username.clone(),
            text: comment.text.clone(),
            created: comment.created,
            reply_to: comment.reply_to_id,
            replies: Vec::new(),
        }
    }
}

/// Everything a client needs to render the discussion of one item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommentContext {
    pub item: ItemView,
    pub comments: Vec<CommentView>,
    pub comment_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logged_in_as: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub has_password: bool,
}

impl From<&User> for UserView {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            has_password: user.password_hash.is_some(),
        }
    }
}
