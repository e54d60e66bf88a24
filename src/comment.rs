use std::cmp::Ordering;
use std::collections::HashMap;

use crate::config::Config;
use crate::db::Store;
use crate::errors::AppError;
use crate::item::item_view;
use crate::models::{CommentContext, CommentRecord, CommentView, Item, NewComment, User};
use crate::notification::{comment_notification, Notifier};

/// Newest first, ties broken by the higher id.
fn newest_first(a: &CommentRecord, b: &CommentRecord) -> Ordering {
    b.created.cmp(&a.created).then(b.id.cmp(&a.id))
}

/// Assembles the flat comment list of one item into reply trees.
///
/// Returns the top-level comments with their replies nested below them,
/// newest first on every level. Comments that cannot be reached from a
/// top-level comment (a reply cycle, or a reply to a comment missing from
/// `records`) are returned as the error, sorted by id.
pub fn build_thread(mut records: Vec<CommentRecord>) -> Result<Vec<CommentView>, Vec<i64>> {
    records.sort_by(newest_first);

    let index: HashMap<i64, usize> = records
        .iter()
        .enumerate()
        .map(|(pos, record)| (record.id, pos))
        .collect();

    // Children keep the sort order of `records`.
    let mut roots = Vec::new();
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    for (pos, record) in records.iter().enumerate() {
        match record.reply_to_id {
            None => roots.push(pos),
            Some(parent) => {
                if let Some(&parent_pos) = index.get(&parent) {
                    children[parent_pos].push(pos);
                }
            }
        }
    }

    let mut built: Vec<Option<CommentView>> = vec![None; records.len()];
    let mut visited = vec![false; records.len()];
    let mut stack: Vec<(usize, bool)> = roots.iter().rev().map(|&pos| (pos, false)).collect();

    while let Some((pos, expanded)) = stack.pop() {
        if expanded {
            let mut view = CommentView::from_record(&records[pos]);
            view.replies = children[pos]
                .iter()
                .filter_map(|&child| built[child].take())
                .collect();
            built[pos] = Some(view);
        } else {
            if visited[pos] {
                continue;
            }
            visited[pos] = true;
            stack.push((pos, true));
            stack.extend(children[pos].iter().rev().map(|&child| (child, false)));
        }
    }

    let mut unreachable: Vec<i64> = records
        .iter()
        .zip(&visited)
        .filter(|(_, seen)| !**seen)
        .map(|(record, _)| record.id)
        .collect();
    if !unreachable.is_empty() {
        unreachable.sort_unstable();
        return Err(unreachable);
    }

    Ok(roots.iter().filter_map(|&pos| built[pos].take()).collect())
}

/// Returns everything needed to render the discussion of `item`.
///
/// `viewer` is the logged in user, if any; only their name is reported.
pub async fn get_context(
    store: &dyn Store,
    item: &Item,
    viewer: Option<&User>,
) -> Result<CommentContext, AppError> {
    let records = store.list_comments_for_item(item.id).await?;
    let comment_count = records.len();

    let comments = build_thread(records).map_err(|comment_ids| AppError::BrokenThread {
        item_id: item.id,
        comment_ids,
    })?;

    Ok(CommentContext {
        item: item_view(store, item).await?,
        comments,
        comment_count,
        logged_in_as: viewer.map(|user| user.username.clone()),
    })
}

/// Stores a comment by `author` on item `item_id` and notifies the people
/// involved.
///
/// The author of the comment being replied to and the owner of the item's
/// site each get one notification, the commenter never does. Failed
/// deliveries are logged.
pub async fn post_comment(
    store: &dyn Store,
    notifier: &dyn Notifier,
    config: &Config,
    author: &User,
    item_id: i64,
    text: &str,
    reply_to: Option<i64>,
) -> Result<CommentView, AppError> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or(AppError::NotFound("item"))?;

    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("comment must not be empty".to_string()));
    }
    if text.chars().count() > config.max_comment_length {
        return Err(AppError::Validation(format!(
            "comment must not be longer than {} characters",
            config.max_comment_length
        )));
    }

    let parent = match reply_to {
        Some(parent_id) => {
            let parent = store
                .get_comment(parent_id)
                .await?
                .ok_or(AppError::NotFound("comment"))?;
            if parent.item_id != item.id {
                return Err(AppError::InvalidReply {
                    reply_to: parent_id,
                    item_id: item.id,
                });
            }
            Some(parent)
        }
        None => None,
    };

    let comment = store
        .insert_comment(NewComment {
            item_id: item.id,
            user_id: author.id,
            text: text.to_string(),
            reply_to_id: reply_to,
        })
        .await?;

    log::info!(
        "user {} commented {} on item {}",
        author.id,
        comment.id,
        item.id
    );

    let mut recipients = Vec::new();
    if let Some(parent) = &parent {
        recipients.push(parent.user_id);
    }
    if let Some(site_id) = item.site_id {
        if let Some(site) = store.get_site(site_id).await? {
            recipients.push(site.owner_id);
        }
    }
    recipients.retain(|&id| id != author.id);
    recipients.dedup();

    for user_id in recipients {
        notify(store, notifier, config, author, &item, text, user_id).await;
    }

    Ok(CommentView::from_comment(&comment, author))
}

async fn notify(
    store: &dyn Store,
    notifier: &dyn Notifier,
    config: &Config,
    author: &User,
    item: &Item,
    text: &str,
    recipient_id: i64,
) {
    let recipient = match store.get_user(recipient_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            log::warn!("notification recipient {} does not exist", recipient_id);
            return;
        }
        Err(err) => {
            log::warn!("failed to load notification recipient {}: {}", recipient_id, err);
            return;
        }
    };

    let notification = comment_notification(
        &config.notification_addr,
        &recipient.email,
        &author.username,
        item.title.as_deref(),
        &item.url,
        text,
    );

    if let Err(err) = notifier.send(&notification).await {
        log::warn!(
            "failed to notify {} through {}: {}",
            recipient.username,
            notifier.name(),
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use chrono::{Duration, TimeZone, Utc};
    use envconfig::Envconfig;

    use super::*;
    use crate::db::MemoryStore;
    use crate::item::get_or_add_item;
    use crate::models::NewUser;
    use crate::notification::CommentNotification;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<CommentNotification>>,
    }

    #[async_trait::async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &CommentNotification) -> anyhow::Result<()> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn config() -> Config {
        Config::init_from_hashmap(&HashMap::new()).unwrap()
    }

    fn record(id: i64, reply_to: Option<i64>, minute: i64) -> CommentRecord {
        CommentRecord {
            id,
            item_id: 1,
            user_id: 1,
            username: "alice".to_string(),
            text: format!("comment {}", id),
            reply_to_id: reply_to,
            created: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                + Duration::minutes(minute),
        }
    }

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .insert_user(NewUser {
                username: name.to_string(),
                email: format!("{}@example.com", name),
                password_hash: None,
            })
            .await
            .unwrap()
    }

    #[test]
    fn test_build_thread_nests_replies() {
        let thread = build_thread(vec![
            record(3, Some(2), 2),
            record(1, None, 0),
            record(2, Some(1), 1),
        ])
        .unwrap();

        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].id, 1);
        assert_eq!(thread[0].replies.len(), 1);
        assert_eq!(thread[0].replies[0].id, 2);
        assert_eq!(thread[0].replies[0].replies[0].id, 3);
        assert!(thread[0].replies[0].replies[0].replies.is_empty());
    }

    #[test]
    fn test_build_thread_orders_newest_first() {
        let thread = build_thread(vec![
            record(1, None, 0),
            record(2, None, 5),
            record(3, Some(1), 1),
            record(4, Some(1), 3),
        ])
        .unwrap();

        let top: Vec<i64> = thread.iter().map(|c| c.id).collect();
        assert_eq!(top, vec![2, 1]);
        let replies: Vec<i64> = thread[1].replies.iter().map(|c| c.id).collect();
        assert_eq!(replies, vec![4, 3]);
    }

    #[test]
    fn test_build_thread_breaks_ties_by_id() {
        let thread = build_thread(vec![record(1, None, 0), record(2, None, 0)]).unwrap();
        let top: Vec<i64> = thread.iter().map(|c| c.id).collect();
        assert_eq!(top, vec![2, 1]);
    }

    #[test]
    fn test_build_thread_handles_deep_chains() {
        let mut records = vec![record(1, None, 0)];
        for id in 2..=1_000 {
            records.push(record(id, Some(id - 1), id));
        }

        let thread = build_thread(records).unwrap();
        let mut depth = 0;
        let mut level = &thread;
        while let Some(comment) = level.first() {
            depth += 1;
            level = &comment.replies;
        }
        assert_eq!(depth, 1_000);
    }

    #[test]
    fn test_build_thread_rejects_cycles() {
        let result = build_thread(vec![
            record(1, None, 0),
            record(2, Some(3), 1),
            record(3, Some(2), 2),
            record(4, Some(99), 3),
        ]);
        assert_eq!(result.unwrap_err(), vec![2, 3, 4]);
    }

    #[tokio::test]
    async fn test_get_context() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let config = config();
        let alice = user(&store, "alice").await;

        let item = get_or_add_item(&store, "https://example.com/post", Some("Post"))
            .await
            .unwrap();
        let a = post_comment(&store, &notifier, &config, &alice, item.id, "A", None)
            .await
            .unwrap();
        let b = post_comment(&store, &notifier, &config, &alice, item.id, "B", Some(a.id))
            .await
            .unwrap();
        let c = post_comment(&store, &notifier, &config, &alice, item.id, "C", Some(b.id))
            .await
            .unwrap();

        let context = get_context(&store, &item, None).await.unwrap();
        assert_eq!(context.comment_count, 3);
        assert_eq!(context.comments.len(), 1);
        assert_eq!(context.comments[0].id, a.id);
        assert_eq!(context.comments[0].replies[0].id, b.id);
        assert_eq!(context.comments[0].replies[0].replies[0].id, c.id);
        assert_eq!(context.comments[0].username, "alice");
        assert_eq!(context.item.title.as_deref(), Some("Post"));
        assert!(context.logged_in_as.is_none());

        let context = get_context(&store, &item, Some(&alice)).await.unwrap();
        assert_eq!(context.logged_in_as.as_deref(), Some("alice"));
    }

    #[tokio::test]
    async fn test_empty_item_context() {
        let store = MemoryStore::new();
        let item = get_or_add_item(&store, "https://example.com/", None)
            .await
            .unwrap();

        let context = get_context(&store, &item, None).await.unwrap();
        assert!(context.comments.is_empty());
        assert_eq!(context.comment_count, 0);
        assert_eq!(context.item.owner, None);
    }

    #[tokio::test]
    async fn test_reply_across_items_is_rejected() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let config = config();
        let alice = user(&store, "alice").await;

        let first = get_or_add_item(&store, "https://example.com/1", None)
            .await
            .unwrap();
        let second = get_or_add_item(&store, "https://example.com/2", None)
            .await
            .unwrap();
        let parent = post_comment(&store, &notifier, &config, &alice, first.id, "hi", None)
            .await
            .unwrap();

        let result = post_comment(
            &store,
            &notifier,
            &config,
            &alice,
            second.id,
            "stray",
            Some(parent.id),
        )
        .await;
        assert!(matches!(result, Err(AppError::InvalidReply { .. })));
        assert_eq!(get_context(&store, &second, None).await.unwrap().comment_count, 0);

        let result =
            post_comment(&store, &notifier, &config, &alice, first.id, "x", Some(999)).await;
        assert!(matches!(result, Err(AppError::NotFound("comment"))));
    }

    #[tokio::test]
    async fn test_post_comment_validation() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let mut config = config();
        config.max_comment_length = 5;
        let alice = user(&store, "alice").await;
        let item = get_or_add_item(&store, "https://example.com/", None)
            .await
            .unwrap();

        let result = post_comment(&store, &notifier, &config, &alice, item.id, "   ", None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result =
            post_comment(&store, &notifier, &config, &alice, item.id, "too long", None).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let result = post_comment(&store, &notifier, &config, &alice, 999, "hi", None).await;
        assert!(matches!(result, Err(AppError::NotFound("item"))));

        let view = post_comment(&store, &notifier, &config, &alice, item.id, " hi ", None)
            .await
            .unwrap();
        assert_eq!(view.text, "hi");
    }

    #[tokio::test]
    async fn test_notification_recipients() {
        let store = MemoryStore::new();
        let notifier = RecordingNotifier::default();
        let config = config();
        let owner = user(&store, "owner").await;
        let alice = user(&store, "alice").await;
        let bob = user(&store, "bob").await;
        store.insert_site(owner.id, "example.com").await.unwrap();

        let item = get_or_add_item(&store, "https://example.com/post", Some("Post"))
            .await
            .unwrap();

        // Owner commenting on their own site notifies nobody.
        let root = post_comment(&store, &notifier, &config, &owner, item.id, "welcome", None)
            .await
            .unwrap();
        assert!(notifier.sent.lock().unwrap().is_empty());

        // Reply to the owner: owner is both parent author and site owner.
        let reply = post_comment(
            &store,
            &notifier,
            &config,
            &alice,
            item.id,
            "thanks",
            Some(root.id),
        )
        .await
        .unwrap();
        {
            let sent = notifier.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0].to_addr, "owner@example.com");
            assert_eq!(sent[0].subject, "alice commented on Post");
        }

        // Reply to alice: alice and the owner.
        post_comment(&store, &notifier, &config, &bob, item.id, "indeed", Some(reply.id))
            .await
            .unwrap();
        let sent = notifier.sent.lock().unwrap();
        let to: Vec<&str> = sent[1..].iter().map(|n| n.to_addr.as_str()).collect();
        assert_eq!(to, vec!["alice@example.com", "owner@example.com"]);
        assert!(sent.iter().all(|n| n.from_addr == "talkatv@localhost"));
    }
}
