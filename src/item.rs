use crate::db::{Store, StoreError};
use crate::errors::AppError;
use crate::models::{Item, ItemView};

/// Longest domain suffix, in labels, that can match a registered site.
pub const MAX_SUFFIX_LABELS: usize = 7;

/// Shortest domain suffix that can match. A bare TLD never does.
pub const MIN_SUFFIX_LABELS: usize = 2;

/// Returns the dot-separated labels of the host of `url`, lowercased and
/// without the port.
pub fn host_labels(url: &str) -> Result<Vec<String>, AppError> {
    let parsed = url::Url::parse(url).map_err(|_| AppError::MalformedUrl(url.to_string()))?;
    let host = parsed
        .host_str()
        .filter(|host| !host.is_empty())
        .ok_or_else(|| AppError::MalformedUrl(url.to_string()))?;

    Ok(host
        .trim_end_matches('.')
        .split('.')
        .map(|label| label.to_ascii_lowercase())
        .collect())
}

/// Domains a host can belong to, longest first.
///
/// For `a.b.example.com` this is `a.b.example.com`, `b.example.com` and
/// `example.com`. Suffixes longer than `MAX_SUFFIX_LABELS` labels are not
/// considered.
pub fn candidate_domains(labels: &[String]) -> Vec<String> {
    let longest = labels.len().min(MAX_SUFFIX_LABELS);

    (MIN_SUFFIX_LABELS..=longest)
        .rev()
        .map(|len| labels[labels.len() - len..].join("."))
        .collect()
}

/// Picks the id of the site registered for the longest candidate domain.
async fn resolve_site(store: &dyn Store, labels: &[String]) -> Result<Option<i64>, AppError> {
    let candidates = candidate_domains(labels);
    if candidates.is_empty() {
        return Ok(None);
    }

    let sites = store.find_sites_by_domains(&candidates).await?;

    Ok(candidates.iter().find_map(|domain| {
        sites
            .iter()
            .find(|site| site.domain == *domain)
            .map(|site| site.id)
    }))
}

/// Returns the item for `url`, creating it if this is the first time the URL
/// is seen.
///
/// A new item is attached to the site whose domain is the longest matching
/// suffix of the URL host. An existing item is returned as is, `title` is
/// only used on creation.
pub async fn get_or_add_item(
    store: &dyn Store,
    url: &str,
    title: Option<&str>,
) -> Result<Item, AppError> {
    if let Some(item) = store.get_item_by_url(url).await? {
        return Ok(item);
    }

    let labels = host_labels(url)?;
    let site_id = resolve_site(store, &labels).await?;

    match store.insert_item(url, title, site_id).await {
        Ok(item) => {
            log::info!("created item {} for {}", item.id, item.url);
            Ok(item)
        }
        Err(StoreError::Conflict(_)) => {
            // Another request created the row first.
            log::debug!("lost item creation race for {}", url);
            store
                .get_item_by_url(url)
                .await?
                .ok_or(AppError::NotFound("item"))
        }
        Err(err) => Err(err.into()),
    }
}

pub async fn get_item(store: &dyn Store, item_id: i64) -> Result<Item, AppError> {
    store
        .get_item(item_id)
        .await?
        .ok_or(AppError::NotFound("item"))
}

/// Returns page `page` (starting at 1) of all items, newest first.
pub async fn list_items(
    store: &dyn Store,
    page: u32,
    per_page: u32,
) -> Result<Vec<ItemView>, AppError> {
    if page == 0 {
        return Err(AppError::Validation("pages start at 1".to_string()));
    }

    let offset = i64::from(page - 1) * i64::from(per_page);
    let items = store.list_items(offset, i64::from(per_page)).await?;

    let mut views = Vec::with_capacity(items.len());
    for item in &items {
        views.push(item_view(store, item).await?);
    }
    Ok(views)
}

/// Builds the public view of `item`, filling in the owner of its site.
pub async fn item_view(store: &dyn Store, item: &Item) -> Result<ItemView, AppError> {
    let owner = match item.site_id {
        Some(site_id) => store.get_site(site_id).await?.map(|site| site.owner_id),
        None => None,
    };

    Ok(ItemView::new(item, owner))
}
