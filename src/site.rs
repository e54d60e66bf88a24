use regex::Regex;

use crate::db::Store;
use crate::errors::AppError;
use crate::item::{candidate_domains, host_labels};
use crate::models::{Site, User};

/// Normalizes and checks a domain submitted for registration.
pub fn validate_domain(domain: &str) -> Result<String, AppError> {
    let domain = domain.trim().trim_end_matches('.').to_ascii_lowercase();

    if domain.is_empty() {
        return Err(AppError::Validation("domain must not be empty".to_string()));
    }
    if domain.len() > 253 {
        return Err(AppError::Validation("domain is too long".to_string()));
    }
    let pattern = Regex::new(r"^[a-z0-9.-]+$").map_err(anyhow::Error::from)?;
    if !pattern.is_match(&domain) {
        return Err(AppError::Validation(
            "domain may only contain letters, digits, dots and dashes".to_string(),
        ));
    }
    if !domain.contains('.') || domain.split('.').any(|label| label.is_empty()) {
        return Err(AppError::Validation(format!(
            "{} is not a valid domain",
            domain
        )));
    }

    Ok(domain)
}

/// Whether an item at `url` belongs under `domain` by the suffix rule used
/// for new items.
fn adopts(domain: &str, url: &str) -> bool {
    match host_labels(url) {
        Ok(labels) => candidate_domains(&labels).iter().any(|d| d == domain),
        Err(_) => false,
    }
}

/// Registers `domain` for `owner` and attaches the existing items of that
/// domain that have no site yet.
///
/// Returns the new site and the number of adopted items.
pub async fn add_site(
    store: &dyn Store,
    owner: &User,
    domain: &str,
) -> Result<(Site, u64), AppError> {
    let domain = validate_domain(domain)?;
    let site = store.insert_site(owner.id, &domain).await?;

    let orphans: Vec<i64> = store
        .list_unclaimed_items_containing(&domain)
        .await?
        .into_iter()
        .filter(|item| adopts(&domain, &item.url))
        .map(|item| item.id)
        .collect();
    let adopted = store.claim_items(&orphans, site.id).await?;

    log::info!(
        "user {} added site {} ({}), adopted {} items",
        owner.id,
        site.id,
        site.domain,
        adopted
    );

    Ok((site, adopted))
}

pub async fn list_sites(store: &dyn Store, owner: &User) -> Result<Vec<Site>, AppError> {
    Ok(store.list_sites_for_owner(owner.id).await?)
}
