//! Shop domain normalisation for Admin API endpoints.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ShopifyError;

static HOST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([a-z0-9-]*[a-z0-9])?(\.[a-z0-9]([a-z0-9-]*[a-z0-9])?)+$")
        .expect("valid regex")
});

/// Normalises a configured shop domain to a bare host.
///
/// Accepts `my-shop`, `my-shop.myshopify.com`, or a full URL such as
/// `https://my-shop.myshopify.com/admin`. A bare handle gets the
/// `.myshopify.com` suffix.
///
/// # Errors
///
/// Returns [`ShopifyError::InvalidShopDomain`] if nothing host-like remains.
pub fn normalize_shop_domain(raw: &str) -> Result<String, ShopifyError> {
    let trimmed = raw.trim().to_ascii_lowercase();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(&trimmed);
    let host = without_scheme.split('/').next().unwrap_or_default();

    let host = if host.contains('.') {
        host.to_owned()
    } else {
        format!("{host}.myshopify.com")
    };

    if HOST_RE.is_match(&host) {
        Ok(host)
    } else {
        Err(ShopifyError::InvalidShopDomain {
            shop_domain: raw.to_owned(),
            reason: "expected a host like my-shop.myshopify.com".to_owned(),
        })
    }
}
