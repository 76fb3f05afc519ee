//! Shopify global ids (`gid://shopify/Product/123`).

const PREFIX: &str = "gid://shopify/";

/// Returns the trailing id of a global id of the given resource kind.
///
/// Plain ids pass through unchanged so callers can accept either form.
/// Returns `None` for a global id of a different kind or with an empty tail.
#[must_use]
pub fn strip_gid<'a>(kind: &str, id: &'a str) -> Option<&'a str> {
    let tail = match id.strip_prefix(PREFIX) {
        Some(rest) => rest.strip_prefix(kind)?.strip_prefix('/')?,
        None => id,
    };
    // Some resources carry query suffixes, e.g. `?variant=1`.
    let tail = tail.split('?').next().unwrap_or(tail).trim();
    (!tail.is_empty()).then_some(tail)
}

/// Builds a global id; already-global ids are returned as-is.
#[must_use]
pub fn to_gid(kind: &str, id: &str) -> String {
    if id.starts_with(PREFIX) {
        id.to_owned()
    } else {
        format!("{PREFIX}{kind}/{id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_matching_kind() {
        assert_eq!(strip_gid("Product", "gid://shopify/Product/42"), Some("42"));
        assert_eq!(
            strip_gid("Collection", "gid://shopify/Collection/7"),
            Some("7")
        );
    }

    #[test]
    fn plain_ids_pass_through() {
        assert_eq!(strip_gid("Product", "42"), Some("42"));
    }

    #[test]
    fn rejects_wrong_kind_and_empty_tail() {
        assert_eq!(strip_gid("Product", "gid://shopify/Collection/7"), None);
        assert_eq!(strip_gid("Product", "gid://shopify/Product/"), None);
        assert_eq!(strip_gid("Product", ""), None);
    }

    #[test]
    fn to_gid_is_idempotent() {
        assert_eq!(to_gid("Collection", "7"), "gid://shopify/Collection/7");
        assert_eq!(
            to_gid("Collection", "gid://shopify/Collection/7"),
            "gid://shopify/Collection/7"
        );
    }
}
