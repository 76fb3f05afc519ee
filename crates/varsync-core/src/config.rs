use crate::app_config::{AppConfig, Environment, ExistingRecordPolicy, StoreBackend};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the real environment so tests can use a `HashMap` lookup
/// instead of `set_var`/`remove_var`.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let env = parse_environment(&or_default("VARSYNC_ENV", "development"));
    let log_level = or_default("VARSYNC_LOG_LEVEL", "info");

    let store_backend = match or_default("VARSYNC_STORE", "postgres").as_str() {
        "postgres" => StoreBackend::Postgres,
        "memory" => StoreBackend::Memory,
        other => {
            return Err(invalid(
                "VARSYNC_STORE",
                format!("expected \"postgres\" or \"memory\", got \"{other}\""),
            ))
        }
    };

    let database_url = lookup("DATABASE_URL").ok();
    if store_backend == StoreBackend::Postgres && database_url.is_none() {
        return Err(ConfigError::MissingEnvVar("DATABASE_URL".to_string()));
    }

    let db_max_connections = parse_u32("VARSYNC_DB_MAX_CONNECTIONS", "10")?;
    let db_min_connections = parse_u32("VARSYNC_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_u64("VARSYNC_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let shop_domain = lookup("SHOPIFY_SHOP_DOMAIN").ok().filter(|s| !s.is_empty());
    let shopify_access_token = lookup("SHOPIFY_ACCESS_TOKEN")
        .ok()
        .filter(|s| !s.is_empty());
    let shopify_api_version = or_default("SHOPIFY_API_VERSION", "2024-10");

    let http_timeout_secs = parse_u64("VARSYNC_HTTP_TIMEOUT_SECS", "30")?;
    let http_user_agent = or_default("VARSYNC_HTTP_USER_AGENT", "varsync/0.1 (catalog-sync)");
    let http_max_retries = parse_u32("VARSYNC_HTTP_MAX_RETRIES", "3")?;
    let http_backoff_base_ms = parse_u64("VARSYNC_HTTP_BACKOFF_BASE_MS", "1000")?;

    let sync_page_size = parse_u32("VARSYNC_SYNC_PAGE_SIZE", "50")?;
    if sync_page_size == 0 || sync_page_size > 250 {
        return Err(invalid(
            "VARSYNC_SYNC_PAGE_SIZE",
            format!("must be between 1 and 250, got {sync_page_size}"),
        ));
    }
    let sync_max_records = parse_usize("VARSYNC_SYNC_MAX_RECORDS", "500")?;
    let sync_max_pages = parse_usize("VARSYNC_SYNC_MAX_PAGES", "200")?;
    if sync_max_pages == 0 {
        return Err(invalid("VARSYNC_SYNC_MAX_PAGES", "must be at least 1".to_string()));
    }
    let sync_max_concurrent_records = parse_usize("VARSYNC_SYNC_MAX_CONCURRENT_RECORDS", "4")?;

    let sync_detection_confidence = or_default("VARSYNC_SYNC_DETECTION_CONFIDENCE", "0.9")
        .parse::<f64>()
        .map_err(|e| invalid("VARSYNC_SYNC_DETECTION_CONFIDENCE", e.to_string()))?;
    if !(0.0..=1.0).contains(&sync_detection_confidence) {
        return Err(invalid(
            "VARSYNC_SYNC_DETECTION_CONFIDENCE",
            format!("must be within [0, 1], got {sync_detection_confidence}"),
        ));
    }

    let sync_existing_policy = match or_default("VARSYNC_SYNC_EXISTING_POLICY", "skip").as_str() {
        "skip" => ExistingRecordPolicy::Skip,
        "refresh_fields" => ExistingRecordPolicy::RefreshFields,
        other => {
            return Err(invalid(
                "VARSYNC_SYNC_EXISTING_POLICY",
                format!("expected \"skip\" or \"refresh_fields\", got \"{other}\""),
            ))
        }
    };

    let processing_cron = or_default("VARSYNC_PROCESSING_CRON", "0 0 */6 * * *");

    Ok(AppConfig {
        env,
        log_level,
        store_backend,
        database_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        shop_domain,
        shopify_access_token,
        shopify_api_version,
        http_timeout_secs,
        http_user_agent,
        http_max_retries,
        http_backoff_base_ms,
        sync_page_size,
        sync_max_records,
        sync_max_pages,
        sync_max_concurrent_records,
        sync_detection_confidence,
        sync_existing_policy,
        processing_cron,
    })
}

/// Parse a string into an `Environment` variant.
///
/// Unrecognized values default to `Environment::Development`.
fn parse_environment(s: &str) -> Environment {
    match s {
        "production" => Environment::Production,
        "test" => Environment::Test,
        _ => Environment::Development,
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
