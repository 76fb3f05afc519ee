#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

/// Which persistence backend the binaries wire up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

/// What a non-forced sync does when the record already exists.
///
/// `Skip` leaves the stored record untouched, so remote catalog drift stays
/// invisible until a forced resync. `RefreshFields` overwrites the
/// platform-sourced descriptive fields but still skips reclassification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingRecordPolicy {
    #[default]
    Skip,
    RefreshFields,
}

impl std::fmt::Display for ExistingRecordPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExistingRecordPolicy::Skip => write!(f, "skip"),
            ExistingRecordPolicy::RefreshFields => write!(f, "refresh_fields"),
        }
    }
}

/// Longest single back-off the HTTP client sleeps between throttled attempts.
pub const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub log_level: String,
    pub store_backend: StoreBackend,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub shop_domain: Option<String>,
    pub shopify_access_token: Option<String>,
    pub shopify_api_version: String,
    pub http_timeout_secs: u64,
    pub http_user_agent: String,
    pub http_max_retries: u32,
    pub http_backoff_base_ms: u64,
    pub sync_page_size: u32,
    pub sync_max_records: usize,
    /// Pages fetched per sync run before it stops, in either mode.
    pub sync_max_pages: usize,
    pub sync_max_concurrent_records: usize,
    pub sync_detection_confidence: f64,
    pub sync_existing_policy: ExistingRecordPolicy,
    pub processing_cron: String,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("store_backend", &self.store_backend)
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[redacted]"),
            )
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("shop_domain", &self.shop_domain)
            .field(
                "shopify_access_token",
                &self.shopify_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("shopify_api_version", &self.shopify_api_version)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("http_user_agent", &self.http_user_agent)
            .field("http_max_retries", &self.http_max_retries)
            .field("http_backoff_base_ms", &self.http_backoff_base_ms)
            .field("sync_page_size", &self.sync_page_size)
            .field("sync_max_records", &self.sync_max_records)
            .field("sync_max_pages", &self.sync_max_pages)
            .field(
                "sync_max_concurrent_records",
                &self.sync_max_concurrent_records,
            )
            .field("sync_detection_confidence", &self.sync_detection_confidence)
            .field("sync_existing_policy", &self.sync_existing_policy)
            .field("processing_cron", &self.processing_cron)
            .finish()
    }
}
