pub mod app_config;
pub mod catalog;
pub mod classifier;
pub mod config;
pub mod display;
pub mod resolver;
pub mod source;

use thiserror::Error;

pub use app_config::{
    AppConfig, Environment, ExistingRecordPolicy, StoreBackend, MAX_BACKOFF_SECS,
};
pub use catalog::{
    apply_upsert, CatalogRecord, CollectionRef, CustomIcon, DetectedVariantType, DisplayLayout,
    DisplayPosition, DisplaySettings, DisplaySize, IconType, ProcessingState, ProcessingStatus,
    ProductFields, ShopifyData, ShopifyImage, UpsertAction, UpsertRequest,
};
pub use classifier::{classify, Classification, OptionKind, VariantType};
pub use config::{load_app_config, load_app_config_from_env};
pub use display::{format_usd, swatch_hex, PriceSummary};
pub use resolver::{
    index_options, initial_selections, option_dimensions, order_sizes, resolve, OptionDimension,
    OptionIndex, SelectedOption, Selections, Variant, VariantImage, VariantSelection,
};
pub use source::{CatalogSource, Page, SourceCollection, SourceProduct};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation failed for {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("invalid processing transition for {external_id}: {from} -> {to}")]
    InvalidTransition {
        external_id: String,
        from: ProcessingState,
        to: ProcessingState,
    },

    #[error("unknown {kind} value: {value}")]
    UnknownValue { kind: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
