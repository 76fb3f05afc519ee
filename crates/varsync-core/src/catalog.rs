//! The catalog record aggregate and its merge/status rules.
//!
//! Everything here is plain data plus pure methods. Persistence lives in
//! `varsync-db`; both stores call [`apply_upsert`] and
//! [`CatalogRecord::finish_write`] so the merge contract and the
//! `last_processed` post-condition are identical regardless of backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app_config::ExistingRecordPolicy;
use crate::classifier::{classify, VariantType};
use crate::resolver::OptionIndex;
use crate::CoreError;

/// Largest accepted `spacing_px` in display settings.
pub const MAX_SPACING_PX: u32 = 64;

// ---------------------------------------------------------------------------
// Processing state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessingState {
    Pending,
    Processing,
    Completed,
    Error,
}

impl ProcessingState {
    pub const ALL: [ProcessingState; 4] = [
        ProcessingState::Pending,
        ProcessingState::Processing,
        ProcessingState::Completed,
        ProcessingState::Error,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProcessingState::Pending => "pending",
            ProcessingState::Processing => "processing",
            ProcessingState::Completed => "completed",
            ProcessingState::Error => "error",
        }
    }

    /// `pending -> processing -> completed`, `processing -> error`,
    /// `error -> processing`. Nothing else.
    #[must_use]
    pub fn can_transition_to(self, next: ProcessingState) -> bool {
        matches!(
            (self, next),
            (
                ProcessingState::Pending | ProcessingState::Error,
                ProcessingState::Processing
            ) | (
                ProcessingState::Processing,
                ProcessingState::Completed | ProcessingState::Error
            )
        )
    }

    /// States the scheduler picks up.
    #[must_use]
    pub fn is_schedulable(self) -> bool {
        matches!(self, ProcessingState::Pending | ProcessingState::Error)
    }
}

impl std::fmt::Display for ProcessingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProcessingState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ProcessingState::Pending),
            "processing" => Ok(ProcessingState::Processing),
            "completed" => Ok(ProcessingState::Completed),
            "error" => Ok(ProcessingState::Error),
            other => Err(CoreError::UnknownValue {
                kind: "processing state",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingStatus {
    pub state: ProcessingState,
    pub last_processed: DateTime<Utc>,
    pub error_message: Option<String>,
    pub auto_process_enabled: bool,
}

impl ProcessingStatus {
    #[must_use]
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            state: ProcessingState::Pending,
            last_processed: now,
            error_message: None,
            auto_process_enabled: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Display settings and icons
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPosition {
    #[default]
    AbovePrice,
    BelowPrice,
    AboveTitle,
    BelowTitle,
    Custom,
}

impl std::str::FromStr for DisplayPosition {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "above_price" => Ok(DisplayPosition::AbovePrice),
            "below_price" => Ok(DisplayPosition::BelowPrice),
            "above_title" => Ok(DisplayPosition::AboveTitle),
            "below_title" => Ok(DisplayPosition::BelowTitle),
            "custom" => Ok(DisplayPosition::Custom),
            other => Err(CoreError::UnknownValue {
                kind: "display position",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayLayout {
    #[default]
    Horizontal,
    Vertical,
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplaySize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    pub enabled: bool,
    pub position: DisplayPosition,
    pub layout: DisplayLayout,
    pub size: DisplaySize,
    pub spacing_px: u32,
    pub custom_css: Option<String>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            position: DisplayPosition::default(),
            layout: DisplayLayout::default(),
            size: DisplaySize::default(),
            spacing_px: 8,
            custom_css: None,
        }
    }
}

impl DisplaySettings {
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if `spacing_px` exceeds [`MAX_SPACING_PX`].
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.spacing_px > MAX_SPACING_PX {
            return Err(CoreError::Validation {
                field: "display_settings.spacing_px",
                reason: format!("{} exceeds maximum of {MAX_SPACING_PX}", self.spacing_px),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconType {
    Uploaded,
    ColorSwatch,
    Icon,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomIcon {
    pub variant_type: VariantType,
    pub variant_value: String,
    pub image_url: String,
    pub icon_type: IconType,
    pub color: Option<String>,
    pub uploaded_at: DateTime<Utc>,
}

impl CustomIcon {
    fn validate(&self) -> Result<(), CoreError> {
        if self.variant_value.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "custom_icon.variant_value",
                reason: "must not be empty".into(),
            });
        }
        if matches!(self.icon_type, IconType::Uploaded | IconType::Icon)
            && self.image_url.trim().is_empty()
        {
            return Err(CoreError::Validation {
                field: "custom_icon.image_url",
                reason: "required for uploaded and icon types".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Detected variant types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedVariantType {
    #[serde(rename = "type")]
    pub variant_type: VariantType,
    pub name: String,
    /// Observed values in first-seen order, no duplicates.
    pub values: Vec<String>,
    pub confidence: f64,
    pub auto_detected: bool,
}

impl DetectedVariantType {
    #[must_use]
    pub fn key(&self) -> (VariantType, &str) {
        (self.variant_type, self.name.as_str())
    }

    fn validate(&self) -> Result<(), CoreError> {
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(CoreError::Validation {
                field: "detected_variant_types.confidence",
                reason: format!("{} is outside [0, 1]", self.confidence),
            });
        }
        if self.name.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "detected_variant_types.name",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }

    /// Classifies every dimension of an option index, stamping each detection
    /// with the supplied flat `confidence`.
    #[must_use]
    pub fn from_options(options: &OptionIndex, confidence: f64) -> Vec<DetectedVariantType> {
        options
            .iter()
            .map(|(name, values)| DetectedVariantType {
                variant_type: classify(name, values).variant_type,
                name: name.clone(),
                values: values.clone(),
                confidence,
                auto_detected: true,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Platform-sourced fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionRef {
    pub id: String,
    pub title: String,
    pub handle: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopifyImage {
    pub id: String,
    pub src: String,
    pub alt_text: Option<String>,
}

/// Snapshot of remote metadata. Informational only.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShopifyData {
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub total_variants: u32,
    pub images: Vec<ShopifyImage>,
}

/// The descriptive fields a sync overwrites. Produced by the remote transform.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductFields {
    pub title: String,
    pub handle: String,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    pub collections: Vec<CollectionRef>,
    pub shopify_data: ShopifyData,
}

impl ProductFields {
    fn validate(&self) -> Result<(), CoreError> {
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "title",
                reason: "must not be empty".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Aggregate root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub external_id: String,
    pub title: String,
    pub handle: String,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    pub collections: Vec<CollectionRef>,
    pub variant_detection_enabled: bool,
    pub detected_variant_types: Vec<DetectedVariantType>,
    pub display_settings: DisplaySettings,
    pub use_product_images: bool,
    pub custom_icons: Vec<CustomIcon>,
    pub processing_status: ProcessingStatus,
    pub shopify_data: ShopifyData,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecord {
    /// Creates a new record in the `pending` state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the external id or title is empty.
    pub fn new(
        external_id: &str,
        fields: ProductFields,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        validate_external_id(external_id)?;
        fields.validate()?;

        let mut record = Self {
            external_id: external_id.to_owned(),
            title: String::new(),
            handle: String::new(),
            description: None,
            vendor: None,
            product_type: None,
            tags: Vec::new(),
            collections: Vec::new(),
            variant_detection_enabled: true,
            detected_variant_types: Vec::new(),
            display_settings: DisplaySettings::default(),
            use_product_images: true,
            custom_icons: Vec::new(),
            processing_status: ProcessingStatus::pending(now),
            shopify_data: ShopifyData::default(),
            created_at: now,
            updated_at: now,
        };
        record.apply_fields(fields);
        Ok(record)
    }

    /// Overwrites the platform-sourced fields. Collections are deduplicated by id.
    pub fn apply_fields(&mut self, fields: ProductFields) {
        self.title = fields.title;
        self.handle = fields.handle;
        self.description = fields.description;
        self.vendor = fields.vendor;
        self.product_type = fields.product_type;
        self.tags = fields.tags;
        self.collections = dedupe_collections(fields.collections);
        self.shopify_data = fields.shopify_data;
    }

    #[must_use]
    pub fn variant_count(&self) -> u32 {
        self.shopify_data.total_variants
    }

    #[must_use]
    pub fn detection_complete(&self) -> bool {
        self.processing_status.state == ProcessingState::Completed
    }

    #[must_use]
    pub fn in_collection(&self, collection_id: &str) -> bool {
        self.collections.iter().any(|c| c.id == collection_id)
    }

    /// Case-insensitive substring match over title, handle, and vendor.
    #[must_use]
    pub fn matches_search(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.handle.to_lowercase().contains(&needle)
            || self
                .vendor
                .as_deref()
                .is_some_and(|v| v.to_lowercase().contains(&needle))
    }

    #[must_use]
    pub fn detected(&self, variant_type: VariantType, name: &str) -> Option<&DetectedVariantType> {
        self.detected_variant_types
            .iter()
            .find(|d| d.key() == (variant_type, name))
    }

    /// Upserts one detection keyed by `(type, name)`: values are unioned
    /// (existing order first), confidence is last-write-wins.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] for an out-of-range confidence or an
    /// empty name; the record is left unchanged.
    pub fn add_detected_variant_type(
        &mut self,
        incoming: DetectedVariantType,
    ) -> Result<(), CoreError> {
        incoming.validate()?;

        if let Some(existing) = self
            .detected_variant_types
            .iter_mut()
            .find(|d| d.variant_type == incoming.variant_type && d.name == incoming.name)
        {
            for value in incoming.values {
                if !existing.values.contains(&value) {
                    existing.values.push(value);
                }
            }
            existing.confidence = incoming.confidence;
        } else {
            let mut incoming = incoming;
            incoming.values = dedupe_values(incoming.values);
            self.detected_variant_types.push(incoming);
        }
        Ok(())
    }

    /// Merges a batch of detections. Validation runs over the whole batch
    /// first so a bad entry leaves the record untouched.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure in `incoming`.
    pub fn merge_detections(
        &mut self,
        incoming: Vec<DetectedVariantType>,
    ) -> Result<(), CoreError> {
        incoming.iter().try_for_each(DetectedVariantType::validate)?;
        for detection in incoming {
            self.add_detected_variant_type(detection)?;
        }
        Ok(())
    }

    /// Upserts a custom icon keyed by `(variant_type, variant_value)`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the icon is missing required data.
    pub fn add_custom_icon(&mut self, icon: CustomIcon) -> Result<(), CoreError> {
        icon.validate()?;

        if let Some(existing) = self.custom_icons.iter_mut().find(|i| {
            i.variant_type == icon.variant_type && i.variant_value == icon.variant_value
        }) {
            *existing = icon;
        } else {
            self.custom_icons.push(icon);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`CoreError::Validation`] if the settings are out of range.
    pub fn set_display_settings(&mut self, settings: DisplaySettings) -> Result<(), CoreError> {
        settings.validate()?;
        self.display_settings = settings;
        Ok(())
    }

    pub fn enable_display(&mut self, position: DisplayPosition) {
        self.display_settings.enabled = true;
        self.display_settings.position = position;
    }

    /// Moves the record through the processing state machine.
    ///
    /// `last_processed` is stamped on every successful transition. Entering
    /// `error` records `error_message`; any other state clears it.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTransition`] for a transition the state
    /// machine does not allow.
    pub fn transition(
        &mut self,
        to: ProcessingState,
        error_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let from = self.processing_status.state;
        if !from.can_transition_to(to) {
            return Err(CoreError::InvalidTransition {
                external_id: self.external_id.clone(),
                from,
                to,
            });
        }
        self.processing_status.state = to;
        self.processing_status.last_processed = now;
        self.processing_status.error_message = if to == ProcessingState::Error {
            error_message
        } else {
            None
        };
        Ok(())
    }

    /// Full invariant check run by the stores before every write.
    ///
    /// # Errors
    ///
    /// Returns the first [`CoreError::Validation`] found.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_external_id(&self.external_id)?;
        if self.title.trim().is_empty() {
            return Err(CoreError::Validation {
                field: "title",
                reason: "must not be empty".into(),
            });
        }
        self.display_settings.validate()?;
        self.detected_variant_types
            .iter()
            .try_for_each(DetectedVariantType::validate)?;
        for (i, d) in self.detected_variant_types.iter().enumerate() {
            if self.detected_variant_types[..i]
                .iter()
                .any(|prev| prev.key() == d.key())
            {
                return Err(CoreError::Validation {
                    field: "detected_variant_types",
                    reason: format!("duplicate entry for ({}, {})", d.variant_type, d.name),
                });
            }
        }
        self.custom_icons.iter().try_for_each(CustomIcon::validate)
    }

    /// Write-path post-condition shared by every store: bumps `updated_at`
    /// and, when detections or display settings changed relative to
    /// `before`, refreshes `processing_status.last_processed`.
    pub fn finish_write(&mut self, before: Option<&CatalogRecord>, now: DateTime<Utc>) {
        self.updated_at = now;
        if let Some(before) = before {
            if before.detected_variant_types != self.detected_variant_types
                || before.display_settings != self.display_settings
            {
                self.processing_status.last_processed = now;
            }
        }
    }
}

fn validate_external_id(external_id: &str) -> Result<(), CoreError> {
    if external_id.trim().is_empty() {
        return Err(CoreError::Validation {
            field: "external_id",
            reason: "must not be empty".into(),
        });
    }
    Ok(())
}

fn dedupe_values(values: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(values.len());
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

fn dedupe_collections(collections: Vec<CollectionRef>) -> Vec<CollectionRef> {
    let mut out: Vec<CollectionRef> = Vec::with_capacity(collections.len());
    for c in collections {
        if !out.iter().any(|seen| seen.id == c.id) {
            out.push(c);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Upsert contract
// ---------------------------------------------------------------------------

/// One transformed remote record headed for the store.
#[derive(Debug, Clone)]
pub struct UpsertRequest {
    pub external_id: String,
    pub fields: ProductFields,
    pub detections: Vec<DetectedVariantType>,
    pub force: bool,
    pub policy: ExistingRecordPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertAction {
    Created,
    /// Existing record returned untouched.
    Skipped,
    /// Platform fields overwritten, detections left alone.
    FieldsRefreshed,
    /// Forced: platform fields overwritten and detections merged.
    Merged,
}

impl UpsertAction {
    /// Whether the store needs to persist the resulting record.
    #[must_use]
    pub fn writes(self) -> bool {
        !matches!(self, UpsertAction::Skipped)
    }
}

/// Applies the upsert contract to the currently stored record (if any).
///
/// Returns the record the store should hold afterwards and what happened.
/// For [`UpsertAction::Skipped`] the returned record is `existing` unchanged.
///
/// # Errors
///
/// Returns [`CoreError::Validation`] if the request would produce an invalid
/// record. Nothing has been written at that point.
pub fn apply_upsert(
    existing: Option<CatalogRecord>,
    request: UpsertRequest,
    now: DateTime<Utc>,
) -> Result<(CatalogRecord, UpsertAction), CoreError> {
    let UpsertRequest {
        external_id,
        fields,
        detections,
        force,
        policy,
    } = request;

    let Some(existing) = existing else {
        let mut record = CatalogRecord::new(&external_id, fields, now)?;
        record.merge_detections(detections)?;
        return Ok((record, UpsertAction::Created));
    };

    if !force {
        return match policy {
            ExistingRecordPolicy::Skip => Ok((existing, UpsertAction::Skipped)),
            ExistingRecordPolicy::RefreshFields => {
                fields.validate()?;
                let mut record = existing.clone();
                record.apply_fields(fields);
                record.finish_write(Some(&existing), now);
                Ok((record, UpsertAction::FieldsRefreshed))
            }
        };
    }

    fields.validate()?;
    let mut record = existing.clone();
    record.apply_fields(fields);
    if record.variant_detection_enabled {
        record.merge_detections(detections)?;
    }
    record.finish_write(Some(&existing), now);
    Ok((record, UpsertAction::Merged))
}

#[cfg(test)]
#[path = "catalog_test.rs"]
mod tests;
