//! PostgreSQL `CatalogStore`.
//!
//! Sub-documents (detections, display settings, icons, collections, remote
//! metadata) live in JSONB columns. The three hot access patterns get real
//! columns and indexes: `processing_state`, `collection_ids` (GIN), and
//! `display_enabled`. Read-modify-write paths lock the row with
//! `SELECT ... FOR UPDATE` inside a transaction.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use varsync_core::{
    apply_upsert, CatalogRecord, CoreError, ProcessingStatus, UpsertRequest, VariantType,
};

use crate::store::{
    CatalogStats, CatalogStore, Pagination, ProductCounts, ProductFilter, ProductPage,
    UpsertOutcome,
};
use crate::DbError;

macro_rules! record_columns {
    () => {
        "external_id, title, handle, description, vendor, product_type, tags, \
         collection_ids, collections, variant_detection_enabled, detected_variant_types, \
         display_enabled, display_settings, use_product_images, custom_icons, \
         processing_state, last_processed, error_message, auto_process_enabled, \
         shopify_data, created_at, updated_at"
    };
}

/// A row from the `catalog_records` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CatalogRecordRow {
    pub external_id: String,
    pub title: String,
    pub handle: String,
    pub description: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    pub tags: Vec<String>,
    /// Denormalised from `collections` for the GIN index.
    pub collection_ids: Vec<String>,
    pub collections: serde_json::Value,
    pub variant_detection_enabled: bool,
    pub detected_variant_types: serde_json::Value,
    /// Denormalised from `display_settings.enabled`.
    pub display_enabled: bool,
    pub display_settings: serde_json::Value,
    pub use_product_images: bool,
    pub custom_icons: serde_json::Value,
    pub processing_state: String,
    pub last_processed: DateTime<Utc>,
    pub error_message: Option<String>,
    pub auto_process_enabled: bool,
    pub shopify_data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CatalogRecordRow {
    /// # Errors
    ///
    /// Returns [`DbError::Encode`] if a sub-document fails to serialize.
    pub fn from_record(record: &CatalogRecord) -> Result<Self, DbError> {
        Ok(Self {
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            handle: record.handle.clone(),
            description: record.description.clone(),
            vendor: record.vendor.clone(),
            product_type: record.product_type.clone(),
            tags: record.tags.clone(),
            collection_ids: record.collections.iter().map(|c| c.id.clone()).collect(),
            collections: encode("collections", &record.collections)?,
            variant_detection_enabled: record.variant_detection_enabled,
            detected_variant_types: encode(
                "detected_variant_types",
                &record.detected_variant_types,
            )?,
            display_enabled: record.display_settings.enabled,
            display_settings: encode("display_settings", &record.display_settings)?,
            use_product_images: record.use_product_images,
            custom_icons: encode("custom_icons", &record.custom_icons)?,
            processing_state: record.processing_status.state.as_str().to_owned(),
            last_processed: record.processing_status.last_processed,
            error_message: record.processing_status.error_message.clone(),
            auto_process_enabled: record.processing_status.auto_process_enabled,
            shopify_data: encode("shopify_data", &record.shopify_data)?,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }

    /// # Errors
    ///
    /// Returns [`DbError::Decode`] for a malformed JSONB column, or
    /// [`DbError::Core`] for an unknown processing state.
    pub fn into_record(self) -> Result<CatalogRecord, DbError> {
        let id = self.external_id;
        Ok(CatalogRecord {
            collections: decode(&id, "collections", self.collections)?,
            detected_variant_types: decode(
                &id,
                "detected_variant_types",
                self.detected_variant_types,
            )?,
            display_settings: decode(&id, "display_settings", self.display_settings)?,
            custom_icons: decode(&id, "custom_icons", self.custom_icons)?,
            shopify_data: decode(&id, "shopify_data", self.shopify_data)?,
            processing_status: ProcessingStatus {
                state: self.processing_state.parse()?,
                last_processed: self.last_processed,
                error_message: self.error_message,
                auto_process_enabled: self.auto_process_enabled,
            },
            title: self.title,
            handle: self.handle,
            description: self.description,
            vendor: self.vendor,
            product_type: self.product_type,
            tags: self.tags,
            variant_detection_enabled: self.variant_detection_enabled,
            use_product_images: self.use_product_images,
            created_at: self.created_at,
            updated_at: self.updated_at,
            external_id: id,
        })
    }
}

fn encode<T: serde::Serialize>(
    column: &'static str,
    value: &T,
) -> Result<serde_json::Value, DbError> {
    serde_json::to_value(value).map_err(|source| DbError::Encode { column, source })
}

fn decode<T: serde::de::DeserializeOwned>(
    external_id: &str,
    column: &'static str,
    value: serde_json::Value,
) -> Result<T, DbError> {
    serde_json::from_value(value).map_err(|source| DbError::Decode {
        external_id: external_id.to_owned(),
        column,
        source,
    })
}

/// Escapes `LIKE` metacharacters and wraps the needle for a substring match.
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn count(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

async fn fetch_for_update(
    conn: &mut PgConnection,
    external_id: &str,
) -> Result<Option<CatalogRecord>, DbError> {
    sqlx::query_as::<_, CatalogRecordRow>(concat!(
        "SELECT ",
        record_columns!(),
        " FROM catalog_records WHERE external_id = $1 FOR UPDATE"
    ))
    .bind(external_id)
    .fetch_optional(&mut *conn)
    .await?
    .map(CatalogRecordRow::into_record)
    .transpose()
}

async fn write_record(conn: &mut PgConnection, record: &CatalogRecord) -> Result<(), DbError> {
    let row = CatalogRecordRow::from_record(record)?;
    sqlx::query(concat!(
        "INSERT INTO catalog_records (",
        record_columns!(),
        ") VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
                   $17, $18, $19, $20, $21, $22) \
         ON CONFLICT (external_id) DO UPDATE SET \
             title = EXCLUDED.title, \
             handle = EXCLUDED.handle, \
             description = EXCLUDED.description, \
             vendor = EXCLUDED.vendor, \
             product_type = EXCLUDED.product_type, \
             tags = EXCLUDED.tags, \
             collection_ids = EXCLUDED.collection_ids, \
             collections = EXCLUDED.collections, \
             variant_detection_enabled = EXCLUDED.variant_detection_enabled, \
             detected_variant_types = EXCLUDED.detected_variant_types, \
             display_enabled = EXCLUDED.display_enabled, \
             display_settings = EXCLUDED.display_settings, \
             use_product_images = EXCLUDED.use_product_images, \
             custom_icons = EXCLUDED.custom_icons, \
             processing_state = EXCLUDED.processing_state, \
             last_processed = EXCLUDED.last_processed, \
             error_message = EXCLUDED.error_message, \
             auto_process_enabled = EXCLUDED.auto_process_enabled, \
             shopify_data = EXCLUDED.shopify_data, \
             updated_at = EXCLUDED.updated_at"
    ))
    .bind(&row.external_id)
    .bind(&row.title)
    .bind(&row.handle)
    .bind(&row.description)
    .bind(&row.vendor)
    .bind(&row.product_type)
    .bind(&row.tags)
    .bind(&row.collection_ids)
    .bind(&row.collections)
    .bind(row.variant_detection_enabled)
    .bind(&row.detected_variant_types)
    .bind(row.display_enabled)
    .bind(&row.display_settings)
    .bind(row.use_product_images)
    .bind(&row.custom_icons)
    .bind(&row.processing_state)
    .bind(row.last_processed)
    .bind(&row.error_message)
    .bind(row.auto_process_enabled)
    .bind(&row.shopify_data)
    .bind(row.created_at)
    .bind(row.updated_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_many(
        &self,
        sql: &'static str,
    ) -> Result<Vec<CatalogRecord>, DbError> {
        sqlx::query_as::<_, CatalogRecordRow>(sql)
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(CatalogRecordRow::into_record)
            .collect()
    }
}

impl CatalogStore for PgCatalogStore {
    async fn upsert(&self, request: UpsertRequest) -> Result<UpsertOutcome, DbError> {
        let mut tx = self.pool.begin().await?;
        let existing = fetch_for_update(&mut tx, &request.external_id).await?;
        let (record, action) = apply_upsert(existing, request, Utc::now())?;
        if action.writes() {
            record.validate()?;
            write_record(&mut tx, &record).await?;
        }
        tx.commit().await?;

        tracing::debug!(
            external_id = %record.external_id,
            action = ?action,
            "catalog record upserted"
        );
        Ok(UpsertOutcome { record, action })
    }

    async fn get(&self, external_id: &str) -> Result<Option<CatalogRecord>, DbError> {
        sqlx::query_as::<_, CatalogRecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM catalog_records WHERE external_id = $1"
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?
        .map(CatalogRecordRow::into_record)
        .transpose()
    }

    async fn update<F>(&self, external_id: &str, apply: F) -> Result<CatalogRecord, DbError>
    where
        F: FnOnce(&mut CatalogRecord) -> Result<(), CoreError> + Send,
    {
        let mut tx = self.pool.begin().await?;
        let before = fetch_for_update(&mut tx, external_id)
            .await?
            .ok_or_else(|| DbError::NotFound {
                external_id: external_id.to_owned(),
            })?;

        let mut record = before.clone();
        apply(&mut record)?;
        record.validate()?;
        record.finish_write(Some(&before), Utc::now());
        write_record(&mut tx, &record).await?;
        tx.commit().await?;
        Ok(record)
    }

    async fn list_pending_processing(&self) -> Result<Vec<CatalogRecord>, DbError> {
        self.fetch_many(concat!(
            "SELECT ",
            record_columns!(),
            " FROM catalog_records \
             WHERE processing_state IN ('pending', 'error') AND auto_process_enabled \
             ORDER BY last_processed ASC, external_id ASC"
        ))
        .await
    }

    async fn begin_processing(&self, external_id: &str) -> Result<Option<CatalogRecord>, DbError> {
        // The WHERE clause is the compare-and-set: a concurrent claimer sees
        // zero rows once the first one has moved the state to 'processing'.
        sqlx::query_as::<_, CatalogRecordRow>(concat!(
            "UPDATE catalog_records \
             SET processing_state = 'processing', last_processed = NOW(), \
                 error_message = NULL, updated_at = NOW() \
             WHERE external_id = $1 \
               AND processing_state IN ('pending', 'error') \
               AND auto_process_enabled \
             RETURNING ",
            record_columns!()
        ))
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?
        .map(CatalogRecordRow::into_record)
        .transpose()
    }

    async fn stats(&self) -> Result<CatalogStats, DbError> {
        let (total, active, pending, completed, errors) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                "SELECT COUNT(*), \
                        COUNT(*) FILTER (WHERE display_enabled), \
                        COUNT(*) FILTER (WHERE processing_state = 'pending'), \
                        COUNT(*) FILTER (WHERE processing_state = 'completed'), \
                        COUNT(*) FILTER (WHERE processing_state = 'error') \
                 FROM catalog_records",
            )
            .fetch_one(&self.pool)
            .await?;

        let type_rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT d->>'type', COUNT(*) \
             FROM catalog_records, jsonb_array_elements(detected_variant_types) AS d \
             GROUP BY 1",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut variant_types = BTreeMap::new();
        for (name, n) in type_rows {
            let variant_type: VariantType = name.parse()?;
            *variant_types.entry(variant_type).or_insert(0) += count(n);
        }

        Ok(CatalogStats {
            products: ProductCounts {
                total: count(total),
                active: count(active),
                pending: count(pending),
                completed: count(completed),
                errors: count(errors),
            },
            variant_types,
            last_updated: Utc::now(),
        })
    }

    async fn list_products(
        &self,
        filter: &ProductFilter,
        page: u32,
        page_size: u32,
    ) -> Result<ProductPage, DbError> {
        let state = filter.state.map(|s| s.as_str());
        let collection_id = filter.collection_id.as_deref();
        let pattern = filter.search().map(like_pattern);

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM catalog_records \
             WHERE ($1::text IS NULL OR processing_state = $1) \
               AND ($2::text IS NULL OR $2 = ANY(collection_ids)) \
               AND ($3::text IS NULL OR title ILIKE $3 OR handle ILIKE $3 OR vendor ILIKE $3)",
        )
        .bind(state)
        .bind(collection_id)
        .bind(pattern.as_deref())
        .fetch_one(&self.pool)
        .await?;

        let pagination = Pagination::new(page, page_size, count(total));
        let records = sqlx::query_as::<_, CatalogRecordRow>(concat!(
            "SELECT ",
            record_columns!(),
            " FROM catalog_records \
             WHERE ($1::text IS NULL OR processing_state = $1) \
               AND ($2::text IS NULL OR $2 = ANY(collection_ids)) \
               AND ($3::text IS NULL OR title ILIKE $3 OR handle ILIKE $3 OR vendor ILIKE $3) \
             ORDER BY updated_at DESC, external_id ASC \
             LIMIT $4 OFFSET $5"
        ))
        .bind(state)
        .bind(collection_id)
        .bind(pattern.as_deref())
        .bind(i64::from(pagination.page_size))
        .bind(i64::try_from(pagination.offset()).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(CatalogRecordRow::into_record)
        .collect::<Result<Vec<_>, _>>()?;

        Ok(ProductPage {
            records,
            pagination,
        })
    }

    async fn count_by_collection(&self) -> Result<HashMap<String, u64>, DbError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT c, COUNT(*) FROM catalog_records, unnest(collection_ids) AS c GROUP BY c",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id, n)| (id, count(n))).collect())
    }

    async fn list_display_enabled(&self) -> Result<Vec<CatalogRecord>, DbError> {
        self.fetch_many(concat!(
            "SELECT ",
            record_columns!(),
            " FROM catalog_records WHERE display_enabled ORDER BY external_id ASC"
        ))
        .await
    }
}
