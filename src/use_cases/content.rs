use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::domain::entities::{
    ContentExport, ContentRecord, SessionGrant, CONTENT_EXPORT_VERSION,
};
use crate::domain::errors::AccessError;
use crate::domain::ports::{Clock, Slot};
use crate::use_cases::check_access::CheckAccessUseCase;

async fn load_records<K>(store: &K) -> Result<Vec<ContentRecord>, AccessError>
where
    K: Slot<Vec<ContentRecord>>,
{
    Ok(store
        .get()
        .await
        .map_err(|_| AccessError::StorageFailure)?
        .unwrap_or_default())
}

// Feed listing, available only while a grant is valid.
pub struct ViewFeedUseCase<C, S, K> {
    pub access: CheckAccessUseCase<C, S>,
    pub content_store: K,
}

impl<C, S, K> ViewFeedUseCase<C, S, K>
where
    C: Clock,
    S: Slot<SessionGrant>,
    K: Slot<Vec<ContentRecord>>,
{
    pub async fn execute(&self) -> Result<Vec<ContentRecord>, AccessError> {
        self.access.execute().await?;
        load_records(&self.content_store).await
    }
}

// Appends an owner-authored record to the feed.
pub struct PublishContentUseCase<C, K> {
    pub clock: C,
    pub content_store: K,
}

impl<C, K> PublishContentUseCase<C, K>
where
    C: Clock,
    K: Slot<Vec<ContentRecord>>,
{
    pub async fn execute(&self, payload: Value) -> Result<ContentRecord, AccessError> {
        let mut records = load_records(&self.content_store).await?;
        let record = ContentRecord {
            id: Uuid::new_v4().to_string(),
            created_at: self.clock.now_epoch_millis(),
            payload,
        };
        records.push(record.clone());

        self.content_store
            .set(records)
            .await
            .map_err(|_| AccessError::StorageFailure)?;
        info!(record_id = %record.id, "content published");

        Ok(record)
    }
}

// Snapshot of the feed for backup or transfer. Gated like the feed itself.
pub struct ExportContentUseCase<C, S, K> {
    pub access: CheckAccessUseCase<C, S>,
    pub content_store: K,
}

impl<C, S, K> ExportContentUseCase<C, S, K>
where
    C: Clock,
    S: Slot<SessionGrant>,
    K: Slot<Vec<ContentRecord>>,
{
    pub async fn execute(&self) -> Result<ContentExport, AccessError> {
        self.access.execute().await?;
        let records = load_records(&self.content_store).await?;

        Ok(ContentExport {
            version: CONTENT_EXPORT_VERSION,
            exported_at: self.access.clock.now_epoch_millis(),
            records,
        })
    }
}

// Response returned by the import use case.
pub struct ImportContentResponse {
    pub imported: usize,
}

// Replaces the feed with a previously exported snapshot.
pub struct ImportContentUseCase<K> {
    pub content_store: K,
}

impl<K> ImportContentUseCase<K>
where
    K: Slot<Vec<ContentRecord>>,
{
    pub async fn execute(&self, raw: &str) -> Result<ImportContentResponse, AccessError> {
        let export: ContentExport = serde_json::from_str(raw.trim())
            .map_err(|err| AccessError::InvalidImport(err.to_string()))?;
        if export.version != CONTENT_EXPORT_VERSION {
            return Err(AccessError::InvalidImport(format!(
                "unsupported version {}",
                export.version
            )));
        }

        let imported = export.records.len();
        self.content_store
            .set(export.records)
            .await
            .map_err(|_| AccessError::StorageFailure)?;
        info!(imported, "content imported");

        Ok(ImportContentResponse { imported })
    }
}
