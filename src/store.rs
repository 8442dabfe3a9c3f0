use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::Result;

/// A completed transcription. Immutable once stored; there are no update
/// or delete operations.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionRecord {
    pub id: String,
    pub filename: String,
    pub size_bytes: u64,
    pub media_type: String,
    /// Probed duration; absent when probing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
    pub text: String,
    pub word_count: usize,
    pub confidence: f32,
    pub processing_secs: f64,
    pub created_at: DateTime<Utc>,
    /// Number of segments the audio was split into; absent for
    /// single-shot transcriptions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<u32>,
}

/// Result store capability. Implementations may or may not be durable;
/// callers must not assume persistence across restarts.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    /// Persist a record, assigning its identifier.
    async fn insert(&self, record: TranscriptionRecord) -> Result<TranscriptionRecord>;

    async fn get(&self, id: &str) -> Result<Option<TranscriptionRecord>>;
}

/// Process-memory store: no eviction, no durability, gone at shutdown.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, TranscriptionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn insert(&self, mut record: TranscriptionRecord) -> Result<TranscriptionRecord> {
        record.id = Uuid::new_v4().to_string();
        self.records
            .write()
            .await
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<TranscriptionRecord>> {
        Ok(self.records.read().await.get(id).cloned())
    }
}
