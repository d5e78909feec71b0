//! Storage backend trait definition

use async_trait::async_trait;

use super::error::StorageResult;

/// One raw sample row loaded from storage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleRow {
    /// Epoch millis of the cycle that produced the sample
    pub timestamp: i64,

    /// Server key (configured host)
    pub server_key: String,

    /// Raw player count; `None` for a failed poll
    pub player_count: Option<u32>,
}

/// Trait for ping sample stores.
///
/// Implementations must be `Send + Sync`; the store is shared across the
/// orchestrator and startup loading. All methods are async for Tokio
/// compatibility.
#[async_trait]
pub trait PingStore: Send + Sync {
    /// Persist one raw sample. Called once per server per cycle; a failure
    /// here fails the whole cycle before any subscriber sees its batch.
    async fn record_sample(
        &self,
        server_key: &str,
        timestamp: i64,
        player_count: Option<u32>,
    ) -> StorageResult<()>;

    /// Load all samples within `[start, end]` (epoch millis, inclusive),
    /// ordered by timestamp ascending. Used for cold-start replay.
    async fn load_samples(&self, start: i64, end: i64) -> StorageResult<Vec<SampleRow>>;

    /// All-time maximum player count for a server, with the timestamp (epoch
    /// millis) it was observed at. The timestamp may be absent for
    /// freestanding records inserted without one.
    async fn load_record(&self, server_key: &str) -> StorageResult<Option<(u32, Option<i64>)>>;

    /// Close the backend and release resources
    async fn close(&self) -> StorageResult<()>;
}
