//! Durable storage for raw ping samples.
//!
//! The engine's whole contract with storage is three operations: persist one
//! raw sample, load samples for a time window, and look up a server's
//! all-time record. Everything else (schema details, retention) lives behind
//! the [`PingStore`] trait.

pub mod backend;
pub mod error;
#[cfg(feature = "storage-sqlite")]
pub mod sqlite;

use std::sync::Arc;

use crate::config::StorageConfig;

pub use backend::{PingStore, SampleRow};
pub use error::{StorageError, StorageResult};

/// Open the configured backend. `None` means persistence is disabled.
pub async fn connect(config: &StorageConfig) -> anyhow::Result<Option<Arc<dyn PingStore>>> {
    match config {
        StorageConfig::None => Ok(None),
        #[cfg(feature = "storage-sqlite")]
        StorageConfig::Sqlite { path } => {
            let store = sqlite::SqlitePingStore::new(path).await?;
            Ok(Some(Arc::new(store)))
        }
        #[cfg(not(feature = "storage-sqlite"))]
        StorageConfig::Sqlite { .. } => {
            anyhow::bail!("sqlite storage requested but the storage-sqlite feature is disabled")
        }
    }
}
