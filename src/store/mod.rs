//! Position history persistence.
//!
//! [`HistoryStore`] is the contract the pipeline needs from its persistence
//! collaborator. [`MemoryHistoryStore`] keeps everything in-process; the
//! DynamoDB-backed store lives with the binary.

mod memory;

pub use memory::MemoryHistoryStore;

use crate::error::StoreError;
use crate::record::PositionRecord;

/// Time-series store keyed by `(vehicle_id, timestamp)`.
#[async_trait::async_trait]
pub trait HistoryStore: Send + Sync {
    /// Upserts `record`. Either the whole record is durable when this returns
    /// `Ok`, or nothing was written.
    async fn put(&self, record: &PositionRecord) -> Result<(), StoreError>;

    /// Up to `limit` records for `vehicle_id`, newest first. Unknown vehicles
    /// yield an empty list.
    async fn query_recent(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<PositionRecord>, StoreError>;
}
