use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::HistoryStore;
use crate::error::StoreError;
use crate::record::PositionRecord;

type VehicleHistory = BTreeMap<i64, PositionRecord>;

/// In-process history guarded by a single mutex.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    records: Mutex<HashMap<String, VehicleHistory>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored records across all vehicles.
    pub fn len(&self) -> usize {
        self.records.lock().map(|m| m.values().map(BTreeMap::len).sum()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable("memory store lock poisoned".to_string())
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn put(&self, record: &PositionRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().map_err(poisoned)?;
        records
            .entry(record.vehicle_id.clone())
            .or_default()
            .insert(record.timestamp, record.clone());
        Ok(())
    }

    async fn query_recent(
        &self,
        vehicle_id: &str,
        limit: usize,
    ) -> Result<Vec<PositionRecord>, StoreError> {
        let records = self.records.lock().map_err(poisoned)?;
        Ok(records
            .get(vehicle_id)
            .map(|history| history.values().rev().take(limit).cloned().collect())
            .unwrap_or_default())
    }
}
