use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use super::{AuctionRow, AuctionUpdate, RecordStore, StoreError};
use crate::domain::AuctionId;

#[derive(Debug, Default)]
struct Table {
    next_id: AuctionId,
    rows: BTreeMap<AuctionId, AuctionRow>,
    applied: Vec<AuctionUpdate>,
}

/// Rows kept in memory. Can be told to fail every call, for exercising the
/// engine's error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: Mutex<Table>,
    failing: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Puts a row in place as-is, bypassing every check.
    pub async fn insert_raw(&self, row: AuctionRow) {
        let mut table = self.table.lock().await;
        table.next_id = table.next_id.max(row.id);
        table.rows.insert(row.id, row);
    }

    pub async fn row(&self, id: AuctionId) -> Option<AuctionRow> {
        self.table.lock().await.rows.get(&id).cloned()
    }

    /// Every update that was applied, oldest first.
    pub async fn applied_updates(&self) -> Vec<AuctionUpdate> {
        self.table.lock().await.applied.clone()
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn init(&self) -> Result<(), StoreError> {
        self.check()
    }

    async fn load(&self) -> Result<Vec<AuctionRow>, StoreError> {
        self.check()?;
        Ok(self.table.lock().await.rows.values().cloned().collect())
    }

    async fn add(&self, row: &AuctionRow) -> Result<AuctionId, StoreError> {
        self.check()?;
        let mut table = self.table.lock().await;
        table.next_id += 1;
        let id = table.next_id;
        table.rows.insert(id, AuctionRow { id, ..row.clone() });
        Ok(id)
    }

    async fn update(&self, update: &AuctionUpdate) -> Result<u64, StoreError> {
        self.check()?;
        let mut table = self.table.lock().await;
        let changed = match table.rows.get_mut(&update.id) {
            Some(row) => {
                row.apply(update);
                1
            }
            None => 0,
        };
        if changed > 0 {
            table.applied.push(update.clone());
        }
        Ok(changed)
    }

    async fn remove(&self, id: AuctionId) -> Result<u64, StoreError> {
        self.check()?;
        Ok(self.table.lock().await.rows.remove(&id).map_or(0, |_| 1))
    }
}
