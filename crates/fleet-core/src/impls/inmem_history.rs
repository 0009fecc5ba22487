//! InMemoryHistoryStore - テスト用の履歴
//!
//! # 実装詳細
//! - tokio::sync::Mutex<Vec<_>> で append を直列化
//! - タイムスタンプと CycleId は注入された Clock から採番

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{ActionTally, CycleRecord, FleetError};
use crate::ports::history_store::{last_n, stamp};
use crate::ports::{Clock, HistoryStore, SystemClock, TallyStore};

pub struct InMemoryHistoryStore {
    records: Mutex<Vec<CycleRecord>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// Pre-populate with records as they would have been loaded from disk.
    pub fn with_records(self, records: Vec<CycleRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            clock: self.clock,
        }
    }
}

impl Default for InMemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, record: CycleRecord) -> Result<CycleRecord, FleetError> {
        let stored = stamp(record, self.clock.as_ref());
        self.records.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn recent(&self, n: usize) -> Result<Vec<CycleRecord>, FleetError> {
        Ok(last_n(&self.records.lock().await, n))
    }

    async fn all(&self) -> Result<Vec<CycleRecord>, FleetError> {
        Ok(self.records.lock().await.clone())
    }
}

#[derive(Default)]
pub struct InMemoryTallyStore {
    tallies: Mutex<Vec<ActionTally>>,
}

impl InMemoryTallyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TallyStore for InMemoryTallyStore {
    async fn append(&self, tally: ActionTally) -> Result<(), FleetError> {
        self.tallies.lock().await.push(tally);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<ActionTally>, FleetError> {
        Ok(self.tallies.lock().await.clone())
    }
}
