//! HistoryStore port - サイクル履歴の正本（source of truth）
//!
//! HistoryStore はクロスラン記憶の唯一の経路です。
//!
//! # 設計原則
//! - append-only（既存レコードは書き換えない）
//! - append 時にタイムスタンプと CycleId を採番
//! - 空・未作成の履歴はエラーではなく空として扱う
//! - 壊れた履歴（MalformedHistory）も空として扱い、ログに残す

use async_trait::async_trait;

use crate::domain::{ActionTally, CycleId, CycleRecord, FleetError, TIMESTAMP_FORMAT};
use crate::ports::Clock;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Stamp `record` with timestamp and cycle id, append it, and return the
    /// stored form. Either the whole record lands or nothing does.
    async fn append(&self, record: CycleRecord) -> Result<CycleRecord, FleetError>;

    /// Last `n` records in chronological order (fewer if history is shorter).
    async fn recent(&self, n: usize) -> Result<Vec<CycleRecord>, FleetError>;

    /// Every record in chronological order.
    async fn all(&self) -> Result<Vec<CycleRecord>, FleetError>;
}

/// Separate append-only sequence of per-cycle action counts.
#[async_trait]
pub trait TallyStore: Send + Sync {
    async fn append(&self, tally: ActionTally) -> Result<(), FleetError>;

    async fn all(&self) -> Result<Vec<ActionTally>, FleetError>;
}

/// Slice helper shared by the store implementations.
pub(crate) fn last_n<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    let start = items.len().saturating_sub(n);
    items[start..].to_vec()
}

/// Stamp a record with the clock's time and a fresh cycle id.
pub(crate) fn stamp(mut record: CycleRecord, clock: &dyn Clock) -> CycleRecord {
    let now = clock.now();
    record.timestamp = now.format(TIMESTAMP_FORMAT).to_string();
    record.cycle_id = Some(CycleId::at(now));
    record
}

#[cfg(test)]
mod tests {
    use super::last_n;

    #[test]
    fn last_n_keeps_chronological_order() {
        let items = vec![1, 2, 3, 4, 5];
        assert_eq!(last_n(&items, 3), vec![3, 4, 5]);
        assert_eq!(last_n(&items, 10), items);
        assert!(last_n(&items, 0).is_empty());
        assert!(last_n::<i32>(&[], 3).is_empty());
    }
}
