//! Domain identifiers (strongly-typed IDs).
//!
//! - `ServerId`: 入力データ由来の文字列 ID（"s1", "s2", ...）
//! - `CycleId`: append 時に採番される ULID ベースの ID
//!
//! ServerId は BTreeMap のキーとして使うため `Ord` を実装します。
//! 反復順序が決定的になるので、seed 付き RNG での再現に必要です。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Identifier of a server in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ServerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one recorded evaluation cycle.
///
/// The timestamp part of the ULID comes from the store's clock, so ids sort
/// in append order.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(Ulid);

impl CycleId {
    /// 指定時刻から CycleId を生成（ランダム部分は rand::random）
    pub fn at(now: DateTime<Utc>) -> Self {
        let timestamp_ms = now.timestamp_millis().max(0) as u64;
        Self(Ulid::from_parts(timestamp_ms, rand::random()))
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for CycleId {
    fn from(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn server_ids_order_lexicographically() {
        let mut ids = vec![ServerId::from("s2"), ServerId::from("s10"), ServerId::from("s1")];
        ids.sort();
        let names: Vec<&str> = ids.iter().map(ServerId::as_str).collect();
        assert_eq!(names, vec!["s1", "s10", "s2"]);
    }

    #[test]
    fn server_id_serializes_as_plain_string() {
        let s = serde_json::to_string(&ServerId::from("s7")).unwrap();
        assert_eq!(s, "\"s7\"");
    }

    #[test]
    fn cycle_id_carries_clock_timestamp() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let a = CycleId::at(now);
        let b = CycleId::at(now);

        // ランダム部分があるので異なる
        assert_ne!(a, b);
        assert_eq!(a.as_ulid().timestamp_ms(), now.timestamp_millis() as u64);
        assert!(a.to_string().starts_with("cycle-"));
    }
}
