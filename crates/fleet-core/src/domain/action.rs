//! Fleet actions and their per-cycle aggregates.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::ids::ServerId;
use super::record::CycleRecord;

/// What to do with a server this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Buy => "buy",
            Action::Sell => "sell",
            Action::Hold => "hold",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One action per server for a cycle.
pub type ActionSet = BTreeMap<ServerId, Action>;

/// Counts of each action in one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionCounts {
    pub buy: usize,
    pub hold: usize,
    pub sell: usize,
}

impl ActionCounts {
    pub fn from_actions(actions: &ActionSet) -> Self {
        let mut counts = Self::default();
        for action in actions.values() {
            match action {
                Action::Buy => counts.buy += 1,
                Action::Hold => counts.hold += 1,
                Action::Sell => counts.sell += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.buy + self.hold + self.sell
    }
}

/// Timestamped action counts, appended to the trend sequence once per cycle.
///
/// Purely derived from a `CycleRecord`; `replay` rebuilds the whole sequence
/// from history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionTally {
    pub timestamp: String,

    #[serde(flatten)]
    pub counts: ActionCounts,
}

impl ActionTally {
    pub fn from_record(record: &CycleRecord) -> Self {
        Self {
            timestamp: record.timestamp.clone(),
            counts: ActionCounts::from_actions(&record.optimized_server_actions),
        }
    }

    pub fn replay(history: &[CycleRecord]) -> Vec<Self> {
        history.iter().map(Self::from_record).collect()
    }
}
