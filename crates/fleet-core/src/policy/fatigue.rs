use std::collections::BTreeMap;

use tracing::debug;

use crate::domain::{Action, ActionSet, CycleRecord, ServerId};

/// Number of most recent history records inspected for sells.
pub const DEFAULT_FATIGUE_WINDOW: usize = 3;

/// Cross-run fatigue: servers sold recently are not bought back right away.
///
/// Built from a read of the history and never writes to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FatigueTracker {
    strikes: BTreeMap<ServerId, u32>,
}

impl FatigueTracker {
    /// Count sell strikes over the last `window` records of `history`.
    pub fn from_history(history: &[CycleRecord], window: usize) -> Self {
        let start = history.len().saturating_sub(window);
        let mut strikes = BTreeMap::new();
        for record in &history[start..] {
            for (id, action) in &record.optimized_server_actions {
                if *action == Action::Sell {
                    *strikes.entry(id.clone()).or_insert(0) += 1;
                }
            }
        }
        Self { strikes }
    }

    pub fn strikes(&self, id: &ServerId) -> u32 {
        self.strikes.get(id).copied().unwrap_or(0)
    }

    /// Downgrade raw `buy` decisions of struck servers to `hold`.
    pub fn apply_cooldown(&self, raw: &ActionSet) -> ActionSet {
        raw.iter()
            .map(|(id, action)| {
                let adjusted = match action {
                    Action::Buy if self.strikes(id) > 0 => {
                        debug!(server = %id, strikes = self.strikes(id), "fatigue: buy downgraded to hold");
                        Action::Hold
                    }
                    other => *other,
                };
                (id.clone(), adjusted)
            })
            .collect()
    }
}
