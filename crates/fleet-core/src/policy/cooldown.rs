use std::collections::BTreeMap;

use crate::domain::ServerId;

/// Number of evaluation steps a server is held after a compounding-risk sell.
pub const DEFAULT_COOLDOWN_CYCLES: u32 = 3;

/// In-run cooldown counters.
///
/// Owned by whoever drives consecutive cycles of one run and passed into
/// each evaluation. Entries are removed when they reach zero, so a present
/// entry is always positive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CooldownTable {
    duration: u32,
    remaining: BTreeMap<ServerId, u32>,
}

impl Default for CooldownTable {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN_CYCLES)
    }
}

impl CooldownTable {
    pub fn new(duration: u32) -> Self {
        Self {
            duration,
            remaining: BTreeMap::new(),
        }
    }

    pub fn duration(&self) -> u32 {
        self.duration
    }

    /// (Re)start the cooldown of a server at the full duration.
    pub fn start(&mut self, id: &ServerId) {
        if self.duration > 0 {
            self.remaining.insert(id.clone(), self.duration);
        }
    }

    /// Consume one step of an active cooldown.
    ///
    /// Returns `true` when the server must be held this step.
    pub fn try_hold(&mut self, id: &ServerId) -> bool {
        let Some(left) = self.remaining.get_mut(id) else {
            return false;
        };
        *left = left.saturating_sub(1);
        if *left == 0 {
            self.remaining.remove(id);
        }
        true
    }

    pub fn remaining(&self, id: &ServerId) -> u32 {
        self.remaining.get(id).copied().unwrap_or(0)
    }

    pub fn is_active(&self, id: &ServerId) -> bool {
        self.remaining.contains_key(id)
    }

    pub fn active(&self) -> impl Iterator<Item = (&ServerId, u32)> {
        self.remaining.iter().map(|(id, left)| (id, *left))
    }
}
