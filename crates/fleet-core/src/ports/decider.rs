//! Decider port - スナップショットから Action を決める
//!
//! Decider は純粋関数として設計されます（乱数源は引数で注入）。
//! クールダウン表の更新は評価ループ側の責務です。

use rand::RngCore;

use crate::domain::{Action, PolicyError, ServerSnapshot};

/// Which decision rule produced an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DecisionRule {
    /// Failure rate over the sell threshold on an expensive server, or a hot,
    /// slow server.
    CompoundingRisk,

    /// Reliable, cheap, fast and cool.
    FavorableConditions,

    /// A simulated external incident forced a buy.
    Shock,

    /// No strong signal; weighted random draw.
    Uncertain,
}

/// Thresholds computed for one server evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub sell: f64,
    pub buy: f64,
    pub shock: f64,

    /// Whether the rare latency/temperature surge fired this evaluation.
    pub surged: bool,
}

/// The outcome of evaluating one server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub action: Action,
    pub rule: DecisionRule,
    pub thresholds: Thresholds,
}

impl Decision {
    /// Only a risk-driven sell puts the server into cooldown.
    pub fn starts_cooldown(&self) -> bool {
        self.action == Action::Sell && self.rule == DecisionRule::CompoundingRisk
    }
}

/// Trait for deciding one server's action from its snapshot.
///
/// Implementations must not keep per-server state between calls; everything
/// cross-server or cross-cycle lives in the cooldown table and the history.
pub trait Decider: Send + Sync {
    fn decide(
        &self,
        snapshot: &ServerSnapshot,
        rng: &mut dyn RngCore,
    ) -> Result<Decision, PolicyError>;
}
