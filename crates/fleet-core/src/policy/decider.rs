//! ThresholdPolicy - デフォルトの Decider 実装
//!
//! Rules, first match wins (cooldown is handled by the evaluation loop
//! before the decider is called):
//!
//! 1. compounding risk → sell
//! 2. favorable conditions, or a simulated shock → buy
//! 3. otherwise a weighted draw over hold / buy / sell

use rand::seq::SliceRandom;
use rand::{Rng, RngCore};

use super::thresholds::{ShockFactor, buy_threshold, sell_threshold, shock_factor};
use crate::domain::{Action, PolicyError, ServerSnapshot};
use crate::ports::{Decider, Decision, DecisionRule, Thresholds};

pub const RISK_MIN_COST: f64 = 15.0;
pub const RISK_LATENCY_MS: f64 = 400.0;
pub const RISK_TEMPERATURE: f64 = 55.0;

pub const FAVORABLE_MAX_COST: f64 = 30.0;
pub const FAVORABLE_MAX_LATENCY_MS: f64 = 250.0;
pub const FAVORABLE_MAX_TEMPERATURE: f64 = 50.0;

/// Fallback draw when no rule fires, in tenths: hold 0.3, buy 0.4, sell 0.3.
pub const FALLBACK_DRAW: [Action; 10] = [
    Action::Hold,
    Action::Hold,
    Action::Hold,
    Action::Buy,
    Action::Buy,
    Action::Buy,
    Action::Buy,
    Action::Sell,
    Action::Sell,
    Action::Sell,
];

/// Threshold-based decider.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThresholdPolicy;

impl ThresholdPolicy {
    pub fn new() -> Self {
        Self
    }

    fn check_finite(snapshot: &ServerSnapshot) -> Result<(), PolicyError> {
        let fields = [
            ("reliability", snapshot.server.reliability),
            ("cost", snapshot.server.cost),
            ("latency", snapshot.network.latency),
            ("temperature", snapshot.environment.temperature),
            ("cooling_efficiency", snapshot.environment.cooling_efficiency),
            ("failure_rate", snapshot.failure_rate),
            ("demand", snapshot.demand),
        ];
        match fields.into_iter().find(|(_, value)| !value.is_finite()) {
            Some((field, value)) => Err(PolicyError::NonFinite {
                server: snapshot.server_id.clone(),
                field,
                value,
            }),
            None => Ok(()),
        }
    }
}

impl Decider for ThresholdPolicy {
    fn decide(
        &self,
        snapshot: &ServerSnapshot,
        rng: &mut dyn RngCore,
    ) -> Result<Decision, PolicyError> {
        Self::check_finite(snapshot)?;

        let sell = sell_threshold(snapshot);
        let buy = buy_threshold(snapshot);
        let ShockFactor {
            value: shock,
            surged,
        } = shock_factor(snapshot, rng);
        let thresholds = Thresholds {
            sell,
            buy,
            shock,
            surged,
        };

        let server = &snapshot.server;
        let latency = snapshot.network.latency;
        let temperature = snapshot.environment.temperature;

        let risky_failures = snapshot.failure_rate > sell && server.cost > RISK_MIN_COST;
        let hot_and_slow = latency > RISK_LATENCY_MS && temperature > RISK_TEMPERATURE;
        if risky_failures || hot_and_slow {
            return Ok(Decision {
                action: Action::Sell,
                rule: DecisionRule::CompoundingRisk,
                thresholds,
            });
        }

        let favorable = server.reliability > buy
            && server.cost < FAVORABLE_MAX_COST
            && latency < FAVORABLE_MAX_LATENCY_MS
            && temperature < FAVORABLE_MAX_TEMPERATURE;
        if favorable {
            return Ok(Decision {
                action: Action::Buy,
                rule: DecisionRule::FavorableConditions,
                thresholds,
            });
        }
        // 有利条件が成立しない場合のみ乱数を引く
        if rng.gen_range(0.0..1.0) < shock {
            return Ok(Decision {
                action: Action::Buy,
                rule: DecisionRule::Shock,
                thresholds,
            });
        }

        Ok(Decision {
            action: FALLBACK_DRAW.choose(rng).copied().unwrap_or(Action::Hold),
            rule: DecisionRule::Uncertain,
            thresholds,
        })
    }
}
