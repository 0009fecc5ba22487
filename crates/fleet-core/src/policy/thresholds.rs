//! Threshold arithmetic.
//!
//! Sell and buy thresholds are pure functions of the snapshot. The shock
//! factor draws from the caller's RNG for its rare surge.

use rand::{Rng, RngCore};

use crate::domain::ServerSnapshot;

pub const SELL_BASE: f64 = 0.05;
pub const SELL_UNRELIABILITY_WEIGHT: f64 = 0.30;
pub const SELL_POWER_PENALTY: f64 = 0.10;
pub const SELL_COOLING_PENALTY: f64 = 0.05;
pub const SELL_COOLING_FLOOR: f64 = 40.0;
pub const SELL_TEMPERATURE_BASELINE: f64 = 40.0;
pub const SELL_TEMPERATURE_SCALE: f64 = 250.0;
pub const SELL_TEMPERATURE_CAP: f64 = 0.10;
pub const SELL_CEILING: f64 = 0.90;

pub const BUY_BASE: f64 = 0.25;
pub const BUY_RELIABILITY_WEIGHT: f64 = 0.20;
pub const BUY_FAILURE_PENALTY: f64 = 0.10;
pub const BUY_FAILURE_RATE_LIMIT: f64 = 0.20;
pub const BUY_HIGH_DEMAND: f64 = 150.0;
pub const BUY_DEMAND_BONUS: f64 = 0.10;
pub const BUY_LOW_DEMAND_PENALTY: f64 = 0.05;
pub const BUY_FLOOR: f64 = 0.05;

pub const SHOCK_BASE: f64 = 0.25;
pub const SHOCK_LATENCY_SCALE: f64 = 2000.0;
pub const SHOCK_TEMPERATURE_SCALE: f64 = 150.0;
pub const SHOCK_WEIGHT_CAP: f64 = 0.20;
pub const SHOCK_LATENCY_SURGE: (f64, f64) = (0.2, 0.5);
pub const SHOCK_TEMPERATURE_SURGE: (f64, f64) = (0.5, 1.0);

/// Threshold above which the failure rate argues for selling.
///
/// Always in [0, 0.90].
pub fn sell_threshold(snapshot: &ServerSnapshot) -> f64 {
    let environment = &snapshot.environment;
    let base = SELL_BASE + (1.0 - snapshot.server.reliability) * SELL_UNRELIABILITY_WEIGHT;
    let power = if environment.power_stability.is_degraded() {
        SELL_POWER_PENALTY
    } else {
        0.0
    };
    let cooling = if environment.cooling_efficiency < SELL_COOLING_FLOOR {
        SELL_COOLING_PENALTY
    } else {
        0.0
    };
    let temperature = ((environment.temperature - SELL_TEMPERATURE_BASELINE)
        / SELL_TEMPERATURE_SCALE)
        .min(SELL_TEMPERATURE_CAP);

    (base + power + cooling + temperature).clamp(0.0, SELL_CEILING)
}

/// Reliability must exceed this for a favorable buy. Never below 0.05.
pub fn buy_threshold(snapshot: &ServerSnapshot) -> f64 {
    let base = BUY_BASE - snapshot.server.reliability * BUY_RELIABILITY_WEIGHT;
    let failure = if snapshot.failure_rate > BUY_FAILURE_RATE_LIMIT {
        BUY_FAILURE_PENALTY
    } else {
        0.0
    };
    let demand = if snapshot.demand > BUY_HIGH_DEMAND {
        BUY_DEMAND_BONUS
    } else {
        -BUY_LOW_DEMAND_PENALTY
    };

    (base - failure + demand).max(BUY_FLOOR)
}

/// Probability that a simulated incident forces a buy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShockFactor {
    pub value: f64,
    pub surged: bool,
}

/// Shock factor without the surge.
pub fn base_shock(latency: f64, temperature: f64) -> f64 {
    let latency_weight = (latency / SHOCK_LATENCY_SCALE).min(SHOCK_WEIGHT_CAP);
    let temperature_weight = (temperature / SHOCK_TEMPERATURE_SCALE).min(SHOCK_WEIGHT_CAP);
    SHOCK_BASE + latency_weight + temperature_weight
}

/// Shock factor including the rare correlated surge.
///
/// The surge fires when a roll in [1, 100] is divisible by a modulus drawn
/// from [1, 50]; both are drawn fresh per evaluation.
pub fn shock_factor(snapshot: &ServerSnapshot, rng: &mut dyn RngCore) -> ShockFactor {
    let mut value = base_shock(snapshot.network.latency, snapshot.environment.temperature);

    let roll: u32 = rng.gen_range(1..=100);
    let modulus: u32 = rng.gen_range(1..=50);
    let surged = roll % modulus == 0;
    if surged {
        let (low, high) = SHOCK_LATENCY_SURGE;
        value += rng.gen_range(low..=high);
        let (low, high) = SHOCK_TEMPERATURE_SURGE;
        value += rng.gen_range(low..=high);
    }

    ShockFactor { value, surged }
}
