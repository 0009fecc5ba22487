//! Environment state provider.
//!
//! Holds the per-server inputs of one cycle and derives the factors the
//! policy reads. Two of the derivations are deliberately noisy:
//!
//! - environment reads add fresh ±5 jitter to temperature and cooling
//!   efficiency on every call (the stored values never change),
//! - failure rates add a fixed bias plus a small random jitter.
//!
//! The randomness comes from the caller's `RngCore`, so a seeded generator
//! reproduces a run exactly.

pub mod impact;
pub mod loader;

use std::collections::BTreeMap;

use rand::{Rng, RngCore};

use crate::domain::{
    EnvironmentFactor, Fleet, NetworkFactor, Server, ServerEntry, ServerId, ServerSnapshot,
    factors::DEFAULT_DEMAND,
};
use crate::ports::analyst::{ANALYSIS_FAILURE_WINDOW, AnalysisRequest};

pub use self::loader::{DataPaths, load_environment};

/// Read-time jitter bound on temperature and cooling efficiency.
pub const ENVIRONMENT_JITTER: f64 = 5.0;

/// Number of most recent outcomes averaged into the failure rate.
pub const FAILURE_WINDOW: usize = 10;

/// Added to the observed failure ratio.
pub const FAILURE_BIAS: f64 = 0.05;

/// Bound of the uniform jitter added to the failure rate.
pub const FAILURE_JITTER: f64 = 0.02;

pub const MAX_FAILURE_RATE: f64 = 0.40;

/// Range of the baseline failure rate for servers without history.
pub const BASELINE_FAILURE_RATE: (f64, f64) = (0.01, 0.05);

/// Per-server inputs of one cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvironmentState {
    servers: Fleet,
    demand: BTreeMap<ServerId, f64>,
    network: BTreeMap<ServerId, NetworkFactor>,
    environment: BTreeMap<ServerId, EnvironmentFactor>,
    failures: BTreeMap<ServerId, Vec<bool>>,
}

impl EnvironmentState {
    pub fn new(servers: Fleet) -> Self {
        Self {
            servers,
            ..Self::default()
        }
    }

    pub fn with_server(mut self, id: impl Into<ServerId>, server: impl Into<ServerEntry>) -> Self {
        self.servers.insert(id.into(), server.into());
        self
    }

    pub fn with_demand(mut self, id: impl Into<ServerId>, demand: f64) -> Self {
        self.demand.insert(id.into(), demand);
        self
    }

    pub fn with_network(mut self, id: impl Into<ServerId>, network: NetworkFactor) -> Self {
        self.network.insert(id.into(), network);
        self
    }

    pub fn with_environment(
        mut self,
        id: impl Into<ServerId>,
        environment: EnvironmentFactor,
    ) -> Self {
        self.environment.insert(id.into(), environment);
        self
    }

    pub fn with_failures(mut self, id: impl Into<ServerId>, history: Vec<bool>) -> Self {
        self.failures.insert(id.into(), history);
        self
    }

    pub fn servers(&self) -> &Fleet {
        &self.servers
    }

    pub fn network_conditions(&self) -> &BTreeMap<ServerId, NetworkFactor> {
        &self.network
    }

    pub fn environment_conditions(&self) -> &BTreeMap<ServerId, EnvironmentFactor> {
        &self.environment
    }

    pub fn failure_history(&self, id: &ServerId) -> &[bool] {
        self.failures.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Stored environment plus fresh jitter. Two calls may disagree; use
    /// `snapshot` when one evaluation needs consistent values.
    pub fn get_environment_factor(&self, id: &ServerId, rng: &mut dyn RngCore) -> EnvironmentFactor {
        let mut factor = self.environment.get(id).cloned().unwrap_or_default();
        factor.temperature += rng.gen_range(-ENVIRONMENT_JITTER..=ENVIRONMENT_JITTER);
        factor.cooling_efficiency += rng.gen_range(-ENVIRONMENT_JITTER..=ENVIRONMENT_JITTER);
        factor
    }

    pub fn get_network_factor(&self, id: &ServerId) -> NetworkFactor {
        self.network.get(id).cloned().unwrap_or_default()
    }

    pub fn get_demand_factor(&self, id: &ServerId) -> f64 {
        self.demand.get(id).copied().unwrap_or(DEFAULT_DEMAND)
    }

    /// Recent failure ratio with bias and jitter, in [0.01, 0.40], rounded to
    /// two decimals.
    pub fn get_failure_rate(&self, id: &ServerId, rng: &mut dyn RngCore) -> f64 {
        let history = self.failure_history(id);
        if history.is_empty() {
            let (low, high) = BASELINE_FAILURE_RATE;
            return round2(rng.gen_range(low..=high));
        }

        let recent = &history[history.len().saturating_sub(FAILURE_WINDOW)..];
        let failures = recent.iter().filter(|failed| **failed).count();
        let ratio = failures as f64 / recent.len() as f64;
        let jitter = rng.gen_range(-FAILURE_JITTER..=FAILURE_JITTER);
        round2((ratio + FAILURE_BIAS + jitter).clamp(0.0, MAX_FAILURE_RATE))
    }

    /// Read every factor of one server once.
    pub fn snapshot(&self, id: &ServerId, server: &Server, rng: &mut dyn RngCore) -> ServerSnapshot {
        let failure_rate = self.get_failure_rate(id, rng);
        let network = self.get_network_factor(id);
        let environment = self.get_environment_factor(id, rng);
        ServerSnapshot {
            server_id: id.clone(),
            server: server.clone(),
            environment,
            network,
            failure_rate,
            demand: self.get_demand_factor(id),
        }
    }

    /// Stored (un-jittered) inputs in the shape the external analyst expects.
    pub fn analysis_request(&self) -> AnalysisRequest {
        let failure_logs = self
            .failures
            .iter()
            .map(|(id, history)| {
                let start = history.len().saturating_sub(ANALYSIS_FAILURE_WINDOW);
                (id.clone(), history[start..].to_vec())
            })
            .collect();
        AnalysisRequest {
            failure_logs,
            network_conditions: self.network.clone(),
            environment_conditions: self.environment.clone(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PowerStability;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use rstest::rstest;

    fn id(s: &str) -> ServerId {
        ServerId::from(s)
    }

    #[test]
    fn missing_server_data_yields_documented_defaults() {
        let env = EnvironmentState::default();
        let mut rng = StdRng::seed_from_u64(7);

        assert_eq!(env.get_demand_factor(&id("ghost")), 100.0);
        assert_eq!(env.get_network_factor(&id("ghost")), NetworkFactor::default());

        let factor = env.get_environment_factor(&id("ghost"), &mut rng);
        assert!((45.0..=55.0).contains(&factor.temperature));
        assert!((75.0..=85.0).contains(&factor.cooling_efficiency));
        assert_eq!(factor.humidity, 50.0);
        assert_eq!(factor.power_stability, PowerStability::Stable);
    }

    #[test]
    fn environment_jitter_is_rerolled_and_never_persisted() {
        let stored = EnvironmentFactor {
            temperature: 60.0,
            humidity: 40.0,
            power_stability: PowerStability::Unstable,
            cooling_efficiency: 70.0,
        };
        let env = EnvironmentState::default().with_environment("s1", stored.clone());
        let mut rng = StdRng::seed_from_u64(11);

        let reads: Vec<EnvironmentFactor> = (0..20)
            .map(|_| env.get_environment_factor(&id("s1"), &mut rng))
            .collect();

        for read in &reads {
            assert!((read.temperature - 60.0).abs() <= ENVIRONMENT_JITTER);
            assert!((read.cooling_efficiency - 70.0).abs() <= ENVIRONMENT_JITTER);
            assert_eq!(read.humidity, 40.0);
        }
        assert!(reads.iter().any(|r| r.temperature != reads[0].temperature));
        // 保存値は変化しない
        assert_eq!(env.environment_conditions()[&id("s1")], stored);
    }

    #[test]
    fn failure_rate_without_history_is_small_baseline() {
        let env = EnvironmentState::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let rate = env.get_failure_rate(&id("s1"), &mut rng);
            assert!((0.01..=0.05).contains(&rate), "rate={rate}");
        }
    }

    #[test]
    fn failure_rate_uses_only_last_ten_outcomes() {
        // 古い 10 件は全部失敗、直近 10 件は全部成功
        let mut history = vec![true; 10];
        history.extend(vec![false; 10]);
        let env = EnvironmentState::default().with_failures("s1", history);
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..50 {
            let rate = env.get_failure_rate(&id("s1"), &mut rng);
            assert!((0.03..=0.07).contains(&rate), "rate={rate}");
        }
    }

    #[test]
    fn all_failures_clamp_to_ceiling() {
        let env = EnvironmentState::default().with_failures("s1", vec![true; 10]);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(env.get_failure_rate(&id("s1"), &mut rng), MAX_FAILURE_RATE);
        }
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::single_success(vec![false])]
    #[case::single_failure(vec![true])]
    #[case::alternating((0..37).map(|i| i % 2 == 0).collect())]
    #[case::long_failures(vec![true; 500])]
    #[case::long_successes(vec![false; 500])]
    fn failure_rate_stays_in_bounds(#[case] history: Vec<bool>) {
        let env = EnvironmentState::default().with_failures("s1", history);
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let rate = env.get_failure_rate(&id("s1"), &mut rng);
            assert!((0.01..=0.40).contains(&rate), "rate={rate}");
        }
    }

    #[test]
    fn snapshot_reads_each_factor_once() {
        let env = EnvironmentState::default()
            .with_server("s1", Server::new(0.9, 12.0, 80.0))
            .with_demand("s1", 180.0)
            .with_network(
                "s1",
                NetworkFactor {
                    latency: 90.0,
                    packet_loss: 0.5,
                    outage_count: 1,
                    bandwidth_usage: None,
                },
            );
        let server = env.servers()[&id("s1")].resolve(&id("s1")).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let snap = env.snapshot(&id("s1"), &server, &mut rng);
        assert_eq!(snap.server_id, id("s1"));
        assert_eq!(snap.demand, 180.0);
        assert_eq!(snap.network.latency, 90.0);
        assert!((0.01..=0.05).contains(&snap.failure_rate));
    }

    #[test]
    fn analysis_request_trims_failure_logs() {
        let env = EnvironmentState::default().with_failures("s1", (0..25).map(|i| i >= 20).collect());
        let request = env.analysis_request();
        let log = &request.failure_logs[&id("s1")];
        assert_eq!(log.len(), ANALYSIS_FAILURE_WINDOW);
        assert_eq!(log.iter().filter(|f| **f).count(), 5);
    }
}
