//! Threshold policy and anti-thrashing state.
//!
//! `evaluate_fleet` walks the fleet in id order. Per server it checks the
//! in-run cooldown first, then resolves the server entry, reads one snapshot
//! and asks the decider. An incomplete entry or a failed decision holds that
//! server only.

pub mod cooldown;
pub mod decider;
pub mod fatigue;
pub mod thresholds;

use rand::RngCore;
use tracing::{debug, warn};

use crate::domain::{Action, ActionSet, PolicyError};
use crate::environment::EnvironmentState;
use crate::ports::Decider;

pub use self::cooldown::{CooldownTable, DEFAULT_COOLDOWN_CYCLES};
pub use self::decider::ThresholdPolicy;
pub use self::fatigue::{DEFAULT_FATIGUE_WINDOW, FatigueTracker};

/// Raw actions of one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FleetEvaluation {
    /// Exactly one entry per server in the fleet.
    pub actions: ActionSet,

    /// Servers whose evaluation failed; each of them is held.
    pub errors: Vec<PolicyError>,
}

pub fn evaluate_fleet(
    decider: &dyn Decider,
    state: &EnvironmentState,
    cooldowns: &mut CooldownTable,
    rng: &mut dyn RngCore,
) -> FleetEvaluation {
    let mut evaluation = FleetEvaluation::default();

    for (id, entry) in state.servers() {
        if cooldowns.try_hold(id) {
            debug!(server = %id, remaining = cooldowns.remaining(id), "cooldown hold");
            evaluation.actions.insert(id.clone(), Action::Hold);
            continue;
        }

        let decision = entry.resolve(id).and_then(|server| {
            let snapshot = state.snapshot(id, &server, rng);
            decider
                .decide(&snapshot, rng)
                .map(|decision| (decision, snapshot.failure_rate))
        });
        let action = match decision {
            Ok((decision, failure_rate)) => {
                debug!(
                    server = %id,
                    action = %decision.action,
                    rule = ?decision.rule,
                    failure_rate,
                    sell = decision.thresholds.sell,
                    buy = decision.thresholds.buy,
                    shock = decision.thresholds.shock,
                    surged = decision.thresholds.surged,
                    "decided"
                );
                if decision.starts_cooldown() {
                    cooldowns.start(id);
                }
                decision.action
            }
            Err(err) => {
                warn!(server = %id, error = %err, "policy evaluation failed; holding");
                evaluation.errors.push(err);
                Action::Hold
            }
        };
        evaluation.actions.insert(id.clone(), action);
    }

    evaluation
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        EnvironmentFactor, NetworkFactor, PowerStability, Server, ServerEntry, ServerId,
        ServerSnapshot,
    };
    use crate::ports::{Decision, DecisionRule, Thresholds};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    /// Sells everything by compounding risk.
    struct AlwaysSell;

    impl Decider for AlwaysSell {
        fn decide(
            &self,
            _snapshot: &ServerSnapshot,
            _rng: &mut dyn RngCore,
        ) -> Result<Decision, PolicyError> {
            Ok(Decision {
                action: Action::Sell,
                rule: DecisionRule::CompoundingRisk,
                thresholds: Thresholds {
                    sell: 0.0,
                    buy: 0.0,
                    shock: 0.0,
                    surged: false,
                },
            })
        }
    }

    fn healthy_state() -> EnvironmentState {
        EnvironmentState::default()
            .with_server("s1", Server::new(0.95, 10.0, 50.0))
            .with_demand("s1", 200.0)
            .with_network(
                "s1",
                NetworkFactor {
                    latency: 50.0,
                    packet_loss: 1.0,
                    outage_count: 0,
                    bandwidth_usage: None,
                },
            )
            .with_environment(
                "s1",
                EnvironmentFactor {
                    temperature: 40.0,
                    humidity: 40.0,
                    power_stability: PowerStability::Stable,
                    cooling_efficiency: 90.0,
                },
            )
    }

    #[test]
    fn every_server_gets_exactly_one_action() {
        let state = healthy_state()
            .with_server("s2", Server::new(0.5, 50.0, 300.0))
            .with_server("s3", Server::new(0.7, 25.0, 120.0));
        let mut cooldowns = CooldownTable::default();
        let mut rng = StdRng::seed_from_u64(8);

        let evaluation = evaluate_fleet(&ThresholdPolicy, &state, &mut cooldowns, &mut rng);
        assert_eq!(evaluation.actions.len(), 3);
        assert!(evaluation.errors.is_empty());
    }

    #[test]
    fn sold_server_is_held_for_next_three_steps() {
        let state = healthy_state();
        let id = ServerId::from("s1");
        let mut cooldowns = CooldownTable::default();
        let mut rng = StdRng::seed_from_u64(8);

        let first = evaluate_fleet(&AlwaysSell, &state, &mut cooldowns, &mut rng);
        assert_eq!(first.actions[&id], Action::Sell);
        assert_eq!(cooldowns.remaining(&id), 3);

        for expected_left in [2, 1, 0] {
            let step = evaluate_fleet(&AlwaysSell, &state, &mut cooldowns, &mut rng);
            assert_eq!(step.actions[&id], Action::Hold);
            assert_eq!(cooldowns.remaining(&id), expected_left);
        }

        // クールダウン明けは再び評価される
        let after = evaluate_fleet(&AlwaysSell, &state, &mut cooldowns, &mut rng);
        assert_eq!(after.actions[&id], Action::Sell);
    }

    #[test]
    fn failed_evaluation_holds_and_reports() {
        let state = healthy_state().with_server("bad", Server::new(f64::NAN, 10.0, 50.0));
        let mut cooldowns = CooldownTable::default();
        let mut rng = StdRng::seed_from_u64(8);

        let evaluation = evaluate_fleet(&ThresholdPolicy, &state, &mut cooldowns, &mut rng);
        assert_eq!(evaluation.actions[&ServerId::from("bad")], Action::Hold);
        assert_eq!(evaluation.errors.len(), 1);
        assert_eq!(evaluation.errors[0].server(), &ServerId::from("bad"));
        assert_eq!(evaluation.actions[&ServerId::from("s1")], Action::Buy);
    }

    #[test]
    fn incomplete_entry_holds_only_that_server() {
        let partial = ServerEntry {
            reliability: Some(0.8),
            ..ServerEntry::default()
        };
        let state = healthy_state().with_server("s2", partial);
        let mut cooldowns = CooldownTable::default();
        let mut rng = StdRng::seed_from_u64(8);

        let evaluation = evaluate_fleet(&AlwaysSell, &state, &mut cooldowns, &mut rng);
        assert_eq!(evaluation.actions[&ServerId::from("s2")], Action::Hold);
        assert_eq!(
            evaluation.errors,
            vec![PolicyError::MissingField {
                server: ServerId::from("s2"),
                field: "cost",
            }]
        );
        assert_eq!(evaluation.actions[&ServerId::from("s1")], Action::Sell);
        assert!(!cooldowns.is_active(&ServerId::from("s2")));
    }
}
