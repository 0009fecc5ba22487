//! FleetEngine - 1 サイクルの実行
//!
//! # フロー
//! 1. 全サーバーを評価（クールダウン表を参照・更新）
//! 2. 直近の履歴から fatigue を適用
//! 3. 故障分析と impact レポートを添えて履歴に append
//! 4. 集計（ActionTally）を追記（失敗しても致命的ではない）
//!
//! 履歴への append が失敗したサイクルは記録されず、クールダウン表も
//! そのサイクル前の状態のまま残ります。

use std::sync::Arc;

use rand::RngCore;
use tracing::{info, warn};

use crate::domain::{
    ActionCounts, ActionSet, ActionTally, AnalysisText, CycleRecord, FleetError, PolicyError,
};
use crate::environment::EnvironmentState;
use crate::policy::{
    CooldownTable, DEFAULT_FATIGUE_WINDOW, FatigueTracker, ThresholdPolicy, evaluate_fleet,
};
use crate::ports::{Decider, FailureAnalyst, HistoryStore, TallyStore};

/// Result of one recorded cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleOutcome {
    /// The record as stored (timestamp and cycle id assigned).
    pub record: CycleRecord,

    /// Actions before the fatigue downgrade.
    pub raw_actions: ActionSet,

    pub policy_errors: Vec<PolicyError>,

    /// Whether the action tally was persisted too.
    pub tally_recorded: bool,
}

impl CycleOutcome {
    pub fn actions(&self) -> &ActionSet {
        &self.record.optimized_server_actions
    }
}

pub struct FleetEngine<R> {
    decider: Arc<dyn Decider>,
    history: Arc<dyn HistoryStore>,
    tallies: Arc<dyn TallyStore>,
    analyst: Arc<dyn FailureAnalyst>,
    cooldowns: CooldownTable,
    fatigue_window: usize,
    rng: R,
}

impl<R: RngCore> FleetEngine<R> {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        tallies: Arc<dyn TallyStore>,
        analyst: Arc<dyn FailureAnalyst>,
        rng: R,
    ) -> Self {
        Self {
            decider: Arc::new(ThresholdPolicy::new()),
            history,
            tallies,
            analyst,
            cooldowns: CooldownTable::default(),
            fatigue_window: DEFAULT_FATIGUE_WINDOW,
            rng,
        }
    }

    pub fn with_decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = decider;
        self
    }

    pub fn with_cooldown_cycles(mut self, cycles: u32) -> Self {
        self.cooldowns = CooldownTable::new(cycles);
        self
    }

    pub fn with_fatigue_window(mut self, window: usize) -> Self {
        self.fatigue_window = window;
        self
    }

    pub fn cooldowns(&self) -> &CooldownTable {
        &self.cooldowns
    }

    /// Evaluate, post-process and record one cycle.
    pub async fn run_cycle(&mut self, state: &EnvironmentState) -> Result<CycleOutcome, FleetError> {
        let mut cooldowns = self.cooldowns.clone();
        let evaluation = evaluate_fleet(self.decider.as_ref(), state, &mut cooldowns, &mut self.rng);

        let recent = self.history.recent(self.fatigue_window).await?;
        let fatigue = FatigueTracker::from_history(&recent, self.fatigue_window);
        let actions = fatigue.apply_cooldown(&evaluation.actions);

        let analysis = match self.analyst.analyze(&state.analysis_request()).await {
            Ok(text) => text,
            Err(err) => {
                warn!(error = %err, "failure analysis unavailable");
                AnalysisText::new(format!("Error analyzing failures: {err}"))
            }
        };

        let record = CycleRecord::new(actions)
            .with_analysis(analysis)
            .with_network_impact(state.analyze_network_impact())
            .with_environmental_impact(state.analyze_environmental_impact());
        let record = self.history.append(record).await?;
        self.cooldowns = cooldowns;

        let tally = ActionTally::from_record(&record);
        let tally_recorded = match self.tallies.append(tally).await {
            Ok(()) => true,
            Err(err) => {
                // 集計は履歴から再構築できる（ActionTally::replay）
                warn!(error = %err, "action tally not recorded");
                false
            }
        };

        let counts = ActionCounts::from_actions(&record.optimized_server_actions);
        info!(
            cycle = ?record.cycle_id,
            timestamp = %record.timestamp,
            buy = counts.buy,
            hold = counts.hold,
            sell = counts.sell,
            policy_errors = evaluation.errors.len(),
            cooling_down = self.cooldowns.active().count(),
            "cycle recorded"
        );

        Ok(CycleOutcome {
            record,
            raw_actions: evaluation.actions,
            policy_errors: evaluation.errors,
            tally_recorded,
        })
    }

    /// Run `cycles` consecutive cycles over the same inputs.
    ///
    /// Stops at the first fatal error; earlier cycles stay recorded.
    pub async fn run(
        &mut self,
        state: &EnvironmentState,
        cycles: u32,
    ) -> Result<Vec<CycleOutcome>, FleetError> {
        let mut outcomes = Vec::new();
        for _ in 0..cycles {
            outcomes.push(self.run_cycle(state).await?);
        }
        Ok(outcomes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Action, EnvironmentFactor, NetworkFactor, PowerStability, Server, ServerEntry, ServerId,
    };
    use crate::impls::{InMemoryHistoryStore, InMemoryTallyStore, StaticAnalyst};
    use crate::ports::AnalysisRequest;
    use crate::ports::AnalystError;
    use async_trait::async_trait;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn s1() -> ServerId {
        ServerId::from("s1")
    }

    fn scenario(cost: f64, failures: Vec<bool>) -> EnvironmentState {
        EnvironmentState::default()
            .with_server("s1", Server::new(0.95, cost, 50.0))
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
            .with_failures("s1", failures)
    }

    fn engine(history: Arc<InMemoryHistoryStore>, tallies: Arc<dyn TallyStore>) -> FleetEngine<StdRng> {
        FleetEngine::new(
            history,
            tallies,
            Arc::new(StaticAnalyst::new("Servers s1 are operating fine.")),
            StdRng::seed_from_u64(2025),
        )
    }

    #[tokio::test]
    async fn healthy_cheap_server_is_bought() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let tallies = Arc::new(InMemoryTallyStore::new());
        let mut engine = engine(history.clone(), tallies.clone());

        let outcome = engine.run_cycle(&scenario(10.0, vec![])).await.unwrap();
        assert_eq!(outcome.raw_actions[&s1()], Action::Buy);
        assert_eq!(outcome.actions()[&s1()], Action::Buy);
        assert!(outcome.tally_recorded);
        assert!(outcome.policy_errors.is_empty());

        let stored = history.all().await.unwrap();
        assert_eq!(stored, vec![outcome.record.clone()]);
        assert!(outcome.record.cycle_id.is_some());
        assert_eq!(outcome.record.ai_failure_analysis.as_str(), "Servers s1 are operating fine.");
        assert!(!outcome.record.network_impact.has_issues());

        let tallies = tallies.all().await.unwrap();
        assert_eq!(tallies, vec![ActionTally::from_record(&outcome.record)]);
        assert_eq!(tallies[0].counts.buy, 1);
    }

    #[tokio::test]
    async fn failing_expensive_server_is_sold_and_cools_down() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut engine = engine(history.clone(), Arc::new(InMemoryTallyStore::new()));
        let state = scenario(20.0, vec![true; 10]);

        let first = engine.run_cycle(&state).await.unwrap();
        assert_eq!(first.actions()[&s1()], Action::Sell);
        assert_eq!(engine.cooldowns().remaining(&s1()), 3);

        for expected_left in [2, 1, 0] {
            let outcome = engine.run_cycle(&state).await.unwrap();
            assert_eq!(outcome.raw_actions[&s1()], Action::Hold);
            assert_eq!(engine.cooldowns().remaining(&s1()), expected_left);
        }

        // クールダウン明けは再びリスク評価で sell
        let after = engine.run_cycle(&state).await.unwrap();
        assert_eq!(after.actions()[&s1()], Action::Sell);
        assert_eq!(history.all().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn recent_sell_downgrades_buy_to_hold() {
        let sold = CycleRecord::new(ActionSet::from([(s1(), Action::Sell)]));
        let history = Arc::new(InMemoryHistoryStore::new().with_records(vec![sold]));
        let mut engine = engine(history.clone(), Arc::new(InMemoryTallyStore::new()));

        let outcome = engine.run_cycle(&scenario(10.0, vec![])).await.unwrap();
        assert_eq!(outcome.raw_actions[&s1()], Action::Buy);
        assert_eq!(outcome.actions()[&s1()], Action::Hold);
    }

    #[tokio::test]
    async fn sell_outside_fatigue_window_is_forgotten() {
        let mut records = vec![CycleRecord::new(ActionSet::from([(s1(), Action::Sell)]))];
        records.extend((0..3).map(|_| CycleRecord::new(ActionSet::from([(s1(), Action::Hold)]))));
        let history = Arc::new(InMemoryHistoryStore::new().with_records(records));
        let mut engine = engine(history, Arc::new(InMemoryTallyStore::new()));

        let outcome = engine.run_cycle(&scenario(10.0, vec![])).await.unwrap();
        assert_eq!(outcome.actions()[&s1()], Action::Buy);
    }

    #[tokio::test]
    async fn policy_error_holds_server_and_cycle_continues() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut engine = engine(history.clone(), Arc::new(InMemoryTallyStore::new()));
        let state = scenario(10.0, vec![]).with_server("s2", Server::new(0.9, f64::INFINITY, 50.0));

        let outcome = engine.run_cycle(&state).await.unwrap();
        assert_eq!(outcome.actions()[&ServerId::from("s2")], Action::Hold);
        assert_eq!(outcome.policy_errors.len(), 1);
        assert_eq!(outcome.actions().len(), 2);
        assert_eq!(history.all().await.unwrap().len(), 1);
    }

    struct BrokenTallies;

    #[async_trait]
    impl TallyStore for BrokenTallies {
        async fn append(&self, _tally: ActionTally) -> Result<(), FleetError> {
            Err(FleetError::io(
                "output/server_actions.json",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }

        async fn all(&self) -> Result<Vec<ActionTally>, FleetError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn tally_failure_is_not_fatal() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut engine = engine(history.clone(), Arc::new(BrokenTallies));

        let outcome = engine.run_cycle(&scenario(10.0, vec![])).await.unwrap();
        assert!(!outcome.tally_recorded);
        assert_eq!(history.all().await.unwrap().len(), 1);
    }

    struct ReadOnlyHistory;

    #[async_trait]
    impl HistoryStore for ReadOnlyHistory {
        async fn append(&self, _record: CycleRecord) -> Result<CycleRecord, FleetError> {
            Err(FleetError::io(
                "output/historical_results.json",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            ))
        }

        async fn recent(&self, _n: usize) -> Result<Vec<CycleRecord>, FleetError> {
            Ok(Vec::new())
        }

        async fn all(&self) -> Result<Vec<CycleRecord>, FleetError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn failed_append_is_fatal_and_leaves_cooldowns_untouched() {
        let tallies = Arc::new(InMemoryTallyStore::new());
        let mut engine = FleetEngine::new(
            Arc::new(ReadOnlyHistory),
            tallies.clone(),
            Arc::new(StaticAnalyst::default()),
            StdRng::seed_from_u64(1),
        );

        let err = engine
            .run_cycle(&scenario(20.0, vec![true; 10]))
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Io { .. }));
        assert_eq!(engine.cooldowns().remaining(&s1()), 0);
        assert!(tallies.all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn huge_cycle_count_stops_at_first_failure() {
        let mut engine = FleetEngine::new(
            Arc::new(ReadOnlyHistory),
            Arc::new(InMemoryTallyStore::new()),
            Arc::new(StaticAnalyst::default()),
            StdRng::seed_from_u64(1),
        );

        let err = engine
            .run(&scenario(10.0, vec![]), u32::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, FleetError::Io { .. }));
    }

    #[tokio::test]
    async fn incomplete_server_is_held_and_others_are_decided() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut engine = engine(history.clone(), Arc::new(InMemoryTallyStore::new()));
        let missing_cost = ServerEntry {
            reliability: Some(0.8),
            cost: None,
            latency: Some(90.0),
        };
        let state = scenario(10.0, vec![]).with_server("s2", missing_cost);

        let outcome = engine.run_cycle(&state).await.unwrap();
        assert_eq!(outcome.actions()[&s1()], Action::Buy);
        assert_eq!(outcome.actions()[&ServerId::from("s2")], Action::Hold);
        assert_eq!(
            outcome.policy_errors,
            vec![PolicyError::MissingField {
                server: ServerId::from("s2"),
                field: "cost",
            }]
        );
        assert_eq!(history.all().await.unwrap().len(), 1);
    }

    struct Offline;

    #[async_trait]
    impl FailureAnalyst for Offline {
        async fn analyze(&self, _request: &AnalysisRequest) -> Result<AnalysisText, AnalystError> {
            Err(AnalystError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn analyst_error_is_recorded_as_text() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let mut engine = FleetEngine::new(
            history,
            Arc::new(InMemoryTallyStore::new()),
            Arc::new(Offline),
            StdRng::seed_from_u64(1),
        );

        let outcome = engine.run_cycle(&scenario(10.0, vec![])).await.unwrap();
        assert!(
            outcome
                .record
                .ai_failure_analysis
                .as_str()
                .starts_with("Error analyzing failures:")
        );
    }

    #[tokio::test]
    async fn same_seed_reproduces_a_run() {
        let state = scenario(25.0, vec![false, true, false])
            .with_server("s2", Server::new(0.4, 60.0, 300.0))
            .with_server("s3", Server::new(0.7, 22.0, 120.0));

        let mut runs = Vec::new();
        for _ in 0..2 {
            let mut engine = engine(
                Arc::new(InMemoryHistoryStore::new()),
                Arc::new(InMemoryTallyStore::new()),
            );
            let outcomes = engine.run(&state, 4).await.unwrap();
            runs.push(
                outcomes
                    .into_iter()
                    .map(|o| o.raw_actions)
                    .collect::<Vec<_>>(),
            );
        }
        assert_eq!(runs[0], runs[1]);
    }
}
