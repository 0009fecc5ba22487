//! Cycle record: what gets appended to history once per cycle.
//!
//! Field names follow the persisted history format so existing files load
//! unchanged. The analysis and impact payloads are carried through as-is;
//! nothing in the decision path reads them.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::action::ActionSet;
use super::ids::{CycleId, ServerId};

/// `strftime` format of `CycleRecord::timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Free-text failure analysis produced by the external service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisText(String);

impl AnalysisText {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AnalysisText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Network or environmental impact summary.
///
/// Persisted either as `{server: [warning, ...]}` or `{"summary": text}`.
/// Older files sometimes hold a bare string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ImpactReport {
    Summary { summary: String },
    Issues(BTreeMap<ServerId, Vec<String>>),
    Text(String),
}

impl ImpactReport {
    pub fn summary(text: impl Into<String>) -> Self {
        ImpactReport::Summary {
            summary: text.into(),
        }
    }

    /// Per-server warnings, if this report carries any.
    pub fn issues(&self) -> Option<&BTreeMap<ServerId, Vec<String>>> {
        match self {
            ImpactReport::Issues(issues) => Some(issues),
            _ => None,
        }
    }

    pub fn has_issues(&self) -> bool {
        self.issues().is_some_and(|issues| !issues.is_empty())
    }
}

impl Default for ImpactReport {
    fn default() -> Self {
        ImpactReport::Summary {
            summary: String::new(),
        }
    }
}

/// One cycle's finalized decisions plus the opaque reports produced alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Assigned by the history store on append.
    #[serde(default)]
    pub timestamp: String,

    /// Assigned by the history store on append. Absent in older files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<CycleId>,

    #[serde(default)]
    pub optimized_server_actions: ActionSet,

    #[serde(default)]
    pub ai_failure_analysis: AnalysisText,

    #[serde(default)]
    pub network_impact: ImpactReport,

    #[serde(default)]
    pub environmental_impact: ImpactReport,
}

impl CycleRecord {
    pub fn new(actions: ActionSet) -> Self {
        Self {
            timestamp: String::new(),
            cycle_id: None,
            optimized_server_actions: actions,
            ai_failure_analysis: AnalysisText::default(),
            network_impact: ImpactReport::default(),
            environmental_impact: ImpactReport::default(),
        }
    }

    pub fn with_analysis(mut self, analysis: AnalysisText) -> Self {
        self.ai_failure_analysis = analysis;
        self
    }

    pub fn with_network_impact(mut self, report: ImpactReport) -> Self {
        self.network_impact = report;
        self
    }

    pub fn with_environmental_impact(mut self, report: ImpactReport) -> Self {
        self.environmental_impact = report;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;

    #[test]
    fn impact_report_keeps_both_persisted_shapes() {
        let summary: ImpactReport =
            serde_json::from_str(r#"{"summary": "Network conditions are stable."}"#).unwrap();
        assert_eq!(summary, ImpactReport::summary("Network conditions are stable."));
        assert!(!summary.has_issues());

        let issues: ImpactReport =
            serde_json::from_str(r#"{"s3": ["High latency (250ms)"]}"#).unwrap();
        assert!(issues.has_issues());
        assert_eq!(issues.issues().unwrap()[&ServerId::from("s3")].len(), 1);

        let text: ImpactReport = serde_json::from_str(r#""all good""#).unwrap();
        assert_eq!(text, ImpactReport::Text("all good".to_string()));
    }

    #[test]
    fn legacy_record_without_cycle_id_loads() {
        let json = r#"{
            "optimized_server_actions": {"s1": "buy", "s2": "sell"},
            "ai_failure_analysis": "Server s2 has failed twice.",
            "network_impact": {"summary": "Network conditions are stable."},
            "environmental_impact": {"s1": ["High temperature (80C)"]},
            "timestamp": "2025-03-01 10:00:00"
        }"#;
        let record: CycleRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.cycle_id, None);
        assert_eq!(
            record.optimized_server_actions[&ServerId::from("s2")],
            Action::Sell
        );
        assert_eq!(record.ai_failure_analysis.as_str(), "Server s2 has failed twice.");
        assert!(record.environmental_impact.has_issues());

        // cycle_id が無いレコードは書き戻しても cycle_id を出さない
        let v = serde_json::to_value(&record).unwrap();
        assert!(v.get("cycle_id").is_none());
    }
}
