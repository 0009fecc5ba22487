//! Historical trend report.
//!
//! Best-effort reading of past cycles: action counts, failures mentioned in
//! the free-text analysis, and cycles whose impact reports carried warnings.
//! Nothing here feeds back into decisions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Action, CycleRecord, ServerId};

const OPERATIONAL_PATTERNS: &[&str] = &[
    r"(?i)servers? ([s\d,\s]+) are operating fine",
    r"(?i)servers? ([s\d,\s]+) are up and running",
    r"(?i)servers? ([s\d,\s]+) are functional",
    r"(?i)servers? ([s\d,\s]+) are online",
];

const FAILURE_PATTERNS: &[&str] = &[
    r"(?i)the failed servers are: ([s\d,\s]+)",
    r"(?i)servers? ([s\d,\s]+) (?:have|has) failed",
    r"(?i)servers? ([s\d,\s]+) are down",
    r"(?i)servers? ([s\d,\s]+) experienced issues",
    r"(?i)servers? ([s\d,\s]+) are not operational",
    r"(?i)servers? ([s\d,\s]+) (?:encountered|had) failures?",
    r"(?i)servers? ([s\d,\s]+) (?:became|were) non-functional",
];

const HIGH_TEMPERATURE_MARKER: &str = "high temperature";

const SERVER_ID_PATTERN: &str = r"s\d+";

struct Patterns {
    operational: Vec<Regex>,
    failure: Vec<Regex>,
    server_id: Regex,
}

fn compile_all(patterns: &[&str]) -> Result<Vec<Regex>, regex::Error> {
    patterns.iter().map(|p| Regex::new(p)).collect()
}

fn compile() -> Result<Patterns, regex::Error> {
    Ok(Patterns {
        operational: compile_all(OPERATIONAL_PATTERNS)?,
        failure: compile_all(FAILURE_PATTERNS)?,
        server_id: Regex::new(SERVER_ID_PATTERN)?,
    })
}

/// Compiled once; a pattern that fails to compile is reported, not skipped.
fn patterns() -> Result<&'static Patterns, &'static regex::Error> {
    static PATTERNS: OnceLock<Result<Patterns, regex::Error>> = OnceLock::new();
    PATTERNS.get_or_init(compile).as_ref()
}

/// Server ids named by any of `patterns` in `text`.
fn extract_servers(text: &str, patterns: &[Regex], server_id: &Regex) -> BTreeSet<ServerId> {
    let mut found = BTreeSet::new();
    for pattern in patterns {
        for captures in pattern.captures_iter(text) {
            if let Some(list) = captures.get(1) {
                let list = list.as_str().to_lowercase();
                found.extend(
                    server_id
                        .find_iter(&list)
                        .map(|m| ServerId::from(m.as_str())),
                );
            }
        }
    }
    found
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendReport {
    pub records: usize,

    /// How often each server received each action.
    pub action_counts: BTreeMap<(ServerId, Action), usize>,

    /// Cycles in which the analysis named a server as failed.
    pub failure_counts: BTreeMap<ServerId, usize>,

    /// Timestamps of cycles with per-server network warnings.
    pub network_issues: Vec<String>,

    /// (server, timestamp) pairs with a high-temperature warning.
    pub environmental_issues: Vec<(ServerId, String)>,
}

impl TrendReport {
    pub fn from_history(history: &[CycleRecord]) -> Result<Self, regex::Error> {
        let patterns = patterns().map_err(Clone::clone)?;
        let known: BTreeSet<ServerId> = history
            .iter()
            .flat_map(|record| record.optimized_server_actions.keys().cloned())
            .collect();

        let mut report = TrendReport {
            records: history.len(),
            ..Self::default()
        };

        for record in history {
            for (id, action) in &record.optimized_server_actions {
                *report
                    .action_counts
                    .entry((id.clone(), *action))
                    .or_insert(0) += 1;
            }

            let text = record.ai_failure_analysis.as_str();
            let operational = extract_servers(text, &patterns.operational, &patterns.server_id);
            let mut failed = extract_servers(text, &patterns.failure, &patterns.server_id);
            // 稼働中のサーバーだけが挙げられている場合は残りを故障とみなす
            if failed.is_empty() && !operational.is_empty() {
                failed = known.difference(&operational).cloned().collect();
            }
            for id in failed {
                *report.failure_counts.entry(id).or_insert(0) += 1;
            }

            if record.network_impact.has_issues() {
                report.network_issues.push(record.timestamp.clone());
            }

            if let Some(issues) = record.environmental_impact.issues() {
                for (id, warnings) in issues {
                    let hot = warnings
                        .iter()
                        .any(|w| w.to_lowercase().contains(HIGH_TEMPERATURE_MARKER));
                    if hot {
                        report
                            .environmental_issues
                            .push((id.clone(), record.timestamp.clone()));
                    }
                }
            }
        }

        Ok(report)
    }

    /// Failure counts, most frequent first.
    pub fn failures_by_frequency(&self) -> Vec<(&ServerId, usize)> {
        let mut failures: Vec<(&ServerId, usize)> = self
            .failure_counts
            .iter()
            .map(|(id, count)| (id, *count))
            .collect();
        failures.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        failures
    }
}

fn times(count: usize) -> &'static str {
    if count == 1 { "time" } else { "times" }
}

impl fmt::Display for TrendReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "=".repeat(40);
        writeln!(f, "{rule}")?;
        writeln!(f, "      HISTORICAL TREND ANALYSIS")?;
        writeln!(f, "{rule}")?;

        if self.records == 0 {
            writeln!(f, "\nNo historical results found.")?;
            return write!(f, "{rule}");
        }

        writeln!(f, "\nServer actions ({} cycles):", self.records)?;
        for ((id, action), count) in &self.action_counts {
            writeln!(f, "   - {id}: {action} {count} {}", times(*count))?;
        }

        let failures = self.failures_by_frequency();
        if failures.is_empty() {
            writeln!(f, "\nNo failures reported by the analysis.")?;
        } else {
            writeln!(f, "\nFailure occurrences per server:")?;
            for (id, count) in failures {
                writeln!(f, "   - {id}: failed {count} {}", times(count))?;
            }
        }

        if self.network_issues.is_empty() {
            writeln!(f, "\nNo significant network issues detected.")?;
        } else {
            writeln!(f, "\nNetwork issues detected:")?;
            for timestamp in &self.network_issues {
                writeln!(f, "   - {timestamp}")?;
            }
        }

        if self.environmental_issues.is_empty() {
            writeln!(f, "\nNo significant environmental issues detected.")?;
        } else {
            writeln!(f, "\nEnvironmental issues detected:")?;
            for (id, timestamp) in &self.environmental_issues {
                writeln!(f, "   - Server {id} had high temperature on {timestamp}")?;
            }
        }

        write!(f, "\n{rule}")
    }
}
