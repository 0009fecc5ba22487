//! Network and environmental impact reports.
//!
//! Reporting only: these read the stored conditions (no jitter) and never
//! feed the policy. Every server with stored conditions is covered.

use std::collections::BTreeMap;

use super::EnvironmentState;
use crate::domain::{EnvironmentFactor, ImpactReport, NetworkFactor, ServerId};

pub const HIGH_LATENCY_MS: f64 = 200.0;
pub const HIGH_PACKET_LOSS: f64 = 5.0;
pub const OUTAGE_WARNING_COUNT: u32 = 3;
pub const HIGH_TEMPERATURE: f64 = 75.0;
pub const LOW_COOLING_EFFICIENCY: f64 = 50.0;

pub const NETWORK_STABLE: &str = "Network conditions are stable.";
pub const ENVIRONMENT_STABLE: &str = "Environmental conditions are stable.";

pub fn network_warnings(network: &NetworkFactor) -> Vec<String> {
    let mut issues = Vec::new();
    if network.latency > HIGH_LATENCY_MS {
        issues.push(format!(
            "High latency ({}ms): consider delaying purchases.",
            network.latency
        ));
    }
    if network.packet_loss > HIGH_PACKET_LOSS {
        issues.push(format!(
            "High packet loss ({}%): favor selling unreliable servers.",
            network.packet_loss
        ));
    }
    if network.outage_count >= OUTAGE_WARNING_COUNT {
        issues.push(format!(
            "Multiple outages ({} in 24h): scale down.",
            network.outage_count
        ));
    }
    issues
}

pub fn environment_warnings(environment: &EnvironmentFactor) -> Vec<String> {
    let mut issues = Vec::new();
    if environment.temperature > HIGH_TEMPERATURE {
        issues.push(format!(
            "High temperature ({}C): risk of overheating.",
            environment.temperature
        ));
    }
    if environment.cooling_efficiency < LOW_COOLING_EFFICIENCY {
        issues.push(format!(
            "Low cooling efficiency ({}%): needs better airflow.",
            environment.cooling_efficiency
        ));
    }
    if environment.power_stability.is_degraded() {
        issues.push(format!(
            "Power instability ({}): risk of sudden shutdown.",
            environment.power_stability.as_str()
        ));
    }
    issues
}

fn collect_report<T>(
    conditions: &BTreeMap<ServerId, T>,
    warnings: impl Fn(&T) -> Vec<String>,
    stable: &str,
) -> ImpactReport {
    let issues: BTreeMap<ServerId, Vec<String>> = conditions
        .iter()
        .filter_map(|(id, condition)| {
            let found = warnings(condition);
            (!found.is_empty()).then(|| (id.clone(), found))
        })
        .collect();

    if issues.is_empty() {
        ImpactReport::summary(stable)
    } else {
        ImpactReport::Issues(issues)
    }
}

impl EnvironmentState {
    pub fn analyze_network_impact(&self) -> ImpactReport {
        collect_report(self.network_conditions(), network_warnings, NETWORK_STABLE)
    }

    pub fn analyze_environmental_impact(&self) -> ImpactReport {
        collect_report(
            self.environment_conditions(),
            environment_warnings,
            ENVIRONMENT_STABLE,
        )
    }
}
