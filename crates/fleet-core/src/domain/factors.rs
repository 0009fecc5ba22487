//! Per-server observations: environment, network, and the combined snapshot
//! the policy evaluates.
//!
//! Missing fields take the documented defaults, so a partially filled input
//! entry still deserializes.

use serde::{Deserialize, Serialize};

use super::ids::ServerId;
use super::server::Server;

pub const DEFAULT_TEMPERATURE: f64 = 50.0;
pub const DEFAULT_HUMIDITY: f64 = 50.0;
pub const DEFAULT_COOLING_EFFICIENCY: f64 = 80.0;
pub const DEFAULT_LATENCY_MS: f64 = 100.0;
pub const DEFAULT_PACKET_LOSS: f64 = 5.0;
pub const DEFAULT_DEMAND: f64 = 100.0;

/// Power supply condition reported for a server's site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerStability {
    #[default]
    Stable,
    Unstable,
    #[serde(rename = "critical, failed", alias = "critical-failed", alias = "critical_failed")]
    CriticalFailed,
    /// Anything the data source sends that we do not recognize.
    #[serde(other)]
    Unknown,
}

impl PowerStability {
    /// Unstable or failed power (raises the sell threshold, triggers a warning).
    pub fn is_degraded(self) -> bool {
        matches!(self, PowerStability::Unstable | PowerStability::CriticalFailed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PowerStability::Stable => "stable",
            PowerStability::Unstable => "unstable",
            PowerStability::CriticalFailed => "critical, failed",
            PowerStability::Unknown => "unknown",
        }
    }
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

fn default_humidity() -> f64 {
    DEFAULT_HUMIDITY
}

fn default_cooling_efficiency() -> f64 {
    DEFAULT_COOLING_EFFICIENCY
}

fn default_latency() -> f64 {
    DEFAULT_LATENCY_MS
}

fn default_packet_loss() -> f64 {
    DEFAULT_PACKET_LOSS
}

/// Environmental conditions around a server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentFactor {
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    #[serde(default = "default_humidity")]
    pub humidity: f64,

    #[serde(default)]
    pub power_stability: PowerStability,

    /// Percent.
    #[serde(default = "default_cooling_efficiency")]
    pub cooling_efficiency: f64,
}

impl Default for EnvironmentFactor {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            humidity: DEFAULT_HUMIDITY,
            power_stability: PowerStability::Stable,
            cooling_efficiency: DEFAULT_COOLING_EFFICIENCY,
        }
    }
}

/// Network health over the trailing window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkFactor {
    #[serde(default = "default_latency")]
    pub latency: f64,

    #[serde(default = "default_packet_loss")]
    pub packet_loss: f64,

    #[serde(default, rename = "network_outages")]
    pub outage_count: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth_usage: Option<f64>,
}

impl Default for NetworkFactor {
    fn default() -> Self {
        Self {
            latency: DEFAULT_LATENCY_MS,
            packet_loss: DEFAULT_PACKET_LOSS,
            outage_count: 0,
            bandwidth_usage: None,
        }
    }
}

/// Everything the policy needs for one server, read once per evaluation.
///
/// The environment factor here already carries its read-time jitter; every
/// rule of one evaluation sees the same values.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerSnapshot {
    pub server_id: ServerId,
    pub server: Server,
    pub environment: EnvironmentFactor,
    pub network: NetworkFactor,
    pub failure_rate: f64,
    pub demand: f64,
}
