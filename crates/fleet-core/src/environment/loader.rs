//! Input loading for the environment state.
//!
//! Each of the four sources may come in one of two shapes:
//!
//! - keyed by server id (`{"s1": {...}}`),
//! - keyed by time step (`{"time_steps": {"0": {...}}}` for network and
//!   environment, `{"1": {"s1": ...}}` for demand and failures).
//!
//! Time-step data is folded into per-server values: demand takes the latest
//! step, failures become a chronological history, and the latest network /
//! environment step applies to every server in the fleet.
//!
//! A missing file is not an error; it is logged and the defaults apply.
//! Server entries are read leniently: an entry with missing or unusable
//! fields is kept as is and only rejected when that server is evaluated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::EnvironmentState;
use crate::domain::{
    EnvironmentFactor, Fleet, FleetError, InputKind, NetworkFactor, ServerEntry, ServerId,
};

pub const DEMAND_FILE: &str = "dynamic_demand.json";
pub const NETWORK_FILE: &str = "dynamic_network_logs.json";
pub const ENVIRONMENT_FILE: &str = "dynamic_environment_logs.json";
pub const FAILURE_FILE: &str = "dynamic_failure_logs.json";

/// Locations of the four input sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    pub demand: PathBuf,
    pub network: PathBuf,
    pub environment: PathBuf,
    pub failures: PathBuf,
}

impl DataPaths {
    /// Standard file names under `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            demand: dir.join(DEMAND_FILE),
            network: dir.join(NETWORK_FILE),
            environment: dir.join(ENVIRONMENT_FILE),
            failures: dir.join(FAILURE_FILE),
        }
    }
}

/// Loaded state plus the inputs that fell back to defaults.
#[derive(Debug, Clone)]
pub struct LoadedEnvironment {
    pub state: EnvironmentState,
    pub missing: Vec<InputKind>,
}

/// Read all four sources.
///
/// Missing files become defaults; unreadable or unparseable files are fatal.
pub async fn load_environment(paths: &DataPaths) -> Result<LoadedEnvironment, FleetError> {
    let mut missing = Vec::new();

    let demand = read_source(InputKind::Demand, &paths.demand, &mut missing).await?;
    let (servers, demand) = match demand {
        Some(bytes) => parse_demand(&bytes).map_err(|source| FleetError::InputParse {
            kind: InputKind::Demand,
            path: paths.demand.clone(),
            source,
        })?,
        None => (Fleet::new(), BTreeMap::new()),
    };

    let network = match read_source(InputKind::Network, &paths.network, &mut missing).await? {
        Some(bytes) => parse_conditions::<NetworkFactor>(&bytes, &servers).map_err(|source| {
            FleetError::InputParse {
                kind: InputKind::Network,
                path: paths.network.clone(),
                source,
            }
        })?,
        None => BTreeMap::new(),
    };

    let environment =
        match read_source(InputKind::Environment, &paths.environment, &mut missing).await? {
            Some(bytes) => parse_conditions::<EnvironmentFactor>(&bytes, &servers).map_err(
                |source| FleetError::InputParse {
                    kind: InputKind::Environment,
                    path: paths.environment.clone(),
                    source,
                },
            )?,
            None => BTreeMap::new(),
        };

    let failures = match read_source(InputKind::Failures, &paths.failures, &mut missing).await? {
        Some(bytes) => parse_failures(&bytes).map_err(|source| FleetError::InputParse {
            kind: InputKind::Failures,
            path: paths.failures.clone(),
            source,
        })?,
        None => BTreeMap::new(),
    };

    info!(
        servers = servers.len(),
        missing = missing.len(),
        "environment loaded"
    );

    let mut state = EnvironmentState::new(servers);
    for (id, value) in demand {
        state = state.with_demand(id, value);
    }
    for (id, factor) in network {
        state = state.with_network(id, factor);
    }
    for (id, factor) in environment {
        state = state.with_environment(id, factor);
    }
    for (id, history) in failures {
        state = state.with_failures(id, history);
    }

    Ok(LoadedEnvironment { state, missing })
}

async fn read_source(
    kind: InputKind,
    path: &Path,
    missing: &mut Vec<InputKind>,
) -> Result<Option<Vec<u8>>, FleetError> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let err = FleetError::MissingInputData {
                kind,
                path: path.to_path_buf(),
            };
            warn!(%err, "input missing");
            missing.push(kind);
            Ok(None)
        }
        Err(e) => Err(FleetError::io(path, e)),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DemandShape {
    PerServer(BTreeMap<ServerId, f64>),
    TimeSteps(BTreeMap<String, BTreeMap<ServerId, f64>>),
}

#[derive(Deserialize)]
struct DemandFile {
    #[serde(default)]
    servers: BTreeMap<ServerId, serde_json::Value>,

    #[serde(default)]
    server_demand: Option<DemandShape>,
}

/// Fleet and per-server demand from the demand source.
pub fn parse_demand(bytes: &[u8]) -> Result<(Fleet, BTreeMap<ServerId, f64>), serde_json::Error> {
    let file: DemandFile = serde_json::from_slice(bytes)?;
    let demand = match file.server_demand {
        None => BTreeMap::new(),
        Some(DemandShape::PerServer(demand)) => demand,
        Some(DemandShape::TimeSteps(steps)) => latest_step(steps).unwrap_or_default(),
    };
    let fleet = file
        .servers
        .into_iter()
        .map(|(id, entry)| (id, ServerEntry::from_value(entry)))
        .collect();
    Ok((fleet, demand))
}

#[derive(Deserialize)]
struct TimeSteps<T> {
    time_steps: BTreeMap<String, T>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConditionShape<T> {
    TimeSteps(TimeSteps<T>),
    PerServer(BTreeMap<ServerId, T>),
}

/// Network or environment conditions, resolved per server.
pub fn parse_conditions<T>(
    bytes: &[u8],
    fleet: &Fleet,
) -> Result<BTreeMap<ServerId, T>, serde_json::Error>
where
    T: DeserializeOwned + Clone,
{
    match serde_json::from_slice::<ConditionShape<T>>(bytes)? {
        ConditionShape::PerServer(conditions) => Ok(conditions),
        ConditionShape::TimeSteps(TimeSteps { time_steps }) => Ok(match latest_step(time_steps) {
            Some(latest) => fleet
                .keys()
                .map(|id| (id.clone(), latest.clone()))
                .collect(),
            None => BTreeMap::new(),
        }),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FailureShape {
    PerServer(BTreeMap<ServerId, Vec<bool>>),
    TimeSteps(BTreeMap<String, BTreeMap<ServerId, bool>>),
}

/// Chronological failure history per server.
pub fn parse_failures(bytes: &[u8]) -> Result<BTreeMap<ServerId, Vec<bool>>, serde_json::Error> {
    match serde_json::from_slice::<FailureShape>(bytes)? {
        FailureShape::PerServer(histories) => Ok(histories),
        FailureShape::TimeSteps(steps) => {
            let mut histories: BTreeMap<ServerId, Vec<bool>> = BTreeMap::new();
            for (_, flags) in ordered_steps(steps) {
                for (id, failed) in flags {
                    histories.entry(id).or_default().push(failed);
                }
            }
            Ok(histories)
        }
    }
}

/// Steps sorted numerically; non-numeric keys go first, by name.
fn ordered_steps<T>(steps: BTreeMap<String, T>) -> Vec<(String, T)> {
    let mut steps: Vec<(String, T)> = steps.into_iter().collect();
    steps.sort_by(|(a, _), (b, _)| step_key(a).cmp(&step_key(b)));
    steps
}

fn step_key(key: &str) -> (Option<u64>, &str) {
    (key.parse::<u64>().ok(), key)
}

fn latest_step<T>(steps: BTreeMap<String, T>) -> Option<T> {
    ordered_steps(steps).pop().map(|(_, value)| value)
}
