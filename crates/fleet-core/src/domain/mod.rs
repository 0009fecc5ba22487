//! Domain model (ids, servers, factors, actions, records, errors).

pub mod action;
pub mod errors;
pub mod factors;
pub mod ids;
pub mod record;
pub mod server;

pub use action::{Action, ActionCounts, ActionSet, ActionTally};
pub use errors::{FleetError, InputKind, PolicyError};
pub use factors::{EnvironmentFactor, NetworkFactor, PowerStability, ServerSnapshot};
pub use ids::{CycleId, ServerId};
pub use record::{AnalysisText, CycleRecord, ImpactReport, TIMESTAMP_FORMAT};
pub use server::{Fleet, Server, ServerEntry};
