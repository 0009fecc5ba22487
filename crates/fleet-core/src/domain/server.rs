//! Server attributes as supplied by the external data source.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::PolicyError;
use super::ids::ServerId;

/// Static attributes of one server for the duration of a cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    /// In [0, 1].
    pub reliability: f64,

    pub cost: f64,

    /// Baseline latency in ms.
    pub latency: f64,
}

impl Server {
    pub fn new(reliability: f64, cost: f64, latency: f64) -> Self {
        Self {
            reliability,
            cost,
            latency,
        }
    }
}

/// One server entry as read from the demand source.
///
/// Every field may be absent or unusable; the entry is only turned into a
/// `Server` when that server is evaluated, so a bad entry affects no other
/// server. `server_id` inside the entry is ignored, the map key is
/// authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerEntry {
    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub reliability: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,

    #[serde(default, deserialize_with = "lenient_number", skip_serializing_if = "Option::is_none")]
    pub latency: Option<f64>,
}

impl ServerEntry {
    /// Entry from an arbitrary JSON value; anything but an object is empty.
    pub fn from_value(value: Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// The complete server, or the first field that is missing.
    pub fn resolve(&self, id: &ServerId) -> Result<Server, PolicyError> {
        let field = |name: &'static str, value: Option<f64>| {
            value.ok_or_else(|| PolicyError::MissingField {
                server: id.clone(),
                field: name,
            })
        };
        Ok(Server {
            reliability: field("reliability", self.reliability)?,
            cost: field("cost", self.cost)?,
            latency: field("latency", self.latency)?,
        })
    }
}

impl From<Server> for ServerEntry {
    fn from(server: Server) -> Self {
        Self {
            reliability: Some(server.reliability),
            cost: Some(server.cost),
            latency: Some(server.latency),
        }
    }
}

/// Numbers and numeric strings; anything else reads as absent.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// The full fleet, keyed by server id.
pub type Fleet = BTreeMap<ServerId, ServerEntry>;
