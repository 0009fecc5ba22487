//! Errors - エラー型と分類
//!
//! # 分類
//! - MissingInputData: 入力欠落。デフォルト値で回復（致命的ではない）
//! - MalformedHistory: 履歴が壊れている。空履歴として扱う（致命的ではない）
//! - PolicyError: 1 台分の評価失敗。その台は hold、サイクルは継続
//! - それ以外（出力先 I/O、入力の parse 失敗など）は致命的

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use super::ids::ServerId;

/// Which external input a loader was reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    Demand,
    Network,
    Environment,
    Failures,
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InputKind::Demand => "demand",
            InputKind::Network => "network",
            InputKind::Environment => "environment",
            InputKind::Failures => "failures",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum FleetError {
    /// Recovered locally with defaults; surfaced for logging only.
    #[error("{kind} input not found at {path}; using defaults")]
    MissingInputData { kind: InputKind, path: PathBuf },

    /// Recovered as empty history.
    #[error("history at {path} could not be parsed: {reason}")]
    MalformedHistory { path: PathBuf, reason: String },

    #[error("{kind} input at {path} could not be parsed: {source}")]
    InputParse {
        kind: InputKind,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl FleetError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FleetError::Io {
            path: path.into(),
            source,
        }
    }

    /// Errors the engine recovers from instead of aborting the cycle.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FleetError::MissingInputData { .. } | FleetError::MalformedHistory { .. }
        )
    }
}

/// Threshold evaluation failure for a single server.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("server {server}: {field} is not a finite number ({value})")]
    NonFinite {
        server: ServerId,
        field: &'static str,
        value: f64,
    },

    #[error("server {server}: {field} is missing or not a number")]
    MissingField {
        server: ServerId,
        field: &'static str,
    },
}

impl PolicyError {
    pub fn server(&self) -> &ServerId {
        match self {
            PolicyError::NonFinite { server, .. } | PolicyError::MissingField { server, .. } => {
                server
            }
        }
    }
}
