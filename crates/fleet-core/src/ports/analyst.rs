//! FailureAnalyst port - 外部の故障分析サービス
//!
//! 分析結果は不透明なテキスト（AnalysisText）として扱い、
//! 意思決定ロジックでは一切パースしません。
//!
//! # 実装
//! - StaticAnalyst: 固定テキスト
//! - FileAnalyst: 外部サービスが書き出したレポートを読む
//! - RetryingAnalyst: RateLimited をバックオフ付きでリトライ

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{AnalysisText, EnvironmentFactor, NetworkFactor, ServerId};

/// Outcomes kept per server in an analysis request.
pub const ANALYSIS_FAILURE_WINDOW: usize = 10;

/// What the external analyst gets to look at.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisRequest {
    /// Last ≤10 outcomes per server, chronological.
    pub failure_logs: BTreeMap<ServerId, Vec<bool>>,
    pub network_conditions: BTreeMap<ServerId, NetworkFactor>,
    pub environment_conditions: BTreeMap<ServerId, EnvironmentFactor>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalystError {
    #[error("rate limited")]
    RateLimited,

    #[error("analysis service unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait FailureAnalyst: Send + Sync {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisText, AnalystError>;
}
