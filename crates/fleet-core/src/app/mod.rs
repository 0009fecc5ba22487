//! App - アプリケーション層
//!
//! ports を組み合わせてサイクルを実行します。
//!
//! # 主要コンポーネント
//! - **FleetEngine**: 評価 → fatigue → 記録 の 1 サイクル
//! - **EngineConfig**: `FLEET_*` 環境変数による設定
//! - **TrendReport**: 履歴の傾向分析（意思決定には使わない）

pub mod config;
pub mod engine;
pub mod trends;

// 主要な型を再エクスポート
pub use self::config::{ConfigError, EngineConfig};
pub use self::engine::{CycleOutcome, FleetEngine};
pub use self::trends::TrendReport;
