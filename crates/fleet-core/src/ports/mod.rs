//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（履歴ファイル、分析サービス、時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。
//!
//! # 設計原則
//! - 履歴（HistoryStore）がクロスラン記憶の正本
//! - 乱数源は Decider の引数として注入（テストで seed 固定）
//! - 分析テキストは不透明なペイロード

pub mod analyst;
pub mod clock;
pub mod decider;
pub mod history_store;

pub use self::analyst::{AnalysisRequest, AnalystError, FailureAnalyst};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::decider::{Decider, Decision, DecisionRule, Thresholds};
pub use self::history_store::{HistoryStore, TallyStore};
