//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **InMemoryHistoryStore / InMemoryTallyStore**: テスト・組み込み用
//! - **JsonFileHistoryStore / JsonFileTallyStore**: JSON 配列ファイル（本番用）
//! - **StaticAnalyst / FileAnalyst / RetryingAnalyst**: FailureAnalyst の実装
//! - **RetryPolicy**: レート制限時の指数バックオフ

pub mod analyst;
pub mod inmem_history;
pub mod json_history;
pub mod retry;

// 主要な型を再エクスポート
pub use self::analyst::{FileAnalyst, RetryingAnalyst, StaticAnalyst};
pub use self::inmem_history::{InMemoryHistoryStore, InMemoryTallyStore};
pub use self::json_history::{JsonFileHistoryStore, JsonFileTallyStore};
pub use self::retry::RetryPolicy;
