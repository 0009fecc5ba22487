//! fleet-core
//!
//! Per-cycle buy / sell / hold decisions for a server fleet.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, server, factors, action, record, errors）
//! - **ports**: 抽象化レイヤー（Decider, HistoryStore, TallyStore, FailureAnalyst, Clock）
//! - **environment**: 入力の読み込みと、サーバーごとの要因の導出
//! - **policy**: 閾値ポリシー、クールダウン表、fatigue
//! - **impls**: ports の実装（インメモリ、JSON ファイル、分析サービス）
//! - **app**: サイクル実行（FleetEngine）、設定、傾向分析

pub mod app;
pub mod domain;
pub mod environment;
pub mod impls;
pub mod policy;
pub mod ports;
