//! docshift-core
//!
//! Asynchronous document conversion: a submitted file becomes a job, a worker
//! converts it through a remote service, and the caller polls for a signed
//! result URL.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, job request, outcome, errors）
//! - **ports**: 抽象化レイヤー（ObjectStore, Converter, KeyGenerator, Clock）
//! - **queue**: ジョブ状態機械と in-memory キュー / result back-end
//! - **app**: pipeline, worker pool, service, status, retention, builder
//! - **impls**: 実装（InMemory / Local ストア, Unoserver converter, URL signer）
//! - **config**: figment による設定読み込みと検証
//! - **testing**: ports の fake 実装（テスト用）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod testing;
