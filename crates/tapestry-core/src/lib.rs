//! tapestry-core
//!
//! Execution-result tracking: a typed tree recording how nested units of work
//! (commands, tasks, actions, ...) turned out, plus lightweight status logs.
//!
//! # モジュール構成
//! - **domain**: ResultStatus, ResultType, ResultNode, ids, errors
//! - **tree**: ResultTree（アリーナ、状態遷移、集約、走査）
//! - **render**: RenderedNode / NodeSummary（レンダラー向けのビュー）
//! - **trackers**: TaskStatus, GeneratorStatus
//! - **runner**: UnitOfWork の実行と fan-out/fan-in
//! - **ports**: Clock, StatusObserver
//! - **config**: TapestryConfig

pub mod config;
pub mod domain;
pub mod ports;
pub mod render;
pub mod runner;
pub mod trackers;
pub mod tree;

pub use config::{ConfigError, TapestryConfig};
pub use domain::{
    ErrorObject, NodeId, ResultNode, ResultStatus, ResultType, StatusOverride, TrackingError,
    TreeId,
};
pub use render::{NodeSummary, RenderOptions, RenderedNode};
pub use runner::{Completion, UnitOfWork, run_concurrent, run_unit};
pub use trackers::{GeneratorStatus, TaskStatus};
pub use tree::ResultTree;
