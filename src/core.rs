//! # Core Module / 核心模块
//!
//! This module contains the core functionality of pdfperf: data models,
//! configuration, the isolated timed execution harness, the tool registry,
//! planning and the sequential matrix loop.
//!
//! 此模块包含 pdfperf 的核心功能：数据模型、配置、隔离计时执行框架、
//! 工具注册表、执行计划和顺序矩阵循环。

pub mod channel;
pub mod config;
pub mod execution;
pub mod harness;
pub mod models;
pub mod planner;
pub mod registry;
pub mod tools;
pub mod worker;

// Re-exports
pub use config::BenchConfig;
pub use harness::{Harness, HarnessError, WorkerLauncher};
pub use models::{Outcome, OutcomeStatus, Test};
