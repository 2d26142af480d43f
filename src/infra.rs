//! # Infrastructure Module / 基础设施模块
//!
//! This module provides infrastructure services for pdfperf,
//! including command output capture, file system helpers, platform
//! probes and i18n support.
//!
//! 此模块为 pdfperf 提供基础设施服务，
//! 包括命令输出捕获、文件系统辅助、平台信息探测和国际化支持。

pub mod command;
pub mod fs;
pub mod platform;

// Re-export i18n functions for easier access
pub use rust_i18n::t;
