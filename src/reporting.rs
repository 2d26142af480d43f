//! # Reporting Module / 报告模块
//!
//! This module handles everything a benchmark run leaves behind: the JSON
//! report, the per-test CSV logs, an optional HTML page, colorful console
//! summaries and publishing to a results repository.
//!
//! 此模块处理基准测试运行留下的一切：JSON 报告、按测试划分的 CSV 日志、
//! 可选的 HTML 页面、彩色控制台摘要以及发布到结果仓库。

pub mod console;
pub mod csv;
pub mod html;
pub mod json;
pub mod publish;

// Re-export common reporting functions
pub use console::{print_failure_details, print_summary};
pub use html::generate_html_report;
pub use json::write_report;
pub use publish::publish_report;
