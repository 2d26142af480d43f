//! # pdfperf Library / pdfperf 库
//!
//! This library provides the core functionality for pdfperf, a benchmark
//! harness that times PDF libraries and command-line PDF tools against a
//! corpus of sample files. Every timed operation runs in its own worker
//! process under a wall-clock timeout.
//!
//! 此库为 pdfperf 提供核心功能。pdfperf 是一个基准测试工具，
//! 针对一组示例 PDF 文件对 PDF 库和命令行工具进行计时。
//! 每个计时操作都在独立的工作进程中运行，并受墙钟超时限制。
//!
//! ## Modules / 模块
//!
//! - `core` - Data models, the isolated execution harness, registry and matrix loop
//! - `infra` - Infrastructure services like command capture, file system and platform probes
//! - `reporting` - JSON/CSV/HTML reports, console summaries and result publishing
//! - `cli` - Command-line interface and commands
//!
//! - `core` - 数据模型、隔离执行框架、注册表和矩阵循环
//! - `infra` - 基础设施服务，如命令输出捕获、文件系统和平台信息
//! - `reporting` - JSON/CSV/HTML 报告、控制台摘要和结果发布
//! - `cli` - 命令行接口和命令

pub mod cli;
pub mod core;
pub mod infra;
pub mod reporting;

// Re-export commonly used items
pub use self::core::config;
pub use self::core::harness;
pub use self::core::models;

/// Initializes the application's internationalization (i18n) based on the system locale.
///
/// It attempts to match the full locale (e.g., "zh-CN"), then just the
/// language code (e.g., "en"), and finally falls back to "en".
pub fn init() {
    let locale = sys_locale::get_locale().unwrap_or_else(|| "en".to_string());
    set_language(&locale);
}

/// Sets the active language, falling back the same way [`init`] does.
pub fn set_language(locale: &str) {
    let available_locales = rust_i18n::available_locales!();

    let lang = if available_locales.contains(&locale) {
        locale
    } else {
        locale
            .split('-')
            .next()
            .filter(|lang_code| available_locales.contains(lang_code))
            .unwrap_or("en")
    };

    rust_i18n::set_locale(lang);
}

// Initialize i18n
rust_i18n::i18n!("locales", fallback = "en");
