//! # Data Models Module / 数据模型模块
//!
//! This module defines the core data structures used throughout pdfperf:
//! the benchmark operations, the outcome record produced by the harness and
//! the entries of the JSON report.
//!
//! 此模块定义了 pdfperf 中使用的核心数据结构：
//! 基准操作、执行框架生成的结果记录以及 JSON 报告条目。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::infra::t;

/// The standardized operations timed for each tool.
/// 为每个工具计时的标准化操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Test {
    /// Open the document and save a copy of it.
    /// 打开文档并另存一份副本。
    Copy,
    /// Rasterize every page to an image.
    /// 将每一页栅格化为图像。
    Render,
    /// Extract the text of every page.
    /// 提取每一页的文本。
    Text,
}

impl Test {
    pub const ALL: [Test; 3] = [Test::Copy, Test::Render, Test::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Test::Copy => "copy",
            Test::Render => "render",
            Test::Text => "text",
        }
    }
}

impl fmt::Display for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Test {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Test::ALL
            .into_iter()
            .find(|test| test.as_str() == s)
            .ok_or_else(|| anyhow::anyhow!(t!("config.unknown_test", name = s).to_string()))
    }
}

/// An error raised by a unit of work and captured inside the worker.
/// 工作单元抛出并在工作进程内捕获的错误。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerError {
    /// The error's type, e.g. `"pdf"`, `"io"`, `"command"` or `"panic"`.
    /// 错误的类型，例如 `"pdf"`、`"io"`、`"command"` 或 `"panic"`。
    pub kind: String,
    /// Human-readable message. / 可读的错误消息。
    pub message: String,
}

impl WorkerError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for WorkerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for WorkerError {}

/// Classifies how a single harness invocation ended.
/// 对单次执行框架调用的结束方式进行分类。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The unit of work returned a value. / 工作单元返回了一个值。
    Success,
    /// The unit of work ran to completion but raised an error.
    /// 工作单元运行完毕但抛出了错误。
    ApplicationError,
    /// The worker did not finish within the timeout and was reclaimed.
    /// 工作进程未在超时时间内完成，已被回收。
    Timeout,
    /// The worker exited abnormally. / 工作进程异常退出。
    WorkerFailure,
    /// The worker exited cleanly but its result channel could not be decoded.
    /// 工作进程正常退出，但其结果通道无法解码。
    DeserializeError,
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, OutcomeStatus::Success)
    }

    /// Gets the status as a localized string for display.
    /// 以本地化字符串形式获取状态以供显示。
    pub fn label(&self, locale: &str) -> String {
        match self {
            OutcomeStatus::Success => t!("report.status_success", locale = locale),
            OutcomeStatus::ApplicationError => t!("report.status_application_error", locale = locale),
            OutcomeStatus::Timeout => t!("report.status_timeout", locale = locale),
            OutcomeStatus::WorkerFailure => t!("report.status_worker_failure", locale = locale),
            OutcomeStatus::DeserializeError => t!("report.status_deserialize_error", locale = locale),
        }
        .to_string()
    }
}

/// The summary string reported for every timed-out invocation.
pub const TIMEOUT_SUMMARY: &str = "Timeout";

/// How the worker process ended when it did not exit with code 0.
/// 工作进程未以退出码 0 结束时的结束方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerExit {
    /// Exited with this nonzero code. / 以该非零退出码退出。
    Code(i32),
    /// Killed by this signal (unix only). / 被该信号终止（仅 unix）。
    Signal(i32),
}

impl WorkerExit {
    /// The numeric code recorded in reports. Signals are reported negated,
    /// so a worker killed by SIGKILL is recorded as `-9`.
    pub fn report_code(&self) -> i32 {
        match self {
            WorkerExit::Code(code) => *code,
            WorkerExit::Signal(signal) => -signal,
        }
    }
}

impl fmt::Display for WorkerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerExit::Code(code) => write!(f, "worker process failed with exit code {code}"),
            WorkerExit::Signal(signal) => write!(f, "worker process was terminated by signal {signal}"),
        }
    }
}

/// The result of one harness invocation.
///
/// Built only through the constructors below so that `error_summary` is
/// `None` exactly when `status` is [`OutcomeStatus::Success`].
///
/// 单次执行框架调用的结果。
/// 只能通过下面的构造函数创建，保证仅当 `status` 为成功时 `error_summary` 为 `None`。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    /// Wall-clock time from spawn to reap. / 从派生到回收的墙钟时间。
    pub elapsed: Duration,
    status: OutcomeStatus,
    value: Option<Value>,
    error: Option<WorkerError>,
    exit: Option<WorkerExit>,
    error_summary: Option<String>,
}

impl Outcome {
    pub fn success(elapsed: Duration, value: Value) -> Self {
        Self {
            elapsed,
            status: OutcomeStatus::Success,
            value: Some(value),
            error: None,
            exit: None,
            error_summary: None,
        }
    }

    pub fn application_error(elapsed: Duration, error: WorkerError) -> Self {
        Self {
            elapsed,
            status: OutcomeStatus::ApplicationError,
            value: None,
            error_summary: Some(error.to_string()),
            error: Some(error),
            exit: None,
        }
    }

    pub fn timeout(elapsed: Duration) -> Self {
        Self {
            elapsed,
            status: OutcomeStatus::Timeout,
            value: None,
            error: None,
            exit: None,
            error_summary: Some(TIMEOUT_SUMMARY.to_string()),
        }
    }

    pub fn worker_failure(elapsed: Duration, exit: WorkerExit) -> Self {
        Self {
            elapsed,
            status: OutcomeStatus::WorkerFailure,
            value: None,
            error: None,
            error_summary: Some(exit.to_string()),
            exit: Some(exit),
        }
    }

    pub fn deserialize_error(elapsed: Duration, detail: impl fmt::Display) -> Self {
        Self {
            elapsed,
            status: OutcomeStatus::DeserializeError,
            value: None,
            error: None,
            exit: None,
            error_summary: Some(format!("failed to read worker result: {detail}")),
        }
    }

    pub fn status(&self) -> OutcomeStatus {
        self.status
    }

    /// The unit of work's return value; only present on success.
    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Consumes the outcome, returning the value on success.
    pub fn into_value(self) -> Option<Value> {
        self.value
    }

    /// The error captured inside the worker, for application errors.
    pub fn error(&self) -> Option<&WorkerError> {
        self.error.as_ref()
    }

    pub fn exit(&self) -> Option<WorkerExit> {
        self.exit
    }

    /// `None` is the no-error sentinel.
    pub fn error_summary(&self) -> Option<&str> {
        self.error_summary.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Converts the outcome into the `e` field of a report entry.
    pub fn report_error(&self) -> ReportError {
        match self.status {
            OutcomeStatus::Success => ReportError::success(),
            OutcomeStatus::Timeout => ReportError(None),
            OutcomeStatus::WorkerFailure => ReportError(Some(ErrorCode::Code(
                self.exit.map(|e| e.report_code()).unwrap_or(-1),
            ))),
            OutcomeStatus::ApplicationError | OutcomeStatus::DeserializeError => ReportError(Some(
                ErrorCode::Message(self.error_summary.clone().unwrap_or_default()),
            )),
        }
    }
}

/// The non-null forms of the report's `e` field.
/// 报告中 `e` 字段的非空形式。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorCode {
    /// `0` on success, the worker's exit code on worker failure.
    Code(i32),
    /// A description on application or deserialization failure.
    Message(String),
}

/// The report's `e` field: `0` on success, `null` on timeout, a nonzero code
/// on worker failure, a string otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReportError(pub Option<ErrorCode>);

impl ReportError {
    pub fn success() -> Self {
        ReportError(Some(ErrorCode::Code(0)))
    }

    pub fn is_success(&self) -> bool {
        matches!(self.0, Some(ErrorCode::Code(0)))
    }
}

/// One timed test run in the JSON report.
/// JSON 报告中的一次计时测试运行。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub testname: Test,
    /// Path of the input file, relative to the corpus root where possible.
    pub path: String,
    pub toolname: String,
    /// Elapsed seconds. / 耗时（秒）。
    pub t: f64,
    pub e: ReportError,
}

/// Date metadata of a report. / 报告的日期元数据。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDate {
    /// Seconds since the unix epoch. / 自 unix 纪元以来的秒数。
    pub seconds: f64,
    /// `YYYY-MM-DD-HH-MM` in UTC.
    pub string: String,
}

impl ReportDate {
    /// The current time, truncated to the minute in `string`.
    pub fn now() -> Self {
        Self::from_datetime(chrono::Utc::now())
    }

    pub fn from_datetime(at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            seconds: at.timestamp_millis() as f64 / 1000.0,
            string: at.format("%Y-%m-%d-%H-%M").to_string(),
        }
    }
}

/// A report entry together with how its invocation ended, for summaries.
/// 报告条目及其调用的结束方式，用于摘要显示。
#[derive(Debug, Clone, PartialEq)]
pub struct CellResult {
    pub entry: ReportEntry,
    pub status: OutcomeStatus,
    /// `None` on success. / 成功时为 `None`。
    pub summary: Option<String>,
}

impl CellResult {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// The complete JSON report of a benchmark run.
/// 一次基准测试运行的完整 JSON 报告。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub data: Vec<ReportEntry>,
    pub toolversions: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<ReportDate>,
}

impl Report {
    pub fn new(date: Option<ReportDate>) -> Self {
        Self {
            data: Vec::new(),
            toolversions: BTreeMap::new(),
            platform: None,
            date,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &ReportEntry> {
        self.data.iter().filter(|entry| !entry.e.is_success())
    }
}
