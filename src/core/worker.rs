//! # Worker Module / 工作进程模块
//!
//! A unit of work is described by a [`Job`] that a fresh worker process can
//! rebuild from the registry. [`SelfExec`] starts such a worker by
//! re-executing the current binary with the hidden `worker` subcommand, and
//! [`run_worker`] is what that subcommand runs.
//!
//! 工作单元由 [`Job`] 描述，新的工作进程可以根据注册表重建它。
//! [`SelfExec`] 通过以隐藏的 `worker` 子命令重新执行当前二进制文件来启动工作进程，
//! [`run_worker`] 即该子命令的执行内容。

use std::any::Any;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tokio::task::JoinError;
use tracing::{debug, error};

use crate::core::channel::{write_envelope, Payload};
use crate::core::config::BenchConfig;
use crate::core::harness::WorkerLauncher;
use crate::core::models::{Test, WorkerError};
use crate::core::registry::{Operation, OperationContext, Registry, VersionProbe};
use crate::core::tools::command::{probe_version, run_operation};

/// Exit code of a worker that could not write its result channel.
pub const CHANNEL_WRITE_FAILED: i32 = 2;

/// One unit of work. / 一个工作单元。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Ask a tool for its version. / 查询工具版本。
    Probe { tool: String },
    /// Run one operation of one tool on one input file.
    /// 在一个输入文件上运行某工具的一项操作。
    Operation { test: Test, tool: String, path: PathBuf },
}

impl Job {
    pub fn tool(&self) -> &str {
        match self {
            Job::Probe { tool } | Job::Operation { tool, .. } => tool,
        }
    }

    pub fn label(&self) -> String {
        match self {
            Job::Probe { tool } => format!("version probe of {tool}"),
            Job::Operation { test, tool, path } => format!("{test} {tool} {}", path.display()),
        }
    }

    /// Arguments of the `worker` subcommand describing this job.
    pub fn to_args(&self) -> Vec<OsString> {
        match self {
            Job::Probe { tool } => vec!["--tool".into(), tool.into()],
            Job::Operation { test, tool, path } => vec![
                "--tool".into(),
                tool.into(),
                "--test".into(),
                test.as_str().into(),
                "--path".into(),
                path.into(),
            ],
        }
    }
}

/// Starts workers by re-executing the `pdfperf` binary.
/// 通过重新执行 `pdfperf` 二进制文件启动工作进程。
#[derive(Debug, Clone)]
pub struct SelfExec {
    exe: PathBuf,
    config: PathBuf,
    job: Job,
}

impl SelfExec {
    pub fn new(exe: &Path, config: &Path, job: Job) -> Self {
        Self {
            exe: exe.to_path_buf(),
            config: config.to_path_buf(),
            job,
        }
    }

    pub fn job(&self) -> &Job {
        &self.job
    }
}

impl WorkerLauncher for SelfExec {
    fn label(&self) -> String {
        self.job.label()
    }

    fn command(&self, channel: &Path) -> Command {
        let mut cmd = Command::new(&self.exe);
        cmd.arg("worker")
            .arg("--config")
            .arg(&self.config)
            .arg("--channel")
            .arg(channel)
            .args(self.job.to_args());
        cmd
    }
}

/// Runs `job` and writes its outcome to `channel`.
///
/// Every failure of the job itself, including a panic, ends up in the
/// channel. The returned exit code is nonzero only when the channel could
/// not be written.
///
/// 运行 `job` 并将结果写入 `channel`。返回非零退出码仅表示通道无法写入。
pub async fn run_worker(config: &BenchConfig, job: Job, channel: &Path) -> i32 {
    debug!(job = %job.label(), channel = %channel.display(), "worker started");
    let result = execute(config, job).await;
    finish(channel, result)
}

/// Writes `result` to `channel` and returns the worker's exit code.
pub fn finish(channel: &Path, result: Result<serde_json::Value, WorkerError>) -> i32 {
    match write_envelope(channel, Payload::from(result)) {
        Ok(()) => 0,
        Err(e) => {
            error!(channel = %channel.display(), error = %e, "failed to write result channel");
            CHANNEL_WRITE_FAILED
        }
    }
}

async fn execute(config: &BenchConfig, job: Job) -> Result<serde_json::Value, WorkerError> {
    let registry = Registry::from_config(config).map_err(|e| WorkerError::new("config", format!("{e:#}")))?;
    run_job(&registry, config, job).await
}

/// Runs `job` from `registry` on its own task, capturing a panic as an
/// error of kind `panic`.
pub async fn run_job(registry: &Registry, config: &BenchConfig, job: Job) -> Result<serde_json::Value, WorkerError> {
    let Some(entry) = registry.tool(job.tool()) else {
        return Err(WorkerError::new("registry", format!("unknown tool `{}`", job.tool())));
    };

    let handle = match job {
        Job::Probe { .. } => match entry.probe().clone() {
            VersionProbe::Builtin(probe) => tokio::task::spawn_blocking(probe),
            VersionProbe::Command(template) => tokio::spawn(async move { probe_version(&template).await }),
        },
        Job::Operation { test, tool, path } => {
            let Some(operation) = entry.operation(test).cloned() else {
                return Err(WorkerError::new(
                    "registry",
                    format!("tool `{tool}` does not implement `{test}`"),
                ));
            };
            let ctx = OperationContext::new(test, &tool, &path, &config.artifacts_dir());
            match operation {
                Operation::Builtin(op) => tokio::task::spawn_blocking(move || op(&ctx)),
                Operation::Command(template) => {
                    tokio::spawn(async move { run_operation(&template, &ctx).await })
                }
            }
        }
    };

    handle.await.unwrap_or_else(|e| Err(join_error(e)))
}

fn join_error(e: JoinError) -> WorkerError {
    if e.is_panic() {
        WorkerError::new("panic", panic_message(e.into_panic()))
    } else {
        WorkerError::new("cancelled", e.to_string())
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::channel::decode_envelope;
    use serde_json::json;

    fn read(channel: &Path) -> Payload {
        decode_envelope(&std::fs::read(channel).unwrap()).unwrap()
    }

    #[test]
    fn job_arguments_describe_the_unit() {
        let job = Job::Operation {
            test: Test::Text,
            tool: "lopdf".into(),
            path: PathBuf::from("/corpus/a.pdf"),
        };
        let args: Vec<String> = job
            .to_args()
            .into_iter()
            .map(|a| a.into_string().unwrap())
            .collect();
        assert_eq!(args, ["--tool", "lopdf", "--test", "text", "--path", "/corpus/a.pdf"]);
        assert_eq!(job.label(), "text lopdf /corpus/a.pdf");
    }

    #[tokio::test]
    async fn builtin_probe_writes_a_value() {
        let dir = tempfile::tempdir().unwrap();
        let channel = dir.path().join("result.json");
        let code = run_worker(&BenchConfig::default(), Job::Probe { tool: "lopdf".into() }, &channel).await;
        assert_eq!(code, 0);
        match read(&channel) {
            Payload::Ok(value) => assert_eq!(value["crate"], json!("lopdf")),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failures_are_written_as_errors() {
        let dir = tempfile::tempdir().unwrap();
        let channel = dir.path().join("result.json");
        let job = Job::Operation {
            test: Test::Render,
            tool: "lopdf".into(),
            path: PathBuf::from("a.pdf"),
        };
        assert_eq!(run_worker(&BenchConfig::default(), job, &channel).await, 0);
        match read(&channel) {
            Payload::Error(error) => assert_eq!(error.kind, "registry"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unwritable_channel_fails_the_worker() {
        let code = run_worker(
            &BenchConfig::default(),
            Job::Probe { tool: "lopdf".into() },
            Path::new("/no/such/dir/result.json"),
        )
        .await;
        assert_eq!(code, CHANNEL_WRITE_FAILED);
    }

    fn explode(_ctx: &OperationContext) -> Result<serde_json::Value, WorkerError> {
        panic!("page tree is cyclic")
    }

    fn explode_version() -> Result<serde_json::Value, WorkerError> {
        panic!("{}", String::from("version table missing"))
    }

    fn exploding_registry() -> Registry {
        let mut registry = Registry::new();
        registry
            .register_tool("exploding", VersionProbe::Builtin(explode_version))
            .unwrap();
        registry
            .register("exploding", Test::Copy, Operation::Builtin(explode))
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn panicking_operation_is_written_as_a_panic_error() {
        let dir = tempfile::tempdir().unwrap();
        let channel = dir.path().join("result.json");
        let config = BenchConfig {
            base_dir: dir.path().to_path_buf(),
            ..BenchConfig::default()
        };
        let job = Job::Operation {
            test: Test::Copy,
            tool: "exploding".into(),
            path: dir.path().join("a.pdf"),
        };

        let result = run_job(&exploding_registry(), &config, job).await;
        assert_eq!(finish(&channel, result), 0);
        match read(&channel) {
            Payload::Error(error) => {
                assert_eq!(error.kind, "panic");
                assert_eq!(error.message, "page tree is cyclic");
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_version_check_is_a_panic_error() {
        let result = run_job(
            &exploding_registry(),
            &BenchConfig::default(),
            Job::Probe { tool: "exploding".into() },
        )
        .await;
        let error = result.unwrap_err();
        assert_eq!(error.kind, "panic");
        assert_eq!(error.message, "version table missing");
    }

    #[test]
    fn panic_payloads_become_messages() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7)), "unknown panic payload");
    }
}
