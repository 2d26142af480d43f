//! # Isolated Timed Execution Harness / 隔离计时执行框架
//!
//! Runs one unit of work in a freshly spawned worker process, bounds its
//! wall-clock duration, recovers its result through a [`ResultChannel`] and
//! classifies the outcome.
//!
//! 在新派生的工作进程中运行一个工作单元，限制其墙钟时间，
//! 通过 [`ResultChannel`] 取回结果并对结果进行分类。
//!
//! A worker that outlives its timeout is reclaimed with an escalation
//! ladder: graceful termination, wait, forced kill, wait. A worker that is
//! still alive after that is reported as [`HarnessError::Unreclaimable`],
//! the only error a caller is not expected to recover from.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::{Child, Command};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::channel::{Payload, ResultChannel};
use crate::core::models::{Outcome, WorkerExit};

/// Default time allowed for each step of the escalation ladder.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10);

/// Builds the worker process for one unit of work.
///
/// Implementations decide *what* runs; the harness decides *how long* and
/// owns the process lifecycle. The worker must write its result to
/// `channel` and exit with code 0.
///
/// 为一个工作单元构建工作进程。实现者决定运行什么；执行框架决定运行多久并管理进程生命周期。
pub trait WorkerLauncher {
    /// A name for the unit of work, used in logs and fatal errors.
    fn label(&self) -> String;

    /// The command that starts a worker writing its result to `channel`.
    fn command(&self, channel: &Path) -> Command;
}

/// Runs one unit of work and classifies how it ended.
///
/// [`Harness`] is the implementation used for real runs.
pub trait UnitRunner {
    fn run_unit<L>(&self, launcher: &L, timeout: Option<Duration>) -> impl Future<Output = Result<Outcome, HarnessError>>
    where
        L: WorkerLauncher + ?Sized;
}

/// Failures of the harness itself, as opposed to failures of the unit of
/// work, which are reported through [`Outcome`].
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to create result channel: {0}")]
    Channel(#[source] std::io::Error),
    #[error("failed to spawn worker for {unit}: {source}")]
    Spawn {
        unit: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for worker running {unit}: {source}")]
    Wait {
        unit: String,
        #[source]
        source: std::io::Error,
    },
    /// The run was cancelled while the worker was running; the worker has
    /// been reclaimed and its measurement discarded.
    #[error("cancelled while running {unit}")]
    Cancelled { unit: String },
    #[error("cannot terminate worker process {pid:?} running {unit}")]
    Unreclaimable { unit: String, pid: Option<u32> },
}

impl HarnessError {
    /// True for the condition that leaves a live process behind.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HarnessError::Unreclaimable { .. })
    }
}

/// How worker output streams are wired. / 工作进程输出流的连接方式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkerOutput {
    /// Workers share the harness's stdout and stderr.
    #[default]
    Inherit,
    /// Worker output is discarded.
    Discard,
}

/// Runs units of work in isolated worker processes.
/// 在隔离的工作进程中运行工作单元。
///
/// On unix every worker leads its own process group, so the tools it
/// starts are reclaimed together with it and a terminal's Ctrl-C reaches
/// only the harness.
#[derive(Debug, Clone)]
pub struct Harness {
    grace_period: Duration,
    output: WorkerOutput,
    cancel: Option<CancellationToken>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            output: WorkerOutput::default(),
            cancel: None,
        }
    }
}

enum Waited {
    Exited(std::io::Result<ExitStatus>),
    TimedOut,
    Cancelled,
}

impl Harness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the time allowed for each step of the escalation ladder.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn with_output(mut self, output: WorkerOutput) -> Self {
        self.output = output;
        self
    }

    /// Reclaims the running worker as soon as `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    /// Runs one unit of work in a new worker process.
    ///
    /// `timeout` of `None` waits for the worker indefinitely.
    ///
    /// # Errors
    /// Returns an error only when the harness cannot do its job: the channel
    /// or process cannot be created, the wait fails, the run is cancelled,
    /// or a timed-out worker survives the escalation ladder. Everything the
    /// unit of work does, including crashing, is reported through the
    /// returned [`Outcome`].
    pub async fn run<L>(&self, launcher: &L, timeout: Option<Duration>) -> Result<Outcome, HarnessError>
    where
        L: WorkerLauncher + ?Sized,
    {
        let unit = launcher.label();
        let channel = ResultChannel::create().map_err(HarnessError::Channel)?;

        let mut cmd = launcher.command(channel.path());
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);
        if self.output == WorkerOutput::Discard {
            cmd.stdout(Stdio::null()).stderr(Stdio::null());
        }

        let start_time = Instant::now();
        let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            unit: unit.clone(),
            source,
        })?;
        debug!(unit = %unit, pid = ?child.id(), ?timeout, "worker spawned");

        let waited = tokio::select! {
            waited = wait_until(&mut child, timeout) => waited,
            _ = cancelled(self.cancel.as_ref()) => Waited::Cancelled,
        };

        match waited {
            Waited::Exited(Ok(status)) => {
                let elapsed = start_time.elapsed();
                debug!(unit = %unit, %status, ?elapsed, "worker exited");
                Ok(classify_exit(status, channel, elapsed))
            }
            Waited::Exited(Err(source)) => Err(HarnessError::Wait { unit, source }),
            Waited::TimedOut => {
                warn!(unit = %unit, ?timeout, "worker timed out, reclaiming");
                self.reclaim(&mut child, &unit).await?;
                Ok(Outcome::timeout(start_time.elapsed()))
            }
            Waited::Cancelled => {
                debug!(unit = %unit, "run cancelled, reclaiming worker");
                self.reclaim(&mut child, &unit).await?;
                Err(HarnessError::Cancelled { unit })
            }
        }
    }

    /// Terminate, wait, kill, wait. Fails only if the worker outlives all of it.
    async fn reclaim(&self, child: &mut Child, unit: &str) -> Result<(), HarnessError> {
        let pid = child.id();

        if request_termination(child).await && self.wait_for_exit(child).await {
            debug!(unit, ?pid, "worker terminated gracefully");
            sweep_group(pid).await;
            return Ok(());
        }

        warn!(unit, ?pid, "worker did not stop on request, killing");
        if let Err(e) = child.start_kill() {
            warn!(unit, ?pid, error = %e, "failed to send kill signal");
        }
        sweep_group(pid).await;
        if self.wait_for_exit(child).await {
            debug!(unit, ?pid, "worker killed");
            return Ok(());
        }

        Err(HarnessError::Unreclaimable {
            unit: unit.to_string(),
            pid,
        })
    }

    async fn wait_for_exit(&self, child: &mut Child) -> bool {
        matches!(
            tokio::time::timeout(self.grace_period, child.wait()).await,
            Ok(Ok(_))
        )
    }
}

impl UnitRunner for Harness {
    fn run_unit<L>(&self, launcher: &L, timeout: Option<Duration>) -> impl Future<Output = Result<Outcome, HarnessError>>
    where
        L: WorkerLauncher + ?Sized,
    {
        self.run(launcher, timeout)
    }
}

async fn wait_until(child: &mut Child, timeout: Option<Duration>) -> Waited {
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
            Ok(status) => Waited::Exited(status),
            Err(_) => Waited::TimedOut,
        },
        None => Waited::Exited(child.wait().await),
    }
}

async fn cancelled(token: Option<&CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

fn classify_exit(status: ExitStatus, channel: ResultChannel, elapsed: Duration) -> Outcome {
    if !status.success() {
        return Outcome::worker_failure(elapsed, worker_exit(status));
    }
    match channel.read() {
        Ok(Payload::Ok(value)) => Outcome::success(elapsed, value),
        Ok(Payload::Error(error)) => Outcome::application_error(elapsed, error),
        Err(e) => Outcome::deserialize_error(elapsed, e),
    }
}

#[cfg(unix)]
fn worker_exit(status: ExitStatus) -> WorkerExit {
    use std::os::unix::process::ExitStatusExt;
    match (status.code(), status.signal()) {
        (Some(code), _) => WorkerExit::Code(code),
        (None, Some(signal)) => WorkerExit::Signal(signal),
        (None, None) => WorkerExit::Code(-1),
    }
}

#[cfg(not(unix))]
fn worker_exit(status: ExitStatus) -> WorkerExit {
    WorkerExit::Code(status.code().unwrap_or(-1))
}

/// Sends `signal` to the process group led by `pid` through the `kill`
/// utility. Returns whether the signal was delivered.
#[cfg(unix)]
async fn signal_group(pid: u32, signal: &str) -> bool {
    let result = Command::new("kill")
        .arg(format!("-{signal}"))
        .arg("--")
        .arg(format!("-{pid}"))
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) => status.success(),
        Err(e) => {
            warn!(pid, signal, error = %e, "failed to run kill");
            false
        }
    }
}

/// Asks the worker and the tools it started to shut down cooperatively.
///
/// Without a working `kill` utility this returns `false` and the ladder
/// goes straight to the forced kill of the worker itself.
#[cfg(unix)]
async fn request_termination(child: &Child) -> bool {
    match child.id() {
        Some(pid) => signal_group(pid, "TERM").await,
        None => false,
    }
}

/// Kills whatever is left in the worker's process group.
#[cfg(unix)]
async fn sweep_group(pid: Option<u32>) {
    if let Some(pid) = pid {
        // The group is usually empty by now, in which case `kill` fails.
        let _ = signal_group(pid, "KILL").await;
    }
}

#[cfg(windows)]
async fn request_termination(child: &Child) -> bool {
    let Some(pid) = child.id() else { return false };
    let result = Command::new("taskkill")
        .arg("/T")
        .arg("/PID")
        .arg(pid.to_string())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await;
    match result {
        Ok(status) => status.success(),
        Err(e) => {
            warn!(pid, error = %e, "failed to send termination request");
            false
        }
    }
}

#[cfg(not(any(unix, windows)))]
async fn request_termination(_child: &Child) -> bool {
    false
}

#[cfg(not(unix))]
async fn sweep_group(_pid: Option<u32>) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use serde_json::json;

    struct Script(&'static str);

    impl WorkerLauncher for Script {
        fn label(&self) -> String {
            format!("sh -c {:?}", self.0)
        }

        fn command(&self, channel: &Path) -> Command {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.0).arg("worker").arg(channel);
            cmd
        }
    }

    fn harness() -> Harness {
        Harness::new()
            .with_grace_period(Duration::from_secs(2))
            .with_output(WorkerOutput::Discard)
    }

    #[tokio::test]
    async fn value_written_by_worker_is_returned() {
        let outcome = harness()
            .run(&Script(r#"printf '{"version":1,"ok":42}' > "$1""#), Some(Duration::from_secs(5)))
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(outcome.value(), Some(&json!(42)));
        assert_eq!(outcome.error_summary(), None);
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_worker_failure_even_with_a_result() {
        let outcome = harness()
            .run(&Script(r#"printf '{"version":1,"ok":1}' > "$1"; exit 3"#), None)
            .await
            .unwrap();
        assert_eq!(outcome.exit(), Some(WorkerExit::Code(3)));
        assert_eq!(outcome.value(), None);
    }

    #[tokio::test]
    async fn spawn_failure_is_a_harness_error() {
        struct Missing;
        impl WorkerLauncher for Missing {
            fn label(&self) -> String {
                "missing".into()
            }
            fn command(&self, _channel: &Path) -> Command {
                Command::new("/definitely/not/a/worker/binary")
            }
        }
        let err = harness().run(&Missing, None).await.unwrap_err();
        assert!(matches!(err, HarnessError::Spawn { .. }));
        assert!(!err.is_fatal());
    }

    #[tokio::test]
    async fn cancellation_reclaims_the_running_worker() {
        let token = CancellationToken::new();
        let harness = harness().with_cancellation(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            token.cancel();
        });

        let started = Instant::now();
        let err = harness.run(&Script("exec sleep 30"), None).await.unwrap_err();
        canceller.await.unwrap();

        assert!(matches!(err, HarnessError::Cancelled { .. }));
        assert!(!err.is_fatal());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn only_an_unreclaimable_worker_is_fatal() {
        let unreclaimable = HarnessError::Unreclaimable {
            unit: "render poppler a.pdf".into(),
            pid: Some(4242),
        };
        assert!(unreclaimable.is_fatal());
        assert!(unreclaimable.to_string().contains("render poppler a.pdf"));
        assert!(!HarnessError::Cancelled { unit: "x".into() }.is_fatal());
    }
}
