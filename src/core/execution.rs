//! # Matrix Execution Engine Module / 矩阵执行引擎模块
//!
//! This module runs an [`ExecutionPlan`]: it probes tool versions, then times
//! every cell strictly one after another, each in its own worker process,
//! and collects the results into a [`Report`].
//!
//! 此模块执行 [`ExecutionPlan`]：先探测工具版本，然后严格依次对每个单元计时，
//! 每个单元都在独立的工作进程中运行，并将结果收集到 [`Report`] 中。
//!
//! A failing cell never stops the loop; only an unreclaimable worker does.

use anyhow::{bail, Result};
use colored::*;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::config::BenchConfig;
use crate::core::harness::{HarnessError, UnitRunner, WorkerLauncher};
use crate::core::models::{
    CellResult, ErrorCode, Outcome, OutcomeStatus, Report, ReportDate, ReportEntry, ReportError,
};
use crate::core::planner::{Cell, ExecutionPlan};
use crate::core::worker::Job;
use crate::infra::{fs::display_relative, fs::ensure_dir, platform::platform_info, t};
use crate::reporting::console::colored_status;
use crate::reporting::csv::append_timing;

/// Duration recorded for every cell of an internal check.
pub const INTERNAL_CHECK_SECONDS: f64 = 1.0;

/// Everything a run produced. / 一次运行的全部产出。
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub report: Report,
    pub results: Vec<CellResult>,
    /// The run was interrupted before every cell ran.
    pub cancelled: bool,
}

/// Runs every cell of `plan` in order.
///
/// `launcher_for` turns a [`Job`] into the launcher of its worker process.
/// `token` is checked between cells; once cancelled, the remaining cells
/// are skipped and the partial report is returned. A cell interrupted by
/// the cancellation is left out of the report.
///
/// # Errors
/// Fails only on a fatal harness error or when the CSV logs cannot be
/// written.
///
/// 依次运行 `plan` 中的每个单元。仅在出现致命执行框架错误或无法写入 CSV 日志时失败。
pub async fn run_matrix<R, F, L>(
    plan: &ExecutionPlan,
    config: &BenchConfig,
    runner: &R,
    launcher_for: F,
    token: &CancellationToken,
    date: ReportDate,
    locale: &str,
) -> Result<RunSummary>
where
    R: UnitRunner,
    F: Fn(Job) -> L,
    L: WorkerLauncher,
{
    let mut report = Report::new(Some(date));
    report.platform = Some(platform_info());
    let output_dir = config.output_dir();
    if !plan.internal_check {
        ensure_dir(&output_dir)?;
    }

    let total = plan.cells.len();
    let mut results = Vec::with_capacity(total);
    let mut cancelled = false;

    for tool in &plan.probe_tools {
        let version = if plan.internal_check {
            Value::Null
        } else {
            match probe(runner, &launcher_for, tool, plan, locale).await? {
                Some(version) => version,
                None => {
                    cancelled = true;
                    break;
                }
            }
        };
        report.toolversions.insert(tool.clone(), version);
    }

    for (i, cell) in plan.cells.iter().enumerate() {
        if cancelled || token.is_cancelled() {
            println!("{}", t!("run.cancelled", done = i, total = total, locale = locale).yellow());
            cancelled = true;
            break;
        }

        let path = display_relative(&cell.path, &config.base_dir);
        println!(
            "{}",
            t!(
                "run.cell_start",
                locale = locale,
                index = i + 1,
                total = total,
                test = cell.test,
                tool = &cell.tool,
                path = &path
            )
            .cyan()
        );

        let result = if plan.internal_check {
            CellResult {
                entry: entry(cell, &path, INTERNAL_CHECK_SECONDS, ReportError::success()),
                status: OutcomeStatus::Success,
                summary: None,
            }
        } else {
            let Some(result) = run_cell(runner, &launcher_for, cell, &path).await? else {
                println!("{}", t!("run.cancelled", done = i, total = total, locale = locale).yellow());
                cancelled = true;
                break;
            };
            append_timing(&output_dir, cell.test, &cell.tool, &path, result.entry.t)?;
            result
        };

        println!(
            "    {} {:.2}s",
            colored_status(result.status, locale),
            result.entry.t
        );
        if let Some(summary) = &result.summary {
            println!("    {}", summary.dimmed());
        }
        results.push(result);
    }

    report.data = results.iter().map(|r| r.entry.clone()).collect();
    Ok(RunSummary {
        report,
        results,
        cancelled,
    })
}

/// Probes one tool's version. `None` means the run was cancelled.
async fn probe<R, F, L>(runner: &R, launcher_for: &F, tool: &str, plan: &ExecutionPlan, locale: &str) -> Result<Option<Value>>
where
    R: UnitRunner,
    F: Fn(Job) -> L,
    L: WorkerLauncher,
{
    println!("{}", t!("run.probing", tool = tool, locale = locale).blue());
    let launcher = launcher_for(Job::Probe { tool: tool.to_string() });
    let outcome = match runner.run_unit(&launcher, plan.probe_timeout).await {
        Ok(outcome) => outcome,
        Err(HarnessError::Cancelled { .. }) => return Ok(None),
        Err(e) => return harness_failure(e).map(|message| Some(Value::String(message))),
    };
    debug!(tool, status = ?outcome.status(), "version probed");

    if outcome.is_success() {
        Ok(Some(outcome.into_value().unwrap_or(Value::Null)))
    } else {
        let summary = outcome.error_summary().unwrap_or_default().to_string();
        warn!(tool, %summary, "version probe failed");
        Ok(Some(Value::String(summary)))
    }
}

/// Times one cell. `None` means the run was cancelled while it ran.
async fn run_cell<R, F, L>(runner: &R, launcher_for: &F, cell: &Cell, path: &str) -> Result<Option<CellResult>>
where
    R: UnitRunner,
    F: Fn(Job) -> L,
    L: WorkerLauncher,
{
    let launcher = launcher_for(Job::Operation {
        test: cell.test,
        tool: cell.tool.clone(),
        path: cell.path.clone(),
    });

    match runner.run_unit(&launcher, cell.timeout).await {
        Ok(outcome) => Ok(Some(from_outcome(cell, path, &outcome))),
        Err(HarnessError::Cancelled { .. }) => Ok(None),
        Err(e) => {
            let message = harness_failure(e)?;
            Ok(Some(CellResult {
                entry: entry(cell, path, 0.0, ReportError(Some(ErrorCode::Message(message.clone())))),
                status: OutcomeStatus::WorkerFailure,
                summary: Some(message),
            }))
        }
    }
}

/// Propagates fatal harness errors and turns the others into a message.
fn harness_failure(e: HarnessError) -> Result<String> {
    if e.is_fatal() {
        bail!(t!("run.fatal", error = e.to_string()).to_string());
    }
    warn!(error = %e, "harness could not run worker");
    Ok(e.to_string())
}

fn from_outcome(cell: &Cell, path: &str, outcome: &Outcome) -> CellResult {
    CellResult {
        entry: entry(cell, path, outcome.elapsed.as_secs_f64(), outcome.report_error()),
        status: outcome.status(),
        summary: outcome.error_summary().map(str::to_string),
    }
}

fn entry(cell: &Cell, path: &str, t: f64, e: ReportError) -> ReportEntry {
    ReportEntry {
        testname: cell.test,
        path: path.to_string(),
        toolname: cell.tool.clone(),
        t,
        e,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::core::harness::{Harness, WorkerOutput};
    use crate::core::models::{Outcome, Test};
    use crate::core::planner::{plan_execution, PlanOptions};
    use crate::core::registry::Registry;
    use serde_json::json;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::process::Command;

    /// Runs a shell script as the worker; `$1` is the channel.
    struct Script(String);

    impl WorkerLauncher for Script {
        fn label(&self) -> String {
            self.0.clone()
        }

        fn command(&self, channel: &Path) -> Command {
            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(&self.0).arg("worker").arg(channel);
            cmd
        }
    }

    fn script_for(job: Job) -> Script {
        let body = match job {
            Job::Probe { .. } => r#"printf '{"version":1,"ok":"1.0"}' > "$1""#,
            Job::Operation { tool, .. } if tool == "lopdf" => r#"printf '{"version":1,"ok":null}' > "$1""#,
            Job::Operation { .. } => "exit 5",
        };
        Script(body.to_string())
    }

    fn setup(dir: &Path) -> (BenchConfig, ExecutionPlan) {
        let config = BenchConfig {
            corpus: vec![PathBuf::from("a.pdf")],
            base_dir: dir.to_path_buf(),
            tools: toml::from_str::<BenchConfig>(
                "[[tools]]\nname = \"broken\"\nversion = \"true\"\ntext = \"false\"",
            )
            .unwrap()
            .tools,
            ..BenchConfig::default()
        };
        let registry = Registry::from_config(&config).unwrap();
        let plan = plan_execution(&registry, &config, &PlanOptions::default()).unwrap();
        (config, plan)
    }

    fn harness() -> Harness {
        Harness::new()
            .with_grace_period(Duration::from_secs(1))
            .with_output(WorkerOutput::Discard)
    }

    #[tokio::test]
    async fn every_cell_produces_an_entry_and_a_csv_line() {
        let dir = tempfile::tempdir().unwrap();
        let (config, plan) = setup(dir.path());
        let summary = run_matrix(
            &plan,
            &config,
            &harness(),
            script_for,
            &CancellationToken::new(),
            ReportDate::now(),
            "en",
        )
        .await
        .unwrap();

        assert!(!summary.cancelled);
        assert_eq!(summary.report.toolversions["lopdf"], json!("1.0"));
        let entries: Vec<(Test, &str)> = summary
            .report
            .data
            .iter()
            .map(|e| (e.testname, e.toolname.as_str()))
            .collect();
        assert_eq!(entries, [(Test::Copy, "lopdf"), (Test::Text, "broken"), (Test::Text, "lopdf")]);

        let broken = &summary.report.data[1];
        assert_eq!(broken.e, ReportError(Some(ErrorCode::Code(5))));
        assert_eq!(broken.path, "a.pdf");

        let csv = std::fs::read_to_string(config.output_dir().join("text-speed.csv")).unwrap();
        assert_eq!(csv.lines().count(), 2);
        assert!(csv.starts_with("broken;a.pdf;"));
    }

    #[tokio::test]
    async fn internal_check_records_fixed_results() {
        let dir = tempfile::tempdir().unwrap();
        let (config, mut plan) = setup(dir.path());
        plan.internal_check = true;
        let summary = run_matrix(
            &plan,
            &config,
            &harness(),
            |_job: Job| Script("exit 9".to_string()),
            &CancellationToken::new(),
            ReportDate::now(),
            "en",
        )
        .await
        .unwrap();

        assert!(summary.report.data.iter().all(|e| e.t == 1.0 && e.e.is_success()));
        assert!(!config.output_dir().exists());
    }

    #[tokio::test]
    async fn cancellation_stops_before_the_next_cell() {
        let dir = tempfile::tempdir().unwrap();
        let (config, plan) = setup(dir.path());
        let token = CancellationToken::new();
        token.cancel();
        let summary = run_matrix(&plan, &config, &harness(), script_for, &token, ReportDate::now(), "en")
            .await
            .unwrap();
        assert!(summary.cancelled);
        assert!(summary.report.data.is_empty());
    }

    /// Succeeds for the first `ok_calls` units, then fails with `error`.
    struct Scripted {
        ok_calls: usize,
        calls: AtomicUsize,
        error: fn(String) -> HarnessError,
    }

    impl Scripted {
        fn new(ok_calls: usize, error: fn(String) -> HarnessError) -> Self {
            Self {
                ok_calls,
                calls: AtomicUsize::new(0),
                error,
            }
        }
    }

    impl UnitRunner for Scripted {
        async fn run_unit<L>(&self, launcher: &L, _timeout: Option<Duration>) -> Result<Outcome, HarnessError>
        where
            L: WorkerLauncher + ?Sized,
        {
            if self.calls.fetch_add(1, Ordering::SeqCst) < self.ok_calls {
                Ok(Outcome::success(Duration::from_millis(10), json!("1.0")))
            } else {
                Err((self.error)(launcher.label()))
            }
        }
    }

    #[test]
    fn only_fatal_harness_errors_propagate() {
        let err = harness_failure(HarnessError::Unreclaimable {
            unit: "text poppler a.pdf".into(),
            pid: Some(4242),
        })
        .unwrap_err();
        assert!(err.to_string().contains("text poppler a.pdf"));

        let message = harness_failure(HarnessError::Spawn {
            unit: "copy lopdf a.pdf".into(),
            source: std::io::Error::other("no such file"),
        })
        .unwrap();
        assert!(message.contains("copy lopdf a.pdf"));
    }

    #[tokio::test]
    async fn unreclaimable_worker_aborts_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let (config, plan) = setup(dir.path());
        // Two probes and the first cell succeed; the second cell is fatal.
        let runner = Scripted::new(3, |unit| HarnessError::Unreclaimable { unit, pid: Some(4242) });

        let err = run_matrix(
            &plan,
            &config,
            &runner,
            script_for,
            &CancellationToken::new(),
            ReportDate::now(),
            "en",
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("exit 5"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 4);
        let copy_csv = std::fs::read_to_string(config.output_dir().join("copy-speed.csv")).unwrap();
        assert_eq!(copy_csv.lines().count(), 1);
        assert!(!config.output_dir().join("text-speed.csv").exists());
    }

    #[tokio::test]
    async fn cell_interrupted_by_cancellation_is_not_recorded() {
        let dir = tempfile::tempdir().unwrap();
        let (config, plan) = setup(dir.path());
        let runner = Scripted::new(3, |unit| HarnessError::Cancelled { unit });

        let summary = run_matrix(
            &plan,
            &config,
            &runner,
            script_for,
            &CancellationToken::new(),
            ReportDate::now(),
            "en",
        )
        .await
        .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.report.data.len(), 1);
        assert_eq!(summary.report.data[0].testname, Test::Copy);
        assert!(!config.output_dir().join("text-speed.csv").exists());
    }
}
