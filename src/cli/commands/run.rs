//! # Run Command Module / 运行命令模块
//!
//! This module implements the `run` command, which times every registered
//! tool on every file of the corpus and writes the reports.
//!
//! 此模块实现了 `run` 命令，对语料库中每个文件上的每个已注册工具进行计时并写入报告。

use anyhow::{Context, Result};
use colored::*;
use std::{env, fs, path::PathBuf, process::ExitCode, time::Duration};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    core::{
        config::load_config,
        execution::run_matrix,
        harness::{Harness, WorkerOutput},
        models::ReportDate,
        planner::{plan_execution, PlanOptions},
        registry::Registry,
        worker::SelfExec,
    },
    infra::{fs::ensure_dir, t},
    reporting::{
        console::{print_failure_details, print_summary},
        html::generate_html_report,
        json::{report_names, write_report},
        publish::publish_report,
    },
};

/// Exit code of a run interrupted with Ctrl-C.
const INTERRUPTED: u8 = 130;

/// Options of the `run` command. / `run` 命令的选项。
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: PathBuf,
    pub tests: Vec<crate::core::models::Test>,
    pub tools: Vec<String>,
    pub paths: Vec<PathBuf>,
    pub timeout: Option<Duration>,
    pub no_timeout: bool,
    pub internal_check: bool,
    pub html: Option<PathBuf>,
    pub no_publish: bool,
    /// Overrides the configured language. / 覆盖配置中的语言。
    pub language: Option<String>,
}

/// Executes the run command with the provided arguments.
///
/// Failed cells are part of the results, not errors: the command succeeds
/// as long as the report could be written.
pub async fn execute(args: RunArgs) -> Result<ExitCode> {
    let config_path = fs::canonicalize(&args.config)
        .with_context(|| t!("config.read_failed", path = args.config.display()).to_string())?;
    let config = load_config(&config_path)?;
    let locale = args.language.clone().unwrap_or_else(|| config.language.clone());
    crate::set_language(&locale);

    println!(
        "{}",
        t!("run.loading_config", locale = &locale, path = config_path.display())
    );

    let registry = Registry::from_config(&config)?;
    let options = PlanOptions {
        tests: args.tests,
        tools: args.tools,
        paths: args.paths,
        timeout: args.timeout,
        no_timeout: args.no_timeout,
        internal_check: args.internal_check,
    };
    let plan = plan_execution(&registry, &config, &options)?;

    if plan.cells.is_empty() {
        println!("{}", t!("run.no_cells", locale = &locale).yellow());
    } else {
        println!(
            "{}",
            t!(
                "run.plan_summary",
                locale = &locale,
                cells = plan.cells.len(),
                tools = plan.probe_tools.len()
            )
            .bold()
        );
    }
    if plan.internal_check {
        println!("{}", t!("run.internal_check", locale = &locale).yellow());
    }

    let stop_token = setup_signal_handler(&locale);
    let exe = env::current_exe().context(t!("run.current_exe_failed").to_string())?;
    let harness = Harness::new()
        .with_grace_period(config.grace_period())
        .with_output(if config.quiet_workers {
            WorkerOutput::Discard
        } else {
            WorkerOutput::Inherit
        })
        .with_cancellation(stop_token.clone());

    let summary = run_matrix(
        &plan,
        &config,
        &harness,
        |job| SelfExec::new(&exe, &config_path, job),
        &stop_token,
        ReportDate::now(),
        &locale,
    )
    .await?;

    print_summary(&summary.results, &locale);
    print_failure_details(&summary.results, &locale);

    let output_dir = config.output_dir();
    ensure_dir(&output_dir)?;
    let prefix = plan.result_prefix();
    let report_path = write_report(&summary.report, &output_dir, prefix)?;
    println!(
        "\n{}",
        t!("run.report_written", locale = &locale, path = report_path.display()).green()
    );

    if let Some(html_path) = &args.html {
        generate_html_report(&summary.report, &summary.results, html_path, &locale)?;
        println!(
            "{}",
            t!("run.html_written", locale = &locale, path = html_path.display()).green()
        );
    }

    if summary.cancelled {
        return Ok(ExitCode::from(INTERRUPTED));
    }

    match (&config.publish, args.no_publish) {
        (Some(publish), false) => {
            let date = summary
                .report
                .date
                .as_ref()
                .map(|d| d.string.clone())
                .unwrap_or_default();
            let (name, latest) = report_names(prefix, &date);
            publish_report(publish, &summary.report, &name, &latest).await?;
        }
        (Some(_), true) => println!("{}", t!("publish.disabled", locale = &locale).dimmed()),
        (None, _) => {}
    }

    Ok(ExitCode::SUCCESS)
}

/// Sets up a signal handler for graceful shutdown between cells.
fn setup_signal_handler(locale: &str) -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();
    let locale = locale.to_string();

    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                println!("\n{}", t!("run.shutdown_signal", locale = &locale).yellow());
                token_clone.cancel();
            }
            Err(e) => warn!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    token
}
