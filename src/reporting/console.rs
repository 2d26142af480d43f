//! # Console Reporting Module / 控制台报告模块
//!
//! This module prints the summary of a benchmark run to the console,
//! using color to highlight each outcome.
//!
//! 此模块在控制台打印基准测试运行的摘要，并用颜色突出显示每种结果。

use colored::*;

use crate::core::models::{CellResult, OutcomeStatus};
use crate::infra::t;

/// Colors a status label the way every console message does.
pub fn colored_status(status: OutcomeStatus, locale: &str) -> ColoredString {
    let label = status.label(locale);
    match status {
        OutcomeStatus::Success => label.green(),
        OutcomeStatus::Timeout => label.yellow(),
        OutcomeStatus::ApplicationError => label.red(),
        OutcomeStatus::WorkerFailure | OutcomeStatus::DeserializeError => label.red().bold(),
    }
}

/// Prints a table of every timed cell.
///
/// # Output Format / 输出格式
/// ```text
/// --- Benchmark Summary ---
///   - Status             | Test   | Tool         | File                           |   Duration
///   - Success            | copy   | lopdf        | corpus/pandas.pdf              |      0.42s
///   - Timeout            | render | poppler      | corpus/big.pdf                 |    310.01s
/// ```
pub fn print_summary(results: &[CellResult], locale: &str) {
    println!("\n{}", t!("summary.banner", locale = locale).bold());
    for result in results {
        let entry = &result.entry;
        println!(
            "  - {:<20} | {:<6} | {:<12} | {:<30} | {:>9.2}s",
            colored_status(result.status, locale),
            entry.testname.as_str(),
            entry.toolname,
            entry.path,
            entry.t
        );
    }

    let failed = results.iter().filter(|r| !r.is_success()).count();
    println!(
        "\n{}",
        t!(
            "summary.totals",
            locale = locale,
            total = results.len(),
            passed = results.len() - failed,
            failed = failed
        )
    );
}

/// Prints the error summary of every cell that did not succeed.
///
/// 打印每个未成功单元的错误摘要。
pub fn print_failure_details(results: &[CellResult], locale: &str) {
    let failures: Vec<&CellResult> = results.iter().filter(|r| !r.is_success()).collect();
    if failures.is_empty() {
        return;
    }

    println!("\n{}", t!("summary.failure_banner", locale = locale).red().bold());
    println!("{}", "-".repeat(80));
    for (i, result) in failures.iter().enumerate() {
        let entry = &result.entry;
        println!(
            "[{}/{}] {} {} {}",
            i + 1,
            failures.len(),
            entry.testname.as_str().cyan(),
            entry.toolname.cyan(),
            entry.path
        );
        println!(
            "    {}: {}",
            colored_status(result.status, locale),
            result.summary.as_deref().unwrap_or_default()
        );
    }
    println!("{}", "-".repeat(80));
}
