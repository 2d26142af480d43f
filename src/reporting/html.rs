//! # HTML Reporting Module / HTML 报告模块
//!
//! Renders a single self-contained HTML page with summary counts, the tool
//! versions and a table of every timed cell.
//!
//! 生成一个独立的 HTML 页面，包含汇总统计、工具版本以及所有计时单元的表格。

use anyhow::{Context, Result};
use maud::{html, Markup, PreEscaped, DOCTYPE};
use std::fs;
use std::path::Path;

use crate::core::models::{CellResult, OutcomeStatus, Report};
use crate::infra::t;

const HTML_STYLE: &str = r#"
body { font-family: sans-serif; margin: 2em; color: #222; }
.summary-container { display: flex; gap: 2em; margin-bottom: 1.5em; }
.summary-item .count { display: block; font-size: 2em; font-weight: bold; }
table { border-collapse: collapse; width: 100%; }
th, td { border-bottom: 1px solid #ddd; padding: 0.4em 0.6em; text-align: left; }
td.duration-cell { text-align: right; font-variant-numeric: tabular-nums; }
.success { color: #1a7f37; }
.timeout { color: #9a6700; }
.failure { color: #cf222e; }
pre { margin: 0; white-space: pre-wrap; }
"#;

fn status_class(status: OutcomeStatus) -> &'static str {
    match status {
        OutcomeStatus::Success => "success",
        OutcomeStatus::Timeout => "timeout",
        _ => "failure",
    }
}

/// Renders the report page. / 生成报告页面。
pub fn render_html(report: &Report, results: &[CellResult], locale: &str) -> Markup {
    let total = results.len();
    let passed = results.iter().filter(|r| r.is_success()).count();
    let timed_out = results
        .iter()
        .filter(|r| r.status == OutcomeStatus::Timeout)
        .count();

    html! {
        (DOCTYPE)
        html {
            head {
                meta charset="utf-8";
                title { (t!("html_report.title", locale = locale).to_string()) }
                style { (PreEscaped(HTML_STYLE)) }
            }
            body {
                h1 { (t!("html_report.main_header", locale = locale).to_string()) }
                @if let Some(date) = &report.date {
                    p { (date.string) }
                }
                div.summary-container {
                    div.summary-item {
                        span.count { (total) }
                        span.label { (t!("html_report.summary.total", locale = locale).to_string()) }
                    }
                    div.summary-item {
                        span.count.success { (passed) }
                        span.label { (t!("html_report.summary.passed", locale = locale).to_string()) }
                    }
                    div.summary-item {
                        span.count.timeout { (timed_out) }
                        span.label { (t!("html_report.summary.timeout", locale = locale).to_string()) }
                    }
                    div.summary-item {
                        span.count.failure { (total - passed - timed_out) }
                        span.label { (t!("html_report.summary.failed", locale = locale).to_string()) }
                    }
                }
                h2 { (t!("html_report.versions", locale = locale).to_string()) }
                table {
                    @for (tool, version) in &report.toolversions {
                        tr {
                            td { (tool) }
                            td { pre { (version_text(version)) } }
                        }
                    }
                }
                h2 { (t!("html_report.results", locale = locale).to_string()) }
                table {
                    thead {
                        tr {
                            th { (t!("html_report.table.test", locale = locale).to_string()) }
                            th { (t!("html_report.table.tool", locale = locale).to_string()) }
                            th { (t!("html_report.table.file", locale = locale).to_string()) }
                            th { (t!("html_report.table.status", locale = locale).to_string()) }
                            th { (t!("html_report.table.duration", locale = locale).to_string()) }
                        }
                    }
                    tbody {
                        @for result in results {
                            tr {
                                td { (result.entry.testname.as_str()) }
                                td { (result.entry.toolname) }
                                td { (result.entry.path) }
                                td class=(status_class(result.status)) {
                                    (result.status.label(locale))
                                    @if let Some(summary) = &result.summary {
                                        pre { (summary) }
                                    }
                                }
                                td.duration-cell { (format!("{:.2}s", result.entry.t)) }
                            }
                        }
                    }
                }
            }
        }
    }
}

fn version_text(version: &serde_json::Value) -> String {
    match version {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Writes the HTML report to `output_path`.
pub fn generate_html_report(report: &Report, results: &[CellResult], output_path: &Path, locale: &str) -> Result<()> {
    let markup = render_html(report, results, locale);
    fs::write(output_path, markup.into_string())
        .with_context(|| t!("report.write_failed", path = output_path.display()).to_string())
}
