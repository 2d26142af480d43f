//! # JSON Report Module / JSON 报告模块
//!
//! Writes the report as pretty JSON with four-space indentation and sorted
//! keys, under a dated name plus a `-latest` alias.
//!
//! 将报告写为四空格缩进、键已排序的 JSON，使用带日期的文件名以及 `-latest` 别名。

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::models::Report;
use crate::infra::{fs::update_alias, t};

/// The dated file name and the alias name of a report.
pub fn report_names(prefix: &str, date: &str) -> (String, String) {
    (format!("{prefix}-{date}.json"), format!("{prefix}-latest.json"))
}

/// Serializes `report` with sorted keys and four-space indentation.
pub fn to_json_string(report: &Report) -> Result<String> {
    // Going through `Value` sorts the keys of every object.
    let value = serde_json::to_value(report)?;
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(String::from_utf8(buf)?)
}

/// Writes the report to `dir/name` and points `dir/latest` at it.
pub fn write_named(report: &Report, dir: &Path, name: &str, latest: &str) -> Result<PathBuf> {
    let path = dir.join(name);
    fs::write(&path, to_json_string(report)?)
        .with_context(|| t!("report.write_failed", path = path.display()).to_string())?;
    update_alias(&path, &dir.join(latest))?;
    Ok(path)
}

/// Writes the report into `output_dir` using the report's date in its name.
///
/// 使用报告日期命名，将报告写入 `output_dir`。
pub fn write_report(report: &Report, output_dir: &Path, prefix: &str) -> Result<PathBuf> {
    let date = report
        .date
        .as_ref()
        .map(|d| d.string.clone())
        .unwrap_or_else(|| chrono::Utc::now().format("%Y-%m-%d-%H-%M").to_string());
    let (name, latest) = report_names(prefix, &date);
    write_named(report, output_dir, &name, &latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{ReportDate, ReportEntry, ReportError, Test};
    use serde_json::{json, Value};

    fn sample() -> Report {
        let mut report = Report::new(Some(ReportDate {
            seconds: 1.0,
            string: "2024-01-02-03-04".into(),
        }));
        report.toolversions.insert("lopdf".into(), json!("0.38"));
        report.data.push(ReportEntry {
            testname: Test::Copy,
            path: "a.pdf".into(),
            toolname: "lopdf".into(),
            t: 0.25,
            e: ReportError::success(),
        });
        report
    }

    #[test]
    fn output_is_indented_and_sorted() {
        let text = to_json_string(&sample()).unwrap();
        assert!(text.starts_with("{\n    \"data\": ["));
        let data = text.find("\"data\"").unwrap();
        let date = text.find("\"date\"").unwrap();
        let versions = text.find("\"toolversions\"").unwrap();
        assert!(data < date && date < versions);
    }

    #[test]
    fn dated_file_and_latest_alias_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_report(&sample(), dir.path(), "results").unwrap();
        assert_eq!(path.file_name().unwrap(), "results-2024-01-02-03-04.json");

        let latest: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("results-latest.json")).unwrap()).unwrap();
        assert_eq!(latest["data"][0]["e"], json!(0));
        assert_eq!(latest["toolversions"]["lopdf"], json!("0.38"));
    }
}
