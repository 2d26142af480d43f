//! Append-only CSV timing logs, one file per test.
//!
//! Each line reads `tool;path;seconds` with the duration rounded to two
//! decimals, e.g. `poppler;corpus/pandas.pdf;1.27`.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::models::Test;
use crate::infra::t;

/// `<output_dir>/<test>-speed.csv`
pub fn log_path(output_dir: &Path, test: Test) -> PathBuf {
    output_dir.join(format!("{test}-speed.csv"))
}

pub fn format_line(tool: &str, path: &str, seconds: f64) -> String {
    format!("{tool};{path};{seconds:.2}\n")
}

/// Appends one timing line to the log of `test`.
pub fn append_timing(output_dir: &Path, test: Test, tool: &str, path: &str, seconds: f64) -> Result<()> {
    let log = log_path(output_dir, test);
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log)
        .with_context(|| t!("report.csv_failed", path = log.display()).to_string())?;
    file.write_all(format_line(tool, path, seconds).as_bytes())
        .with_context(|| t!("report.csv_failed", path = log.display()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        append_timing(dir.path(), Test::Text, "poppler", "a.pdf", 1.234).unwrap();
        append_timing(dir.path(), Test::Text, "mupdf", "a.pdf", 0.5).unwrap();
        let content = std::fs::read_to_string(dir.path().join("text-speed.csv")).unwrap();
        assert_eq!(content, "poppler;a.pdf;1.23\nmupdf;a.pdf;0.50\n");
    }
}
