// Shared helpers for the integration tests.
#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

/// Writes a one-page PDF containing `text` to `path`.
pub fn write_pdf(path: &Path, text: &str) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 24.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).unwrap();
}

/// Creates a benchmark directory with `corpus/sample.pdf` and a
/// `pdfperf.toml` made of `extra` appended to the common settings.
pub fn setup_bench(extra: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("Failed to create temporary directory");
    let corpus = dir.path().join("corpus");
    fs::create_dir_all(&corpus).unwrap();
    write_pdf(&corpus.join("sample.pdf"), "Hello pdfperf");

    let config = format!(
        r#"language = "en"
corpus = ["corpus/sample.pdf"]
default_timeout_secs = 30
grace_period_secs = 1
quiet_workers = true
{extra}"#
    );
    let config_path = dir.path().join("pdfperf.toml");
    fs::write(&config_path, config).unwrap();
    (dir, config_path)
}

/// Returns the single timestamped report in `dir` whose name starts with `prefix`.
pub fn find_report(dir: &Path, prefix: &str) -> PathBuf {
    let mut reports: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            let name = path.file_name().unwrap().to_string_lossy();
            name.starts_with(&format!("{prefix}-"))
                && name.ends_with(".json")
                && !name.ends_with("-latest.json")
        })
        .collect();
    assert_eq!(reports.len(), 1, "expected one report in {}", dir.display());
    reports.remove(0)
}

/// Whether `pid` names a live, non-zombie process.
#[cfg(target_os = "linux")]
pub fn is_running(pid: &str) -> bool {
    fs::read(format!("/proc/{}/cmdline", pid.trim()))
        .map(|cmdline| !cmdline.is_empty())
        .unwrap_or(false)
}

/// Polls until `pid` has exited, for up to five seconds.
#[cfg(target_os = "linux")]
pub fn wait_for_exit(pid: &str) -> bool {
    for _ in 0..50 {
        if !is_running(pid) {
            return true;
        }
        std::thread::sleep(std::time::Duration::from_millis(100));
    }
    false
}
