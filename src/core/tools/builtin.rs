//! Built-in tools, linked into the binary and run in-process by the worker.

use anyhow::{bail, Result};
use lopdf::Document;
use serde_json::{json, Value};
use std::fs;
use tracing::debug;

use crate::core::models::{Test, WorkerError};
use crate::core::registry::{Operation, OperationContext, Registry, VersionProbe};
use crate::infra::t;

/// Names of every built-in tool, in registration order.
pub const BUILTIN_TOOLS: &[&str] = &["lopdf"];

/// Registers the built-in tools named in `enabled`.
pub fn register(registry: &mut Registry, enabled: &[String]) -> Result<()> {
    for name in enabled {
        match name.as_str() {
            "lopdf" => {
                registry.register_tool("lopdf", VersionProbe::Builtin(lopdf_version))?;
                registry.register("lopdf", Test::Copy, Operation::Builtin(lopdf_copy))?;
                registry.register("lopdf", Test::Text, Operation::Builtin(lopdf_text))?;
            }
            other => bail!(t!("registry.unknown_builtin", name = other).to_string()),
        }
    }
    Ok(())
}

fn lopdf_version() -> Result<Value, WorkerError> {
    Ok(json!({
        "crate": "lopdf",
        "requirement": "0.38",
        "pdfperf": env!("CARGO_PKG_VERSION"),
    }))
}

fn load(ctx: &OperationContext) -> Result<Document, WorkerError> {
    Document::load(&ctx.input).map_err(|e| {
        WorkerError::new("pdf", format!("failed to open {}: {}", ctx.input.display(), e))
    })
}

/// Opens the document and saves a copy under the tool's output directory.
fn lopdf_copy(ctx: &OperationContext) -> Result<Value, WorkerError> {
    let mut doc = load(ctx)?;
    fs::create_dir_all(&ctx.outdir).map_err(|e| WorkerError::new("io", e.to_string()))?;

    let output = ctx.output_base().with_extension("copy.pdf");
    doc.save(&output).map_err(|e| {
        WorkerError::new("pdf", format!("failed to save {}: {}", output.display(), e))
    })?;
    let bytes = fs::metadata(&output).map(|m| m.len()).unwrap_or(0);

    debug!(output = %output.display(), bytes, "copy written");
    Ok(json!({ "output": output.display().to_string(), "bytes": bytes }))
}

/// Extracts the text of every page.
fn lopdf_text(ctx: &OperationContext) -> Result<Value, WorkerError> {
    let doc = load(ctx)?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();

    let mut chars = 0usize;
    for page in &pages {
        let text = doc.extract_text(&[*page]).map_err(|e| {
            WorkerError::new("pdf", format!("failed to extract text from page {page}: {e}"))
        })?;
        chars += text.chars().count();
    }

    debug!(pages = pages.len(), chars, "text extracted");
    Ok(json!({ "pages": pages.len(), "chars": chars }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn unknown_builtin_is_rejected() {
        let mut registry = Registry::new();
        assert!(register(&mut registry, &["pdfium".to_string()]).is_err());
    }

    #[test]
    fn lopdf_registers_copy_and_text() {
        let mut registry = Registry::new();
        register(&mut registry, &["lopdf".to_string()]).unwrap();
        let tests: Vec<_> = registry.tool("lopdf").unwrap().tests().collect();
        assert_eq!(tests, [Test::Copy, Test::Text]);
    }

    #[test]
    fn missing_input_is_a_pdf_error() {
        let ctx = OperationContext::new(
            Test::Text,
            "lopdf",
            Path::new("/no/such/file.pdf"),
            Path::new("/tmp"),
        );
        let err = lopdf_text(&ctx).unwrap_err();
        assert_eq!(err.kind, "pdf");
        assert!(err.message.contains("/no/such/file.pdf"));
    }
}
