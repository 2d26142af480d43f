//! Describes the machine a benchmark runs on.

use serde_json::{json, Value};
use std::collections::BTreeMap;

/// The `platform` section of a report.
/// 报告中的 `platform` 部分。
pub fn platform_info() -> BTreeMap<String, Value> {
    BTreeMap::from([
        ("os".to_string(), json!(std::env::consts::OS)),
        ("family".to_string(), json!(std::env::consts::FAMILY)),
        ("arch".to_string(), json!(std::env::consts::ARCH)),
        ("cpus".to_string(), json!(num_cpus::get())),
        ("physical_cpus".to_string(), json!(num_cpus::get_physical())),
        ("harness".to_string(), json!(format!("pdfperf {}", env!("CARGO_PKG_VERSION")))),
    ])
}
