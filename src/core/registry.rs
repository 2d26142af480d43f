//! # Tool Registry Module / 工具注册表模块
//!
//! An explicit mapping from `(test, tool)` to the operation that implements
//! it, plus one version probe per tool. Tools are registered by explicit
//! calls, so the test matrix can be enumerated up front and rebuilt
//! identically inside every worker process.
//!
//! 从 `(测试, 工具)` 到实现该操作的显式映射，以及每个工具的版本探测。
//! 工具通过显式调用注册，因此测试矩阵可以预先枚举，并在每个工作进程中以相同方式重建。

use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config::BenchConfig;
use crate::core::models::{Test, WorkerError};
use crate::core::tools::{builtin, command::CommandTemplate};
use crate::infra::t;

/// A built-in operation run in-process by the worker.
pub type BuiltinOperation = fn(&OperationContext) -> Result<Value, WorkerError>;

/// A built-in version probe.
pub type BuiltinProbe = fn() -> Result<Value, WorkerError>;

/// How a tool performs one test. / 工具执行某项测试的方式。
#[derive(Debug, Clone)]
pub enum Operation {
    Builtin(BuiltinOperation),
    Command(CommandTemplate),
}

/// How a tool reports its version. / 工具报告其版本的方式。
#[derive(Debug, Clone)]
pub enum VersionProbe {
    Builtin(BuiltinProbe),
    /// Runs the command; its combined output is the version descriptor.
    Command(CommandTemplate),
}

/// Everything an operation needs to process one input file.
/// 操作处理单个输入文件所需的全部信息。
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub test: Test,
    pub tool: String,
    pub input: PathBuf,
    /// Directory receiving this tool's output files.
    pub outdir: PathBuf,
}

impl OperationContext {
    pub fn new(test: Test, tool: &str, input: &Path, artifacts_dir: &Path) -> Self {
        Self {
            test,
            tool: tool.to_string(),
            input: input.to_path_buf(),
            outdir: artifacts_dir.join(tool),
        }
    }

    /// Output path without extension, e.g. `<outdir>/report.render`.
    pub fn output_base(&self) -> PathBuf {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        self.outdir.join(format!("{stem}.{}", self.test))
    }
}

/// One registered tool. / 一个已注册的工具。
#[derive(Debug, Clone)]
pub struct ToolEntry {
    probe: VersionProbe,
    operations: BTreeMap<Test, Operation>,
    timeouts: BTreeMap<Test, Duration>,
}

impl ToolEntry {
    pub fn probe(&self) -> &VersionProbe {
        &self.probe
    }

    pub fn operation(&self, test: Test) -> Option<&Operation> {
        self.operations.get(&test)
    }

    pub fn tests(&self) -> impl Iterator<Item = Test> + '_ {
        self.operations.keys().copied()
    }

    /// A per-test timeout that overrides the configured default.
    pub fn timeout(&self, test: Test) -> Option<Duration> {
        self.timeouts.get(&test).copied()
    }

    pub fn set_timeout(&mut self, test: Test, timeout: Duration) {
        self.timeouts.insert(test, timeout);
    }
}

/// The registry of benchmarked tools. / 被测工具注册表。
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tools: BTreeMap<String, ToolEntry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the registry for a configuration: the enabled built-in tools
    /// followed by the configured command tools.
    pub fn from_config(config: &BenchConfig) -> Result<Self> {
        let mut registry = Registry::new();
        builtin::register(&mut registry, &config.builtin_tools)?;

        for tool in &config.tools {
            let entry = registry.register_tool(&tool.name, VersionProbe::Command(tool.version.clone()))?;
            for (test, template) in tool.operations() {
                entry_register(entry, &tool.name, test, Operation::Command(template.clone()))?;
            }
            for (test, timeout) in tool.timeouts()? {
                entry.set_timeout(test, timeout);
            }
        }
        Ok(registry)
    }

    /// Declares a tool with its version probe. Names must be unique.
    pub fn register_tool(&mut self, name: &str, probe: VersionProbe) -> Result<&mut ToolEntry> {
        validate_tool_name(name)?;
        if self.tools.contains_key(name) {
            bail!(t!("registry.duplicate_tool", name = name).to_string());
        }
        Ok(self.tools.entry(name.to_string()).or_insert(ToolEntry {
            probe,
            operations: BTreeMap::new(),
            timeouts: BTreeMap::new(),
        }))
    }

    /// Registers the operation implementing `test` for an already declared tool.
    pub fn register(&mut self, tool: &str, test: Test, operation: Operation) -> Result<()> {
        let Some(entry) = self.tools.get_mut(tool) else {
            bail!(t!("registry.unknown_tool", name = tool).to_string());
        };
        entry_register(entry, tool, test, operation)
    }

    pub fn tool(&self, name: &str) -> Option<&ToolEntry> {
        self.tools.get(name)
    }

    pub fn tool_mut(&mut self, name: &str) -> Option<&mut ToolEntry> {
        self.tools.get_mut(name)
    }

    pub fn operation(&self, test: Test, tool: &str) -> Option<&Operation> {
        self.tool(tool).and_then(|entry| entry.operation(test))
    }

    /// Tool names in sorted order.
    pub fn tool_names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn tools(&self) -> impl Iterator<Item = (&str, &ToolEntry)> {
        self.tools.iter().map(|(name, entry)| (name.as_str(), entry))
    }

    /// Every test implemented by at least one tool.
    pub fn tests(&self) -> BTreeSet<Test> {
        self.tools.values().flat_map(|entry| entry.tests()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

fn entry_register(entry: &mut ToolEntry, tool: &str, test: Test, operation: Operation) -> Result<()> {
    if entry.operations.contains_key(&test) {
        bail!(t!("registry.duplicate_operation", tool = tool, test = test).to_string());
    }
    entry.operations.insert(test, operation);
    Ok(())
}

/// Tool names must consist of letters, digits, underscores and hyphens.
pub fn validate_tool_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid {
        bail!(t!("registry.invalid_tool_name", name = name).to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn probe() -> Result<Value, WorkerError> {
        Ok(json!("1.0"))
    }

    fn noop(_ctx: &OperationContext) -> Result<Value, WorkerError> {
        Ok(Value::Null)
    }

    #[test]
    fn registration_is_explicit_and_enumerable() {
        let mut registry = Registry::new();
        registry.register_tool("beta", VersionProbe::Builtin(probe)).unwrap();
        registry.register_tool("alpha", VersionProbe::Builtin(probe)).unwrap();
        registry.register("beta", Test::Text, Operation::Builtin(noop)).unwrap();
        registry.register("alpha", Test::Copy, Operation::Builtin(noop)).unwrap();

        assert_eq!(registry.tool_names().collect::<Vec<_>>(), ["alpha", "beta"]);
        assert_eq!(
            registry.tests().into_iter().collect::<Vec<_>>(),
            [Test::Copy, Test::Text]
        );
        assert!(registry.operation(Test::Copy, "alpha").is_some());
        assert!(registry.operation(Test::Copy, "beta").is_none());
    }

    #[test]
    fn operations_require_a_declared_tool() {
        let mut registry = Registry::new();
        assert!(registry.register("ghost", Test::Copy, Operation::Builtin(noop)).is_err());
    }

    #[test]
    fn duplicates_are_rejected() {
        let mut registry = Registry::new();
        registry.register_tool("alpha", VersionProbe::Builtin(probe)).unwrap();
        assert!(registry.register_tool("alpha", VersionProbe::Builtin(probe)).is_err());
        registry.register("alpha", Test::Copy, Operation::Builtin(noop)).unwrap();
        assert!(registry.register("alpha", Test::Copy, Operation::Builtin(noop)).is_err());
    }

    #[test]
    fn tool_names_are_restricted() {
        assert!(validate_tool_name("pymupdf_mupdf-master2").is_ok());
        assert!(validate_tool_name("").is_err());
        assert!(validate_tool_name("../evil").is_err());
        assert!(validate_tool_name("with space").is_err());
    }

    #[test]
    fn output_base_lives_under_the_tool_directory() {
        let ctx = OperationContext::new(
            Test::Render,
            "poppler",
            Path::new("/corpus/pandas.pdf"),
            Path::new("/tmp/artifacts"),
        );
        assert_eq!(ctx.output_base(), PathBuf::from("/tmp/artifacts/poppler/pandas.render"));
    }
}
