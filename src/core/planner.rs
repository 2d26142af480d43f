//! # Benchmark Execution Planner Module / 基准测试执行计划模块
//!
//! This module turns the registry and the corpus into the ordered test
//! matrix: tests sorted, then input files in configured order, then tools
//! sorted. Only `(test, tool)` pairs with a registered operation become
//! cells. It also applies the command-line filters and picks the timeout of
//! every cell.
//!
//! 此模块将注册表和语料库转换为有序的测试矩阵：先按测试排序，
//! 再按配置顺序排列输入文件，最后按工具排序。只有已注册操作的 `(测试, 工具)` 组合才会成为单元。
//! 它还会应用命令行过滤条件并确定每个单元的超时时间。

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::config::BenchConfig;
use crate::core::models::Test;
use crate::core::registry::Registry;
use crate::infra::t;

/// File name prefix of complete runs.
pub const RESULTS_PREFIX: &str = "results";
/// File name prefix of filtered runs and internal checks.
pub const INTERNAL_RESULTS_PREFIX: &str = "internal_results";

/// Restrictions and overrides requested on the command line.
/// 命令行请求的限制和覆盖选项。
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub tests: Vec<Test>,
    pub tools: Vec<String>,
    pub paths: Vec<PathBuf>,
    /// Replaces every configured timeout. / 替换所有配置的超时时间。
    pub timeout: Option<Duration>,
    /// Runs every invocation without a time bound. / 所有调用均不限时。
    pub no_timeout: bool,
    /// Records fixed results without running anything.
    pub internal_check: bool,
}

impl PlanOptions {
    fn is_filtered(&self) -> bool {
        !self.tests.is_empty() || !self.tools.is_empty() || !self.paths.is_empty() || self.internal_check
    }
}

/// One timed `(test, tool, file)` combination.
/// 一个计时的 `(测试, 工具, 文件)` 组合。
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub test: Test,
    pub tool: String,
    pub path: PathBuf,
    /// `None` means no bound. / `None` 表示不限时。
    pub timeout: Option<Duration>,
}

/// Represents a complete execution plan for the benchmark matrix.
/// 表示基准测试矩阵的完整执行计划。
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Cells in execution order. / 按执行顺序排列的单元。
    pub cells: Vec<Cell>,
    /// Tools whose version is probed before the matrix runs.
    pub probe_tools: Vec<String>,
    pub probe_timeout: Option<Duration>,
    /// Whether filters or the internal check restrict this run.
    /// 此次运行是否受过滤条件或内部检查限制。
    pub is_filtered: bool,
    pub internal_check: bool,
}

impl ExecutionPlan {
    /// Prefix of the report file names written for this plan.
    pub fn result_prefix(&self) -> &'static str {
        if self.is_filtered {
            INTERNAL_RESULTS_PREFIX
        } else {
            RESULTS_PREFIX
        }
    }
}

/// Creates an execution plan for the registered tools and the configured corpus.
///
/// # Errors
/// Fails when a filter names a tool, test or file that is not part of the
/// matrix.
///
/// 为已注册的工具和配置的语料库创建执行计划。
pub fn plan_execution(registry: &Registry, config: &BenchConfig, options: &PlanOptions) -> Result<ExecutionPlan> {
    for tool in &options.tools {
        if registry.tool(tool).is_none() {
            bail!(t!("plan.unknown_tool", name = tool).to_string());
        }
    }
    let implemented = registry.tests();
    for test in &options.tests {
        if !implemented.contains(test) {
            bail!(t!("plan.unknown_test", name = test).to_string());
        }
    }

    let paths = select_paths(config, &options.paths)?;
    let selected_tools: Vec<&str> = registry
        .tool_names()
        .filter(|name| options.tools.is_empty() || options.tools.iter().any(|t| t.as_str() == *name))
        .collect();

    let mut cells = Vec::new();
    for test in implemented {
        if !options.tests.is_empty() && !options.tests.contains(&test) {
            continue;
        }
        for path in &paths {
            for tool in &selected_tools {
                let Some(entry) = registry.tool(tool) else { continue };
                if entry.operation(test).is_none() {
                    continue;
                }
                let timeout = if options.no_timeout {
                    None
                } else {
                    Some(
                        options
                            .timeout
                            .or_else(|| entry.timeout(test))
                            .unwrap_or_else(|| config.default_timeout()),
                    )
                };
                cells.push(Cell {
                    test,
                    tool: tool.to_string(),
                    path: path.clone(),
                    timeout,
                });
            }
        }
    }

    Ok(ExecutionPlan {
        cells,
        probe_tools: selected_tools.iter().map(|s| s.to_string()).collect(),
        probe_timeout: (!options.no_timeout).then(|| config.probe_timeout()),
        is_filtered: options.is_filtered(),
        internal_check: options.internal_check,
    })
}

/// Corpus files in configured order, restricted to `filters` when given.
/// A filter matches an entry as configured, as resolved, or by file name.
fn select_paths(config: &BenchConfig, filters: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let corpus: Vec<(PathBuf, PathBuf)> = config
        .corpus
        .iter()
        .map(|p| (p.clone(), config.resolve(p)))
        .collect();
    if filters.is_empty() {
        return Ok(corpus.into_iter().map(|(_, resolved)| resolved).collect());
    }

    let is_match = |filter: &Path, configured: &Path, resolved: &Path| {
        filter == configured || filter == resolved || resolved.file_name() == Some(filter.as_os_str())
    };
    for filter in filters {
        if !corpus.iter().any(|(c, r)| is_match(filter, c, r)) {
            bail!(t!("plan.unknown_path", path = filter.display()).to_string());
        }
    }
    Ok(corpus
        .into_iter()
        .filter(|(c, r)| filters.iter().any(|f| is_match(f, c, r)))
        .map(|(_, resolved)| resolved)
        .collect())
}
