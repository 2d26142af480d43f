//! # Configuration Module / 配置模块
//!
//! The benchmark configuration, loaded from a TOML file (`pdfperf.toml` by
//! default). Relative paths are resolved against the directory containing
//! the configuration file.
//!
//! 基准测试配置，从 TOML 文件（默认 `pdfperf.toml`）加载。
//! 相对路径基于配置文件所在目录解析。

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::models::Test;
use crate::core::registry::validate_tool_name;
use crate::core::tools::{builtin::BUILTIN_TOOLS, command::CommandTemplate};
use crate::infra::t;

/// Upper bound accepted for any configured duration, one week.
const MAX_SECS: f64 = 7.0 * 24.0 * 3600.0;

/// A command-line tool under test. / 被测的命令行工具。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ToolConfig {
    /// Unique tool name, e.g. `"poppler"`. / 唯一的工具名称。
    pub name: String,
    /// Command whose combined output describes the tool's version.
    /// 其合并输出描述工具版本的命令。
    pub version: CommandTemplate,
    #[serde(default)]
    pub copy: Option<CommandTemplate>,
    #[serde(default)]
    pub render: Option<CommandTemplate>,
    #[serde(default)]
    pub text: Option<CommandTemplate>,
    /// Per-test timeouts in seconds overriding `default_timeout_secs`.
    /// 按测试覆盖 `default_timeout_secs` 的超时时间（秒）。
    #[serde(default)]
    pub timeout_secs: BTreeMap<Test, f64>,
}

impl ToolConfig {
    /// The configured operations, in test order.
    pub fn operations(&self) -> impl Iterator<Item = (Test, &CommandTemplate)> {
        [
            (Test::Copy, self.copy.as_ref()),
            (Test::Render, self.render.as_ref()),
            (Test::Text, self.text.as_ref()),
        ]
        .into_iter()
        .filter_map(|(test, template)| template.map(|t| (test, t)))
    }

    pub fn timeouts(&self) -> Result<Vec<(Test, Duration)>> {
        self.timeout_secs
            .iter()
            .map(|(test, secs)| Ok((*test, seconds(*secs, "timeout_secs")?)))
            .collect()
    }
}

/// Where and how results are published. / 结果的发布位置和方式。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PublishConfig {
    /// Git remote of the results repository. / 结果仓库的 Git 远程地址。
    pub remote: String,
    /// Environment variable holding the deploy key. Publishing is skipped
    /// when it is unset.
    #[serde(default = "default_key_env")]
    pub key_env: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default = "default_user_email")]
    pub user_email: String,
}

/// The complete benchmark configuration. / 完整的基准测试配置。
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BenchConfig {
    /// The language for output messages (e.g., "en", "zh-CN").
    /// 输出消息的语言（例如 "en", "zh-CN"）。
    #[serde(default = "default_language")]
    pub language: String,
    /// Input PDF files, in the order they are benchmarked.
    /// 输入 PDF 文件，按基准测试顺序排列。
    #[serde(default)]
    pub corpus: Vec<PathBuf>,
    /// Directory receiving JSON reports and CSV logs.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Directory receiving the files produced by the operations.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_timeout_secs")]
    pub default_timeout_secs: f64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: f64,
    /// Time allowed for each step of the timeout escalation ladder.
    #[serde(default = "default_grace_period_secs")]
    pub grace_period_secs: f64,
    /// Discard the output of worker processes.
    #[serde(default)]
    pub quiet_workers: bool,
    /// Built-in tools to enable. / 要启用的内置工具。
    #[serde(default = "default_builtin_tools")]
    pub builtin_tools: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub publish: Option<PublishConfig>,
    /// Directory containing the configuration file; set by [`load_config`].
    #[serde(skip)]
    pub base_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            corpus: Vec::new(),
            output_dir: default_output_dir(),
            artifacts_dir: default_artifacts_dir(),
            default_timeout_secs: default_timeout_secs(),
            probe_timeout_secs: default_probe_timeout_secs(),
            grace_period_secs: default_grace_period_secs(),
            quiet_workers: false,
            builtin_tools: default_builtin_tools(),
            tools: Vec::new(),
            publish: None,
            base_dir: PathBuf::from("."),
        }
    }
}

impl BenchConfig {
    /// Parses and validates a configuration from TOML text.
    pub fn from_toml(content: &str, base_dir: &Path) -> Result<Self> {
        let mut config: BenchConfig =
            toml::from_str(content).with_context(|| t!("config.parse_failed").to_string())?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        seconds(self.default_timeout_secs, "default_timeout_secs")?;
        seconds(self.probe_timeout_secs, "probe_timeout_secs")?;
        seconds(self.grace_period_secs, "grace_period_secs")?;

        for name in &self.builtin_tools {
            if !BUILTIN_TOOLS.contains(&name.as_str()) {
                bail!(t!("registry.unknown_builtin", name = name).to_string());
            }
        }
        for tool in &self.tools {
            validate_tool_name(&tool.name)?;
            tool.timeouts()?;
        }
        Ok(())
    }

    /// Resolves a path from the configuration against its directory.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn corpus_paths(&self) -> Vec<PathBuf> {
        self.corpus.iter().map(|p| self.resolve(p)).collect()
    }

    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output_dir)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.resolve(&self.artifacts_dir)
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.default_timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.probe_timeout_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs_f64(self.grace_period_secs)
    }
}

/// Loads the configuration file at `path`.
pub fn load_config(path: &Path) -> Result<BenchConfig> {
    let path = fs::canonicalize(path)
        .with_context(|| t!("config.read_failed", path = path.display()).to_string())?;
    let content = fs::read_to_string(&path)
        .with_context(|| t!("config.read_failed", path = path.display()).to_string())?;
    let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
    BenchConfig::from_toml(&content, &base_dir)
}

/// Validates a positive, finite number of seconds.
pub fn seconds(value: f64, field: &str) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 || value > MAX_SECS {
        bail!(t!("config.invalid_seconds", field = field, value = value).to_string());
    }
    Ok(Duration::from_secs_f64(value))
}

fn default_language() -> String {
    "en".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("bench-artifacts")
}

fn default_timeout_secs() -> f64 {
    300.0
}

fn default_probe_timeout_secs() -> f64 {
    30.0
}

fn default_grace_period_secs() -> f64 {
    10.0
}

fn default_builtin_tools() -> Vec<String> {
    BUILTIN_TOOLS.iter().map(|s| s.to_string()).collect()
}

fn default_key_env() -> String {
    "PDFPERF_RESULTS_KEY".to_string()
}

fn default_user_name() -> String {
    "pdfperf".to_string()
}

fn default_user_email() -> String {
    "pdfperf@localhost".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_an_empty_file() {
        let config = BenchConfig::from_toml("", Path::new("/bench")).unwrap();
        assert_eq!(config.language, "en");
        assert_eq!(config.default_timeout(), Duration::from_secs(300));
        assert_eq!(config.probe_timeout(), Duration::from_secs(30));
        assert_eq!(config.grace_period(), Duration::from_secs(10));
        assert_eq!(config.builtin_tools, ["lopdf"]);
        assert_eq!(config.output_dir(), PathBuf::from("/bench/results"));
    }

    #[test]
    fn tools_and_timeouts_are_read() {
        let config = BenchConfig::from_toml(
            r#"
corpus = ["a.pdf", "/abs/b.pdf"]

[[tools]]
name = "poppler"
version = "pdftotext -v"
render = "pdftoppm -r 150 -png {input} {output}"
timeout_secs = { render = 600 }
"#,
            Path::new("/bench"),
        )
        .unwrap();

        assert_eq!(
            config.corpus_paths(),
            [PathBuf::from("/bench/a.pdf"), PathBuf::from("/abs/b.pdf")]
        );
        let tool = &config.tools[0];
        assert_eq!(tool.operations().map(|(t, _)| t).collect::<Vec<_>>(), [Test::Render]);
        assert_eq!(tool.timeouts().unwrap(), [(Test::Render, Duration::from_secs(600))]);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(BenchConfig::from_toml("default_timeout_secs = 0", Path::new(".")).is_err());
        assert!(BenchConfig::from_toml("grace_period_secs = -1.0", Path::new(".")).is_err());
        assert!(BenchConfig::from_toml(r#"builtin_tools = ["pdfium"]"#, Path::new(".")).is_err());
        assert!(BenchConfig::from_toml(
            "[[tools]]\nname = \"bad name\"\nversion = \"true\"",
            Path::new(".")
        )
        .is_err());
        assert!(BenchConfig::from_toml(
            "[[tools]]\nname = \"empty\"\nversion = \"\"",
            Path::new(".")
        )
        .is_err());
    }
}
