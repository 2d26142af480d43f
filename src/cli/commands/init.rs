//! # Init Command Module / 初始化命令模块
//!
//! This module implements the `init` command, which writes a starter
//! `pdfperf.toml`. The interactive wizard asks which command-line tool
//! presets to include; `--non-interactive` writes the default selection.
//!
//! 此模块实现了 `init` 命令，用于生成初始的 `pdfperf.toml`。
//! 交互式向导会询问要包含哪些命令行工具预设；`--non-interactive` 则写入默认选择。

use anyhow::{Context, Result};
use colored::*;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, MultiSelect};
use std::{fs, path::Path};

use crate::infra::t;

const CONFIG_HEADER: &str = r#"# pdfperf benchmark configuration / pdfperf 基准测试配置

# Language for output messages / 输出消息的语言
language = "en"

# Directories are relative to this file / 目录相对于本文件
output_dir = "results"
artifacts_dir = "bench-artifacts"

# Timeouts in seconds / 超时时间（秒）
default_timeout_secs = 300
probe_timeout_secs = 30
grace_period_secs = 10

# Built-in tools linked into pdfperf / 内置于 pdfperf 的工具
builtin_tools = ["lopdf"]
"#;

/// A command-line tool preset offered by the wizard.
struct Preset {
    label_key: &'static str,
    default_selected: bool,
    body: &'static str,
}

const PRESETS: &[Preset] = &[
    Preset {
        label_key: "init.preset_poppler",
        default_selected: true,
        body: r#"[[tools]]
name = "poppler"
version = "pdftotext -v"
render = "pdftoppm -r 150 -png {input} {output}"
text = "pdftotext {input} {output}.txt"
"#,
    },
    Preset {
        label_key: "init.preset_mupdf",
        default_selected: true,
        body: r#"[[tools]]
name = "mupdf"
version = "mutool -v"
copy = "mutool clean {input} {output}.pdf"
render = "mutool draw -r 150 -o {output}-%d.png {input}"
text = "mutool draw -F txt -o {output}.txt {input}"
"#,
    },
    Preset {
        label_key: "init.preset_qpdf",
        default_selected: false,
        body: r#"[[tools]]
name = "qpdf"
version = "qpdf --version"
copy = "qpdf {input} {output}.pdf"
"#,
    },
];

const DEFAULT_CORPUS: &str = "corpus/sample.pdf";

/// Renders a configuration file from the selected presets.
fn render_config(corpus: &[String], presets: &[&Preset]) -> String {
    let mut config = String::from(CONFIG_HEADER);
    config.push_str("\n# Input files, benchmarked in this order / 输入文件，按此顺序测试\ncorpus = [\n");
    for path in corpus {
        config.push_str(&format!("    {},\n", toml_string(path)));
    }
    config.push_str("]\n");

    for preset in presets {
        config.push('\n');
        config.push_str(preset.body);
    }
    config
}

fn toml_string(value: &str) -> String {
    toml::Value::String(value.to_string()).to_string()
}

/// Executes the init command.
///
/// # Arguments
/// * `output` - Path of the configuration file to write
/// * `non_interactive` - Write the default configuration without prompting
/// * `force` - Overwrite an existing file
pub fn execute(output: &Path, non_interactive: bool, force: bool) -> Result<()> {
    let theme = ColorfulTheme::default();

    if !non_interactive {
        println!("\n{}", t!("init.welcome").cyan().bold());
        println!("{}", t!("init.description"));
    }

    if output.exists() && !force {
        if non_interactive {
            println!("{}", t!("init.file_exists", path = output.display()).red());
            println!("{}", t!("init.use_force").yellow());
            return Ok(());
        }
        let confirmation = Confirm::with_theme(&theme)
            .with_prompt(t!("init.overwrite_prompt", path = output.display()).to_string())
            .default(false)
            .interact()
            .context(t!("init.prompt_failed").to_string())?;
        if !confirmation {
            println!("{}", t!("init.aborted").yellow());
            return Ok(());
        }
    }

    let content = if non_interactive {
        let presets: Vec<&Preset> = PRESETS.iter().filter(|p| p.default_selected).collect();
        render_config(&[DEFAULT_CORPUS.to_string()], &presets)
    } else {
        prompt_for_config(&theme)?
    };

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| t!("init.create_parent_dir_failed", path = parent.display()).to_string())?;
    }
    fs::write(output, content).with_context(|| t!("init.write_failed", path = output.display()).to_string())?;

    println!("{}", t!("init.success", path = output.display()).green());
    println!("{}", t!("init.next_steps"));
    Ok(())
}

fn prompt_for_config(theme: &ColorfulTheme) -> Result<String> {
    let corpus: String = Input::with_theme(theme)
        .with_prompt(t!("init.corpus_prompt").to_string())
        .default(DEFAULT_CORPUS.to_string())
        .interact_text()
        .context(t!("init.prompt_failed").to_string())?;
    let corpus: Vec<String> = corpus
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let labels: Vec<String> = PRESETS
        .iter()
        .map(|p| t!(p.label_key).to_string())
        .collect();
    let defaults: Vec<bool> = PRESETS.iter().map(|p| p.default_selected).collect();
    let selections = MultiSelect::with_theme(theme)
        .with_prompt(t!("init.preset_prompt").to_string())
        .items(&labels)
        .defaults(&defaults)
        .interact()
        .context(t!("init.prompt_failed").to_string())?;

    if selections.is_empty() {
        println!("{}", t!("init.no_presets").yellow());
    }
    let presets: Vec<&Preset> = selections.into_iter().map(|i| &PRESETS[i]).collect();
    Ok(render_config(&corpus, &presets))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::BenchConfig;

    #[test]
    fn rendered_config_loads() {
        let presets: Vec<&Preset> = PRESETS.iter().collect();
        let text = render_config(&["corpus/a b.pdf".to_string()], &presets);
        let config = BenchConfig::from_toml(&text, Path::new("/bench")).unwrap();
        assert_eq!(config.corpus, [std::path::PathBuf::from("corpus/a b.pdf")]);
        let names: Vec<&str> = config.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["poppler", "mupdf", "qpdf"]);
    }

    #[test]
    fn non_interactive_init_respects_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pdfperf.toml");
        fs::write(&path, "keep").unwrap();

        execute(&path, true, false).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep");

        execute(&path, true, true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("name = \"poppler\""));
    }
}
