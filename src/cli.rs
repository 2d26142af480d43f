//! # Command-Line Interface / 命令行接口
//!
//! Builds the `pdfperf` command tree with localized help and dispatches to
//! the subcommands in [`commands`].

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::{env, path::PathBuf, process::ExitCode, time::Duration};

use crate::core::config::seconds;
use crate::core::models::Test;
use crate::infra::t;

pub mod commands;

/// Default configuration file name. / 默认配置文件名。
pub const DEFAULT_CONFIG: &str = "pdfperf.toml";

/// Pre-parses the command line arguments to find the language setting.
/// This allows i18n to be initialized before the full CLI is built.
/// Returns `None` when no `--lang` argument is present.
fn pre_parse_language() -> Option<String> {
    let args: Vec<String> = env::args().collect();
    args.iter()
        .position(|arg| arg == "--lang")
        .and_then(|pos| args.get(pos + 1).cloned())
        .or_else(|| {
            args.iter()
                .find_map(|arg| arg.strip_prefix("--lang=").map(str::to_string))
        })
}

fn parse_test(value: &str) -> Result<Test> {
    value.parse()
}

fn parse_seconds(value: &str) -> Result<Duration> {
    let secs: f64 = value
        .parse()
        .with_context(|| t!("cli.invalid_seconds", value = value).to_string())?;
    seconds(secs, "--timeout")
}

fn config_arg(locale: &str) -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help(t!("cli.arg_config", locale = locale).to_string())
        .value_name("CONFIG")
        .default_value(DEFAULT_CONFIG)
        .value_parser(clap::value_parser!(PathBuf))
        .action(ArgAction::Set)
}

pub fn build_cli(locale: &str) -> Command {
    Command::new("pdfperf")
        .version(env!("CARGO_PKG_VERSION"))
        .about(t!("cli.about", locale = locale).to_string())
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("lang")
                .long("lang")
                .help(t!("cli.arg_lang", locale = locale).to_string())
                .value_name("LANGUAGE")
                .global(true)
                .action(ArgAction::Set),
        )
        .subcommand(
            Command::new("run")
                .about(t!("cli.cmd_run", locale = locale).to_string())
                .arg(config_arg(locale))
                .arg(
                    Arg::new("test")
                        .long("test")
                        .help(t!("cli.arg_test", locale = locale).to_string())
                        .value_name("TEST")
                        .value_parser(parse_test)
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("tool")
                        .long("tool")
                        .help(t!("cli.arg_tool", locale = locale).to_string())
                        .value_name("TOOL")
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("path")
                        .long("path")
                        .help(t!("cli.arg_path", locale = locale).to_string())
                        .value_name("PATH")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .help(t!("cli.arg_timeout", locale = locale).to_string())
                        .value_name("SECONDS")
                        .value_parser(parse_seconds)
                        .conflicts_with("no-timeout")
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("no-timeout")
                        .long("no-timeout")
                        .help(t!("cli.arg_no_timeout", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("internal-check")
                        .long("internal-check")
                        .help(t!("cli.arg_internal_check", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("html")
                        .long("html")
                        .help(t!("cli.arg_html", locale = locale).to_string())
                        .value_name("HTML")
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("no-publish")
                        .long("no-publish")
                        .help(t!("cli.arg_no_publish", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("init")
                .about(t!("cli.cmd_init", locale = locale).to_string())
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .help(t!("cli.arg_output", locale = locale).to_string())
                        .value_name("PATH")
                        .default_value(DEFAULT_CONFIG)
                        .value_parser(clap::value_parser!(PathBuf))
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("non-interactive")
                        .long("non-interactive")
                        .help(t!("cli.arg_non_interactive", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .help(t!("cli.arg_force", locale = locale).to_string())
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("tools")
                .about(t!("cli.cmd_tools", locale = locale).to_string())
                .arg(config_arg(locale)),
        )
        .subcommand(
            Command::new("worker")
                .hide(true)
                .arg(
                    Arg::new("config")
                        .long("config")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("channel")
                        .long("channel")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(Arg::new("tool").long("tool").required(true))
                .arg(
                    Arg::new("test")
                        .long("test")
                        .value_parser(parse_test)
                        .requires("path"),
                )
                .arg(
                    Arg::new("path")
                        .long("path")
                        .value_parser(clap::value_parser!(PathBuf))
                        .requires("test"),
                ),
        )
}

/// Parses the command line and runs the selected subcommand.
pub async fn run() -> Result<ExitCode> {
    // Pre-parse language and initialize i18n first.
    let language = pre_parse_language();
    match &language {
        Some(lang) => crate::set_language(lang),
        None => crate::init(),
    }
    let locale = rust_i18n::locale().to_string();

    let matches = build_cli(&locale).get_matches();
    dispatch(&matches, language.as_deref()).await
}

async fn dispatch(matches: &ArgMatches, language: Option<&str>) -> Result<ExitCode> {
    match matches.subcommand() {
        Some(("run", m)) => {
            let args = commands::run::RunArgs {
                config: required_path(m, "config"),
                tests: m.get_many::<Test>("test").into_iter().flatten().copied().collect(),
                tools: m.get_many::<String>("tool").into_iter().flatten().cloned().collect(),
                paths: m.get_many::<PathBuf>("path").into_iter().flatten().cloned().collect(),
                timeout: m.get_one::<Duration>("timeout").copied(),
                no_timeout: m.get_flag("no-timeout"),
                internal_check: m.get_flag("internal-check"),
                html: m.get_one::<PathBuf>("html").cloned(),
                no_publish: m.get_flag("no-publish"),
                language: language.map(str::to_string),
            };
            commands::run::execute(args).await
        }
        Some(("init", m)) => {
            let output = required_path(m, "output");
            commands::init::execute(&output, m.get_flag("non-interactive"), m.get_flag("force"))?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("tools", m)) => {
            commands::tools::execute(&required_path(m, "config"), language)?;
            Ok(ExitCode::SUCCESS)
        }
        Some(("worker", m)) => {
            let code = commands::worker::execute(
                &required_path(m, "config"),
                &required_path(m, "channel"),
                m.get_one::<String>("tool").cloned().unwrap_or_default(),
                m.get_one::<Test>("test").copied(),
                m.get_one::<PathBuf>("path").cloned(),
            )
            .await;
            Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
        }
        // Clap has already printed help for a missing subcommand.
        _ => Ok(ExitCode::SUCCESS),
    }
}

/// Arguments with a default value or marked required are always present.
fn required_path(matches: &ArgMatches, id: &str) -> PathBuf {
    matches.get_one::<PathBuf>(id).cloned().unwrap_or_default()
}
