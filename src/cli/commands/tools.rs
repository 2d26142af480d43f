//! # Tools Command Module / 工具命令模块
//!
//! Lists the registered tools and the tests each one implements.
//!
//! 列出已注册的工具及其实现的测试。

use anyhow::Result;
use colored::*;
use std::path::Path;

use crate::core::config::load_config;
use crate::core::registry::{Registry, VersionProbe};
use crate::infra::t;

pub fn execute(config_path: &Path, language: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let locale = language.unwrap_or(&config.language).to_string();
    crate::set_language(&locale);
    let registry = Registry::from_config(&config)?;

    println!("{}", t!("tools.banner", locale = &locale).bold());
    for (name, entry) in registry.tools() {
        let kind = match entry.probe() {
            VersionProbe::Builtin(_) => t!("tools.builtin", locale = &locale),
            VersionProbe::Command(_) => t!("tools.command", locale = &locale),
        };
        let tests: Vec<&str> = entry.tests().map(|test| test.as_str()).collect();
        println!("  - {:<16} {:<10} {}", name.green(), kind.dimmed(), tests.join(", "));
    }
    Ok(())
}
