//! # File System Operations Module / 文件系统操作模块
//!
//! This module provides utilities for file system operations,
//! such as creating output directories and maintaining "latest" aliases
//! of report files.
//!
//! 此模块提供文件系统操作的实用功能，
//! 如创建输出目录和维护报告文件的 "latest" 别名。

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::infra::t;

/// Creates `path` and its parents if needed.
pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .with_context(|| t!("fs.create_dir_failed", path = path.display()).to_string())
}

/// Points `alias` at `target`, replacing any existing alias.
///
/// On unix the alias is a relative symlink when both live in the same
/// directory; elsewhere it is a copy of the target.
///
/// 使 `alias` 指向 `target`，替换已有的别名。
pub fn update_alias(target: &Path, alias: &Path) -> Result<()> {
    if alias.symlink_metadata().is_ok() {
        fs::remove_file(alias)
            .with_context(|| t!("fs.remove_failed", path = alias.display()).to_string())?;
    }
    link_or_copy(target, alias)
        .with_context(|| t!("fs.alias_failed", path = alias.display()).to_string())
}

#[cfg(unix)]
fn link_or_copy(target: &Path, alias: &Path) -> std::io::Result<()> {
    let link_target = match (target.parent(), alias.parent(), target.file_name()) {
        (Some(a), Some(b), Some(name)) if a == b => PathBuf::from(name),
        _ => target.to_path_buf(),
    };
    std::os::unix::fs::symlink(link_target, alias)
}

#[cfg(not(unix))]
fn link_or_copy(target: &Path, alias: &Path) -> std::io::Result<()> {
    fs::copy(target, alias).map(|_| ())
}

/// Renders `path` relative to `base` when it lives below it.
pub fn display_relative(path: &Path, base: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .display()
        .to_string()
}
