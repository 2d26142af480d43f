//! # Result Publishing Module / 结果发布模块
//!
//! Pushes a report to a git results repository. The deploy key is read
//! from an environment variable; when the variable is unset publishing is
//! skipped and the run still succeeds.
//!
//! 将报告推送到 Git 结果仓库。部署密钥从环境变量读取；
//! 若该变量未设置则跳过发布，运行仍视为成功。

use anyhow::{bail, Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info};

use crate::core::config::PublishConfig;
use crate::core::models::Report;
use crate::infra::{command::spawn_and_capture, t};
use crate::reporting::json::write_named;

/// Publishes `report` as `name` with the alias `latest`.
///
/// Returns `false` when publishing was skipped for lack of a key.
///
/// 以 `name` 发布 `report`，并创建别名 `latest`。若因缺少密钥而跳过发布，返回 `false`。
pub async fn publish_report(config: &PublishConfig, report: &Report, name: &str, latest: &str) -> Result<bool> {
    let Ok(key) = std::env::var(&config.key_env) else {
        info!(key_env = %config.key_env, "publishing skipped, key not set");
        println!("{}", t!("publish.skipped", var = &config.key_env).yellow());
        return Ok(false);
    };

    let workdir = tempfile::Builder::new()
        .prefix("pdfperf_publish_")
        .tempdir()
        .context(t!("publish.workdir_failed").to_string())?;
    let key_path = workdir.path().join("ssh_id");

    let result = match write_key(&key_path, &key) {
        Ok(()) => push(config, report, name, latest, workdir.path(), &key_path).await,
        Err(e) => Err(e),
    };
    if key_path.exists() {
        let _ = fs::remove_file(&key_path);
    }
    result?;

    println!("{}", t!("publish.done", remote = &config.remote, name = name).green());
    Ok(true)
}

#[cfg(unix)]
fn write_key(path: &Path, key: &str) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
        .with_context(|| t!("publish.key_failed", path = path.display()).to_string())?;
    file.write_all(key.as_bytes())?;
    if !key.ends_with('\n') {
        file.write_all(b"\n")?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn write_key(path: &Path, key: &str) -> Result<()> {
    fs::write(path, key).with_context(|| t!("publish.key_failed", path = path.display()).to_string())
}

async fn push(
    config: &PublishConfig,
    report: &Report,
    name: &str,
    latest: &str,
    workdir: &Path,
    key_path: &Path,
) -> Result<()> {
    let ssh_command = format!(
        "ssh -i {} -o IdentitiesOnly=yes",
        shlex::try_quote(&key_path.to_string_lossy())?
    );
    let repo: PathBuf = workdir.join("results");

    git(workdir, &ssh_command, &["clone", &config.remote, "results"]).await?;
    git(&repo, &ssh_command, &["config", "user.name", &config.user_name]).await?;
    git(&repo, &ssh_command, &["config", "user.email", &config.user_email]).await?;

    write_named(report, &repo, name, latest)?;

    git(&repo, &ssh_command, &["add", name, latest]).await?;
    let message = format!("{name}: new performance results.");
    git(&repo, &ssh_command, &["commit", "-m", &message]).await?;
    git(&repo, &ssh_command, &["push", "origin", "HEAD"]).await?;
    Ok(())
}

async fn git(dir: &Path, ssh_command: &str, args: &[&str]) -> Result<()> {
    debug!(dir = %dir.display(), ?args, "running git");
    let mut cmd = Command::new("git");
    cmd.args(args)
        .current_dir(dir)
        .env("GIT_SSH_COMMAND", ssh_command)
        .stdin(std::process::Stdio::null());

    let (status, output) = spawn_and_capture(cmd).await;
    let status = status.with_context(|| t!("publish.git_failed", args = args.join(" ")).to_string())?;
    if !status.success() {
        bail!(
            "{}\n{}",
            t!("publish.git_failed", args = args.join(" ")),
            output.trim()
        );
    }
    Ok(())
}
