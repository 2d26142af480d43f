//! Command-line tools driven through command templates.
//!
//! A template such as `pdftoppm -r 150 -png {input} {output}` is expanded in
//! three steps: environment variables and `~` are expanded, the result is
//! split into arguments shell-style, and finally the `{input}`, `{output}`
//! and `{outdir}` placeholders are substituted inside each argument, so
//! paths containing spaces stay single arguments.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::core::models::WorkerError;
use crate::core::registry::OperationContext;
use crate::infra::{command::spawn_and_capture, t};

/// A validated command template. / 经过验证的命令模板。
#[derive(Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    raw: String,
}

impl CommandTemplate {
    /// Checks that the template splits into a non-empty argument list.
    pub fn parse(raw: &str) -> Result<Self> {
        let parts = shlex::split(raw)
            .ok_or_else(|| anyhow::anyhow!(t!("command.parse_failed", command = raw).to_string()))?;
        if parts.is_empty() {
            anyhow::bail!(t!("command.empty", command = raw).to_string());
        }
        Ok(Self { raw: raw.to_string() })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Expands the template into a program and its arguments.
    pub fn argv(&self, ctx: Option<&OperationContext>) -> Result<Vec<String>> {
        let expanded = shellexpand::full(&self.raw)
            .with_context(|| t!("command.expand_failed", command = &self.raw).to_string())?
            .to_string();
        let parts = shlex::split(&expanded)
            .ok_or_else(|| anyhow::anyhow!(t!("command.parse_failed", command = &expanded).to_string()))?;
        if parts.is_empty() {
            anyhow::bail!(t!("command.empty", command = &expanded).to_string());
        }

        let Some(ctx) = ctx else { return Ok(parts) };
        let input = ctx.input.display().to_string();
        let output = ctx.output_base().display().to_string();
        let outdir = ctx.outdir.display().to_string();
        Ok(parts
            .into_iter()
            .map(|part| {
                part.replace("{input}", &input)
                    .replace("{output}", &output)
                    .replace("{outdir}", &outdir)
            })
            .collect())
    }

    fn command(&self, ctx: Option<&OperationContext>) -> Result<(Command, String)> {
        let argv = self.argv(ctx)?;
        let shown = shlex::try_join(argv.iter().map(String::as_str)).unwrap_or_else(|_| argv.join(" "));
        let mut cmd = Command::new(&argv[0]);
        cmd.args(&argv[1..]).kill_on_drop(true);
        Ok((cmd, shown))
    }
}

impl fmt::Debug for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandTemplate").field(&self.raw).finish()
    }
}

impl fmt::Display for CommandTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for CommandTemplate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for CommandTemplate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        CommandTemplate::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn setup_error(e: anyhow::Error) -> WorkerError {
    WorkerError::new("command", format!("{e:#}"))
}

/// Runs a tool's version command; its trimmed combined output is the version.
pub async fn probe_version(template: &CommandTemplate) -> Result<Value, WorkerError> {
    let (mut cmd, shown) = template.command(None).map_err(setup_error)?;
    cmd.stdin(Stdio::null());

    let (status, output) = unless_terminated(&shown, spawn_and_capture(cmd)).await?;
    let status = status.map_err(|e| WorkerError::new("io", format!("{shown}: {e}")))?;
    if !status.success() {
        return Err(WorkerError::new(
            "command",
            format!("`{shown}` exited with {status}: {}", output.trim()),
        ));
    }
    Ok(json!(output.trim()))
}

/// Runs one operation of a command-line tool on one input file.
///
/// The tool's output streams are shared with the worker.
pub async fn run_operation(template: &CommandTemplate, ctx: &OperationContext) -> Result<Value, WorkerError> {
    tokio::fs::create_dir_all(&ctx.outdir)
        .await
        .map_err(|e| WorkerError::new("io", format!("{}: {e}", ctx.outdir.display())))?;

    let (mut cmd, shown) = template.command(Some(ctx)).map_err(setup_error)?;
    cmd.stdin(Stdio::null());
    debug!(command = %shown, "running tool command");

    let mut child = cmd
        .spawn()
        .map_err(|e| WorkerError::new("io", format!("failed to run `{shown}`: {e}")))?;

    let status = unless_terminated(&shown, async move { child.wait().await })
        .await?
        .map_err(|e| WorkerError::new("io", e.to_string()))?;

    if status.success() {
        Ok(json!({ "command": shown, "status": 0 }))
    } else {
        Err(WorkerError::new("command", format!("`{shown}` exited with {status}")))
    }
}

/// Drives `work` unless the worker is asked to terminate first.
///
/// `work` owns the tool's child process, which is spawned with
/// `kill_on_drop`, so abandoning it on a termination request kills the tool.
async fn unless_terminated<F: Future>(shown: &str, work: F) -> Result<F::Output, WorkerError> {
    tokio::select! {
        output = work => Ok(output),
        _ = termination_requested() => {
            debug!(command = %shown, "termination requested, stopping tool");
            Err(WorkerError::new("terminated", format!("`{shown}` was stopped on request")))
        }
    }
}

#[cfg(unix)]
async fn termination_requested() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(not(unix))]
async fn termination_requested() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
