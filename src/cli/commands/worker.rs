//! The hidden `worker` subcommand, run inside every worker process.

use std::path::{Path, PathBuf};

use crate::core::config::load_config;
use crate::core::models::{Test, WorkerError};
use crate::core::worker::{finish, run_worker, Job};

/// Runs one job and returns the process exit code.
pub async fn execute(config: &Path, channel: &Path, tool: String, test: Option<Test>, path: Option<PathBuf>) -> i32 {
    let job = match (test, path) {
        (Some(test), Some(path)) => Job::Operation { test, tool, path },
        _ => Job::Probe { tool },
    };

    match load_config(config) {
        Ok(config) => run_worker(&config, job, channel).await,
        Err(e) => finish(channel, Err(WorkerError::new("config", format!("{e:#}")))),
    }
}
