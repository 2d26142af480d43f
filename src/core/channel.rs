//! # Result Channel Module / 结果通道模块
//!
//! The result channel carries a worker's outcome back to the parent process.
//! It is a single file inside a private temporary directory: the worker
//! writes it once and syncs it before exiting, the parent reads it at most
//! once after it has observed the worker's exit.
//!
//! 结果通道将工作进程的结果传回父进程。它是私有临时目录中的单个文件：
//! 工作进程写入一次并在退出前同步，父进程在观察到工作进程退出后最多读取一次。
//!
//! ## Wire format / 传输格式
//!
//! ```json
//! {"version": 1, "ok": <any JSON value>}
//! {"version": 1, "error": {"kind": "io", "message": "No such file or directory"}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;

use crate::core::models::WorkerError;

/// The only envelope version this build reads and writes.
pub const WIRE_VERSION: u32 = 1;

const CHANNEL_FILE: &str = "result.json";

/// What the unit of work produced. / 工作单元的产出。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Payload {
    Ok(Value),
    Error(WorkerError),
}

impl From<Result<Value, WorkerError>> for Payload {
    fn from(result: Result<Value, WorkerError>) -> Self {
        match result {
            Ok(value) => Payload::Ok(value),
            Err(error) => Payload::Error(error),
        }
    }
}

/// A versioned payload as written to the channel.
/// 写入通道的带版本号的负载。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub version: u32,
    #[serde(flatten)]
    pub payload: Payload,
}

impl Envelope {
    pub fn new(payload: Payload) -> Self {
        Self {
            version: WIRE_VERSION,
            payload,
        }
    }
}

/// Why a channel could not be decoded. / 通道无法解码的原因。
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("result channel is empty")]
    Empty,
    #[error("result channel could not be read: {0}")]
    Io(#[from] std::io::Error),
    #[error("result channel holds malformed data: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("result channel uses unsupported wire version {0}")]
    UnsupportedVersion(u32),
}

/// Writes `payload` to the channel at `path` and flushes it to disk.
/// Used by the worker process.
pub fn write_envelope(path: &Path, payload: Payload) -> std::io::Result<()> {
    let bytes = serde_json::to_vec(&Envelope::new(payload))?;
    let mut file = fs::File::create(path)?;
    file.write_all(&bytes)?;
    file.sync_all()
}

/// Decodes an envelope from raw channel bytes.
pub fn decode_envelope(bytes: &[u8]) -> Result<Payload, ChannelError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ChannelError::Empty);
    }
    let envelope: Envelope = serde_json::from_slice(bytes)?;
    if envelope.version != WIRE_VERSION {
        return Err(ChannelError::UnsupportedVersion(envelope.version));
    }
    Ok(envelope.payload)
}

/// A fresh, exclusively owned result channel for one harness invocation.
/// The backing directory is removed when the channel is dropped.
///
/// 单次执行框架调用专用的新结果通道。通道被丢弃时其目录会被删除。
#[derive(Debug)]
pub struct ResultChannel {
    _dir: TempDir,
    path: PathBuf,
}

impl ResultChannel {
    pub fn create() -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("pdfperf_channel_").tempdir()?;
        let path = dir.path().join(CHANNEL_FILE);
        Ok(Self { _dir: dir, path })
    }

    /// The location the worker must write to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads and decodes the channel. Consumes the channel so it is read at
    /// most once; a channel the worker never wrote reads as empty.
    pub fn read(self) -> Result<Payload, ChannelError> {
        match fs::read(&self.path) {
            Ok(bytes) => decode_envelope(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ChannelError::Empty),
            Err(e) => Err(ChannelError::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_is_a_tagged_union() {
        let ok = serde_json::to_value(Envelope::new(Payload::Ok(json!([1, "two"])))).unwrap();
        assert_eq!(ok, json!({"version": 1, "ok": [1, "two"]}));

        let err = serde_json::to_value(Envelope::new(Payload::Error(WorkerError::new(
            "io", "denied",
        ))))
        .unwrap();
        assert_eq!(
            err,
            json!({"version": 1, "error": {"kind": "io", "message": "denied"}})
        );
    }

    #[test]
    fn unread_channel_is_empty() {
        let channel = ResultChannel::create().unwrap();
        assert!(matches!(channel.read(), Err(ChannelError::Empty)));
    }

    #[test]
    fn written_channel_reads_back() {
        let channel = ResultChannel::create().unwrap();
        write_envelope(channel.path(), Payload::Ok(json!({"pages": 3}))).unwrap();
        assert_eq!(channel.read().unwrap(), Payload::Ok(json!({"pages": 3})));
    }

    #[test]
    fn truncated_and_foreign_data_are_rejected() {
        assert!(matches!(
            decode_envelope(br#"{"version":1,"ok":"#),
            Err(ChannelError::Malformed(_))
        ));
        assert!(matches!(
            decode_envelope(br#"{"version":7,"ok":1}"#),
            Err(ChannelError::UnsupportedVersion(7))
        ));
        assert!(matches!(decode_envelope(b"  \n"), Err(ChannelError::Empty)));
    }

    #[test]
    fn channel_directory_is_removed_on_drop() {
        let channel = ResultChannel::create().unwrap();
        let dir = channel.path().parent().unwrap().to_path_buf();
        assert!(dir.exists());
        drop(channel);
        assert!(!dir.exists());
    }
}
