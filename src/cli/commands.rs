//! # Commands Module / 命令模块
//!
//! One module per `pdfperf` subcommand.
//!
//! 每个 `pdfperf` 子命令对应一个模块。

pub mod init;
pub mod run;
pub mod tools;
pub mod worker;
