//! # Tools Module / 工具模块
//!
//! Implementations of the benchmarked operations: built-in tools that run
//! inside the worker process and command-line tools driven through command
//! templates.
//!
//! 被测操作的实现：在工作进程内运行的内置工具，以及通过命令模板驱动的命令行工具。

pub mod builtin;
pub mod command;
