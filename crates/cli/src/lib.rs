//! bfs CLI library
//!
//! Exports the CLI components so the binary and its tests share them.

pub mod commands;
pub mod exit_code;
pub mod output;
