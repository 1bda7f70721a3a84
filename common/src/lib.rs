//! Shared pieces used by both the long-running instance and the command line.

pub mod dirs;
pub mod instance;
