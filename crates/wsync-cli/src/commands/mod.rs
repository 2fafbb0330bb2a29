//! Subcommands of the `wsync` binary

pub mod completions;
pub mod config;
pub mod sync;
