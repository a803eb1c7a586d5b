//! # seclog-cli
//!
//! Command-line front end for the security log engine.
//!
//! Provides commands for:
//! - Paging through active and archived records
//! - Listing archives and counters
//! - Running compaction once or on a schedule
//! - Appending entries in the daily file layout

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, LogFormat, PageArgs, WriteArgs};
pub use error::CliError;
pub use output::OutputFormat;
