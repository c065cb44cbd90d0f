//! probar-heal CLI library
//!
//! Command-line access to the locator store that self-healing waits read
//! from and record into: compute identities, list them, inspect and edit
//! their stored alternates.

#![warn(missing_docs)]
#![allow(clippy::format_push_string)] // String building is clear and correct

mod commands;
mod config;
mod error;
pub mod handlers;
mod output;

pub use commands::{
    Cli, ColorArg, Commands, FormatArg, IdentityArgs, ListArgs, PutArgs, RemoveArgs, ShowArgs,
};
pub use config::{CliConfig, ColorChoice, Verbosity};
pub use error::{CliError, CliResult};
pub use output::{records_json, render_identities, render_records, OutputFormat, Reporter};
