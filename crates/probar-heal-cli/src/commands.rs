//! CLI command definitions using clap

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// probar-heal: inspect and curate a self-healing locator store
#[derive(Parser, Debug)]
#[command(name = "probar-heal")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorArg,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite store file (overrides the configuration)
    #[arg(long, env = "PROBAR_HEAL_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Namespace inside the store (overrides the configuration)
    #[arg(long, env = "PROBAR_HEAL_NAMESPACE", global = true)]
    pub namespace: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the store identity for a locator on a page
    Identity(IdentityArgs),

    /// List every identity that has stored alternates
    Identities(ListArgs),

    /// Show the stored alternates for an identity, most recent first
    Show(ShowArgs),

    /// Store an alternate locator for an identity
    Put(PutArgs),

    /// Forget every alternate stored for an identity
    Remove(RemoveArgs),
}

/// Arguments for the identity command
#[derive(Parser, Debug)]
pub struct IdentityArgs {
    /// Locator key, e.g. "css=#login"
    pub locator: String,

    /// Page URL the locator is used on
    pub url: String,
}

/// Arguments for the identities command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the show command
#[derive(Parser, Debug)]
pub struct ShowArgs {
    /// Identity as printed by `identity` or `identities`
    pub identity: String,

    /// Output format
    #[arg(short, long, default_value = "text")]
    pub format: FormatArg,
}

/// Arguments for the put command
#[derive(Parser, Debug)]
pub struct PutArgs {
    /// Identity as printed by `identity` or `identities`
    pub identity: String,

    /// Locator strategy (css, xpath, text, testid)
    pub strategy: String,

    /// Locator expression
    pub expression: String,
}

/// Arguments for the remove command
#[derive(Parser, Debug)]
pub struct RemoveArgs {
    /// Identity as printed by `identity` or `identities`
    pub identity: String,
}

/// Output format argument
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FormatArg {
    /// Human-readable text
    #[default]
    Text,
    /// JSON
    Json,
}

/// Color output argument
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum ColorArg {
    /// Automatic color detection
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

impl From<ColorArg> for crate::config::ColorChoice {
    fn from(arg: ColorArg) -> Self {
        match arg {
            ColorArg::Auto => Self::Auto,
            ColorArg::Always => Self::Always,
            ColorArg::Never => Self::Never,
        }
    }
}

impl From<FormatArg> for crate::output::OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => Self::Text,
            FormatArg::Json => Self::Json,
        }
    }
}
