//! CLI configuration

use crate::error::{CliError, CliResult};
use probar_heal::{HealConfig, StoreBackend};
use std::path::PathBuf;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - library info events
    Verbose,
    /// Debug - every poll and store access
    Debug,
}

impl Verbosity {
    /// Map `-q` and the `-v` count to a level
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Default `tracing` filter when `RUST_LOG` is unset
    #[must_use]
    pub const fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "error",
            Self::Normal => "warn",
            Self::Verbose => "probar_heal=info,warn",
            Self::Debug => "probar_heal=debug,probar_heal_cli=debug,info",
        }
    }
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorChoice {
    /// Always use colors
    Always,
    /// Use colors when output is a terminal
    #[default]
    Auto,
    /// Never use colors
    Never,
}

impl ColorChoice {
    /// Should use colors based on output detection
    #[must_use]
    pub fn should_color(self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Auto => console::Term::stdout().features().colors_supported(),
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Color output choice
    pub color: ColorChoice,
    /// Library settings (store location, wait timing)
    pub heal: HealConfig,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set color choice
    #[must_use]
    pub const fn with_color(mut self, color: ColorChoice) -> Self {
        self.color = color;
        self
    }

    /// Load library settings from a YAML file
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> CliResult<Self> {
        if let Some(path) = path {
            self.heal = HealConfig::from_file(&path).map_err(|e| {
                CliError::config(format!("cannot load {}: {e}", path.display()))
            })?;
        }
        Ok(self)
    }

    /// Point the store at a SQLite file
    #[must_use]
    pub fn with_store_path(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.heal.store.backend = StoreBackend::Sqlite;
            self.heal.store.path = path;
        }
        self
    }

    /// Override the store namespace
    pub fn with_namespace(mut self, namespace: Option<String>) -> CliResult<Self> {
        if let Some(namespace) = namespace {
            if namespace.trim().is_empty() {
                return Err(CliError::invalid_argument("namespace must not be empty"));
            }
            self.heal.store.namespace = namespace;
        }
        Ok(self)
    }
}
