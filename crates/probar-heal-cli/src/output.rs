//! Output formatting and status reporting

use console::{style, Term};
use probar_heal::{LocatorIdentity, LocatorRecord};
use serde::Serialize;

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Status reporter writing to stderr, so stdout stays machine-readable
#[derive(Debug)]
pub struct Reporter {
    term: Term,
    /// Whether to use colors
    pub use_color: bool,
    /// Quiet mode
    pub quiet: bool,
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new(true, false)
    }
}

impl Reporter {
    /// Create a new reporter
    #[must_use]
    pub fn new(use_color: bool, quiet: bool) -> Self {
        Self {
            term: Term::stderr(),
            use_color,
            quiet,
        }
    }

    /// Print a success message
    pub fn success(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("✓").green().bold().to_string()
        } else {
            "OK".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.quiet {
            return;
        }
        let prefix = if self.use_color {
            style("⚠").yellow().bold().to_string()
        } else {
            "WARN".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }

    /// Print a failure message, even in quiet mode
    pub fn failure(&self, message: &str) {
        let prefix = if self.use_color {
            style("✗").red().bold().to_string()
        } else {
            "ERROR".to_string()
        };
        let _ = self.term.write_line(&format!("{prefix} {message}"));
    }
}

#[derive(Serialize)]
struct RecordsView<'a> {
    identity: &'a LocatorIdentity,
    records: &'a [LocatorRecord],
}

/// Render an identity's records as numbered lines, most recent first
#[must_use]
pub fn render_records(identity: &LocatorIdentity, records: &[LocatorRecord], use_color: bool) -> String {
    let mut out = if use_color {
        style(identity.as_str()).bold().to_string()
    } else {
        identity.to_string()
    };
    out.push('\n');
    for (i, record) in records.iter().enumerate() {
        let selector = if use_color {
            style(record.selector.to_string()).cyan().to_string()
        } else {
            record.selector.to_string()
        };
        out.push_str(&format!(
            "  {}. {selector}  (recorded {})\n",
            i + 1,
            record.recorded_at.to_rfc3339()
        ));
    }
    out
}

/// Render an identity's records as pretty JSON
pub fn records_json(identity: &LocatorIdentity, records: &[LocatorRecord]) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&RecordsView { identity, records })
}

/// Render identities, one per line or as a JSON array
pub fn render_identities(ids: &[LocatorIdentity], format: OutputFormat) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(ids),
        OutputFormat::Text => Ok(ids.iter().map(|id| format!("{id}\n")).collect()),
    }
}
