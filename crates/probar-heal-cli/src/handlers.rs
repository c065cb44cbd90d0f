//! Subcommand implementations.
//!
//! Data goes to `out` (stdout in the binary); status lines go through the
//! [`Reporter`] on stderr.

use crate::commands::{IdentityArgs, ListArgs, PutArgs, RemoveArgs, ShowArgs};
use crate::error::{CliError, CliResult};
use crate::output::{records_json, render_identities, render_records, OutputFormat, Reporter};
use probar_heal::{with_handle, LocatorIdentity, LocatorStore, Selector};
use std::io::Write;
use tracing::debug;

/// `identity <locator> <url>`
pub fn run_identity(args: &IdentityArgs, out: &mut dyn Write) -> CliResult<()> {
    writeln!(out, "{}", LocatorIdentity::new(&args.locator, &args.url))?;
    Ok(())
}

/// `identities`
pub fn run_identities(
    store: &dyn LocatorStore,
    args: &ListArgs,
    out: &mut dyn Write,
) -> CliResult<()> {
    let ids = with_handle(store, |h| h.identities())?;
    debug!(namespace = store.namespace(), count = ids.len(), "listed identities");
    write!(out, "{}", render_identities(&ids, args.format.into())?)?;
    Ok(())
}

/// `show <identity>`
pub fn run_show(
    store: &dyn LocatorStore,
    args: &ShowArgs,
    use_color: bool,
    out: &mut dyn Write,
) -> CliResult<()> {
    let identity = LocatorIdentity::from_raw(args.identity.clone());
    let records = with_handle(store, |h| h.get_all(&identity))?;
    if records.is_empty() {
        return Err(CliError::not_found(identity.as_str()));
    }
    match OutputFormat::from(args.format) {
        OutputFormat::Json => writeln!(out, "{}", records_json(&identity, &records)?)?,
        OutputFormat::Text => write!(out, "{}", render_records(&identity, &records, use_color))?,
    }
    Ok(())
}

/// `put <identity> <strategy> <expression>`
pub fn run_put(store: &dyn LocatorStore, args: &PutArgs, reporter: &Reporter) -> CliResult<()> {
    if args.expression.trim().is_empty() {
        return Err(CliError::invalid_argument("expression must not be empty"));
    }
    let selector = Selector::from_tag(&args.strategy, args.expression.clone()).ok_or_else(|| {
        CliError::invalid_argument(format!(
            "unknown strategy '{}' (expected css, xpath, text or testid)",
            args.strategy
        ))
    })?;
    let identity = LocatorIdentity::from_raw(args.identity.clone());
    with_handle(store, |h| h.put(&identity, &selector))?;
    reporter.success(&format!("stored {selector} for {identity}"));
    Ok(())
}

/// `remove <identity>`
pub fn run_remove(store: &dyn LocatorStore, args: &RemoveArgs, reporter: &Reporter) -> CliResult<()> {
    let identity = LocatorIdentity::from_raw(args.identity.clone());
    let removed = with_handle(store, |h| h.remove(&identity))?;
    if removed == 0 {
        reporter.warning(&format!("nothing stored for {identity}"));
    } else {
        reporter.success(&format!("removed {removed} alternate(s) for {identity}"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::commands::FormatArg;
    use probar_heal::MemoryLocatorStore;

    fn quiet() -> Reporter {
        Reporter::new(false, true)
    }

    fn put(store: &dyn LocatorStore, identity: &str, strategy: &str, expression: &str) -> CliResult<()> {
        run_put(
            store,
            &PutArgs {
                identity: identity.into(),
                strategy: strategy.into(),
                expression: expression.into(),
            },
            &quiet(),
        )
    }

    fn show(store: &dyn LocatorStore, identity: &str, format: FormatArg) -> CliResult<String> {
        let mut out = Vec::new();
        run_show(
            store,
            &ShowArgs {
                identity: identity.into(),
                format,
            },
            false,
            &mut out,
        )?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_identity_matches_library() {
        let mut out = Vec::new();
        run_identity(
            &IdentityArgs {
                locator: "css=#login".into(),
                url: "https://x.test/a".into(),
            },
            &mut out,
        )
        .unwrap();
        let expected = LocatorIdentity::new("css=#login", "https://x.test/a");
        assert_eq!(String::from_utf8(out).unwrap(), format!("{expected}\n"));
    }

    #[test]
    fn test_put_then_show() {
        let store = MemoryLocatorStore::new();
        put(&store, "id1", "xpath", "//div").unwrap();
        put(&store, "id1", "CSS", "#foo").unwrap();
        let text = show(&store, "id1", FormatArg::Text).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "id1");
        assert!(lines[1].contains("1. css=#foo"));
        assert!(lines[2].contains("2. xpath=//div"));
    }

    #[test]
    fn test_show_json() {
        let store = MemoryLocatorStore::new();
        put(&store, "id1", "testid", "submit").unwrap();
        let json = show(&store, "id1", FormatArg::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["records"][0]["selector"]["strategy"], "testid");
    }

    #[test]
    fn test_show_unknown_identity() {
        let store = MemoryLocatorStore::new();
        let err = show(&store, "nope", FormatArg::Text).unwrap_err();
        assert!(matches!(err, CliError::NotFound { .. }));
    }

    #[test]
    fn test_put_rejects_bad_input() {
        let store = MemoryLocatorStore::new();
        assert!(matches!(
            put(&store, "id", "linktext", "Home"),
            Err(CliError::InvalidArgument { .. })
        ));
        assert!(matches!(
            put(&store, "id", "css", "  "),
            Err(CliError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_identities_and_remove() {
        let store = MemoryLocatorStore::new();
        put(&store, "b", "css", "#b").unwrap();
        put(&store, "a", "css", "#a").unwrap();
        let mut out = Vec::new();
        run_identities(&store, &ListArgs { format: FormatArg::Text }, &mut out).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "a\nb\n");

        run_remove(&store, &RemoveArgs { identity: "a".into() }, &quiet()).unwrap();
        run_remove(&store, &RemoveArgs { identity: "a".into() }, &quiet()).unwrap();
        let mut out = Vec::new();
        run_identities(&store, &ListArgs { format: FormatArg::Json }, &mut out).unwrap();
        let ids: Vec<String> = serde_json::from_str(&String::from_utf8(out).unwrap()).unwrap();
        assert_eq!(ids, vec!["b"]);
    }
}
