//! probar-heal: command-line access to a self-healing locator store
//!
//! ## Usage
//!
//! ```bash
//! probar-heal identity "css=#login" https://shop.test/cart   # Print the store key
//! probar-heal identities --store locators.db                  # List stored identities
//! probar-heal show <identity> --format json                   # Inspect alternates
//! probar-heal put <identity> xpath "//form/button"            # Add an alternate
//! probar-heal remove <identity>                               # Forget an identity
//! ```

use clap::Parser;
use probar_heal_cli::{
    handlers, Cli, CliConfig, CliResult, ColorChoice, Commands, Reporter, Verbosity,
};
use probar_heal::LocatorStore;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    init_tracing(verbosity);

    let color: ColorChoice = cli.color.into();
    let reporter = Reporter::new(color.should_color(), verbosity.is_quiet());
    match run(cli, verbosity, color, &reporter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            reporter.failure(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(verbosity.filter_directive()))
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn run(cli: Cli, verbosity: Verbosity, color: ColorChoice, reporter: &Reporter) -> CliResult<()> {
    let config = CliConfig::new()
        .with_verbosity(verbosity)
        .with_color(color)
        .with_config_file(cli.config)?
        .with_store_path(cli.store)
        .with_namespace(cli.namespace)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Commands::Identity(args) => handlers::run_identity(args, &mut out),
        Commands::Identities(args) => {
            let store = open_store(&config)?;
            handlers::run_identities(store.as_ref(), args, &mut out)
        }
        Commands::Show(args) => {
            let store = open_store(&config)?;
            handlers::run_show(store.as_ref(), args, config.color.should_color(), &mut out)
        }
        Commands::Put(args) => handlers::run_put(open_store(&config)?.as_ref(), args, reporter),
        Commands::Remove(args) => {
            handlers::run_remove(open_store(&config)?.as_ref(), args, reporter)
        }
    }?;
    out.flush()?;
    Ok(())
}

/// Validate the layered configuration and open its store
fn open_store(config: &CliConfig) -> CliResult<Arc<dyn LocatorStore>> {
    config.heal.validate()?;
    let store = config.heal.build_store()?;
    tracing::debug!(
        backend = ?config.heal.store.backend,
        namespace = store.namespace(),
        "opened locator store"
    );
    Ok(store)
}
