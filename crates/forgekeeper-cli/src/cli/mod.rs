//! CLI argument parsing and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use args::{Cli, Commands};
use clap::Parser;

use crate::config::Config;
use crate::output::OutputFormat;

/// Run the CLI application.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    if !cli.quiet {
        init_logging(cli.verbose);
    }

    // Load and validate configuration; every problem is fatal here
    // rather than halfway into a sweep or a restore.
    let path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load(&path)?;

    let ctx = commands::Context {
        config,
        output: cli.output.unwrap_or(OutputFormat::Pretty),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Verify(args) => commands::verify::execute(ctx, args).await,
        Commands::Status => commands::status::execute(ctx).await,
        Commands::Snapshot(args) => commands::snapshot::execute(ctx, args).await,
        Commands::Restore(args) => commands::restore::execute(ctx, args).await,
        Commands::Prune(args) => commands::prune::execute(ctx, args).await,
        Commands::Risk(args) => commands::risk::execute(ctx, args).await,
        Commands::Drill(args) => commands::drill::execute(ctx, args).await,
        Commands::Run => commands::run::execute(ctx).await,
    }
}

/// Logs go to stderr so structured output on stdout stays parseable.
fn init_logging(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
