// moodlesync/src/main.rs

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    // RUST_LOG=debug moodlesync run ... pour voir aussi reqwest/hyper
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,moodlesync={0},moodlesync_core={0}", level))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| anyhow::anyhow!("failed to initialize tracing subscriber: {error}"))?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine: the environment may already carry everything.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    match cli.command {
        Commands::Run {
            moodle,
            sources,
            sheets,
            retry,
        } => commands::run::execute(moodle, sources, sheets, retry).await?,
        Commands::Preview {
            moodle,
            sources,
            retry,
        } => commands::preview::execute(moodle, sources, retry).await?,
        Commands::Check {
            moodle,
            sources,
            sheets,
        } => commands::check::execute(moodle, sources, sheets)?,
    }

    Ok(())
}
