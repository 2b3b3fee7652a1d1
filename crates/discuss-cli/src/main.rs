mod commands;
mod opts;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::search::SearchArgs;
use opts::ClientOpts;

#[derive(Parser, Debug)]
#[command(name = "discuss", version, about = "Messaging store client")]
struct Cli {
    #[command(flatten)]
    opts: ClientOpts,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the initial snapshot and summarize the store
    Bootstrap,

    /// Local-first partner search with server fallback
    Search(SearchArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();
    let opts = &cli.opts;

    match cli.command {
        Command::Bootstrap => commands::bootstrap::cmd_bootstrap(opts).await,
        Command::Search(args) => commands::search::cmd_search(opts, &args).await,
    }
}

/// Logs go to stderr; RUST_LOG overrides the default `warn` level.
fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .init();
}
