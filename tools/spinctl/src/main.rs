use clap::Parser;
use miette::Result;
use spinctl::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let default_level = if args.backend.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();
    miette::set_panic_hook();

    match args.action {
        Commands::List(opts) => opts.list(&args.backend)?,
        Commands::Info(opts) => opts.info(&args.backend)?,
        Commands::Acquire(opts) => opts.acquire(&args.backend).await?,
        Commands::Reset(opts) => opts.reset(&args.backend)?,
    }

    Ok(())
}
