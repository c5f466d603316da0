mod args;
mod output;
mod runner;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use args::{Cli, Commands};
use runner::{run_batch, run_scan, AssetArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Scan {
            ip,
            domain,
            name,
            id,
            category,
            port,
            protocol,
            probe,
        } => {
            let asset = AssetArgs {
                id,
                name,
                category,
                ip,
                domain,
                port,
                protocol,
            };
            run_scan(asset, probe).await?;
        }
        Commands::Batch { file, workers, probe } => {
            run_batch(&file, workers, probe).await?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
