use anyhow::Result;
use clap::Parser;
use cwms_cli::cli::{run, Cli};
use cwms_cli::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level, !cli.no_color);
    tracing::info!("CLI arguments parsed, tracing initialised, invoking run");

    let result = run(cli).await;
    match &result {
        Ok(_) => tracing::info!("CLI completed successfully"),
        Err(e) => tracing::error!(error = %e, "CLI exited with error"),
    }
    result
}
