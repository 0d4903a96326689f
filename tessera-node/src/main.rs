use clap::Parser;
use tracing_subscriber::EnvFilter;

use tessera_node::cli;

fn main() {
    // Log level is configurable via RUST_LOG; default to info.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = cli::Cli::parse();

    let rt = tokio::runtime::Runtime::new().expect("failed to create tokio runtime");
    rt.block_on(async {
        if let Err(e) = cli::run(cli).await {
            tracing::error!("fatal error: {}", e);
            std::process::exit(1);
        }
    });
}
