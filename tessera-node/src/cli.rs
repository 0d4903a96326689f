use clap::{Parser, Subcommand};

use tessera_crypto::keys::Keypair;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::keyfile;
use crate::node::Node;

#[derive(Parser)]
#[command(
    name = "tessera",
    about = "Tessera node — authoritative game chain with assets, sessions, and a marketplace",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the node
    Run {
        /// Path to config file
        #[arg(short, long, default_value = "tessera.toml")]
        config: String,
        /// Path to the validator key file
        #[arg(short, long, default_value = "validator.key")]
        key: String,
    },
    /// Write a default configuration file
    Init {
        /// Output directory
        #[arg(short, long, default_value = ".")]
        dir: String,
    },
    /// Generate a validator keypair and save it
    Keygen {
        /// Output path for the key file
        #[arg(short, long, default_value = "validator.key")]
        out: String,
    },
}

pub async fn run(cli: Cli) -> Result<(), NodeError> {
    match cli.command {
        Command::Run { config, key } => {
            let config = NodeConfig::load(&config)?;
            let keypair = keyfile::load_key(&key)?;
            let mut node = Node::new(config, keypair).await?;
            node.run().await
        }
        Command::Init { dir } => {
            NodeConfig::init(&dir)?;
            tracing::info!(dir = %dir, "node configuration written");
            Ok(())
        }
        Command::Keygen { out } => {
            let keypair = Keypair::generate();
            keyfile::save_key(&out, &keypair)?;
            println!("Public key (validator identity): {}", keypair.public_key_hex());
            println!("Saved to: {}", out);
            Ok(())
        }
    }
}
