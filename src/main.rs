//! Command-line interface for kafka-bridge
//!
//! # Usage Examples
//!
//! ```bash
//! # Join group "billing" and log every message of "orders"
//! RUST_LOG=info kafka-bridge consume \
//!   --brokers localhost:9092 \
//!   --group-id billing \
//!   --topics orders
//!
//! # Broker settings from the environment, failures logged instead of aborting
//! KAFKA_BROKERS=kafka-1:9092,kafka-2:9092 KAFKA_GROUP_ID=billing KAFKA_TOPICS=orders \
//!   kafka-bridge consume --log-errors
//! ```

use clap::{Parser, Subcommand};
use kafka_bridge::{run_consume, ConsumeArgs};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "kafka-bridge")]
#[command(about = "Deliver Kafka messages to handlers through a consumer group")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a consumer group and log every delivered envelope
    Consume {
        #[command(flatten)]
        args: ConsumeArgs,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                signal.cancel();
            }
            Err(e) => warn!("Cannot listen for Ctrl-C: {e}"),
        }
    });

    match cli.command {
        Commands::Consume { args } => run_consume(args, shutdown).await,
    }
}
