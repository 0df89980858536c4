//! Lab server binary
//!
//! Run with: cargo run -p cloud-labs --bin cloud-labs-server -- --config labs.toml

use clap::Parser;
use cloud_labs::{config::LabConfig, server::LabServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "cloud-labs-server", version, about = "Managed-service lab handlers over HTTP")]
struct Args {
    /// Config file (defaults to <config dir>/cloud-labs/config.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloud_labs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    println!(
        r#"
╔═══════════════════════════════════════════════════════════╗
║                        Cloud Labs                         ║
║      Knowledge Base Q&A · Document Speech · Tracing       ║
╚═══════════════════════════════════════════════════════════╝
"#
    );

    let mut config = LabConfig::load(args.config.as_deref())?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    tracing::info!("Configuration loaded");
    tracing::info!("  - Region: {}", config.aws.region);
    tracing::info!(
        "  - Knowledge base: {}",
        config.rag.knowledge_base_id.as_deref().unwrap_or("(not set)")
    );
    tracing::info!("  - Model: {}", config.rag.model_id);
    tracing::info!(
        "  - Confidence threshold: {:.2}, max results: {}",
        config.rag.confidence_threshold,
        config.rag.max_results
    );
    tracing::info!(
        "  - Document bucket: {}",
        config.speech.bucket.as_deref().unwrap_or("(not set)")
    );

    let server = LabServer::new(config).await?;

    println!("\nServer starting...");
    println!("  API: http://{}", server.address());
    println!("  Health: http://{}/health", server.address());
    println!("  API Info: http://{}/api/info", server.address());
    println!("\nEndpoints:");
    println!("  POST /api/query            - Ask the knowledge base");
    println!("  POST /api/documents/speech - Document text to speech");
    println!("  POST /api/trace            - Traced request");
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
