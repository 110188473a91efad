//! membridge MCP server
//!
//! Run with: membridge-server

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use membridge::backend::{Backend, DirectBackend, RemoteBackend};
use membridge::embedding::EmbeddingClient;
use membridge::error::{BridgeError, Result};
use membridge::mcp::{BridgeHandler, McpServer};
use membridge::types::{EmbeddingConfig, RemoteConfig, StoreConfig, DEFAULT_REMOTE_URL};

#[derive(Parser, Debug)]
#[command(name = "membridge-server")]
#[command(about = "MCP bridge for project-scoped memories and tasks")]
struct Args {
    /// Backend variant (remote or direct)
    #[arg(long, env = "MEMBRIDGE_BACKEND", default_value = "remote")]
    backend: String,

    /// Credential for the hosted API (remote variant)
    #[arg(long, env = "MEMBRIDGE_API_KEY")]
    api_key: Option<String>,

    /// Hosted API endpoint override
    #[arg(long, env = "MEMBRIDGE_API_URL", default_value = DEFAULT_REMOTE_URL)]
    api_url: String,

    /// Store REST endpoint (direct variant)
    #[arg(long, env = "MEMBRIDGE_STORE_URL")]
    store_url: Option<String>,

    /// Store service key (direct variant)
    #[arg(long, env = "MEMBRIDGE_STORE_KEY")]
    store_key: Option<String>,

    /// Credential for the embedding service (direct variant)
    #[arg(long, env = "MEMBRIDGE_EMBEDDING_KEY")]
    embedding_key: Option<String>,

    /// Embedding service endpoint override
    #[arg(long, env = "MEMBRIDGE_EMBEDDING_URL")]
    embedding_url: Option<String>,

    /// Embedding model name
    #[arg(long, env = "MEMBRIDGE_EMBEDDING_MODEL")]
    embedding_model: Option<String>,

    /// Embedding vector dimensions
    #[arg(long, env = "MEMBRIDGE_EMBEDDING_DIMENSIONS", default_value = "1536")]
    embedding_dimensions: usize,
}

fn require(value: Option<String>, what: &str) -> Result<String> {
    value.ok_or_else(|| BridgeError::Config(format!("{} is required but not set", what)))
}

async fn build_backend(args: Args) -> Result<Arc<dyn Backend>> {
    match args.backend.as_str() {
        "remote" => {
            let config = RemoteConfig {
                base_url: args.api_url,
                api_key: require(args.api_key, "MEMBRIDGE_API_KEY")?,
            };
            let backend = RemoteBackend::new(config);
            // Fail fast on a bad credential instead of erroring every call
            backend.verify_credentials().await.map_err(|e| {
                BridgeError::Config(format!("Credential validation failed: {}", e))
            })?;
            Ok(Arc::new(backend))
        }
        "direct" => {
            let store = StoreConfig {
                url: require(args.store_url, "MEMBRIDGE_STORE_URL")?,
                service_key: require(args.store_key, "MEMBRIDGE_STORE_KEY")?,
            };
            let mut embedding =
                EmbeddingConfig::new(require(args.embedding_key, "MEMBRIDGE_EMBEDDING_KEY")?);
            if let Some(url) = args.embedding_url {
                embedding.base_url = url;
            }
            if let Some(model) = args.embedding_model {
                embedding.model = model;
            }
            embedding.dimensions = args.embedding_dimensions;
            Ok(Arc::new(DirectBackend::new(
                store,
                EmbeddingClient::new(embedding),
            )))
        }
        other => Err(BridgeError::Config(format!(
            "Unknown backend variant '{}' (expected 'remote' or 'direct')",
            other
        ))),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging goes to stderr; stdout carries the MCP protocol
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let variant = args.backend.clone();
    let backend = match build_backend(args).await {
        Ok(backend) => backend,
        Err(e) => {
            tracing::error!("{}", e);
            return Err(e);
        }
    };

    tracing::info!(backend = %variant, "membridge MCP server starting...");
    let handler = BridgeHandler::new(backend);
    let mut server = McpServer::new(handler);
    server.run().await?;

    Ok(())
}
