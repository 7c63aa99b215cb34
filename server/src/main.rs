use anyhow::{Context, Result};
use axum::Router;
use clap::Parser;
use nutrition_assistant::llm::DEFAULT_MODEL;
use nutrition_assistant::{Assistant, LlmConfig, OpenAiClient};
use nutrition_core::{RecordStore, SearchSettings};
use server::build_app;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Cleaned nutrition dataset (CSV)
    #[arg(long, env = "DATA_PATH", default_value = "./data/data.csv")]
    data: PathBuf,
    /// Optimization report whose best weighting replaces the built-in boost
    #[arg(long, env = "BOOST_FILE")]
    boost_file: Option<PathBuf>,
    /// Model used when a request does not name one
    #[arg(long, env = "LLM_MODEL", default_value = DEFAULT_MODEL)]
    model: String,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 5000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();

    let store = RecordStore::load_csv(&args.data).with_context(|| format!("loading {}", args.data.display()))?;
    let mut settings = SearchSettings::default();
    if let Some(path) = &args.boost_file {
        settings = settings.with_boost_file(path)?;
    }
    let generator = Arc::new(OpenAiClient::new(&LlmConfig::from_env())?);
    let assistant = Assistant::from_records(store.into_records(), generator, settings)?;
    let app: Router = build_app(assistant, args.model);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
