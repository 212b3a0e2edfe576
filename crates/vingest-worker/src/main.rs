//! One-shot ingestion binary: `vingest-worker <video_url> [owner_context_id]`.

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vingest_firestore::{StoreBackend, Stores};
use vingest_worker::{IngestConfig, Pipeline};

#[tokio::main]
async fn main() {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let Some(video_url) = args.next() else {
        eprintln!("usage: vingest-worker <video_url> [owner_context_id]");
        std::process::exit(2);
    };
    let owner = args.next().unwrap_or_else(|| "cli".to_string());

    let config = IngestConfig::from_env();
    info!("Ingest config: {:?}", config);

    let stores = match Stores::connect(StoreBackend::from_env()).await {
        Ok(stores) => stores,
        Err(e) => {
            error!("Failed to connect stores: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = match Pipeline::from_env(config, stores).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("Failed to build pipeline: {}", e);
            std::process::exit(1);
        }
    };

    let handle = match pipeline.ingest(&video_url, &owner).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Ingest rejected: {}", e);
            std::process::exit(1);
        }
    };
    info!(outcome = ?handle.outcome, status = %handle.status(), "Ingest admitted");

    let key = handle.run.as_ref().map(|run| run.source_key.clone());
    if let Err(e) = handle.wait().await {
        error!("Run task failed: {}", e);
        std::process::exit(1);
    }

    if let Some(key) = key {
        match pipeline.stores().runs.get(&key).await {
            Ok(Some(run)) => {
                info!(status = %run.status, progress = run.progress, "Run finished");
                if let Some(message) = run.message.or(run.error_message) {
                    println!("{}", message);
                }
            }
            Ok(None) => info!("No run record found"),
            Err(e) => error!("Failed to read run status: {}", e),
        }
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vingest=info".parse().expect("valid log directive"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(true).with_target(true))
            .with(env_filter)
            .init();
    }
}
