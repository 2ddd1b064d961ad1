//! # News Radar — Binary Entrypoint
//! Boots the Axum HTTP server, wiring sources, clustering, and scoring.
//!
//! ## Endpoints
//! - `GET /healthz` — liveness check
//! - `GET /radar` — ranked market events for a time window
//! - `POST /news` — ad-hoc news ingestion
//! - `GET /swagger/openapi.yaml` — API contract

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use news_radar::api::{self, ApiState};
use news_radar::config::Config;
use news_radar::llm;
use news_radar::llm_cluster::LlmClusterer;
use news_radar::pipeline::{self, Pipeline};
use news_radar::sources::{IngestSource, Source, SourceRegistry, StaticFileSource};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "news_radar=info,tower_http=info".into()),
        )
        .init();

    let cfg = Config::from_env().context("load config")?;

    let static_source = StaticFileSource::new("sample", &cfg.static_data_path)
        .context("init static source")?;
    let ingest = Arc::new(IngestSource::new("ingest"));

    let registry = SourceRegistry::new(vec![
        Arc::new(static_source) as Arc<dyn Source>,
        ingest.clone() as Arc<dyn Source>,
    ])
    .context("init source registry")?;

    let clusterer = if cfg.llm_enabled() {
        let client = llm::Client::new(
            &cfg.llm_api_key,
            cfg.llm_base_url.as_deref(),
            cfg.llm_timeout,
        )
        .context("init llm client")?;
        info!(model = %cfg.llm_model, "LLM clustering enabled");
        Box::new(
            LlmClusterer::new(
                Some(Arc::new(client)),
                cfg.llm_model.clone(),
                Some(pipeline::default_clusterer().into()),
            )
            .with_sampling(cfg.llm_temperature, cfg.llm_max_tokens)
            .with_max_items(cfg.llm_max_items)
            .with_cache_ttl(cfg.llm_cache_ttl),
        ) as Box<dyn news_radar::cluster::ClusterEngine>
    } else {
        pipeline::default_clusterer()
    };

    let pipeline = Pipeline::new(registry, clusterer, pipeline::default_scorer());

    let state = Arc::new(ApiState {
        pipeline,
        ingest,
        default_window: cfg.default_window,
        default_limit: cfg.top_k,
    });

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&cfg.listen_addr)
        .await
        .with_context(|| format!("bind {}", cfg.listen_addr))?;
    info!(addr = %cfg.listen_addr, "radar API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
