use std::sync::Arc;

use tracing::{info, warn};

use veridoc_analysis::extraction::HttpExtractor;
use veridoc_analysis::{FieldExtractor, RiskAnalyzer};
use veridoc_server::jobs::JobRegistry;
use veridoc_server::router::build_router;
use veridoc_server::state::AppState;
use veridoc_storage::AnalysisStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    veridoc_core::config::load_dotenv();
    let config = veridoc_core::Config::from_env();
    config.log_summary();

    let store = Arc::new(AnalysisStore::from_config(&config)?);

    let extractor: Option<Arc<dyn FieldExtractor>> = if config.extraction.is_configured() {
        Some(Arc::new(HttpExtractor::from_config(&config.extraction).map_err(
            |e| anyhow::anyhow!("extraction adapter init failed: {e}"),
        )?))
    } else {
        warn!("extraction service not configured; reports will carry no structured fields");
        None
    };

    let analyzer = Arc::new(
        RiskAnalyzer::from_config(&config.analysis)
            .map_err(|e| anyhow::anyhow!("risk analyzer init failed: {e}"))?,
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let port = config.server.port;

    let state = Arc::new(AppState {
        config,
        store,
        extractor,
        analyzer,
        jobs: JobRegistry::new(),
    });

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://localhost:{}", port);
    axum::serve(listener, app).await?;

    Ok(())
}
