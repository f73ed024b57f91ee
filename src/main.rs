use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use horizon_news::config::{Config, SettingsFile};
use horizon_news::fetcher::Fetcher;
use horizon_news::panel::Panel;
use horizon_news::routes::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "horizon_news=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path =
        std::env::var("HORIZON_NEWS_CONFIG").unwrap_or_else(|_| "news.toml".to_string());
    let config = Config::load(&config_path)?;

    // Feed URLs are re-read from the settings file on every reload
    let source = Arc::new(SettingsFile::new(&config_path));
    info!(
        "Loaded {} feed URLs from {}",
        config.urls.len(),
        source.path().display()
    );
    let fetcher = Fetcher::new()?;
    let panel = Panel::spawn(source, fetcher, config.render);

    // Create app state
    let state = Arc::new(AppState { panel });

    // Build router
    let app = Router::new()
        .route("/", get(routes::index))
        .route("/columns", get(routes::columns))
        .route("/reload", post(routes::reload))
        .route("/reload/status", get(routes::reload_status))
        .route("/api/panel", get(routes::panel_json))
        .route("/health", get(routes::health))
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen).await?;
    info!("Server starting on http://{}", config.listen);

    axum::serve(listener, app).await?;

    Ok(())
}
