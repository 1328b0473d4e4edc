use std::sync::Arc;
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use review_insights::{
    api::{self, AppState},
    classifier::ClassifierClient,
    config::Config,
    db,
    store::{MemoryReviewStore, ReviewStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn ReviewStore> = match &config.database_url {
        Some(url) => {
            let pool = db::connect(url, config.database_max_connections).await?;
            db::init_db(&pool).await?;
            info!("🔌 Connected to PostgreSQL");
            Arc::new(db::PgReviewStore::new(pool))
        }
        None => {
            warn!("⚠️ DATABASE_URL not set, reviews are kept in memory and lost on restart");
            Arc::new(MemoryReviewStore::new())
        }
    };

    let classifier = ClassifierClient::new(config.classifier_url.clone(), config.classifier_timeout)?;
    if classifier.endpoint().is_none() {
        warn!("⚠️ CLASSIFIER_URL not set, /process-review will answer 502");
    }

    let state = Arc::new(AppState::new(store, classifier, config.analyzer_seed));
    let app = api::router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.socket_addr()?).await?;
    info!("🚀 Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
