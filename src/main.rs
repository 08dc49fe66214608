use axum::{routing::get, Router, response::Json};
use dotenv::dotenv;
use elasticsearch::http::transport::{SingleNodeConnectionPool, TransportBuilder};
use elasticsearch::Elasticsearch;
use serde_json::{json, Value};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod db;
mod errors;
mod routes;
mod services;
mod utils;

use db::models::{ConversationRecord, FeedbackRecord};
use db::queries::{PgConversationStore, PgFeedbackStore};
use db::{init_db, run_migrations};
use services::analytics::AnalyticsService;
use services::elasticsearch::ElasticsearchStore;
use services::record_source::{ConversationStore, FeedbackStore};
use utils::config::{AppState, Config, StoreBackend};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env
    dotenv().ok();

    // Setup tracing/logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting session analytics server...");

    let config = Config::from_env()?;
    tracing::info!(
        "Backend: {:?}, conversations: {}, feedback: {}, sentiment source: {:?}",
        config.backend,
        config.conversation_table,
        config.feedback_table,
        config.sentiment_source
    );

    let (conversations, feedback): (Arc<ConversationStore>, Arc<FeedbackStore>) = match config.backend {
        StoreBackend::Postgres => {
            tracing::info!("Connecting to database...");
            let database_url = config.database_url.as_deref().unwrap_or_default();
            let pool = Arc::new(init_db(database_url).await?);
            tracing::info!("✅ Database connected successfully");

            run_migrations(&pool, &config).await?;

            (
                Arc::new(PgConversationStore::new(pool.clone(), config.conversation_table.clone(), config.page_size))
                    as Arc<ConversationStore>,
                Arc::new(PgFeedbackStore::new(pool, config.feedback_table.clone(), config.page_size))
                    as Arc<FeedbackStore>,
            )
        }
        StoreBackend::Elasticsearch => {
            tracing::info!("Connecting to Elasticsearch at {}...", config.elasticsearch_url);
            let transport = TransportBuilder::new(SingleNodeConnectionPool::new(config.elasticsearch_url.clone())).build()?;
            let client = Arc::new(Elasticsearch::new(transport));

            let conversations = ElasticsearchStore::<ConversationRecord>::conversations(
                client.clone(),
                config.conversation_table.clone(),
                config.page_size,
            );
            let feedback = ElasticsearchStore::<FeedbackRecord>::feedback(client, config.feedback_table.clone(), config.page_size);

            conversations.create_index_if_not_exists().await?;
            feedback.create_index_if_not_exists().await?;

            (
                Arc::new(conversations) as Arc<ConversationStore>,
                Arc::new(feedback) as Arc<FeedbackStore>,
            )
        }
    };

    // Shared application state
    let app_state = AppState {
        analytics: Arc::new(AnalyticsService::new(conversations, feedback, config.sentiment_source)),
    };

    // Health check handler
    async fn health_handler() -> Json<Value> {
        Json(json!({
            "status": "ok",
            "message": "Session analytics server is running",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    }

    // Define routes
    let app = Router::new()
        .route("/health", get(health_handler))
        .nest("/api", routes::analytics::create_analytics_router())
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .with_state(app_state);

    // Run server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🌐 Server running on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
