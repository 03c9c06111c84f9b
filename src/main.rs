use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod state;
mod task;

use lumitv_backend::config;
use lumitv_backend::config::StorageKind;
use lumitv_backend::search::ZhConverter;
use lumitv_backend::sources::AppleCmsAdapter;
use lumitv_backend::storage::{KvDatabase, KvStorage, MemoryKv, SqliteKv};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lumitv_backend=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration / 加载配置
    let config_handle = config::init_config().expect("Failed to load configuration");
    let app_config = config_handle.read().clone();
    tracing::info!(
        "Server will listen on {}:{}",
        app_config.server.host,
        app_config.server.port
    );
    if app_config.sources.is_empty() {
        tracing::warn!("配置中没有任何资源站，搜索将始终返回空结果");
    }

    // 按配置选择存储后端 / choose storage backend per config
    let db: Arc<dyn KvDatabase> = match app_config.storage.kind {
        StorageKind::Memory => {
            tracing::warn!("使用进程内存储：数据不持久，仅限单实例部署");
            Arc::new(MemoryKv::default())
        }
        StorageKind::Sqlite => {
            // Create data directory if not exists / 创建数据目录
            let data_dir = app_config.get_data_dir();
            if !data_dir.exists() {
                std::fs::create_dir_all(&data_dir)?;
                tracing::info!("Created data directory: {:?}", data_dir);
            }
            let database_url = std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| app_config.get_database_url());
            Arc::new(SqliteKv::connect(&database_url).await?)
        }
    };

    // 上游请求与简繁转换共用一个 HTTP 客户端
    let client = reqwest::Client::new();
    let state = Arc::new(AppState {
        adapter: Arc::new(AppleCmsAdapter::new(client.clone())),
        storage: KvStorage::new(db),
        storage_kind: app_config.storage.kind,
        converter: ZhConverter::new(client, &app_config.zhconvert),
    });

    let app = Router::new()
        .route("/api/health", get(api::server::health_check))
        .route("/api/search", get(api::search::search))
        .route("/api/cron", get(api::cron::trigger))
        .route("/api/config/custom_category", get(api::category::custom_categories))
        .layer(CorsLayer::permissive())
        .with_state(state.clone());

    let bind_addr = app_config.get_bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    tracing::info!("Server running at http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
