use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};

use cityscape_import::adapter::handler::{self, AppState};
use cityscape_import::adapter::repository::{
    InMemoryCityStore, InMemoryImportRecordRepository, PostgresCityStore,
    PostgresImportRecordRepository,
};
use cityscape_import::domain::repository::{
    ImportRecordRepository, ObjectStorage, TransactionalCityStore,
};
use cityscape_import::infrastructure::config::{default_presign_expiry_seconds, Config};
use cityscape_import::infrastructure::memory_storage::InMemoryObjectStorage;
use cityscape_import::infrastructure::s3_storage::S3ObjectStorage;
use cityscape_import::usecase::{ImportBatchUseCase, ListImportsUseCase, SweepStaleUseCase};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .json()
        .init();

    // Config
    let config_path =
        std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/config.yaml".to_string());
    let config_content = std::fs::read_to_string(&config_path)?;
    let cfg: Config = serde_yaml::from_str(&config_content)?;

    info!(
        app_name = %cfg.app.name,
        version = %cfg.app.version,
        environment = %cfg.app.environment,
        "starting cityscape import server"
    );

    // Database pool (optional)
    let db_pool = if let Some(ref db_config) = cfg.database {
        let url = std::env::var("DATABASE_URL").unwrap_or_else(|_| db_config.connection_url());
        info!("connecting to database");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(db_config.max_open_conns)
            .connect(&url)
            .await?;
        info!("database connection pool established");
        Some(pool)
    } else if let Ok(url) = std::env::var("DATABASE_URL") {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(25)
            .connect(&url)
            .await?;
        info!("database connection pool established from DATABASE_URL");
        Some(pool)
    } else {
        info!("no database configured, using in-memory repositories");
        None
    };

    // Repositories
    let import_repo: Arc<dyn ImportRecordRepository> = if let Some(ref pool) = db_pool {
        Arc::new(PostgresImportRecordRepository::new(pool.clone()))
    } else {
        Arc::new(InMemoryImportRecordRepository::new())
    };
    let city_store: Arc<dyn TransactionalCityStore> = if let Some(ref pool) = db_pool {
        Arc::new(PostgresCityStore::new(pool.clone()))
    } else {
        Arc::new(InMemoryCityStore::new())
    };

    // Object storage (optional, in-memory fallback)
    let (storage, presign_expiry_seconds): (Arc<dyn ObjectStorage>, u32) =
        if let Some(ref storage_config) = cfg.storage {
            info!(bucket = %storage_config.bucket, "using S3 object storage");
            let s3 = S3ObjectStorage::new(
                storage_config.bucket.clone(),
                storage_config.region.clone(),
                storage_config.endpoint.clone(),
            )
            .await?;
            (Arc::new(s3), storage_config.presign_expiry_seconds)
        } else {
            info!("no object storage configured, using in-memory storage");
            (
                Arc::new(InMemoryObjectStorage::new()),
                default_presign_expiry_seconds(),
            )
        };

    // Use cases
    let import_batch_uc = Arc::new(ImportBatchUseCase::new(
        import_repo.clone(),
        city_store,
        storage.clone(),
    ));
    let list_imports_uc = Arc::new(ListImportsUseCase::new(
        import_repo.clone(),
        storage.clone(),
        presign_expiry_seconds,
    ));
    let sweep_stale_uc = Arc::new(SweepStaleUseCase::new(
        import_repo,
        storage,
        cfg.import.stale_after_seconds,
    ));

    // 定期 stale スイープ
    let sweep_interval = std::time::Duration::from_secs(cfg.import.sweep_interval_seconds);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_interval);
        interval.tick().await; // 最初のtickは即時なので読み捨てる
        loop {
            interval.tick().await;
            if let Err(e) = sweep_stale_uc.execute().await {
                error!(error = %e, "stale import sweep failed");
            }
        }
    });

    let state = AppState {
        import_batch_uc,
        list_imports_uc,
    };
    let app = handler::router(state);

    let rest_addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    info!("REST server starting on {}", rest_addr);

    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
