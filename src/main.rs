use anyhow::{Context, Result};
use axum::Router;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use job_buckets::{
    config,
    models::{action::ActionVocabulary, principal::CharacterRecord},
    routes,
    services::{
        bucket_service::BucketService, bucket_store::BucketStore, gate::AccessGate,
        identity::CharacterDirectory, settings::SettingsValidator,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting job-buckets with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    tracing::debug!("Connecting using raw URL => {}", db_url);

    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .trim_start_matches("file:");
    if !db_path.starts_with(":memory:") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
                tracing::info!("Created missing directory {:?}", parent);
            }
        }
    }

    let options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database URL `{}`", db_url))?
        .create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?,
    );

    let store = BucketStore::new(db.clone());
    store.migrate().await?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    if let Some(admin) = &cfg.bootstrap_admin {
        let record = CharacterRecord {
            name: admin.clone(),
            kind: "character".into(),
            roles: "Admin".into(),
        };
        if store.ensure_character(&record).await? {
            tracing::info!("Bootstrapped admin character {}", admin);
        }
    }

    // --- Identity + access control ---
    let directory = CharacterDirectory::new(store.load_characters().await?);
    tracing::info!("Loaded {} directory entries", directory.len());
    let gate = AccessGate::new(Arc::new(directory.role_override(&cfg.override_roles)));

    // --- Initialize core service ---
    let service = BucketService::load(
        store,
        gate,
        Arc::new(directory),
        Arc::new(ActionVocabulary::standard()),
        Arc::new(SettingsValidator::standard()),
    )
    .await?;

    // --- Build router ---
    let app: Router = routes::routes::routes().with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
