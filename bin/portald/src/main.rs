//! `portald` — the warranty portal server binary.
//!
//! Usage:
//!   portald -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/portal/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod auth_middleware;
mod bootstrap;
mod config;
mod directory;
mod routes;

use std::sync::Arc;

use clap::Parser;
use portal_core::Module;
use tracing::info;

use auth_middleware::AuthState;
use config::ServerConfig;
use directory::AccountsDirectory;

/// Warranty portal server.
#[derive(Parser, Debug)]
#[command(name = "portald", about = "Warranty portal server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides default 0.0.0.0:8080).
    #[arg(long = "listen", default_value = "0.0.0.0:8080")]
    listen: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let server_config = ServerConfig::load(&config_path)?;
    bootstrap::verify_config(&server_config)?;

    let data_dir = std::path::PathBuf::from(&server_config.storage.data_dir);
    std::fs::create_dir_all(&data_dir)?;

    let core_config = portal_core::ServiceConfig {
        data_dir: Some(data_dir.clone()),
        listen: cli.listen.clone(),
        ..Default::default()
    };

    // Shared stores.
    let sql: Arc<dyn portal_sql::SQLStore> = Arc::new(
        portal_sql::SqliteStore::open(&core_config.resolve_sqlite_path())
            .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?,
    );
    let blob: Arc<dyn portal_blob::BlobStore> = Arc::new(
        portal_blob::FileStore::open(&core_config.resolve_bills_dir())
            .map_err(|e| anyhow::anyhow!("failed to open bill store: {}", e))?,
    );

    // Accounts module.
    let accounts_config = portal_accounts::service::AccountsConfig {
        token_ttl_secs: server_config.login.token_ttl_secs,
        login_max_attempts: server_config.login.max_attempts,
        login_window_secs: server_config.login.window_secs,
    };
    let accounts_service =
        portal_accounts::service::AccountsService::new(Arc::clone(&sql), accounts_config)
            .map_err(|e| anyhow::anyhow!("accounts init failed: {}", e))?;
    let accounts_module = portal_accounts::AccountsModule::new(accounts_service);
    let accounts = accounts_module.service();
    info!("Accounts module initialized");

    bootstrap::ensure_admin(&accounts, &server_config)?;

    // Warranty module, with the accounts directory injected at the seam.
    let warranty_config = portal_warranty::service::WarrantyConfig {
        delete_evidence_on_release: server_config.warranty.delete_bill_on_disassociate,
    };
    let warranty_service = portal_warranty::service::WarrantyService::new(
        Arc::clone(&sql),
        Arc::clone(&blob),
        Arc::new(AccountsDirectory::new(Arc::clone(&accounts))),
        warranty_config,
    )
    .map_err(|e| anyhow::anyhow!("warranty init failed: {}", e))?;
    let warranty_module = portal_warranty::WarrantyModule::new(warranty_service);
    info!("Warranty module initialized");

    let auth_state = AuthState {
        accounts: Arc::clone(&accounts),
    };
    let modules: Vec<(&str, axum::Router)> = vec![
        (accounts_module.name(), accounts_module.routes()),
        (warranty_module.name(), warranty_module.routes()),
    ];
    let app = routes::build_router(auth_state, modules);

    let listener = tokio::net::TcpListener::bind(&core_config.listen).await?;
    info!("portald listening on {}", core_config.listen);
    axum::serve(listener, app).await?;
    Ok(())
}
