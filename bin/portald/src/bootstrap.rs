//! Startup checks and the admin account seed.

use std::sync::Arc;

use portal_accounts::service::AccountsService;

use crate::config::ServerConfig;

pub fn verify_config(config: &ServerConfig) -> anyhow::Result<()> {
    if config.storage.data_dir.trim().is_empty() {
        anyhow::bail!("storage.data_dir must be set");
    }
    if config.admin.mobile.trim().is_empty() {
        anyhow::bail!("admin.mobile must be set");
    }
    if config.admin.password.len() < 8 {
        anyhow::bail!("admin.password must be at least 8 characters");
    }
    Ok(())
}

/// Seed or refresh the administrator account from configuration.
pub fn ensure_admin(
    accounts: &Arc<AccountsService>,
    config: &ServerConfig,
) -> anyhow::Result<()> {
    let admin = accounts
        .ensure_admin(&config.admin.mobile, &config.admin.password)
        .map_err(|e| anyhow::anyhow!("admin bootstrap failed: {}", e))?;
    tracing::info!(admin_id = admin.id, "administrator account ready");
    Ok(())
}
