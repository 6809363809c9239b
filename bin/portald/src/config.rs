//! Server configuration, loaded from a TOML file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub storage: StorageConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub warranty: WarrantyConfig,
    #[serde(default)]
    pub login: LoginConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    pub mobile: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WarrantyConfig {
    /// Delete the bill file when a serial is disassociated. Off by
    /// default: the file stays for audit continuity.
    #[serde(default)]
    pub delete_bill_on_disassociate: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: i64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_window")]
    pub window_secs: u64,
}

fn default_token_ttl() -> i64 {
    30 * 24 * 3600
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window() -> u64 {
    60
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: default_token_ttl(),
            max_attempts: default_max_attempts(),
            window_secs: default_window(),
        }
    }
}

impl ServerConfig {
    /// A bare name resolves to `/etc/portal/<name>.toml`; anything with a
    /// separator or extension is used as a path directly.
    pub fn resolve_path(name_or_path: &str) -> PathBuf {
        if name_or_path.contains('/') || name_or_path.contains('.') {
            PathBuf::from(name_or_path)
        } else {
            PathBuf::from(format!("/etc/portal/{}.toml", name_or_path))
        }
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read config {}: {}", path.display(), e))?;
        let config: ServerConfig = toml::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("invalid config {}: {}", path.display(), e))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_path_handles_names_and_paths() {
        assert_eq!(
            ServerConfig::resolve_path("prod"),
            PathBuf::from("/etc/portal/prod.toml")
        );
        assert_eq!(
            ServerConfig::resolve_path("./local.toml"),
            PathBuf::from("./local.toml")
        );
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            [storage]
            data_dir = "/var/lib/portal"

            [admin]
            mobile = "9000000000"
            password = "change-me-please"
            "#,
        )
        .unwrap();
        assert!(!config.warranty.delete_bill_on_disassociate);
        assert_eq!(config.login.max_attempts, 5);
    }
}
