use std::path::PathBuf;

/// Storage paths shared by all services.
///
/// The server binary fills this from its TOML config, then passes it to
/// storage layer initialization.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Base data directory. All other paths default to subpaths of it.
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite database file.
    /// Defaults to `{data_dir}/portal.sqlite` if not specified.
    pub sqlite_path: Option<PathBuf>,

    /// Directory for bill-file (evidence) storage.
    /// Defaults to `{data_dir}/bills/` if not specified.
    pub bills_dir: Option<PathBuf>,

    /// Listen address for the HTTP server.
    pub listen: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sqlite_path: None,
            bills_dir: None,
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Resolve the SQLite database path, falling back to `{data_dir}/portal.sqlite`.
    pub fn resolve_sqlite_path(&self) -> PathBuf {
        self.sqlite_path
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("portal.sqlite"))
    }

    /// Resolve the bills directory, falling back to `{data_dir}/bills`.
    pub fn resolve_bills_dir(&self) -> PathBuf {
        self.bills_dir
            .clone()
            .unwrap_or_else(|| self.resolve_data_subpath("bills"))
    }

    fn resolve_data_subpath(&self, name: &str) -> PathBuf {
        self.data_dir
            .as_ref()
            .map(|d| d.join(name))
            .unwrap_or_else(|| PathBuf::from(name))
    }
}
