use std::path::PathBuf;
use tracing::warn;

use crate::news_client::DEFAULT_ENDPOINT;

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `None` when no home directory can be found; state then lives in memory.
    pub data_dir: Option<PathBuf>,
    pub endpoint: String,
    pub host_marker: Option<String>,
}

impl AppConfig {
    /// Reads `.env` if present, then the process environment.
    pub fn load() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir = lookup("ONE_HEADLINE_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .or_else(Self::default_data_dir);

        let endpoint = lookup("ONE_HEADLINE_ENDPOINT")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        Self {
            data_dir,
            endpoint,
            host_marker: lookup("ONE_HEADLINE_HOST"),
        }
    }

    fn default_data_dir() -> Option<PathBuf> {
        let home_dir = dirs_next::home_dir();
        if home_dir.is_none() {
            warn!("Could not find home directory, headline state will not persist");
        }
        home_dir.map(|home| home.join(".one_headline"))
    }
}
