use std::env;
use std::path::PathBuf;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory of the on-disk metadata cache.
    pub cache_dir: PathBuf,

    // Bibliographic service
    pub catalog_api_url: String,
    pub catalog_api_key: Option<String>,

    // Derived-citation service
    pub citation_api_url: String,

    /// Minimum spacing between consecutive remote lookups, in milliseconds.
    pub lookup_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if required vars are missing.
    pub fn from_env() -> Self {
        Self {
            cache_dir: env::var("SHELFMARK_CACHE_DIR")
                .unwrap_or_else(|_| "cache".to_string())
                .into(),
            catalog_api_url: required_env("CATALOG_API_URL"),
            catalog_api_key: env::var("CATALOG_API_KEY").ok(),
            citation_api_url: required_env("CITATION_API_URL"),
            lookup_interval_ms: env::var("LOOKUP_INTERVAL_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .expect("LOOKUP_INTERVAL_MS must be a number"),
        }
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}
