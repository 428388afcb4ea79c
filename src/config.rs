use anyhow::{anyhow, Result};
use config::Config;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::lens::ip::DEFAULT_LOOKUP_URL;
use crate::ranges::{DEFAULT_RANGES_URL, RANGES_CACHE_FILE};

pub struct RelaycheckConfig {
    /// Path to the directory to hold relaycheck's data
    pub data_dir: String,

    /// URL of the published egress range list
    pub ranges_url: String,

    /// TTL for the range list cache in seconds (default: 24 hours)
    pub ranges_cache_ttl_secs: u64,

    /// Timeout for remote calls in seconds (default: 30 seconds)
    pub fetch_timeout_secs: u64,

    /// Endpoint for IP registration/geolocation lookups
    pub lookup_url: String,

    /// Address the HTTP server binds to
    pub server_address: String,

    /// Port the HTTP server listens on
    pub server_port: u16,
}

const DEFAULT_TTL_SECS: u64 = 86400;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SERVER_ADDRESS: &str = "127.0.0.1";
const DEFAULT_SERVER_PORT: u16 = 8080;

const EMPTY_CONFIG: &str = r#"### relaycheck configuration file

### directory for cached data used by relaycheck
# data_dir = "~/.relaycheck"

### published egress range list
# ranges_url = "https://mask-api.icloud.com/egress-ip-ranges.csv"

### cache TTL and timeout settings (in seconds)
# ranges_cache_ttl_secs = 86400     # 24 hours
# fetch_timeout_secs = 30

### IP registration/geolocation lookup endpoint
# lookup_url = "https://api.bgpkit.com/v3/utils/ip"

### HTTP server
# server_address = "127.0.0.1"
# server_port = 8080
"#;

impl Default for RelaycheckConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self {
            data_dir: format!("{}/.relaycheck", home_dir),
            ranges_url: DEFAULT_RANGES_URL.to_string(),
            ranges_cache_ttl_secs: DEFAULT_TTL_SECS,
            fetch_timeout_secs: DEFAULT_TIMEOUT_SECS,
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            server_address: DEFAULT_SERVER_ADDRESS.to_string(),
            server_port: DEFAULT_SERVER_PORT,
        }
    }
}

impl RelaycheckConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<RelaycheckConfig> {
        let mut builder = Config::builder();

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                // By default use $HOME/.relaycheck/relaycheck.toml
                let relaycheck_dir = default_dir()?;
                std::fs::create_dir_all(relaycheck_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create relaycheck directory: {}", e))?;
                let p = format!("{}/relaycheck.toml", relaycheck_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of RELAYCHECK)
        // E.g., `RELAYCHECK_DATA_DIR=/var/lib/relaycheck ./relaycheck serve`
        builder = builder.add_source(config::Environment::with_prefix("RELAYCHECK"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    /// Build a configuration from flattened key/value settings
    fn from_map(config: &HashMap<String, String>) -> Result<RelaycheckConfig> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p)?,
            None => default_dir()?,
        };

        let ranges_url = config
            .get("ranges_url")
            .cloned()
            .unwrap_or_else(|| DEFAULT_RANGES_URL.to_string());

        let ranges_cache_ttl_secs = config
            .get("ranges_cache_ttl_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TTL_SECS);

        let fetch_timeout_secs = config
            .get("fetch_timeout_secs")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let lookup_url = config
            .get("lookup_url")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOOKUP_URL.to_string());

        let server_address = config
            .get("server_address")
            .cloned()
            .unwrap_or_else(|| DEFAULT_SERVER_ADDRESS.to_string());

        let server_port = config
            .get("server_port")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);

        Ok(RelaycheckConfig {
            data_dir,
            ranges_url,
            ranges_cache_ttl_secs,
            fetch_timeout_secs,
            lookup_url,
            server_address,
            server_port,
        })
    }

    /// Get range list cache TTL as Duration
    pub fn ranges_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.ranges_cache_ttl_secs)
    }

    /// Get remote call timeout as Duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> String {
        format!("{}/cache", self.data_dir.trim_end_matches('/'))
    }

    /// Get the path of the local range list copy
    pub fn ranges_cache_path(&self) -> String {
        format!("{}/{}", self.cache_dir(), RANGES_CACHE_FILE)
    }

    /// Get the full server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server_address, self.server_port)
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.relaycheck/relaycheck.toml", home_dir)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("Data Directory:     {}", self.data_dir),
            format!("Ranges URL:         {}", self.ranges_url),
            format!("Ranges Cache TTL:   {} seconds", self.ranges_cache_ttl_secs),
            format!("Fetch Timeout:      {} seconds", self.fetch_timeout_secs),
            format!("Lookup URL:         {}", self.lookup_url),
            format!("Server Address:     {}", self.bind_address()),
        ];

        // Show the local copy if one has been fetched
        let ranges_path = self.ranges_cache_path();
        if let Ok(meta) = std::fs::metadata(&ranges_path) {
            lines.push(format!(
                "Local Range Copy:   {} ({})",
                ranges_path,
                format_size(meta.len())
            ));
        }

        lines.join("\n")
    }
}

fn default_dir() -> Result<String> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    let home_str = home
        .to_str()
        .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?;
    Ok(format!("{}/.relaycheck", home_str))
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> Result<String> {
    match path.strip_prefix('~') {
        Some(rest) => {
            let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
            let home_str = home
                .to_str()
                .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?;
            Ok(format!("{}{}", home_str, rest))
        }
        None => Ok(path.to_string()),
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
