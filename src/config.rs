//! Configuration loading (.env + process environment)

use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DEFAULT_ZONE: &str = "ch-gva-2";

/// Project directory (where .env is)
pub fn project_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("V3CLI_PROJECT_DIR") {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Load .env if present. A missing file is fine, a malformed one is not.
pub fn load_env() -> Result<()> {
    let env_path = project_dir().join(".env");
    match dotenvy::from_path(&env_path) {
        Ok(()) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to load .env from {:?}", env_path)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Absent credentials only fail once an API call is attempted.
    pub credentials: Option<Credentials>,
    pub zone: String,
    pub endpoint: Option<String>,
    pub agent: bool,
    pub debug: bool,
    pub catalog: Option<PathBuf>,
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let credentials = match (non_empty("EXOSCALE_API_KEY"), non_empty("EXOSCALE_API_SECRET")) {
            (Some(key), Some(secret)) => Some(Credentials { key, secret }),
            _ => None,
        };

        Self {
            credentials,
            zone: non_empty("EXOSCALE_ZONE").unwrap_or_else(|| DEFAULT_ZONE.to_string()),
            endpoint: non_empty("EXOSCALE_API_ENDPOINT"),
            agent: non_empty("V3CLI_AGENT").is_some_and(|v| is_truthy(&v)),
            debug: non_empty("V3CLI_DEBUG").is_some_and(|v| is_truthy(&v)),
            catalog: non_empty("V3CLI_CATALOG").map(PathBuf::from),
        }
    }

    /// API endpoint: the explicit override, else the zone's public endpoint.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://api-{}.exoscale.com/v2", self.zone),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
