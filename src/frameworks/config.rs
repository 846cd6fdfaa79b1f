use serde::Deserialize;
use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

// Runtime constants.

pub const TRIGGER_CHANNEL_CAPACITY: usize = 16;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_SHARE_URL: &str = "http://localhost:8080/profile";
pub const DEFAULT_DATA_DIR: &str = ".profile_gate";

// Settings loaded from an optional TOML file, then overridden by env vars.
// The session window is fixed at `SESSION_TTL_MS` and is not read from here.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub poll_interval_ms: u64,
    pub share_base_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            share_base_url: DEFAULT_SHARE_URL.to_string(),
        }
    }
}

impl Config {
    pub async fn load() -> Self {
        let base = match env::var("PROFILE_GATE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path)).await,
            Err(_) => Self::default(),
        };

        base.with_overrides(|key| env::var(key).ok())
    }

    // Reads a TOML config file; any failure is logged and yields defaults.
    pub async fn from_file(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(raw) => Self::from_toml_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "invalid config file; using defaults"
                );
                Self::default()
            }),
            Err(err) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "unreadable config file; using defaults"
                );
                Self::default()
            }
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    // Applies `PROFILE_GATE_*` values; unparsable numbers are ignored.
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(dir) = lookup("PROFILE_GATE_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(interval) = lookup("PROFILE_GATE_POLL_INTERVAL_MS").and_then(|v| v.parse().ok())
        {
            self.poll_interval_ms = interval;
        }
        if let Some(url) = lookup("PROFILE_GATE_SHARE_URL") {
            self.share_base_url = url;
        }
        self
    }

    // Never zero; tokio intervals reject a zero period.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}
