use std::{
    fs,
    path::PathBuf,
    sync::RwLock,
    time::Duration,
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const API_URL_ENV: &str = "DRIFTWATCH_API_URL";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub api_url: String,
    /// Events per batch before an immediate flush.
    pub batch_size: usize,
    /// Quiet period after the last event before a pending batch is sent.
    pub idle_flush_secs: u64,
    /// Minimum spacing of mouse-move and scroll events per tab.
    pub throttle_ms: u64,
    pub request_timeout_secs: u64,
    /// Reported at session start when the extension does not say.
    pub browser_name: String,
    pub browser_version: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://127.0.0.1:8000".into(),
            batch_size: 20,
            idle_flush_secs: 30,
            throttle_ms: 1000,
            request_timeout_secs: 10,
            browser_name: "Chrome".into(),
            browser_version: "unknown".into(),
        }
    }
}

impl Settings {
    pub fn idle_flush(&self) -> Duration {
        Duration::from_secs(self.idle_flush_secs)
    }

    pub fn throttle_window(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn normalized(mut self) -> Self {
        let defaults = Settings::default();
        if self.batch_size == 0 {
            self.batch_size = defaults.batch_size;
        }
        if self.api_url.trim().is_empty() {
            self.api_url = defaults.api_url;
        }
        self.api_url = self.api_url.trim_end_matches('/').to_string();
        self
    }
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<Settings>,
}

impl SettingsStore {
    /// Loads `path` if it exists. A file that fails to parse falls back to
    /// defaults rather than keeping the tracker from starting.
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    log::warn!("Ignoring malformed settings at {}: {err}", path.display());
                    Settings::default()
                }
            }
        } else {
            Settings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data.normalized()),
        })
    }

    /// Applies `DRIFTWATCH_API_URL`, then an explicit override (CLI flag).
    pub fn with_overrides(self, api_url: Option<String>) -> Self {
        let from_env = std::env::var(API_URL_ENV).ok().filter(|v| !v.trim().is_empty());
        if let Some(url) = api_url.or(from_env) {
            let mut guard = self.data.write().unwrap_or_else(|p| p.into_inner());
            let updated = Settings {
                api_url: url,
                ..guard.clone()
            };
            *guard = updated.normalized();
        }
        self
    }

    pub fn get(&self) -> Settings {
        self.data.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn update(&self, settings: Settings) -> Result<()> {
        let mut guard = self.data.write().unwrap_or_else(|p| p.into_inner());
        *guard = settings.normalized();
        self.persist(&guard)
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn persist(&self, data: &Settings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
