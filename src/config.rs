use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::panel::RenderPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Address the panel server binds to
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default)]
    pub render: RenderPolicy,
    #[serde(rename = "URLs", default)]
    pub urls: Vec<FeedEntry>,
}

fn default_listen() -> String {
    "0.0.0.0:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedEntry {
    pub url: String,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Feed URLs in stored order
    pub fn feed_urls(&self) -> Vec<String> {
        self.urls.iter().map(|entry| entry.url.clone()).collect()
    }
}

/// Where the panel reads its feed URLs from at the start of every reload.
///
/// Loading may block on I/O; the panel calls it on tokio's blocking pool.
pub trait FeedUrlSource: Send + Sync + 'static {
    fn load_feed_urls(&self) -> anyhow::Result<Vec<String>>;
}

impl FeedUrlSource for Config {
    fn load_feed_urls(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.feed_urls())
    }
}

/// Re-reads the settings file on every call, so edits show up on the next reload.
#[derive(Debug, Clone)]
pub struct SettingsFile {
    path: PathBuf,
}

impl SettingsFile {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FeedUrlSource for SettingsFile {
    fn load_feed_urls(&self) -> anyhow::Result<Vec<String>> {
        Ok(Config::load(&self.path)?.feed_urls())
    }
}
