use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::label::derive_label;

pub const USER_AGENT: &str = "Horizon Launcher";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Outcome of one feed request, tagged with the reload generation that issued it.
#[derive(Debug, Clone)]
pub enum FetchEvent {
    Completed {
        generation: u64,
        url: String,
        label: String,
        body: Bytes,
    },
    Failed {
        generation: u64,
        url: String,
    },
}

impl FetchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            FetchEvent::Completed { generation, .. } | FetchEvent::Failed { generation, .. } => {
                *generation
            }
        }
    }

    pub fn url(&self) -> &str {
        match self {
            FetchEvent::Completed { url, .. } | FetchEvent::Failed { url, .. } => url,
        }
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Fire one independent request per URL.
    ///
    /// Returns immediately; every request reports exactly one [`FetchEvent`]
    /// on `events`, in completion order.
    pub fn fetch_all(
        &self,
        generation: u64,
        urls: Vec<String>,
        events: &mpsc::UnboundedSender<FetchEvent>,
    ) {
        for url in urls {
            let fetcher = self.clone();
            let events = events.clone();
            tokio::spawn(async move {
                let event = match fetcher.fetch_feed(&url).await {
                    Ok(body) => {
                        debug!("Fetched {} bytes from {}", body.len(), url);
                        FetchEvent::Completed {
                            generation,
                            label: derive_label(&url),
                            url,
                            body,
                        }
                    }
                    Err(e) => {
                        warn!("Failed to fetch feed '{}': {}", url, e);
                        FetchEvent::Failed { generation, url }
                    }
                };
                // The panel may already be gone
                let _ = events.send(event);
            });
        }
    }

    pub async fn fetch_feed(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        let bytes = response.bytes().await?;
        Ok(bytes)
    }
}
