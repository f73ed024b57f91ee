//! The news panel controller.
//!
//! A single task owns every piece of mutable panel state. Reload commands
//! arrive through [`PanelHandle`], fetch results through an internal channel,
//! and each state change is published as a [`PanelSnapshot`] for renderers.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::config::FeedUrlSource;
use crate::distributor::{distribute, Columns};
use crate::fetcher::{FetchEvent, Fetcher};
use crate::headline::Headline;
use crate::parser::parse;

/// When the columns are redistributed during a reload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// Reshuffle every time a feed arrives
    #[default]
    EveryArrival,
    /// Shuffle once, after every feed of the cycle has completed or failed
    WhenSettled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelState {
    Idle,
    Loading,
    Fetching,
    Rendering,
}

impl fmt::Display for PanelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PanelState::Idle => "idle",
            PanelState::Loading => "loading",
            PanelState::Fetching => "fetching",
            PanelState::Rendering => "rendering",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PanelSnapshot {
    pub generation: u64,
    pub state: PanelState,
    pub columns: Columns,
    pub headline_count: usize,
    pub pending: usize,
    pub reloaded_at: Option<DateTime<Utc>>,
}

impl PanelSnapshot {
    pub fn is_busy(&self) -> bool {
        self.state != PanelState::Idle
    }
}

/// Panel state without any I/O attached.
#[derive(Debug)]
pub struct PanelCore {
    policy: RenderPolicy,
    generation: u64,
    state: PanelState,
    headlines: Vec<Headline>,
    columns: Columns,
    pending: usize,
    reloaded_at: Option<DateTime<Utc>>,
}

impl PanelCore {
    pub fn new(policy: RenderPolicy) -> Self {
        Self {
            policy,
            generation: 0,
            state: PanelState::Idle,
            headlines: Vec::new(),
            columns: Columns::default(),
            pending: 0,
            reloaded_at: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn headlines(&self) -> &[Headline] {
        &self.headlines
    }

    pub fn columns(&self) -> &Columns {
        &self.columns
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Drop everything from the previous cycle and start a new one.
    pub fn begin_reload(&mut self) -> u64 {
        self.generation += 1;
        self.headlines.clear();
        self.columns.clear();
        self.pending = 0;
        self.state = PanelState::Loading;
        self.reloaded_at = Some(Utc::now());
        self.generation
    }

    pub fn begin_fetching(&mut self, requests: usize) {
        self.pending = requests;
        self.state = if requests == 0 {
            PanelState::Idle
        } else {
            PanelState::Fetching
        };
    }

    /// Fold one fetch result into the current cycle.
    ///
    /// Returns `false` when the event belongs to an older cycle and was dropped.
    pub fn handle_fetch(&mut self, event: FetchEvent) -> bool {
        if event.generation() != self.generation {
            debug!(
                "Discarding result for {} from reload #{} (current #{})",
                event.url(),
                event.generation(),
                self.generation
            );
            return false;
        }

        self.pending = self.pending.saturating_sub(1);

        if let FetchEvent::Completed {
            url, label, body, ..
        } = event
        {
            let parsed = parse(&body, &label);
            debug!("Parsed {} headlines from {}", parsed.len(), url);
            self.headlines.extend(parsed);
            if self.policy == RenderPolicy::EveryArrival {
                self.render();
            }
        }

        if self.pending == 0 {
            if self.policy == RenderPolicy::WhenSettled {
                self.render();
            }
            self.state = PanelState::Idle;
            info!(
                "Reload #{} settled with {} headlines",
                self.generation,
                self.headlines.len()
            );
        }

        true
    }

    fn render(&mut self) {
        self.state = PanelState::Rendering;
        self.columns = distribute(&self.headlines);
        self.state = if self.pending > 0 {
            PanelState::Fetching
        } else {
            PanelState::Idle
        };
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            generation: self.generation,
            state: self.state,
            columns: self.columns.clone(),
            headline_count: self.headlines.len(),
            pending: self.pending,
            reloaded_at: self.reloaded_at,
        }
    }
}

pub enum PanelCommand {
    Reload,
}

/// Cloneable front door to a running panel.
#[derive(Clone)]
pub struct PanelHandle {
    commands: mpsc::Sender<PanelCommand>,
    snapshot: watch::Receiver<PanelSnapshot>,
}

impl PanelHandle {
    pub async fn reload(&self) -> anyhow::Result<()> {
        self.commands
            .send(PanelCommand::Reload)
            .await
            .map_err(|_| anyhow::anyhow!("Panel is not running"))
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PanelSnapshot> {
        self.snapshot.clone()
    }
}

pub struct Panel {
    core: PanelCore,
    source: Arc<dyn FeedUrlSource>,
    fetcher: Fetcher,
    commands: mpsc::Receiver<PanelCommand>,
    events_tx: mpsc::UnboundedSender<FetchEvent>,
    events_rx: mpsc::UnboundedReceiver<FetchEvent>,
    snapshot: watch::Sender<PanelSnapshot>,
}

impl Panel {
    pub fn new(
        source: Arc<dyn FeedUrlSource>,
        fetcher: Fetcher,
        policy: RenderPolicy,
    ) -> (Self, PanelHandle) {
        let core = PanelCore::new(policy);
        let (commands_tx, commands_rx) = mpsc::channel(16);
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(core.snapshot());

        let panel = Self {
            core,
            source,
            fetcher,
            commands: commands_rx,
            events_tx,
            events_rx,
            snapshot: snapshot_tx,
        };
        let handle = PanelHandle {
            commands: commands_tx,
            snapshot: snapshot_rx,
        };

        (panel, handle)
    }

    /// Start the panel on the runtime. The first reload happens right away.
    pub fn spawn(
        source: Arc<dyn FeedUrlSource>,
        fetcher: Fetcher,
        policy: RenderPolicy,
    ) -> PanelHandle {
        let (panel, handle) = Self::new(source, fetcher, policy);
        tokio::spawn(panel.run());
        handle
    }

    /// Process commands and fetch results until every handle is dropped.
    pub async fn run(mut self) {
        self.reload().await;

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(PanelCommand::Reload) => self.reload().await,
                    None => break,
                },
                Some(event) = self.events_rx.recv() => {
                    if self.core.handle_fetch(event) {
                        self.publish();
                    }
                }
            }
        }

        info!("Panel stopped");
    }

    async fn reload(&mut self) {
        let generation = self.core.begin_reload();
        self.publish();

        let urls = self.load_feed_urls().await;
        info!("Reload #{}: fetching {} feeds", generation, urls.len());

        self.core.begin_fetching(urls.len());
        self.fetcher.fetch_all(generation, urls, &self.events_tx);
        self.publish();
    }

    /// Sources may read from disk, so loading runs on the blocking pool.
    async fn load_feed_urls(&self) -> Vec<String> {
        let source = Arc::clone(&self.source);
        match tokio::task::spawn_blocking(move || source.load_feed_urls()).await {
            Ok(Ok(urls)) => urls,
            Ok(Err(e)) => {
                warn!("Failed to load feed URLs: {}", e);
                Vec::new()
            }
            Err(e) => {
                warn!("Feed URL loader did not finish: {}", e);
                Vec::new()
            }
        }
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.core.snapshot());
    }
}
