// The application event loop.
//
// Owns the reconciler and multiplexes four inputs: feed events from the
// WebSocket supervisors, the trailing debounce timer for leaderboard
// pushes, the periodic REST poll fallback, and commands from the view.
// Leaderboard data always enters through the debounce queue, so a burst of
// pushes collapses into one render of the latest payload; board updates
// are cheap and rendered immediately.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::config::Config;
use crate::feed::FeedEvent;
use crate::protocol::{BoardState, LeaderboardEntry, LiveMessage};
use crate::reconcile::{DiffPolicy, Reconciler, ViewCommand, ViewUpdate};
use crate::store::SnapshotStore;

pub struct App {
    config: Config,
    reconciler: Reconciler,
    api: Arc<ApiClient>,
    store: Arc<SnapshotStore>,
    ui_tx: mpsc::UnboundedSender<ViewUpdate>,
    /// The latest leaderboard waiting for the debounce window to elapse.
    /// Each new payload replaces this and restarts the window.
    pending: Option<Vec<LeaderboardEntry>>,
    debounce_deadline: Option<Instant>,
}

impl App {
    pub fn new(
        config: Config,
        username: Option<String>,
        api: Arc<ApiClient>,
        store: Arc<SnapshotStore>,
        ui_tx: mpsc::UnboundedSender<ViewUpdate>,
    ) -> Self {
        let policy = DiffPolicy::from(&config.diff);
        App {
            config,
            reconciler: Reconciler::new(policy, username),
            api,
            store,
            ui_tx,
            pending: None,
            debounce_deadline: None,
        }
    }

    /// Drive the loop until the view asks to quit. `feed_rx` carries events
    /// from both supervisors; `cmd_rx` carries key-driven commands back
    /// from the view.
    pub async fn run(
        mut self,
        mut feed_rx: mpsc::Receiver<FeedEvent>,
        mut cmd_rx: mpsc::UnboundedReceiver<ViewCommand>,
    ) -> Result<()> {
        self.seed_from_store();

        let mut poll = time::interval(Duration::from_secs(self.config.live.poll_interval_secs));
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut feeds_open = true;
        loop {
            // select! evaluates disabled branch expressions, so the deadline
            // needs a value even when no flush is scheduled.
            let deadline = self
                .debounce_deadline
                .unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

            tokio::select! {
                event = feed_rx.recv(), if feeds_open => {
                    match event {
                        Some(event) => self.handle_feed_event(event),
                        None => {
                            // Both supervisors gave up or were aborted; the
                            // poll below keeps the view eventually fresh.
                            feeds_open = false;
                        }
                    }
                }
                _ = time::sleep_until(deadline), if self.debounce_deadline.is_some() => {
                    self.flush();
                }
                _ = poll.tick() => {
                    self.poll().await;
                }
                cmd = cmd_rx.recv() => {
                    match cmd {
                        Some(ViewCommand::Refresh) => {
                            info!("manual refresh requested");
                            self.poll().await;
                        }
                        Some(ViewCommand::Quit) | None => return Ok(()),
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Input handling
    // -----------------------------------------------------------------------

    fn handle_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Message { feed, text } => match serde_json::from_str(&text) {
                Ok(LiveMessage::LeaderboardUpdate { data }) => {
                    self.queue_leaderboard(data.leaderboard);
                }
                Ok(LiveMessage::BoardUpdate { data }) => {
                    self.push_board(&data);
                }
                Ok(LiveMessage::Ignored) => {
                    debug!("ignoring unknown message type on {} feed", feed.label());
                }
                Err(e) => {
                    warn!("dropping malformed {} feed message: {e}", feed.label());
                }
            },
            FeedEvent::Connected { feed } => {
                let _ = self.ui_tx.send(ViewUpdate::Connection { feed, up: true });
            }
            FeedEvent::Disconnected { feed } | FeedEvent::GaveUp { feed } => {
                let _ = self.ui_tx.send(ViewUpdate::Connection { feed, up: false });
            }
        }
    }

    /// Queue a leaderboard for rendering and restart the trailing debounce
    /// window. Only the newest payload survives a burst.
    fn queue_leaderboard(&mut self, entries: Vec<LeaderboardEntry>) {
        self.pending = Some(entries);
        self.debounce_deadline =
            Some(Instant::now() + Duration::from_millis(self.config.live.debounce_ms));
    }

    /// Render the pending leaderboard, persist it, and push the resulting
    /// patches to the view. Avatar warm-ups run fire-and-forget.
    fn flush(&mut self) {
        self.debounce_deadline = None;
        let Some(entries) = self.pending.take() else {
            return;
        };

        let pass = self.reconciler.render(&entries);

        if let Err(e) = self.store.save_leaderboard(&entries) {
            warn!("failed to persist leaderboard snapshot: {e:#}");
        }

        for url in pass.preload {
            let api = Arc::clone(&self.api);
            tokio::spawn(async move { api.warm_image(&url).await });
        }

        for update in pass.updates {
            let _ = self.ui_tx.send(update);
        }
    }

    fn push_board(&mut self, board: &BoardState) {
        let update = self.reconciler.render_board(board);
        let _ = self.ui_tx.send(update);
    }

    // -----------------------------------------------------------------------
    // Cold start and poll fallback
    // -----------------------------------------------------------------------

    /// Render the persisted snapshot, if any survives the TTL, so the view
    /// has data before the first fetch completes.
    fn seed_from_store(&mut self) {
        let ttl = Duration::from_secs(self.config.cache.snapshot_ttl_secs);
        match self.store.load_recent(ttl) {
            Ok(Some(entries)) => {
                info!("seeding view from persisted snapshot ({} entries)", entries.len());
                self.pending = Some(entries);
                self.flush();
            }
            Ok(None) => {}
            Err(e) => warn!("failed to read persisted snapshot: {e:#}"),
        }
    }

    /// One poll round: fetch both resources over REST. Failures are logged
    /// and the current render survives untouched until the next tick.
    async fn poll(&mut self) {
        match self.api.fetch_leaderboard().await {
            Ok(entries) => self.queue_leaderboard(entries),
            Err(e) => warn!("leaderboard poll failed: {e}"),
        }
        match self.api.fetch_board().await {
            Ok(board) => self.push_board(&board),
            Err(e) => warn!("board poll failed: {e}"),
        }
    }
}
