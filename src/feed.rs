// WebSocket feed clients and their reconnect supervision.
//
// Each push feed (leaderboard, board) gets its own supervisor task that
// owns the connection lifecycle: connect, pump messages into the app
// channel, and on loss retry with linear backoff until the attempt budget
// is spent. A stable connection refills the budget, so a feed only gives
// up after consecutive failures. Once given up, the 30-second REST poll is
// the sole source of freshness for that feed.

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Feed identity and events
// ---------------------------------------------------------------------------

/// Which push feed a connection or event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Leaderboard,
    Board,
}

impl FeedKind {
    pub fn path(&self) -> &'static str {
        match self {
            FeedKind::Leaderboard => "/ws/leaderboard",
            FeedKind::Board => "/ws/board",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FeedKind::Leaderboard => "leaderboard",
            FeedKind::Board => "board",
        }
    }
}

/// Events emitted by a feed supervisor to the application layer.
#[derive(Debug, PartialEq)]
pub enum FeedEvent {
    /// The connection completed its handshake.
    Connected { feed: FeedKind },
    /// The connection was lost (server close, error, or handshake failure
    /// after a previous success).
    Disconnected { feed: FeedKind },
    /// A text frame arrived (raw JSON string).
    Message { feed: FeedKind, text: String },
    /// The retry budget is exhausted; no further attempts will be made.
    GaveUp { feed: FeedKind },
}

// ---------------------------------------------------------------------------
// Reconnect policy
// ---------------------------------------------------------------------------

/// Linear-backoff retry budget for one connection.
///
/// `next_delay` burns one attempt and returns `base * attempts`; after
/// `max_attempts` consecutive failures it returns `None`, the terminal
/// state. A successful open resets the counter, so the budget is only
/// ever spent on consecutive failures.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl ReconnectPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        ReconnectPolicy {
            base_delay,
            max_attempts,
            attempts: 0,
        }
    }

    /// Call on a successful connection open.
    pub fn connected(&mut self) {
        self.attempts = 0;
    }

    /// Call on connection loss. `Some(delay)` schedules a retry; `None`
    /// means the budget is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        self.attempts += 1;
        Some(self.base_delay * self.attempts)
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Run one feed connection under the given reconnect policy, forwarding
/// events through `tx`. Returns when the budget is exhausted or the
/// receiver is dropped.
pub async fn supervise(
    url: String,
    feed: FeedKind,
    tx: mpsc::Sender<FeedEvent>,
    mut policy: ReconnectPolicy,
) {
    loop {
        match connect_async(url.as_str()).await {
            Ok((ws, _response)) => {
                info!("{} feed connected to {url}", feed.label());
                policy.connected();
                if tx.send(FeedEvent::Connected { feed }).await.is_err() {
                    return;
                }

                let (_write, read) = ws.split();
                if pump(read, feed, &tx).await.is_err() {
                    return;
                }

                if tx.send(FeedEvent::Disconnected { feed }).await.is_err() {
                    return;
                }
            }
            Err(e) => {
                warn!("{} feed connection to {url} failed: {e}", feed.label());
            }
        }

        match policy.next_delay() {
            Some(delay) => {
                info!(
                    "reconnecting {} feed in {delay:?} (attempt {}/{})",
                    feed.label(),
                    policy.attempts(),
                    policy.max_attempts
                );
                tokio::time::sleep(delay).await;
            }
            None => {
                warn!(
                    "{} feed gave up after {} attempts; relying on the poll fallback",
                    feed.label(),
                    policy.max_attempts
                );
                let _ = tx.send(FeedEvent::GaveUp { feed }).await;
                return;
            }
        }
    }
}

/// Pump raw WebSocket [`Message`] items from any [`Stream`], forwarding
/// text payloads through `tx`. Returns `Err(())` when the receiver is
/// dropped, signalling the supervisor to stop. This is the pure-logic
/// seam the unit tests exercise without opening sockets.
pub async fn pump<St>(
    mut stream: St,
    feed: FeedKind,
    tx: &mpsc::Sender<FeedEvent>,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let event = FeedEvent::Message {
                    feed,
                    text: text.to_string(),
                };
                if tx.send(event).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("{} feed received close frame", feed.label());
                break;
            }
            Err(e) => {
                warn!("{} feed stream error: {e}", feed.label());
                break;
            }
            _ => {
                // Ignore Binary, Ping, Pong, Frame variants.
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handles
// ---------------------------------------------------------------------------

/// Owns the two supervisor tasks so the composition root can release both
/// connections on shutdown. `close` is idempotent.
pub struct FeedHandles {
    handles: Vec<JoinHandle<()>>,
}

impl FeedHandles {
    pub fn new(leaderboard: JoinHandle<()>, board: JoinHandle<()>) -> Self {
        FeedHandles {
            handles: vec![leaderboard, board],
        }
    }

    pub fn close(&mut self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl Drop for FeedHandles {
    fn drop(&mut self) {
        self.close();
    }
}
