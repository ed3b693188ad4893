// Housie companion entry point.
//
// Startup sequence:
// 1. Initialize tracing (log to file, not terminal)
// 2. Load config and parse the session cookie
// 3. Open the snapshot store
// 4. Create mpsc channels
// 5. Spawn the two feed supervisors
// 6. Spawn the app loop
// 7. Run the view (blocking until the user quits)
// 8. Cleanup on exit

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tokio::sync::mpsc;
use tracing::{error, info};

use housie_companion::api::ApiClient;
use housie_companion::app;
use housie_companion::config;
use housie_companion::feed::{self, FeedHandles, FeedKind, ReconnectPolicy};
use housie_companion::reconcile::ViewCommand;
use housie_companion::session::Session;
use housie_companion::store::SnapshotStore;
use housie_companion::view;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Initialize tracing (log to file, not terminal)
    init_tracing()?;
    info!("Housie companion starting up");

    // 2. Load config and parse the session cookie
    let config = config::load_config().context("failed to load configuration")?;
    info!("Config loaded: server={}", config.server.base_url);

    let session = Session::from_cookie_header(&config.session.cookie);
    let Some(user) = session.current_user() else {
        bail!(
            "session cookie is not authenticated; set [session] cookie in \
             config/companion.toml to your browser's username/user_role/session_token cookies"
        );
    };
    info!("Session user: {} (role: {})", user.username, user.role);

    // 3. Open the snapshot store
    let store = Arc::new(
        SnapshotStore::open(&config.cache.db_path).context("failed to open snapshot store")?,
    );
    info!("Snapshot store opened at {}", config.cache.db_path);

    let api = Arc::new(ApiClient::new(
        &config.server.base_url,
        session.cookie_header(),
    ));

    // 4. Create mpsc channels
    let (feed_tx, feed_rx) = mpsc::channel(256);
    let (ui_tx, ui_rx) = mpsc::unbounded_channel();
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<ViewCommand>();

    // 5. Spawn the two feed supervisors
    let policy = ReconnectPolicy::new(
        Duration::from_millis(config.reconnect.base_delay_ms),
        config.reconnect.max_attempts,
    );
    let leaderboard_handle = tokio::spawn(feed::supervise(
        config.ws_url(FeedKind::Leaderboard.path()),
        FeedKind::Leaderboard,
        feed_tx.clone(),
        policy.clone(),
    ));
    let board_handle = tokio::spawn(feed::supervise(
        config.ws_url(FeedKind::Board.path()),
        FeedKind::Board,
        feed_tx,
        policy,
    ));
    let mut feeds = FeedHandles::new(leaderboard_handle, board_handle);

    // 6. Spawn the app loop
    let app = app::App::new(
        config,
        Some(user.username.clone()),
        api,
        store,
        ui_tx,
    );
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app.run(feed_rx, cmd_rx).await {
            error!("Application loop error: {}", e);
        }
    });

    // 7. Run the view event loop (blocking until the user quits)
    info!("Application ready");
    if let Err(e) = view::run(ui_rx, cmd_tx).await {
        error!("View error: {}", e);
    }

    // 8. Cleanup: release the feed connections, wait briefly for the app loop
    feeds.close();
    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        let _ = app_handle.await;
    })
    .await;

    info!("Housie companion shut down cleanly");
    Ok(())
}

/// Initialize tracing to log to a file (not the terminal, which is used by
/// the view).
fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let log_dir = std::env::current_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;

    let log_file = std::fs::File::create(log_dir.join("housie-companion.log"))?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("housie_companion=info,warn")),
        )
        .with_writer(log_file)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}
