// Terminal view: layout, input handling, and widget rendering.
//
// The view owns a `ViewState` that mirrors what the reconciler has decided
// to display. The app loop pushes `ViewUpdate` messages over an mpsc
// channel; the view applies them to `ViewState` and re-renders at ~30 fps.
// It never fetches or diffs anything itself.

use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyCode, KeyModifiers};
use futures_util::StreamExt;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Cell, Gauge, Paragraph, Row, Table};
use ratatui::Frame;
use tokio::sync::mpsc;

use crate::feed::FeedKind;
use crate::protocol::BoardState;
use crate::reconcile::model::{
    apply_patch, PodiumSlot, Progress, TableRow, ViewCommand, ViewUpdate, PODIUM_SIZE,
};

// ---------------------------------------------------------------------------
// ViewState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Leaderboard,
    Board,
}

/// View-local mirror of the render model, updated only through
/// `ViewUpdate` messages.
pub struct ViewState {
    pub podium: [PodiumSlot; PODIUM_SIZE],
    pub rows: Vec<TableRow>,
    pub progress: Option<Progress>,
    pub board: BoardState,
    /// True when the leaderboard is empty and the table shows the
    /// "No players yet" placeholder.
    pub placeholder: bool,
    pub leaderboard_up: bool,
    pub board_up: bool,
    pub active_tab: Tab,
}

impl Default for ViewState {
    fn default() -> Self {
        ViewState {
            podium: Default::default(),
            rows: Vec::new(),
            progress: None,
            board: BoardState::default(),
            placeholder: true,
            leaderboard_up: false,
            board_up: false,
            active_tab: Tab::Leaderboard,
        }
    }
}

/// Apply a single ViewUpdate to the ViewState.
fn apply_view_update(state: &mut ViewState, update: ViewUpdate) {
    match update {
        ViewUpdate::Placeholder => {
            state.podium = Default::default();
            state.rows.clear();
            state.progress = None;
            state.placeholder = true;
        }
        ViewUpdate::Podium(podium) => {
            state.podium = podium;
            state.placeholder = false;
        }
        ViewUpdate::Table(patch) => {
            apply_patch(&mut state.rows, &patch);
            // Patches append at the end; display order is by rank.
            state.rows.sort_by_key(|r| r.rank);
        }
        ViewUpdate::Progress(progress) => {
            state.progress = progress;
        }
        ViewUpdate::Board(board) => {
            state.board = board;
        }
        ViewUpdate::Connection { feed, up } => match feed {
            FeedKind::Leaderboard => state.leaderboard_up = up,
            FeedKind::Board => state.board_up = up,
        },
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render_frame(frame: &mut Frame, state: &ViewState) {
    let zones = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),  // status bar
            Constraint::Length(6),  // podium cards
            Constraint::Min(5),     // main panel
            Constraint::Length(3),  // progress gauge
            Constraint::Length(1),  // help bar
        ])
        .split(frame.area());

    render_status_bar(frame, zones[0], state);
    render_podium(frame, zones[1], state);
    match state.active_tab {
        Tab::Leaderboard => render_table(frame, zones[2], state),
        Tab::Board => render_board(frame, zones[2], state),
    }
    render_progress(frame, zones[3], state);
    render_help_bar(frame, zones[4]);
}

fn feed_status(label: &str, up: bool) -> Span<'static> {
    let (text, color) = if up {
        (format!("{label}: live"), Color::Green)
    } else {
        (format!("{label}: polling"), Color::Yellow)
    };
    Span::styled(text, Style::default().fg(color))
}

fn render_status_bar(frame: &mut Frame, area: Rect, state: &ViewState) {
    let line = Line::from(vec![
        Span::raw(" housie companion | "),
        feed_status("leaderboard", state.leaderboard_up),
        Span::raw(" | "),
        feed_status("board", state.board_up),
    ]);
    let paragraph = Paragraph::new(line).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

fn render_podium(frame: &mut Frame, area: Rect, state: &ViewState) {
    let slots = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
            Constraint::Ratio(1, 3),
        ])
        .split(area);

    const MEDALS: [&str; PODIUM_SIZE] = ["1st", "2nd", "3rd"];
    for (i, slot) in state.podium.iter().enumerate() {
        let content = match slot {
            PodiumSlot::Player {
                real_name, points, ..
            } => format!("{real_name}\n{points} pts"),
            PodiumSlot::Empty => "No Player\n0 pts".to_string(),
        };
        let style = match slot {
            PodiumSlot::Player { .. } => Style::default().add_modifier(Modifier::BOLD),
            PodiumSlot::Empty => Style::default().fg(Color::DarkGray),
        };
        let card = Paragraph::new(content)
            .style(style)
            .centered()
            .block(Block::default().borders(Borders::ALL).title(MEDALS[i]));
        frame.render_widget(card, slots[i]);
    }
}

fn render_table(frame: &mut Frame, area: Rect, state: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("Leaderboard");

    if state.placeholder {
        let paragraph = Paragraph::new("No players yet")
            .style(Style::default().fg(Color::DarkGray))
            .centered()
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let rows: Vec<Row> = state
        .rows
        .iter()
        .map(|r| {
            Row::new(vec![
                Cell::from(r.rank.to_string()),
                Cell::from(r.real_name.clone()),
                Cell::from(r.username.clone()),
                Cell::from(r.points.to_string()),
            ])
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Min(16),
            Constraint::Min(12),
            Constraint::Length(8),
        ],
    )
    .header(
        Row::new(vec!["Rank", "Name", "Username", "Points"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(block);
    frame.render_widget(table, area);
}

fn render_board(frame: &mut Frame, area: Rect, state: &ViewState) {
    let current = state
        .board
        .current_number
        .map(|n| n.to_string())
        .unwrap_or_else(|| "--".to_string());
    let history = if state.board.drawn_numbers.is_empty() {
        "no numbers drawn yet".to_string()
    } else {
        state
            .board
            .drawn_numbers
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    };
    let content = format!(
        "Current number: {current}\n\nDrawn so far ({}):\n{history}",
        state.board.drawn_numbers.len()
    );

    let paragraph = Paragraph::new(content)
        .block(Block::default().borders(Borders::ALL).title("Board"));
    frame.render_widget(paragraph, area);
}

fn render_progress(frame: &mut Frame, area: Rect, state: &ViewState) {
    let block = Block::default().borders(Borders::ALL).title("Your standing");
    match &state.progress {
        Some(progress) => {
            let gauge = Gauge::default()
                .block(block)
                .gauge_style(Style::default().fg(Color::Cyan))
                .ratio((progress.percent / 100.0).clamp(0.0, 1.0))
                .label(format!("#{} of {}", progress.rank, progress.total));
            frame.render_widget(gauge, area);
        }
        None => {
            let paragraph = Paragraph::new("not on the leaderboard")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(paragraph, area);
        }
    }
}

fn render_help_bar(frame: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(Line::from(Span::styled(
        " q:Quit | Tab:Leaderboard/Board | r:Refresh",
        Style::default().fg(Color::White).add_modifier(Modifier::DIM),
    )))
    .style(Style::default().bg(Color::DarkGray));
    frame.render_widget(paragraph, area);
}

// ---------------------------------------------------------------------------
// Main view loop
// ---------------------------------------------------------------------------

/// Run the view event loop.
///
/// Initializes the terminal, installs a panic hook that restores it on
/// crash, then selects over reconciler updates, keyboard input, and a
/// ~30 fps render tick. Returns after `q`/Ctrl+C or when the update
/// channel closes.
pub async fn run(
    mut ui_rx: mpsc::UnboundedReceiver<ViewUpdate>,
    cmd_tx: mpsc::UnboundedSender<ViewCommand>,
) -> anyhow::Result<()> {
    let mut terminal = ratatui::init();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = ratatui::restore();
        original_hook(panic_info);
    }));

    let mut view_state = ViewState::default();
    let mut event_stream = EventStream::new();

    let mut render_tick = tokio::time::interval(Duration::from_millis(33));
    render_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            update = ui_rx.recv() => {
                match update {
                    Some(update) => apply_view_update(&mut view_state, update),
                    None => break,
                }
            }

            maybe_event = event_stream.next() => {
                match maybe_event {
                    Some(Ok(Event::Key(key))) => {
                        let ctrl_c = key.code == KeyCode::Char('c')
                            && key.modifiers.contains(KeyModifiers::CONTROL);
                        if ctrl_c || key.code == KeyCode::Char('q') {
                            let _ = cmd_tx.send(ViewCommand::Quit);
                            break;
                        }
                        match key.code {
                            KeyCode::Tab => {
                                view_state.active_tab = match view_state.active_tab {
                                    Tab::Leaderboard => Tab::Board,
                                    Tab::Board => Tab::Leaderboard,
                                };
                            }
                            KeyCode::Char('r') => {
                                let _ = cmd_tx.send(ViewCommand::Refresh);
                            }
                            _ => {}
                        }
                    }
                    Some(Ok(_)) => {
                        // Mouse and resize events need no handling; the next
                        // render tick redraws at the new size.
                    }
                    Some(Err(_)) | None => break,
                }
            }

            _ = render_tick.tick() => {
                terminal.draw(|frame| render_frame(frame, &view_state))?;
            }
        }
    }

    ratatui::restore();
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
