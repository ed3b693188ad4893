// Live update reconciliation.
//
// The reconciler turns full leaderboard/board snapshots from the server
// into minimal view patches: a fixed three-slot podium, a granular table
// diff for everything below it, a progress gauge for the session user, and
// the board display. It owns the image cache and the last-rendered model.

pub mod diff;
pub mod model;

use std::collections::HashSet;

use tracing::debug;

use crate::protocol::{BoardState, LeaderboardEntry};

pub use diff::DiffPolicy;
pub use model::{
    apply_patch, PhotoRef, PodiumSlot, Progress, RenderModel, RowUpdate, TablePatch, TableRow,
    ViewCommand, ViewUpdate, PODIUM_SIZE,
};

// ---------------------------------------------------------------------------
// ImageCache
// ---------------------------------------------------------------------------

/// Set of avatar URLs known to have been fetched at least once.
///
/// Monotonic: entries are never evicted. Unbounded growth is an accepted
/// tradeoff for a page-lifetime cache over a small player population.
#[derive(Debug, Default)]
pub struct ImageCache {
    loaded: HashSet<String>,
}

impl ImageCache {
    pub fn is_loaded(&self, url: &str) -> bool {
        self.loaded.contains(url)
    }

    /// Mark a URL loaded. Returns `true` if it was newly added.
    pub fn mark_loaded(&mut self, url: &str) -> bool {
        self.loaded.insert(url.to_string())
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

/// The output of one render pass: view patches to push, plus avatar URLs
/// worth warming up in the background (top-3 photos not yet cached).
#[derive(Debug, Clone, PartialEq)]
pub struct RenderPass {
    pub updates: Vec<ViewUpdate>,
    pub preload: Vec<String>,
}

pub struct Reconciler {
    model: RenderModel,
    cache: ImageCache,
    policy: DiffPolicy,
    /// The session user's username, for the progress gauge. `None` renders
    /// the gauge hidden.
    username: Option<String>,
}

impl Reconciler {
    pub fn new(policy: DiffPolicy, username: Option<String>) -> Self {
        Reconciler {
            model: RenderModel::default(),
            cache: ImageCache::default(),
            policy,
            username,
        }
    }

    /// The last-rendered state. Tests and the app loop read this; nothing
    /// mutates it from outside.
    pub fn model(&self) -> &RenderModel {
        &self.model
    }

    /// Render a full leaderboard snapshot against the current model.
    pub fn render(&mut self, entries: &[LeaderboardEntry]) -> RenderPass {
        if entries.is_empty() {
            debug!("leaderboard empty, rendering placeholder");
            self.model.podium = Default::default();
            self.model.rows.clear();
            self.model.progress = None;
            self.model.placeholder = true;
            return RenderPass {
                updates: vec![ViewUpdate::Placeholder],
                preload: Vec::new(),
            };
        }
        self.model.placeholder = false;

        let split = entries.len().min(PODIUM_SIZE);
        let (top, rest) = entries.split_at(split);

        // Collect preload candidates before the podium assignment marks
        // their URLs loaded.
        let preload: Vec<String> = top
            .iter()
            .filter_map(|e| e.profile_photo.clone())
            .filter(|url| !self.cache.is_loaded(url))
            .collect();

        let mut podium: [PodiumSlot; PODIUM_SIZE] = Default::default();
        for (slot, entry) in podium.iter_mut().zip(top.iter()) {
            *slot = PodiumSlot::Player {
                username: entry.username.clone(),
                real_name: entry.real_name.clone(),
                points: entry.points,
                photo: entry.profile_photo.as_ref().map(|url| {
                    let cached = self.cache.is_loaded(url);
                    self.cache.mark_loaded(url);
                    PhotoRef {
                        url: url.clone(),
                        cached,
                    }
                }),
            };
        }
        self.model.podium = podium.clone();

        let progress = self.compute_progress(entries);
        self.model.progress = progress.clone();

        let patch = diff::diff_rest(&self.model.rows, rest, &self.policy, &mut self.cache);
        apply_patch(&mut self.model.rows, &patch);

        RenderPass {
            updates: vec![
                ViewUpdate::Podium(podium),
                ViewUpdate::Progress(progress),
                ViewUpdate::Table(patch),
            ],
            preload,
        }
    }

    /// Render a board snapshot. Always a full replacement; the history is
    /// small and append-only.
    pub fn render_board(&mut self, state: &BoardState) -> ViewUpdate {
        self.model.board = state.clone();
        ViewUpdate::Board(state.clone())
    }

    /// Linear scan for the session user; rank is the 1-based position in
    /// the full list. The gauge floor of 5% keeps the bar visible even in
    /// last place.
    fn compute_progress(&self, entries: &[LeaderboardEntry]) -> Option<Progress> {
        let me = self.username.as_deref()?;
        let idx = entries.iter().position(|e| e.username == me)?;
        let rank = idx + 1;
        let total = entries.len();
        let percent = ((total - rank + 1) as f64 / total as f64 * 100.0).max(5.0);
        Some(Progress {
            rank,
            total,
            percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(username: &str, rank: u32, points: u32) -> LeaderboardEntry {
        LeaderboardEntry {
            username: username.into(),
            real_name: username.to_uppercase(),
            profile_photo: Some(format!("/static/avatars/{username}.png")),
            points,
            rank,
        }
    }

    fn board(n: usize) -> Vec<LeaderboardEntry> {
        (1..=n)
            .map(|i| entry(&format!("player{i}"), i as u32, (100 - i) as u32))
            .collect()
    }

    fn reconciler_for(username: &str) -> Reconciler {
        Reconciler::new(DiffPolicy::default(), Some(username.to_string()))
    }

    fn filled_slots(podium: &[PodiumSlot; PODIUM_SIZE]) -> usize {
        podium
            .iter()
            .filter(|s| matches!(s, PodiumSlot::Player { .. }))
            .count()
    }

    // -- podium -------------------------------------------------------------

    #[test]
    fn short_lists_fill_exactly_that_many_slots() {
        for n in 0..=3 {
            let mut rec = reconciler_for("nobody");
            let pass = rec.render(&board(n));
            if n == 0 {
                assert_eq!(pass.updates, vec![ViewUpdate::Placeholder]);
                continue;
            }
            let podium = match &pass.updates[0] {
                ViewUpdate::Podium(p) => p,
                other => panic!("expected Podium first, got {other:?}"),
            };
            assert_eq!(filled_slots(podium), n, "n = {n}");
            assert_eq!(rec.model().rows.len(), 0);
        }
    }

    #[test]
    fn fourth_player_and_below_go_to_the_table() {
        let mut rec = reconciler_for("nobody");
        rec.render(&board(6));
        assert_eq!(filled_slots(&rec.model().podium), 3);
        assert_eq!(rec.model().rows.len(), 3);
        assert_eq!(rec.model().rows[0].username, "player4");
    }

    // -- empty state ----------------------------------------------------------

    #[test]
    fn empty_leaderboard_is_a_placeholder_terminal_state() {
        let mut rec = reconciler_for("player1");
        rec.render(&board(5));
        assert!(rec.model().progress.is_some());

        let pass = rec.render(&[]);
        assert_eq!(pass.updates, vec![ViewUpdate::Placeholder]);
        assert!(pass.preload.is_empty());
        assert!(rec.model().placeholder);
        assert_eq!(filled_slots(&rec.model().podium), 0);
        assert!(rec.model().rows.is_empty());
        assert_eq!(rec.model().progress, None);
    }

    // -- progress -------------------------------------------------------------

    #[test]
    fn progress_uses_list_position_not_reported_rank() {
        let mut rec = reconciler_for("player5");
        rec.render(&board(10));
        let progress = rec.model().progress.clone().unwrap();
        assert_eq!(progress.rank, 5);
        assert_eq!(progress.total, 10);
        // (10 - 5 + 1) / 10 * 100 = 60
        assert!((progress.percent - 60.0).abs() < f64::EPSILON);
    }

    #[test]
    fn progress_percent_is_floored_at_five() {
        let mut rec = reconciler_for("player25");
        rec.render(&board(25));
        let progress = rec.model().progress.clone().unwrap();
        assert_eq!(progress.rank, 25);
        assert!((progress.percent - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn leader_gets_full_bar() {
        let mut rec = reconciler_for("player1");
        rec.render(&board(4));
        let progress = rec.model().progress.clone().unwrap();
        assert!((progress.percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn unknown_user_hides_progress() {
        let mut rec = reconciler_for("spectator");
        let pass = rec.render(&board(5));
        assert!(pass.updates.contains(&ViewUpdate::Progress(None)));
        assert_eq!(rec.model().progress, None);
    }

    #[test]
    fn no_session_user_hides_progress() {
        let mut rec = Reconciler::new(DiffPolicy::default(), None);
        rec.render(&board(5));
        assert_eq!(rec.model().progress, None);
    }

    // -- preload and image cache ----------------------------------------------

    #[test]
    fn top_three_photos_are_preloaded_once() {
        let mut rec = reconciler_for("player1");
        let pass = rec.render(&board(5));
        assert_eq!(
            pass.preload,
            vec![
                "/static/avatars/player1.png".to_string(),
                "/static/avatars/player2.png".to_string(),
                "/static/avatars/player3.png".to_string(),
            ]
        );

        // Same snapshot again: everything is cached now.
        let pass = rec.render(&board(5));
        assert!(pass.preload.is_empty());
        match &pass.updates[0] {
            ViewUpdate::Podium(podium) => {
                for slot in podium {
                    let PodiumSlot::Player { photo, .. } = slot else {
                        panic!("expected filled slot");
                    };
                    assert!(photo.as_ref().unwrap().cached);
                }
            }
            other => panic!("expected Podium, got {other:?}"),
        }
    }

    #[test]
    fn entries_without_photos_are_skipped() {
        let mut rec = reconciler_for("a");
        let mut entries = board(2);
        entries[0].profile_photo = None;
        let pass = rec.render(&entries);
        assert_eq!(pass.preload, vec!["/static/avatars/player2.png".to_string()]);
    }

    // -- board ------------------------------------------------------------------

    #[test]
    fn board_update_replaces_board_state() {
        let mut rec = reconciler_for("a");
        let state = BoardState {
            current_number: Some(7),
            drawn_numbers: vec![3, 7],
        };
        let update = rec.render_board(&state);
        assert_eq!(update, ViewUpdate::Board(state.clone()));
        assert_eq!(rec.model().board, state);
    }

    #[test]
    fn cleared_board_round_trips() {
        let mut rec = reconciler_for("a");
        rec.render_board(&BoardState {
            current_number: Some(7),
            drawn_numbers: vec![3, 7],
        });
        let update = rec.render_board(&BoardState::default());
        assert_eq!(update, ViewUpdate::Board(BoardState::default()));
        assert_eq!(rec.model().board.current_number, None);
    }

    // -- table reconciliation through render -------------------------------------

    #[test]
    fn table_patch_keeps_row_set_consistent() {
        let mut rec = reconciler_for("player1");
        rec.render(&board(6));

        // player6 drops out, newcomer joins below the podium.
        let mut entries = board(5);
        entries.push(entry("newcomer", 6, 1));
        rec.render(&entries);

        let names: Vec<&str> = rec
            .model()
            .rows
            .iter()
            .map(|r| r.username.as_str())
            .collect();
        assert_eq!(names, vec!["player4", "player5", "newcomer"]);
    }
}
