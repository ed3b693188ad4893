// The render model: an explicit snapshot of what is currently displayed.
//
// The reconciler owns this struct and diffs every incoming leaderboard
// against it, instead of reading rendered state back out of the view. The
// view keeps its own mirror, updated only through the ViewUpdate channel.

use crate::feed::FeedKind;
use crate::protocol::BoardState;

/// Number of fixed podium card slots. Always rendered, filled or not.
pub const PODIUM_SIZE: usize = 3;

/// An avatar URL plus whether the image cache already holds it. The view
/// skips refetching cached URLs.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRef {
    pub url: String,
    pub cached: bool,
}

/// One of the three fixed podium card slots.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PodiumSlot {
    /// Placeholder card: "No Player", 0 points.
    #[default]
    Empty,
    Player {
        username: String,
        real_name: String,
        points: u32,
        photo: Option<PhotoRef>,
    },
}

/// One rendered table row (leaderboard positions 4 and below).
#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub username: String,
    pub real_name: String,
    pub rank: u32,
    pub points: u32,
    pub photo: Option<PhotoRef>,
}

/// The session user's standing within the full leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    /// 1-based position in the full entry list.
    pub rank: usize,
    pub total: usize,
    /// Fill percentage for the progress gauge, floored at 5 so the bar
    /// never collapses to invisible for the last-placed player.
    pub percent: f64,
}

/// Everything the reconciler knows it has rendered.
#[derive(Debug, Clone, Default)]
pub struct RenderModel {
    pub podium: [PodiumSlot; PODIUM_SIZE],
    pub rows: Vec<TableRow>,
    pub progress: Option<Progress>,
    pub board: BoardState,
    /// True when the last leaderboard update was empty and the table shows
    /// the "No players yet" placeholder.
    pub placeholder: bool,
}

/// An in-place edit to an existing row: rank and points text only. The
/// photo cell is untouched on this path.
#[derive(Debug, Clone, PartialEq)]
pub struct RowUpdate {
    pub username: String,
    pub rank: u32,
    pub points: u32,
}

/// How the table gets from its previous state to the new one.
#[derive(Debug, Clone, PartialEq)]
pub enum TablePatch {
    /// Throw the table away and render these rows. Every row carries a
    /// fresh cache-aware photo assignment.
    Rebuild(Vec<TableRow>),
    /// Granular edits keyed by username.
    Edit {
        updates: Vec<RowUpdate>,
        appended: Vec<TableRow>,
        removed: Vec<String>,
    },
}

/// Apply a patch to a row list, keeping it consistent with what the patch
/// producer computed. Used by both the reconciler (its own model) and the
/// view (its mirror).
pub fn apply_patch(rows: &mut Vec<TableRow>, patch: &TablePatch) {
    match patch {
        TablePatch::Rebuild(new_rows) => {
            *rows = new_rows.clone();
        }
        TablePatch::Edit {
            updates,
            appended,
            removed,
        } => {
            for update in updates {
                if let Some(row) = rows.iter_mut().find(|r| r.username == update.username) {
                    row.rank = update.rank;
                    row.points = update.points;
                }
            }
            rows.extend(appended.iter().cloned());
            rows.retain(|r| !removed.contains(&r.username));
        }
    }
}

/// State changes pushed from the reconciler to the view.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewUpdate {
    /// Leaderboard went empty: placeholder row, blank podium, hidden
    /// progress.
    Placeholder,
    Podium([PodiumSlot; PODIUM_SIZE]),
    Table(TablePatch),
    Progress(Option<Progress>),
    Board(BoardState),
    Connection { feed: FeedKind, up: bool },
}

/// Commands flowing back from the view to the app loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewCommand {
    /// Force an immediate REST refresh of both feeds.
    Refresh,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(username: &str, rank: u32, points: u32) -> TableRow {
        TableRow {
            username: username.into(),
            real_name: username.to_uppercase(),
            rank,
            points,
            photo: None,
        }
    }

    #[test]
    fn rebuild_replaces_all_rows() {
        let mut rows = vec![row("a", 4, 10)];
        apply_patch(
            &mut rows,
            &TablePatch::Rebuild(vec![row("b", 4, 20), row("c", 5, 15)]),
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].username, "b");
    }

    #[test]
    fn edit_updates_appends_and_removes() {
        let mut rows = vec![row("a", 4, 10), row("b", 5, 8)];
        apply_patch(
            &mut rows,
            &TablePatch::Edit {
                updates: vec![RowUpdate {
                    username: "a".into(),
                    rank: 5,
                    points: 12,
                }],
                appended: vec![row("c", 6, 5)],
                removed: vec!["b".into()],
            },
        );
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].username, "a");
        assert_eq!(rows[0].rank, 5);
        assert_eq!(rows[0].points, 12);
        assert_eq!(rows[1].username, "c");
    }

    #[test]
    fn edit_for_unknown_username_is_a_no_op() {
        let mut rows = vec![row("a", 4, 10)];
        apply_patch(
            &mut rows,
            &TablePatch::Edit {
                updates: vec![RowUpdate {
                    username: "ghost".into(),
                    rank: 9,
                    points: 0,
                }],
                appended: vec![],
                removed: vec![],
            },
        );
        assert_eq!(rows, vec![row("a", 4, 10)]);
    }
}
