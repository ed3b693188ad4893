// Table diffing: decide between a full rebuild and granular row edits.
//
// Row identity is the username. The rebuild heuristic fires on a large
// count swing or on several previously unseen players arriving at once;
// anything smaller is patched row by row to keep view churn minimal.

use std::collections::HashSet;

use super::ImageCache;
use crate::config::DiffSection;
use crate::protocol::LeaderboardEntry;
use crate::reconcile::model::{PhotoRef, RowUpdate, TablePatch, TableRow};

/// Rebuild-vs-patch thresholds, taken from the `[diff]` config table.
#[derive(Debug, Clone)]
pub struct DiffPolicy {
    pub rebuild_count_delta: usize,
    pub rebuild_new_entries: usize,
}

impl Default for DiffPolicy {
    fn default() -> Self {
        DiffPolicy {
            rebuild_count_delta: 2,
            rebuild_new_entries: 1,
        }
    }
}

impl From<&DiffSection> for DiffPolicy {
    fn from(section: &DiffSection) -> Self {
        DiffPolicy {
            rebuild_count_delta: section.rebuild_count_delta,
            rebuild_new_entries: section.rebuild_new_entries,
        }
    }
}

/// True when the incoming row set differs structurally enough from the
/// rendered one that patching isn't worth it: the row count moved by more
/// than `rebuild_count_delta`, or more than `rebuild_new_entries`
/// identities are new since the last render.
pub fn needs_rebuild(old: &[TableRow], new: &[LeaderboardEntry], policy: &DiffPolicy) -> bool {
    if new.len().abs_diff(old.len()) > policy.rebuild_count_delta {
        return true;
    }

    let known: HashSet<&str> = old.iter().map(|r| r.username.as_str()).collect();
    let unseen = new
        .iter()
        .filter(|e| !known.contains(e.username.as_str()))
        .count();
    unseen > policy.rebuild_new_entries
}

/// Compute the patch that takes `old` to the rows for `new`.
///
/// The rebuild path re-applies a cache-aware photo assignment to every row;
/// the edit path only assigns photos on appended rows, leaving matched
/// rows' photo cells untouched.
pub fn diff_rest(
    old: &[TableRow],
    new: &[LeaderboardEntry],
    policy: &DiffPolicy,
    cache: &mut ImageCache,
) -> TablePatch {
    if needs_rebuild(old, new, policy) {
        return TablePatch::Rebuild(new.iter().map(|e| row_from_entry(e, cache)).collect());
    }

    let known: HashSet<&str> = old.iter().map(|r| r.username.as_str()).collect();
    let mut updates = Vec::new();
    let mut appended = Vec::new();
    for entry in new {
        if known.contains(entry.username.as_str()) {
            updates.push(RowUpdate {
                username: entry.username.clone(),
                rank: entry.rank,
                points: entry.points,
            });
        } else {
            appended.push(row_from_entry(entry, cache));
        }
    }

    let current: HashSet<&str> = new.iter().map(|e| e.username.as_str()).collect();
    let removed = old
        .iter()
        .filter(|r| !current.contains(r.username.as_str()))
        .map(|r| r.username.clone())
        .collect();

    TablePatch::Edit {
        updates,
        appended,
        removed,
    }
}

/// Build a row with a cache-aware photo assignment: the `cached` flag tells
/// the view whether it can skip refetching, and the URL is marked loaded
/// best-effort (without waiting for the actual fetch).
pub(super) fn row_from_entry(entry: &LeaderboardEntry, cache: &mut ImageCache) -> TableRow {
    TableRow {
        username: entry.username.clone(),
        real_name: entry.real_name.clone(),
        rank: entry.rank,
        points: entry.points,
        photo: entry.profile_photo.as_ref().map(|url| PhotoRef {
            cached: cache.is_loaded(url),
            url: {
                cache.mark_loaded(url);
                url.clone()
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::model::apply_patch;

    fn entry(username: &str, rank: u32, points: u32) -> LeaderboardEntry {
        LeaderboardEntry {
            username: username.into(),
            real_name: username.to_uppercase(),
            profile_photo: Some(format!("/static/avatars/{username}.png")),
            points,
            rank,
        }
    }

    fn rendered(entries: &[LeaderboardEntry]) -> Vec<TableRow> {
        let mut cache = ImageCache::default();
        entries
            .iter()
            .map(|e| row_from_entry(e, &mut cache))
            .collect()
    }

    fn identity_set(rows: &[TableRow]) -> Vec<&str> {
        let mut names: Vec<&str> = rows.iter().map(|r| r.username.as_str()).collect();
        names.sort_unstable();
        names
    }

    // -- needs_rebuild ------------------------------------------------------

    #[test]
    fn count_delta_above_threshold_rebuilds() {
        let policy = DiffPolicy::default();
        let old = rendered(&[entry("a", 4, 10), entry("b", 5, 9)]);
        let new: Vec<_> = ["a", "b", "c", "d", "e"]
            .iter()
            .enumerate()
            .map(|(i, name)| entry(name, (i + 4) as u32, 10))
            .collect();
        // |5 - 2| = 3 > 2
        assert!(needs_rebuild(&old, &new, &policy));
    }

    #[test]
    fn count_delta_at_threshold_does_not_rebuild() {
        let policy = DiffPolicy::default();
        let old = rendered(&[entry("a", 4, 10), entry("b", 5, 9), entry("c", 6, 8)]);
        // Shrink by exactly 2: no rebuild, rows get removed instead.
        let new = vec![entry("a", 4, 10)];
        assert!(!needs_rebuild(&old, &new, &policy));
    }

    #[test]
    fn more_than_one_new_identity_rebuilds() {
        let policy = DiffPolicy::default();
        let old = rendered(&[entry("a", 4, 10), entry("b", 5, 9)]);
        let new = vec![entry("a", 4, 10), entry("x", 5, 9), entry("y", 6, 8)];
        assert!(needs_rebuild(&old, &new, &policy));
    }

    #[test]
    fn one_new_identity_with_small_delta_patches() {
        let policy = DiffPolicy::default();
        let old = rendered(&[entry("a", 4, 10), entry("b", 5, 9)]);
        let new = vec![entry("a", 4, 12), entry("b", 5, 9), entry("c", 6, 1)];
        assert!(!needs_rebuild(&old, &new, &policy));

        let mut cache = ImageCache::default();
        let patch = diff_rest(&old, &new, &policy, &mut cache);
        match &patch {
            TablePatch::Edit {
                updates,
                appended,
                removed,
            } => {
                assert_eq!(updates.len(), 2);
                assert_eq!(appended.len(), 1);
                assert_eq!(appended[0].username, "c");
                assert!(removed.is_empty());
            }
            other => panic!("expected Edit, got {other:?}"),
        }
    }

    #[test]
    fn thresholds_are_configurable() {
        let lax = DiffPolicy {
            rebuild_count_delta: 10,
            rebuild_new_entries: 10,
        };
        let old = rendered(&[entry("a", 4, 10)]);
        let new: Vec<_> = ["p", "q", "r", "s", "t"]
            .iter()
            .enumerate()
            .map(|(i, name)| entry(name, (i + 4) as u32, 5))
            .collect();
        assert!(!needs_rebuild(&old, &new, &lax));
        assert!(needs_rebuild(&old, &new, &DiffPolicy::default()));
    }

    // -- diff_rest ----------------------------------------------------------

    #[test]
    fn patched_rows_match_new_identity_set() {
        let policy = DiffPolicy::default();
        let old_entries = [entry("a", 4, 10), entry("b", 5, 9), entry("c", 6, 8)];
        let mut rows = rendered(&old_entries);

        // b departed, d arrived, a's points moved.
        let new = vec![entry("a", 4, 20), entry("c", 5, 8), entry("d", 6, 2)];
        let mut cache = ImageCache::default();
        let patch = diff_rest(&rows, &new, &policy, &mut cache);
        apply_patch(&mut rows, &patch);

        assert_eq!(rows.len(), new.len());
        assert_eq!(identity_set(&rows), vec!["a", "c", "d"]);
        let a = rows.iter().find(|r| r.username == "a").unwrap();
        assert_eq!(a.points, 20);
    }

    #[test]
    fn rebuilt_rows_match_new_identity_set() {
        let policy = DiffPolicy::default();
        let mut rows = rendered(&[entry("a", 4, 10)]);

        let new: Vec<_> = ["p", "q", "r", "s"]
            .iter()
            .enumerate()
            .map(|(i, name)| entry(name, (i + 4) as u32, 5))
            .collect();
        let mut cache = ImageCache::default();
        let patch = diff_rest(&rows, &new, &policy, &mut cache);
        assert!(matches!(patch, TablePatch::Rebuild(_)));
        apply_patch(&mut rows, &patch);

        assert_eq!(identity_set(&rows), vec!["p", "q", "r", "s"]);
    }

    #[test]
    fn shrink_to_empty_within_threshold_removes_rows() {
        let policy = DiffPolicy::default();
        let mut rows = rendered(&[entry("a", 4, 10), entry("b", 5, 9)]);

        let mut cache = ImageCache::default();
        let patch = diff_rest(&rows, &[], &policy, &mut cache);
        match &patch {
            TablePatch::Edit { removed, .. } => assert_eq!(removed.len(), 2),
            other => panic!("expected Edit, got {other:?}"),
        }
        apply_patch(&mut rows, &patch);
        assert!(rows.is_empty());
    }

    // -- photo cache interaction ---------------------------------------------

    #[test]
    fn rebuild_marks_every_photo_loaded() {
        let policy = DiffPolicy::default();
        let new: Vec<_> = ["p", "q", "r", "s"]
            .iter()
            .enumerate()
            .map(|(i, name)| entry(name, (i + 4) as u32, 5))
            .collect();

        let mut cache = ImageCache::default();
        let patch = diff_rest(&[], &new, &policy, &mut cache);
        let TablePatch::Rebuild(rows) = patch else {
            panic!("expected Rebuild");
        };
        // First render: nothing was cached, all now marked.
        assert!(rows.iter().all(|r| !r.photo.as_ref().unwrap().cached));
        assert_eq!(cache.len(), 4);

        // Second rebuild over the same URLs reports them cached.
        let patch = diff_rest(&rows, &new, &policy, &mut cache);
        let TablePatch::Edit { updates, .. } = patch else {
            panic!("expected Edit on identical set");
        };
        assert_eq!(updates.len(), 4);
    }

    #[test]
    fn edit_path_assigns_photos_only_on_appends() {
        let policy = DiffPolicy::default();
        let old = rendered(&[entry("a", 4, 10)]);
        let new = vec![entry("a", 4, 11), entry("b", 5, 3)];

        let mut cache = ImageCache::default();
        let patch = diff_rest(&old, &new, &policy, &mut cache);
        let TablePatch::Edit { appended, .. } = patch else {
            panic!("expected Edit");
        };
        // Only b's photo was touched; a's URL never entered this cache.
        assert!(cache.is_loaded("/static/avatars/b.png"));
        assert!(!cache.is_loaded("/static/avatars/a.png"));
        assert_eq!(appended[0].photo.as_ref().unwrap().cached, false);
    }
}
