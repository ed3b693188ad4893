// Wire types for the event server's REST API and WebSocket push feeds.
//
// Every boundary payload gets an explicit serde schema; nothing in the app
// touches raw `serde_json::Value`. Unknown JSON fields are ignored so the
// server can grow its responses without breaking the companion.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Core game state
// ---------------------------------------------------------------------------

/// One leaderboard row as the server reports it.
///
/// Entries arrive pre-sorted by `rank` (dense, 1-based, descending points),
/// so `rank` is consistent with array position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Stable unique identity. All diffing keys on this, never on the
    /// display name (two players can share a real name).
    pub username: String,
    /// Display name.
    pub real_name: String,
    /// Avatar URL. May be absent for freshly created accounts.
    #[serde(default)]
    pub profile_photo: Option<String>,
    pub points: u32,
    pub rank: u32,
}

/// Current housie board state: the last drawn number plus the full history.
///
/// `drawn_numbers` is append-only from the server's perspective; a shrink
/// only happens after an admin clears the board.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BoardState {
    #[serde(default)]
    pub current_number: Option<u32>,
    #[serde(default)]
    pub drawn_numbers: Vec<u32>,
}

// ---------------------------------------------------------------------------
// WebSocket envelopes
// ---------------------------------------------------------------------------

/// Payload of a `leaderboard_update` push.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardPayload {
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// A message from either push feed, discriminated by its `type` field.
///
/// The server may emit message types this client doesn't know about;
/// those deserialize into [`LiveMessage::Ignored`] and are dropped.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum LiveMessage {
    #[serde(rename = "leaderboard_update")]
    LeaderboardUpdate { data: LeaderboardPayload },
    #[serde(rename = "board_update")]
    BoardUpdate { data: BoardState },
    #[serde(other)]
    Ignored,
}

// ---------------------------------------------------------------------------
// REST responses
// ---------------------------------------------------------------------------

/// `GET /api/leaderboard`
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderboardResponse {
    pub leaderboard: Vec<LeaderboardEntry>,
}

/// One user record from the admin endpoints.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub real_name: String,
    #[serde(default)]
    pub profile_photo: Option<String>,
    pub points: u32,
    pub role: String,
    /// Soft-delete flag; the server encodes it as 0/1.
    #[serde(default)]
    pub is_deleted: u8,
}

/// `GET /api/users` and `GET /api/users/non-admin`
#[derive(Debug, Clone, Deserialize)]
pub struct UsersResponse {
    pub users: Vec<UserRecord>,
}

/// Success body of the mutating admin endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionReply {
    #[serde(default)]
    pub message: Option<String>,
}

/// Error body the server sends with non-2xx statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorReply {
    #[serde(default)]
    pub detail: Option<String>,
}

// ---------------------------------------------------------------------------
// REST requests
// ---------------------------------------------------------------------------

/// `POST /api/update-points`
#[derive(Debug, Clone, Serialize)]
pub struct UpdatePointsRequest {
    pub user_id: i64,
    pub points: i64,
}

/// `POST /api/draw-number`
#[derive(Debug, Clone, Serialize)]
pub struct DrawNumberRequest {
    pub number: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaderboard_update_parses() {
        let json = r#"{
            "type": "leaderboard_update",
            "data": {
                "leaderboard": [
                    {"rank": 1, "username": "alice", "real_name": "Alice A",
                     "profile_photo": "/static/avatars/alice.png", "points": 120}
                ]
            }
        }"#;
        let msg: LiveMessage = serde_json::from_str(json).unwrap();
        match msg {
            LiveMessage::LeaderboardUpdate { data } => {
                assert_eq!(data.leaderboard.len(), 1);
                assert_eq!(data.leaderboard[0].username, "alice");
                assert_eq!(data.leaderboard[0].points, 120);
            }
            other => panic!("expected LeaderboardUpdate, got {other:?}"),
        }
    }

    #[test]
    fn board_update_parses() {
        let json = r#"{"type":"board_update","data":{"current_number":7,"drawn_numbers":[3,7]}}"#;
        let msg: LiveMessage = serde_json::from_str(json).unwrap();
        assert_eq!(
            msg,
            LiveMessage::BoardUpdate {
                data: BoardState {
                    current_number: Some(7),
                    drawn_numbers: vec![3, 7],
                }
            }
        );
    }

    #[test]
    fn board_update_without_current_number() {
        let json = r#"{"type":"board_update","data":{"drawn_numbers":[]}}"#;
        let msg: LiveMessage = serde_json::from_str(json).unwrap();
        match msg {
            LiveMessage::BoardUpdate { data } => {
                assert_eq!(data.current_number, None);
                assert!(data.drawn_numbers.is_empty());
            }
            other => panic!("expected BoardUpdate, got {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_ignored() {
        let json = r#"{"type":"treasure_hunt_update","data":{"whatever":1}}"#;
        let msg: LiveMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg, LiveMessage::Ignored);
    }

    #[test]
    fn malformed_payload_is_an_error() {
        let json = r#"{"type":"leaderboard_update","data":{"leaderboard":"nope"}}"#;
        assert!(serde_json::from_str::<LiveMessage>(json).is_err());
    }

    #[test]
    fn missing_profile_photo_defaults_to_none() {
        let json = r#"{"rank":2,"username":"bob","real_name":"Bob","points":5}"#;
        let entry: LeaderboardEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.profile_photo, None);
    }

    #[test]
    fn user_record_parses_with_soft_delete_flag() {
        let json = r#"{"user_id":4,"username":"carol","real_name":"Carol C",
                        "profile_photo":null,"points":30,"role":"user","is_deleted":1}"#;
        let user: UserRecord = serde_json::from_str(json).unwrap();
        assert_eq!(user.user_id, 4);
        assert_eq!(user.is_deleted, 1);
    }

    #[test]
    fn error_reply_with_and_without_detail() {
        let with: ErrorReply = serde_json::from_str(r#"{"detail":"Number already drawn"}"#).unwrap();
        assert_eq!(with.detail.as_deref(), Some("Number already drawn"));

        let without: ErrorReply = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(without.detail, None);
    }
}
