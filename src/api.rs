// REST client for the event server.
//
// Thin typed wrappers over the JSON endpoints. The session cookie string is
// attached to every request; the server does all authorization. REST calls
// are never retried automatically -- a failed poll just waits for the next
// tick, and a failed admin action is reported to the caller.

use reqwest::header::COOKIE;
use thiserror::Error;
use tracing::debug;

use crate::protocol::{
    ActionReply, BoardState, DrawNumberRequest, ErrorReply, LeaderboardEntry,
    LeaderboardResponse, UpdatePointsRequest, UserRecord, UsersResponse,
};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Fetch rejection, connection refused, timeout, or a response body
    /// that didn't decode as the expected schema.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with a non-2xx status.
    #[error("server returned {status}: {detail}")]
    Rejected { status: u16, detail: String },
}

pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    cookie: String,
}

impl ApiClient {
    /// Create a client for the given base URL, carrying `cookie` as the
    /// `Cookie` header on every request.
    pub fn new(base_url: &str, cookie: &str) -> Self {
        ApiClient {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            cookie: cookie.to_string(),
        }
    }

    /// Resolve a path or already-absolute URL against the base URL.
    /// Avatar URLs in particular may come back either way.
    pub fn absolute_url(&self, path_or_url: &str) -> String {
        if path_or_url.starts_with("http://") || path_or_url.starts_with("https://") {
            path_or_url.to_string()
        } else if path_or_url.starts_with('/') {
            format!("{}{}", self.base_url, path_or_url)
        } else {
            format!("{}/{}", self.base_url, path_or_url)
        }
    }

    // -----------------------------------------------------------------------
    // Live data
    // -----------------------------------------------------------------------

    pub async fn fetch_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, ApiError> {
        let body: LeaderboardResponse = self.get_json("/api/leaderboard").await?;
        Ok(body.leaderboard)
    }

    pub async fn fetch_board(&self) -> Result<BoardState, ApiError> {
        self.get_json("/api/board").await
    }

    /// Fire-and-forget avatar warm-up. The response body is discarded;
    /// failures are logged at debug and swallowed.
    pub async fn warm_image(&self, url: &str) {
        let url = self.absolute_url(url);
        match self.http.get(&url).header(COOKIE, &self.cookie).send().await {
            Ok(resp) => debug!("preloaded image {url}: {}", resp.status()),
            Err(e) => debug!("image preload failed for {url}: {e}"),
        }
    }

    // -----------------------------------------------------------------------
    // Admin endpoints
    // -----------------------------------------------------------------------

    pub async fn list_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        let body: UsersResponse = self.get_json("/api/users").await?;
        Ok(body.users)
    }

    pub async fn list_non_admin_users(&self) -> Result<Vec<UserRecord>, ApiError> {
        let body: UsersResponse = self.get_json("/api/users/non-admin").await?;
        Ok(body.users)
    }

    pub async fn delete_user(&self, user_id: i64) -> Result<ActionReply, ApiError> {
        let resp = self
            .http
            .delete(self.absolute_url(&format!("/api/delete-user/{user_id}")))
            .header(COOKIE, &self.cookie)
            .send()
            .await?;
        Self::decode_reply(resp).await
    }

    pub async fn restore_user(&self, user_id: i64) -> Result<ActionReply, ApiError> {
        self.post_empty(&format!("/api/restore-user/{user_id}")).await
    }

    pub async fn update_points(&self, user_id: i64, points: i64) -> Result<ActionReply, ApiError> {
        let resp = self
            .http
            .post(self.absolute_url("/api/update-points"))
            .header(COOKIE, &self.cookie)
            .json(&UpdatePointsRequest { user_id, points })
            .send()
            .await?;
        Self::decode_reply(resp).await
    }

    pub async fn draw_number(&self, number: u32) -> Result<ActionReply, ApiError> {
        let resp = self
            .http
            .post(self.absolute_url("/api/draw-number"))
            .header(COOKIE, &self.cookie)
            .json(&DrawNumberRequest { number })
            .send()
            .await?;
        Self::decode_reply(resp).await
    }

    pub async fn clear_numbers(&self) -> Result<ActionReply, ApiError> {
        let resp = self
            .http
            .delete(self.absolute_url("/api/clear-numbers"))
            .header(COOKIE, &self.cookie)
            .send()
            .await?;
        Self::decode_reply(resp).await
    }

    pub async fn refresh_avatars(&self) -> Result<ActionReply, ApiError> {
        self.post_empty("/api/refresh-avatars").await
    }

    pub async fn logout(&self) -> Result<ActionReply, ApiError> {
        self.post_empty("/api/logout").await
    }

    // -----------------------------------------------------------------------
    // Request plumbing
    // -----------------------------------------------------------------------

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let resp = self
            .http
            .get(self.absolute_url(path))
            .header(COOKIE, &self.cookie)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }
        Ok(resp.json().await?)
    }

    async fn post_empty(&self, path: &str) -> Result<ActionReply, ApiError> {
        let resp = self
            .http
            .post(self.absolute_url(path))
            .header(COOKIE, &self.cookie)
            .send()
            .await?;
        Self::decode_reply(resp).await
    }

    async fn decode_reply(resp: reqwest::Response) -> Result<ActionReply, ApiError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(rejection(status.as_u16(), &body));
        }
        Ok(resp.json().await?)
    }
}

/// Build the [`ApiError::Rejected`] for a non-2xx response, pulling the
/// `detail` message out of the body when the server provided one.
fn rejection(status: u16, body: &str) -> ApiError {
    let detail = serde_json::from_str::<ErrorReply>(body)
        .ok()
        .and_then(|r| r.detail)
        .unwrap_or_else(|| "(no detail)".to_string());
    ApiError::Rejected { status, detail }
}
