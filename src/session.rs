// Cookie-based identity signal.
//
// The companion never authenticates by itself: it is handed the browser
// session's cookie string and treats it as a read-only signal. Presence of
// `username`, `user_role`, and `session_token` together implies an
// authenticated session; the token is opaque and only forwarded to the
// server on API calls.

use std::collections::HashMap;

/// Names of the three cookies that make up an authenticated session.
const USERNAME_COOKIE: &str = "username";
const ROLE_COOKIE: &str = "user_role";
const TOKEN_COOKIE: &str = "session_token";
const REAL_NAME_COOKIE: &str = "real_name";

/// Parsed session cookies plus the raw header string for API calls.
#[derive(Debug, Clone, Default)]
pub struct Session {
    raw: String,
    cookies: HashMap<String, String>,
}

/// The identity extracted from an authenticated session.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentUser {
    pub username: String,
    pub role: String,
    /// Falls back to the username when the `real_name` cookie is absent.
    pub real_name: String,
}

impl Session {
    /// Parse a `Cookie`-header-shaped string (`name=value; name2=value2`).
    ///
    /// Malformed fragments (no `=`) are skipped rather than rejected; the
    /// session simply ends up without that cookie.
    pub fn from_cookie_header(header: &str) -> Self {
        let mut cookies = HashMap::new();
        for part in header.split(';') {
            let part = part.trim();
            if let Some((name, value)) = part.split_once('=') {
                if !name.is_empty() {
                    cookies.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
        Session {
            raw: header.trim().to_string(),
            cookies,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str).filter(|v| !v.is_empty())
    }

    /// All three core cookies present and non-empty.
    pub fn is_authenticated(&self) -> bool {
        self.get(USERNAME_COOKIE).is_some()
            && self.get(ROLE_COOKIE).is_some()
            && self.get(TOKEN_COOKIE).is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.get(ROLE_COOKIE) == Some("admin")
    }

    /// The identity carried by the cookies, or `None` when unauthenticated.
    pub fn current_user(&self) -> Option<CurrentUser> {
        if !self.is_authenticated() {
            return None;
        }
        let username = self.get(USERNAME_COOKIE)?.to_string();
        let real_name = self
            .get(REAL_NAME_COOKIE)
            .unwrap_or(&username)
            .to_string();
        Some(CurrentUser {
            role: self.get(ROLE_COOKIE)?.to_string(),
            username,
            real_name,
        })
    }

    /// The raw string to send as the `Cookie` header on API calls.
    pub fn cookie_header(&self) -> &str {
        &self.raw
    }
}
