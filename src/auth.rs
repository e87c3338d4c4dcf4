//! Session login against the server's `/users/login/` endpoint.

use reqwest::StatusCode;
use tracing::debug;

/// Name of the session cookie the server sets on a successful login and
/// expects back on the websocket handshake.
pub const SESSION_COOKIE: &str = "OpenSlidesSessionID";

/// Opaque session token bound to one authenticated identity.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }

    /// Value for the `Cookie` header on the websocket handshake.
    pub fn cookie_header(&self) -> String {
        format!("{}={}", SESSION_COOKIE, self.0)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("login failed: status {0}")]
    BadStatus(StatusCode),
    #[error("no session cookie in login response")]
    MissingCredential,
    #[error("login request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Logs in with a username and password and returns the session credential.
///
/// Server-side failures (5xx) are retried immediately until the retry budget
/// is exhausted, for at most `max_retries + 1` attempts. Client errors (4xx)
/// and transport errors are never retried.
pub async fn authenticate(
    http: &reqwest::Client,
    login_url: &str,
    username: &str,
    password: &str,
    max_retries: u32,
) -> Result<Credential, AuthError> {
    let mut remaining = max_retries;
    loop {
        let response = http
            .post(login_url)
            .json(&serde_json::json!({ "username": username, "password": password }))
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() && remaining > 0 {
            debug!(%status, remaining, username, "server error on login, retrying");
            remaining -= 1;
            continue;
        }
        if status != StatusCode::OK {
            return Err(AuthError::BadStatus(status));
        }

        return response
            .cookies()
            .find(|cookie| cookie.name() == SESSION_COOKIE)
            .map(|cookie| Credential::new(cookie.value()))
            .ok_or(AuthError::MissingCredential);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_uses_session_cookie_name() {
        let cred = Credential::new("abc123");
        assert_eq!(cred.cookie_header(), "OpenSlidesSessionID=abc123");
        assert_eq!(cred.token(), "abc123");
    }
}
