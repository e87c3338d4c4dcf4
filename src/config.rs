//! Resolved run configuration, built once by the CLI and passed into the core.

use std::time::Duration;

/// Marker in username/password templates that is replaced with the 1-based
/// client number to mint a distinct identity per connection.
pub const PLACEHOLDER: &str = "%i";

/// How the simulated clients identify themselves to the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentityScheme {
    /// Empty username: no login call at all.
    Anonymous,
    /// One login before any worker starts; all workers reuse the credential.
    Shared,
    /// Template contains the placeholder; every worker logs in on its own.
    PerClient,
}

/// Immutable configuration for one run. Owned by the caller, read-only to the
/// core; never accessed as ambient state.
#[derive(Clone, Debug)]
pub struct RunConfig {
    pub host: String,
    /// Ordered list of server ports; clients are spread round-robin across them.
    pub ports: Vec<u16>,
    /// Projector feed to subscribe to; `None` = site feed.
    pub projector: Option<u32>,
    /// Number of concurrent connections to establish.
    pub clients: u32,
    /// Username template, may contain [`PLACEHOLDER`]. Empty = anonymous.
    pub username: String,
    /// Password template, may contain [`PLACEHOLDER`].
    pub password: String,
    /// Use wss/https instead of ws/http.
    pub secure: bool,
    /// Echo received text payloads to stdout.
    pub verbose: bool,
    /// Abort the whole run when one client fails to log in, instead of
    /// falling back to an anonymous connection for that client.
    pub abort_on_login_failure: bool,
    /// Retry budget for 5xx login responses (attempts = retries + 1).
    pub login_retries: u32,
    /// Spread connection establishment over this window (0 = all at once).
    pub ramp_up: Duration,
}

impl RunConfig {
    pub fn identity_scheme(&self) -> IdentityScheme {
        if self.username.is_empty() {
            IdentityScheme::Anonymous
        } else if self.username.contains(PLACEHOLDER) || self.password.contains(PLACEHOLDER) {
            IdentityScheme::PerClient
        } else {
            IdentityScheme::Shared
        }
    }

    pub fn ws_path(&self) -> String {
        match self.projector {
            None => "/ws/site/".to_string(),
            Some(id) => format!("/ws/projector/{}/", id),
        }
    }

    pub fn ws_url(&self, port: u16) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}{}", scheme, self.host, port, self.ws_path())
    }

    pub fn login_url(&self, port: u16) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/users/login/", scheme, self.host, port)
    }
}
