//! Deterministic mapping from a client index to its connection target and
//! identity.

use crate::config::{IdentityScheme, RunConfig, PLACEHOLDER};

/// Username/password pair a worker logs in with before connecting.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginIdentity {
    pub username: String,
    pub password: String,
}

/// Everything one worker needs to open its connection. Derived from the run
/// configuration and the client index; never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerAssignment {
    pub port: u16,
    pub url: String,
    /// `None` when the connection is anonymous. For the shared scheme the
    /// identity is present but resolved once by the harness, not per worker.
    pub identity: Option<LoginIdentity>,
}

/// Replaces the first occurrence of the `%i` placeholder with the 1-based
/// client number, like the original tool does.
pub fn substitute(template: &str, index: u32) -> String {
    template.replacen(PLACEHOLDER, &(index + 1).to_string(), 1)
}

/// Resolves the assignment for one client index. Pure and idempotent.
pub fn resolve(config: &RunConfig, index: u32) -> WorkerAssignment {
    let port = config.ports[index as usize % config.ports.len()];
    let identity = match config.identity_scheme() {
        IdentityScheme::Anonymous => None,
        IdentityScheme::Shared => Some(LoginIdentity {
            username: config.username.clone(),
            password: config.password.clone(),
        }),
        IdentityScheme::PerClient => Some(LoginIdentity {
            username: substitute(&config.username, index),
            password: substitute(&config.password, index),
        }),
    };
    WorkerAssignment {
        port,
        url: config.ws_url(port),
        identity,
    }
}

/// Client count per endpoint for the connect-time operator summary: the first
/// `clients % endpoints` entries absorb the remainder, so counts differ by at
/// most one.
pub fn distribution(clients: u32, endpoints: usize) -> Vec<u32> {
    let endpoints = endpoints as u32;
    let base = clients / endpoints;
    let remainder = clients % endpoints;
    (0..endpoints)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}
