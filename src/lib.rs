//! ws-bench library crate exposing modules for reuse and testing.

pub mod auth;
pub mod config;
pub mod harness;
pub mod logging;
pub mod reporter;
pub mod target;
pub mod worker;

// Optional re-exports for convenience in downstream code/tests
pub use auth::{authenticate, AuthError, Credential};
pub use config::{IdentityScheme, RunConfig};
pub use target::{resolve, WorkerAssignment};
