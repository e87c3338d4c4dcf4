//! Connection worker: one long-lived websocket connection per simulated
//! client.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

use crate::auth::{authenticate, Credential};
use crate::target::WorkerAssignment;

/// Per-worker configuration, resolved by the harness before spawning.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub index: u32,
    pub assignment: WorkerAssignment,
    /// Credential minted once for all workers, when the identity is shared.
    pub shared_credential: Option<Credential>,
    pub login_url: String,
    pub login_retries: u32,
    pub abort_on_login_failure: bool,
    pub verbose: bool,
    /// Ramp-up delay before this worker starts connecting.
    pub start_delay: Duration,
}

/// Runs one simulated client until its connection ends or shutdown is
/// signalled.
///
/// An error return is fatal to the whole run: the harness refuses to report
/// throughput for a population smaller than requested. A connection that
/// closes after a successful handshake is not an error; the worker just stops
/// emitting events.
pub async fn run_worker(
    cfg: WorkerConfig,
    http: reqwest::Client,
    opened_tx: flume::Sender<()>,
    message_tx: flume::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if !cfg.start_delay.is_zero() {
        tokio::time::sleep(cfg.start_delay).await;
    }

    let credential = match (&cfg.shared_credential, &cfg.assignment.identity) {
        (Some(shared), _) => Some(shared.clone()),
        (None, Some(identity)) => {
            match authenticate(
                &http,
                &cfg.login_url,
                &identity.username,
                &identity.password,
                cfg.login_retries,
            )
            .await
            {
                Ok(credential) => Some(credential),
                Err(e) if cfg.abort_on_login_failure => {
                    return Err(anyhow::Error::new(e)
                        .context(format!("client {}: login failed", cfg.index)));
                }
                Err(e) => {
                    warn!(
                        client = cfg.index,
                        username = %identity.username,
                        error = %e,
                        "login failed, connecting anonymously"
                    );
                    None
                }
            }
        }
        (None, None) => None,
    };

    let mut request = cfg
        .assignment
        .url
        .as_str()
        .into_client_request()
        .context("invalid websocket url")?;
    if let Some(credential) = &credential {
        request.headers_mut().insert(
            COOKIE,
            HeaderValue::from_str(&credential.cookie_header())
                .context("session token is not a valid header value")?,
        );
    }

    let (stream, _) = connect_async(request).await.with_context(|| {
        format!(
            "client {}: websocket handshake to {} failed",
            cfg.index, cfg.assignment.url
        )
    })?;
    debug!(client = cfg.index, url = %cfg.assignment.url, "connection open");
    let _ = opened_tx.send(());

    // The write half is kept alive so the connection stays open; this tool
    // never sends application data.
    let (_write, mut read) = stream.split();
    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if cfg.verbose {
                        println!("{}", text.as_str());
                    }
                    let _ = message_tx.send(());
                }
                Some(Ok(Message::Binary(_))) => {
                    let _ = message_tx.send(());
                }
                Some(Ok(_)) => {} // control frames don't count as delivered data
                Some(Err(e)) => {
                    debug!(client = cfg.index, error = %e, "read error, connection lost");
                    break;
                }
                None => {
                    debug!(client = cfg.index, "connection closed by peer");
                    break;
                }
            }
        }
    }
    Ok(())
}
