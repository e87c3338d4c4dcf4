//! Fan-out launcher: resolves credentials, spawns one worker per client plus
//! the reporter, and maps fatal worker errors onto run shutdown.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::watch;
use tracing::info;

use crate::auth::authenticate;
use crate::config::{IdentityScheme, RunConfig};
use crate::reporter::{self, REPORT_PERIOD};
use crate::target;
use crate::worker::{run_worker, WorkerConfig};

/// File descriptors the process needs beyond the client sockets.
const DESCRIPTOR_HEADROOM: u64 = 32;

/// Fails loudly before anything connects when the configured client count
/// cannot fit in the process's open-file limit.
pub fn check_descriptor_limit(clients: u32) -> Result<()> {
    #[cfg(unix)]
    {
        let mut limit = libc::rlimit {
            rlim_cur: 0,
            rlim_max: 0,
        };
        let rc = unsafe { libc::getrlimit(libc::RLIMIT_NOFILE, &mut limit) };
        if rc == 0 && clients as u64 + DESCRIPTOR_HEADROOM > limit.rlim_cur as u64 {
            bail!(
                "{} clients would exceed the open-file limit of {}; raise it with `ulimit -n`",
                clients,
                limit.rlim_cur
            );
        }
    }
    Ok(())
}

/// Runs the whole load test until the shutdown signal fires or a fatal worker
/// error occurs.
pub async fn run(config: RunConfig, shutdown: watch::Sender<bool>) -> Result<()> {
    if config.ports.is_empty() {
        bail!("at least one port is required");
    }
    if config.clients == 0 {
        bail!("client count must be at least 1");
    }
    check_descriptor_limit(config.clients)?;

    println!(
        "Try to connect {} clients to {}",
        config.clients,
        config.ws_url(config.ports[0])
    );
    if config.ports.len() > 1 {
        let counts = target::distribution(config.clients, config.ports.len());
        for (port, count) in config.ports.iter().zip(&counts) {
            println!("  {}:{} <- {} clients", config.host, port, count);
        }
    }

    let http = reqwest::Client::new();

    // Shared identities log in once, before any worker starts. A failure here
    // is always fatal; per-client login failures are handled in the worker.
    let shared_credential = match config.identity_scheme() {
        IdentityScheme::Shared => Some(
            authenticate(
                &http,
                &config.login_url(config.ports[0]),
                &config.username,
                &config.password,
                config.login_retries,
            )
            .await
            .context("shared login failed")?,
        ),
        IdentityScheme::Anonymous | IdentityScheme::PerClient => None,
    };

    let (opened_tx, opened_rx) = flume::unbounded();
    let (message_tx, message_rx) = flume::unbounded();

    let reporter = tokio::spawn(reporter::run(
        config.clients,
        REPORT_PERIOD,
        opened_rx,
        message_rx,
        shutdown.subscribe(),
    ));

    let ramp_step = if config.clients > 1 {
        config.ramp_up / config.clients
    } else {
        Duration::ZERO
    };
    let mut workers = FuturesUnordered::new();
    for index in 0..config.clients {
        let cfg = WorkerConfig {
            index,
            assignment: target::resolve(&config, index),
            shared_credential: shared_credential.clone(),
            login_url: config.login_url(config.ports[index as usize % config.ports.len()]),
            login_retries: config.login_retries,
            abort_on_login_failure: config.abort_on_login_failure,
            verbose: config.verbose,
            start_delay: ramp_step * index,
        };
        workers.push(tokio::spawn(run_worker(
            cfg,
            http.clone(),
            opened_tx.clone(),
            message_tx.clone(),
            shutdown.subscribe(),
        )));
    }
    // The reporter must see the channels close once every worker is gone.
    drop(opened_tx);
    drop(message_tx);

    let mut shutdown_rx = shutdown.subscribe();
    let outcome = loop {
        tokio::select! {
            _ = shutdown_rx.changed() => break Ok(()),
            joined = workers.next(), if !workers.is_empty() => match joined {
                Some(Ok(Ok(()))) => {
                    // One connection ended; the run keeps going with the rest.
                }
                Some(Ok(Err(e))) => break Err(e),
                Some(Err(e)) => {
                    break Err(anyhow::Error::new(e).context("worker task panicked"))
                }
                None => unreachable!("guarded by !workers.is_empty()"),
            },
        }
    };

    // Stop everything that is still running, then let the reporter drain.
    let _ = shutdown.send(true);
    let _ = reporter.await;
    info!("harness stopped");
    outcome
}
