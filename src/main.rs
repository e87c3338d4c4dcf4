use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;
use ws_bench::config::RunConfig;
use ws_bench::harness;

#[derive(Parser)]
#[command(name = "ws-bench")]
#[command(about = "Websocket stress-test harness for OpenSlides-style realtime servers")]
struct Cli {
    /// Host of the server
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Port of the server (repeatable to spread clients across several ports)
    #[arg(long, default_value = "8000")]
    port: Vec<u16>,

    /// ID of the projector to connect to. 0 connects to the site feed instead.
    #[arg(long, default_value = "0")]
    projector: u32,

    /// Number of clients that should connect to the server
    #[arg(long, default_value = "500")]
    clients: u32,

    /// Connect with this username. Empty string for anonymous. %i is replaced
    /// by a number between 1 and the client count.
    #[arg(long, default_value = "")]
    username: String,

    /// Password for the connection. %i is replaced by a number between 1 and
    /// the client count.
    #[arg(long, default_value = "")]
    password: String,

    /// Use wss/https instead of ws/http
    #[arg(long)]
    secure: bool,

    /// Echo received text payloads to stdout
    #[arg(long)]
    verbose: bool,

    /// Abort the whole run when a single client fails to log in, instead of
    /// connecting that client anonymously
    #[arg(long)]
    abort_on_login_failure: bool,

    /// Retry budget for server errors on the login call
    #[arg(long, default_value = "3")]
    login_retries: u32,

    /// Spread connection establishment over this many seconds
    #[arg(long, default_value = "0")]
    ramp_up_secs: f64,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Cli {
    fn into_config(self) -> RunConfig {
        RunConfig {
            host: self.host,
            ports: self.port,
            projector: (self.projector != 0).then_some(self.projector),
            clients: self.clients,
            username: self.username,
            password: self.password,
            secure: self.secure,
            verbose: self.verbose,
            abort_on_login_failure: self.abort_on_login_failure,
            login_retries: self.login_retries,
            ramp_up: Duration::from_secs_f64(self.ramp_up_secs.max(0.0)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    ws_bench::logging::init(&cli.log_level)?;

    let config = cli.into_config();
    let (shutdown, _) = watch::channel(false);
    let signal_tx = shutdown.clone();
    tokio::spawn(async move {
        let _ = signal::ctrl_c().await;
        info!("Ctrl+C received, stopping");
        let _ = signal_tx.send(true);
    });

    harness::run(config, shutdown).await
}
