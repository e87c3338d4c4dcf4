//! Single-consumer aggregation loop turning per-connection events into
//! time-bucketed throughput lines on the console.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval_at, Instant};
use tracing::debug;

/// Cadence of the periodic status line.
pub const REPORT_PERIOD: Duration = Duration::from_millis(100);

/// What one non-empty tick should print.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Messages received since the previous non-empty tick.
    pub received: u64,
    /// Messages received since the start of the run.
    pub total: u64,
    /// Length of the silent stretch that preceded this interval, if any.
    pub silent_for: Option<Duration>,
}

/// Aggregator state. Mutated exclusively by the reporter loop; the pure
/// transition methods keep the reporting contract testable without time or
/// I/O.
pub struct Counters {
    target: u32,
    period: Duration,
    opened: u32,
    announced: bool,
    interval: u64,
    total: u64,
    ticks: u64,
    empty: u32,
}

impl Counters {
    pub fn new(target: u32, period: Duration) -> Self {
        Self {
            target,
            period,
            opened: 0,
            announced: false,
            interval: 0,
            total: 0,
            ticks: 0,
            empty: 0,
        }
    }

    /// Records one opened connection. Returns true exactly once, when the
    /// opened count first reaches the configured client total.
    pub fn on_opened(&mut self) -> bool {
        self.opened += 1;
        if !self.announced && self.opened >= self.target {
            self.announced = true;
            return true;
        }
        false
    }

    pub fn on_message(&mut self) {
        self.interval += 1;
        self.total += 1;
    }

    /// Advances the clock by one period. Returns a report when the interval
    /// saw data; silence is only reported retroactively, once data resumes.
    pub fn on_tick(&mut self) -> Option<TickReport> {
        self.ticks += 1;
        if self.interval == 0 {
            self.empty += 1;
            return None;
        }
        let report = TickReport {
            tick: self.ticks,
            received: self.interval,
            total: self.total,
            silent_for: (self.empty > 0).then(|| self.period * self.empty),
        };
        self.interval = 0;
        self.empty = 0;
        Some(report)
    }
}

/// Drains the two event channels and the periodic timer until shutdown. Runs
/// forever in normal operation; there is no final summary.
pub async fn run(
    target: u32,
    period: Duration,
    opened_rx: flume::Receiver<()>,
    message_rx: flume::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut counters = Counters::new(target, period);
    let mut ticks = interval_at(Instant::now() + period, period);
    let mut opened_live = true;
    let mut messages_live = true;

    loop {
        tokio::select! {
            _ = shutdown.changed() => break,
            received = opened_rx.recv_async(), if opened_live => match received {
                Ok(()) => {
                    if counters.on_opened() {
                        println!("Connections established.");
                    }
                }
                Err(_) => opened_live = false,
            },
            received = message_rx.recv_async(), if messages_live => match received {
                Ok(()) => counters.on_message(),
                Err(_) => messages_live = false,
            },
            _ = ticks.tick() => {
                if let Some(report) = counters.on_tick() {
                    if let Some(silent) = report.silent_for {
                        println!("--- {} ms without data ---", silent.as_millis());
                    }
                    println!(
                        "{}\tReceived messages: {} (all: {})",
                        report.tick, report.received, report.total
                    );
                }
            }
        }
    }
    debug!("reporter stopped");
}
