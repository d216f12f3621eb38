//! Polling loop that drives the pipeline on a cadence until shutdown.
//!
//! # Design
//! - Cadence comes from an injected [`Ticker`] so tests never sleep.
//! - Shutdown is observed only between cycles; a running cycle always finishes.
//! - Each cycle runs on a blocking worker, so a panic is contained to that cycle.
//! - The loop only sees a [`CycleRunner`]; [`PipelineRunner`] is the production one.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use iagp2p_telemetry::Metrics;
use tokio::sync::{mpsc, watch};
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::IngestResult;
use crate::model::CycleReport;
use crate::pipeline::PipelineRunner;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Work the polling loop performs once per tick.
pub trait CycleRunner: Send + Sync + 'static {
    /// Run one cycle to completion.
    ///
    /// # Errors
    ///
    /// Returns an error when the cycle could not run at all.
    fn run_cycle(&self) -> IngestResult<CycleReport>;
}

impl CycleRunner for PipelineRunner {
    fn run_cycle(&self) -> IngestResult<CycleReport> {
        Self::run_cycle(self)
    }
}

/// Source of cycle start times.
#[async_trait]
pub trait Ticker: Send {
    /// Resolve when the next cycle should start.
    async fn tick(&mut self);
}

/// Fixed-period ticker; the first tick fires immediately.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    /// Ticker firing every `period`. Must be created inside a Tokio runtime.
    #[must_use]
    pub fn new(period: Duration) -> Self {
        let mut interval = time::interval(period.max(MIN_PERIOD));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

/// Handle that releases ticks of a [`ManualTicker`].
#[derive(Debug, Clone)]
pub struct TickSender {
    tx: mpsc::UnboundedSender<()>,
}

impl TickSender {
    /// Release one tick. Returns `false` once the ticker is gone.
    #[must_use]
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

/// Ticker that fires only when its [`TickSender`] says so.
#[derive(Debug)]
pub struct ManualTicker {
    rx: mpsc::UnboundedReceiver<()>,
}

/// Create a connected manual ticker pair.
#[must_use]
pub fn manual_ticker() -> (TickSender, ManualTicker) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TickSender { tx }, ManualTicker { rx })
}

#[async_trait]
impl Ticker for ManualTicker {
    async fn tick(&mut self) {
        if self.rx.recv().await.is_none() {
            future::pending::<()>().await;
        }
    }
}

/// Fires shutdown for every connected [`ShutdownSignal`].
#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    /// Request shutdown. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes a shutdown request.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Whether shutdown has been requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown is requested. Never resolves if the trigger is
    /// dropped without firing.
    pub async fn wait(&mut self) {
        loop {
            let triggered = *self.rx.borrow_and_update();
            if triggered {
                return;
            }
            if self.rx.changed().await.is_err() {
                future::pending::<()>().await;
            }
        }
    }
}

/// Create a connected shutdown pair.
#[must_use]
pub fn shutdown_channel() -> (ShutdownTrigger, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, ShutdownSignal { rx })
}

/// Delivered to an observer after every cycle.
#[derive(Debug)]
pub enum CycleEvent {
    /// The cycle ran to completion.
    Completed(CycleReport),
    /// The cycle returned an error or panicked.
    Failed {
        /// Rendered failure.
        detail: String,
    },
}

/// Counters returned when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollingStats {
    /// Cycles started.
    pub cycles: u64,
    /// Cycles that errored or panicked.
    pub failed_cycles: u64,
}

/// Runs [`CycleRunner::run_cycle`] on every tick until shutdown.
pub struct PollingLoop<T: Ticker, R: CycleRunner> {
    runner: Arc<R>,
    ticker: T,
    shutdown: ShutdownSignal,
    metrics: Metrics,
    observer: Option<mpsc::UnboundedSender<CycleEvent>>,
}

impl<T: Ticker, R: CycleRunner> PollingLoop<T, R> {
    /// Loop over `runner`, paced by `ticker`, stopped by `shutdown`.
    #[must_use]
    pub const fn new(
        runner: Arc<R>,
        ticker: T,
        shutdown: ShutdownSignal,
        metrics: Metrics,
    ) -> Self {
        Self {
            runner,
            ticker,
            shutdown,
            metrics,
            observer: None,
        }
    }

    /// Send a [`CycleEvent`] to `observer` after each cycle.
    #[must_use]
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<CycleEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Run until shutdown is requested.
    pub async fn run(mut self) -> PollingStats {
        let mut stats = PollingStats::default();
        info!("ingest polling loop started");

        loop {
            if self.shutdown.is_triggered() {
                break;
            }
            tokio::select! {
                biased;
                () = self.shutdown.wait() => break,
                () = self.ticker.tick() => {}
            }

            stats.cycles += 1;
            let runner = Arc::clone(&self.runner);
            let event = match tokio::task::spawn_blocking(move || runner.run_cycle()).await {
                Ok(Ok(report)) => CycleEvent::Completed(report),
                Ok(Err(err)) => {
                    error!(error = %err, detail = ?err, "ingest cycle failed");
                    CycleEvent::Failed {
                        detail: format!("{err:?}"),
                    }
                }
                Err(join_err) => {
                    error!(error = %join_err, "ingest cycle panicked");
                    CycleEvent::Failed {
                        detail: join_err.to_string(),
                    }
                }
            };
            if matches!(event, CycleEvent::Failed { .. }) {
                stats.failed_cycles += 1;
                self.metrics.inc_cycle_failure();
            }

            if let Some(observer) = &self.observer
                && observer.send(event).is_err()
            {
                debug!("cycle observer dropped");
                self.observer = None;
            }
        }

        info!(
            cycles = stats.cycles,
            failed_cycles = stats.failed_cycles,
            "ingest polling loop stopped"
        );
        stats
    }
}
