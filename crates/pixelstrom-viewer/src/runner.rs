//! Viewer driver loop.
//!
//! One task owns the [`SyncSession`]; channel frames are decoded and applied
//! inline, so store mutations never interleave. The bootstrap fetch runs as a
//! separate task and its result is joined back into the same `select!`.
//!
//! Lifecycle per connection attempt:
//! 1. `begin_connect` + connect (a span per attempt)
//! 2. `channel_opened`, spawn the bootstrap fetch in `fetch` mode
//! 3. loop over shutdown / bootstrap result / next frame / sink flush tick
//! 4. on failure: abort bootstrap, close channel, back off, reconnect

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, info_span, warn, Instrument};

use pixelstrom_core::error::{Result, ViewerError};
use pixelstrom_core::session::{Dispatch, SessionState, SyncSession};
use pixelstrom_core::sink::DisplaySink;

use crate::config::{BootstrapMode, ReconnectSection, ViewerConfig};
use crate::obs::ViewerMetrics;
use crate::transport::{Channel, Connector, Inbound};

const MIN_FLUSH_PERIOD: Duration = Duration::from_millis(50);

enum ConnectionEnd {
    Shutdown,
    Failed { err: ViewerError, went_live: bool },
}

pub struct Viewer<S> {
    connector: Arc<dyn Connector>,
    session: SyncSession<S>,
    metrics: ViewerMetrics,
    reconnect: ReconnectSection,
    bootstrap: BootstrapMode,
    flush_every: Duration,
}

impl<S: DisplaySink + Send> Viewer<S> {
    pub fn new(cfg: &ViewerConfig, connector: Arc<dyn Connector>, sink: S) -> Self {
        Self {
            connector,
            session: SyncSession::new(sink),
            metrics: ViewerMetrics::default(),
            reconnect: cfg.reconnect.clone(),
            bootstrap: cfg.bootstrap.mode,
            flush_every: Duration::from_millis(cfg.display.min_interval_ms).max(MIN_FLUSH_PERIOD),
        }
    }

    pub fn session(&self) -> &SyncSession<S> {
        &self.session
    }

    pub fn metrics(&self) -> &ViewerMetrics {
        &self.metrics
    }

    /// Run until `shutdown` flips (or its sender is dropped), or until
    /// `reconnect.max_attempts` consecutive attempts failed.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut backoff = Backoff::new(&self.reconnect);
        let mut attempt: u64 = 0;

        let outcome = loop {
            if *shutdown.borrow() {
                break Ok(());
            }
            attempt += 1;

            let span = info_span!("connection", attempt);
            let end = self.run_connection(&mut shutdown).instrument(span).await;

            let (err, went_live) = match end {
                ConnectionEnd::Shutdown => break Ok(()),
                ConnectionEnd::Failed { err, went_live } => (err, went_live),
            };

            self.session.channel_failed(&err);
            if went_live {
                backoff.reset();
            }

            let Some(delay) = backoff.next_delay() else {
                break Err(ViewerError::Channel(format!(
                    "giving up after {} failed attempts: {err}",
                    backoff.failures()
                )));
            };

            self.metrics.reconnects.inc(&[]);
            warn!(
                code = err.code().as_str(),
                error = %err,
                delay_ms = delay.as_millis() as u64,
                "reconnecting"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.changed() => break Ok(()),
            }
        };

        self.session.shutdown();
        info!(state = %self.session.state(), "viewer stopped");
        info!("metrics\n{}", self.metrics.render());
        outcome
    }

    async fn run_connection(&mut self, shutdown: &mut watch::Receiver<bool>) -> ConnectionEnd {
        if let Err(err) = self.session.begin_connect() {
            return ConnectionEnd::Failed {
                err,
                went_live: false,
            };
        }

        let connector = Arc::clone(&self.connector);
        let mut channel = tokio::select! {
            _ = shutdown.changed() => return ConnectionEnd::Shutdown,
            res = connector.connect() => match res {
                Ok(c) => c,
                Err(err) => return ConnectionEnd::Failed { err, went_live: false },
            },
        };

        if let Err(err) = self.session.channel_opened() {
            channel.close().await;
            return ConnectionEnd::Failed {
                err,
                went_live: false,
            };
        }

        let mut bootstrap = match self.bootstrap {
            BootstrapMode::Fetch => {
                let connector = Arc::clone(&self.connector);
                Some(tokio::spawn(async move { connector.fetch_snapshot().await }))
            }
            BootstrapMode::Push => None,
        };

        let end = self
            .pump(channel.as_mut(), &mut bootstrap, shutdown)
            .await;

        if let Some(task) = bootstrap.take() {
            task.abort();
        }
        channel.close().await;
        end
    }

    async fn pump(
        &mut self,
        channel: &mut dyn Channel,
        bootstrap: &mut Option<JoinHandle<Result<Bytes>>>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ConnectionEnd {
        let mut went_live = false;
        let mut flush_tick = tokio::time::interval(self.flush_every);
        flush_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            let failed = tokio::select! {
                _ = shutdown.changed() => return ConnectionEnd::Shutdown,

                _ = flush_tick.tick() => {
                    self.session.flush_sink();
                    None
                }

                res = join_bootstrap(bootstrap) => {
                    self.on_bootstrap(res);
                    None
                }

                frame = channel.next_frame() => match frame {
                    None => Some(ViewerError::Channel("channel closed by peer".into())),
                    Some(Err(err)) => Some(err),
                    Some(Ok(inbound)) => self.on_inbound(inbound),
                },
            };

            if self.session.state() == SessionState::Live {
                went_live = true;
            }
            if let Some(err) = failed {
                return ConnectionEnd::Failed { err, went_live };
            }
        }
    }

    /// Returns the failure that ends this connection, if any.
    fn on_inbound(&mut self, inbound: Inbound) -> Option<ViewerError> {
        match inbound {
            Inbound::Envelope(bytes) => {
                let started = Instant::now();
                let d = self.session.handle_frame(bytes);
                self.metrics.record(&d, started.elapsed());
                match d {
                    Dispatch::ChannelLost => Some(ViewerError::Channel(
                        "server closed the channel for lagging".into(),
                    )),
                    _ => None,
                }
            }
            Inbound::Rejected(err) => {
                let d = self.session.drop_message(err);
                self.metrics.record(&d, Duration::ZERO);
                None
            }
            Inbound::Control => None,
            Inbound::Close(reason) => Some(ViewerError::Channel(format!(
                "server closed the channel: {}",
                reason.as_deref().unwrap_or("no reason")
            ))),
        }
    }

    fn on_bootstrap(&mut self, res: Result<Bytes>) {
        match res {
            Ok(bytes) => {
                self.metrics.bootstrap.inc(&[("result", "ok")]);
                let started = Instant::now();
                let d = self.session.handle_bootstrap(bytes);
                self.metrics.record(&d, started.elapsed());
            }
            Err(e) => {
                self.metrics.bootstrap.inc(&[("result", "error")]);
                warn!(
                    code = e.code().as_str(),
                    error = %e,
                    "bootstrap fetch failed, waiting for a pushed snapshot"
                );
            }
        }
    }
}

/// Resolves once with the bootstrap result, then never again.
async fn join_bootstrap(task: &mut Option<JoinHandle<Result<Bytes>>>) -> Result<Bytes> {
    let Some(handle) = task.as_mut() else {
        return std::future::pending().await;
    };
    let res = handle.await;
    *task = None;
    match res {
        Ok(r) => r,
        Err(e) => Err(ViewerError::Internal(format!("bootstrap task failed: {e}"))),
    }
}

/// Exponential reconnect delay: doubles per failure, capped, reset once a
/// connection went live.
#[derive(Debug)]
struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    max_attempts: u32,
    failures: u32,
}

impl Backoff {
    fn new(cfg: &ReconnectSection) -> Self {
        let initial = Duration::from_millis(cfg.initial_backoff_ms);
        Self {
            initial,
            max: Duration::from_millis(cfg.max_backoff_ms).max(initial),
            current: initial,
            max_attempts: cfg.max_attempts,
            failures: 0,
        }
    }

    fn failures(&self) -> u32 {
        self.failures
    }

    /// `None` once `max_attempts` consecutive failures were reached.
    fn next_delay(&mut self) -> Option<Duration> {
        self.failures = self.failures.saturating_add(1);
        if self.max_attempts != 0 && self.failures > self.max_attempts {
            return None;
        }
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        Some(delay)
    }

    fn reset(&mut self) {
        self.current = self.initial;
        self.failures = 0;
    }
}
