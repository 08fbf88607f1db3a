use std::{io, mem, sync::Arc, thread::JoinHandle, time::Instant};

use crossbeam_channel::{tick, Receiver};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, error};

use crate::{
    builder::ExporterConfig,
    publisher::Publisher,
    registry::Registry,
    scheduler::{CancellationToken, Scheduler},
    sink::Sink,
    snapshot::Snapshotter,
    telemetry::{Telemetry, TelemetrySnapshot},
};

/// The name the exporter reports to its host.
pub const NAME: &str = "prometheus";

/// Errors that could occur while configuring an exporter.
#[derive(Debug, Error)]
pub enum ConfigureError {
    /// The exporter is already running.
    #[error("exporter is already configured")]
    AlreadyConfigured,

    /// The exporter was closed and cannot be started again.
    #[error("exporter has been closed")]
    Stopped,

    /// The publisher thread could not be spawned.
    #[error("failed to spawn publisher thread: {0}")]
    Spawn(#[from] io::Error),
}

struct Running {
    token: CancellationToken,
    worker: JoinHandle<()>,
    registry: Arc<Registry>,
}

enum State {
    Unconfigured,
    Running(Running),
    Stopped,
}

/// Periodically publishes stats snapshots as gauges and histograms.
///
/// Once configured, the exporter takes a snapshot every interval, restores it, and writes the
/// result into instruments created through its [`Sink`]:
///
/// - `node.peers`, `node.conns` and `node.subs` become gauges set to the maximum of the interval
/// - every `rcv.*` and `send.*` metric becomes a histogram observing each raw sample
/// - everything else is ignored
///
/// Metric names are sanitized by replacing every `.` with `_`, so `rcv.bytes` is published as
/// `rcv_bytes`.
///
/// ## Lifecycle
///
/// An exporter is started once with [`configure`](StatsExporter::configure) and stopped once with
/// [`close`](StatsExporter::close). A stopped exporter cannot be restarted. Dropping a running
/// exporter closes it.
pub struct StatsExporter<S> {
    snapshotter: Arc<S>,
    sink: Arc<dyn Sink>,
    telemetry: Arc<Telemetry>,
    state: Mutex<State>,
}

impl<S> StatsExporter<S>
where
    S: Snapshotter,
{
    /// Creates a new, unconfigured `StatsExporter`.
    pub fn new<K>(snapshotter: S, sink: K) -> Self
    where
        K: Sink + 'static,
    {
        StatsExporter {
            snapshotter: Arc::new(snapshotter),
            sink: Arc::new(sink),
            telemetry: Arc::new(Telemetry::default()),
            state: Mutex::new(State::Unconfigured),
        }
    }

    /// Returns the name of the exporter.
    pub fn name(&self) -> &'static str {
        NAME
    }

    /// Starts publishing with the given configuration.
    ///
    /// The first cycle runs one full interval after this call returns.
    ///
    /// # Errors
    ///
    /// If the exporter is already running or has been closed, or the publisher thread cannot be
    /// spawned, an error is returned and the state of the exporter is unchanged.
    pub fn configure(&self, config: ExporterConfig) -> Result<(), ConfigureError> {
        debug!(interval = ?config.interval(), "Configuring exporter.");
        self.configure_with_ticks(tick(config.interval()))
    }

    /// Starts publishing with configuration read from provider options.
    ///
    /// See [`ExporterConfig::from_options`] for how options are interpreted.
    ///
    /// # Errors
    ///
    /// Same as [`configure`](StatsExporter::configure).
    pub fn configure_from_options(
        &self,
        options: &Map<String, Value>,
    ) -> Result<(), ConfigureError> {
        self.configure(ExporterConfig::from_options(options))
    }

    /// Starts publishing once per tick received from `ticks`.
    pub(crate) fn configure_with_ticks(
        &self,
        ticks: Receiver<Instant>,
    ) -> Result<(), ConfigureError> {
        let mut state = self.state.lock();
        match *state {
            State::Unconfigured => {}
            State::Running(_) => return Err(ConfigureError::AlreadyConfigured),
            State::Stopped => return Err(ConfigureError::Stopped),
        }

        let registry = Arc::new(Registry::new(Arc::clone(&self.sink)));
        let publisher = Publisher::new(
            Arc::clone(&self.snapshotter),
            Arc::clone(&registry),
            Arc::clone(&self.telemetry),
        );
        let (scheduler, token) = Scheduler::new(publisher, ticks);
        let worker = scheduler.spawn()?;

        *state = State::Running(Running { token, worker, registry });
        Ok(())
    }
}

impl<S> StatsExporter<S> {
    /// Stops publishing.
    ///
    /// No cycle starts after this call returns. A cycle already in progress is allowed to finish,
    /// and this call waits for it. Closing more than once, or from several threads at once, is a
    /// no-op. Closing an exporter that was never configured does nothing, and it can still be
    /// configured afterwards.
    pub fn close(&self) {
        close(&self.state);
    }

    /// Returns `true` if the exporter is configured and not yet closed.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running(_))
    }

    /// Returns the registry of live instruments, if the exporter is running.
    pub fn registry(&self) -> Option<Arc<Registry>> {
        match &*self.state.lock() {
            State::Running(running) => Some(Arc::clone(&running.registry)),
            _ => None,
        }
    }

    /// Returns a point-in-time copy of the exporter's telemetry.
    pub fn telemetry(&self) -> TelemetrySnapshot {
        self.telemetry.snapshot()
    }
}

impl<S> Drop for StatsExporter<S> {
    fn drop(&mut self) {
        close(&self.state);
    }
}

fn close(state: &Mutex<State>) {
    // The lock is held until the worker is joined, so concurrent callers return only once the
    // exporter has fully stopped.
    let mut state = state.lock();
    match mem::replace(&mut *state, State::Stopped) {
        State::Unconfigured => *state = State::Unconfigured,
        State::Running(running) => {
            running.token.cancel();
            if running.worker.join().is_err() {
                error!("Publisher thread panicked.");
            }
            debug!("Exporter closed.");
        }
        State::Stopped => {}
    }
}
