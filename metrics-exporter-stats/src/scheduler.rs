use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Instant,
};

use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use tracing::debug;

use crate::{publisher::Publisher, snapshot::Snapshotter};

const THREAD_NAME: &str = "metrics-exporter-stats-publisher";

struct TokenState {
    cancelled: AtomicBool,
    waker: Mutex<Option<Sender<()>>>,
}

/// A cooperative stop signal for a scheduler.
///
/// Cancelling sets a flag that the scheduler checks before every cycle, and disconnects a wake
/// channel so that a scheduler waiting for its next tick notices straight away. Cancelling more
/// than once, or from several threads at once, is a no-op.
#[derive(Clone)]
pub(crate) struct CancellationToken {
    state: Arc<TokenState>,
}

impl CancellationToken {
    /// Creates a new token, along with the wake channel the scheduler waits on.
    pub fn new() -> (Self, Receiver<()>) {
        let (tx, rx) = bounded(0);
        let token = CancellationToken {
            state: Arc::new(TokenState {
                cancelled: AtomicBool::new(false),
                waker: Mutex::new(Some(tx)),
            }),
        };
        (token, rx)
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);

        // Dropping the only sender disconnects the wake channel.
        drop(self.state.waker.lock().take());
    }

    /// Returns `true` if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }
}

/// Runs a publisher once per tick until cancelled.
///
/// Cycles run inline on the scheduler thread, so they can never overlap. Ticks that arrive while
/// a cycle is running are coalesced by the tick channel, which holds at most one pending tick.
pub(crate) struct Scheduler<S> {
    publisher: Publisher<S>,
    ticks: Receiver<Instant>,
    wake: Receiver<()>,
    token: CancellationToken,
}

impl<S> Scheduler<S>
where
    S: Snapshotter,
{
    /// Creates a new `Scheduler`, returning it along with the token that stops it.
    pub fn new(publisher: Publisher<S>, ticks: Receiver<Instant>) -> (Self, CancellationToken) {
        let (token, wake) = CancellationToken::new();
        let scheduler = Scheduler { publisher, ticks, wake, token: token.clone() };
        (scheduler, token)
    }

    /// Spawns the scheduler on a dedicated thread.
    pub fn spawn(self) -> io::Result<JoinHandle<()>> {
        thread::Builder::new().name(THREAD_NAME.to_string()).spawn(move || self.run())
    }

    /// Runs the scheduler on the current thread until cancelled, or until the tick source goes
    /// away.
    pub fn run(self) {
        debug!("Publisher started.");

        loop {
            select! {
                // Only ever disconnected, never sent to.
                recv(self.wake) -> _ => break,
                recv(self.ticks) -> tick => if tick.is_err() {
                    debug!("Tick source disconnected.");
                    break;
                },
            }

            if self.token.is_cancelled() {
                break;
            }

            self.publisher.write();
        }

        debug!("Publisher stopped.");
    }
}
