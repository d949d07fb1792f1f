//! Signal handling for graceful daemon shutdown.
//!
//! SIGTERM and SIGINT raise the shared [`StopSignal`]; SIGHUP asks for a
//! status report. Handlers only touch atomics; a bridge thread forwards the
//! flags to the rest of the daemon.

use rearm_runtime::stop::StopSignal;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Signal types that the daemon handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// SIGTERM - Graceful termination request.
    Terminate,
    /// SIGINT - Interrupt (Ctrl+C).
    Interrupt,
    /// SIGHUP - Status report request.
    Hangup,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::Terminate => write!(f, "SIGTERM"),
            SignalKind::Interrupt => write!(f, "SIGINT"),
            SignalKind::Hangup => write!(f, "SIGHUP"),
        }
    }
}

/// Counters for signals seen by the bridge thread.
#[derive(Debug, Default)]
pub struct SignalStats {
    signal_count: AtomicU32,
    status_requests: AtomicU32,
}

impl SignalStats {
    fn record(&self, kind: SignalKind) {
        self.signal_count.fetch_add(1, Ordering::Relaxed);
        if kind == SignalKind::Hangup {
            self.status_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Total number of signals received.
    pub fn signal_count(&self) -> u32 {
        self.signal_count.load(Ordering::Relaxed)
    }

    /// Number of status reports requested.
    pub fn status_requests(&self) -> u32 {
        self.status_requests.load(Ordering::Relaxed)
    }
}

static TERMINATE_FLAG: AtomicBool = AtomicBool::new(false);
static INTERRUPT_FLAG: AtomicBool = AtomicBool::new(false);
static HANGUP_FLAG: AtomicBool = AtomicBool::new(false);

const BRIDGE_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Handle for signal management.
pub struct SignalHandler {
    stats: Arc<SignalStats>,
    bridge: JoinHandle<()>,
}

impl SignalHandler {
    /// Register signal handlers and start the bridge thread.
    ///
    /// `on_status` runs on the bridge thread for every SIGHUP. The bridge
    /// exits once `stop` is raised, whatever raised it.
    pub fn install<F>(stop: StopSignal, on_status: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let stats = Arc::new(SignalStats::default());
        let bridge_stats = Arc::clone(&stats);
        let bridge = std::thread::Builder::new()
            .name("rearm-signals".into())
            .spawn(move || {
                // Returns true once stopped, false after each poll interval
                while !stop.wait_timeout(BRIDGE_POLL_INTERVAL) {
                    for (flag, kind) in [
                        (&TERMINATE_FLAG, SignalKind::Terminate),
                        (&INTERRUPT_FLAG, SignalKind::Interrupt),
                    ] {
                        if flag.swap(false, Ordering::Relaxed) {
                            info!(signal = %kind, "Shutdown signal received");
                            bridge_stats.record(kind);
                            stop.request_stop();
                        }
                    }
                    if HANGUP_FLAG.swap(false, Ordering::Relaxed) {
                        bridge_stats.record(SignalKind::Hangup);
                        on_status();
                    }
                }
                debug!("Signal bridge thread stopped");
            })?;

        #[cfg(unix)]
        register_unix_handlers();

        Ok(Self { stats, bridge })
    }

    /// Signal counters.
    pub fn stats(&self) -> &SignalStats {
        &self.stats
    }

    /// Wait for the bridge thread to exit and return the final counters.
    ///
    /// The bridge only exits once the stop signal is raised.
    pub fn join(self) -> Arc<SignalStats> {
        if self.bridge.join().is_err() {
            warn!("Signal bridge thread panicked");
        }
        self.stats
    }
}

#[cfg(unix)]
fn register_unix_handlers() {
    use std::os::raw::c_int;

    extern "C" fn sigterm_handler(_: c_int) {
        TERMINATE_FLAG.store(true, Ordering::Relaxed);
    }

    extern "C" fn sigint_handler(_: c_int) {
        INTERRUPT_FLAG.store(true, Ordering::Relaxed);
    }

    extern "C" fn sighup_handler(_: c_int) {
        HANGUP_FLAG.store(true, Ordering::Relaxed);
    }

    // SAFETY: the handlers only store to static atomics, which is async-signal-safe
    unsafe {
        libc::signal(libc::SIGTERM, sigterm_handler as libc::sighandler_t);
        libc::signal(libc::SIGINT, sigint_handler as libc::sighandler_t);
        libc::signal(libc::SIGHUP, sighup_handler as libc::sighandler_t);
    }

    debug!("Unix signal handlers registered");
}
