//! Activation watchdog
//!
//! One background thread waits for the activation deadline. If by then
//! neither command nor cwd detection has been registered, shell integration
//! most likely failed to load and a timeout is reported.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::capabilities::{CapabilityKind, RegisteredCapabilities};
use crate::telemetry::{TelemetryEvent, TelemetrySink};

#[derive(Default)]
struct Signal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

/// One-shot activation timer
pub struct ActivationWatchdog {
    signal: Arc<Signal>,
    fired: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl ActivationWatchdog {
    /// Start the timer
    ///
    /// `telemetry_latched` is set when the deadline passes, whatever the
    /// outcome, so activation success is only reported before it. Nothing is
    /// reported when it was already set.
    pub fn arm(
        timeout: Duration,
        registered: RegisteredCapabilities,
        telemetry: Arc<dyn TelemetrySink>,
        telemetry_latched: Arc<AtomicBool>,
    ) -> Self {
        let signal = Arc::new(Signal::default());
        let fired = Arc::new(AtomicBool::new(false));
        let deadline = Instant::now() + timeout;

        let thread_signal = Arc::clone(&signal);
        let thread_fired = Arc::clone(&fired);
        let spawned = std::thread::Builder::new()
            .name("shell-integration-watchdog".to_string())
            .spawn(move || {
                {
                    let mut cancelled = thread_signal.cancelled.lock();
                    while !*cancelled {
                        if thread_signal
                            .condvar
                            .wait_until(&mut cancelled, deadline)
                            .timed_out()
                        {
                            break;
                        }
                    }
                    if *cancelled {
                        return;
                    }
                }

                // Activation success was already reported
                if telemetry_latched.swap(true, Ordering::SeqCst) {
                    return;
                }
                if !registered.contains(CapabilityKind::CommandDetection)
                    && !registered.contains(CapabilityKind::CwdDetection)
                {
                    thread_fired.store(true, Ordering::SeqCst);
                    telemetry.public_log(TelemetryEvent::ActivationTimeout);
                    tracing::warn!(
                        target: "shell_integration::watchdog",
                        timeout_ms = timeout.as_millis() as u64,
                        "{}",
                        timeout_message(timeout)
                    );
                }
            });

        let thread = match spawned {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::warn!(
                    target: "shell_integration::watchdog",
                    error = %err,
                    "failed to spawn activation watchdog"
                );
                None
            }
        };

        Self {
            signal,
            fired,
            thread,
        }
    }

    /// Whether the timer is still pending
    pub fn is_armed(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Whether the timeout was reported
    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::SeqCst)
    }

    /// Stop the timer; safe to call repeatedly
    pub fn cancel(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        *self.signal.cancelled.lock() = true;
        self.signal.condvar.notify_all();
        if thread.join().is_err() {
            tracing::warn!(
                target: "shell_integration::watchdog",
                "activation watchdog panicked"
            );
        }
    }
}

impl Drop for ActivationWatchdog {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for ActivationWatchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationWatchdog")
            .field("armed", &self.is_armed())
            .field("fired", &self.has_fired())
            .finish()
    }
}

fn timeout_message(timeout: Duration) -> String {
    format!("Shell integration failed to add capabilities within {timeout:?}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::{CapabilityLimits, CapabilityStore};
    use crate::event::EventQueue;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<TelemetryEvent>>,
    }

    impl TelemetrySink for RecordingSink {
        fn public_log(&self, event: TelemetryEvent) {
            self.events.lock().push(event);
        }
    }

    fn wait_for(mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !condition() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_fires_when_nothing_registered() {
        let sink = Arc::new(RecordingSink::default());
        let latched = Arc::new(AtomicBool::new(false));
        let watchdog = ActivationWatchdog::arm(
            Duration::from_millis(10),
            RegisteredCapabilities::default(),
            sink.clone(),
            latched.clone(),
        );

        wait_for(|| !sink.events.lock().is_empty());
        assert!(watchdog.has_fired());
        assert!(latched.load(Ordering::SeqCst));
        assert_eq!(
            *sink.events.lock(),
            vec![TelemetryEvent::ActivationTimeout]
        );
    }

    #[test]
    fn test_silent_when_cwd_detection_registered() {
        let mut store = CapabilityStore::new(EventQueue::new(), CapabilityLimits::default());
        store.get_or_create_cwd_detection();

        let sink = Arc::new(RecordingSink::default());
        let latched = Arc::new(AtomicBool::new(false));
        let watchdog = ActivationWatchdog::arm(
            Duration::from_millis(10),
            store.registered(),
            sink.clone(),
            latched.clone(),
        );

        wait_for(|| latched.load(Ordering::SeqCst));
        assert!(latched.load(Ordering::SeqCst));
        assert!(!watchdog.has_fired());
        assert!(sink.events.lock().is_empty());
    }

    #[test]
    fn test_silent_after_success_was_reported() {
        let sink = Arc::new(RecordingSink::default());
        let latched = Arc::new(AtomicBool::new(true));
        let mut watchdog = ActivationWatchdog::arm(
            Duration::from_millis(10),
            RegisteredCapabilities::default(),
            sink.clone(),
            latched,
        );

        wait_for(|| !watchdog.is_armed());
        watchdog.cancel();
        assert!(!watchdog.has_fired());
        assert!(sink.events.lock().is_empty());
    }

    #[test]
    fn test_cancel_prevents_firing() {
        let sink = Arc::new(RecordingSink::default());
        let latched = Arc::new(AtomicBool::new(false));
        let mut watchdog = ActivationWatchdog::arm(
            Duration::from_secs(60),
            RegisteredCapabilities::default(),
            sink.clone(),
            latched.clone(),
        );
        assert!(watchdog.is_armed());

        watchdog.cancel();
        watchdog.cancel();
        assert!(!watchdog.is_armed());
        assert!(!latched.load(Ordering::SeqCst));
        assert!(sink.events.lock().is_empty());
    }

    #[test]
    fn test_drop_cancels() {
        let sink = Arc::new(RecordingSink::default());
        let latched = Arc::new(AtomicBool::new(false));
        drop(ActivationWatchdog::arm(
            Duration::from_secs(60),
            RegisteredCapabilities::default(),
            sink.clone(),
            latched.clone(),
        ));
        assert!(sink.events.lock().is_empty());
        assert!(!latched.load(Ordering::SeqCst));
    }

    #[test]
    fn test_timeout_message_keeps_subsecond_precision() {
        assert!(timeout_message(Duration::from_millis(250)).ends_with("within 250ms"));
        assert!(timeout_message(Duration::from_secs(10)).ends_with("within 10s"));
    }
}
