//! Background monitor running a pass every poll interval.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::organizer::{Organizer, PassOutcome};

#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Starts the periodic sort loop.
pub struct Monitor;

impl Monitor {
    /// Spawns a thread that runs a pass, sleeps `interval`, and repeats
    /// until the returned handle is stopped or dropped.
    ///
    /// A tick that finds a manual pass or a revert in progress is skipped.
    pub fn start(organizer: Arc<Organizer>, interval: Duration) -> std::io::Result<MonitorHandle> {
        let signal = Arc::new(StopSignal::default());
        let thread_signal = Arc::clone(&signal);

        let thread = std::thread::Builder::new()
            .name("sortdesk-monitor".to_string())
            .spawn(move || monitor_loop(&organizer, &thread_signal, interval))?;

        tracing::info!(interval_secs = interval.as_secs(), "monitoring started");
        Ok(MonitorHandle {
            signal,
            thread: Some(thread),
        })
    }
}

fn monitor_loop(organizer: &Organizer, signal: &StopSignal, interval: Duration) {
    loop {
        match organizer.try_run_pass() {
            Ok(PassOutcome::Completed(report)) if report.moved() > 0 => {
                tracing::info!(moved = report.moved(), "scheduled pass moved items");
            }
            Ok(PassOutcome::Completed(_)) => {}
            Ok(PassOutcome::Busy) => tracing::debug!("scheduled pass skipped, busy"),
            Err(e) => tracing::error!(error = %e, "scheduled pass failed"),
        }

        let deadline = Instant::now() + interval;
        let mut stopped = signal.stopped.lock();
        while !*stopped {
            if signal.wake.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        if *stopped {
            break;
        }
    }
    tracing::info!("monitoring stopped");
}

/// Handle to a running monitor. Stops the loop when dropped.
pub struct MonitorHandle {
    signal: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    /// Stops the loop at its next sleep and waits for an in-flight pass to
    /// finish.
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn shutdown(&mut self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::error!("monitor thread panicked");
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
