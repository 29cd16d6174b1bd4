//! # Component Lifecycle
//!
//! The clock oscillator, each chip's polling loop and the CPU's instruction
//! loop run on their own threads. Each loop is started through [`spawn`],
//! which hands the loop a [`RunFlag`] to check at the top of every iteration
//! and returns a [`ComponentHandle`] the assembler keeps to stop and join it.
//!
//! There is no mid-iteration preemption: a stop request is observed the next
//! time the loop checks its flag.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Cancellation flag owned by one running component.
#[derive(Debug, Clone)]
pub struct RunFlag(Arc<AtomicBool>);

impl RunFlag {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(true)))
    }

    /// True until the owning handle requests a stop.
    pub fn is_running(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Sleeps for `duration`, waking early once a stop is requested.
    ///
    /// Returns `false` if the sleep was cut short.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if !self.is_running() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(STOP_POLL));
        }
    }

    fn stop(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Longest stretch a [`RunFlag::sleep`] goes without checking the flag.
const STOP_POLL: Duration = Duration::from_millis(10);

/// Handle to a running component loop.
///
/// Dropping the handle stops the loop and waits for it to finish.
#[derive(Debug)]
pub struct ComponentHandle {
    name: String,
    flag: RunFlag,
    thread: Option<JoinHandle<()>>,
}

impl ComponentHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while the loop thread has not exited.
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Asks the loop to stop without waiting for it.
    pub fn request_stop(&self) {
        self.flag.stop();
    }

    /// Stops the loop and waits for its thread to exit.
    ///
    /// Returns `false` if the loop thread panicked.
    pub fn stop(mut self) -> bool {
        self.shutdown()
    }

    fn shutdown(&mut self) -> bool {
        self.flag.stop();
        match self.thread.take() {
            Some(thread) => thread.join().is_ok(),
            None => true,
        }
    }
}

impl Drop for ComponentHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Starts `body` on a named thread and returns its handle.
///
/// `body` receives the component's [`RunFlag`] and is expected to loop until
/// the flag clears.
pub fn spawn<F>(name: impl Into<String>, body: F) -> io::Result<ComponentHandle>
where
    F: FnOnce(RunFlag) + Send + 'static,
{
    let name = name.into();
    let flag = RunFlag::new();
    let loop_flag = flag.clone();
    let thread = thread::Builder::new()
        .name(name.clone())
        .spawn(move || body(loop_flag))?;

    Ok(ComponentHandle {
        name,
        flag,
        thread: Some(thread),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_stop_joins_loop() {
        let iterations = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&iterations);

        let handle = spawn("counter", move |flag| {
            while flag.is_running() {
                counter.fetch_add(1, Ordering::Relaxed);
                thread::sleep(Duration::from_millis(1));
            }
        })
        .unwrap();

        assert_eq!(handle.name(), "counter");
        thread::sleep(Duration::from_millis(20));
        assert!(handle.is_running());
        assert!(handle.stop());

        let after_stop = iterations.load(Ordering::Relaxed);
        assert!(after_stop > 0);
        thread::sleep(Duration::from_millis(10));
        assert_eq!(iterations.load(Ordering::Relaxed), after_stop);
    }

    #[test]
    fn test_drop_stops_loop() {
        let exited = Arc::new(AtomicBool::new(false));
        let marker = Arc::clone(&exited);
        {
            let _handle = spawn("dropper", move |flag| {
                while flag.is_running() {
                    thread::sleep(Duration::from_millis(1));
                }
                marker.store(true, Ordering::Release);
            })
            .unwrap();
        }
        assert!(exited.load(Ordering::Acquire));
    }

    #[test]
    fn test_sleep_wakes_on_stop() {
        let finished = Arc::new(AtomicBool::new(false));
        let marker = Arc::clone(&finished);
        let handle = spawn("sleeper", move |flag| {
            let completed = flag.sleep(Duration::from_secs(30));
            marker.store(!completed, Ordering::Release);
        })
        .unwrap();

        let started = Instant::now();
        thread::sleep(Duration::from_millis(5));
        assert!(handle.stop());
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(finished.load(Ordering::Acquire));
    }

    #[test]
    fn test_panicking_loop_reports_failure() {
        let handle = spawn("panicker", |_flag| panic!("boom")).unwrap();
        assert!(!handle.stop());
    }
}
