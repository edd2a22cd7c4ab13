//! Optional background driver for effect processing.
//!
//! Hosts with their own event loop call [`flush_effects`](crate::flush_effects)
//! at their tick boundary and never need this module. Hosts without one can
//! spawn an [`EffectLoop`]: a background thread that wakes on notifications,
//! debounces bursts, and flushes.
//!
//! When no notifications arrive the loop blocks on its channel and consumes
//! no CPU.

use std::sync::OnceLock;
use std::sync::mpsc::{self, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::effect::flush_effects;

/// Global sender wired up when an [`EffectLoop`] is spawned. Before that,
/// notifications are no-ops.
static LOOP_NOTIFIER: OnceLock<Sender<()>> = OnceLock::new();

/// Wake the background loop, if one is running. Non-blocking.
pub(crate) fn notify_effect_loop() {
    if let Some(sender) = LOOP_NOTIFIER.get() {
        // A send error means the loop has exited; nothing to wake.
        let _ = sender.send(());
    }
}

/// Default debounce delay: a burst of notifications within this window is
/// flushed once.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(4);

/// Default upper bound on debouncing; under constant notification pressure a
/// flush still happens at least this often.
pub const DEFAULT_MAX_DEBOUNCE: Duration = Duration::from_millis(16);

/// Builder for the background flush loop.
///
/// # Usage
/// ```ignore
/// // Default configuration
/// EffectLoop::new().spawn();
///
/// // Custom configuration
/// EffectLoop::new()
///     .debounce(Duration::from_millis(2))
///     .max_debounce(Duration::from_millis(8))
///     .spawn_fn(|f| {
///         std::thread::Builder::new()
///             .name("url-sync".into())
///             .spawn(f)
///             .unwrap()
///     })
///     .spawn();
/// ```
#[allow(clippy::type_complexity)]
pub struct EffectLoop {
    debounce: Duration,
    max_debounce: Duration,
    spawn_fn: Option<Box<dyn FnOnce(Box<dyn FnOnce() + Send>) -> JoinHandle<()> + Send>>,
}

impl Default for EffectLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EffectLoop {
    /// New builder with [`DEFAULT_DEBOUNCE`] / [`DEFAULT_MAX_DEBOUNCE`] and
    /// `std::thread::spawn`.
    pub fn new() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_debounce: DEFAULT_MAX_DEBOUNCE,
            spawn_fn: None,
        }
    }

    /// Set the debounce delay. Each new notification resets the timer, up to
    /// [`max_debounce`](Self::max_debounce).
    pub fn debounce(mut self, duration: Duration) -> Self {
        self.debounce = duration;
        self
    }

    /// Set the maximum time a flush may be deferred under constant
    /// notification pressure.
    pub fn max_debounce(mut self, duration: Duration) -> Self {
        self.max_debounce = duration;
        self
    }

    /// Use a custom thread spawner (to set a name, stack size, priority).
    pub fn spawn_fn<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Box<dyn FnOnce() + Send>) -> JoinHandle<()> + Send + 'static,
    {
        self.spawn_fn = Some(Box::new(f));
        self
    }

    /// Spawn the loop thread and return its handle.
    ///
    /// The loop blocks until notified, debounces further notifications, then
    /// calls [`flush_effects`](crate::flush_effects) and goes back to sleep.
    pub fn spawn(self) -> JoinHandle<()> {
        let (tx, rx) = mpsc::channel::<()>();
        let _ = LOOP_NOTIFIER.set(tx);

        let debounce = self.debounce;
        let max_debounce = self.max_debounce;
        let loop_fn: Box<dyn FnOnce() + Send> = Box::new(move || {
            effect_loop(rx, debounce, max_debounce);
        });

        match self.spawn_fn {
            Some(spawn_fn) => spawn_fn(loop_fn),
            None => thread::spawn(loop_fn),
        }
    }
}

fn effect_loop(rx: mpsc::Receiver<()>, debounce: Duration, max_debounce: Duration) {
    loop {
        // Block until the first notification.
        if rx.recv().is_err() {
            break;
        }

        // Debounce: keep absorbing notifications, resetting the timer each
        // time, bounded by max_debounce.
        let start = Instant::now();
        loop {
            if start.elapsed() >= max_debounce {
                break;
            }
            let remaining = max_debounce.saturating_sub(start.elapsed());
            match rx.recv_timeout(debounce.min(remaining)) {
                Ok(()) => {}
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }

        // Drain stragglers that arrived during the debounce window.
        loop {
            match rx.try_recv() {
                Ok(()) => {}
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        flush_effects();
    }
}
