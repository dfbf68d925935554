//! Growth policy and the single-flight resize worker.
//!
//! A put that finds the map over its load factor calls
//! [`Resizer::request`]. At most one resize runs at a time: the request
//! claims an in-flight flag with a compare-exchange, and every request made
//! while the flag is held is dropped. The claimed resize then runs either on
//! a dedicated worker thread ([`ResizeMode::Background`]) or on the calling
//! thread ([`ResizeMode::Inline`]).
//!
//! ```text
//!   put ──► over load factor? ──► CAS in_flight false→true
//!                                   │ lost: drop request
//!                                   ▼ won
//!                     Background: spawn "lockweave-resize"
//!                                 holding Weak<target>
//!                     Inline:     grow on caller
//!                                   │
//!                                   ▼
//!                        grow() under map write lock
//!                        in_flight ← false (on exit, even on panic)
//! ```
//!
//! The worker keeps only a `Weak` reference, so it never extends the life of
//! the map, and its `JoinHandle` is retained so callers (and `Drop`) can wait
//! for it.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};

use log::{debug, warn};
use parking_lot::Mutex;

/// Average chain length that triggers growth.
pub const DEFAULT_LOAD_FACTOR: usize = 5;

/// Name given to background resize threads.
pub const RESIZE_THREAD_NAME: &str = "lockweave-resize";

/// Where a triggered resize runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResizeMode {
    /// A dedicated worker thread performs the resize; the triggering put
    /// returns immediately.
    #[default]
    Background,
    /// The triggering put performs the resize itself before touching its
    /// bucket.
    Inline,
}

/// Returns the next bucket count for a table of `capacity` buckets.
///
/// Doubles small tables and tapers off for larger ones. Always strictly
/// larger than `capacity`.
pub fn grown_capacity(capacity: usize) -> usize {
    let grown = match capacity {
        0..=255 => capacity.saturating_mul(2),
        256..=511 => percent_of(capacity, 163),
        512..=1023 => percent_of(capacity, 144),
        1024..=2047 => percent_of(capacity, 135),
        _ => percent_of(capacity, 130),
    };
    grown.max(capacity.saturating_add(1))
}

/// `value * percent / 100`, rounded down, without intermediate overflow.
fn percent_of(value: usize, percent: usize) -> usize {
    (value / 100)
        .saturating_mul(percent)
        .saturating_add(value % 100 * percent / 100)
}

/// Clears the in-flight flag when the resize it guards finishes.
struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Single-flight launcher for resizes.
#[derive(Debug)]
pub struct Resizer {
    mode: ResizeMode,
    in_flight: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Resizer {
    pub fn new(mode: ResizeMode) -> Self {
        Self {
            mode,
            in_flight: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
        }
    }

    pub fn mode(&self) -> ResizeMode {
        self.mode
    }

    /// Returns `true` while a claimed resize has not finished.
    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Runs `grow(target)` unless a resize is already in flight.
    ///
    /// In background mode this returns as soon as the worker is spawned. If
    /// the worker cannot be spawned the resize runs on the caller instead.
    pub fn request<T>(&self, target: &Arc<T>, grow: fn(&T))
    where
        T: Send + Sync + 'static,
    {
        self.request_with(target, grow, |job| {
            thread::Builder::new()
                .name(RESIZE_THREAD_NAME.to_string())
                .spawn(job)
        });
    }

    fn request_with<T, F>(&self, target: &Arc<T>, grow: fn(&T), spawn: F)
    where
        T: Send + Sync + 'static,
        F: FnOnce(Box<dyn FnOnce() + Send>) -> io::Result<JoinHandle<()>>,
    {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("resize already in flight, dropping request");
            return;
        }

        match self.mode {
            ResizeMode::Inline => {
                let _guard = InFlight(Arc::clone(&self.in_flight));
                grow(target);
            },
            ResizeMode::Background => {
                let mut worker = self.worker.lock();
                // the previous worker has already released the flag
                if let Some(finished) = worker.take() {
                    Self::reap(finished);
                }
                let weak: Weak<T> = Arc::downgrade(target);
                let in_flight = Arc::clone(&self.in_flight);
                // armed inside the job so a failed spawn leaves the flag claimed
                let job: Box<dyn FnOnce() + Send> = Box::new(move || {
                    let _guard = InFlight(in_flight);
                    if let Some(target) = weak.upgrade() {
                        grow(&target);
                    }
                });
                match spawn(job) {
                    Ok(handle) => *worker = Some(handle),
                    Err(err) => {
                        warn!("failed to spawn resize worker ({err}), resizing inline");
                        drop(worker);
                        let _guard = InFlight(Arc::clone(&self.in_flight));
                        grow(target);
                    },
                }
            },
        }
    }

    /// Blocks until the most recently spawned worker has finished.
    pub fn wait(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            Self::reap(handle);
        }
    }

    fn reap(handle: JoinHandle<()>) {
        if handle.join().is_err() {
            warn!("resize worker panicked");
        }
    }
}

impl Drop for Resizer {
    fn drop(&mut self) {
        if let Some(handle) = self.worker.get_mut().take() {
            Self::reap(handle);
        }
    }
}
