//! Cancelable deferred actions, one live action per key.
//!
//! Each text field runs two lanes: a short one for network detection and a
//! longer one for validation while typing. Scheduling on a lane cancels
//! whatever was pending there, so an action only runs once the user has
//! paused for the full delay.
//!
//! Every schedule returns a fresh [`DebounceToken`]. A woken task checks that
//! its token is still the current one for its key before running, so an
//! action replaced while its timer was already firing never runs.
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use checkout_fields::debounce::Debouncer;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let debouncer = Debouncer::new(tokio::runtime::Handle::current());
//! let runs = Arc::new(AtomicUsize::new(0));
//!
//! for _ in 0..3 {
//!     let runs = runs.clone();
//!     debouncer.schedule("validate", Duration::from_millis(20), move || {
//!         runs.fetch_add(1, Ordering::SeqCst);
//!     });
//! }
//!
//! tokio::time::sleep(Duration::from_millis(60)).await;
//! assert_eq!(runs.load(Ordering::SeqCst), 1);
//! # }
//! ```

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::trace;

/// Identifies the most recently scheduled action under a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DebounceToken(u64);

struct Pending {
    token: DebounceToken,
    task: JoinHandle<()>,
}

type Lanes<K> = Arc<Mutex<HashMap<K, Pending>>>;

fn lock<K>(lanes: &Mutex<HashMap<K, Pending>>) -> MutexGuard<'_, HashMap<K, Pending>> {
    lanes.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Schedules deferred actions on a tokio runtime, keyed by lane.
///
/// Dropping the debouncer cancels everything still pending.
pub struct Debouncer<K> {
    handle: Handle,
    lanes: Lanes<K>,
    next_token: AtomicU64,
}

impl<K> Debouncer<K>
where
    K: Eq + Hash + Clone + fmt::Debug + Send + 'static,
{
    /// Creates a debouncer that spawns its timers on `handle`.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            lanes: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
        }
    }

    /// Runs `action` after `delay` unless `key` is rescheduled or cancelled first.
    ///
    /// Any action pending under `key` is cancelled.
    pub fn schedule<F>(&self, key: K, delay: Duration, action: F) -> DebounceToken
    where
        F: FnOnce() + Send + 'static,
    {
        let token = DebounceToken(self.next_token.fetch_add(1, Ordering::Relaxed));
        let mut lanes = lock(&self.lanes);

        let shared = Arc::clone(&self.lanes);
        let task_key = key.clone();
        let task = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut lanes = lock(&shared);
                match lanes.get(&task_key) {
                    Some(pending) if pending.token == token => {
                        lanes.remove(&task_key);
                        true
                    }
                    _ => false,
                }
            };
            if current {
                trace!(lane = ?task_key, "debounced action firing");
                action();
            }
        });

        trace!(lane = ?key, delay_ms = crate::settings::saturating_millis(delay), "debounced action scheduled");
        if let Some(previous) = lanes.insert(key, Pending { token, task }) {
            previous.task.abort();
        }
        token
    }

    /// Cancels the action pending under `key`. Returns whether one was pending.
    pub fn cancel(&self, key: &K) -> bool {
        match lock(&self.lanes).remove(key) {
            Some(pending) => {
                pending.task.abort();
                trace!(lane = ?key, "debounced action cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancels every pending action.
    pub fn cancel_all(&self) {
        for (_, pending) in lock(&self.lanes).drain() {
            pending.task.abort();
        }
    }

    /// Token of the action pending under `key`.
    pub fn pending_token(&self, key: &K) -> Option<DebounceToken> {
        lock(&self.lanes).get(key).map(|pending| pending.token)
    }

    /// True if an action is pending under `key`.
    pub fn is_pending(&self, key: &K) -> bool {
        self.pending_token(key).is_some()
    }
}

impl<K> fmt::Debug for Debouncer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debouncer")
            .field("pending", &lock(&self.lanes).len())
            .finish()
    }
}

impl<K> Drop for Debouncer<K> {
    fn drop(&mut self) {
        for (_, pending) in lock(&self.lanes).drain() {
            pending.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::sleep;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(usize) -> Box<dyn FnOnce() + Send>) {
        let count = Arc::new(AtomicUsize::new(0));
        let sink = count.clone();
        let make = move |n: usize| {
            let sink = sink.clone();
            Box::new(move || {
                sink.fetch_add(n, Ordering::SeqCst);
            }) as Box<dyn FnOnce() + Send>
        };
        (count, make)
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_runs_after_delay() {
        let debouncer = Debouncer::new(Handle::current());
        let (count, make) = counter();
        debouncer.schedule("lane", Duration::from_millis(300), make(1));

        sleep(Duration::from_millis(299)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(debouncer.is_pending(&"lane"));

        sleep(Duration::from_millis(2)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending(&"lane"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reschedule_replaces_pending_action() {
        let debouncer = Debouncer::new(Handle::current());
        let (count, make) = counter();
        let first = debouncer.schedule("lane", Duration::from_millis(300), make(1));
        sleep(Duration::from_millis(200)).await;
        let second = debouncer.schedule("lane", Duration::from_millis(300), make(10));
        assert_ne!(first, second);
        assert_eq!(debouncer.pending_token(&"lane"), Some(second));

        sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lanes_are_independent() {
        let debouncer = Debouncer::new(Handle::current());
        let (count, make) = counter();
        debouncer.schedule("network", Duration::from_millis(300), make(1));
        debouncer.schedule("validation", Duration::from_millis(1500), make(100));

        sleep(Duration::from_millis(400)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        sleep(Duration::from_millis(1200)).await;
        assert_eq!(count.load(Ordering::SeqCst), 101);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel() {
        let debouncer = Debouncer::new(Handle::current());
        let (count, make) = counter();
        debouncer.schedule("lane", Duration::from_millis(300), make(1));
        assert!(debouncer.cancel(&"lane"));
        assert!(!debouncer.cancel(&"lane"));

        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_everything() {
        let (count, make) = counter();
        {
            let debouncer = Debouncer::new(Handle::current());
            debouncer.schedule("a", Duration::from_millis(100), make(1));
            debouncer.schedule("b", Duration::from_millis(100), make(1));
        }
        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_all() {
        let debouncer = Debouncer::new(Handle::current());
        let (count, make) = counter();
        debouncer.schedule("a", Duration::from_millis(100), make(1));
        debouncer.schedule("b", Duration::from_millis(100), make(1));
        debouncer.cancel_all();
        sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert!(!debouncer.is_pending(&"a"));
    }
}
