//! Host runtime boundary
//!
//! Driver callbacks run on threads owned by cpal and midir. The host that
//! consumes them serializes its own execution behind a global lock (the
//! GIL for Python). This module holds the pieces both adapters share:
//!
//! - `ExecutionLock`: how to enter the host's execution context
//! - `CallbackSlot`: the host callback, written by the host thread and
//!   read by the driver thread
//! - `deliver`: runs one host callback under the lock and contains any
//!   error or panic it produces

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::error::CallbackError;

/// The host runtime's global execution lock.
///
/// `run_locked` must not return until `f` has run with the lock held.
pub trait ExecutionLock: Send + Sync + 'static {
    fn run_locked(&self, f: &mut dyn FnMut());
}

/// Process-wide lock for native (non-Python) hosts.
///
/// Every `GlobalLock` shares the same mutex, so callbacks from the audio
/// and MIDI threads never run concurrently with each other.
#[derive(Debug, Default, Clone, Copy)]
pub struct GlobalLock;

static HOST_LOCK: Mutex<()> = Mutex::new(());

impl ExecutionLock for GlobalLock {
    fn run_locked(&self, f: &mut dyn FnMut()) {
        let _guard = HOST_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        f();
    }
}

/// Slot holding the current host callback.
///
/// `get` clones the `Arc` and drops the read lock before returning, so the
/// callback itself never runs while the slot is locked and a replacement
/// never waits on a running callback.
pub struct CallbackSlot<F: ?Sized> {
    inner: RwLock<Option<Arc<F>>>,
}

impl<F: ?Sized> CallbackSlot<F> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(None),
        }
    }

    /// Install a callback, replacing any previous one.
    pub fn set(&self, callback: Arc<F>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn get(&self) -> Option<Arc<F>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl<F: ?Sized> Default for CallbackSlot<F> {
    fn default() -> Self {
        Self::new()
    }
}

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// The host callback ran and returned normally.
    Delivered,
    /// The gate closed before the lock was acquired.
    Skipped,
    /// The host callback returned an error; it was logged.
    Raised(String),
    /// The host callback panicked; it was logged.
    Panicked(String),
}

/// Run `invoke` under the host lock, containing errors and panics.
///
/// `gate` is re-checked once the lock is held: an adapter that is being
/// stopped clears it first, so nothing is delivered after stop returns.
/// `source` names the driver thread in the diagnostic ("audio", "MIDI").
pub fn deliver<F>(lock: &dyn ExecutionLock, gate: &AtomicBool, source: &str, invoke: F) -> Delivery
where
    F: FnOnce() -> Result<(), CallbackError>,
{
    let mut invoke = Some(invoke);
    let mut outcome = Delivery::Skipped;

    lock.run_locked(&mut || {
        if !gate.load(Ordering::Acquire) {
            return;
        }
        let Some(invoke) = invoke.take() else {
            return;
        };
        outcome = match panic::catch_unwind(AssertUnwindSafe(invoke)) {
            Ok(Ok(())) => Delivery::Delivered,
            Ok(Err(err)) => {
                log::error!("Host callback exception in {} thread: {}", source, err);
                Delivery::Raised(err.to_string())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Host callback panicked in {} thread: {}", source, message);
                Delivery::Panicked(message)
            }
        };
    });

    outcome
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
