//! One-shot futures for navigation requests
//!
//! The navigator keeps a [`MasterNavRequest`] per request and publishes the
//! result into it exactly once. Callers hold a [`NavRequest`] view, which can
//! poll the state without locking or block until the request finishes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::status::{NavFailure, NavRequestState};

#[derive(Debug)]
struct Slot<T> {
    state: NavRequestState,
    data: Option<T>,
    failure: Option<NavFailure>,
}

#[derive(Debug)]
struct Shared<T> {
    finished: AtomicBool,
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> Shared<T> {
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Owning side of a navigation request.
#[derive(Debug)]
pub struct MasterNavRequest<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Default for MasterNavRequest<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> MasterNavRequest<T> {
    /// Creates a request in the `Processing` state.
    pub fn new() -> Self {
        Self::from_slot(NavRequestState::Processing, None)
    }

    /// Creates a request already in `state`.
    pub fn with_state(state: NavRequestState) -> Self {
        Self::from_slot(state, None)
    }

    /// Creates a request already in `state` and holding `data`.
    pub fn with_state_and_data(state: NavRequestState, data: T) -> Self {
        Self::from_slot(state, Some(data))
    }

    fn from_slot(state: NavRequestState, data: Option<T>) -> Self {
        Self {
            shared: Arc::new(Shared {
                finished: AtomicBool::new(state.is_finished()),
                slot: Mutex::new(Slot {
                    state,
                    data,
                    failure: None,
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// Publishes a state and payload.
    ///
    /// Ignored once the request has finished. Returns true if applied.
    pub fn set(&self, state: NavRequestState, data: Option<T>) -> bool {
        self.publish(state, data, None)
    }

    /// Publishes a state, keeping any payload. Ignored once finished.
    pub fn set_state(&self, state: NavRequestState) -> bool {
        let mut slot = self.shared.lock();
        if slot.state.is_finished() {
            return false;
        }
        slot.state = state;
        self.finish_locked(slot, state);
        true
    }

    /// Finishes the request as `Complete` with `data`.
    pub fn complete(&self, data: T) -> bool {
        self.publish(NavRequestState::Complete, Some(data), None)
    }

    /// Finishes the request as `Failed` for `reason`.
    pub fn fail(&self, reason: NavFailure) -> bool {
        self.publish(NavRequestState::Failed, None, Some(reason))
    }

    fn publish(&self, state: NavRequestState, data: Option<T>, failure: Option<NavFailure>) -> bool {
        let mut slot = self.shared.lock();
        if slot.state.is_finished() {
            return false;
        }
        slot.state = state;
        slot.data = data;
        slot.failure = failure;
        self.finish_locked(slot, state);
        true
    }

    fn finish_locked(&self, slot: MutexGuard<'_, Slot<T>>, state: NavRequestState) {
        if state.is_finished() {
            self.shared.finished.store(true, Ordering::Release);
            drop(slot);
            self.shared.ready.notify_all();
        }
    }

    pub fn state(&self) -> NavRequestState {
        self.shared.lock().state
    }

    /// Lock-free finished check.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// A second owning handle on the same request.
    pub(crate) fn share(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }

    /// A caller-side view of this request.
    pub fn request(&self) -> NavRequest<T> {
        NavRequest {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Caller-side view of a navigation request.
#[derive(Debug)]
pub struct NavRequest<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for NavRequest<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> NavRequest<T> {
    pub fn state(&self) -> NavRequestState {
        self.shared.lock().state
    }

    /// Lock-free finished check.
    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    /// Reason for a `Failed` state, if one was recorded.
    pub fn failure(&self) -> Option<NavFailure> {
        self.shared.lock().failure
    }

    /// Blocks until the request finishes and returns its final state.
    pub fn wait(&self) -> NavRequestState {
        let mut slot = self.shared.lock();
        while !slot.state.is_finished() {
            slot = self
                .shared
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
        slot.state
    }

    /// Blocks until the request finishes or `timeout` elapses.
    pub fn wait_timeout(&self, timeout: Duration) -> NavRequestState {
        let slot = self.shared.lock();
        let (slot, _) = self
            .shared
            .ready
            .wait_timeout_while(slot, timeout, |s| !s.state.is_finished())
            .unwrap_or_else(PoisonError::into_inner);
        slot.state
    }

    /// True if both views belong to the same request.
    pub(crate) fn same_request(&self, other: &MasterNavRequest<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl<T: Clone> NavRequest<T> {
    /// The payload, once published.
    pub fn data(&self) -> Option<T> {
        self.shared.lock().data.clone()
    }
}
