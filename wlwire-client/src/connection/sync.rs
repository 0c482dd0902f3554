//! One-shot result slots for sync callbacks
//!
//! A slot is registered under the callback's object id before the `sync`
//! request is written, resolved exactly once by the dispatcher when the
//! `done` event arrives, and cancelled if the connection closes first.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use wlwire_protocol::ObjectId;
use wlwire_utils::{Result, WlwireError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    Waiting,
    Done(u32),
    Cancelled,
}

/// Single-resolution result cell with a condition variable for waiters
#[derive(Debug)]
pub(crate) struct CallbackSlot {
    state: Mutex<SlotState>,
    ready: Condvar,
}

impl CallbackSlot {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(SlotState::Waiting),
            ready: Condvar::new(),
        }
    }

    /// Store the callback data. Later calls are ignored.
    pub(crate) fn resolve(&self, data: u32) {
        self.settle(SlotState::Done(data));
    }

    /// Wake waiters with a closed-connection error
    pub(crate) fn cancel(&self) {
        self.settle(SlotState::Cancelled);
    }

    fn settle(&self, outcome: SlotState) {
        let mut state = self.state.lock();
        if *state == SlotState::Waiting {
            *state = outcome;
            self.ready.notify_all();
        }
    }

    fn outcome(state: SlotState) -> Option<Result<u32>> {
        match state {
            SlotState::Waiting => None,
            SlotState::Done(data) => Some(Ok(data)),
            SlotState::Cancelled => Some(Err(WlwireError::ConnectionClosed)),
        }
    }
}

/// Handle to a pending `sync` request
///
/// Returned by `Connection::sync`. The server answers only after it has
/// processed every request sent before the sync, so observing the result
/// means all of those requests have taken effect.
#[derive(Debug, Clone)]
pub struct SyncCallback {
    id: ObjectId,
    slot: Arc<CallbackSlot>,
}

impl SyncCallback {
    pub(crate) fn new(id: ObjectId, slot: Arc<CallbackSlot>) -> Self {
        Self { id, slot }
    }

    /// Object id of the callback
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Check whether the callback has fired or been cancelled
    pub fn is_done(&self) -> bool {
        *self.slot.state.lock() != SlotState::Waiting
    }

    /// Result if already settled, without blocking
    pub fn try_result(&self) -> Option<Result<u32>> {
        CallbackSlot::outcome(*self.slot.state.lock())
    }

    /// Block until another thread's dispatch loop settles the callback
    pub fn wait(&self) -> Result<u32> {
        let mut state = self.slot.state.lock();
        while *state == SlotState::Waiting {
            self.slot.ready.wait(&mut state);
        }
        CallbackSlot::outcome(*state).unwrap_or(Err(WlwireError::ConnectionClosed))
    }

    /// Like [`wait`](Self::wait) with a deadline; `None` on timeout
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<u32>> {
        let mut state = self.slot.state.lock();
        if *state == SlotState::Waiting {
            self.slot.ready.wait_for(&mut state, timeout);
        }
        CallbackSlot::outcome(*state)
    }
}
