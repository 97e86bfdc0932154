//! Shutdown state machine of a [`crate::Dispatcher`].
//!
//! ```text
//! Open ──close()──▶ Closing ──┐
//!   │                         ├──▶ Closed
//!   └───cancel()──▶ Cancelling┘
//! ```
//!
//! Every transition out of `Open` is a compare-and-swap, so exactly one
//! caller runs the shutdown sequence. Cancellation is a separate signal
//! which can also be raised while a graceful close is already draining.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio::sync::watch;

use super::waiter::WaitGroup;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum State {
    Open = 0,
    Cancelling = 1,
    Closing = 2,
    Closed = 3,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Open,
            1 => Self::Cancelling,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    state: AtomicU8,
    cancelled: watch::Sender<bool>,
    done: watch::Sender<bool>,
    waiter: Mutex<Option<WaitGroup>>,
}

impl Lifecycle {
    pub(crate) fn new(waiter: WaitGroup) -> Self {
        Self {
            state: AtomicU8::new(State::Open as u8),
            cancelled: watch::Sender::new(false),
            done: watch::Sender::new(false),
            waiter: Mutex::new(Some(waiter)),
        }
    }

    pub(crate) fn state(&self) -> State {
        State::from(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn is_open(&self) -> bool {
        self.state() == State::Open
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    /// Try to move from `Open` to `Closing`. Returns `true` for the one
    /// caller that has to run the shutdown sequence.
    pub(crate) fn begin_close(&self) -> bool {
        self.transition(State::Open, State::Closing)
    }

    /// Raise the cancellation signal, then try to move from `Open` to
    /// `Cancelling`. Returns `true` for the one caller that has to run the
    /// shutdown sequence.
    pub(crate) fn begin_cancel(&self) -> bool {
        self.cancelled.send_if_modified(|cancelled| !std::mem::replace(cancelled, true));
        self.transition(State::Open, State::Cancelling)
    }

    fn transition(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Hand out the wait group. Only the first caller gets it.
    pub(crate) fn take_waiter(&self) -> Option<WaitGroup> {
        self.waiter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Enter the terminal state and wake everyone blocked on completion.
    pub(crate) fn finish(&self) {
        self.state.store(State::Closed as u8, Ordering::Release);
        self.done.send_replace(true);
    }

    pub(crate) async fn wait_done(&self) {
        let mut done = self.done.subscribe();
        // The sender lives in `self`, so this only fails if `self` is gone
        let _ = done.wait_for(|done| *done).await;
    }

    pub(crate) fn cancel_signal(&self) -> CancelSignal {
        CancelSignal(self.cancelled.subscribe())
    }
}

/// Receiving side of the cancellation signal, held by every task that has
/// to abandon work on [`crate::Dispatcher::cancel`].
#[derive(Debug, Clone)]
pub(crate) struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub(crate) fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancellation has been requested.
    pub(crate) async fn cancelled(&mut self) {
        loop {
            if *self.0.borrow_and_update() {
                return;
            }
            if self.0.changed().await.is_err() {
                // Dispatcher is gone, nothing left to wait for
                return;
            }
        }
    }
}
