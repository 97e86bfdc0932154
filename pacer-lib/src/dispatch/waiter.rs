//! Facility to wait for a dynamic set of tasks to complete, with a single
//! waiter and multiple waitees. The routing task holds the first
//! [`WaitGuard`] and hands a clone to every host worker it spawns, so
//! host workers can come and go while shutdown still waits for all of them.
//!
//! The implementation is a wrapper around [`tokio::sync::mpsc::channel`].
//! A [`WaitGroup`] holds the unique receiver and each [`WaitGuard`] holds a
//! sender; the receiver observes the channel closing once the last guard is
//! dropped.

use futures::never::Never;
use tokio::sync::mpsc::{Receiver, Sender, channel};

/// Manager for a particular wait group.
///
/// Each [`WaitGroup`] is single-use: [`WaitGroup::wait`] consumes it.
#[derive(Debug)]
pub(crate) struct WaitGroup {
    /// The [`Never`] type means no value can/will ever be received through
    /// the channel.
    recv: Receiver<Never>,
}

/// RAII guard held by a task which is being waited for.
#[derive(Clone, Debug)]
pub(crate) struct WaitGuard {
    _send: Sender<Never>,
}

impl WaitGroup {
    /// Creates a new [`WaitGroup`] and its first associated [`WaitGuard`].
    ///
    /// New guards are created by cloning the returned [`WaitGuard`].
    #[must_use]
    pub(crate) fn new() -> (Self, WaitGuard) {
        let (send, recv) = channel(1);
        (Self { recv }, WaitGuard { _send: send })
    }

    /// Waits until all the associated [`WaitGuard`]s have been dropped.
    pub(crate) async fn wait(mut self) {
        let None = self.recv.recv().await;
    }
}
