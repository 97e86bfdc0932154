//! Unbounded FIFO between the routing task and a host worker.
//!
//! Both ends are bounded channels with a capacity of one. The bridge task
//! sits in between and keeps everything the worker hasn't taken yet in a
//! [`VecDeque`], so the routing task never waits on a busy host.

use std::collections::VecDeque;

use tokio::sync::mpsc::{Receiver, Sender};

/// Move items from `input` to `output` in order, buffering as many as needed.
///
/// Once `input` is closed, the remaining items are flushed and `output` is
/// closed by dropping it. If the consumer goes away, buffered items are
/// discarded.
pub(crate) async fn run<T: Send>(mut input: Receiver<T>, output: Sender<T>) {
    let mut pending = VecDeque::new();

    loop {
        if pending.is_empty() {
            match input.recv().await {
                Some(item) => pending.push_back(item),
                None => break,
            }
            continue;
        }

        tokio::select! {
            item = input.recv() => match item {
                Some(item) => pending.push_back(item),
                None => break,
            },
            permit = output.reserve() => match permit {
                Ok(permit) => {
                    if let Some(item) = pending.pop_front() {
                        permit.send(item);
                    }
                }
                Err(_) => return,
            },
        }
    }

    for item in pending {
        if output.send(item).await.is_err() {
            return;
        }
    }
}
