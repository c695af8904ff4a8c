//! One-shot completion signal.
//!
//! Joins an asynchronous finalize callback with the thread that requested
//! finalization. The notifier and the waiter are both consumed on use, so the
//! signal fires at most once and is observed at most once.

use tokio::sync::oneshot;

use crate::error::{GazerError, GazerResult};

/// Sending half, moved into the completion callback.
#[derive(Debug)]
pub struct CompletionNotifier {
    tx: oneshot::Sender<()>,
}

/// Receiving half, kept by the thread that blocks on completion.
#[derive(Debug)]
pub struct CompletionWaiter {
    rx: oneshot::Receiver<()>,
}

/// Create a connected notifier/waiter pair.
pub fn completion_signal() -> (CompletionNotifier, CompletionWaiter) {
    let (tx, rx) = oneshot::channel();
    (CompletionNotifier { tx }, CompletionWaiter { rx })
}

impl CompletionNotifier {
    /// Fire the signal. Safe to call from any thread.
    pub fn notify(self) {
        // The waiter may already be gone if the requester gave up; nothing to do then.
        let _ = self.tx.send(());
    }
}

impl CompletionWaiter {
    /// Block the calling thread until the notifier fires.
    ///
    /// There is no timeout. Returns an error if the notifier is dropped
    /// without firing. Must not be called from inside an async runtime.
    pub fn wait(self) -> GazerResult<()> {
        self.rx
            .blocking_recv()
            .map_err(|_| GazerError::recording("Completion callback dropped without signalling"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn wait_returns_after_notify_from_other_thread() {
        let (notifier, waiter) = completion_signal();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            notifier.notify();
        });
        waiter.wait().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn dropped_notifier_unblocks_with_error() {
        let (notifier, waiter) = completion_signal();
        drop(notifier);
        assert!(matches!(waiter.wait(), Err(GazerError::Recording { .. })));
    }

    #[test]
    fn notify_after_waiter_dropped_is_harmless() {
        let (notifier, waiter) = completion_signal();
        drop(waiter);
        notifier.notify();
    }
}
