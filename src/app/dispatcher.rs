// logsieve - app/dispatcher.rs
//
// Marshalling of mutations onto the presentation context.
//
// Every change to an observable collection that a view is bound to goes
// through `Dispatcher::invoke`. Headless use runs actions inline; a
// front-end with its own event loop uses `QueuedDispatcher` and drains the
// queue once per frame with `DispatchQueue::pump`.

use std::sync::mpsc;

/// Work item marshalled onto the presentation context.
pub type Action = Box<dyn FnOnce() + Send + 'static>;

/// Runs actions on the context that owns the presentation state.
pub trait Dispatcher: Send + Sync {
    fn invoke(&self, action: Action);
}

/// Runs every action immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatcher;

impl Dispatcher for InlineDispatcher {
    fn invoke(&self, action: Action) {
        action();
    }
}

/// Posts actions to a FIFO queue drained by [`DispatchQueue::pump`].
/// Relies on `mpsc::Sender: Sync` (Rust 1.72+).
#[derive(Debug, Clone)]
pub struct QueuedDispatcher {
    tx: mpsc::Sender<Action>,
}

/// Receiving end owned by the presentation thread.
pub struct DispatchQueue {
    rx: mpsc::Receiver<Action>,
}

impl QueuedDispatcher {
    pub fn new() -> (Self, DispatchQueue) {
        let (tx, rx) = mpsc::channel();
        (Self { tx }, DispatchQueue { rx })
    }
}

impl Dispatcher for QueuedDispatcher {
    fn invoke(&self, action: Action) {
        if self.tx.send(action).is_err() {
            tracing::warn!("Dispatch queue closed; action dropped");
        }
    }
}

impl DispatchQueue {
    /// Run every queued action in posting order without blocking.
    /// Returns the number of actions run.
    pub fn pump(&self) -> usize {
        let mut count = 0;
        while let Ok(action) = self.rx.try_recv() {
            action();
            count += 1;
        }
        count
    }
}

impl std::fmt::Debug for DispatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchQueue").finish_non_exhaustive()
    }
}
