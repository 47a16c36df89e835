// logsieve - core/observable.rs
//
// Ordered collection that reports its mutations to observers.
//
// Every mutation emits a change notification. Large replacements are wrapped
// in a suspension scope (`suspend_notifications`) so observers see a single
// `ListChange::Reset` when the outermost scope ends instead of one event per
// element. The aggregate event is emitted from `Drop`, so it fires on every
// exit path, including unwinding.
//
// Observers are invoked after the item lock is released; they may read the
// list but must not mutate it re-entrantly from within a notification.

use parking_lot::RwLock;
use std::sync::Arc;

/// A change reported to observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListChange {
    /// `count` items were appended starting at `index`.
    Added { index: usize, count: usize },
    /// The whole content changed; observers should re-read the list.
    Reset { len: usize },
}

type Observer = Arc<dyn Fn(&ListChange) + Send + Sync>;

struct ListState<T> {
    items: Vec<T>,
    /// Bumped on every mutation, suspended or not.
    version: u64,
    /// Depth of nested suspension scopes.
    suspended: usize,
    /// A mutation happened while suspended.
    pending: bool,
}

/// Thread-safe observable ordered list.
pub struct ObservableList<T> {
    state: RwLock<ListState<T>>,
    observers: RwLock<Vec<Observer>>,
}

impl<T: Clone> ObservableList<T> {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ListState {
                items: Vec::new(),
                version: 0,
                suspended: 0,
                pending: false,
            }),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register an observer for every future change.
    pub fn subscribe<F>(&self, observer: F)
    where
        F: Fn(&ListChange) + Send + Sync + 'static,
    {
        self.observers.write().push(Arc::new(observer));
    }

    /// Suspend change notifications until the returned scope is dropped.
    /// Scopes nest; only the outermost one emits.
    #[must_use = "notifications resume as soon as the scope is dropped"]
    pub fn suspend_notifications(&self) -> SuspensionScope<'_, T> {
        self.state.write().suspended += 1;
        SuspensionScope { list: self }
    }

    /// Append one item.
    pub fn push(&self, item: T) {
        let change = {
            let mut state = self.state.write();
            let index = state.items.len();
            state.items.push(item);
            Self::record(&mut state, ListChange::Added { index, count: 1 })
        };
        self.emit(change);
    }

    /// Remove every item.
    pub fn clear(&self) {
        let change = {
            let mut state = self.state.write();
            state.items.clear();
            Self::record(&mut state, ListChange::Reset { len: 0 })
        };
        self.emit(change);
    }

    /// Replace the whole content with `items`.
    ///
    /// Outside a suspension scope this reports a reset followed by one
    /// addition per item; callers replacing large sequences should suspend
    /// notifications first.
    pub fn replace_range(&self, items: Vec<T>) {
        {
            let mut state = self.state.write();
            if state.suspended > 0 {
                state.items = items;
                state.version += 1;
                state.pending = true;
                return;
            }
        }

        self.clear();
        for item in items {
            self.push(item);
        }
    }

    /// Copy of the current items.
    pub fn snapshot(&self) -> Vec<T> {
        self.state.read().items.clone()
    }

    /// Copy of the current items together with the version they belong to.
    pub fn snapshot_versioned(&self) -> (Vec<T>, u64) {
        let state = self.state.read();
        (state.items.clone(), state.version)
    }

    /// Monotonic mutation counter.
    pub fn version(&self) -> u64 {
        self.state.read().version
    }

    pub fn len(&self) -> usize {
        self.state.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().items.is_empty()
    }

    /// Run `f` against the items without cloning them.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.state.read().items)
    }

    fn record(state: &mut ListState<T>, change: ListChange) -> Option<ListChange> {
        state.version += 1;
        if state.suspended > 0 {
            state.pending = true;
            None
        } else {
            Some(change)
        }
    }

    fn emit(&self, change: Option<ListChange>) {
        let Some(change) = change else {
            return;
        };
        let observers: Vec<Observer> = self.observers.read().clone();
        for observer in observers {
            observer(&change);
        }
    }

    fn resume(&self) {
        let change = {
            let mut state = self.state.write();
            state.suspended = state.suspended.saturating_sub(1);
            if state.suspended == 0 && state.pending {
                state.pending = false;
                Some(ListChange::Reset {
                    len: state.items.len(),
                })
            } else {
                None
            }
        };
        self.emit(change);
    }
}

impl<T: Clone> Default for ObservableList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for ObservableList<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("ObservableList")
            .field("len", &state.items.len())
            .field("version", &state.version)
            .field("suspended", &state.suspended)
            .finish()
    }
}

/// Scope returned by [`ObservableList::suspend_notifications`].
pub struct SuspensionScope<'a, T: Clone> {
    list: &'a ObservableList<T>,
}

impl<T: Clone> Drop for SuspensionScope<'_, T> {
    fn drop(&mut self) {
        self.list.resume();
    }
}
