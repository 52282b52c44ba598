use std::sync::{Arc, Mutex, MutexGuard};

use crate::selection::CellCoord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Ascending,
    Descending,
}

/// Sort state for a single column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortState {
    pub column_ix: usize,
    pub direction: SortDirection,
}

impl SortState {
    pub fn new(column_ix: usize, direction: SortDirection) -> Self {
        Self {
            column_ix,
            direction,
        }
    }

    pub fn ascending(column_ix: usize) -> Self {
        Self::new(column_ix, SortDirection::Ascending)
    }

    pub fn descending(column_ix: usize) -> Self {
        Self::new(column_ix, SortDirection::Descending)
    }
}

/// Cycle sort state for a column: none -> asc -> desc -> none.
/// Clicking another column starts over at ascending.
pub fn next_sort_state(current: Option<SortState>, col_ix: usize) -> Option<SortState> {
    match current {
        Some(SortState {
            column_ix,
            direction,
        }) if column_ix == col_ix => match direction {
            SortDirection::Ascending => Some(SortState::descending(col_ix)),
            SortDirection::Descending => None,
        },
        _ => Some(SortState::ascending(col_ix)),
    }
}

/// Events emitted by a grid to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum GridEvent {
    /// Focus or selected rows changed.
    SelectionChanged {
        focus: Option<CellCoord>,
        rows: Vec<usize>,
    },

    CellChanged {
        row: usize,
        col: usize,
    },

    RowInserted {
        row: usize,
    },

    RowRemovalChanged {
        row: usize,
        removed: bool,
    },

    /// A row left the grid; rows after it moved up by one.
    RowDropped {
        row: usize,
    },

    RowsAppended {
        count: usize,
    },

    /// `None` means every row was reverted.
    ChangesDiscarded {
        row: Option<usize>,
    },

    /// Secondary click; `rows` is the selection the menu acts on.
    ContextMenuRequested {
        row: usize,
        col: usize,
        rows: Vec<usize>,
    },

    /// Sort state changed (None means no sort). The owner re-runs the query.
    SortChanged(Option<SortState>),

    DataReloaded {
        row_count: usize,
    },

    CommitStarted {
        rows: Vec<usize>,
    },

    CommitFinished {
        rows: Vec<usize>,
    },

    CommitFailed {
        rows: Vec<usize>,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Arc<dyn Fn(&GridEvent) + Send + Sync>;

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

/// Cloneable handle to a set of event listeners.
///
/// A grid receives its bus at construction; clones share the same listeners,
/// so a host can subscribe on one handle and pass another to the grid.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<Mutex<Listeners>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
    where
        F: Fn(&GridEvent) + Send + Sync + 'static,
    {
        let mut listeners = mutex_lock(&self.inner);
        let id = SubscriptionId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, Arc::new(listener)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = mutex_lock(&self.inner);
        let before = listeners.entries.len();
        listeners.entries.retain(|(entry_id, _)| *entry_id != id);
        listeners.entries.len() != before
    }

    pub fn listener_count(&self) -> usize {
        mutex_lock(&self.inner).entries.len()
    }

    /// Deliver an event to every listener in subscription order.
    ///
    /// Listeners run outside the lock and may subscribe or unsubscribe.
    pub fn emit(&self, event: GridEvent) {
        let listeners: Vec<Listener> = mutex_lock(&self.inner)
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            listener(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
