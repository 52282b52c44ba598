mod clipboard;
mod commit;
mod config;
mod error;
mod events;
mod layout;
mod model;
mod selection;
mod state;
mod viewport;

pub use clipboard::parse_tsv;
pub use commit::{
    CommitOutcome, CommitPlan, CommitSummary, CommitTicket, PlannedOperation, build_plan,
};
pub use config::{
    DEFAULT_COLUMN_WIDTH, DEFAULT_RENDER_AHEAD, DEFAULT_ROW_HEIGHT,
    GridConfig, GridConfigStore, MAX_DISPLAY_LEN, MIN_COLUMN_WIDTH,
};
pub use error::{CommitError, GridError, ValidationError};
pub use events::{
    EventBus, GridEvent, SortDirection, SortState, SubscriptionId, next_sort_state,
};
pub use layout::ColumnLayout;
pub use model::{
    ColumnAlign, ColumnBadge, ColumnKind, ColumnSpec, RowChange, RowStatus, format_hex,
    parse_cell_input,
};
pub use selection::{CellCoord, Direction, Edge, SelectionState};
pub use state::{AppliedChange, TableState};
pub use viewport::{Padding, Viewport, VisibleRange, compute_padding, compute_visible_range};
