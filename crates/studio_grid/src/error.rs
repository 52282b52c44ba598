use studio_core::DbError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("A commit is in flight; wait for it to finish")]
    CommitInFlight,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Invalid grid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Cell input rejected before it reaches the overlay.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Column '{column}' does not accept NULL")]
    NotNullable { column: String },

    #[error("'{input}' is not a valid integer for column '{column}'")]
    InvalidInteger { column: String, input: String },

    #[error("'{input}' is not a valid number for column '{column}'")]
    InvalidFloat { column: String, input: String },

    #[error("'{input}' is not a valid boolean for column '{column}'")]
    InvalidBool { column: String, input: String },

    #[error("Invalid JSON for column '{column}': {reason}")]
    InvalidJson { column: String, reason: String },

    #[error("'{input}' is not hex bytes (X'..' or 0x..) for column '{column}'")]
    InvalidBytes { column: String, input: String },

    #[error("DEFAULT can only be used in new rows (column '{column}')")]
    DefaultOnExistingRow { column: String },
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("There are no pending changes to commit")]
    NoChanges,

    #[error("A commit is already in flight")]
    InFlight,

    #[error("Table '{table}' has no primary key; rows cannot be updated or deleted")]
    MissingPrimaryKey { table: String },

    #[error("Primary key of row {row} in '{table}' is unknown; reload the table to edit it")]
    UnresolvedKey { table: String, row: usize },

    #[error("Row {row} sets column '{column}' to DEFAULT, which only new rows accept")]
    DefaultInUpdate { row: usize, column: String },

    #[error("Commit ticket does not match the commit in flight")]
    StaleTicket,

    #[error("Commit failed: {source}")]
    Driver {
        rows: Vec<usize>,
        #[source]
        source: DbError,
    },

    #[error("Driver returned {actual} results for {expected} operations")]
    ResultMismatch {
        expected: usize,
        actual: usize,
        rows: Vec<usize>,
    },
}

impl CommitError {
    /// Rows whose pending changes were part of the failed batch, or the row
    /// that kept the plan from being built.
    pub fn rows(&self) -> &[usize] {
        match self {
            Self::Driver { rows, .. } | Self::ResultMismatch { rows, .. } => rows,
            Self::UnresolvedKey { row, .. } | Self::DefaultInUpdate { row, .. } => {
                std::slice::from_ref(row)
            }
            _ => &[],
        }
    }
}
