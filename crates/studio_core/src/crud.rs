use crate::Record;
use serde::{Deserialize, Serialize};

/// A single row mutation sent to a driver.
///
/// Serialized in the shape drivers exchange over the wire:
/// `{"operation": "UPDATE", "where": {...}, "values": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "UPPERCASE")]
pub enum TableOperation {
    Insert {
        values: Record,

        /// Key column the database generates. Drivers omit it from the
        /// payload when it carries no value.
        #[serde(
            rename = "autoIncrementPkColumn",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        auto_increment_pk_column: Option<String>,
    },
    Update {
        /// Primary key columns and their values before the edit.
        #[serde(rename = "where")]
        key: Record,
        values: Record,
    },
    Delete {
        #[serde(rename = "where")]
        key: Record,
    },
}

impl TableOperation {
    pub fn insert(values: Record, auto_increment_pk_column: Option<String>) -> Self {
        Self::Insert {
            values,
            auto_increment_pk_column,
        }
    }

    pub fn update(key: Record, values: Record) -> Self {
        Self::Update { key, values }
    }

    pub fn delete(key: Record) -> Self {
        Self::Delete { key }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Self::Insert { .. } => OperationKind::Insert,
            Self::Update { .. } => OperationKind::Update,
            Self::Delete { .. } => OperationKind::Delete,
        }
    }

    pub fn key(&self) -> Option<&Record> {
        match self {
            Self::Insert { .. } => None,
            Self::Update { key, .. } | Self::Delete { key } => Some(key),
        }
    }

    pub fn values(&self) -> Option<&Record> {
        match self {
            Self::Insert { values, .. } | Self::Update { values, .. } => Some(values),
            Self::Delete { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

/// Canonical outcome of one operation, in request order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// The row as stored after the operation (server defaults, triggers and
    /// generated keys applied). `None` for deletes or when the row could not
    /// be re-read.
    pub record: Option<Record>,
}

impl OperationResult {
    pub fn new(record: Option<Record>) -> Self {
        Self { record }
    }

    pub fn with_record(record: Record) -> Self {
        Self {
            record: Some(record),
        }
    }

    pub fn empty() -> Self {
        Self { record: None }
    }
}

/// State of a row during editing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RowState {
    /// No pending changes.
    #[default]
    Clean,

    /// Has unsaved local modifications.
    Dirty,

    /// Currently saving to database.
    Saving,

    /// Last save operation failed.
    Error(String),
}

impl RowState {
    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean)
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Dirty)
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(msg) => Some(msg),
            _ => None,
        }
    }
}
