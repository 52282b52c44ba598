use serde::{Deserialize, Serialize};

/// Table referenced by a foreign key column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
}

/// Column metadata within a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnInfo {
    pub name: String,

    /// Database-specific type (e.g., "INTEGER", "varchar(255)").
    pub type_name: String,

    pub nullable: bool,
    pub is_primary_key: bool,

    #[serde(default)]
    pub foreign_key: Option<ForeignKeyRef>,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            is_primary_key: false,
            foreign_key: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.nullable = false;
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.foreign_key = Some(ForeignKeyRef {
            table: table.into(),
            column: column.into(),
        });
        self
    }
}

/// Schema of a single table as returned by schema introspection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Schema name (PostgreSQL, attached SQLite databases) or `None` for the main schema.
    pub schema_name: Option<String>,

    pub table_name: String,

    pub columns: Vec<ColumnInfo>,

    /// Primary key column names, in key order.
    pub primary_key: Vec<String>,

    /// Whether the primary key is filled in by the database on insert.
    #[serde(default)]
    pub auto_increment: bool,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnInfo>) -> Self {
        let primary_key = columns
            .iter()
            .filter(|c| c.is_primary_key)
            .map(|c| c.name.clone())
            .collect();

        Self {
            schema_name: None,
            table_name: table_name.into(),
            columns,
            primary_key,
            auto_increment: false,
        }
    }

    pub fn with_schema_name(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = Some(schema_name.into());
        self
    }

    pub fn with_auto_increment(mut self, auto_increment: bool) -> Self {
        self.auto_increment = auto_increment;
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.iter().any(|pk| pk == name)
    }

    /// Rows can only be updated or deleted when they are addressable by key.
    pub fn is_editable(&self) -> bool {
        !self.primary_key.is_empty()
    }

    /// The key column the database generates on insert.
    ///
    /// Only single-column keys qualify; a composite key is never auto-generated.
    pub fn auto_increment_pk_column(&self) -> Option<&str> {
        match self.primary_key.as_slice() {
            [single] if self.auto_increment => Some(single.as_str()),
            _ => None,
        }
    }
}
