use std::collections::BTreeMap;
use std::sync::Arc;

use studio_core::{ColumnMeta, RowState, TableSchema, Value};

use crate::ValidationError;

/// Column header of the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSpec {
    /// Column name as returned by the database. Also the key for width state.
    pub name: Arc<str>,
    pub display_name: Arc<str>,
    pub type_name: Arc<str>,
    pub kind: ColumnKind,
    pub align: ColumnAlign,
    pub nullable: bool,
    pub is_primary_key: bool,
    pub badge: Option<ColumnBadge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Integer,
    Float,
    Bool,
    Bytes,
    Json,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAlign {
    Left,
    Right,
}

/// Marker rendered next to a header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnBadge {
    PrimaryKey,
    ForeignKey { table: String, column: String },
}

impl ColumnSpec {
    pub fn new(name: &str, type_name: &str) -> Self {
        let kind = infer_column_kind(type_name);

        Self {
            name: name.into(),
            display_name: name.into(),
            type_name: type_name.into(),
            kind,
            align: align_for(kind),
            nullable: true,
            is_primary_key: false,
            badge: None,
        }
    }

    /// Fill in key, nullability and foreign key metadata from introspection.
    pub fn annotate(&mut self, schema: &TableSchema) {
        let Some(info) = schema.column(&self.name) else {
            return;
        };

        self.nullable = info.nullable;
        self.is_primary_key = schema.is_primary_key(&self.name);

        self.badge = if self.is_primary_key {
            Some(ColumnBadge::PrimaryKey)
        } else {
            info.foreign_key.as_ref().map(|fk| ColumnBadge::ForeignKey {
                table: fk.table.clone(),
                column: fk.column.clone(),
            })
        };
    }
}

impl From<&ColumnMeta> for ColumnSpec {
    fn from(col: &ColumnMeta) -> Self {
        let mut spec = ColumnSpec::new(&col.name, &col.type_name);
        spec.nullable = col.nullable;
        spec
    }
}

fn align_for(kind: ColumnKind) -> ColumnAlign {
    match kind {
        ColumnKind::Integer | ColumnKind::Float => ColumnAlign::Right,
        _ => ColumnAlign::Left,
    }
}

fn infer_column_kind(type_name: &str) -> ColumnKind {
    let lower = type_name.to_lowercase();

    if lower.contains("int") || lower.contains("serial") {
        ColumnKind::Integer
    } else if lower.contains("float")
        || lower.contains("double")
        || lower.contains("real")
        || lower.contains("numeric")
        || lower.contains("decimal")
    {
        ColumnKind::Float
    } else if lower.contains("bool") {
        ColumnKind::Bool
    } else if lower.contains("bytea") || lower.contains("blob") || lower.contains("binary") {
        ColumnKind::Bytes
    } else if lower.contains("json") {
        ColumnKind::Json
    } else if lower.contains("text")
        || lower.contains("char")
        || lower.contains("clob")
        || lower.contains("string")
        || lower.contains("uuid")
        || lower.contains("date")
        || lower.contains("time")
    {
        ColumnKind::Text
    } else {
        ColumnKind::Unknown
    }
}

/// Pending edit of one row, layered over its base values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowChange {
    /// Edited columns only, keyed by column index.
    pub values: BTreeMap<usize, Value>,

    /// The row was inserted client-side and has no server identity yet.
    pub is_new_row: bool,

    /// Marked for deletion; base values stay visible until the commit lands.
    pub is_removed: bool,
}

impl RowChange {
    pub(crate) fn new_row() -> Self {
        Self {
            is_new_row: true,
            ..Self::default()
        }
    }

    /// Nothing left to commit for this row.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && !self.is_new_row && !self.is_removed
    }

    pub fn value(&self, col: usize) -> Option<&Value> {
        self.values.get(&col)
    }
}

/// Per-row flags for styling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RowStatus {
    pub is_new: bool,
    pub is_removed: bool,
    pub is_dirty: bool,
    pub state: RowState,
}

/// Parse text typed into a cell according to the column's type.
///
/// `NULL` (any case) is accepted only by nullable columns and `DEFAULT`
/// yields the default marker. Bytes columns take hex (`X'..'` or `0x..`).
/// Text and unknown columns keep the input verbatim.
pub fn parse_cell_input(column: &ColumnSpec, input: &str) -> Result<Value, ValidationError> {
    let trimmed = input.trim();

    if trimmed.eq_ignore_ascii_case("null") {
        if !column.nullable {
            return Err(ValidationError::NotNullable {
                column: column.name.to_string(),
            });
        }
        return Ok(Value::Null);
    }

    if trimmed.eq_ignore_ascii_case("default") {
        return Ok(Value::Default);
    }

    match column.kind {
        ColumnKind::Integer => {
            if let Ok(value) = trimmed.parse::<i64>() {
                return Ok(Value::Int(value));
            }
            trimmed
                .parse::<i128>()
                .map(Value::BigInt)
                .map_err(|_| ValidationError::InvalidInteger {
                    column: column.name.to_string(),
                    input: input.to_string(),
                })
        }
        ColumnKind::Float => {
            trimmed
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|_| ValidationError::InvalidFloat {
                    column: column.name.to_string(),
                    input: input.to_string(),
                })
        }
        ColumnKind::Bool => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "t" | "1" | "yes" => Ok(Value::Bool(true)),
            "false" | "f" | "0" | "no" => Ok(Value::Bool(false)),
            _ => Err(ValidationError::InvalidBool {
                column: column.name.to_string(),
                input: input.to_string(),
            }),
        },
        ColumnKind::Json => serde_json::from_str::<serde_json::Value>(trimmed)
            .map(|_| Value::Json(trimmed.to_string()))
            .map_err(|e| ValidationError::InvalidJson {
                column: column.name.to_string(),
                reason: e.to_string(),
            }),
        ColumnKind::Bytes => {
            parse_hex(trimmed)
                .map(Value::Bytes)
                .ok_or_else(|| ValidationError::InvalidBytes {
                    column: column.name.to_string(),
                    input: input.to_string(),
                })
        }
        ColumnKind::Text | ColumnKind::Unknown => Ok(Value::Text(input.to_string())),
    }
}

fn parse_hex(input: &str) -> Option<Vec<u8>> {
    let digits = if let Some(rest) = input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        rest
    } else {
        input
            .strip_prefix("X'")
            .or_else(|| input.strip_prefix("x'"))?
            .strip_suffix('\'')?
    };
    hex::decode(digits).ok()
}

/// Blob text that [`parse_cell_input`] reads back.
pub fn format_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use studio_core::ColumnInfo;

    #[test]
    fn infers_kind_and_alignment_from_declared_type() {
        let id = ColumnSpec::new("id", "BIGINT");
        assert_eq!(id.kind, ColumnKind::Integer);
        assert_eq!(id.align, ColumnAlign::Right);

        assert_eq!(ColumnSpec::new("price", "DECIMAL(10,2)").kind, ColumnKind::Float);
        assert_eq!(ColumnSpec::new("meta", "JSONB").kind, ColumnKind::Json);
        assert_eq!(ColumnSpec::new("name", "varchar(20)").align, ColumnAlign::Left);
        assert_eq!(ColumnSpec::new("x", "").kind, ColumnKind::Unknown);
    }

    #[test]
    fn annotate_marks_keys_and_foreign_keys() {
        let schema = TableSchema::new(
            "posts",
            vec![
                ColumnInfo::new("id", "INTEGER").primary_key(),
                ColumnInfo::new("author_id", "INTEGER")
                    .not_null()
                    .references("users", "id"),
            ],
        );

        let mut id = ColumnSpec::new("id", "INTEGER");
        id.annotate(&schema);
        assert!(id.is_primary_key);
        assert_eq!(id.badge, Some(ColumnBadge::PrimaryKey));

        let mut author = ColumnSpec::new("author_id", "INTEGER");
        author.annotate(&schema);
        assert!(!author.nullable);
        assert_eq!(
            author.badge,
            Some(ColumnBadge::ForeignKey {
                table: "users".to_string(),
                column: "id".to_string()
            })
        );
    }

    #[test]
    fn parses_input_by_column_kind() {
        let int_col = ColumnSpec::new("n", "INTEGER");
        assert_eq!(parse_cell_input(&int_col, " 42 "), Ok(Value::Int(42)));
        assert_eq!(
            parse_cell_input(&int_col, "18446744073709551615"),
            Ok(Value::BigInt(18_446_744_073_709_551_615))
        );
        assert!(matches!(
            parse_cell_input(&int_col, "4x"),
            Err(ValidationError::InvalidInteger { .. })
        ));

        let bool_col = ColumnSpec::new("b", "BOOLEAN");
        assert_eq!(parse_cell_input(&bool_col, "Yes"), Ok(Value::Bool(true)));

        let text_col = ColumnSpec::new("t", "TEXT");
        assert_eq!(
            parse_cell_input(&text_col, "  padded "),
            Ok(Value::Text("  padded ".to_string()))
        );
        assert_eq!(parse_cell_input(&text_col, "DEFAULT"), Ok(Value::Default));
    }

    #[test]
    fn bytes_columns_take_hex_only() {
        let blob = ColumnSpec::new("avatar", "BLOB");
        assert_eq!(
            parse_cell_input(&blob, "X'00ff'"),
            Ok(Value::Bytes(vec![0x00, 0xff]))
        );
        assert_eq!(
            parse_cell_input(&blob, "0xDEAD"),
            Ok(Value::Bytes(vec![0xde, 0xad]))
        );
        assert_eq!(parse_cell_input(&blob, "0x"), Ok(Value::Bytes(Vec::new())));
        assert!(matches!(
            parse_cell_input(&blob, "<2 bytes>"),
            Err(ValidationError::InvalidBytes { .. })
        ));
        assert!(matches!(
            parse_cell_input(&blob, "0xabc"),
            Err(ValidationError::InvalidBytes { .. })
        ));

        let bytes = vec![1, 2, 254];
        assert_eq!(parse_cell_input(&blob, &format_hex(&bytes)), Ok(Value::Bytes(bytes)));
    }

    #[test]
    fn null_is_rejected_for_not_null_columns() {
        let mut column = ColumnSpec::new("name", "TEXT");
        assert_eq!(parse_cell_input(&column, "null"), Ok(Value::Null));

        column.nullable = false;
        assert_eq!(
            parse_cell_input(&column, "NULL"),
            Err(ValidationError::NotNullable {
                column: "name".to_string()
            })
        );
    }
}
