use studio_core::{ColumnInfo, ColumnMeta, QueryResult, Record, Row, TableSchema, Value};

/// Install `env_logger` for tests. Safe to call from every test.
pub fn init_test_logging() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();
}

pub fn table_result(columns: Vec<ColumnMeta>, rows: Vec<Row>) -> QueryResult {
    QueryResult::new(columns, rows)
}

pub fn column(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> ColumnMeta {
    ColumnMeta::new(name, type_name, nullable)
}

pub fn int_cell(value: i64) -> Value {
    Value::Int(value)
}

pub fn text_cell(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub fn record(pairs: &[(&str, Value)]) -> Record {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// `users(id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, email TEXT)` with
/// `count` rows: ids start at 1, names `user1`, `user2`, ...
pub fn users_result(count: usize) -> QueryResult {
    let rows = (1..=count as i64)
        .map(|id| {
            vec![
                int_cell(id),
                text_cell(format!("user{}", id)),
                text_cell(format!("user{}@example.com", id)),
            ]
        })
        .collect();

    table_result(
        vec![
            column("id", "INTEGER", false),
            column("name", "TEXT", true),
            column("email", "TEXT", true),
        ],
        rows,
    )
}

pub fn users_schema() -> TableSchema {
    TableSchema::new(
        "users",
        vec![
            ColumnInfo::new("id", "INTEGER").primary_key(),
            ColumnInfo::new("name", "TEXT"),
            ColumnInfo::new("email", "TEXT"),
        ],
    )
    .with_auto_increment(true)
}
