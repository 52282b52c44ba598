use async_trait::async_trait;

use crate::crud::TableOperation;
use crate::sql_dialect::{DefaultSqlDialect, MySqlDialect, SqlDialect};
use crate::sql_query_builder::SqlQueryBuilder;
use crate::{DbError, OperationResult, QueryRequest, QueryResult, Record, TableSchema, Value};

static DEFAULT_SQL_DIALECT: DefaultSqlDialect = DefaultSqlDialect;
static MYSQL_DIALECT: MySqlDialect = MySqlDialect;

/// Database backend a connection talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DbKind {
    Sqlite,
    Turso,
    Rqlite,
    CloudflareD1,
    MySql,
    Postgres,
}

impl DbKind {
    pub fn display_name(&self) -> &'static str {
        match self {
            DbKind::Sqlite => "SQLite",
            DbKind::Turso => "Turso",
            DbKind::Rqlite => "rqlite",
            DbKind::CloudflareD1 => "Cloudflare D1",
            DbKind::MySql => "MySQL",
            DbKind::Postgres => "PostgreSQL",
        }
    }

    /// Whether the backend speaks the SQLite dialect.
    pub fn is_sqlite_family(&self) -> bool {
        matches!(
            self,
            DbKind::Sqlite | DbKind::Turso | DbKind::Rqlite | DbKind::CloudflareD1
        )
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            DbKind::MySql => &MYSQL_DIALECT,
            _ => &DEFAULT_SQL_DIALECT,
        }
    }
}

/// Active database connection.
///
/// The grid interacts exclusively through this trait, never accessing driver
/// internals. Every backend (Turso, rqlite, D1, MySQL, PostgreSQL) implements
/// the same query/transaction/schema contract.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Returns the database kind for this connection.
    fn kind(&self) -> DbKind;

    /// SQL syntax used to render table operations.
    fn dialect(&self) -> &dyn SqlDialect {
        self.kind().dialect()
    }

    /// Execute a single statement.
    async fn query(&self, request: &QueryRequest) -> Result<QueryResult, DbError>;

    /// Execute statements atomically, returning one result per statement.
    async fn transaction(&self, statements: &[String]) -> Result<Vec<QueryResult>, DbError>;

    /// Introspect one table (columns, primary key, auto-increment).
    async fn table_schema(
        &self,
        schema_name: Option<&str>,
        table_name: &str,
    ) -> Result<TableSchema, DbError>;

    /// Apply grid edits and return the canonical rows, one result per
    /// operation in request order.
    ///
    /// Backends with a native batch API override this; the default renders
    /// SQL and runs it through [`Connection::transaction`].
    async fn update_table_data(
        &self,
        schema_name: Option<&str>,
        table_name: &str,
        operations: &[TableOperation],
        table_schema: &TableSchema,
    ) -> Result<Vec<OperationResult>, DbError> {
        execute_table_operations(self, schema_name, table_name, operations, table_schema).await
    }

    /// Release resources held by the connection.
    async fn close(&self) -> Result<(), DbError> {
        Ok(())
    }
}

/// Run table operations as one SQL transaction and re-read the affected rows.
pub async fn execute_table_operations<C>(
    connection: &C,
    schema_name: Option<&str>,
    table_name: &str,
    operations: &[TableOperation],
    table_schema: &TableSchema,
) -> Result<Vec<OperationResult>, DbError>
where
    C: Connection + ?Sized,
{
    if operations.is_empty() {
        return Ok(Vec::new());
    }

    let statements = {
        let builder = SqlQueryBuilder::new(connection.dialect());

        operations
            .iter()
            .map(|operation| {
                builder
                    .build_operation(schema_name, table_name, operation)
                    .ok_or_else(|| {
                        DbError::query_failed(format!(
                            "Cannot build {} for table '{}': missing key or values",
                            operation.kind().label(),
                            table_name
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    for statement in &statements {
        log::debug!("[DRIVER] Executing: {}", statement);
    }

    let results = connection.transaction(&statements).await?;

    if results.len() != statements.len() {
        return Err(DbError::query_failed(format!(
            "Transaction returned {} results for {} statements",
            results.len(),
            statements.len()
        )));
    }

    let mut outcomes = Vec::with_capacity(operations.len());

    for (operation, result) in operations.iter().zip(results.iter()) {
        let outcome = match operation {
            TableOperation::Delete { .. } => OperationResult::empty(),
            TableOperation::Insert {
                values,
                auto_increment_pk_column,
            } => {
                let key = insert_lookup_key(
                    values,
                    auto_increment_pk_column.as_deref(),
                    result,
                    table_schema,
                );
                let record =
                    reselect(connection, schema_name, table_name, key.as_ref()).await?;
                OperationResult::with_record(record.unwrap_or_else(|| values.clone()))
            }
            TableOperation::Update { key, values } => {
                let key = updated_lookup_key(key, values);
                let record = reselect(connection, schema_name, table_name, Some(&key)).await?;
                OperationResult::new(record)
            }
        };

        outcomes.push(outcome);
    }

    Ok(outcomes)
}

/// Key of a freshly inserted row: the generated row id when the key is
/// auto-incremented and was left empty, otherwise the key values supplied.
fn insert_lookup_key(
    values: &Record,
    auto_increment_pk_column: Option<&str>,
    result: &QueryResult,
    table_schema: &TableSchema,
) -> Option<Record> {
    if let Some(pk) = auto_increment_pk_column {
        let supplied = values.get(pk).filter(|v| !v.is_absent());
        if supplied.is_none() {
            let rowid = result.stats.last_insert_rowid?;
            let mut key = Record::new();
            key.insert(pk.to_string(), Value::Int(rowid));
            return Some(key);
        }
    }

    if table_schema.primary_key.is_empty() {
        return None;
    }

    let mut key = Record::new();
    for pk in &table_schema.primary_key {
        let value = values.get(pk).filter(|v| !v.is_absent())?;
        key.insert(pk.clone(), value.clone());
    }

    Some(key)
}

/// Key columns may themselves be edited; look the row up by its new key.
fn updated_lookup_key(key: &Record, values: &Record) -> Record {
    key.iter()
        .map(|(column, old)| {
            let value = values.get(column).unwrap_or(old);
            (column.clone(), value.clone())
        })
        .collect()
}

async fn reselect<C>(
    connection: &C,
    schema_name: Option<&str>,
    table_name: &str,
    key: Option<&Record>,
) -> Result<Option<Record>, DbError>
where
    C: Connection + ?Sized,
{
    let Some(key) = key else {
        return Ok(None);
    };

    let sql = SqlQueryBuilder::new(connection.dialect())
        .build_select_by_key(schema_name, table_name, key);

    let Some(sql) = sql else {
        return Ok(None);
    };

    log::debug!("[DRIVER] Re-querying: {}", sql);

    let result = connection.query(&QueryRequest::new(sql)).await?;
    Ok(result.first_record())
}
