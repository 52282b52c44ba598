use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use studio_core::{
    Connection, DbError, DbKind, OperationResult, QueryRequest, QueryResult, QueryStats, Record,
    TableOperation, TableSchema, Value, execute_table_operations,
};

#[derive(Debug, Clone)]
pub enum FakeQueryOutcome {
    Success(QueryResult),
    Error(String),
}

impl FakeQueryOutcome {
    fn to_result(&self) -> Result<QueryResult, DbError> {
        match self {
            Self::Success(result) => Ok(result.clone()),
            Self::Error(message) => Err(DbError::query_failed(message.clone())),
        }
    }
}

/// How the next `update_table_data` call answers.
#[derive(Debug, Clone)]
pub enum FakeUpdateOutcome {
    /// Synthesize canonical rows from the operations themselves, assigning
    /// row ids to auto-increment inserts.
    Echo,
    /// Return exactly these results.
    Results(Vec<OperationResult>),
    /// Reject the whole batch.
    Error(String),
    /// Echo, but drop the last result (a misbehaving backend).
    Truncated,
    /// Go through the SQL path (`transaction` + re-select queries).
    Sql,
}

#[derive(Debug, Clone, Default)]
pub struct FakeConnectionStats {
    pub executed_requests: Vec<QueryRequest>,
    pub transactions: Vec<Vec<String>>,
    pub update_calls: Vec<Vec<TableOperation>>,
    pub close_calls: usize,
}

#[derive(Default)]
struct FakeConnectionState {
    schemas: RwLock<HashMap<String, TableSchema>>,
    query_outcomes: RwLock<HashMap<String, FakeQueryOutcome>>,
    transaction_error: RwLock<Option<String>>,
    update_outcomes: Mutex<VecDeque<FakeUpdateOutcome>>,
    executed_requests: Mutex<Vec<QueryRequest>>,
    transactions: Mutex<Vec<Vec<String>>>,
    update_calls: Mutex<Vec<Vec<TableOperation>>>,
    next_rowid: AtomicI64,
    close_calls: AtomicUsize,
}

/// In-memory `Connection` that records every call and answers from scripts.
#[derive(Clone)]
pub struct FakeConnection {
    kind: DbKind,
    state: Arc<FakeConnectionState>,
}

impl FakeConnection {
    pub fn new(kind: DbKind) -> Self {
        Self {
            kind,
            state: Arc::new(FakeConnectionState {
                next_rowid: AtomicI64::new(1),
                ..FakeConnectionState::default()
            }),
        }
    }

    pub fn with_table_schema(self, schema: TableSchema) -> Self {
        rwlock_write(&self.state.schemas).insert(schema.table_name.clone(), schema);
        self
    }

    pub fn with_query_result(self, sql: impl Into<String>, result: QueryResult) -> Self {
        rwlock_write(&self.state.query_outcomes)
            .insert(sql.into(), FakeQueryOutcome::Success(result));
        self
    }

    pub fn with_query_error(self, sql: impl Into<String>, message: impl Into<String>) -> Self {
        rwlock_write(&self.state.query_outcomes)
            .insert(sql.into(), FakeQueryOutcome::Error(message.into()));
        self
    }

    pub fn with_transaction_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.state.transaction_error) = Some(message.into());
        self
    }

    /// Next row id handed out for auto-increment inserts.
    pub fn with_next_rowid(self, rowid: i64) -> Self {
        self.state.next_rowid.store(rowid, Ordering::SeqCst);
        self
    }

    /// Queue the answer of the next `update_table_data` call. Calls beyond
    /// the queue fall back to [`FakeUpdateOutcome::Echo`].
    pub fn push_update_outcome(&self, outcome: FakeUpdateOutcome) {
        mutex_lock(&self.state.update_outcomes).push_back(outcome);
    }

    pub fn with_update_outcome(self, outcome: FakeUpdateOutcome) -> Self {
        self.push_update_outcome(outcome);
        self
    }

    pub fn stats(&self) -> FakeConnectionStats {
        FakeConnectionStats {
            executed_requests: mutex_lock(&self.state.executed_requests).clone(),
            transactions: mutex_lock(&self.state.transactions).clone(),
            update_calls: mutex_lock(&self.state.update_calls).clone(),
            close_calls: self.state.close_calls.load(Ordering::Relaxed),
        }
    }

    fn take_rowid(&self) -> i64 {
        self.state.next_rowid.fetch_add(1, Ordering::SeqCst)
    }

    fn echo(&self, operations: &[TableOperation]) -> Vec<OperationResult> {
        operations
            .iter()
            .map(|operation| match operation {
                TableOperation::Insert {
                    values,
                    auto_increment_pk_column,
                } => {
                    let mut record = values.clone();
                    if let Some(pk) = auto_increment_pk_column {
                        let missing = record.get(pk).is_none_or(Value::is_absent);
                        if missing {
                            record.insert(pk.clone(), Value::Int(self.take_rowid()));
                        }
                    }
                    OperationResult::with_record(record)
                }
                TableOperation::Update { key, values } => {
                    let mut record: Record = key.clone();
                    for (column, value) in values {
                        record.insert(column.clone(), value.clone());
                    }
                    OperationResult::with_record(record)
                }
                TableOperation::Delete { .. } => OperationResult::empty(),
            })
            .collect()
    }
}

#[async_trait]
impl Connection for FakeConnection {
    fn kind(&self) -> DbKind {
        self.kind
    }

    async fn query(&self, request: &QueryRequest) -> Result<QueryResult, DbError> {
        mutex_lock(&self.state.executed_requests).push(request.clone());

        match rwlock_read(&self.state.query_outcomes).get(&request.sql) {
            Some(outcome) => outcome.to_result(),
            None => Ok(QueryResult::empty()),
        }
    }

    async fn transaction(&self, statements: &[String]) -> Result<Vec<QueryResult>, DbError> {
        mutex_lock(&self.state.transactions).push(statements.to_vec());

        if let Some(message) = rwlock_read(&self.state.transaction_error).clone() {
            return Err(DbError::query_failed(message));
        }

        let results = statements
            .iter()
            .map(|statement| {
                let is_insert = statement.trim_start().starts_with("INSERT");
                QueryResult::empty().with_stats(QueryStats {
                    rows_affected: Some(1),
                    last_insert_rowid: is_insert.then(|| self.take_rowid()),
                    ..QueryStats::default()
                })
            })
            .collect();

        Ok(results)
    }

    async fn table_schema(
        &self,
        _schema_name: Option<&str>,
        table_name: &str,
    ) -> Result<TableSchema, DbError> {
        rwlock_read(&self.state.schemas)
            .get(table_name)
            .cloned()
            .ok_or_else(|| DbError::query_failed(format!("no such table: {}", table_name)))
    }

    async fn update_table_data(
        &self,
        schema_name: Option<&str>,
        table_name: &str,
        operations: &[TableOperation],
        table_schema: &TableSchema,
    ) -> Result<Vec<OperationResult>, DbError> {
        mutex_lock(&self.state.update_calls).push(operations.to_vec());

        let outcome = mutex_lock(&self.state.update_outcomes)
            .pop_front()
            .unwrap_or(FakeUpdateOutcome::Echo);

        match outcome {
            FakeUpdateOutcome::Echo => Ok(self.echo(operations)),
            FakeUpdateOutcome::Results(results) => Ok(results),
            FakeUpdateOutcome::Error(message) => Err(DbError::query_failed(message)),
            FakeUpdateOutcome::Truncated => {
                let mut results = self.echo(operations);
                results.pop();
                Ok(results)
            }
            FakeUpdateOutcome::Sql => {
                execute_table_operations(self, schema_name, table_name, operations, table_schema)
                    .await
            }
        }
    }

    async fn close(&self) -> Result<(), DbError> {
        self.state.close_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}
