mod crud;
mod error;
mod query;
mod schema;
mod sql_dialect;
mod sql_query_builder;
mod traits;
mod value;

pub use crud::{OperationKind, OperationResult, RowState, TableOperation};
pub use error::DbError;
pub use query::{ColumnMeta, QueryRequest, QueryResult, QueryStats, Record, Row};
pub use schema::{ColumnInfo, ForeignKeyRef, TableSchema};
pub use sql_dialect::{DefaultSqlDialect, MySqlDialect, SqlDialect};
pub use sql_query_builder::SqlQueryBuilder;
pub use traits::{Connection, DbKind, execute_table_operations};
pub use value::Value;

pub use async_trait::async_trait;
pub use chrono;
pub use indexmap;

