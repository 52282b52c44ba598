use crate::crud::TableOperation;
use crate::sql_dialect::SqlDialect;
use crate::{Record, Value};

/// Builds CRUD SQL statements using a specific dialect.
pub struct SqlQueryBuilder<'a> {
    dialect: &'a dyn SqlDialect,
}

impl<'a> SqlQueryBuilder<'a> {
    pub fn new(dialect: &'a dyn SqlDialect) -> Self {
        Self { dialect }
    }

    /// Render one table operation. Returns `None` when the operation cannot be
    /// expressed (an UPDATE without values, or an UPDATE/DELETE without a key).
    pub fn build_operation(
        &self,
        schema: Option<&str>,
        table: &str,
        operation: &TableOperation,
    ) -> Option<String> {
        match operation {
            TableOperation::Insert {
                values,
                auto_increment_pk_column,
            } => Some(self.build_insert(
                schema,
                table,
                values,
                auto_increment_pk_column.as_deref(),
            )),
            TableOperation::Update { key, values } => {
                self.build_update(schema, table, key, values)
            }
            TableOperation::Delete { key } => self.build_delete(schema, table, key),
        }
    }

    /// Build INSERT statement.
    ///
    /// Returns SQL like: `INSERT INTO "table" ("col1", "col2") VALUES (val1, val2)`.
    /// `Default` markers and a valueless auto-increment key are left out so the
    /// database fills them in; an empty payload becomes `DEFAULT VALUES`.
    pub fn build_insert(
        &self,
        schema: Option<&str>,
        table: &str,
        values: &Record,
        auto_increment_pk_column: Option<&str>,
    ) -> String {
        let table = self.dialect.qualified_table(schema, table);

        let payload: Vec<(&String, &Value)> = values
            .iter()
            .filter(|(_, value)| !value.is_default())
            .filter(|(name, value)| {
                !(auto_increment_pk_column == Some(name.as_str()) && value.is_absent())
            })
            .collect();

        if payload.is_empty() {
            return format!("INSERT INTO {} DEFAULT VALUES", table);
        }

        let columns = payload
            .iter()
            .map(|(name, _)| self.dialect.quote_identifier(name))
            .collect::<Vec<_>>()
            .join(", ");

        let literals = payload
            .iter()
            .map(|(_, value)| self.dialect.value_to_literal(value))
            .collect::<Vec<_>>()
            .join(", ");

        format!("INSERT INTO {} ({}) VALUES ({})", table, columns, literals)
    }

    /// Build UPDATE statement.
    ///
    /// Returns SQL like: `UPDATE "table" SET "col1" = val1 WHERE "pk" = pkval`.
    pub fn build_update(
        &self,
        schema: Option<&str>,
        table: &str,
        key: &Record,
        values: &Record,
    ) -> Option<String> {
        if values.is_empty() {
            return None;
        }

        let table = self.dialect.qualified_table(schema, table);
        let set_clause = self.build_set_clause(values);
        let where_clause = self.build_where_clause(key)?;

        Some(format!(
            "UPDATE {} SET {} WHERE {}",
            table, set_clause, where_clause
        ))
    }

    /// Build DELETE statement.
    ///
    /// Returns SQL like: `DELETE FROM "table" WHERE "pk" = pkval`.
    pub fn build_delete(&self, schema: Option<&str>, table: &str, key: &Record) -> Option<String> {
        let table = self.dialect.qualified_table(schema, table);
        let where_clause = self.build_where_clause(key)?;

        Some(format!("DELETE FROM {} WHERE {}", table, where_clause))
    }

    /// Build SELECT statement to fetch a row by key.
    ///
    /// Used to re-read the canonical row after INSERT/UPDATE.
    pub fn build_select_by_key(
        &self,
        schema: Option<&str>,
        table: &str,
        key: &Record,
    ) -> Option<String> {
        let table_ref = self.dialect.qualified_table(schema, table);
        let where_clause = self.build_where_clause(key)?;

        Some(format!(
            "SELECT * FROM {} WHERE {} LIMIT 1",
            table_ref, where_clause
        ))
    }

    /// Build WHERE clause from a key record.
    ///
    /// Returns `"col1" = val1 AND "col2" = val2` for composite keys, or `None`
    /// for an empty key or one holding a `Default` marker.
    pub fn build_where_clause(&self, key: &Record) -> Option<String> {
        if key.is_empty() || key.values().any(Value::is_default) {
            return None;
        }

        let conditions: Vec<String> = key
            .iter()
            .map(|(col, val)| {
                let col_quoted = self.dialect.quote_identifier(col);
                if val.is_null() {
                    format!("{} IS NULL", col_quoted)
                } else {
                    format!("{} = {}", col_quoted, self.dialect.value_to_literal(val))
                }
            })
            .collect();

        Some(conditions.join(" AND "))
    }

    /// Build SET clause for UPDATE.
    ///
    /// Returns `"col1" = val1, "col2" = val2`.
    pub fn build_set_clause(&self, values: &Record) -> String {
        values
            .iter()
            .map(|(col, val)| {
                format!(
                    "{} = {}",
                    self.dialect.quote_identifier(col),
                    self.dialect.value_to_literal(val)
                )
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}
