use crate::Value;

/// Database-specific SQL syntax (quoting, escaping, literals).
pub trait SqlDialect: Send + Sync {
    /// Quote an identifier (table/column name).
    ///
    /// - PostgreSQL/SQLite: `"name"` (double quotes)
    /// - MySQL: `` `name` `` (backticks)
    fn quote_identifier(&self, name: &str) -> String;

    /// Build a qualified table reference.
    ///
    /// - With a schema: `"schema"."table"`
    /// - Without: `"table"`
    fn qualified_table(&self, schema: Option<&str>, table: &str) -> String {
        match schema {
            Some(s) => format!(
                "{}.{}",
                self.quote_identifier(s),
                self.quote_identifier(table)
            ),
            None => self.quote_identifier(table),
        }
    }

    /// Convert a Value to a SQL literal string.
    fn value_to_literal(&self, value: &Value) -> String;

    /// Escape a string for use inside a single-quoted literal.
    fn escape_string(&self, s: &str) -> String {
        s.replace('\'', "''")
    }
}

fn hex_literal(bytes: &[u8]) -> String {
    format!("X'{}'", hex::encode(bytes))
}

fn float_literal(f: f64) -> String {
    if f.is_nan() {
        "'NaN'".to_string()
    } else if f.is_infinite() {
        if f > 0.0 {
            "'Infinity'".to_string()
        } else {
            "'-Infinity'".to_string()
        }
    } else {
        f.to_string()
    }
}

/// ANSI dialect (double-quote identifiers). Used by the SQLite family and PostgreSQL.
pub struct DefaultSqlDialect;

impl SqlDialect for DefaultSqlDialect {
    fn quote_identifier(&self, name: &str) -> String {
        let escaped = name.replace('"', "\"\"");
        format!("\"{}\"", escaped)
    }

    fn value_to_literal(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Default => "DEFAULT".to_string(),
            Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Int(i) => i.to_string(),
            Value::BigInt(i) => i.to_string(),
            Value::Float(f) => float_literal(*f),
            Value::Decimal(s) => s.clone(),
            Value::Text(s) | Value::Json(s) => format!("'{}'", self.escape_string(s)),
            Value::Bytes(b) => hex_literal(b),
            Value::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            Value::Time(t) => format!("'{}'", t.format("%H:%M:%S%.f")),
            Value::DateTime(dt) => format!("'{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

/// MySQL/MariaDB dialect (backtick identifiers, backslash-aware escaping).
pub struct MySqlDialect;

impl SqlDialect for MySqlDialect {
    fn quote_identifier(&self, name: &str) -> String {
        let escaped = name.replace('`', "``");
        format!("`{}`", escaped)
    }

    fn value_to_literal(&self, value: &Value) -> String {
        match value {
            Value::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            Value::Text(s) | Value::Json(s) => format!("'{}'", self.escape_string(s)),
            other => DefaultSqlDialect.value_to_literal(other),
        }
    }

    fn escape_string(&self, s: &str) -> String {
        s.replace('\\', "\\\\").replace('\'', "''")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_dialect_quotes_and_escapes() {
        let dialect = DefaultSqlDialect;
        assert_eq!(dialect.quote_identifier("we\"ird"), "\"we\"\"ird\"");
        assert_eq!(
            dialect.qualified_table(Some("main"), "users"),
            "\"main\".\"users\""
        );
        assert_eq!(
            dialect.value_to_literal(&Value::Text("O'Brien".into())),
            "'O''Brien'"
        );
        assert_eq!(dialect.value_to_literal(&Value::Bytes(vec![0xde, 0xad])), "X'dead'");
        assert_eq!(dialect.value_to_literal(&Value::Default), "DEFAULT");
    }

    #[test]
    fn mysql_dialect_uses_backticks_and_escapes_backslashes() {
        let dialect = MySqlDialect;
        assert_eq!(dialect.quote_identifier("order"), "`order`");
        assert_eq!(
            dialect.value_to_literal(&Value::Text("a\\b".into())),
            "'a\\\\b'"
        );
        assert_eq!(dialect.value_to_literal(&Value::Bool(true)), "1");
    }
}
