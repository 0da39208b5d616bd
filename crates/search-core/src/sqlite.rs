//! SQLite-backed candidate store.
//!
//! Candidates are filtered with `instr(fold_lower(content), ?) > 0`, one
//! predicate per token joined with `OR`. `fold_lower` is registered on the
//! connection because SQLite's built-in `lower` only folds ASCII.

use std::path::Path;

use anyhow::{Context, Result};
use common::{Document, Metadata, RetrieverConfig};
use parking_lot::Mutex;
use rusqlite::{
    Connection,
    functions::FunctionFlags,
    params_from_iter,
    types::{Value as SqlValue, ValueRef},
};
use serde_json::Value as JsonValue;

use crate::candidates::{CandidateFetcher, RawCandidate};

const FOLD_LOWER: &str = "fold_lower";

pub struct SqliteCandidateStore {
    conn: Mutex<Connection>,
    table: String,
    content_column: String,
    metadata_columns: Vec<String>,
}

impl SqliteCandidateStore {
    pub fn open(path: &Path, config: &RetrieverConfig) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed opening sqlite store: {}", path.display()))?;
        Self::from_connection(conn, config)
    }

    pub fn open_in_memory(config: &RetrieverConfig) -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, config)
    }

    pub fn from_connection(conn: Connection, config: &RetrieverConfig) -> Result<Self> {
        config.validate()?;
        conn.create_scalar_function(
            FOLD_LOWER,
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                Ok(match ctx.get_raw(0) {
                    ValueRef::Text(text) => Some(String::from_utf8_lossy(text).to_lowercase()),
                    _ => None,
                })
            },
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            table: config.table_name.clone(),
            content_column: config.content_column.clone(),
            metadata_columns: config.metadata_columns.clone(),
        })
    }

    pub fn ensure_table(&self) -> Result<()> {
        let mut columns = vec![format!("{} TEXT NOT NULL", quote(&self.content_column))];
        columns.extend(self.metadata_columns.iter().map(|c| quote(c)));
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            quote(&self.table),
            columns.join(", ")
        );
        self.conn.lock().execute(&sql, [])?;
        Ok(())
    }

    /// Inserts documents in one transaction. Metadata keys outside the
    /// configured columns are ignored; missing ones are stored as NULL.
    pub fn insert_documents(&self, documents: &[Document]) -> Result<usize> {
        let placeholders = (1..=self.metadata_columns.len() + 1)
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote(&self.table),
            self.column_list()
        );

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut statement = tx.prepare(&sql)?;
            for doc in documents {
                let mut values = Vec::with_capacity(self.metadata_columns.len() + 1);
                values.push(SqlValue::Text(doc.content.clone()));
                values.extend(
                    self.metadata_columns
                        .iter()
                        .map(|column| json_to_sql(doc.metadata.get(column))),
                );
                statement.execute(params_from_iter(values))?;
            }
        }
        tx.commit()?;
        Ok(documents.len())
    }

    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(&self.table));
        let count: i64 = self.conn.lock().query_row(&sql, [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    fn column_list(&self) -> String {
        std::iter::once(&self.content_column)
            .chain(&self.metadata_columns)
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_sql(&self, token_count: usize) -> String {
        let content = quote(&self.content_column);
        let predicates = (1..=token_count)
            .map(|i| format!("instr({FOLD_LOWER}({content}), ?{i}) > 0"))
            .collect::<Vec<_>>()
            .join(" OR ");
        format!(
            "SELECT {} FROM {} WHERE {predicates} LIMIT ?{}",
            self.column_list(),
            quote(&self.table),
            token_count + 1
        )
    }
}

impl CandidateFetcher for SqliteCandidateStore {
    fn fetch(&self, tokens: &[String], limit: usize) -> Result<Vec<RawCandidate>> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let sql = self.select_sql(tokens.len());
        let mut params = tokens
            .iter()
            .map(|t| SqlValue::Text(t.clone()))
            .collect::<Vec<_>>();
        params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));

        let conn = self.conn.lock();
        let mut statement = conn
            .prepare(&sql)
            .with_context(|| format!("failed preparing candidate query on {}", self.table))?;
        let mut rows = statement.query(params_from_iter(params))?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let content: String = row.get(0)?;
            let mut columns = Metadata::new();
            for (idx, name) in self.metadata_columns.iter().enumerate() {
                columns.insert(name.clone(), sql_to_json(row.get_ref(idx + 1)?));
            }
            out.push(RawCandidate { content, columns });
        }
        tracing::debug!(table = %self.table, rows = out.len(), "fetched sqlite candidates");
        Ok(out)
    }
}

fn quote(identifier: &str) -> String {
    format!("\"{identifier}\"")
}

fn json_to_sql(value: Option<&JsonValue>) -> SqlValue {
    match value {
        None | Some(JsonValue::Null) => SqlValue::Null,
        Some(JsonValue::Bool(b)) => SqlValue::Integer(i64::from(*b)),
        Some(JsonValue::Number(n)) => n.as_i64().map_or_else(
            || SqlValue::Real(n.as_f64().unwrap_or_default()),
            SqlValue::Integer,
        ),
        Some(JsonValue::String(s)) => SqlValue::Text(s.clone()),
        Some(other) => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(i) => i.into(),
        ValueRef::Real(f) => f.into(),
        ValueRef::Text(text) => String::from_utf8_lossy(text).into_owned().into(),
        ValueRef::Blob(bytes) => bytes.iter().map(|b| JsonValue::from(*b)).collect(),
    }
}
