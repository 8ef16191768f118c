//! SQL statement factory
//!
//! Emits dialect-correct SQL for the `evaluations` table: SQLite uses `?`
//! placeholders and stores the entity as TEXT, PostgreSQL uses `$n` and
//! JSONB. Identifiers are always double-quoted with internal quotes
//! doubled. Unsupported drivers fail at factory construction, not at query
//! time.

use shared::error::{Result, ServiceError};

/// Columns of the `evaluations` table, in insert order
pub const COLUMNS: [&str; 7] = [
    "id",
    "tenant_id",
    "status",
    "experiment_id",
    "entity",
    "created_at",
    "updated_at",
];

/// Supported SQL dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl Dialect {
    /// Parse the configured driver name
    pub fn parse(driver: &str) -> Result<Self> {
        match driver {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            other => Err(ServiceError::config(format!(
                "Unsupported database driver: {other}"
            ))),
        }
    }

    /// Positional placeholder for the n-th bind (1-indexed)
    fn placeholder(&self, n: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${n}"),
        }
    }
}

/// Double-quote an identifier, doubling internal quotes
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Dialect-correct statements for one entity table
#[derive(Debug, Clone)]
pub struct Statements {
    dialect: Dialect,
    table: String,
}

impl Statements {
    /// Build a factory for the configured driver
    pub fn new(driver: &str) -> Result<Self> {
        Ok(Self {
            dialect: Dialect::parse(driver)?,
            table: "evaluations".to_string(),
        })
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    fn column_list(&self) -> String {
        COLUMNS
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// DDL for the entity tables. The `collections` table mirrors the
    /// schema for the collection feature and is otherwise untouched.
    pub fn create_schema(&self) -> Vec<String> {
        let (entity_type, timestamp_type) = match self.dialect {
            Dialect::Sqlite => ("TEXT", "TIMESTAMP"),
            Dialect::Postgres => ("JSONB", "TIMESTAMPTZ"),
        };
        ["evaluations", "collections"]
            .iter()
            .map(|table| {
                format!(
                    "CREATE TABLE IF NOT EXISTS {} ({} TEXT PRIMARY KEY, {} TEXT NOT NULL, \
                     {} TEXT NOT NULL, {} TEXT, {} {entity_type} NOT NULL, \
                     {} {timestamp_type} NOT NULL, {} {timestamp_type} NOT NULL)",
                    quote_ident(table),
                    quote_ident("id"),
                    quote_ident("tenant_id"),
                    quote_ident("status"),
                    quote_ident("experiment_id"),
                    quote_ident("entity"),
                    quote_ident("created_at"),
                    quote_ident("updated_at"),
                )
            })
            .collect()
    }

    pub fn insert_job(&self) -> String {
        let placeholders = (1..=COLUMNS.len())
            .map(|n| self.dialect.placeholder(n))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({placeholders})",
            quote_ident(&self.table),
            self.column_list(),
        )
    }

    pub fn select_job(&self) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.column_list(),
            quote_ident(&self.table),
            quote_ident("id"),
            self.dialect.placeholder(1),
        )
    }

    /// LIST with the same optional status filter as [`Self::count_jobs`]
    pub fn list_jobs(&self, with_status_filter: bool) -> String {
        let mut n = 0;
        let mut next = || {
            n += 1;
            self.dialect.placeholder(n)
        };
        let filter = if with_status_filter {
            format!(" WHERE {} = {}", quote_ident("status"), next())
        } else {
            String::new()
        };
        format!(
            "SELECT {} FROM {}{filter} ORDER BY {} DESC LIMIT {} OFFSET {}",
            self.column_list(),
            quote_ident(&self.table),
            quote_ident("id"),
            next(),
            next(),
        )
    }

    pub fn count_jobs(&self, with_status_filter: bool) -> String {
        let filter = if with_status_filter {
            format!(
                " WHERE {} = {}",
                quote_ident("status"),
                self.dialect.placeholder(1)
            )
        } else {
            String::new()
        };
        format!("SELECT COUNT(*) FROM {}{filter}", quote_ident(&self.table))
    }

    /// Write back both the denormalized status column and the entity blob
    pub fn update_status_and_entity(&self) -> String {
        format!(
            "UPDATE {} SET {} = {}, {} = {}, {} = {} WHERE {} = {}",
            quote_ident(&self.table),
            quote_ident("status"),
            self.dialect.placeholder(1),
            quote_ident("entity"),
            self.dialect.placeholder(2),
            quote_ident("updated_at"),
            self.dialect.placeholder(3),
            quote_ident("id"),
            self.dialect.placeholder(4),
        )
    }

    pub fn delete_job(&self) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {}",
            quote_ident(&self.table),
            quote_ident("id"),
            self.dialect.placeholder(1),
        )
    }
}
