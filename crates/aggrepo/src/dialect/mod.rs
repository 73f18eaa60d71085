//! SQL dialect abstraction.
//!
//! Each backend differs in placeholder syntax, current-timestamp
//! expression, case-insensitive matching and upsert grammar. Everything
//! above this module builds statements through the [`Dialect`] trait and
//! never branches on the backend itself.

mod mysql;
mod postgres;
mod sqlite;

pub use mysql::MySql;
pub use postgres::Postgres;
pub use sqlite::Sqlite;

/// Options controlling upsert generation for a table.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpsertOptions<'a> {
    /// Optimistic-lock counter column. The SET clause increments it and,
    /// where the grammar allows, the conflict clause guards on the
    /// incoming value so a stale writer affects zero rows.
    pub version_column: Option<&'a str>,
    /// Appended to the INSERT column list, bound to the dialect's `now()`.
    pub created_at: Option<&'a str>,
    /// Appended to the INSERT column list and refreshed in the SET clause.
    pub updated_at: Option<&'a str>,
}

/// Backend-specific SQL generation.
pub trait Dialect: Send + Sync {
    /// The `n`-th (1-based) statement placeholder.
    fn placeholder(&self, n: usize) -> String;

    /// Current-timestamp SQL expression.
    fn now(&self) -> &'static str;

    /// Case-insensitive pattern-match operator.
    fn ilike_op(&self) -> &'static str;

    /// Quote an identifier.
    fn quote_ident(&self, name: &str) -> String;

    /// Insert-or-update statement keyed by the primary key columns.
    ///
    /// Primary-key columns are never part of the SET clause; a version
    /// column is incremented rather than overwritten.
    fn upsert_sql(
        &self,
        table: &str,
        pks: &[String],
        columns: &[String],
        opts: UpsertOptions<'_>,
    ) -> String;

    /// Multi-row INSERT with one placeholder tuple per row; placeholder
    /// numbering is contiguous across the whole statement.
    fn batch_insert_sql(&self, table: &str, columns: &[String], row_count: usize) -> String;
}

/// Shared INSERT prefix: `INSERT INTO t (cols...) VALUES (ph...)` with
/// timestamp columns appended and bound to `now()`.
fn insert_clause(
    dialect: &dyn Dialect,
    table: &str,
    columns: &[String],
    opts: UpsertOptions<'_>,
) -> String {
    let mut insert_cols: Vec<String> = columns.to_vec();
    let mut value_ph: Vec<String> = (1..=columns.len())
        .map(|i| dialect.placeholder(i))
        .collect();

    if let Some(created) = opts.created_at {
        insert_cols.push(created.to_string());
        value_ph.push(dialect.now().to_string());
    }
    if let Some(updated) = opts.updated_at {
        insert_cols.push(updated.to_string());
        value_ph.push(dialect.now().to_string());
    }

    format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        insert_cols.join(", "),
        value_ph.join(", ")
    )
}
