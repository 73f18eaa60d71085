//! PostgreSQL dialect.

use super::{Dialect, UpsertOptions, insert_clause};

/// PostgreSQL: `$N` placeholders, `ILIKE`, `ON CONFLICT ... DO UPDATE`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn placeholder(&self, n: usize) -> String {
        format!("${n}")
    }

    fn now(&self) -> &'static str {
        "NOW()"
    }

    fn ilike_op(&self) -> &'static str {
        "ILIKE"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("\"{name}\"")
    }

    fn upsert_sql(
        &self,
        table: &str,
        pks: &[String],
        columns: &[String],
        opts: UpsertOptions<'_>,
    ) -> String {
        let insert = insert_clause(self, table, columns, opts);

        let mut set_clauses = Vec::with_capacity(columns.len() + 1);
        for col in columns {
            if pks.contains(col) {
                continue;
            }
            if opts.version_column == Some(col.as_str()) {
                // The stored row is table-qualified inside DO UPDATE.
                set_clauses.push(format!("{col} = {table}.{col} + 1"));
                continue;
            }
            set_clauses.push(format!("{col} = EXCLUDED.{col}"));
        }
        if let Some(updated) = opts.updated_at {
            set_clauses.push(format!("{updated} = {}", self.now()));
        }

        let mut conflict = format!(
            " ON CONFLICT ({}) DO UPDATE SET {}",
            pks.join(", "),
            set_clauses.join(", ")
        );

        if let Some(version) = opts.version_column {
            conflict.push_str(&format!(" WHERE {table}.{version} = EXCLUDED.{version}"));
        }

        insert + &conflict
    }

    fn batch_insert_sql(&self, table: &str, columns: &[String], row_count: usize) -> String {
        let col_count = columns.len();
        let rows: Vec<String> = (0..row_count)
            .map(|row| {
                let ph: Vec<String> = (0..col_count)
                    .map(|col| self.placeholder(row * col_count + col + 1))
                    .collect();
                format!("({})", ph.join(", "))
            })
            .collect();
        format!(
            "INSERT INTO {table} ({}) VALUES {}",
            columns.join(", "),
            rows.join(", ")
        )
    }
}
