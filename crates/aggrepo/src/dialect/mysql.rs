//! MySQL dialect.

use super::{Dialect, UpsertOptions, insert_clause};

/// MySQL: `?` placeholders, `ON DUPLICATE KEY UPDATE`.
///
/// MySQL matches case-insensitively with plain `LIKE` under the default
/// collations, and its upsert grammar admits no conflict-clause guard;
/// the optimistic-lock check relies on the affected-row count alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySql;

impl Dialect for MySql {
    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn now(&self) -> &'static str {
        "NOW()"
    }

    fn ilike_op(&self) -> &'static str {
        "LIKE"
    }

    fn quote_ident(&self, name: &str) -> String {
        format!("`{name}`")
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
                set_clauses.push(format!("{col} = {col} + 1"));
                continue;
            }
            set_clauses.push(format!("{col} = VALUES({col})"));
        }
        if let Some(updated) = opts.updated_at {
            set_clauses.push(format!("{updated} = {}", self.now()));
        }

        if set_clauses.is_empty() {
            // Every column is part of the key: nothing to update.
            return insert.replacen("INSERT INTO", "INSERT IGNORE INTO", 1);
        }

        format!("{insert} ON DUPLICATE KEY UPDATE {}", set_clauses.join(", "))
    }

    fn batch_insert_sql(&self, table: &str, columns: &[String], row_count: usize) -> String {
        let single_row: Vec<&str> = columns.iter().map(|_| "?").collect();
        let row_ph = format!("({})", single_row.join(", "));
        let all_rows = vec![row_ph; row_count];
        format!(
            "INSERT INTO {table} ({}) VALUES {}",
            columns.join(", "),
            all_rows.join(", ")
        )
    }
}
