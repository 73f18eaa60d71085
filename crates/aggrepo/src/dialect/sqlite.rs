//! SQLite dialect.

use super::{Dialect, UpsertOptions, insert_clause};

/// SQLite: `?` placeholders, `ON CONFLICT ... DO UPDATE` with lowercase
/// `excluded`, `datetime('now')` timestamps.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    fn placeholder(&self, _n: usize) -> String {
        "?".to_string()
    }

    fn now(&self) -> &'static str {
        "datetime('now')"
    }

    fn ilike_op(&self) -> &'static str {
        "LIKE"
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
                set_clauses.push(format!("{col} = {col} + 1"));
                continue;
            }
            set_clauses.push(format!("{col} = excluded.{col}"));
        }
        if let Some(updated) = opts.updated_at {
            set_clauses.push(format!("{updated} = {}", self.now()));
        }

        if set_clauses.is_empty() {
            // Every column is part of the key: nothing to update.
            return format!("{insert} ON CONFLICT({}) DO NOTHING", pks.join(", "));
        }

        let mut conflict = format!(
            " ON CONFLICT({}) DO UPDATE SET {}",
            pks.join(", "),
            set_clauses.join(", ")
        );

        if let Some(version) = opts.version_column {
            // Inside DO UPDATE, a bare column names the stored row.
            conflict.push_str(&format!(" WHERE {version} = excluded.{version}"));
        }

        insert + &conflict
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

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn upsert_basic() {
        let sql = Sqlite.upsert_sql(
            "users",
            &cols(&["id"]),
            &cols(&["id", "name"]),
            UpsertOptions::default(),
        );
        assert_eq!(
            sql,
            "INSERT INTO users (id, name) VALUES (?, ?) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name"
        );
    }

    #[test]
    fn upsert_with_version_guards_on_excluded() {
        let opts = UpsertOptions {
            version_column: Some("version"),
            created_at: Some("created_at"),
            updated_at: Some("updated_at"),
        };
        let sql = Sqlite.upsert_sql(
            "users",
            &cols(&["id"]),
            &cols(&["id", "name", "version"]),
            opts,
        );
        assert_eq!(
            sql,
            "INSERT INTO users (id, name, version, created_at, updated_at) \
             VALUES (?, ?, ?, datetime('now'), datetime('now')) \
             ON CONFLICT(id) DO UPDATE SET name = excluded.name, \
             version = version + 1, updated_at = datetime('now') \
             WHERE version = excluded.version"
        );
    }

    #[test]
    fn upsert_with_no_updatable_column_is_do_nothing() {
        let sql = Sqlite.upsert_sql(
            "post_tags",
            &cols(&["post_id", "tag_id"]),
            &cols(&["post_id", "tag_id"]),
            UpsertOptions::default(),
        );
        assert_eq!(
            sql,
            "INSERT INTO post_tags (post_id, tag_id) VALUES (?, ?) \
             ON CONFLICT(post_id, tag_id) DO NOTHING"
        );
    }
}
