//! Static schema descriptors: tables and child relations.
//!
//! A [`Table`] describes the parent row of an aggregate, a [`Relation`]
//! one child table of a composite aggregate. Both are configured once
//! when a repository is built and shared immutably by every operation.

use std::collections::HashMap;

use crate::dialect::{Dialect, UpsertOptions};
use crate::value::Value;

/// How a relation's child rows are written on save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveStrategy {
    /// Delete all existing children by foreign key, then batch-insert
    /// the new set.
    #[default]
    DeleteAndReinsert,
    /// One upsert statement per child row.
    Upsert,
}

/// Descriptor of an aggregate's parent table.
///
/// `columns` order must match the tuple order produced and consumed by
/// the aggregate's scan/values functions; `primary_key` columns must be
/// a subset of `columns`.
///
/// # Example
/// ```
/// use aggrepo::Table;
///
/// let table = Table::new("users", &["id"], &["id", "email", "version"])
///     .with_version("version")
///     .with_soft_delete("deleted_at");
/// ```
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    pub primary_key: Vec<String>,
    pub columns: Vec<String>,
    pub version_column: Option<String>,
    pub soft_delete_column: Option<String>,
    pub created_at_column: Option<String>,
    pub updated_at_column: Option<String>,
}

impl Table {
    /// Create a table descriptor with the given name, primary key
    /// columns and scan-ordered column list.
    pub fn new(name: impl Into<String>, primary_key: &[&str], columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.iter().map(|s| s.to_string()).collect(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            version_column: None,
            soft_delete_column: None,
            created_at_column: None,
            updated_at_column: None,
        }
    }

    /// Declare an optimistic-lock version column.
    pub fn with_version(mut self, column: impl Into<String>) -> Self {
        self.version_column = Some(column.into());
        self
    }

    /// Declare a soft-delete timestamp column. Reads then implicitly
    /// filter on `column IS NULL` and deletes become updates.
    pub fn with_soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    /// Declare a created-at column, bound to the dialect's `now()` on
    /// insert.
    pub fn with_created_at(mut self, column: impl Into<String>) -> Self {
        self.created_at_column = Some(column.into());
        self
    }

    /// Declare an updated-at column, refreshed on every write.
    pub fn with_updated_at(mut self, column: impl Into<String>) -> Self {
        self.updated_at_column = Some(column.into());
        self
    }

    pub(crate) fn select_from(&self) -> String {
        format!("SELECT {} FROM {}", self.columns.join(", "), self.name)
    }

    pub(crate) fn select_where(&self, condition: &str) -> String {
        format!("{} WHERE {condition}", self.select_from())
    }

    pub(crate) fn upsert_sql(&self, dialect: &dyn Dialect) -> String {
        dialect.upsert_sql(
            &self.name,
            &self.primary_key,
            &self.columns,
            UpsertOptions {
                version_column: self.version_column.as_deref(),
                created_at: self.created_at_column.as_deref(),
                updated_at: self.updated_at_column.as_deref(),
            },
        )
    }

    pub(crate) fn delete_sql(&self, dialect: &dyn Dialect) -> String {
        let where_parts: Vec<String> = self
            .primary_key
            .iter()
            .enumerate()
            .map(|(i, pk)| format!("{pk} = {}", dialect.placeholder(i + 1)))
            .collect();
        let where_clause = where_parts.join(" AND ");

        match &self.soft_delete_column {
            Some(soft) => format!(
                "UPDATE {} SET {soft} = {} WHERE {where_clause} AND {soft} IS NULL",
                self.name,
                dialect.now()
            ),
            None => format!("DELETE FROM {} WHERE {where_clause}", self.name),
        }
    }
}

/// Descriptor of one child table of a composite aggregate.
///
/// `foreign_key` must appear in `columns`; batch loading uses its
/// position to route each child row back to its parent snapshot.
#[derive(Debug, Clone)]
pub struct Relation {
    pub table: String,
    pub foreign_key: String,
    pub primary_key: String,
    pub columns: Vec<String>,
    pub on_save: SaveStrategy,
}

impl Relation {
    /// Create a relation descriptor.
    pub fn new(
        table: impl Into<String>,
        foreign_key: impl Into<String>,
        primary_key: impl Into<String>,
        columns: &[&str],
    ) -> Self {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into(),
            primary_key: primary_key.into(),
            columns: columns.iter().map(|s| s.to_string()).collect(),
            on_save: SaveStrategy::default(),
        }
    }

    /// Choose the save strategy for this relation.
    pub fn on_save(mut self, strategy: SaveStrategy) -> Self {
        self.on_save = strategy;
        self
    }

    pub(crate) fn select_by_fk(&self, dialect: &dyn Dialect) -> String {
        format!(
            "SELECT {} FROM {} WHERE {} = {}",
            self.columns.join(", "),
            self.table,
            self.foreign_key,
            dialect.placeholder(1)
        )
    }

    pub(crate) fn delete_by_fk(&self, dialect: &dyn Dialect) -> String {
        format!(
            "DELETE FROM {} WHERE {} = {}",
            self.table,
            self.foreign_key,
            dialect.placeholder(1)
        )
    }

    pub(crate) fn batch_select_by_fks(&self, dialect: &dyn Dialect, count: usize) -> String {
        let placeholders: Vec<String> = (1..=count).map(|i| dialect.placeholder(i)).collect();
        format!(
            "SELECT {} FROM {} WHERE {} IN ({})",
            self.columns.join(", "),
            self.table,
            self.foreign_key,
            placeholders.join(", ")
        )
    }

    pub(crate) fn upsert_sql(&self, dialect: &dyn Dialect) -> String {
        dialect.upsert_sql(
            &self.table,
            std::slice::from_ref(&self.primary_key),
            &self.columns,
            UpsertOptions::default(),
        )
    }

    pub(crate) fn batch_insert_sql(&self, dialect: &dyn Dialect, row_count: usize) -> String {
        dialect.batch_insert_sql(&self.table, &self.columns, row_count)
    }

    /// Position of the foreign-key column within `columns`, if present.
    pub(crate) fn fk_column_index(&self) -> Option<usize> {
        self.columns.iter().position(|col| *col == self.foreign_key)
    }
}

/// Decomposed state of a composite aggregate, built fresh per save.
#[derive(Debug, Clone, Default)]
pub struct CompositeValues {
    /// Positional values for the parent row, in `Table.columns` order.
    pub root: Vec<Value>,
    /// Child row tuples per relation table name.
    pub children: HashMap<String, Vec<Vec<Value>>>,
}

impl CompositeValues {
    /// Start from the parent row's positional values.
    pub fn new(root: Vec<Value>) -> Self {
        Self {
            root,
            children: HashMap::new(),
        }
    }

    /// Attach the child row tuples for one relation table.
    pub fn with_children(mut self, table: impl Into<String>, rows: Vec<Vec<Value>>) -> Self {
        self.children.insert(table.into(), rows);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Postgres, Sqlite};

    fn users() -> Table {
        Table::new("users", &["id"], &["id", "email", "version"])
    }

    #[test]
    fn select_templates() {
        let t = users();
        assert_eq!(t.select_from(), "SELECT id, email, version FROM users");
        assert_eq!(
            t.select_where("id = $1"),
            "SELECT id, email, version FROM users WHERE id = $1"
        );
    }

    #[test]
    fn delete_sql_hard() {
        assert_eq!(
            users().delete_sql(&Postgres),
            "DELETE FROM users WHERE id = $1"
        );
    }

    #[test]
    fn delete_sql_composite_key() {
        let t = Table::new("memberships", &["org_id", "user_id"], &["org_id", "user_id"]);
        assert_eq!(
            t.delete_sql(&Postgres),
            "DELETE FROM memberships WHERE org_id = $1 AND user_id = $2"
        );
    }

    #[test]
    fn delete_sql_soft() {
        let t = users().with_soft_delete("deleted_at");
        assert_eq!(
            t.delete_sql(&Postgres),
            "UPDATE users SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL"
        );
        assert_eq!(
            t.delete_sql(&Sqlite),
            "UPDATE users SET deleted_at = datetime('now') WHERE id = ? AND deleted_at IS NULL"
        );
    }

    #[test]
    fn relation_templates() {
        let rel = Relation::new("order_items", "order_id", "id", &["id", "order_id", "sku"]);
        assert_eq!(
            rel.select_by_fk(&Postgres),
            "SELECT id, order_id, sku FROM order_items WHERE order_id = $1"
        );
        assert_eq!(
            rel.delete_by_fk(&Postgres),
            "DELETE FROM order_items WHERE order_id = $1"
        );
        assert_eq!(
            rel.batch_select_by_fks(&Postgres, 3),
            "SELECT id, order_id, sku FROM order_items WHERE order_id IN ($1, $2, $3)"
        );
    }

    #[test]
    fn fk_column_index_finds_position() {
        let rel = Relation::new("order_items", "order_id", "id", &["id", "order_id", "sku"]);
        assert_eq!(rel.fk_column_index(), Some(1));

        let broken = Relation::new("order_items", "order_id", "id", &["id", "sku"]);
        assert_eq!(broken.fk_column_index(), None);
    }
}
