//! Public repository facade.
//!
//! A repository wires a dialect, a table descriptor and a driver to a
//! caller-supplied database handle. All per-call state is freshly
//! allocated; the configuration held here is immutable, so one
//! repository may serve concurrent callers without locking. Concurrent
//! writers to the same row are arbitrated solely by the optimistic
//! version column, never by internal retries.

use std::sync::Arc;

use crate::dialect::Dialect;
use crate::driver::{CompositeDriver, Driver, SimpleDriver};
use crate::error::{Error, Result};
use crate::executor::{Database, Executor, TxBeginner};
use crate::mapping::{CompositeMapping, SimpleMapping};
use crate::query::Query;
use crate::schema::Table;
use crate::spec::Spec;
use crate::value::Value;

/// Repository for aggregates of type `T`.
///
/// # Example
/// ```ignore
/// let repo = Repository::simple(db, Arc::new(Postgres), mapping);
/// let user = repo.find(&[1_i64.into()]).await?;
/// ```
pub struct Repository<T> {
    pub(crate) db: Arc<dyn Database>,
    pub(crate) table: Table,
    pub(crate) dialect: Arc<dyn Dialect>,
    pub(crate) driver: Box<dyn Driver<T>>,
}

impl<T: Send + Sync + 'static> Repository<T> {
    /// Build a repository over a single-table aggregate.
    pub fn simple(
        db: Arc<dyn Database>,
        dialect: Arc<dyn Dialect>,
        mapping: SimpleMapping<T>,
    ) -> Self {
        let table = mapping.table.clone();
        let driver: Box<dyn Driver<T>> = Box::new(SimpleDriver::new(mapping, dialect.clone()));
        Self {
            db,
            table,
            dialect,
            driver,
        }
    }

    /// Build a repository over a composite aggregate with snapshot type
    /// `S`.
    pub fn composite<S: Send + Sync + 'static>(
        db: Arc<dyn Database>,
        dialect: Arc<dyn Dialect>,
        mapping: CompositeMapping<T, S>,
    ) -> Self {
        let table = mapping.table.clone();
        let driver: Box<dyn Driver<T>> = Box::new(CompositeDriver::new(mapping, dialect.clone()));
        Self {
            db,
            table,
            dialect,
            driver,
        }
    }

    /// The table descriptor this repository persists to.
    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Fetch one aggregate by primary key. `ids` must carry one value
    /// per declared primary-key column, in declaration order.
    pub async fn find(&self, ids: &[Value]) -> Result<T> {
        let mut spec = self.pk_spec(ids)?;
        if let Some(guard) = self.soft_delete_spec() {
            spec = Spec::and(vec![guard, spec]);
        }
        let (condition, args, _) = spec.to_sql(self.dialect.as_ref(), 1);
        let query = self.table.select_where(&condition);
        self.driver.find_one(self.db.as_ref(), &query, &args).await
    }

    /// Fetch every aggregate matching `spec` (`None` selects all).
    pub async fn find_by(&self, spec: Option<Spec>) -> Result<Vec<T>> {
        let (query, args) = match self.with_soft_delete(spec) {
            Some(spec) => {
                let (condition, args, _) = spec.to_sql(self.dialect.as_ref(), 1);
                (self.table.select_where(&condition), args)
            }
            None => (self.table.select_from(), Vec::new()),
        };
        self.driver.find_many(self.db.as_ref(), &query, &args).await
    }

    /// Check whether any aggregate matches `spec`.
    pub async fn exists_by(&self, spec: Option<Spec>) -> Result<bool> {
        let (query, args) = match self.with_soft_delete(spec) {
            Some(spec) => {
                let (condition, args, _) = spec.to_sql(self.dialect.as_ref(), 1);
                (
                    format!(
                        "SELECT EXISTS(SELECT 1 FROM {} WHERE {condition})",
                        self.table.name
                    ),
                    args,
                )
            }
            None => (
                format!("SELECT EXISTS(SELECT 1 FROM {})", self.table.name),
                Vec::new(),
            ),
        };
        let row = self
            .db
            .query_opt(&query, &args)
            .await?
            .ok_or(Error::NotFound)?;
        row.get(0)
    }

    /// Count aggregates matching `spec`.
    pub async fn count_by(&self, spec: Option<Spec>) -> Result<i64> {
        let (query, args) = match self.with_soft_delete(spec) {
            Some(spec) => {
                let (condition, args, _) = spec.to_sql(self.dialect.as_ref(), 1);
                (
                    format!("SELECT COUNT(*) FROM {} WHERE {condition}", self.table.name),
                    args,
                )
            }
            None => (format!("SELECT COUNT(*) FROM {}", self.table.name), Vec::new()),
        };
        let row = self
            .db
            .query_opt(&query, &args)
            .await?
            .ok_or(Error::NotFound)?;
        row.get(0)
    }

    /// Insert or update an aggregate. Composite saves with relations run
    /// inside a transaction begun on this repository's database.
    pub async fn save(&self, aggregate: &T) -> Result<()> {
        let db: &dyn TxBeginner = self.db.as_ref();
        self.driver
            .save(Some(db), self.db.as_ref(), aggregate)
            .await
    }

    /// Insert or update an aggregate inside an already-open transaction.
    /// No nested transaction is started; the caller commits or rolls
    /// back, and accepts partial-write risk if `tx` is not actually
    /// transactional.
    pub async fn save_tx(&self, tx: &dyn Executor, aggregate: &T) -> Result<()> {
        self.driver.save(None, tx, aggregate).await
    }

    /// Delete by primary key (soft delete when the table declares a
    /// soft-delete column).
    pub async fn delete(&self, ids: &[Value]) -> Result<()> {
        self.check_pk_arity(ids)?;
        let db: &dyn TxBeginner = self.db.as_ref();
        self.driver.delete(Some(db), self.db.as_ref(), ids).await
    }

    /// Delete by primary key inside an already-open transaction.
    pub async fn delete_tx(&self, tx: &dyn Executor, ids: &[Value]) -> Result<()> {
        self.check_pk_arity(ids)?;
        self.driver.delete(None, tx, ids).await
    }

    /// Start building a query against this repository.
    pub fn query(&self) -> Query<'_, T> {
        Query::new(self)
    }

    fn check_pk_arity(&self, ids: &[Value]) -> Result<()> {
        if ids.len() != self.table.primary_key.len() {
            return Err(Error::config(format!(
                "table {} declares {} primary key column(s), got {} value(s)",
                self.table.name,
                self.table.primary_key.len(),
                ids.len()
            )));
        }
        Ok(())
    }

    fn pk_spec(&self, ids: &[Value]) -> Result<Spec> {
        self.check_pk_arity(ids)?;
        if ids.len() == 1 {
            return Ok(Spec::eq(self.table.primary_key[0].clone(), ids[0].clone()));
        }
        Ok(Spec::and(
            self.table
                .primary_key
                .iter()
                .zip(ids)
                .map(|(col, id)| Spec::eq(col.clone(), id.clone()))
                .collect(),
        ))
    }

    pub(crate) fn soft_delete_spec(&self) -> Option<Spec> {
        self.table
            .soft_delete_column
            .as_ref()
            .map(|column| Spec::is_null(column.clone()))
    }

    /// AND the implicit soft-delete guard into `spec`, when configured.
    pub(crate) fn with_soft_delete(&self, spec: Option<Spec>) -> Option<Spec> {
        match (self.soft_delete_spec(), spec) {
            (Some(guard), Some(spec)) => Some(Spec::and(vec![guard, spec])),
            (Some(guard), None) => Some(guard),
            (None, spec) => spec,
        }
    }
}
