//! Driver for single-table aggregates.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{Driver, check_version};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::executor::{Executor, TxBeginner};
use crate::mapping::{ScanFn, SimpleMapping, ValuesFn};
use crate::schema::Table;
use crate::value::Value;

pub(crate) struct SimpleDriver<T> {
    table: Table,
    dialect: Arc<dyn Dialect>,
    scan: ScanFn<T>,
    values: ValuesFn<T>,
}

impl<T> SimpleDriver<T> {
    pub(crate) fn new(mapping: SimpleMapping<T>, dialect: Arc<dyn Dialect>) -> Self {
        Self {
            table: mapping.table,
            dialect,
            scan: mapping.scan,
            values: mapping.values,
        }
    }
}

#[async_trait]
impl<T: Send + Sync + 'static> Driver<T> for SimpleDriver<T> {
    async fn find_one(&self, exec: &dyn Executor, query: &str, args: &[Value]) -> Result<T> {
        let row = exec.query_opt(query, args).await?.ok_or(Error::NotFound)?;
        (self.scan)(&row)
    }

    async fn find_many(
        &self,
        exec: &dyn Executor,
        query: &str,
        args: &[Value],
    ) -> Result<Vec<T>> {
        let rows = exec.query(query, args).await?;
        rows.iter().map(|row| (self.scan)(row)).collect()
    }

    async fn save(
        &self,
        _db: Option<&dyn TxBeginner>,
        exec: &dyn Executor,
        aggregate: &T,
    ) -> Result<()> {
        let values = (self.values)(aggregate);
        let query = self.table.upsert_sql(&*self.dialect);
        debug!(table = %self.table.name, "upsert");
        let affected = exec.execute(&query, &values).await?;
        check_version(&self.table, affected)
    }

    async fn delete(
        &self,
        _db: Option<&dyn TxBeginner>,
        exec: &dyn Executor,
        ids: &[Value],
    ) -> Result<()> {
        let query = self.table.delete_sql(&*self.dialect);
        debug!(table = %self.table.name, "delete");
        exec.execute(&query, ids).await?;
        Ok(())
    }
}
