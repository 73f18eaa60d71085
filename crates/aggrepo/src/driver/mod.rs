//! Persistence drivers: given compiled SQL and arguments, execute
//! against a caller-supplied executor.

mod composite;
mod simple;

pub(crate) use composite::CompositeDriver;
pub(crate) use simple::SimpleDriver;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::executor::{Executor, TxBeginner};
use crate::schema::Table;
use crate::value::Value;

/// Operations shared by the simple and composite drivers.
///
/// `db` is `Some` when the driver may open its own transaction and
/// `None` when the caller already supplied one (the enclosing
/// transaction is reused, never nested).
#[async_trait]
pub(crate) trait Driver<T: Send + Sync>: Send + Sync {
    async fn find_one(&self, exec: &dyn Executor, query: &str, args: &[Value]) -> Result<T>;

    async fn find_many(&self, exec: &dyn Executor, query: &str, args: &[Value])
    -> Result<Vec<T>>;

    async fn save(
        &self,
        db: Option<&dyn TxBeginner>,
        exec: &dyn Executor,
        aggregate: &T,
    ) -> Result<()>;

    async fn delete(
        &self,
        db: Option<&dyn TxBeginner>,
        exec: &dyn Executor,
        ids: &[Value],
    ) -> Result<()>;
}

/// Optimistic-lock check: on a versioned table, zero affected rows means
/// a concurrent writer won the race.
pub(crate) fn check_version(table: &Table, affected: u64) -> Result<()> {
    if table.version_column.is_none() {
        return Ok(());
    }
    if affected == 0 {
        return Err(Error::ConcurrentModification);
    }
    Ok(())
}
