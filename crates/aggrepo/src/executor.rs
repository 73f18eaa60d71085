//! Database access capabilities consumed by the drivers.
//!
//! The repository never provisions connections; it drives whatever the
//! caller hands it through these traits. Pass a [`Transaction`] anywhere
//! an [`Executor`] is expected to compose operations into an enclosing
//! transaction.

use async_trait::async_trait;

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// Statement execution capability.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run a query and materialize every result row.
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>>;

    /// Run a query expected to return at most one row.
    async fn query_opt(&self, sql: &str, args: &[Value]) -> Result<Option<Row>>;

    /// Run a statement and return the affected-row count.
    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64>;
}

/// An open transaction. Dropping one without calling either method
/// leaves the disposition to the adapter; the drivers always commit or
/// roll back explicitly.
#[async_trait]
pub trait Transaction: Executor {
    async fn commit(self: Box<Self>) -> Result<()>;
    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Transaction provisioning capability.
#[async_trait]
pub trait TxBeginner: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction + '_>>;
}

/// A full database handle: runs statements and opens transactions.
///
/// Blanket-implemented for anything providing both capabilities.
pub trait Database: Executor + TxBeginner {}

impl<T: Executor + TxBeginner + ?Sized> Database for T {}
