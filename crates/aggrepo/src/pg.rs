//! tokio-postgres implementations of the database capabilities.
//!
//! [`Executor`] is implemented directly for `tokio_postgres::Client` and
//! `tokio_postgres::Transaction`, so an open transaction can be passed
//! straight into `save_tx` / `delete_tx`. [`PgDatabase`] wraps an owned
//! client behind a mutex and adds [`TxBeginner`], driving transactions
//! with explicit `BEGIN` / `COMMIT` / `ROLLBACK` statements; the mutex
//! guard is held for the transaction's lifetime, so no other statement
//! can interleave with it on the same connection.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::BytesMut;
use chrono::{DateTime, NaiveDateTime, Utc};
use postgres_types::to_sql_checked;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::executor::{Executor, Transaction, TxBeginner};
use crate::row::Row;
use crate::value::Value;

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int(v) => {
                if *ty == Type::INT2 {
                    (*v as i16).to_sql(ty, out)
                } else if *ty == Type::INT4 {
                    (*v as i32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Float(v) => {
                if *ty == Type::FLOAT4 {
                    (*v as f32).to_sql(ty, out)
                } else {
                    v.to_sql(ty, out)
                }
            }
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

impl<'a> FromSql<'a> for Value {
    fn from_sql(
        ty: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Sync + Send>> {
        if *ty == Type::BOOL {
            Ok(Value::Bool(bool::from_sql(ty, raw)?))
        } else if *ty == Type::INT2 {
            Ok(Value::Int(i16::from_sql(ty, raw)?.into()))
        } else if *ty == Type::INT4 {
            Ok(Value::Int(i32::from_sql(ty, raw)?.into()))
        } else if *ty == Type::INT8 {
            Ok(Value::Int(i64::from_sql(ty, raw)?))
        } else if *ty == Type::FLOAT4 {
            Ok(Value::Float(f32::from_sql(ty, raw)?.into()))
        } else if *ty == Type::FLOAT8 {
            Ok(Value::Float(f64::from_sql(ty, raw)?))
        } else if *ty == Type::UUID {
            Ok(Value::Uuid(Uuid::from_sql(ty, raw)?))
        } else if *ty == Type::TIMESTAMPTZ {
            Ok(Value::Timestamp(DateTime::<Utc>::from_sql(ty, raw)?))
        } else if *ty == Type::TIMESTAMP {
            Ok(Value::Timestamp(NaiveDateTime::from_sql(ty, raw)?.and_utc()))
        } else if *ty == Type::BYTEA {
            Ok(Value::Bytes(Vec::<u8>::from_sql(ty, raw)?))
        } else if *ty == Type::TEXT
            || *ty == Type::VARCHAR
            || *ty == Type::BPCHAR
            || *ty == Type::NAME
        {
            Ok(Value::Text(String::from_sql(ty, raw)?))
        } else {
            Err(format!("unsupported column type: {ty}").into())
        }
    }

    fn from_sql_null(
        _ty: &Type,
    ) -> std::result::Result<Value, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Value::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn bind<'a>(args: &'a [Value]) -> Vec<&'a (dyn ToSql + Sync)> {
    args.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn materialize(row: &tokio_postgres::Row) -> Result<Row> {
    let mut values = Vec::with_capacity(row.len());
    for index in 0..row.len() {
        let value: Value = row
            .try_get(index)
            .map_err(|err| Error::decode(index.to_string(), err.to_string()))?;
        values.push(value);
    }
    Ok(Row::from_values(values))
}

#[async_trait]
impl Executor for tokio_postgres::Client {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let rows = tokio_postgres::Client::query(self, sql, &bind(args))
            .await
            .map_err(|err| Error::database("query", err))?;
        rows.iter().map(materialize).collect()
    }

    async fn query_opt(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        let row = tokio_postgres::Client::query_opt(self, sql, &bind(args))
            .await
            .map_err(|err| Error::database("query", err))?;
        row.as_ref().map(materialize).transpose()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        tokio_postgres::Client::execute(self, sql, &bind(args))
            .await
            .map_err(|err| Error::database("execute", err))
    }
}

#[async_trait]
impl Executor for tokio_postgres::Transaction<'_> {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let rows = tokio_postgres::Transaction::query(self, sql, &bind(args))
            .await
            .map_err(|err| Error::database("query", err))?;
        rows.iter().map(materialize).collect()
    }

    async fn query_opt(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        let row = tokio_postgres::Transaction::query_opt(self, sql, &bind(args))
            .await
            .map_err(|err| Error::database("query", err))?;
        row.as_ref().map(materialize).transpose()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        tokio_postgres::Transaction::execute(self, sql, &bind(args))
            .await
            .map_err(|err| Error::database("execute", err))
    }
}

/// Owned client exposing the full [`Database`](crate::Database) surface.
pub struct PgDatabase {
    client: Arc<Mutex<tokio_postgres::Client>>,
}

impl PgDatabase {
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self {
            client: Arc::new(Mutex::new(client)),
        }
    }
}

#[async_trait]
impl Executor for PgDatabase {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        let client = self.client.lock().await;
        Executor::query(&*client, sql, args).await
    }

    async fn query_opt(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        let client = self.client.lock().await;
        Executor::query_opt(&*client, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        let client = self.client.lock().await;
        Executor::execute(&*client, sql, args).await
    }
}

#[async_trait]
impl TxBeginner for PgDatabase {
    async fn begin(&self) -> Result<Box<dyn Transaction + '_>> {
        let guard = self.client.clone().lock_owned().await;
        guard
            .batch_execute("BEGIN")
            .await
            .map_err(|err| Error::database("begin transaction", err))?;
        debug!("transaction started");
        Ok(Box::new(PgTransaction { client: guard }))
    }
}

/// An open transaction holding the connection exclusively.
pub struct PgTransaction {
    client: OwnedMutexGuard<tokio_postgres::Client>,
}

#[async_trait]
impl Executor for PgTransaction {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        Executor::query(&*self.client, sql, args).await
    }

    async fn query_opt(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        Executor::query_opt(&*self.client, sql, args).await
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        Executor::execute(&*self.client, sql, args).await
    }
}

#[async_trait]
impl Transaction for PgTransaction {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.client
            .batch_execute("COMMIT")
            .await
            .map_err(|err| Error::database("commit", err))
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.client
            .batch_execute("ROLLBACK")
            .await
            .map_err(|err| Error::database("rollback", err))
    }
}
