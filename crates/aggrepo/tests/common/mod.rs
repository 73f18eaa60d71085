//! Scripted in-memory database for driving repositories in tests.
//!
//! Results are queued ahead of time; every statement is recorded with
//! its arguments, and transaction begin/commit/rollback calls are
//! counted so tests can assert the exact wire-level behavior.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use aggrepo::{Error, Executor, Result, Row, Transaction, TxBeginner, Value};
use async_trait::async_trait;

#[derive(Default)]
struct FakeState {
    query_results: VecDeque<std::result::Result<Vec<Row>, String>>,
    exec_results: VecDeque<std::result::Result<u64, String>>,
    statements: Vec<(String, Vec<Value>)>,
    begun: usize,
    committed: usize,
    rolled_back: usize,
}

#[derive(Default, Clone)]
pub struct FakeDb {
    state: Arc<Mutex<FakeState>>,
}

impl FakeDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful query result.
    pub fn push_rows(&self, rows: Vec<Vec<Value>>) {
        self.state
            .lock()
            .unwrap()
            .query_results
            .push_back(Ok(rows.into_iter().map(Row::from_values).collect()));
    }

    /// Queue a failing query.
    pub fn push_query_error(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .query_results
            .push_back(Err(message.to_string()));
    }

    /// Queue a successful statement with an affected-row count.
    pub fn push_affected(&self, n: u64) {
        self.state.lock().unwrap().exec_results.push_back(Ok(n));
    }

    /// Queue a failing statement.
    pub fn push_exec_error(&self, message: &str) {
        self.state
            .lock()
            .unwrap()
            .exec_results
            .push_back(Err(message.to_string()));
    }

    /// Every statement issued so far, with its arguments.
    pub fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.state.lock().unwrap().statements.clone()
    }

    /// Just the SQL text of every statement issued so far.
    pub fn statement_sql(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    pub fn begun(&self) -> usize {
        self.state.lock().unwrap().begun
    }

    pub fn committed(&self) -> usize {
        self.state.lock().unwrap().committed
    }

    pub fn rolled_back(&self) -> usize {
        self.state.lock().unwrap().rolled_back
    }
}

fn run_query(state: &Mutex<FakeState>, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
    let mut state = state.lock().unwrap();
    state.statements.push((sql.to_string(), args.to_vec()));
    match state.query_results.pop_front() {
        Some(Ok(rows)) => Ok(rows),
        Some(Err(message)) => Err(Error::database("query", message)),
        None => Err(Error::database("query", "no scripted query result".to_string())),
    }
}

fn run_exec(state: &Mutex<FakeState>, sql: &str, args: &[Value]) -> Result<u64> {
    let mut state = state.lock().unwrap();
    state.statements.push((sql.to_string(), args.to_vec()));
    match state.exec_results.pop_front() {
        Some(Ok(n)) => Ok(n),
        Some(Err(message)) => Err(Error::database("execute", message)),
        None => Err(Error::database("execute", "no scripted exec result".to_string())),
    }
}

#[async_trait]
impl Executor for FakeDb {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        run_query(&self.state, sql, args)
    }

    async fn query_opt(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        run_query(&self.state, sql, args).map(|rows| rows.into_iter().next())
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        run_exec(&self.state, sql, args)
    }
}

#[async_trait]
impl TxBeginner for FakeDb {
    async fn begin(&self) -> Result<Box<dyn Transaction + '_>> {
        self.state.lock().unwrap().begun += 1;
        Ok(Box::new(FakeTx {
            state: self.state.clone(),
        }))
    }
}

pub struct FakeTx {
    state: Arc<Mutex<FakeState>>,
}

#[async_trait]
impl Executor for FakeTx {
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>> {
        run_query(&self.state, sql, args)
    }

    async fn query_opt(&self, sql: &str, args: &[Value]) -> Result<Option<Row>> {
        run_query(&self.state, sql, args).map(|rows| rows.into_iter().next())
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64> {
        run_exec(&self.state, sql, args)
    }
}

#[async_trait]
impl Transaction for FakeTx {
    async fn commit(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().committed += 1;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().rolled_back += 1;
        Ok(())
    }
}
