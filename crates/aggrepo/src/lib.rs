//! # aggrepo
//!
//! A dialect-aware persistence layer mapping typed aggregates to
//! relational rows, without requiring the aggregate to implement any
//! trait.
//!
//! ## Features
//!
//! - **Specification predicates**: composable [`Spec`] trees compiled to
//!   dialect-correct parameterized SQL with contiguous placeholders
//! - **Three dialects**: [`Postgres`], [`MySql`], [`Sqlite`]; upsert,
//!   placeholder and case-insensitive-match syntax behind one trait
//! - **Keyset pagination**: opaque cursors plus a stable, reversible
//!   total order over arbitrary multi-column sorts
//! - **Composite aggregates**: parent + child tables with batched child
//!   loading and transactional, strategy-driven child synchronization
//! - **Optimistic locking**: version-column guard; a lost race surfaces
//!   as a [`Error::ConcurrentModification`], never a silent overwrite
//! - **Capability seams**: the repository drives any [`Executor`] /
//!   [`TxBeginner`] the caller supplies and owns no connections
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use aggrepo::{Direction, Postgres, Repository, SimpleMapping, Spec, Table};
//!
//! let repo = Repository::simple(
//!     db,
//!     Arc::new(Postgres),
//!     SimpleMapping::new(
//!         Table::new("users", &["id"], &["id", "email", "version"]).with_version("version"),
//!         |row| Ok(User { id: row.get(0)?, email: row.get(1)?, version: row.get(2)? }),
//!         |u| vec![u.id.into(), u.email.clone().into(), u.version.into()],
//!     ),
//! );
//!
//! let active = repo
//!     .query()
//!     .filter(Spec::ilike("email", "%@example.com"))
//!     .order_by("id", Direction::Asc)
//!     .all()
//!     .await?;
//! ```

pub mod cursor;
pub mod dialect;
pub mod error;
pub mod executor;
pub mod mapping;
pub mod query;
pub mod repository;
pub mod row;
pub mod schema;
pub mod spec;
pub mod value;

mod driver;

pub use cursor::{Cursor, Page, decode_cursor, encode_cursor};
pub use dialect::{Dialect, MySql, Postgres, Sqlite, UpsertOptions};
pub use error::{Error, Result};
pub use executor::{Database, Executor, Transaction, TxBeginner};
pub use mapping::{CompositeMapping, SimpleMapping};
pub use query::{Direction, Query};
pub use repository::Repository;
pub use row::{FromValue, Row};
pub use schema::{CompositeValues, Relation, SaveStrategy, Table};
pub use spec::Spec;
pub use value::Value;

#[cfg(feature = "postgres")]
pub mod pg;

#[cfg(feature = "postgres")]
pub use pg::{PgDatabase, PgTransaction};
