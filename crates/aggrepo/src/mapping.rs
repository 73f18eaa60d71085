//! Aggregate-to-table mapping configurations.
//!
//! A mapping bundles the schema descriptor with the functions that move
//! data across the row boundary. The aggregate type implements no trait;
//! everything the drivers need is injected here, and the column order of
//! every function must agree with the descriptor's `columns`.

use std::sync::Arc;

use crate::error::Result;
use crate::row::Row;
use crate::schema::{CompositeValues, Relation, Table};
use crate::value::Value;

pub(crate) type ScanFn<T> = Arc<dyn Fn(&Row) -> Result<T> + Send + Sync>;
pub(crate) type ValuesFn<T> = Arc<dyn Fn(&T) -> Vec<Value> + Send + Sync>;
pub(crate) type ScanRootFn<S> = Arc<dyn Fn(&Row) -> Result<S> + Send + Sync>;
pub(crate) type ScanChildFn<S> = Arc<dyn Fn(&str, &Row, &mut S) -> Result<()> + Send + Sync>;
pub(crate) type BuildFn<S, T> = Arc<dyn Fn(S) -> Result<T> + Send + Sync>;
pub(crate) type DecomposeFn<T> = Arc<dyn Fn(&T) -> CompositeValues + Send + Sync>;
pub(crate) type ExtractPkFn<S> = Arc<dyn Fn(&S) -> Value + Send + Sync>;

/// Mapping for a single-table aggregate.
///
/// # Example
/// ```
/// use aggrepo::{Row, SimpleMapping, Table};
///
/// #[derive(Clone)]
/// struct User { id: i64, email: String }
///
/// let mapping = SimpleMapping::new(
///     Table::new("users", &["id"], &["id", "email"]),
///     |row: &Row| Ok(User { id: row.get(0)?, email: row.get(1)? }),
///     |user: &User| vec![user.id.into(), user.email.clone().into()],
/// );
/// # let _ = mapping;
/// ```
pub struct SimpleMapping<T> {
    pub(crate) table: Table,
    pub(crate) scan: ScanFn<T>,
    pub(crate) values: ValuesFn<T>,
}

impl<T> SimpleMapping<T> {
    pub fn new(
        table: Table,
        scan: impl Fn(&Row) -> Result<T> + Send + Sync + 'static,
        values: impl Fn(&T) -> Vec<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            table,
            scan: Arc::new(scan),
            values: Arc::new(values),
        }
    }
}

/// Mapping for a composite aggregate spanning a parent table and child
/// relations.
///
/// `S` is the snapshot: a flat intermediate record bridging SQL rows and
/// the aggregate's public construction. Child rows are folded into it by
/// `scan_child` (keyed by relation table name) before `build` produces
/// the final aggregate.
pub struct CompositeMapping<T, S> {
    pub(crate) table: Table,
    pub(crate) relations: Vec<Relation>,
    pub(crate) scan_root: ScanRootFn<S>,
    pub(crate) scan_child: ScanChildFn<S>,
    pub(crate) build: BuildFn<S, T>,
    pub(crate) decompose: DecomposeFn<T>,
    pub(crate) extract_pk: ExtractPkFn<S>,
}

impl<T, S> CompositeMapping<T, S> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        table: Table,
        relations: Vec<Relation>,
        scan_root: impl Fn(&Row) -> Result<S> + Send + Sync + 'static,
        scan_child: impl Fn(&str, &Row, &mut S) -> Result<()> + Send + Sync + 'static,
        build: impl Fn(S) -> Result<T> + Send + Sync + 'static,
        decompose: impl Fn(&T) -> CompositeValues + Send + Sync + 'static,
        extract_pk: impl Fn(&S) -> Value + Send + Sync + 'static,
    ) -> Self {
        Self {
            table,
            relations,
            scan_root: Arc::new(scan_root),
            scan_child: Arc::new(scan_child),
            build: Arc::new(build),
            decompose: Arc::new(decompose),
            extract_pk: Arc::new(extract_pk),
        }
    }
}
