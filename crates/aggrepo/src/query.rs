//! Fluent query builder with offset and keyset pagination.

use std::collections::BTreeMap;

use crate::cursor::{Cursor, Page, decode_cursor, encode_cursor, keyset_spec};
use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::spec::Spec;
use crate::value::Value;

const DEFAULT_PAGE_SIZE: i64 = 20;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// One ORDER BY item. Sequence order defines sort precedence and the
/// tie-break chain for keyset pagination.
#[derive(Debug, Clone)]
pub struct OrderClause {
    pub(crate) column: String,
    pub(crate) direction: Direction,
}

/// A query under construction against one repository.
///
/// Accumulated filters are implicitly ANDed; an empty set means no
/// filter. Built fresh per call via [`Repository::query`] and consumed
/// by its terminal methods.
///
/// # Example
/// ```ignore
/// let page = repo
///     .query()
///     .filter(Spec::eq("status", "active"))
///     .order_by("created_at", Direction::Desc)
///     .page_size(50)
///     .after(token)
///     .page(|user| BTreeMap::from([("created_at".to_string(), user.created_at.into())]))
///     .await?;
/// ```
pub struct Query<'a, T> {
    repo: &'a Repository<T>,
    specs: Vec<Spec>,
    orders: Vec<OrderClause>,
    limit: Option<i64>,
    offset: Option<i64>,
    page_size: Option<i64>,
    cursor: Option<String>,
    forward: bool,
}

impl<'a, T: Send + Sync + 'static> Query<'a, T> {
    pub(crate) fn new(repo: &'a Repository<T>) -> Self {
        Self {
            repo,
            specs: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: None,
            page_size: None,
            cursor: None,
            forward: true,
        }
    }

    /// Add a predicate; all predicates are ANDed together.
    pub fn filter(mut self, spec: Spec) -> Self {
        self.specs.push(spec);
        self
    }

    /// Append an ordering column.
    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.orders.push(OrderClause {
            column: column.into(),
            direction,
        });
        self
    }

    /// Cap the number of returned rows.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Skip the first `n` rows (offset pagination).
    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    /// Page size for [`Query::page`]; defaults to 20.
    pub fn page_size(mut self, n: i64) -> Self {
        self.page_size = Some(n);
        self
    }

    /// Resume forward from a cursor token.
    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self.forward = true;
        self
    }

    /// Resume backward from a cursor token.
    pub fn before(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self.forward = false;
        self
    }

    /// Fetch every matching row.
    pub async fn all(self) -> Result<Vec<T>> {
        let (query, args) = self.build_sql();
        self.repo
            .driver
            .find_many(self.repo.db.as_ref(), &query, &args)
            .await
    }

    /// Fetch the first matching row, failing with not-found on none.
    pub async fn first(mut self) -> Result<T> {
        self.limit = Some(1);
        let (query, args) = self.build_sql();
        let mut items = self
            .repo
            .driver
            .find_many(self.repo.db.as_ref(), &query, &args)
            .await?;
        if items.is_empty() {
            return Err(Error::NotFound);
        }
        Ok(items.remove(0))
    }

    /// Count matching rows.
    pub async fn count(self) -> Result<i64> {
        let spec = self.repo.with_soft_delete(self.combined_spec());
        let (query, args) = match spec {
            Some(spec) => {
                let (condition, args, _) = spec.to_sql(self.repo.dialect.as_ref(), 1);
                (
                    format!(
                        "SELECT COUNT(*) FROM {} WHERE {condition}",
                        self.repo.table.name
                    ),
                    args,
                )
            }
            None => (
                format!("SELECT COUNT(*) FROM {}", self.repo.table.name),
                Vec::new(),
            ),
        };
        let row = self
            .repo
            .db
            .query_opt(&query, &args)
            .await?
            .ok_or(Error::NotFound)?;
        row.get(0)
    }

    /// Check whether any row matches.
    pub async fn exists(self) -> Result<bool> {
        let spec = self.repo.with_soft_delete(self.combined_spec());
        let (query, args) = match spec {
            Some(spec) => {
                let (condition, args, _) = spec.to_sql(self.repo.dialect.as_ref(), 1);
                (
                    format!(
                        "SELECT EXISTS(SELECT 1 FROM {} WHERE {condition})",
                        self.repo.table.name
                    ),
                    args,
                )
            }
            None => (
                format!("SELECT EXISTS(SELECT 1 FROM {})", self.repo.table.name),
                Vec::new(),
            ),
        };
        let row = self
            .repo
            .db
            .query_opt(&query, &args)
            .await?
            .ok_or(Error::NotFound)?;
        row.get(0)
    }

    /// Fetch one keyset page.
    ///
    /// The ordering is augmented with every primary-key column not
    /// already ordered on, in declared order, as an ascending tie-break;
    /// the query fetches `page_size + 1` rows so a further page is
    /// detected without a second round trip. `extract` produces the
    /// sort-column values of a row, used to derive the next cursor from
    /// the last retained row.
    pub async fn page<F>(self, extract: F) -> Result<Page<T>>
    where
        F: Fn(&T) -> BTreeMap<String, Value>,
    {
        let page_size = self.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        let dialect = self.repo.dialect.as_ref();
        let orders = self.ensure_pk_order();

        let mut spec = self.repo.with_soft_delete(self.combined_spec());
        if let Some(token) = &self.cursor {
            let cursor = decode_cursor(token)?;
            if let Some(keyset) = keyset_spec(&orders, &cursor.values, self.forward) {
                spec = Some(match spec {
                    Some(existing) => Spec::and(vec![existing, keyset]),
                    None => keyset,
                });
            }
        }

        let fetch_size = page_size + 1;
        let (mut query, mut args, next_param) = match spec {
            Some(spec) => {
                let (condition, args, next) = spec.to_sql(dialect, 1);
                (self.repo.table.select_where(&condition), args, next)
            }
            None => (self.repo.table.select_from(), Vec::new(), 1),
        };
        query.push_str(&order_sql(&orders));
        query.push_str(&format!(" LIMIT {}", dialect.placeholder(next_param)));
        args.push(Value::Int(fetch_size));

        let mut items = self
            .repo
            .driver
            .find_many(self.repo.db.as_ref(), &query, &args)
            .await?;

        let has_more = items.len() as i64 > page_size;
        if has_more {
            items.pop();
        }

        let next_cursor = if has_more {
            items.last().map(|last| {
                encode_cursor(&Cursor {
                    values: extract(last),
                })
            })
        } else {
            None
        };

        Ok(Page {
            items,
            next_cursor,
            has_more,
        })
    }

    fn combined_spec(&self) -> Option<Spec> {
        match self.specs.len() {
            0 => None,
            1 => Some(self.specs[0].clone()),
            _ => Some(Spec::and(self.specs.clone())),
        }
    }

    /// The explicit ordering plus every missing primary-key column, so
    /// pagination always runs over a deterministic total order.
    fn ensure_pk_order(&self) -> Vec<OrderClause> {
        let mut orders = self.orders.clone();
        for pk in &self.repo.table.primary_key {
            if !orders.iter().any(|order| order.column == *pk) {
                orders.push(OrderClause {
                    column: pk.clone(),
                    direction: Direction::Asc,
                });
            }
        }
        orders
    }

    fn build_sql(&self) -> (String, Vec<Value>) {
        let dialect = self.repo.dialect.as_ref();
        let spec = self.repo.with_soft_delete(self.combined_spec());

        let (mut query, mut args, mut next_param) = match spec {
            Some(spec) => {
                let (condition, args, next) = spec.to_sql(dialect, 1);
                (self.repo.table.select_where(&condition), args, next)
            }
            None => (self.repo.table.select_from(), Vec::new(), 1),
        };

        if !self.orders.is_empty() {
            query.push_str(&order_sql(&self.orders));
        }

        if let Some(limit) = self.limit {
            query.push_str(&format!(" LIMIT {}", dialect.placeholder(next_param)));
            args.push(Value::Int(limit));
            next_param += 1;
        }
        if let Some(offset) = self.offset {
            query.push_str(&format!(" OFFSET {}", dialect.placeholder(next_param)));
            args.push(Value::Int(offset));
        }

        (query, args)
    }
}

fn order_sql(orders: &[OrderClause]) -> String {
    if orders.is_empty() {
        return String::new();
    }
    let parts: Vec<String> = orders
        .iter()
        .map(|order| format!("{} {}", order.column, order.direction.as_sql()))
        .collect();
    format!(" ORDER BY {}", parts.join(", "))
}
