//! Opaque pagination cursors and the keyset predicate builder.
//!
//! A cursor freezes the sort-column values of the last row of a page.
//! The keyset builder turns that position into a predicate meaning "rows
//! strictly after (or before) this position" under the active ordering,
//! so pages stay stable under concurrent inserts where numeric offsets
//! would drift.

use std::collections::BTreeMap;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::query::{Direction, OrderClause};
use crate::spec::Spec;
use crate::value::Value;

/// Keyset position: sort-column name → last-row value.
///
/// Opaque to callers except through [`encode_cursor`] / [`decode_cursor`].
/// A token is only meaningful under the order specification that
/// produced it; callers must not mix cursors across orderings.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "v")]
    pub values: BTreeMap<String, Value>,
}

impl Cursor {
    /// Build a cursor from column/value pairs.
    pub fn new(values: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }
}

/// One page of results plus continuation state.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
    pub has_more: bool,
}

/// Encode a cursor as a URL-safe base64 token.
pub fn encode_cursor(cursor: &Cursor) -> String {
    let json = serde_json::to_vec(cursor).expect("cursor values are JSON-representable");
    URL_SAFE.encode(json)
}

/// Decode a pagination token, failing with
/// [`Error::InvalidCursor`] on bad base64 or bad JSON.
pub fn decode_cursor(token: &str) -> Result<Cursor> {
    let bytes = URL_SAFE
        .decode(token)
        .map_err(|err| Error::InvalidCursor(Box::new(err)))?;
    serde_json::from_slice(&bytes).map_err(|err| Error::InvalidCursor(Box::new(err)))
}

/// Build the keyset predicate for `orders` positioned at `values`.
///
/// Returns `None` for an empty ordering. Otherwise the result is an OR
/// of one alternative per ordering column: alternative `i` requires
/// equality on columns `0..i` and a strict inequality on column `i`,
/// which together express a lexicographic tuple comparison without a
/// composite row-value operator. Ascending order paging forward (and
/// descending paging backward) compares with `>`, otherwise `<`.
pub(crate) fn keyset_spec(
    orders: &[OrderClause],
    values: &BTreeMap<String, Value>,
    forward: bool,
) -> Option<Spec> {
    if orders.is_empty() {
        return None;
    }

    let value_of = |column: &str| values.get(column).cloned().unwrap_or(Value::Null);

    let mut or_parts = Vec::with_capacity(orders.len());
    for (i, order) in orders.iter().enumerate() {
        let value = value_of(&order.column);
        let use_gt = (order.direction == Direction::Asc) == forward;
        let inequality = if use_gt {
            Spec::gt(order.column.clone(), value)
        } else {
            Spec::lt(order.column.clone(), value)
        };

        or_parts.push(if i == 0 {
            inequality
        } else {
            let mut and_parts: Vec<Spec> = orders[..i]
                .iter()
                .map(|prev| Spec::eq(prev.column.clone(), value_of(&prev.column)))
                .collect();
            and_parts.push(inequality);
            Spec::and(and_parts)
        });
    }

    Some(if or_parts.len() == 1 {
        or_parts.remove(0)
    } else {
        Spec::or(or_parts)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Postgres;

    fn orders(cols: &[(&str, Direction)]) -> Vec<OrderClause> {
        cols.iter()
            .map(|(col, dir)| OrderClause {
                column: col.to_string(),
                direction: *dir,
            })
            .collect()
    }

    fn position(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(col, val)| (col.to_string(), val.clone()))
            .collect()
    }

    #[test]
    fn round_trip() {
        let cursor = Cursor::new(vec![
            ("id".to_string(), Value::Int(100)),
            ("name".to_string(), Value::Text("alice".into())),
        ]);
        let token = encode_cursor(&cursor);
        let back = decode_cursor(&token).unwrap();
        assert_eq!(back, cursor);
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let err = decode_cursor("not base64 at all!!!").unwrap_err();
        assert!(err.is_invalid_cursor());
    }

    #[test]
    fn decode_rejects_bad_json() {
        let token = URL_SAFE.encode(b"{not json");
        let err = decode_cursor(&token).unwrap_err();
        assert!(err.is_invalid_cursor());
    }

    #[test]
    fn single_column_forward_ascending() {
        let spec = keyset_spec(
            &orders(&[("id", Direction::Asc)]),
            &position(&[("id", Value::Int(100))]),
            true,
        )
        .unwrap();
        let (sql, args, _) = spec.to_sql(&Postgres, 1);
        assert_eq!(sql, "id > $1");
        assert_eq!(args, vec![Value::Int(100)]);
    }

    #[test]
    fn single_column_backward_flips_comparator() {
        let spec = keyset_spec(
            &orders(&[("id", Direction::Asc)]),
            &position(&[("id", Value::Int(100))]),
            false,
        )
        .unwrap();
        let (sql, _, _) = spec.to_sql(&Postgres, 1);
        assert_eq!(sql, "id < $1");
    }

    #[test]
    fn descending_flips_both_directions() {
        let cols = orders(&[("id", Direction::Desc)]);
        let pos = position(&[("id", Value::Int(100))]);

        let (sql, _, _) = keyset_spec(&cols, &pos, true).unwrap().to_sql(&Postgres, 1);
        assert_eq!(sql, "id < $1");

        let (sql, _, _) = keyset_spec(&cols, &pos, false).unwrap().to_sql(&Postgres, 1);
        assert_eq!(sql, "id > $1");
    }

    #[test]
    fn two_columns_expand_to_lexicographic_or() {
        let spec = keyset_spec(
            &orders(&[("created_at", Direction::Desc), ("id", Direction::Asc)]),
            &position(&[
                ("created_at", Value::Text("2026-01-01".into())),
                ("id", Value::Int(42)),
            ]),
            true,
        )
        .unwrap();
        let (sql, args, next) = spec.to_sql(&Postgres, 1);
        assert_eq!(sql, "(created_at < $1) OR ((created_at = $2) AND (id > $3))");
        assert_eq!(args.len(), 3);
        assert_eq!(next, 4);
    }

    #[test]
    fn empty_ordering_builds_nothing() {
        assert!(keyset_spec(&[], &BTreeMap::new(), true).is_none());
    }

    #[test]
    fn missing_cursor_column_binds_null() {
        let spec = keyset_spec(
            &orders(&[("id", Direction::Asc)]),
            &BTreeMap::new(),
            true,
        )
        .unwrap();
        let (_, args, _) = spec.to_sql(&Postgres, 1);
        assert_eq!(args, vec![Value::Null]);
    }
}
