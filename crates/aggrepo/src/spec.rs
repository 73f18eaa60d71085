//! Composable query specifications compiled to parameterized SQL.
//!
//! A [`Spec`] is an immutable predicate tree. Compilation is a pure
//! depth-first fold: every node receives the 1-based index of the next
//! placeholder to allocate and returns the index left for its successor,
//! so placeholder numbering stays contiguous and gap-free across the
//! whole tree regardless of nesting depth.

use crate::dialect::Dialect;
use crate::value::Value;

const LIKE_OP: &str = "LIKE";

/// A composable query predicate.
///
/// # Example
/// ```
/// use aggrepo::{Postgres, Spec};
///
/// let spec = Spec::and(vec![
///     Spec::eq("status", "active"),
///     Spec::gt("age", 18_i64),
/// ]);
/// let (sql, args, next) = spec.to_sql(&Postgres, 1);
/// assert_eq!(sql, "(status = $1) AND (age > $2)");
/// assert_eq!(args.len(), 2);
/// assert_eq!(next, 3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Spec(Node);

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Compare {
        column: String,
        op: &'static str,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
        negate: bool,
    },
    Like {
        column: String,
        pattern: String,
        case_insensitive: bool,
    },
    Between {
        column: String,
        from: Value,
        to: Value,
    },
    Null {
        column: String,
        negate: bool,
    },
    And(Vec<Spec>),
    Or(Vec<Spec>),
    Not(Box<Spec>),
    Raw {
        sql: String,
        args: Vec<Value>,
    },
}

fn compare(column: impl Into<String>, op: &'static str, value: impl Into<Value>) -> Spec {
    Spec(Node::Compare {
        column: column.into(),
        op,
        value: value.into(),
    })
}

impl Spec {
    /// `column = value`
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Spec {
        compare(column, "=", value)
    }

    /// `column != value`
    pub fn not_eq(column: impl Into<String>, value: impl Into<Value>) -> Spec {
        compare(column, "!=", value)
    }

    /// `column > value`
    pub fn gt(column: impl Into<String>, value: impl Into<Value>) -> Spec {
        compare(column, ">", value)
    }

    /// `column >= value`
    pub fn gte(column: impl Into<String>, value: impl Into<Value>) -> Spec {
        compare(column, ">=", value)
    }

    /// `column < value`
    pub fn lt(column: impl Into<String>, value: impl Into<Value>) -> Spec {
        compare(column, "<", value)
    }

    /// `column <= value`
    pub fn lte(column: impl Into<String>, value: impl Into<Value>) -> Spec {
        compare(column, "<=", value)
    }

    /// `column IN (values...)`. An empty list compiles to `FALSE`.
    pub fn in_list<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Spec {
        Spec(Node::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negate: false,
        })
    }

    /// `column NOT IN (values...)`. An empty list compiles to `TRUE`.
    pub fn not_in<V: Into<Value>>(
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Spec {
        Spec(Node::In {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
            negate: true,
        })
    }

    /// `column LIKE pattern`
    pub fn like(column: impl Into<String>, pattern: impl Into<String>) -> Spec {
        Spec(Node::Like {
            column: column.into(),
            pattern: pattern.into(),
            case_insensitive: false,
        })
    }

    /// Case-insensitive pattern match, using the dialect's operator.
    pub fn ilike(column: impl Into<String>, pattern: impl Into<String>) -> Spec {
        Spec(Node::Like {
            column: column.into(),
            pattern: pattern.into(),
            case_insensitive: true,
        })
    }

    /// `column BETWEEN from AND to`
    pub fn between(
        column: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Spec {
        Spec(Node::Between {
            column: column.into(),
            from: from.into(),
            to: to.into(),
        })
    }

    /// `column IS NULL`
    pub fn is_null(column: impl Into<String>) -> Spec {
        Spec(Node::Null {
            column: column.into(),
            negate: false,
        })
    }

    /// `column IS NOT NULL`
    pub fn is_not_null(column: impl Into<String>) -> Spec {
        Spec(Node::Null {
            column: column.into(),
            negate: true,
        })
    }

    /// Conjunction. Empty compiles to `TRUE`; a single child compiles
    /// unparenthesized.
    pub fn and(specs: Vec<Spec>) -> Spec {
        Spec(Node::And(specs))
    }

    /// Disjunction. Empty compiles to `FALSE`; a single child compiles
    /// unparenthesized.
    pub fn or(specs: Vec<Spec>) -> Spec {
        Spec(Node::Or(specs))
    }

    /// Negation: `NOT ( ... )`.
    #[allow(clippy::should_implement_trait)]
    pub fn not(spec: Spec) -> Spec {
        Spec(Node::Not(Box::new(spec)))
    }

    /// Hand-written SQL fragment. Placeholders are written `$1..$n`
    /// regardless of the target dialect and rewritten at compile time to
    /// the dialect's syntax at the running offset.
    pub fn raw<V: Into<Value>>(
        sql: impl Into<String>,
        args: impl IntoIterator<Item = V>,
    ) -> Spec {
        Spec(Node::Raw {
            sql: sql.into(),
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Compile to a SQL fragment, its positional arguments and the next
    /// free placeholder index.
    ///
    /// `offset` is the 1-based index of the first placeholder this node
    /// may allocate; the returned index always equals
    /// `offset + args.len()` accumulated over the whole subtree.
    pub fn to_sql(&self, dialect: &dyn Dialect, offset: usize) -> (String, Vec<Value>, usize) {
        match &self.0 {
            Node::Compare { column, op, value } => (
                format!("{column} {op} {}", dialect.placeholder(offset)),
                vec![value.clone()],
                offset + 1,
            ),

            Node::In {
                column,
                values,
                negate,
            } => {
                if values.is_empty() {
                    // Membership in the empty set is always false.
                    let sql = if *negate { "TRUE" } else { "FALSE" };
                    return (sql.to_string(), Vec::new(), offset);
                }
                let placeholders: Vec<String> = (0..values.len())
                    .map(|i| dialect.placeholder(offset + i))
                    .collect();
                let op = if *negate { "NOT IN" } else { "IN" };
                (
                    format!("{column} {op} ({})", placeholders.join(", ")),
                    values.clone(),
                    offset + values.len(),
                )
            }

            Node::Like {
                column,
                pattern,
                case_insensitive,
            } => {
                let op = if *case_insensitive {
                    dialect.ilike_op()
                } else {
                    LIKE_OP
                };
                (
                    format!("{column} {op} {}", dialect.placeholder(offset)),
                    vec![Value::Text(pattern.clone())],
                    offset + 1,
                )
            }

            Node::Between { column, from, to } => (
                format!(
                    "{column} BETWEEN {} AND {}",
                    dialect.placeholder(offset),
                    dialect.placeholder(offset + 1)
                ),
                vec![from.clone(), to.clone()],
                offset + 2,
            ),

            Node::Null { column, negate } => {
                let sql = if *negate {
                    format!("{column} IS NOT NULL")
                } else {
                    format!("{column} IS NULL")
                };
                (sql, Vec::new(), offset)
            }

            Node::And(specs) => join_specs(specs, " AND ", "TRUE", dialect, offset),
            Node::Or(specs) => join_specs(specs, " OR ", "FALSE", dialect, offset),

            Node::Not(spec) => {
                let (sql, args, next) = spec.to_sql(dialect, offset);
                (format!("NOT ({sql})"), args, next)
            }

            Node::Raw { sql, args } => {
                // Two-pass rewrite through unique intermediate tokens so
                // `$1` never corrupts `$10` regardless of order.
                let mut out = sql.clone();
                for i in (1..=args.len()).rev() {
                    out = out.replace(&format!("${i}"), &format!("__RAW_{i}__"));
                }
                for i in 1..=args.len() {
                    out = out.replace(&format!("__RAW_{i}__"), &dialect.placeholder(offset + i - 1));
                }
                (out, args.clone(), offset + args.len())
            }
        }
    }
}

fn join_specs(
    specs: &[Spec],
    sep: &str,
    empty: &str,
    dialect: &dyn Dialect,
    offset: usize,
) -> (String, Vec<Value>, usize) {
    if specs.is_empty() {
        return (empty.to_string(), Vec::new(), offset);
    }
    if specs.len() == 1 {
        return specs[0].to_sql(dialect, offset);
    }
    let mut parts = Vec::with_capacity(specs.len());
    let mut all_args = Vec::new();
    let mut current = offset;
    for spec in specs {
        let (sql, args, next) = spec.to_sql(dialect, current);
        parts.push(format!("({sql})"));
        all_args.extend(args);
        current = next;
    }
    (parts.join(sep), all_args, current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{MySql, Postgres};

    #[test]
    fn comparisons_consume_one_placeholder() {
        let (sql, args, next) = Spec::eq("name", "alice").to_sql(&Postgres, 1);
        assert_eq!(sql, "name = $1");
        assert_eq!(args, vec![Value::Text("alice".into())]);
        assert_eq!(next, 2);

        let (sql, _, next) = Spec::gte("age", 21_i64).to_sql(&Postgres, 4);
        assert_eq!(sql, "age >= $4");
        assert_eq!(next, 5);
    }

    #[test]
    fn in_list_numbers_sequentially() {
        let (sql, args, next) = Spec::in_list("id", vec![1_i64, 2, 3]).to_sql(&Postgres, 2);
        assert_eq!(sql, "id IN ($2, $3, $4)");
        assert_eq!(args.len(), 3);
        assert_eq!(next, 5);
    }

    #[test]
    fn empty_in_is_false_empty_not_in_is_true() {
        let (sql, args, next) = Spec::in_list("c", Vec::<i64>::new()).to_sql(&Postgres, 1);
        assert_eq!(sql, "FALSE");
        assert!(args.is_empty());
        assert_eq!(next, 1);

        let (sql, args, next) = Spec::not_in("c", Vec::<i64>::new()).to_sql(&Postgres, 1);
        assert_eq!(sql, "TRUE");
        assert!(args.is_empty());
        assert_eq!(next, 1);
    }

    #[test]
    fn like_uses_dialect_operator() {
        let (sql, _, _) = Spec::ilike("email", "%@example.com").to_sql(&Postgres, 1);
        assert_eq!(sql, "email ILIKE $1");

        let (sql, _, _) = Spec::ilike("email", "%@example.com").to_sql(&MySql, 1);
        assert_eq!(sql, "email LIKE ?");

        let (sql, _, _) = Spec::like("email", "%@example.com").to_sql(&Postgres, 1);
        assert_eq!(sql, "email LIKE $1");
    }

    #[test]
    fn between_consumes_two_placeholders() {
        let (sql, args, next) = Spec::between("age", 18_i64, 65_i64).to_sql(&Postgres, 3);
        assert_eq!(sql, "age BETWEEN $3 AND $4");
        assert_eq!(args, vec![Value::Int(18), Value::Int(65)]);
        assert_eq!(next, 5);
    }

    #[test]
    fn null_checks_consume_nothing() {
        let (sql, args, next) = Spec::is_null("deleted_at").to_sql(&Postgres, 7);
        assert_eq!(sql, "deleted_at IS NULL");
        assert!(args.is_empty());
        assert_eq!(next, 7);

        let (sql, _, _) = Spec::is_not_null("deleted_at").to_sql(&Postgres, 1);
        assert_eq!(sql, "deleted_at IS NOT NULL");
    }

    #[test]
    fn empty_combinators_compile_to_identities() {
        let (sql, _, next) = Spec::and(vec![]).to_sql(&Postgres, 1);
        assert_eq!(sql, "TRUE");
        assert_eq!(next, 1);

        let (sql, _, next) = Spec::or(vec![]).to_sql(&Postgres, 1);
        assert_eq!(sql, "FALSE");
        assert_eq!(next, 1);
    }

    #[test]
    fn single_child_combinator_is_unparenthesized() {
        let (sql, _, _) = Spec::and(vec![Spec::eq("a", 1_i64)]).to_sql(&Postgres, 1);
        assert_eq!(sql, "a = $1");
    }

    #[test]
    fn multi_child_combinator_parenthesizes_and_threads_offsets() {
        let spec = Spec::and(vec![Spec::eq("a", 1_i64), Spec::eq("b", 2_i64)]);
        let (sql, args, next) = spec.to_sql(&Postgres, 1);
        assert_eq!(sql, "(a = $1) AND (b = $2)");
        assert_eq!(args, vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(next, 3);
    }

    #[test]
    fn nested_tree_numbers_left_to_right() {
        let spec = Spec::and(vec![
            Spec::eq("status", "active"),
            Spec::or(vec![
                Spec::in_list("role", vec!["admin", "owner"]),
                Spec::between("level", 3_i64, 9_i64),
            ]),
            Spec::is_null("deleted_at"),
        ]);
        let (sql, args, next) = spec.to_sql(&Postgres, 1);
        assert_eq!(
            sql,
            "(status = $1) AND ((role IN ($2, $3)) OR (level BETWEEN $4 AND $5)) \
             AND (deleted_at IS NULL)"
        );
        assert_eq!(args.len(), 5);
        assert_eq!(next, 6);
    }

    #[test]
    fn not_wraps_and_forwards() {
        let (sql, args, next) = Spec::not(Spec::eq("a", 1_i64)).to_sql(&Postgres, 2);
        assert_eq!(sql, "NOT (a = $2)");
        assert_eq!(args.len(), 1);
        assert_eq!(next, 3);
    }

    #[test]
    fn raw_rewrites_placeholders_at_offset() {
        let spec = Spec::raw("balance > $1 AND currency = $2", vec![Value::Int(100), Value::Text("EUR".into())]);
        let (sql, args, next) = spec.to_sql(&Postgres, 5);
        assert_eq!(sql, "balance > $5 AND currency = $6");
        assert_eq!(args.len(), 2);
        assert_eq!(next, 7);

        let (sql, _, _) = spec.to_sql(&MySql, 5);
        assert_eq!(sql, "balance > ? AND currency = ?");
    }

    #[test]
    fn raw_rewrite_survives_token_collisions() {
        // $1 must not partially rewrite the $10 token.
        let args: Vec<Value> = (1..=10).map(Value::Int).collect();
        let sql_in = "a = $10 AND b = $1";
        let (sql, _, next) = Spec::raw(sql_in, args).to_sql(&Postgres, 1);
        assert_eq!(sql, "a = $10 AND b = $1");
        assert_eq!(next, 11);

        let (shifted, _, _) =
            Spec::raw("a = $10 AND b = $1", (1..=10).map(Value::Int).collect::<Vec<_>>())
                .to_sql(&Postgres, 3);
        assert_eq!(shifted, "a = $12 AND b = $3");
    }

    #[test]
    fn placeholder_count_matches_args_everywhere() {
        let spec = Spec::or(vec![
            Spec::and(vec![
                Spec::eq("a", 1_i64),
                Spec::not(Spec::in_list("b", vec![2_i64, 3, 4])),
            ]),
            Spec::raw("c <> $1", vec![Value::Int(5)]),
            Spec::ilike("d", "%x%"),
        ]);
        let (sql, args, next) = spec.to_sql(&Postgres, 1);
        let placeholder_count = sql.matches('$').count();
        assert_eq!(placeholder_count, args.len());
        assert_eq!(next, args.len() + 1);
        // Numbered placeholders cover exactly the contiguous range.
        for i in 1..=args.len() {
            assert!(sql.contains(&format!("${i}")), "missing ${i} in {sql}");
        }
    }
}
