//! Predicate model
//!
//! One [`Predicate`] is a single filter condition or a nested group of
//! conditions. Predicates are immutable once appended to a query; the
//! boolean bucket they land in is derived at compile time from their
//! operator (or, for groups, their joining boolean) and is never stored on
//! the predicate itself.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EsQueryError, Result};
use crate::query::state::QueryState;

/// Comparison operators accepted by `where_clause`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Lte,
    Gte,
    Ne,
    Like,
    /// Bucket marker carried by a predicate that collapsed out of a
    /// single-condition or-group. Not part of the public operator strings.
    Or,
}

impl Operator {
    /// Parse one of the supported operator strings, case-insensitively.
    ///
    /// Returns `None` for anything outside the supported set; callers use
    /// that to fall back to shorthand equality.
    pub fn parse(operator: &str) -> Option<Operator> {
        match operator.to_lowercase().as_str() {
            "=" | "<=>" => Some(Operator::Eq),
            "<" => Some(Operator::Lt),
            ">" => Some(Operator::Gt),
            "<=" => Some(Operator::Lte),
            ">=" => Some(Operator::Gte),
            "<>" | "!=" => Some(Operator::Ne),
            "like" => Some(Operator::Like),
            _ => None,
        }
    }

    /// The engine range keyword for this operator, if it is a range operator
    pub fn range_keyword(self) -> Option<&'static str> {
        match self {
            Operator::Gt => Some("gt"),
            Operator::Lt => Some("lt"),
            Operator::Gte => Some("gte"),
            Operator::Lte => Some("lte"),
            _ => None,
        }
    }

    /// Whether a JSON null value is legal alongside this operator string.
    ///
    /// Null only makes sense with equality and inequality; combining it
    /// with a range or match operator is a construction error.
    pub fn allows_null(operator: &str) -> bool {
        matches!(operator, "=" | "<>" | "!=")
    }
}

/// Boolean joining a nested group to its parent
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Boolean {
    And,
    Or,
}

/// The bool-query bucket a compiled predicate lands in
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BucketTag {
    Filter,
    Must,
    MustNot,
    Should,
}

impl BucketTag {
    /// The request-body key for this bucket
    pub fn key(self) -> &'static str {
        match self {
            BucketTag::Filter => "filter",
            BucketTag::Must => "must",
            BucketTag::MustNot => "must_not",
            BucketTag::Should => "should",
        }
    }
}

/// Target column(s) of a basic comparison
///
/// A multi-column target compiles to a `multi_match` over all the named
/// fields instead of a single-field clause.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnRef {
    One(String),
    Many(Vec<String>),
}

/// One filter condition, or a nested group of conditions
#[derive(Clone, Debug)]
pub enum Predicate {
    Basic {
        column: ColumnRef,
        operator: Operator,
        value: Value,
    },
    In {
        column: String,
        values: Vec<Value>,
    },
    NotIn {
        column: String,
        values: Vec<Value>,
    },
    Between {
        column: String,
        values: Vec<Value>,
    },
    NotBetween {
        column: String,
        values: Vec<Value>,
    },
    Exists {
        column: String,
    },
    NotExists {
        column: String,
    },
    Like {
        column: String,
        value: Value,
    },
    Nested {
        state: Box<QueryState>,
        boolean: Boolean,
    },
}

/// Sort direction for an order-by clause
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse `asc`/`desc`, case-insensitively
    pub fn parse(direction: &str) -> Result<SortDirection> {
        match direction.to_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(EsQueryError::invalid_argument(format!(
                "Order direction must be \"asc\" or \"desc\", got \"{other}\""
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_parse() {
        assert_eq!(Operator::parse("="), Some(Operator::Eq));
        assert_eq!(Operator::parse("<=>"), Some(Operator::Eq));
        assert_eq!(Operator::parse("!="), Some(Operator::Ne));
        assert_eq!(Operator::parse("<>"), Some(Operator::Ne));
        assert_eq!(Operator::parse("LIKE"), Some(Operator::Like));
        assert_eq!(Operator::parse(">="), Some(Operator::Gte));
        assert_eq!(Operator::parse("between"), None);
        assert_eq!(Operator::parse("or"), None);
    }

    #[test]
    fn test_range_keywords() {
        assert_eq!(Operator::Gt.range_keyword(), Some("gt"));
        assert_eq!(Operator::Lte.range_keyword(), Some("lte"));
        assert_eq!(Operator::Eq.range_keyword(), None);
        assert_eq!(Operator::Like.range_keyword(), None);
    }

    #[test]
    fn test_null_combinations() {
        assert!(Operator::allows_null("="));
        assert!(Operator::allows_null("!="));
        assert!(Operator::allows_null("<>"));
        assert!(!Operator::allows_null(">"));
        assert!(!Operator::allows_null("like"));
        assert!(!Operator::allows_null("<=>"));
    }

    #[test]
    fn test_sort_direction_parse() {
        assert_eq!(SortDirection::parse("ASC").unwrap(), SortDirection::Asc);
        assert_eq!(SortDirection::parse("desc").unwrap(), SortDirection::Desc);
        assert!(SortDirection::parse("sideways").is_err());
    }
}
