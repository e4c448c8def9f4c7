//! Fluent query construction and compilation
//!
//! This module turns chainable filter/sort/aggregation descriptions into
//! the engine's JSON request bodies:
//!
//! - [`QueryState`]: the accumulated description of one query
//! - [`Builder`]: the fluent front end bound to a connection
//! - [`Grammar`]: the pure compiler from state to request bodies
//!
//! # Example
//!
//! ```rust,ignore
//! let rows = Builder::table(&connection, "logs")
//!     .where_clause("age", ">", 5)?
//!     .where_in("status", vec!["open", "pending"])
//!     .order_by_desc("created_at")
//!     .limit(20)
//!     .get()?;
//! ```
//!
//! Compiled bodies follow the engine's bool-query shape:
//!
//! ```json
//! {
//!   "index": "logs",
//!   "size": 20,
//!   "body": {
//!     "query": {
//!       "bool": {
//!         "filter": [
//!           { "range": { "age": { "gt": 5 } } },
//!           { "terms": { "status": ["open", "pending"] } }
//!         ]
//!       }
//!     },
//!     "sort": [ { "created_at": "desc" } ]
//!   }
//! }
//! ```

pub mod builder;
pub mod grammar;
pub(crate) mod highlight;
pub mod predicate;
pub mod state;

pub use builder::Builder;
pub use grammar::Grammar;
pub use predicate::{Boolean, BucketTag, ColumnRef, Operator, Predicate, SortDirection};
pub use state::{AggColumn, AggregateFunction, AggregationSpec, QueryState, ScrollSpec};
