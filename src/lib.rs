//! esquery — a fluent query builder for Elasticsearch-compatible search
//! engines
//!
//! Chainable filters, sorts, aggregations and mutations compile into the
//! engine's native JSON request bodies; the transport layer stays behind
//! the [`Connection`] trait.
//!
//! ```rust
//! use esquery::query::Builder;
//! use esquery::testing::MockConnection;
//!
//! # fn main() -> esquery::Result<()> {
//! let connection = MockConnection::new();
//!
//! let rows = Builder::table(&connection, "articles")
//!     .where_clause("age", ">", 5)?
//!     .where_in("status", vec!["published", "archived"])
//!     .order_by_desc("created_at")
//!     .limit(20)
//!     .get()?;
//! # assert!(rows.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! Builders are single-use: every terminal call (`get`, `count`,
//! `paginate`, `insert`, `update`, `delete`, ...) consumes the builder,
//! compiles its state exactly once, and post-processes the raw response.

pub mod config;
pub mod connection;
pub mod error;
pub mod models;
pub mod query;
pub mod testing;

pub use config::{ConnectionConfig, HighlightConfig};
pub use connection::Connection;
pub use error::{EsQueryError, Result};
pub use models::{Page, ScrollPage, UpdateSummary};
pub use query::{Builder, Grammar, QueryState};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
