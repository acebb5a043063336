//! `SQLite` repository backend.
//!
//! ## Module Structure
//!
//! - [`connection`]: Connection handling ([`Mutex<Connection>`](rusqlite::Connection), lock acquisition, configuration)
//! - [`schema`]: Table definitions for objects, references, tree and permissions
//! - [`nested_set`]: Nested-set algorithms (insert, subtree collection, renumbering)
//! - [`metrics`]: Shared metrics recording helpers
//! - `repository` / `lifecycle`: [`SqliteRepository`] and its trait implementations

mod connection;
mod lifecycle;
mod metrics;
pub mod nested_set;
mod repository;
mod schema;

pub use connection::{acquire_lock, configure_connection};
pub use metrics::record_operation_metrics;
pub use repository::{SqliteRepository, TableCounts};
pub use schema::initialize_schema;
