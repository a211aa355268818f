pub mod backend;
pub mod crm;
pub mod schema;
pub mod stats;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `remfix_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
