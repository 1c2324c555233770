//! Locator Query Engine
//!
//! Compiles a proximity-search configuration into one parameterized SQL
//! statement, executes it against SQLite, and shapes the distance-ordered
//! rows for presentation.

pub mod database;
pub mod error;
pub mod query;
pub mod types;

pub use database::Database;
pub use error::{Error, Result};
pub use types::{
    Filter, FilterValue, LocationResult, LocationRow, NearbyQuery, Position, Projection,
    QueryOptions, UnitSystem,
};
