//! Error types for the locator engine.

use thiserror::Error;

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures a proximity search can surface to callers.
///
/// The two kinds are deliberately distinct: a connection failure can be
/// reported as "service unavailable" without exposing query detail, while a
/// query failure points at the statement or its configuration. Both keep the
/// underlying driver error for diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    /// The data-store connection could not be established.
    #[error("failed to connect to the location database")]
    Connection(#[source] rusqlite::Error),

    /// The proximity statement failed to prepare or execute.
    #[error("location query failed")]
    Query(#[source] rusqlite::Error),
}
