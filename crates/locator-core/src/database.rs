//! SQLite access for proximity searches.
//!
//! Wraps a `rusqlite` connection, runs the compiled nearby-location
//! statement, and shapes the ordered rows into the result snapshot.

use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags, ToSql};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{Error, Result};
use crate::query::{build_nearby_sql, filter_param, sanitize_identifier};
use crate::types::{LocationResult, LocationRow, NearbyQuery, Position};

/// A SQLite database connection for location queries.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database file read-only.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(Error::Connection)?;

        // Configure for read-only performance
        conn.execute_batch(
            "PRAGMA cache_size = -64000; -- 64MB
             PRAGMA mmap_size = 268435456; -- 256MB
             PRAGMA temp_store = MEMORY;",
        )
        .map_err(Error::Connection)?;

        Ok(Self { conn })
    }

    /// Open a fresh in-memory database.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(Error::Connection)?;
        Ok(Self { conn })
    }

    /// Wrap an existing connection.
    ///
    /// The engine adds no synchronization of its own; one instance serves
    /// sequential calls, concurrent callers each get their own.
    pub fn from_connection(conn: Connection) -> Self {
        Self { conn }
    }

    /// Find locations within the query's radius, ordered ascending by
    /// distance, using the query's stored position.
    ///
    /// # Panics
    ///
    /// Panics if the query carries no position. Supplying one is part of the
    /// calling contract, not a recoverable runtime condition.
    pub fn find_nearby(&self, query: &NearbyQuery) -> Result<LocationResult> {
        let position = query
            .position
            .expect("a position must be set before running a proximity search");
        self.run(query, position)
    }

    /// Find locations around `position`, overriding the query's stored
    /// position for this call.
    pub fn find_nearby_at(
        &self,
        query: &NearbyQuery,
        position: Position,
    ) -> Result<LocationResult> {
        self.run(query, position)
    }

    fn run(&self, query: &NearbyQuery, position: Position) -> Result<LocationResult> {
        let sql = build_nearby_sql(query);
        debug!(%sql, "compiled nearby-location statement");

        let mut stmt = self.conn.prepare_cached(&sql).map_err(Error::Query)?;
        let columns: Vec<String> = stmt
            .column_names()
            .iter()
            .map(|name| (*name).to_owned())
            .collect();

        // Position first, then each rule's value under its generated name,
        // in insertion order.
        let mut bound: Vec<(String, Box<dyn ToSql>)> = vec![
            (":lat".to_owned(), Box::new(position.lat)),
            (":lng".to_owned(), Box::new(position.lng)),
        ];
        for (index, filter) in query.filters.iter().enumerate() {
            bound.push((filter_param(index + 1), Box::new(filter.value().clone())));
        }
        let params: Vec<(&str, &dyn ToSql)> = bound
            .iter()
            .map(|(name, value)| (name.as_str(), &**value as &dyn ToSql))
            .collect();

        let mut rows = stmt.query(params.as_slice()).map_err(Error::Query)?;
        let mut matched = Vec::new();
        while let Some(row) = rows.next().map_err(Error::Query)? {
            matched.push(row_to_location(row, &columns)?);
        }

        // Pagination slices the fetched set in-process; the pre-slice count
        // stays available without a second query.
        let total_locations = matched.len();
        let locations: Vec<LocationRow> = if query.limit_length > 0 {
            matched
                .into_iter()
                .skip(query.limit_start)
                .take(query.limit_length)
                .collect()
        } else {
            matched
        };
        let result_count = locations.len();
        debug!(total_locations, result_count, "proximity search complete");

        Ok(LocationResult {
            radius: query.radius,
            units: query.unit_label().to_owned(),
            position,
            return_columns: query.columns.clone(),
            rules: query.filters.clone(),
            locations,
            result_count,
            total_locations,
            limit_start: query.limit_start,
            limit_length: query.limit_length,
        })
    }

    /// Number of rows in `table`, before any proximity filtering.
    pub fn count(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", sanitize_identifier(table));
        let count: i64 = self
            .conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(Error::Query)?;
        Ok(count as u64)
    }
}

/// Shape one result row: pull the computed distance and map the remaining
/// columns by name.
fn row_to_location(row: &rusqlite::Row<'_>, columns: &[String]) -> Result<LocationRow> {
    let mut fields = Map::with_capacity(columns.len());
    let mut distance = 0.0;
    for (index, name) in columns.iter().enumerate() {
        let value = row.get_ref(index).map_err(Error::Query)?;
        if name == "distance" {
            distance = match value {
                ValueRef::Real(real) => real,
                ValueRef::Integer(int) => int as f64,
                _ => 0.0,
            };
        } else {
            fields.insert(name.clone(), column_value(value));
        }
    }
    Ok(LocationRow { distance, fields })
}

fn column_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(int) => Value::from(int),
        ValueRef::Real(real) => serde_json::Number::from_f64(real).map_or(Value::Null, Value::Number),
        ValueRef::Text(text) => Value::String(String::from_utf8_lossy(text).into_owned()),
        ValueRef::Blob(blob) => Value::from(blob.to_vec()),
    }
}
