//! Proximity statement compilation.
//!
//! Builds the single statement shape the engine supports: project the
//! requested columns plus a great-circle `distance`, cut to rows inside the
//! radius, order ascending by distance. Position and filter values bind as
//! named parameters; identifiers and engine constants are embedded in the
//! statement text after sanitization.

use crate::types::{Filter, NearbyQuery, Projection, UnitSystem};

/// Mean Earth radius in miles; the scale constant for imperial distances.
pub const EARTH_RADIUS_MILES: f64 = 3959.0;

/// Conversion factor from miles to kilometers.
pub const MILES_TO_KILOMETERS: f64 = 1.609344;

/// Strip quote and backtick characters from a SQL identifier.
///
/// Table and column names are embedded verbatim in the statement, so any
/// character that could close a quoted region is removed. Values never pass
/// through here; they are always bound parameters.
pub fn sanitize_identifier(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\'' | '"' | '`'))
        .collect()
}

/// Named placeholder for the filter at `index` (1-based insertion order).
pub fn filter_param(index: usize) -> String {
    format!(":filter_{index}")
}

/// Distance scale constant: Earth radius in the active unit, times the
/// configured travel adjustment.
pub fn distance_scale(units: UnitSystem, adjustment: f64) -> f64 {
    let unit_factor = match units {
        UnitSystem::Imperial => 1.0,
        UnitSystem::Metric => MILES_TO_KILOMETERS,
    };
    EARTH_RADIUS_MILES * unit_factor * adjustment
}

impl Filter {
    /// Render this rule as a clause fragment against its 1-based placeholder.
    pub fn to_predicate(&self, index: usize) -> String {
        let op = match self {
            Self::Equals { .. } => "=",
            Self::NotEquals { .. } => "<>",
            Self::Like { .. } => "LIKE",
        };
        format!(
            "{} {} {}",
            sanitize_identifier(self.column()),
            op,
            filter_param(index)
        )
    }
}

/// Build the nearby-location statement for `query`.
///
/// The spherical-law-of-cosines expression is projected exactly once as the
/// `distance` alias, and the radius cut compares the alias in an outer
/// SELECT. SQLite rejects a bare HAVING, and a WHERE predicate cannot see
/// the alias without repeating the trigonometry.
pub fn build_nearby_sql(query: &NearbyQuery) -> String {
    let table = sanitize_identifier(&query.table);
    let lat = sanitize_identifier(&query.lat_column);
    let lng = sanitize_identifier(&query.lng_column);

    let projection = match &query.columns {
        Projection::All => "*".to_owned(),
        Projection::Columns(columns) => columns
            .iter()
            .map(|column| sanitize_identifier(column))
            .collect::<Vec<_>>()
            .join(", "),
    };

    let mut predicates = vec![format!("{lat} IS NOT NULL"), format!("{lng} IS NOT NULL")];
    for (index, filter) in query.filters.iter().enumerate() {
        predicates.push(filter.to_predicate(index + 1));
    }

    let scale = distance_scale(query.units, query.distance_adjustment);

    format!(
        r#"SELECT * FROM (
    SELECT {projection},
        ROUND({scale} * ACOS(COS(RADIANS(:lat)) * COS(RADIANS({lat}))
            * COS(RADIANS({lng}) - RADIANS(:lng))
            + SIN(RADIANS(:lat)) * SIN(RADIANS({lat}))), {decimals}) AS distance
    FROM {table}
    WHERE {filter_clause}
) WHERE distance < {radius} ORDER BY distance ASC"#,
        decimals = query.distance_decimals,
        filter_clause = predicates.join(" AND "),
        radius = query.radius,
    )
}
