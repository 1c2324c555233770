//! Core types for the locator query engine.

use std::str::FromStr;

use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use thiserror::Error;

/// A reference coordinate in decimal degrees.
///
/// Latitude is expected in [-90, 90], longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
}

impl Position {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// Unit system governing radius interpretation and distance display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitSystem {
    Imperial,
    Metric,
}

/// Returned when a unit-system string is not recognized.
#[derive(Debug, Clone, Error)]
#[error("unrecognized unit system {0:?}, expected \"english\" or \"metric\"")]
pub struct ParseUnitSystemError(String);

impl FromStr for UnitSystem {
    type Err = ParseUnitSystemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "english" | "imperial" => Ok(Self::Imperial),
            "metric" => Ok(Self::Metric),
            _ => Err(ParseUnitSystemError(s.to_owned())),
        }
    }
}

impl UnitSystem {
    /// Compatibility name used in option bundles and result snapshots.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Imperial => "english",
            Self::Metric => "metric",
        }
    }
}

impl Serialize for UnitSystem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for UnitSystem {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(D::Error::custom)
    }
}

/// A value bound to a filter placeholder.
///
/// Untagged in option bundles: JSON numbers map to `Integer`/`Real`, strings
/// to `Text`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ToSql for FilterValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Integer(value) => value.to_sql(),
            Self::Real(value) => value.to_sql(),
            Self::Text(value) => value.to_sql(),
        }
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// An additional filter predicate, ANDed onto the proximity filter in
/// insertion order.
///
/// Each variant names a column and carries the value bound to that rule's
/// placeholder. The column identifier is sanitized when the clause is
/// rendered; the value never appears in statement text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Equals { column: String, value: FilterValue },
    NotEquals { column: String, value: FilterValue },
    Like { column: String, value: FilterValue },
}

impl Filter {
    pub fn equals(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Equals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn not_equals(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::NotEquals {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn like(column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        Self::Like {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Column the predicate applies to.
    pub fn column(&self) -> &str {
        match self {
            Self::Equals { column, .. }
            | Self::NotEquals { column, .. }
            | Self::Like { column, .. } => column,
        }
    }

    /// Value bound to this rule's placeholder.
    pub fn value(&self) -> &FilterValue {
        match self {
            Self::Equals { value, .. } | Self::NotEquals { value, .. } | Self::Like { value, .. } => {
                value
            }
        }
    }
}

/// Columns returned for each matched row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Every column of the locations table.
    All,
    /// An explicit ordered column list.
    Columns(Vec<String>),
}

impl Projection {
    pub fn columns<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Columns(columns.into_iter().map(Into::into).collect())
    }
}

impl Serialize for Projection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::All => serializer.serialize_str("*"),
            Self::Columns(columns) => columns.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Projection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            One(String),
            Many(Vec<String>),
        }

        Ok(match Repr::deserialize(deserializer)? {
            Repr::One(column) if column == "*" => Self::All,
            Repr::One(column) => Self::Columns(vec![column]),
            Repr::Many(columns) => Self::Columns(columns),
        })
    }
}

/// Configuration for a single proximity search.
///
/// Built once per request through the `with_*` methods (or folded from a
/// [`QueryOptions`] bundle) and read-only during execution. Table and column
/// names are trusted configuration, embedded in the statement after
/// sanitization; they are never end-user input in the intended usage.
#[derive(Debug, Clone, PartialEq)]
pub struct NearbyQuery {
    pub table: String,
    pub lat_column: String,
    pub lng_column: String,
    /// Columns returned for each row, alongside the computed distance.
    pub columns: Projection,
    pub units: UnitSystem,
    /// Display label override for imperial distances.
    pub english_units: Option<String>,
    /// Display label override for metric distances.
    pub metric_units: Option<String>,
    /// Search radius in the active unit.
    pub radius: u32,
    /// Multiplier approximating travel distance from great-circle distance.
    /// Always >= 1.
    pub distance_adjustment: f64,
    /// Decimal places kept on the computed distance.
    pub distance_decimals: u32,
    /// First row of the returned page (0-based, applied after ordering).
    pub limit_start: usize,
    /// Page length; 0 returns the full ordered set.
    pub limit_length: usize,
    /// Reference position. Must be present, here or at call time, before the
    /// query executes.
    pub position: Option<Position>,
    /// Additional filter predicates, ANDed in insertion order.
    pub filters: Vec<Filter>,
}

impl Default for NearbyQuery {
    fn default() -> Self {
        Self {
            table: "locations".to_owned(),
            lat_column: "lat".to_owned(),
            lng_column: "lng".to_owned(),
            columns: Projection::All,
            units: UnitSystem::Imperial,
            english_units: None,
            metric_units: None,
            radius: 50,
            distance_adjustment: 1.0,
            distance_decimals: 1,
            limit_start: 0,
            limit_length: 0,
            position: None,
            filters: Vec::new(),
        }
    }
}

impl NearbyQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an options bundle over the defaults.
    pub fn from_options(options: QueryOptions) -> Self {
        let mut query = Self::new();
        if let Some(table) = options.locations_table {
            query.table = table;
        }
        if let Some((lat, lng)) = options.latlng_columns {
            query.lat_column = lat;
            query.lng_column = lng;
        }
        if let Some(radius) = options.radius {
            query = query.with_radius(radius);
        }
        if let Some(limit) = options.limit {
            query.limit_start = limit.start;
            query.limit_length = limit.length;
        }
        if let Some(units) = options.units {
            query.units = units;
        }
        query.english_units = options.english_units;
        query.metric_units = options.metric_units;
        if let Some(adjustment) = options.distance_adjustment {
            query = query.with_distance_adjustment(adjustment);
        }
        if let Some(decimals) = options.distance_decimals {
            query.distance_decimals = decimals;
        }
        query.position = options.position;
        if let Some(columns) = options.return_columns {
            query.columns = columns;
        }
        query.filters = options.rules;
        query
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Set the latitude and longitude column names.
    pub fn with_coordinate_columns(
        mut self,
        lat: impl Into<String>,
        lng: impl Into<String>,
    ) -> Self {
        self.lat_column = lat.into();
        self.lng_column = lng.into();
        self
    }

    pub fn with_return_columns(mut self, columns: Projection) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_units(mut self, units: UnitSystem) -> Self {
        self.units = units;
        self
    }

    /// Override the display label for one unit system.
    pub fn with_unit_label(mut self, units: UnitSystem, label: impl Into<String>) -> Self {
        match units {
            UnitSystem::Imperial => self.english_units = Some(label.into()),
            UnitSystem::Metric => self.metric_units = Some(label.into()),
        }
        self
    }

    /// Set the search radius. Negative input is folded to its absolute value,
    /// fractional input truncated.
    pub fn with_radius(mut self, radius: f64) -> Self {
        self.radius = radius.abs() as u32;
        self
    }

    /// Set the travel-distance multiplier; values below 1 are clamped to 1.
    pub fn with_distance_adjustment(mut self, adjustment: f64) -> Self {
        self.distance_adjustment = adjustment.max(1.0);
        self
    }

    pub fn with_distance_decimals(mut self, decimals: u32) -> Self {
        self.distance_decimals = decimals;
        self
    }

    /// Return at most `length` rows from the start of the ordered set.
    pub fn with_limit(mut self, length: usize) -> Self {
        self.limit_length = length;
        self
    }

    /// Return at most `length` rows beginning at `start` (0-based).
    pub fn with_limit_from(mut self, start: usize, length: usize) -> Self {
        self.limit_start = start;
        self.limit_length = length;
        self
    }

    /// Append a filter predicate.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Set the reference position.
    pub fn at(mut self, lat: f64, lng: f64) -> Self {
        self.position = Some(Position::new(lat, lng));
        self
    }

    /// Resolved display label for the active unit system.
    pub fn unit_label(&self) -> &str {
        match self.units {
            UnitSystem::Imperial => self.english_units.as_deref().unwrap_or("miles"),
            UnitSystem::Metric => self.metric_units.as_deref().unwrap_or("kilometers"),
        }
    }
}

/// Inbound configuration bundle with the recognized option keys.
///
/// Unknown keys are rejected at deserialization so a typo'd option fails at
/// the edge instead of silently configuring nothing.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryOptions {
    pub locations_table: Option<String>,
    pub latlng_columns: Option<(String, String)>,
    pub radius: Option<f64>,
    pub limit: Option<LimitOptions>,
    pub units: Option<UnitSystem>,
    pub english_units: Option<String>,
    pub metric_units: Option<String>,
    pub distance_adjustment: Option<f64>,
    pub distance_decimals: Option<u32>,
    pub position: Option<Position>,
    pub return_columns: Option<Projection>,
    pub rules: Vec<Filter>,
}

/// Pagination window inside an options bundle.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitOptions {
    pub length: usize,
    #[serde(default)]
    pub start: usize,
}

/// One matched row: the requested columns plus the computed distance.
#[derive(Debug, Clone, Serialize)]
pub struct LocationRow {
    /// Great-circle distance from the reference position, scaled and rounded
    /// per the query configuration.
    pub distance: f64,
    /// Requested columns keyed by column name.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Snapshot returned by a proximity search.
///
/// Field names are fixed for compatibility with existing consumers.
#[derive(Debug, Clone, Serialize)]
pub struct LocationResult {
    pub radius: u32,
    /// Resolved display label for the active unit system.
    pub units: String,
    pub position: Position,
    pub return_columns: Projection,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Filter>,
    /// Matched rows, ascending by distance.
    pub locations: Vec<LocationRow>,
    /// Rows returned after pagination.
    pub result_count: usize,
    /// Rows matched before pagination.
    pub total_locations: usize,
    pub limit_start: usize,
    pub limit_length: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_system_parses_case_insensitively() {
        assert_eq!("English".parse::<UnitSystem>().unwrap(), UnitSystem::Imperial);
        assert_eq!("imperial".parse::<UnitSystem>().unwrap(), UnitSystem::Imperial);
        assert_eq!("METRIC".parse::<UnitSystem>().unwrap(), UnitSystem::Metric);
        assert!("furlongs".parse::<UnitSystem>().is_err());
    }

    #[test]
    fn test_radius_truncated_and_non_negative() {
        assert_eq!(NearbyQuery::new().with_radius(-10.7).radius, 10);
        assert_eq!(NearbyQuery::new().with_radius(25.9).radius, 25);
    }

    #[test]
    fn test_distance_adjustment_clamps_below_one() {
        assert_eq!(
            NearbyQuery::new().with_distance_adjustment(0.5).distance_adjustment,
            1.0
        );
        assert_eq!(
            NearbyQuery::new().with_distance_adjustment(1.2).distance_adjustment,
            1.2
        );
    }

    #[test]
    fn test_unit_label_prefers_overrides() {
        let query = NearbyQuery::new().with_unit_label(UnitSystem::Imperial, "mi");
        assert_eq!(query.unit_label(), "mi");
        assert_eq!(
            NearbyQuery::new().with_units(UnitSystem::Metric).unit_label(),
            "kilometers"
        );
    }

    #[test]
    fn test_options_bundle_folds_over_defaults() {
        let options: QueryOptions = serde_json::from_str(
            r#"{
                "locations_table": "stores",
                "latlng_columns": ["latitude", "longitude"],
                "radius": 25,
                "limit": {"length": 5, "start": 2},
                "units": "Metric",
                "metric_units": "km",
                "distance_decimals": 2,
                "position": {"lat": 42.0, "lng": -71.0},
                "return_columns": ["name"],
                "rules": [{"op": "equals", "column": "category", "value": "pizza"}]
            }"#,
        )
        .unwrap();

        let query = NearbyQuery::from_options(options);
        assert_eq!(query.table, "stores");
        assert_eq!(query.lat_column, "latitude");
        assert_eq!(query.lng_column, "longitude");
        assert_eq!(query.radius, 25);
        assert_eq!(query.limit_start, 2);
        assert_eq!(query.limit_length, 5);
        assert_eq!(query.units, UnitSystem::Metric);
        assert_eq!(query.unit_label(), "km");
        assert_eq!(query.distance_decimals, 2);
        assert_eq!(query.position, Some(Position::new(42.0, -71.0)));
        assert_eq!(query.columns, Projection::columns(["name"]));
        assert_eq!(query.filters, vec![Filter::equals("category", "pizza")]);
    }

    #[test]
    fn test_unknown_option_keys_rejected() {
        assert!(serde_json::from_str::<QueryOptions>(r#"{"radiu": 10}"#).is_err());
    }

    #[test]
    fn test_projection_star_or_list() {
        assert_eq!(
            serde_json::from_str::<Projection>(r#""*""#).unwrap(),
            Projection::All
        );
        assert_eq!(
            serde_json::from_str::<Projection>(r#"["a", "b"]"#).unwrap(),
            Projection::columns(["a", "b"])
        );
        assert_eq!(serde_json::to_value(Projection::All).unwrap(), "*");
    }
}
