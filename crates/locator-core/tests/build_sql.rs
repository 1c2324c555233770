//! Statement-shape tests for the proximity query builder.

use locator_core::query::{
    build_nearby_sql, distance_scale, filter_param, sanitize_identifier, EARTH_RADIUS_MILES,
    MILES_TO_KILOMETERS,
};
use locator_core::{Filter, NearbyQuery, Projection, UnitSystem};
use pretty_assertions::assert_eq;

#[test]
fn test_radius_cut_uses_distance_alias() {
    let sql = build_nearby_sql(&NearbyQuery::new().with_radius(50.0));

    assert!(
        sql.contains("AS distance"),
        "distance must be projected under its alias: {sql}"
    );
    assert!(
        sql.contains(") WHERE distance < 50"),
        "radius cut must compare the alias: {sql}"
    );
    assert!(sql.contains("ORDER BY distance ASC"));
    assert_eq!(
        sql.matches("ACOS").count(),
        1,
        "the trigonometric expression must appear exactly once: {sql}"
    );
}

#[test]
fn test_coordinate_columns_null_checked() {
    let sql = build_nearby_sql(&NearbyQuery::new());
    assert!(
        sql.contains("lat IS NOT NULL AND lng IS NOT NULL"),
        "{sql}"
    );
}

#[test]
fn test_filter_placeholders_distinct_and_ordered() {
    let query = NearbyQuery::new()
        .with_filter(Filter::equals("category", "pizza"))
        .with_filter(Filter::like("name", "%House%"))
        .with_filter(Filter::not_equals("city", "Albany"));
    let sql = build_nearby_sql(&query);

    for index in 1..=3 {
        assert_eq!(
            sql.matches(&filter_param(index)).count(),
            1,
            "placeholder {index} must appear exactly once: {sql}"
        );
    }

    let first = sql.find(":filter_1").unwrap();
    let second = sql.find(":filter_2").unwrap();
    let third = sql.find(":filter_3").unwrap();
    assert!(
        first < second && second < third,
        "placeholders must keep insertion order: {sql}"
    );

    assert!(sql.contains("category = :filter_1"));
    assert!(sql.contains("name LIKE :filter_2"));
    assert!(sql.contains("city <> :filter_3"));
}

#[test]
fn test_filter_values_not_in_statement_text() {
    let query = NearbyQuery::new().with_filter(Filter::equals("category", "pizza"));
    let sql = build_nearby_sql(&query);
    assert!(
        !sql.contains("pizza"),
        "values must bind as parameters: {sql}"
    );
}

#[test]
fn test_identifier_sanitization() {
    assert_eq!(sanitize_identifier("sto`res"), "stores");
    assert_eq!(sanitize_identifier("la\"t'"), "lat");

    let query = NearbyQuery::new()
        .with_table("loc`ations")
        .with_coordinate_columns("la't", "ln\"g")
        .with_filter(Filter::equals("cate`gory", "pizza"));
    let sql = build_nearby_sql(&query);

    assert!(
        !sql.contains('`') && !sql.contains('\'') && !sql.contains('"'),
        "quoting characters must not survive into the statement: {sql}"
    );
    assert!(sql.contains("FROM locations"));
    assert!(sql.contains("category = :filter_1"));
}

#[test]
fn test_projection_rendering() {
    let all = build_nearby_sql(&NearbyQuery::new());
    assert!(all.contains("SELECT *,"), "{all}");

    let some = build_nearby_sql(
        &NearbyQuery::new().with_return_columns(Projection::columns(["name", "city"])),
    );
    assert!(some.contains("SELECT name, city,"), "{some}");
}

#[test]
fn test_scale_constant() {
    assert_eq!(distance_scale(UnitSystem::Imperial, 1.0), EARTH_RADIUS_MILES);
    assert_eq!(
        distance_scale(UnitSystem::Metric, 1.0),
        EARTH_RADIUS_MILES * MILES_TO_KILOMETERS
    );
    assert_eq!(
        distance_scale(UnitSystem::Imperial, 1.3),
        EARTH_RADIUS_MILES * 1.3
    );

    let scale = distance_scale(UnitSystem::Metric, 1.0);
    let sql = build_nearby_sql(&NearbyQuery::new().with_units(UnitSystem::Metric));
    assert!(sql.contains(&format!("ROUND({scale} * ACOS")), "{sql}");
}

#[test]
fn test_rounding_precision_embedded() {
    let sql = build_nearby_sql(&NearbyQuery::new().with_distance_decimals(3));
    assert!(sql.contains(", 3) AS distance"), "{sql}");
}
