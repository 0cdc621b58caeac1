//! Tests for spinneret plan resolution

use chrono::NaiveDate;
use spinneret::prelude::*;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn repo_metadata() -> EntityMetadata {
    EntityMetadata::new("repo", EntitySchema::new("repos").with_database("spider"))
        .with_field("id", "STRING,64")
        .with_field("title", "TEXT")
        .with_field("raw_html", "")
        .with_field("starred", "BOOL")
        .with_field("first_seen", "DATE")
        .with_primary(["id"])
}

// ==================== Resolution Tests ====================

#[test]
fn test_resolution_keeps_declared_order_and_drops_scratch_fields() {
    let plan = WritePlan::resolve(&repo_metadata(), WriteMode::Insert).unwrap();

    assert_eq!(plan.entity, "repo");
    assert_eq!(plan.database.as_deref(), Some("spider"));
    assert_eq!(plan.table, "repos");
    let names: Vec<&str> = plan.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, ["id", "title", "starred", "first_seen"]);
}

#[test]
fn test_insert_mode_resolves_no_update_set() {
    let plan = WritePlan::resolve(&repo_metadata(), WriteMode::Insert).unwrap();
    assert!(plan.update_columns.is_empty());
}

#[test]
fn test_update_mode_defaults_to_every_column_but_the_key() {
    let plan = WritePlan::resolve(&repo_metadata(), WriteMode::Update).unwrap();

    let keys: Vec<&str> = plan.primary.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(keys, ["id"]);
    let updates: Vec<&str> = plan.update_columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(updates, ["title", "starred", "first_seen"]);
}

#[test]
fn test_update_mode_honors_an_explicit_update_set() {
    let metadata = repo_metadata().with_updates(["starred"]);
    let plan = WritePlan::resolve(&metadata, WriteMode::Update).unwrap();

    let updates: Vec<&str> = plan.update_columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(updates, ["starred"]);
}

#[test]
fn test_explicit_update_set_still_excludes_the_key() {
    let metadata = repo_metadata().with_updates(["starred", "id"]);
    let plan = WritePlan::resolve(&metadata, WriteMode::Update).unwrap();

    let updates: Vec<&str> = plan.update_columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(updates, ["starred"]);
}

#[test]
fn test_index_and_unique_groups_resolve() {
    let metadata = repo_metadata()
        .with_index(["title", "starred"])
        .with_unique(["title"]);
    let plan = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap();

    assert_eq!(
        plan.indexes,
        vec![vec!["title".to_string(), "starred".to_string()]]
    );
    assert_eq!(plan.uniques, vec![vec!["title".to_string()]]);
}

#[test]
fn test_auto_increment_column_resolves() {
    let metadata = EntityMetadata::new("repo", EntitySchema::new("repos"))
        .with_field("seq", "STRING,20")
        .with_field("id", "STRING,64")
        .with_primary(["seq"])
        .with_auto_increment("seq");
    let plan = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap();

    assert_eq!(plan.auto_increment.as_deref(), Some("seq"));
}

// ==================== Table Naming Tests ====================

#[test]
fn test_monthly_suffix_freezes_the_first_of_the_month() {
    let metadata = EntityMetadata::new(
        "order",
        EntitySchema::new("orders").with_suffix(TableSuffix::FirstDayOfMonth),
    )
    .with_field("id", "STRING,32");

    let plan = WritePlan::resolve_on(&metadata, WriteMode::Insert, date(2024, 3, 15)).unwrap();
    assert_eq!(plan.table, "orders_2024_03_01");
}

#[test]
fn test_weekly_suffix_freezes_monday() {
    let metadata = EntityMetadata::new(
        "order",
        EntitySchema::new("orders").with_suffix(TableSuffix::Monday),
    )
    .with_field("id", "STRING,32");

    // 2024-03-13 is a Wednesday
    let plan = WritePlan::resolve_on(&metadata, WriteMode::Insert, date(2024, 3, 13)).unwrap();
    assert_eq!(plan.table, "orders_2024_03_11");
}

#[test]
fn test_qualified_table_name() {
    let plan = WritePlan::resolve(&repo_metadata(), WriteMode::Insert).unwrap();
    assert_eq!(plan.qualified_table(), "spider.repos");

    let bare = EntityMetadata::new("repo", EntitySchema::new("repos")).with_field("id", "TEXT");
    let plan = WritePlan::resolve(&bare, WriteMode::Insert).unwrap();
    assert_eq!(plan.qualified_table(), "repos");
}

// ==================== Validation Tests ====================

#[test]
fn test_missing_schema_is_a_configuration_error() {
    let metadata = EntityMetadata::without_schema("repo");
    let err = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap_err();
    assert!(matches!(err, Error::Configuration { .. }));
    assert!(err.to_string().contains("no schema"));
}

#[test]
fn test_nothing_persisted_is_a_configuration_error() {
    let metadata = EntityMetadata::new("repo", EntitySchema::new("repos"))
        .with_field("raw_html", "")
        .with_field("scratch", "");
    let err = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap_err();
    assert!(err.to_string().contains("no persisted columns"));
}

#[test]
fn test_primary_key_must_reference_a_declared_column() {
    let metadata = EntityMetadata::new("repo", EntitySchema::new("repos"))
        .with_field("id", "STRING,64")
        .with_primary(["uuid"]);
    let err = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap_err();
    assert!(err.to_string().contains("primary key references undeclared column"));
}

#[test]
fn test_primary_key_must_reference_a_persisted_column() {
    let metadata = EntityMetadata::new("repo", EntitySchema::new("repos"))
        .with_field("id", "STRING,64")
        .with_field("raw_html", "")
        .with_primary(["raw_html"]);
    let err = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap_err();
    assert!(err.to_string().contains("primary key references undeclared column"));
}

#[test]
fn test_update_mode_requires_a_primary_key() {
    let metadata = EntityMetadata::new("repo", EntitySchema::new("repos"))
        .with_field("id", "STRING,64")
        .with_field("title", "TEXT");
    let err = WritePlan::resolve(&metadata, WriteMode::Update).unwrap_err();
    assert!(err.to_string().contains("update mode requires a primary key"));
}

#[test]
fn test_updating_only_the_key_is_rejected() {
    let metadata = EntityMetadata::new("repo", EntitySchema::new("repos"))
        .with_field("id", "STRING,64")
        .with_primary(["id"]);
    let err = WritePlan::resolve(&metadata, WriteMode::Update).unwrap_err();
    assert!(err.to_string().contains("cannot update only the primary key"));
}

#[test]
fn test_update_set_must_reference_declared_columns() {
    let metadata = repo_metadata().with_updates(["rating"]);
    let err = WritePlan::resolve(&metadata, WriteMode::Update).unwrap_err();
    assert!(err.to_string().contains("update set references undeclared column"));
}

#[test]
fn test_index_groups_must_reference_declared_columns() {
    let metadata = repo_metadata().with_index(["title", "rating"]);
    let err = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap_err();
    assert!(err.to_string().contains("index references undeclared column"));
}

#[test]
fn test_unique_groups_must_reference_declared_columns() {
    let metadata = repo_metadata().with_unique(["rating"]);
    let err = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap_err();
    assert!(
        err.to_string()
            .contains("unique constraint references undeclared column")
    );
}

#[test]
fn test_auto_increment_must_reference_a_declared_column() {
    let metadata = repo_metadata().with_auto_increment("seq");
    let err = WritePlan::resolve(&metadata, WriteMode::Insert).unwrap_err();
    assert!(err.to_string().contains("auto-increment references undeclared column"));
}
