use metacache::metadata::{BindType, ColumnMap, ColumnSpec, ColumnType, MetadataRecord};
use serde_json::json;

fn robots() -> MetadataRecord {
    MetadataRecord::builder()
        .primary("id", ColumnType::Integer)
        .column("name", ColumnType::Varchar)
        .column("type", ColumnType::Varchar)
        .column("year", ColumnType::Integer)
        .identity("id")
        .build()
        .unwrap()
}

#[test]
fn test_robots_record_fields() {
    let record = robots();
    assert_eq!(record.attributes, ["id", "name", "type", "year"]);
    assert_eq!(record.primary_key, ["id"]);
    assert_eq!(record.non_primary_key, ["name", "type", "year"]);
    assert_eq!(record.not_null, ["id", "name", "type", "year"]);
    assert_eq!(record.data_types["name"], ColumnType::Varchar);
    assert_eq!(record.data_types["year"], ColumnType::Integer);
    assert_eq!(record.data_types_numeric.len(), 2);
    assert!(record.is_numeric("id"));
    assert!(record.is_numeric("year"));
    assert_eq!(record.identity_field.as_deref(), Some("id"));
    assert_eq!(record.bind_types["year"], BindType::Int);
}

#[test]
fn test_canonical_encoding() {
    let json = serde_json::to_string(&robots()).unwrap();
    assert_eq!(
        json,
        concat!(
            r#"{"0":["id","name","type","year"],"1":["id"],"2":["name","type","year"],"#,
            r#""3":["id","name","type","year"],"4":{"id":0,"name":2,"type":2,"year":0},"#,
            r#""5":{"id":true,"year":true},"8":"id","9":{"id":1,"name":2,"type":2,"year":1},"#,
            r#""10":[],"11":[]}"#
        )
    );
}

#[test]
fn test_legacy_layout_decodes() {
    let legacy = json!({
        "0": ["id", "name", "type", "year"],
        "1": ["id"],
        "2": ["name", "type", "year"],
        "3": ["id", "name", "type", "year"],
        "4": {"id": 0, "name": 2, "type": 2, "year": 0},
        "5": {"id": true, "year": true},
        "8": "id",
        "9": {"id": 1, "name": 2, "type": 2, "year": 1},
        "10": [],
        "11": []
    });
    let record: MetadataRecord = serde_json::from_value(legacy).unwrap();
    assert_eq!(record, robots());
}

#[test]
fn test_reserved_slots_round_trip_unchanged() {
    let mut record = robots();
    record.reserved_create = json!({"created_at": true});
    record.reserved_update = json!(["updated_at"]);

    let bytes = serde_json::to_vec(&record).unwrap();
    let decoded: MetadataRecord = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(decoded.reserved_create, json!({"created_at": true}));
    assert_eq!(decoded.reserved_update, json!(["updated_at"]));
    assert_eq!(decoded, record);
}

#[test]
fn test_equality_is_order_sensitive() {
    let mut reordered = robots();
    reordered.attributes.swap(1, 2);
    assert_ne!(reordered, robots());
    assert!(reordered.validate().is_ok());
}

#[test]
fn test_record_without_primary_key() {
    let record = MetadataRecord::builder()
        .nullable("payload", ColumnType::Text)
        .push(ColumnSpec::new("seen", ColumnType::Boolean).not_null())
        .build()
        .unwrap();
    assert!(record.primary_key.is_empty());
    assert_eq!(record.non_primary_key, ["payload", "seen"]);
    assert_eq!(record.bind_types["seen"], BindType::Bool);
    assert_eq!(record.identity_field, None);
}

#[test]
fn test_column_map_default_is_unresolved() {
    let map = ColumnMap::default();
    assert!(map.is_unresolved());
    assert_eq!(serde_json::to_value(&map).unwrap(), json!({"0": null, "1": null}));
    assert!(!ColumnMap::from_pairs([("robot_id", "id")]).is_unresolved());
}
