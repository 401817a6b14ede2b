use schemars::schema_for;
use tabsynth_core::TableSchema;

#[test]
fn json_schema_describes_table_document() {
    let generated = schema_for!(TableSchema);
    let json = serde_json::to_value(&generated).expect("serialize generated schema");

    let required = json
        .get("required")
        .and_then(|value| value.as_array())
        .expect("required array");
    assert!(required.contains(&serde_json::Value::String("table_name".to_string())));
    assert!(required.contains(&serde_json::Value::String("columns".to_string())));

    let columns = json
        .pointer("/properties/columns")
        .expect("columns property");
    assert_eq!(
        columns.get("type"),
        Some(&serde_json::Value::String("object".to_string()))
    );
    assert!(json.pointer("/definitions/ColumnSpec").is_some());
    assert!(json.pointer("/definitions/NumericalStats").is_some());
}
