use tabsynth_core::{ColumnSpec, DataType, NumericalStats, TableSchema};

#[test]
fn serializes_schema_deterministically() {
    let schema = TableSchema::new("accounts")
        .with_column("id", ColumnSpec::primary_key(DataType::Integer))
        .with_column(
            "balance",
            ColumnSpec::new(DataType::Float).with_stats(NumericalStats {
                min_value: Some(0.0),
                max_value: Some(10.0),
                ..NumericalStats::default()
            }),
        );

    let json = serde_json::to_string_pretty(&schema).expect("serialize schema");
    let expected = r#"{
  "table_name": "accounts",
  "columns": {
    "id": {
      "data_type": "INTEGER",
      "nullable": false,
      "is_primary_key": true
    },
    "balance": {
      "data_type": "FLOAT",
      "nullable": true,
      "is_primary_key": false,
      "numerical_stats": {
        "min_value": 0.0,
        "max_value": 10.0
      }
    }
  }
}"#;
    assert_eq!(json, expected);
}

#[test]
fn round_trips_through_json() {
    let json = r#"{
        "table_name": "customers",
        "columns": {
            "customer_id": {"data_type": "STRING", "nullable": false, "is_primary_key": true},
            "segment": {
                "data_type": "STRING",
                "nullable": true,
                "is_primary_key": false,
                "categorical_values": ["retail", "wholesale"],
                "value_distribution": {"retail": 80, "wholesale": 20}
            }
        }
    }"#;

    let schema: TableSchema = serde_json::from_str(json).expect("parse schema");
    let encoded = serde_json::to_string(&schema).expect("serialize schema");
    let decoded: TableSchema = serde_json::from_str(&encoded).expect("parse encoded schema");
    assert_eq!(schema, decoded);
    assert_eq!(
        decoded.column("segment").map(|spec| spec.value_distribution.clone()),
        Some(vec![("retail".to_string(), 80.0), ("wholesale".to_string(), 20.0)])
    );
}
