use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tabsynth_core::{ColumnSpec, DataType, NumericalStats, TableSchema, Value, load_schema_files};
use tabsynth_generate::{
    FailureReason, GenerateOptions, GenerationError, OutputFormat, RowPlan, generate,
    generate_multi, write_table,
};

fn shop_schemas() -> Vec<TableSchema> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../schemas/shop.schema.json");
    load_schema_files(&[path]).expect("load shop schema")
}

fn temp_out_dir(label: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "tabsynth_generate_{label}_{}",
        uuid::Uuid::new_v4()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn keys<'a>(values: impl Iterator<Item = &'a Value>) -> Vec<String> {
    values.map(Value::key).collect()
}

#[test]
fn generate_is_deterministic() {
    let schemas = shop_schemas();
    let plan = RowPlan::uniform(200);

    let first = generate_multi(&schemas, &plan, &GenerateOptions::with_seed(17)).expect("run A");
    let second = generate_multi(&schemas, &plan, &GenerateOptions::with_seed(17)).expect("run B");

    for table in &first.tables {
        let other = second.table(table.name()).expect("table in run B");
        assert_eq!(table.rows(), other.rows(), "{} should be deterministic", table.name());
    }

    let dir_a = temp_out_dir("run_a");
    let dir_b = temp_out_dir("run_b");
    let (path_a, _) =
        write_table(&dir_a, first.table("orders").expect("orders"), OutputFormat::Csv)
            .expect("write A");
    let (path_b, _) =
        write_table(&dir_b, second.table("orders").expect("orders"), OutputFormat::Csv)
            .expect("write B");
    assert_eq!(
        fs::read_to_string(path_a).expect("read A"),
        fs::read_to_string(path_b).expect("read B")
    );
}

#[test]
fn different_seeds_differ() {
    let schemas = shop_schemas();
    let plan = RowPlan::uniform(100);
    let first = generate_multi(&schemas, &plan, &GenerateOptions::with_seed(1)).expect("run A");
    let second = generate_multi(&schemas, &plan, &GenerateOptions::with_seed(2)).expect("run B");
    assert_ne!(
        first.table("orders").expect("orders").rows(),
        second.table("orders").expect("orders").rows()
    );
}

#[test]
fn parallel_and_serial_runs_match() {
    let schemas = shop_schemas();
    let plan = RowPlan::uniform(150);
    let parallel =
        generate_multi(&schemas, &plan, &GenerateOptions::with_seed(5)).expect("parallel run");
    let serial = generate_multi(
        &schemas,
        &plan,
        &GenerateOptions {
            parallel: false,
            ..GenerateOptions::with_seed(5)
        },
    )
    .expect("serial run");

    for table in &parallel.tables {
        assert_eq!(
            Some(table),
            serial.table(table.name()),
            "{} differs between parallel and serial",
            table.name()
        );
    }
}

#[test]
fn generate_respects_row_counts() {
    let schemas = shop_schemas();
    let plan = RowPlan::uniform(50).with_table("orders", 400);
    let output = generate_multi(&schemas, &plan, &GenerateOptions::with_seed(8)).expect("run");

    assert!(output.is_complete());
    for report in &output.report.tables {
        assert_eq!(report.rows_generated, report.rows_requested);
        assert_eq!(report.rows_generated, plan.rows_for(&report.table));
    }
    assert_eq!(output.table("orders").expect("orders").row_count(), 400);
}

#[test]
fn primary_keys_are_unique_and_foreign_keys_resolve() {
    let output = generate_multi(
        &shop_schemas(),
        &RowPlan::uniform(2_000),
        &GenerateOptions::with_seed(23),
    )
    .expect("run");

    let customers = output.table("customers").expect("customers");
    let products = output.table("products").expect("products");
    let orders = output.table("orders").expect("orders");

    for table in [customers, products, orders] {
        let pk = table.primary_key().expect("primary key");
        let values = keys(table.column_values(pk).expect("pk values"));
        let unique: HashSet<&String> = values.iter().collect();
        assert_eq!(unique.len(), values.len(), "{} keys collide", table.name());
    }

    let customer_ids: HashSet<String> =
        keys(customers.column_values("customer_id").expect("ids")).into_iter().collect();
    let product_ids: HashSet<String> =
        keys(products.column_values("product_id").expect("ids")).into_iter().collect();
    for value in keys(orders.column_values("customer_id").expect("fk")) {
        assert!(customer_ids.contains(&value), "dangling customer {value}");
    }
    for value in keys(orders.column_values("product_id").expect("fk")) {
        assert!(product_ids.contains(&value), "dangling product {value}");
    }

    assert_eq!(products.value(0, "product_id"), Some(&Value::Int(1000)));
    assert_eq!(
        customers.value(0, "customer_id"),
        Some(&Value::Text("cust_000001".to_string()))
    );
}

#[test]
fn categorical_frequencies_track_declared_weights() {
    let schema = TableSchema::new("events").with_column(
        "kind",
        ColumnSpec::new(DataType::String)
            .nullable(false)
            .with_values(["A", "B", "C"])
            .with_distribution([("A", 1000.0), ("B", 500.0), ("C", 200.0)]),
    );
    let table = generate(&schema, 100_000, &GenerateOptions::with_seed(99)).expect("generate");

    let expected = [("A", 1000.0 / 1700.0), ("B", 500.0 / 1700.0), ("C", 200.0 / 1700.0)];
    for (value, proportion) in expected {
        let count = table
            .column_values("kind")
            .expect("values")
            .filter(|cell| **cell == Value::Text(value.to_string()))
            .count();
        let observed = count as f64 / table.row_count() as f64;
        assert!(
            (observed - proportion).abs() <= 0.03,
            "{value}: observed {observed}, expected {proportion}"
        );
    }
}

#[test]
fn numeric_samples_stay_within_bounds() {
    let schema = TableSchema::new("payments").with_column(
        "amount",
        ColumnSpec::new(DataType::Float)
            .nullable(false)
            .with_stats(NumericalStats {
                min_value: Some(0.0),
                max_value: Some(1000.0),
                mean_value: Some(100.0),
                std_dev: Some(50.0),
                ..NumericalStats::default()
            }),
    );
    let table = generate(&schema, 100_000, &GenerateOptions::with_seed(4)).expect("generate");

    let values: Vec<f64> = table
        .column_values("amount")
        .expect("values")
        .filter_map(Value::to_numeric)
        .collect();
    assert_eq!(values.len(), 100_000);
    assert!(values.iter().all(|value| (0.0..=1000.0).contains(value)));
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    assert!((mean - 100.0).abs() <= 10.0, "mean {mean}");
}

#[test]
fn half_bounded_normal_column_keeps_its_spread() {
    let schema = TableSchema::new("parcels").with_column(
        "weight",
        ColumnSpec::new(DataType::Float)
            .nullable(false)
            .with_stats(NumericalStats {
                min_value: Some(1000.0),
                std_dev: Some(5.0),
                ..NumericalStats::default()
            }),
    );
    let table = generate(&schema, 1_000, &GenerateOptions::with_seed(3)).expect("generate");

    let values: Vec<f64> = table
        .column_values("weight")
        .expect("values")
        .filter_map(Value::to_numeric)
        .collect();
    assert!(values.iter().all(|value| *value >= 1000.0));
    let distinct: HashSet<u64> = values.iter().map(|value| value.to_bits()).collect();
    assert!(distinct.len() > 900, "distinct {}", distinct.len());
    let clamped = table.clamped().get("weight").copied().unwrap_or(0);
    assert!(clamped < 100, "clamped {clamped}");
}

#[test]
fn null_rate_tracks_declared_percentage() {
    let schema = TableSchema::new("people").with_column(
        "nickname",
        ColumnSpec::new(DataType::String)
            .with_values(["ace", "bee"])
            .with_null_percentage(5.0),
    );
    let table = generate(&schema, 100_000, &GenerateOptions::with_seed(6)).expect("generate");
    let nulls = table
        .column_values("nickname")
        .expect("values")
        .filter(|value| value.is_null())
        .count();
    let fraction = nulls as f64 / 100_000.0;
    assert!((0.03..=0.07).contains(&fraction), "fraction {fraction}");
}

#[test]
fn non_nullable_columns_never_emit_nulls() {
    let schema = TableSchema::new("people").with_column(
        "nickname",
        ColumnSpec::new(DataType::String)
            .nullable(false)
            .with_values(["ace", "bee"])
            .with_null_percentage(40.0),
    );
    let table = generate(&schema, 10_000, &GenerateOptions::with_seed(6)).expect("generate");
    assert!(
        table
            .column_values("nickname")
            .expect("values")
            .all(|value| !value.is_null())
    );
}

#[test]
fn invalid_schema_is_rejected_before_generation() {
    let schema = TableSchema::new("bad").with_column(
        "score",
        ColumnSpec::new(DataType::Float).with_stats(NumericalStats {
            min_value: Some(10.0),
            max_value: Some(1.0),
            ..NumericalStats::default()
        }),
    );
    let err = generate(&schema, 10, &GenerateOptions::with_seed(1)).unwrap_err();
    assert_eq!(err.code(), "schema_violation");
}

#[test]
fn key_exhaustion_yields_partial_result() {
    let mut schemas = shop_schemas();
    let products = schemas
        .iter_mut()
        .find(|table| table.table_name == "products")
        .expect("products table");
    products.columns[0].1.numerical_stats = Some(NumericalStats {
        min_value: Some(1.0),
        max_value: Some(5.0),
        ..NumericalStats::default()
    });

    let output = generate_multi(&schemas, &RowPlan::uniform(20), &GenerateOptions::with_seed(2))
        .expect("partial result");

    assert!(!output.is_complete());
    assert!(output.table("customers").is_some());
    assert!(output.table("products").is_none());
    assert!(output.table("orders").is_none());
    assert!(output.report.failures.iter().any(|failure| matches!(
        &failure.reason,
        FailureReason::ConstraintViolation { path, .. } if path == "products.product_id"
    )));
}

#[test]
fn json_export_writes_row_objects() {
    let output = generate_multi(
        &shop_schemas(),
        &RowPlan::uniform(5),
        &GenerateOptions::with_seed(12),
    )
    .expect("run");
    let dir = temp_out_dir("json");
    let (path, bytes) = write_table(
        &dir,
        output.table("products").expect("products"),
        OutputFormat::Json,
    )
    .expect("write json");

    assert!(bytes > 0);
    let text = fs::read_to_string(path).expect("read json");
    let first_row = &text[..text.find('}').expect("first row")];
    let positions: Vec<usize> = ["\"product_id\"", "\"category\"", "\"price\"", "\"currency\""]
        .iter()
        .map(|key| first_row.find(key).expect("key in first row"))
        .collect();
    assert!(
        positions.windows(2).all(|pair| pair[0] < pair[1]),
        "keys out of column order: {first_row}"
    );

    let rows: serde_json::Value = serde_json::from_str(&text).expect("parse json");
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 5);
    assert_eq!(rows[0]["currency"], "EUR");
}

#[test]
fn unsatisfiable_distinct_count_is_a_constraint_violation() {
    let schema = TableSchema::new("users").with_column(
        "id",
        ColumnSpec::primary_key(DataType::Integer).with_stats(NumericalStats {
            distinct_count: Some(10),
            ..NumericalStats::default()
        }),
    );
    let err = generate(&schema, 11, &GenerateOptions::with_seed(1)).unwrap_err();
    assert!(matches!(err, GenerationError::ConstraintViolation { .. }));
}
