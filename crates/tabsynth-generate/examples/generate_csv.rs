use std::env;
use std::path::PathBuf;

use tabsynth_core::load_schema_files;
use tabsynth_generate::{GenerateOptions, OutputFormat, RowPlan, generate_multi, write_table};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut args = env::args().skip(1);
    let mut schema_path: Option<PathBuf> = None;
    let mut out_dir: Option<PathBuf> = None;
    let mut rows: u64 = 100;
    let mut seed: Option<u64> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--schema" => schema_path = args.next().map(PathBuf::from),
            "--out" => out_dir = args.next().map(PathBuf::from),
            "--rows" => rows = args.next().ok_or("missing --rows value")?.parse()?,
            "--seed" => seed = Some(args.next().ok_or("missing --seed value")?.parse()?),
            _ => {
                if schema_path.is_none() {
                    schema_path = Some(PathBuf::from(arg));
                } else {
                    return Err("unexpected argument".into());
                }
            }
        }
    }

    let schema_path = schema_path.ok_or("missing --schema path")?;
    let out_dir = out_dir.unwrap_or_else(|| PathBuf::from("out"));
    std::fs::create_dir_all(&out_dir)?;

    let schemas = load_schema_files(&[schema_path])?;
    let options = GenerateOptions {
        seed,
        ..GenerateOptions::default()
    };
    let output = generate_multi(&schemas, &RowPlan::uniform(rows), &options)?;

    for table in &output.tables {
        let (path, bytes) = write_table(&out_dir, table, OutputFormat::Csv)?;
        println!("{} rows={} bytes={bytes}", path.display(), table.row_count());
    }
    println!("seed={}", output.seed());
    Ok(())
}
