mod config;
mod registry;

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tabsynth_core::{
    Error as CoreError, TableSchema, build_dependency_report, load_schema_files, resolve_schemas,
};
use tabsynth_eval::{ValidationError, validate_multi};
use tabsynth_generate::{GenerationError, OutputFormat, generate_multi, write_table};
use thiserror::Error;
use uuid::Uuid;

use config::{ConfigError, Overrides, load_config, parse_table_rows};
use registry::{RunContext, init_logging, start_run, write_generation_report, write_validation};

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("schema error: {0}")]
    Core(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run failed: {0}")]
    RunFailed(String),
}

#[derive(Parser, Debug)]
#[command(name = "tabsynth", version, about = "Synthetic tabular data generator")]
struct Cli {
    /// Log debug events to stderr and the run log.
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate tables and validate them against their schema.
    Generate(GenerateArgs),
    /// Resolve schemas and print the generation order.
    Check(CheckArgs),
    /// Print the JSON Schema of the table schema format.
    JsonSchema,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatArg {
    Csv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Csv => OutputFormat::Csv,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Schema file(s) in JSON.
    #[arg(long, value_name = "FILE", required = true, num_args = 1..)]
    schema: Vec<PathBuf>,
    /// Rows per table unless overridden.
    #[arg(long)]
    rows: Option<u64>,
    /// Row count for one table, as TABLE=ROWS.
    #[arg(long = "table-rows", value_name = "TABLE=ROWS", value_parser = parse_table_rows)]
    table_rows: Vec<(String, u64)>,
    /// Run seed; drawn at random when absent.
    #[arg(long)]
    seed: Option<u64>,
    /// Output directory for runs.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Table file format.
    #[arg(long, value_enum)]
    format: Option<FormatArg>,
    /// Config file (defaults to ./tabsynth.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Generate columns and tables on the calling thread.
    #[arg(long, default_value_t = false)]
    serial: bool,
    /// Skip validation of the generated tables.
    #[arg(long, default_value_t = false)]
    skip_validation: bool,
    /// Fail when the run is partial or validation fails.
    #[arg(long, default_value_t = false)]
    strict: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Schema file(s) in JSON.
    #[arg(long, value_name = "FILE", required = true, num_args = 1..)]
    schema: Vec<PathBuf>,
    /// Print the dependency report as JSON.
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Generate(args) => run_generate(args, cli.verbose),
        Command::Check(args) => {
            init_logging(cli.verbose, None)?;
            run_check(args)
        }
        Command::JsonSchema => {
            let schema = schemars::schema_for!(TableSchema);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn run_generate(args: GenerateArgs, verbose: bool) -> Result<(), CliError> {
    let GenerateArgs {
        schema,
        rows,
        table_rows,
        seed,
        out,
        format,
        config,
        serial,
        skip_validation,
        strict,
    } = args;

    let config = load_config(config.as_deref())?.apply(Overrides {
        rows,
        table_rows,
        seed,
        out,
        format: format.map(OutputFormat::from),
        serial,
        skip_validation,
        strict,
    });
    config.validate()?;

    let schemas = load_schema_files(schema.as_slice())?;

    let run_ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: Utc::now(),
        run_dir: config.output.dir.clone(),
        schema_files: schema,
        config: config.clone(),
    };
    let run_paths = start_run(&run_ctx)?;
    init_logging(verbose, Some(&run_paths.logs_path))?;

    let timer = Instant::now();
    tracing::info!(
        event = "run_started",
        run_id = %run_ctx.run_id,
        tables = schemas.len(),
        default_rows = config.generation.default_rows,
        parallel = config.generation.parallel,
        run_dir = %run_paths.root.display()
    );

    let output = generate_multi(&schemas, &config.row_plan(), &config.generate_options())?;
    tracing::info!(
        event = "generation_finished",
        seed = output.seed(),
        complete = output.is_complete()
    );

    for table in &output.tables {
        let (path, bytes) = write_table(&run_paths.root, table, config.output.format)?;
        tracing::info!(
            event = "table_written",
            table = table.name(),
            rows = table.row_count(),
            bytes,
            path = %path.display()
        );
    }
    write_generation_report(&run_paths, &output.report)?;

    let mut invalid_tables = Vec::new();
    if config.validation.enabled {
        let reports = validate_multi(&output, &schemas, &config.validation_options())?;
        write_validation(
            &run_paths,
            &reports,
            output.seed(),
            config.validation.max_examples,
        )?;
        invalid_tables.extend(
            reports
                .iter()
                .filter(|report| !report.is_valid)
                .map(|report| report.table.clone()),
        );
        tracing::info!(
            event = "validation_written",
            path = %run_paths.validation_path.display(),
            invalid = invalid_tables.len()
        );
    } else {
        tracing::info!(event = "validation_skipped");
    }

    println!("run: {}", run_paths.root.display());
    println!("seed: {}", output.seed());
    for report in &output.report.tables {
        println!("{}: {} rows", report.table, report.rows_generated);
    }
    for failure in &output.report.failures {
        println!("{}: failed ({:?})", failure.table, failure.reason);
    }
    for table in &output.report.pending {
        println!("{table}: pending");
    }
    for table in &invalid_tables {
        println!("{table}: validation failed");
    }

    let duration_ms = timer.elapsed().as_millis() as u64;
    if config.validation.fail_on_invalid {
        if !output.is_complete() {
            tracing::info!(event = "run_finished", status = "partial", duration_ms);
            return Err(CliError::RunFailed(format!(
                "{} table(s) failed, {} pending",
                output.report.failures.len(),
                output.report.pending.len()
            )));
        }
        if !invalid_tables.is_empty() {
            tracing::info!(event = "run_finished", status = "invalid", duration_ms);
            return Err(CliError::RunFailed(format!(
                "validation failed for {}",
                invalid_tables.join(", ")
            )));
        }
    }

    tracing::info!(event = "run_finished", status = "success", duration_ms);
    Ok(())
}

fn run_check(args: CheckArgs) -> Result<(), CliError> {
    let schemas = load_schema_files(args.schema.as_slice())?;
    let resolved = resolve_schemas(&schemas)?;

    if args.json {
        let report = build_dependency_report(&resolved.tables);
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for (depth, level) in resolved.levels.iter().enumerate() {
        println!("level {depth}: {}", level.join(", "));
    }
    for table in &resolved.tables {
        for (column, reference) in table.foreign_keys() {
            println!(
                "{}.{} -> {}.{}",
                table.name, column.name, reference.table, reference.column
            );
        }
    }
    Ok(())
}
