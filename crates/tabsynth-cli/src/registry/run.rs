use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use tabsynth_eval::{ValidationReport, render_report};
use tabsynth_generate::GenerationReport;

use crate::config::TabsynthConfig;

use super::RegistryResult;

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub schema_files: Vec<PathBuf>,
    pub config: TabsynthConfig,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig<'a> {
    pub run_id: &'a str,
    pub started_at: String,
    pub schema_files: &'a [PathBuf],
    pub config: &'a TabsynthConfig,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub generation_report_path: PathBuf,
    pub validation_path: PathBuf,
    pub report_path: PathBuf,
}

/// Create `<timestamp>__run_<id>/` with its config snapshot and an empty log.
pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: &ctx.run_id,
        started_at: ctx.started_at.to_rfc3339(),
        schema_files: &ctx.schema_files,
        config: &ctx.config,
        git: collect_git_info(),
    };
    write_json(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.jsonl");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        generation_report_path: root.join("generation_report.json"),
        validation_path: root.join("validation.json"),
        report_path: root.join("report.md"),
        logs_path,
        root,
    })
}

pub fn write_generation_report(paths: &RunPaths, report: &GenerationReport) -> RegistryResult<()> {
    write_json(&paths.generation_report_path, report)
}

/// Write `validation.json` and the markdown summary `report.md`.
pub fn write_validation(
    paths: &RunPaths,
    reports: &[ValidationReport],
    seed: u64,
    max_examples: usize,
) -> RegistryResult<()> {
    write_json(&paths.validation_path, &reports)?;
    let markdown = render_report(reports, Some(seed), max_examples);
    std::fs::write(&paths.report_path, markdown)?;
    Ok(())
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> RegistryResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
