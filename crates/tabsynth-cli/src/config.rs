use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use tabsynth_eval::{Tolerances, ValidationOptions};
use tabsynth_generate::{GenerateOptions, OutputFormat, RowPlan};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "tabsynth.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Contents of `tabsynth.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabsynthConfig {
    pub generation: GenerationConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub default_rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub parallel: bool,
    pub max_truncation_attempts: u32,
    /// Per-table row counts.
    pub rows: BTreeMap<String, u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let engine = GenerateOptions::default();
        Self {
            default_rows: 1000,
            seed: None,
            parallel: engine.parallel,
            max_truncation_attempts: engine.max_truncation_attempts,
            rows: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub enabled: bool,
    pub fail_on_invalid: bool,
    pub max_examples: usize,
    pub tolerances: Tolerances,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fail_on_invalid: false,
            max_examples: ValidationOptions::default().max_examples,
            tolerances: Tolerances::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: OutputFormat,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("runs"),
            format: OutputFormat::Csv,
        }
    }
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub rows: Option<u64>,
    pub table_rows: Vec<(String, u64)>,
    pub seed: Option<u64>,
    pub out: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub serial: bool,
    pub skip_validation: bool,
    pub strict: bool,
}

impl TabsynthConfig {
    pub fn parse(contents: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn apply(mut self, overrides: Overrides) -> Self {
        if let Some(rows) = overrides.rows {
            self.generation.default_rows = rows;
        }
        for (table, rows) in overrides.table_rows {
            self.generation.rows.insert(table, rows);
        }
        if overrides.seed.is_some() {
            self.generation.seed = overrides.seed;
        }
        if let Some(out) = overrides.out {
            self.output.dir = out;
        }
        if let Some(format) = overrides.format {
            self.output.format = format;
        }
        if overrides.serial {
            self.generation.parallel = false;
        }
        if overrides.skip_validation {
            self.validation.enabled = false;
        }
        if overrides.strict {
            self.validation.fail_on_invalid = true;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.generation.max_truncation_attempts == 0 {
            return Err(ConfigError::Invalid(
                "generation.max_truncation_attempts must be at least 1".to_string(),
            ));
        }
        let tolerances = &self.validation.tolerances;
        let bands = [
            ("categorical_relative", tolerances.categorical_relative),
            ("categorical_absolute", tolerances.categorical_absolute),
            ("mean_relative", tolerances.mean_relative),
            ("std_dev_relative", tolerances.std_dev_relative),
            ("null_absolute", tolerances.null_absolute),
            ("sigma", tolerances.sigma),
        ];
        if let Some((name, _)) = bands
            .iter()
            .find(|(_, value)| !value.is_finite() || *value < 0.0)
        {
            return Err(ConfigError::Invalid(format!(
                "validation.tolerances.{name} must be a non-negative number"
            )));
        }
        Ok(())
    }

    pub fn row_plan(&self) -> RowPlan {
        self.generation
            .rows
            .iter()
            .fold(RowPlan::uniform(self.generation.default_rows), |plan, (table, rows)| {
                plan.with_table(table.clone(), *rows)
            })
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            seed: self.generation.seed,
            parallel: self.generation.parallel,
            max_truncation_attempts: self.generation.max_truncation_attempts,
            cancellation: None,
        }
    }

    pub fn validation_options(&self) -> ValidationOptions {
        ValidationOptions {
            tolerances: self.validation.tolerances,
            expected_rows: None,
            max_examples: self.validation.max_examples,
        }
    }
}

/// Load the config named by `--config`, or `tabsynth.toml` when it exists.
pub fn load_config(explicit: Option<&Path>) -> Result<TabsynthConfig, ConfigError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(TabsynthConfig::default());
            }
            default
        }
    };
    let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;
    TabsynthConfig::parse(&contents, &path)
}

/// Parse a `--table-rows name=N` argument.
pub fn parse_table_rows(raw: &str) -> Result<(String, u64), String> {
    let (table, rows) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=ROWS, got '{raw}'"))?;
    let table = table.trim();
    if table.is_empty() {
        return Err(format!("missing table name in '{raw}'"));
    }
    let rows = rows
        .trim()
        .parse::<u64>()
        .map_err(|err| format!("invalid row count in '{raw}': {err}"))?;
    Ok((table.to_string(), rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[generation]
default_rows = 250
seed = 7
parallel = false

[generation.rows]
orders = 900

[validation]
fail_on_invalid = true

[validation.tolerances]
sigma = 3.0

[output]
dir = "out"
format = "json"
"#;

    #[test]
    fn parses_all_sections() {
        let config = TabsynthConfig::parse(SAMPLE, Path::new("tabsynth.toml")).expect("parse");
        assert_eq!(config.generation.default_rows, 250);
        assert_eq!(config.generation.seed, Some(7));
        assert!(!config.generation.parallel);
        assert_eq!(config.generation.max_truncation_attempts, 16);
        assert!(config.validation.fail_on_invalid);
        assert_eq!(config.validation.tolerances.sigma, 3.0);
        assert_eq!(config.validation.tolerances.mean_relative, 0.10);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert_eq!(config.output.format, OutputFormat::Json);

        let plan = config.row_plan();
        assert_eq!(plan.rows_for("orders"), 900);
        assert_eq!(plan.rows_for("customers"), 250);
    }

    #[test]
    fn empty_file_means_defaults() {
        let config = TabsynthConfig::parse("", Path::new("tabsynth.toml")).expect("parse");
        assert_eq!(config, TabsynthConfig::default());
        assert!(config.validation.enabled);
        assert_eq!(config.output.format, OutputFormat::Csv);
    }

    #[test]
    fn flags_override_file_values() {
        let config = TabsynthConfig::parse(SAMPLE, Path::new("tabsynth.toml"))
            .expect("parse")
            .apply(Overrides {
                rows: Some(10),
                table_rows: vec![("orders".to_string(), 40)],
                seed: Some(99),
                format: Some(OutputFormat::Csv),
                skip_validation: true,
                ..Overrides::default()
            });
        assert_eq!(config.generation.default_rows, 10);
        assert_eq!(config.generation.rows.get("orders"), Some(&40));
        assert_eq!(config.generate_options().seed, Some(99));
        assert!(!config.generate_options().parallel);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert_eq!(config.output.dir, PathBuf::from("out"));
        assert!(!config.validation.enabled);
    }

    #[test]
    fn unknown_format_is_rejected() {
        let err = TabsynthConfig::parse("[output]\nformat = \"xml\"\n", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn negative_tolerance_is_invalid() {
        let config = TabsynthConfig::parse(
            "[validation.tolerances]\nnull_absolute = -0.5\n",
            Path::new("tabsynth.toml"),
        )
        .expect("parse");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("null_absolute"));
    }

    #[test]
    fn parses_table_rows_argument() {
        assert_eq!(
            parse_table_rows("orders=1200"),
            Ok(("orders".to_string(), 1200))
        );
        assert!(parse_table_rows("orders").is_err());
        assert!(parse_table_rows("=5").is_err());
        assert!(parse_table_rows("orders=many").is_err());
    }
}
