use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::process::schema::SchemaPolicy;
use crate::sink::OutputFormat;

pub const ENV_CONFIG: &str = "REVIEWPIPE_CONFIG";
pub const ENV_SOURCE: &str = "REVIEWPIPE_SOURCE";
pub const ENV_PROCESSED: &str = "REVIEWPIPE_PROCESSED";
pub const ENV_ANALYTICS: &str = "REVIEWPIPE_ANALYTICS";

const DEFAULT_MAX_ROWS_PER_FILE: usize = 1_000_000;

fn default_job_name() -> String {
    "product_reviews".to_string()
}

fn default_max_rows_per_file() -> usize {
    DEFAULT_MAX_ROWS_PER_FILE
}

/// Everything a run needs, handed to the pipeline at construction.
///
/// ```yaml
/// job_name: product_reviews
/// source_path: landing/
/// processed_path: processed/processed-data/
/// analytics_path: processed/analytics/
/// history_dir: history/        # optional
/// output_format: csv           # csv | parquet
/// schema_policy: fail_fast     # fail_fast | null_fill
/// max_rows_per_file: 1000000
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    #[serde(default = "default_job_name")]
    pub job_name: String,
    pub source_path: PathBuf,
    pub processed_path: PathBuf,
    pub analytics_path: PathBuf,
    #[serde(default)]
    pub history_dir: Option<PathBuf>,
    #[serde(default)]
    pub output_format: OutputFormat,
    #[serde(default)]
    pub schema_policy: SchemaPolicy,
    /// Upper bound on rows per processed-dataset file. Aggregates are always one file.
    #[serde(default = "default_max_rows_per_file")]
    pub max_rows_per_file: usize,
}

impl PipelineConfig {
    pub fn new(
        source_path: impl Into<PathBuf>,
        processed_path: impl Into<PathBuf>,
        analytics_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_name: default_job_name(),
            source_path: source_path.into(),
            processed_path: processed_path.into(),
            analytics_path: analytics_path.into(),
            history_dir: None,
            output_format: OutputFormat::default(),
            schema_policy: SchemaPolicy::default(),
            max_rows_per_file: DEFAULT_MAX_ROWS_PER_FILE,
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml).context("parsing pipeline config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml_str(&text).with_context(|| format!("in config file {}", path.display()))
    }

    /// Override paths from `lookup` (normally the process environment).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_SOURCE) {
            self.source_path = v.into();
        }
        if let Some(v) = lookup(ENV_PROCESSED) {
            self.processed_path = v.into();
        }
        if let Some(v) = lookup(ENV_ANALYTICS) {
            self.analytics_path = v.into();
        }
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    pub fn validate(&self) -> Result<()> {
        if self.job_name.trim().is_empty() {
            bail!("job_name must not be empty");
        }
        for (name, path) in [
            ("source_path", &self.source_path),
            ("processed_path", &self.processed_path),
            ("analytics_path", &self.analytics_path),
        ] {
            if path.as_os_str().is_empty() {
                bail!("{} must not be empty", name);
            }
        }
        if self.max_rows_per_file == 0 {
            bail!("max_rows_per_file must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn minimal_yaml_gets_defaults() -> Result<()> {
        let config = PipelineConfig::from_yaml_str(
            "source_path: landing/\nprocessed_path: out/processed\nanalytics_path: out/analytics\n",
        )?;
        assert_eq!(config.job_name, "product_reviews");
        assert_eq!(config.output_format, OutputFormat::Csv);
        assert_eq!(config.schema_policy, SchemaPolicy::FailFast);
        assert_eq!(config.max_rows_per_file, DEFAULT_MAX_ROWS_PER_FILE);
        assert_eq!(config.history_dir, None);
        Ok(())
    }

    #[test]
    fn full_yaml_round_trips_enums() -> Result<()> {
        let config = PipelineConfig::from_yaml_str(
            r#"
job_name: nightly
source_path: landing/
processed_path: out/processed
analytics_path: "out/Athena Results"
history_dir: history
output_format: parquet
schema_policy: null_fill
max_rows_per_file: 10
"#,
        )?;
        assert_eq!(config.output_format, OutputFormat::Parquet);
        assert_eq!(config.schema_policy, SchemaPolicy::NullFill);
        assert_eq!(config.analytics_path, PathBuf::from("out/Athena Results"));
        assert_eq!(config.history_dir, Some(PathBuf::from("history")));
        Ok(())
    }

    #[test]
    fn rejects_bad_configs() {
        assert!(PipelineConfig::from_yaml_str("source_path: a\n").is_err());
        assert!(PipelineConfig::from_yaml_str(
            "source_path: a\nprocessed_path: b\nanalytics_path: c\nmax_rows_per_file: 0\n"
        )
        .is_err());
        assert!(PipelineConfig::from_yaml_str(
            "source_path: a\nprocessed_path: b\nanalytics_path: c\nbucket: x\n"
        )
        .is_err());
        assert!(PipelineConfig::new("", "b", "c").validate().is_err());
    }

    #[test]
    fn overrides_replace_paths() {
        let env: HashMap<&str, &str> = [(ENV_SOURCE, "s3-mirror/landing"), (ENV_ANALYTICS, "a2")]
            .into_iter()
            .collect();
        let mut config = PipelineConfig::new("a", "b", "c");
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.source_path, PathBuf::from("s3-mirror/landing"));
        assert_eq!(config.processed_path, PathBuf::from("b"));
        assert_eq!(config.analytics_path, PathBuf::from("a2"));
    }
}
