// crates/sales-ingest-core/src/config.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::destination::Destination;
use crate::error::{IngestError, Result};

pub const HOME_ENV: &str = "SALES_INGEST_HOME";
pub const CONNECTION_ENV_PREFIX: &str = "SALES_INGEST_CONN_";
pub const FALLBACK_DATABASE_ENV: &str = "DATABASE_URL";

const DEFAULT_TIMEOUT_SECS: u64 = 2 * 60 * 60;

/// Pipeline configuration as written in `sales-ingest.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub ingestion: IngestionSettings,
    #[serde(default)]
    pub connections: BTreeMap<String, String>,
    #[serde(default)]
    pub transform: TransformSettings,
    #[serde(default)]
    pub run: RunSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IngestionSettings {
    pub data_file_path: PathBuf,
    pub connection_id: String,
    pub schema: String,
    pub table_name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformSettings {
    #[serde(default = "default_transform_program")]
    pub program: String,
    #[serde(default = "default_transform_args")]
    pub args: Vec<String>,
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
}

impl Default for TransformSettings {
    fn default() -> Self {
        Self {
            program: default_transform_program(),
            args: default_transform_args(),
            working_dir: None,
        }
    }
}

fn default_transform_program() -> String {
    "dbt".to_string()
}

fn default_transform_args() -> Vec<String> {
    vec!["build".into(), "--profiles-dir".into(), "./..".into()]
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl RunSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// A connection identifier together with the URL it resolved to.
#[derive(Clone)]
pub struct Connection {
    pub id: String,
    pub url: String,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// Everything the ingestion job needs, fully resolved at construction time.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub data_file_path: PathBuf,
    pub connection: Connection,
    pub destination: Destination,
}

/// Everything a pipeline run needs.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub job: JobConfig,
    pub transform: TransformSettings,
    pub timeout: Duration,
}

pub fn parse_config(toml_str: &str) -> Result<PipelineConfig> {
    toml::from_str::<PipelineConfig>(toml_str)
        .map_err(|err| IngestError::config(format!("failed to parse configuration TOML: {err}")))
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let contents = std::fs::read_to_string(path).map_err(|err| {
        IngestError::config(format!("failed to read {}: {err}", path.display()))
    })?;
    parse_config(&contents)
}

impl PipelineConfig {
    /// Resolves paths and connection URLs against the process environment.
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_with<F>(&self, lookup: F) -> Result<ResolvedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let settings = &self.ingestion;

        let data_file_path = match lookup(HOME_ENV) {
            Some(home) if settings.data_file_path.is_relative() => {
                Path::new(&home).join(&settings.data_file_path)
            }
            _ => settings.data_file_path.clone(),
        };

        let url = self.connection_url(&settings.connection_id, &lookup)?;

        let transform = match (&self.transform.working_dir, lookup(HOME_ENV)) {
            (Some(dir), Some(home)) if dir.is_relative() => TransformSettings {
                working_dir: Some(Path::new(&home).join(dir)),
                ..self.transform.clone()
            },
            _ => self.transform.clone(),
        };

        Ok(ResolvedConfig {
            job: JobConfig {
                data_file_path,
                connection: Connection {
                    id: settings.connection_id.clone(),
                    url,
                },
                destination: Destination::new(&settings.schema, &settings.table_name)?,
            },
            transform,
            timeout: self.run.timeout(),
        })
    }

    fn connection_url<F>(&self, id: &str, lookup: &F) -> Result<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_key = format!(
            "{CONNECTION_ENV_PREFIX}{}",
            id.to_ascii_uppercase().replace('-', "_")
        );

        lookup(&env_key)
            .or_else(|| self.connections.get(id).cloned())
            .or_else(|| lookup(FALLBACK_DATABASE_ENV))
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| {
                IngestError::config(format!(
                    "connection '{id}' is not defined (set {env_key}, add it under [connections], or set {FALLBACK_DATABASE_ENV})"
                ))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SAMPLE: &str = r#"
        [ingestion]
        data_file_path = "dags/data/generated_sales_data.csv"
        connection_id = "db"
        schema = "raw"
        table_name = "sales"

        [connections]
        db = "postgres://localhost/sales"
    "#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.transform.program, "dbt");
        assert_eq!(config.run.timeout(), Duration::from_secs(7200));
    }

    #[test]
    fn relative_data_path_joins_home() {
        let resolved = parse_config(SAMPLE)
            .unwrap()
            .resolve_with(env(&[(HOME_ENV, "/opt/sales")]))
            .unwrap();
        assert_eq!(
            resolved.job.data_file_path,
            PathBuf::from("/opt/sales/dags/data/generated_sales_data.csv")
        );
        assert_eq!(resolved.job.connection.url, "postgres://localhost/sales");
        assert_eq!(resolved.job.destination.to_string(), "raw.sales");
    }

    #[test]
    fn connection_env_overrides_table() {
        let resolved = parse_config(SAMPLE)
            .unwrap()
            .resolve_with(env(&[("SALES_INGEST_CONN_DB", "postgres://override/sales")]))
            .unwrap();
        assert_eq!(resolved.job.connection.url, "postgres://override/sales");
    }

    #[test]
    fn unknown_connection_is_a_config_error() {
        let mut config = parse_config(SAMPLE).unwrap();
        config.connections.clear();
        let err = config.resolve_with(env(&[])).unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse_config("[ingestion]\nbogus = 1\n").unwrap_err();
        assert!(matches!(err, IngestError::Config(_)));
    }
}
