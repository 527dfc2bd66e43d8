use crate::artifacts::ArtifactPaths;
use crate::error::ConfigError;
use crate::routes::DEFAULT_JSON_LIMIT;
use crate::schema::Variant;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Server configuration, read from the environment.
///
/// | Variable          | Default                  |
/// |-------------------|--------------------------|
/// | `PREDICT_VARIANT` | `insurance`              |
/// | `HOST`            | `127.0.0.1`              |
/// | `PORT`            | `8080`                   |
/// | `WORKERS`         | number of CPUs           |
/// | `ARTIFACT_DIR`    | `.`                      |
/// | `MODEL_FILE`      | per-variant model file   |
/// | `SCALER_FILE`     | `my_scaler.json`         |
/// | `COLUMNS_FILE`    | `model_columns.json`     |
/// | `JSON_LIMIT`      | 65536 bytes              |
///
/// File variables are resolved against `ARTIFACT_DIR` unless absolute.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub variant: Variant,
    pub host: String,
    pub port: u16,
    pub workers: usize,
    pub json_limit: usize,
    pub artifacts: ArtifactPaths,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let variant = match lookup("PREDICT_VARIANT") {
            Some(name) => name.parse()?,
            None => Variant::Insurance,
        };
        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());
        let port = parse_var(&lookup, "PORT", 8080u16)?;
        let workers = parse_var(&lookup, "WORKERS", num_cpus::get())?;
        if workers == 0 {
            return Err(ConfigError::InvalidValue {
                key: "WORKERS",
                value: "0".to_string(),
                reason: "at least one worker is required".to_string(),
            });
        }
        let json_limit = parse_var(&lookup, "JSON_LIMIT", DEFAULT_JSON_LIMIT)?;

        let dir = PathBuf::from(lookup("ARTIFACT_DIR").unwrap_or_else(|| ".".to_string()));
        let mut artifacts = ArtifactPaths::in_dir(&dir, variant);
        if let Some(file) = lookup("MODEL_FILE") {
            artifacts.model = dir.join(file);
        }
        if let Some(file) = lookup("SCALER_FILE") {
            artifacts.scaler = dir.join(file);
        }
        if let Some(file) = lookup("COLUMNS_FILE") {
            artifacts.columns = dir.join(file);
        }

        Ok(Config {
            variant,
            host,
            port,
            workers,
            json_limit,
            artifacts,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidValue {
                key,
                value: value.clone(),
                reason: e.to_string(),
            }),
        None => Ok(default),
    }
}
