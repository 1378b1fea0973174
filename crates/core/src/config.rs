use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::error::{Result, TaskError};

pub const ENV_API_URL: &str = "TASKDECK_API_URL";
pub const ENV_API_URL_FALLBACK: &str = "NEXT_PUBLIC_API_URL";
pub const ENV_TOKEN: &str = "TASKDECK_TOKEN";
pub const ENV_TIMEOUT_SECS: &str = "TASKDECK_TIMEOUT_SECS";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

static DEFAULT_ENV_FILE: &str = ".env";

/// Values supplied on the command line; each one wins over the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub api_url: Option<String>,
    pub token: Option<String>,
    pub timeout_secs: Option<u64>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    api_url: Option<String>,
    token: Option<String>,
    timeout: Duration,
}

impl AppConfig {
    /// Construct [`AppConfig`] from the provided overrides, the process environment and
    /// a `.env` file (the explicit `env_file`, or `./.env` when present).
    pub fn discover(overrides: ConfigOverrides) -> Result<Self> {
        let file_values = match &overrides.env_file {
            Some(path) => read_env_file(path)?,
            None => {
                let default = Path::new(DEFAULT_ENV_FILE);
                if default.exists() {
                    read_env_file(default)?
                } else {
                    HashMap::new()
                }
            }
        };
        Self::resolve(overrides, |key| {
            env::var(key)
                .ok()
                .or_else(|| file_values.get(key).cloned())
        })
    }

    /// Resolve against an arbitrary key lookup. Empty values count as unset.
    pub fn resolve<F>(overrides: ConfigOverrides, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_url = non_empty(overrides.api_url)
            .or_else(|| lookup(ENV_API_URL))
            .or_else(|| lookup(ENV_API_URL_FALLBACK));
        let token = non_empty(overrides.token).or_else(|| lookup(ENV_TOKEN));
        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => secs,
            None => match lookup(ENV_TIMEOUT_SECS) {
                Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                    TaskError::configuration(format!(
                        "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"
                    ))
                })?,
                None => DEFAULT_TIMEOUT_SECS,
            },
        };
        if timeout_secs == 0 {
            return Err(TaskError::configuration("Request timeout must be at least 1 second"));
        }

        Ok(Self {
            api_url,
            token,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            api_url: Some(api_url.into()),
            token: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// The validated Task API base URL. A missing or malformed value is a configuration
    /// error and must be reported before any request is attempted.
    pub fn api_url(&self) -> Result<Url> {
        let raw = self.api_url.as_deref().ok_or_else(|| {
            TaskError::configuration(format!(
                "Task API base URL is not set; provide --api-url or {ENV_API_URL}"
            ))
        })?;
        let url = Url::parse(raw.trim()).map_err(|err| {
            TaskError::configuration(format!("Task API base URL '{raw}' is invalid: {err}"))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(TaskError::configuration(format!(
                "Task API base URL must use http or https, got '{other}'"
            ))),
        }
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn read_env_file(path: &Path) -> Result<HashMap<String, String>> {
    let iter = dotenvy::from_path_iter(path).map_err(|err| {
        TaskError::configuration(format!("Failed to read {}: {err}", path.display()))
    })?;
    let mut values = HashMap::new();
    for item in iter {
        let (key, value) = item.map_err(|err| {
            TaskError::configuration(format!("Failed to parse {}: {err}", path.display()))
        })?;
        values.insert(key, value);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn override_wins_over_environment() {
        let overrides = ConfigOverrides {
            api_url: Some("http://flag.test".into()),
            ..ConfigOverrides::default()
        };
        let config =
            AppConfig::resolve(overrides, lookup_from(&[(ENV_API_URL, "http://env.test")]))
                .unwrap();
        assert_eq!(config.api_url().unwrap().as_str(), "http://flag.test/");
    }

    #[test]
    fn falls_back_to_public_api_url() {
        let config = AppConfig::resolve(
            ConfigOverrides::default(),
            lookup_from(&[(ENV_API_URL_FALLBACK, "https://api.example.com/v1")]),
        )
        .unwrap();
        assert_eq!(
            config.api_url().unwrap().as_str(),
            "https://api.example.com/v1"
        );
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn missing_url_is_a_configuration_error() {
        let config = AppConfig::resolve(ConfigOverrides::default(), lookup_from(&[])).unwrap();
        let err = config.api_url().unwrap_err();
        assert!(matches!(err, TaskError::Configuration { .. }));
    }

    #[test]
    fn rejects_non_http_scheme() {
        let config = AppConfig::with_api_url("ftp://files.example.com");
        assert!(matches!(
            config.api_url(),
            Err(TaskError::Configuration { .. })
        ));
    }

    #[test]
    fn invalid_timeout_is_reported() {
        let err = AppConfig::resolve(
            ConfigOverrides::default(),
            lookup_from(&[(ENV_TIMEOUT_SECS, "soon")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
    }

    #[test]
    fn reads_values_from_env_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".env");
        fs::write(
            &path,
            "TASKDECK_API_URL=http://localhost:4000\nTASKDECK_TOKEN=abc\n",
        )
        .unwrap();

        let values = read_env_file(&path).unwrap();
        let config = AppConfig::resolve(ConfigOverrides::default(), |key| {
            values.get(key).cloned()
        })
        .unwrap();
        assert_eq!(
            config.api_url().unwrap().as_str(),
            "http://localhost:4000/"
        );
        assert_eq!(config.token(), Some("abc"));
    }

    #[test]
    fn missing_explicit_env_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let overrides = ConfigOverrides {
            env_file: Some(dir.path().join("absent.env")),
            ..ConfigOverrides::default()
        };
        assert!(AppConfig::discover(overrides).is_err());
    }
}
