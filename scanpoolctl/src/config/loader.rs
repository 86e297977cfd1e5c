use once_cell::sync::Lazy;
use std::{
    fmt::Display,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;

use scanpool_core::{FaultPolicy, PoolError, ScanPoolConfig};

use super::{
    sources::{
        ENV_DECODE_TIMEOUT, ENV_FAULT_POLICY, ENV_LATENCY_WINDOW,
        ENV_POOL_SIZE, ENV_THROTTLE_FACTOR, EnvConfig, FileConfig,
    },
    validation::{self, ConfigWarnings},
};

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("scanpool.toml"),
        PathBuf::from("config/scanpool.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    /// Loads `.env`, then layers the config file and `SCANPOOL_*`
    /// variables over the defaults.
    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path).map(|_| true).or_else(
                |err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                },
            )?,
            None => {
                dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?
            }
        };

        let mut load = self.load_with_env(EnvConfig::gather())?;
        load.metadata.env_file_loaded = env_file_loaded;
        Ok(load)
    }

    /// Same as [`ConfigLoader::load`] but with an explicit environment and
    /// without touching `.env`.
    pub fn load_with_env(
        &self,
        env_config: EnvConfig,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let mut warnings = ConfigWarnings::default();
        if config_path.is_none() {
            warnings.push_with_hint(
                "no scanpool.toml found; using built-in defaults",
                "pass --config or set SCANPOOL_CONFIG to point at a file",
            );
        }

        let config = compose_config(file_config, &env_config)?;
        config.validate()?;
        warnings.extend(validation::apply_guard_rails(&config));

        Ok(ConfigLoad {
            config,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded: false,
            },
            warnings,
        })
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let mut source = ConfigPathSource::default();

        if let Some(explicit) = &self.options.config_path {
            source.explicit = Some(explicit.clone());
        } else if let Some(from_env) = &env_config.config_path {
            source.env = Some(from_env.clone());
        }

        if source.is_empty() {
            source.default = DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
                .cloned();
        }

        let Some((path, provenance)) = source.resolved_path() else {
            return Ok((None, None));
        };

        if !path.exists() {
            if provenance.is_explicit() {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            return Ok((None, None));
        }

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|err| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
    toml::from_str(&contents).map_err(|err| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source: err,
    })
}

fn compose_config(
    file_config: Option<FileConfig>,
    env_config: &EnvConfig,
) -> Result<ScanPoolConfig, ConfigLoadError> {
    let mut config = ScanPoolConfig::default();

    if let Some(file) = file_config {
        let pool = file.pool;
        if let Some(pool_size) = pool.pool_size {
            config.pool_size = Some(pool_size);
        }
        if let Some(latency_window) = pool.latency_window {
            config.latency_window = latency_window;
        }
        if let Some(throttle_factor) = pool.throttle_factor {
            config.throttle_factor = throttle_factor;
        }
        if let Some(raw) = pool.decode_timeout.as_deref() {
            config.decode_timeout_ms = parse_timeout(raw).map_err(|reason| {
                ConfigLoadError::InvalidValue {
                    field: "pool.decode_timeout",
                    value: raw.to_string(),
                    reason,
                }
            })?;
        }
        if let Some(policy) = pool.fault_policy {
            config.fault_policy = policy;
        }
    }

    if let Some(raw) = env_config.pool_size.as_deref() {
        config.pool_size = Some(parse_env(ENV_POOL_SIZE, raw)?);
    }
    if let Some(raw) = env_config.latency_window.as_deref() {
        config.latency_window = parse_env(ENV_LATENCY_WINDOW, raw)?;
    }
    if let Some(raw) = env_config.throttle_factor.as_deref() {
        config.throttle_factor = parse_env(ENV_THROTTLE_FACTOR, raw)?;
    }
    if let Some(raw) = env_config.decode_timeout.as_deref() {
        config.decode_timeout_ms =
            parse_timeout(raw).map_err(|reason| ConfigLoadError::InvalidEnv {
                var: ENV_DECODE_TIMEOUT,
                value: raw.to_string(),
                reason,
            })?;
    }
    if let Some(raw) = env_config.fault_policy.as_deref() {
        config.fault_policy =
            parse_fault_policy(raw).map_err(|reason| ConfigLoadError::InvalidEnv {
                var: ENV_FAULT_POLICY,
                value: raw.to_string(),
                reason,
            })?;
    }

    Ok(config)
}

fn parse_env<T>(var: &'static str, raw: &str) -> Result<T, ConfigLoadError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.parse().map_err(|err: T::Err| ConfigLoadError::InvalidEnv {
        var,
        value: raw.to_string(),
        reason: err.to_string(),
    })
}

/// `off`/`none` clear the deadline; anything else is a humantime duration.
fn parse_timeout(raw: &str) -> Result<Option<u64>, String> {
    if raw.eq_ignore_ascii_case("off") || raw.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    let timeout = humantime::parse_duration(raw).map_err(|err| err.to_string())?;
    Ok(Some(duration_to_ms(timeout)))
}

pub fn duration_to_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

pub fn parse_fault_policy(raw: &str) -> Result<FaultPolicy, String> {
    match raw.to_ascii_lowercase().as_str() {
        "retire" => Ok(FaultPolicy::Retire),
        "respawn" => Ok(FaultPolicy::Respawn),
        other => Err(format!("expected 'retire' or 'respawn', got '{other}'")),
    }
}

/// Effective configuration rendered in the same layout the loader reads.
pub fn render_toml(config: &ScanPoolConfig) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(&FileConfig::from(config))
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid {field} '{value}': {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("invalid {var} '{value}': {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },
    #[error(transparent)]
    Invalid(#[from] PoolError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Default)]
struct ConfigPathSource {
    explicit: Option<PathBuf>,
    env: Option<PathBuf>,
    default: Option<PathBuf>,
}

impl ConfigPathSource {
    fn is_empty(&self) -> bool {
        self.explicit.is_none() && self.env.is_none() && self.default.is_none()
    }

    fn resolved_path(&self) -> Option<(PathBuf, ConfigPathProvenance)> {
        if let Some(path) = &self.explicit {
            return Some((path.clone(), ConfigPathProvenance::Explicit));
        }
        if let Some(path) = &self.env {
            return Some((path.clone(), ConfigPathProvenance::Env));
        }
        if let Some(path) = &self.default {
            return Some((path.clone(), ConfigPathProvenance::Default));
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigPathProvenance {
    Explicit,
    Env,
    Default,
}

impl ConfigPathProvenance {
    fn is_explicit(self) -> bool {
        matches!(
            self,
            ConfigPathProvenance::Explicit | ConfigPathProvenance::Env
        )
    }
}

#[derive(Debug, Default, Clone)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: ScanPoolConfig,
    pub metadata: ConfigMetadata,
    pub warnings: ConfigWarnings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeouts_accept_humantime_and_off() {
        assert_eq!(parse_timeout("250ms"), Ok(Some(250)));
        assert_eq!(parse_timeout("2s"), Ok(Some(2_000)));
        assert_eq!(parse_timeout("off"), Ok(None));
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn fault_policy_is_case_insensitive() {
        assert_eq!(parse_fault_policy("Respawn"), Ok(FaultPolicy::Respawn));
        assert_eq!(parse_fault_policy("retire"), Ok(FaultPolicy::Retire));
        assert!(parse_fault_policy("restart").is_err());
    }

    #[test]
    fn environment_overrides_file_values() {
        let file = FileConfig {
            pool: crate::config::FilePoolConfig {
                pool_size: Some(2),
                throttle_factor: Some(1.5),
                ..Default::default()
            },
        };
        let env = EnvConfig {
            pool_size: Some("6".into()),
            ..EnvConfig::default()
        };

        let config = compose_config(Some(file), &env).expect("compose");
        assert_eq!(config.pool_size, Some(6));
        assert_eq!(config.throttle_factor, 1.5);
        assert_eq!(config.latency_window, 10);
    }

    #[test]
    fn rendered_toml_reads_back() {
        let config = ScanPoolConfig::default()
            .with_pool_size(3)
            .with_decode_timeout(Duration::from_millis(400));
        let rendered = render_toml(&config).expect("render");
        let parsed: FileConfig = toml::from_str(&rendered).expect("parse");
        let back = compose_config(Some(parsed), &EnvConfig::default()).expect("compose");
        assert_eq!(back, config);
    }
}
