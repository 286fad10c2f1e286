use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

pub const DEFAULT_CONFIG_FILE: &str = "buybye.yaml";

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// ServerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_port() -> u16 {
    8000
}

fn default_base_url() -> String {
    "/api".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            base_url: default_base_url(),
        }
    }
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// What a `where` query failure does when the step does not bind `error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryErrorPolicy {
    /// Treat the failure as zero rows.
    #[default]
    Absorb,
    /// Abort the run with [`EngineError::QueryFailed`].
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_max_rounds")]
    pub max_rounds: usize,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub query_errors: QueryErrorPolicy,
}

fn default_max_rounds() -> usize {
    64
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_rounds: default_max_rounds(),
            request_timeout_ms: default_request_timeout_ms(),
            query_errors: QueryErrorPolicy::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// PassthroughConfig
// ---------------------------------------------------------------------------

/// Additions to the built-in route lists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PassthroughConfig {
    /// Serve routes on neither list directly instead of through rules.
    #[serde(default)]
    pub allow_unverified: bool,
    /// `route -> justification`.
    #[serde(default)]
    pub inclusions: std::collections::BTreeMap<String, String>,
    #[serde(default)]
    pub exclusions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub passthrough: PassthroughConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(EngineError::ConfigNotFound(path.to_path_buf()));
        }
        let data = std::fs::read_to_string(path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(EngineError::ConfigNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.engine.max_rounds == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "engine.max_rounds must be at least 1".to_string(),
            });
        }
        if self.engine.request_timeout_ms == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "engine.request_timeout_ms must be greater than 0".to_string(),
            });
        }

        let base = self.server.base_url.as_str();
        if !base.starts_with('/') || (base.len() > 1 && base.ends_with('/')) {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "server.base_url '{base}' should start with '/' and have no trailing '/'"
                ),
            });
        }

        for route in &self.passthrough.exclusions {
            if self.passthrough.inclusions.contains_key(route) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("route '{route}' is both included and excluded; exclusion wins"),
                });
            }
        }

        let prefix = format!("{}/", base.trim_end_matches('/'));
        let listed = self
            .passthrough
            .inclusions
            .keys()
            .chain(self.passthrough.exclusions.iter());
        for route in listed {
            if !route.starts_with(&prefix) {
                warnings.push(ConfigWarning {
                    level: WarnLevel::Warning,
                    message: format!("route '{route}' is outside base url '{base}'"),
                });
            }
        }

        warnings
    }

    pub fn has_errors(warnings: &[ConfigWarning]) -> bool {
        warnings.iter().any(|w| w.level == WarnLevel::Error)
    }
}
