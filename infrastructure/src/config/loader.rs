//! Configuration file loader with multi-source merging

use super::error::ConfigError;
use super::file_config::FileConfig;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "agent-orchestra";
const PROJECT_FILES: [&str; 2] = ["orchestra.toml", ".orchestra.toml"];
const ENV_PREFIX: &str = "ORCHESTRA_";

/// Where a configuration layer comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Default,
    Global,
    Project,
    Explicit,
    Environment,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::Default => "Default",
            SourceKind::Global => "Global",
            SourceKind::Project => "Project",
            SourceKind::Explicit => "Explicit",
            SourceKind::Environment => "Env",
        };
        write!(f, "{}", name)
    }
}

/// One configuration layer and whether it is present
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    pub kind: SourceKind,
    /// File path, or a description for non-file layers
    pub location: String,
    pub found: bool,
}

/// Configuration loader that handles file discovery and merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from all sources with proper priority
    ///
    /// Priority (highest to lowest):
    /// 1. `ORCHESTRA_*` environment variables, e.g. `ORCHESTRA_AGENT__MAX_ITERATIONS=5`
    /// 2. Explicit config path (if provided)
    /// 3. Project root: `./orchestra.toml` or `./.orchestra.toml`
    /// 4. Global: `$XDG_CONFIG_HOME/agent-orchestra/config.toml`
    /// 5. Default values
    pub fn load(config_path: Option<&Path>) -> Result<FileConfig, ConfigError> {
        if let Some(path) = config_path
            && !path.is_file()
        {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let global = Self::global_config_path().filter(|p| p.is_file());
        let project = Self::project_config_path();

        let figment = Self::layered(global.as_deref(), project.as_deref(), config_path)
            .merge(Env::prefixed(ENV_PREFIX).split("__"));
        figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Defaults merged with a single file, ignoring every other source
    pub fn load_file(path: &Path) -> Result<FileConfig, ConfigError> {
        if !path.is_file() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::layered(None, None, Some(path))
            .extract()
            .map_err(|e| ConfigError::Load(Box::new(e)))
    }

    /// Load only default configuration (for --no-config)
    pub fn load_defaults() -> FileConfig {
        FileConfig::default()
    }

    fn layered(global: Option<&Path>, project: Option<&Path>, explicit: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(FileConfig::default()));
        for path in [global, project, explicit].into_iter().flatten() {
            debug!(path = %path.display(), "Merging config file");
            figment = figment.merge(Toml::file(path));
        }
        figment
    }

    /// Get the global config file path
    ///
    /// Returns XDG_CONFIG_HOME/agent-orchestra/config.toml if set,
    /// otherwise the platform config directory.
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Get the project-level config file path (if it exists)
    pub fn project_config_path() -> Option<PathBuf> {
        PROJECT_FILES
            .iter()
            .map(PathBuf::from)
            .find(|path| path.is_file())
    }

    /// Every layer in priority order, highest first
    pub fn sources(config_path: Option<&Path>) -> Vec<ConfigSource> {
        let mut sources = Vec::new();

        let env_vars: Vec<String> = std::env::vars()
            .map(|(k, _)| k)
            .filter(|k| k.starts_with(ENV_PREFIX))
            .collect();
        sources.push(ConfigSource {
            kind: SourceKind::Environment,
            location: if env_vars.is_empty() {
                format!("{}*", ENV_PREFIX)
            } else {
                env_vars.join(", ")
            },
            found: !env_vars.is_empty(),
        });

        if let Some(path) = config_path {
            sources.push(ConfigSource {
                kind: SourceKind::Explicit,
                location: path.display().to_string(),
                found: path.is_file(),
            });
        }

        sources.push(match Self::project_config_path() {
            Some(path) => ConfigSource {
                kind: SourceKind::Project,
                location: path.display().to_string(),
                found: true,
            },
            None => ConfigSource {
                kind: SourceKind::Project,
                location: format!("./{} or ./{}", PROJECT_FILES[0], PROJECT_FILES[1]),
                found: false,
            },
        });

        if let Some(path) = Self::global_config_path() {
            sources.push(ConfigSource {
                kind: SourceKind::Global,
                location: path.display().to_string(),
                found: path.is_file(),
            });
        }

        sources.push(ConfigSource {
            kind: SourceKind::Default,
            location: "built-in defaults".to_string(),
            found: true,
        });
        sources
    }
}
