//! Configuration loading and root folder resolution
//!
//! Every service reads an optional TOML file at
//! `<config dir>/songforge/<module>.toml`. A missing file is not an error:
//! the service logs it and runs on compiled defaults.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Primary environment variable for the artifact root folder
pub const ROOT_FOLDER_ENV: &str = "SONGFORGE_ROOT_FOLDER";

/// Alternative (shorter) environment variable for the artifact root folder
pub const ROOT_ENV: &str = "SONGFORGE_ROOT";

/// Compiled-in defaults used when no other source provides a value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub bind_address: String,
}

impl CompiledDefaults {
    /// Defaults for the platform this binary was compiled for
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_local_dir()
            .map(|d| d.join("songforge"))
            .unwrap_or_else(|| PathBuf::from("./songforge_data"));

        Self {
            root_folder,
            log_level: "info".to_string(),
            bind_address: "127.0.0.1:5780".to_string(),
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter directive (overridden by `RUST_LOG`)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on, e.g. `127.0.0.1:5780`
    pub bind_address: Option<String>,
}

/// `[workflow]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Seconds to wait between a successful generation and the first download
    pub generation_wait_secs: u64,
    /// Extension used when a downloaded file carries none
    pub default_extension: String,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            generation_wait_secs: 45,
            default_extension: "mp3".to_string(),
        }
    }
}

/// `[automation]` section: the browser-automation sidecar
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5790".to_string(),
            timeout_secs: 300,
        }
    }
}

/// `[review]` section: the AI review service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Upstream review quota, shared by every running workflow
    pub requests_per_minute: u32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5791".to_string(),
            timeout_secs: 120,
            requests_per_minute: 10,
        }
    }
}

/// Contents of a module TOML file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub server: ServerConfig,
    pub workflow: WorkflowConfig,
    pub automation: AutomationConfig,
    pub review: ReviewConfig,
}

/// Path of the TOML file for a module, if the platform has a config dir
pub fn config_file_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("songforge").join(format!("{}.toml", module_name)))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Load a TOML config, falling back to defaults when the file is absent
///
/// A file that exists but cannot be parsed is an error; silently ignoring
/// it would run the service against the wrong endpoints.
pub fn load_or_default(path: Option<&Path>) -> Result<TomlConfig> {
    match path {
        Some(path) if path.exists() => {
            let config = load_toml_config(path)?;
            info!("Loaded configuration from {}", path.display());
            Ok(config)
        }
        Some(path) => {
            warn!(
                "No configuration file at {}, using compiled defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            info!("No configuration directory available, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Root folder resolution, highest priority first:
/// 1. Command-line argument
/// 2. `SONGFORGE_ROOT_FOLDER`, then `SONGFORGE_ROOT`
/// 3. `root_folder` in the module TOML file
/// 4. Compiled default
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
    toml_loaded: bool,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
            toml_loaded: false,
        }
    }

    /// Use a command-line value (highest priority)
    pub fn with_cli_arg(mut self, cli_arg: Option<PathBuf>) -> Self {
        self.cli_arg = cli_arg;
        self
    }

    /// Use an already-loaded TOML config instead of reading the module file
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self.toml_loaded = true;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!("Root folder from command line: {}", path.display());
            return path.clone();
        }

        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    debug!("Root folder from {}: {}", var, path);
                    return PathBuf::from(path);
                }
            }
        }

        let toml_root = if self.toml_loaded {
            self.toml_root.clone()
        } else {
            config_file_path(&self.module_name)
                .filter(|p| p.exists())
                .and_then(|p| load_toml_config(&p).ok())
                .and_then(|c| c.root_folder)
        };
        if let Some(path) = toml_root {
            debug!("Root folder from TOML: {}", path.display());
            return path;
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder on first start
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder (and parents). Safe to call repeatedly.
    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            info!("Creating root folder: {}", self.root_folder.display());
        }
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    /// Directory holding the `pending/` and `final/` artifact stages
    pub fn songs_path(&self) -> PathBuf {
        self.root_folder.join("songs")
    }
}
