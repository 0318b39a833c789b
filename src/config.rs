use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::info;

use scriptvisor_runtime::loader::{DEFAULT_ENTRY_SYMBOL, DEFAULT_EXTENSIONS};
use scriptvisor_runtime::LoaderSettings;
use scriptvisor_scheduler::{SchedulerConfig, DEFAULT_STACK_SIZE, MAX_STACK_SIZE, MIN_STACK_SIZE};

#[derive(Debug, thiserror::Error)]
pub enum ConfigLoadError {
    #[error("Config file not found")]
    NotFound,
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "scriptvisor")
}

/// Directory for logs and the default script directory
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".scriptvisor"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScriptvisorConfig {
    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub scripting: ScriptingConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Bytes of stack given to each script fiber
    pub stack_size: usize,

    /// Period of the simulated host frame
    pub frame_interval_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            stack_size: DEFAULT_STACK_SIZE,
            frame_interval_ms: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScriptingConfig {
    /// Whether modules are loaded at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory containing script modules (default: <data dir>/scripts)
    #[serde(default)]
    pub script_dir: Option<PathBuf>,

    /// Exported entry function looked up in every module
    #[serde(default = "default_entry_symbol")]
    pub entry_symbol: String,

    /// File extensions treated as modules
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Per-module overrides keyed by file stem
    #[serde(default)]
    pub modules: HashMap<String, ModuleConfig>,

    /// Reload modules when files in the script directory change
    #[serde(default = "default_true")]
    pub hot_reload: bool,

    /// How often to look for changed modules
    #[serde(default = "default_hot_reload_interval")]
    pub hot_reload_interval_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_entry_symbol() -> String {
    DEFAULT_ENTRY_SYMBOL.to_string()
}

fn default_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
}

fn default_hot_reload_interval() -> u64 {
    1000
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            script_dir: None,
            entry_symbol: default_entry_symbol(),
            extensions: default_extensions(),
            modules: HashMap::new(),
            hot_reload: true,
            hot_reload_interval_ms: default_hot_reload_interval(),
        }
    }
}

impl ScriptingConfig {
    /// Configured script directory, or the default one
    pub fn script_dir(&self) -> PathBuf {
        self.script_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("scripts"))
    }

    pub fn is_module_enabled(&self, name: &str) -> bool {
        self.modules.get(name).map(|m| m.enabled).unwrap_or(true)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModuleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Also write logs to <data dir>/logs/<component>.log
    #[serde(default)]
    pub file: bool,
}

impl ScriptvisorConfig {
    pub fn config_path() -> PathBuf {
        project_dirs()
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("scriptvisor.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigLoadError> {
        if !path.exists() {
            return Err(ConfigLoadError::NotFound);
        }

        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values the runtime cannot work with
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        let stack_size = self.scheduler.stack_size;
        if !(MIN_STACK_SIZE..=MAX_STACK_SIZE).contains(&stack_size) {
            return Err(ConfigLoadError::Invalid(format!(
                "scheduler.stack_size must be between {} and {} bytes, got {}",
                MIN_STACK_SIZE, MAX_STACK_SIZE, stack_size
            )));
        }
        Ok(())
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(&self)?;
        fs::write(path, content)?;
        info!("Saved config to {}", path.display());
        Ok(())
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            stack_size: self.scheduler.stack_size,
        }
    }

    /// Loader settings, with `script_dir` taking precedence over the config file
    pub fn loader_settings(&self, script_dir: Option<PathBuf>) -> LoaderSettings {
        let mut settings =
            LoaderSettings::new(script_dir.unwrap_or_else(|| self.scripting.script_dir()));
        settings.entry_symbol = self.scripting.entry_symbol.clone();
        settings.extensions = self.scripting.extensions.clone();
        settings.disabled = self
            .scripting
            .modules
            .keys()
            .filter(|name| !self.scripting.is_module_enabled(name))
            .cloned()
            .collect();
        settings
    }
}

pub const EXAMPLE_CONFIG: &str = r#"# scriptvisor configuration

[scheduler]
# Bytes of stack for each script fiber
stack_size = 1048576
# Simulated host frame period
frame_interval_ms = 16

[scripting]
enabled = true
# script_dir = "/path/to/scripts"
entry_symbol = "ScriptMain"
extensions = ["asi", "so", "dll", "dylib"]
hot_reload = true
hot_reload_interval_ms = 1000

# Disable a module by its file name without extension
# [scripting.modules.my_script]
# enabled = false

[logging]
file = false
"#;

/// Write [`EXAMPLE_CONFIG`] to `path`, refusing to overwrite an existing file
pub fn create_example_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!(
            "Config file already exists at {}. Please edit it manually or delete it to create a new one.",
            path.display()
        );
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    fs::write(path, EXAMPLE_CONFIG)?;
    info!("Created example config at {}", path.display());
    Ok(())
}
