//! Configuration for slice-preview.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (SLICE_PREVIEW_ENV, SLICE_PREVIEW_TRANSFORMER)
//! 2. Project config file (.slice-preview/config.yaml)
//! 3. User config file (<config dir>/slice-preview/config.yaml)
//! 4. Defaults (direct `python` / `manim` invocation)
//!
//! Config file discovery:
//! - Searches current directory and parents for .slice-preview/config.yaml
//! - Falls back to the user config directory
//! - Paths in a config file are relative to the directory containing
//!   `.slice-preview/` (the project root)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::DEFAULT_LAUNCHER;
use crate::core::{PipelineSettings, DEFAULT_WORKDIR_PREFIX};

/// Env var naming the execution environment
pub const ENV_ENVIRONMENT: &str = "SLICE_PREVIEW_ENV";

/// Env var overriding the transformer script path
pub const ENV_TRANSFORMER: &str = "SLICE_PREVIEW_TRANSFORMER";

const CONFIG_DIR_NAME: &str = ".slice-preview";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub workdir: WorkdirConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfig {
    /// Named environment to run both tools in (e.g. a conda env)
    pub name: Option<String>,
    /// Launcher for named environments (default: conda)
    pub launcher: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsConfig {
    /// Interpreter for the transformer script
    pub interpreter: Option<String>,
    /// Transformer script path (relative to the project root)
    pub transformer: Option<String>,
    /// Render engine executable
    pub renderer: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkdirConfig {
    pub prefix: Option<String>,
    /// Parent for run directories (relative to the project root)
    pub root: Option<String>,
    #[serde(default)]
    pub keep_failed: bool,
}

/// Values read from the process environment
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub environment: Option<String>,
    pub transformer: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            environment: std::env::var(ENV_ENVIRONMENT).ok(),
            transformer: std::env::var(ENV_TRANSFORMER).ok(),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Named execution environment (None = direct invocation)
    pub environment: Option<String>,
    /// Pipeline tool settings
    pub settings: PipelineSettings,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Merge a config file (if any) with environment overrides
    pub fn resolve(config_file: Option<(&Path, ConfigFile)>, env: &EnvOverrides) -> Self {
        let (path, file) = match config_file {
            Some((path, file)) => (Some(path.to_path_buf()), file),
            None => (None, ConfigFile::default()),
        };

        // Project root is the parent of .slice-preview/
        let base_dir = path
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let environment = env
            .environment
            .clone()
            .or(file.environment.name)
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let defaults = PipelineSettings::default();

        let transformer = match (&env.transformer, &file.tools.transformer) {
            (Some(env_path), _) => PathBuf::from(env_path),
            (None, Some(file_path)) => resolve_path(&base_dir, file_path),
            (None, None) => defaults.transformer.clone(),
        };

        let settings = PipelineSettings {
            launcher: file
                .environment
                .launcher
                .unwrap_or_else(|| DEFAULT_LAUNCHER.to_string()),
            interpreter: file.tools.interpreter.unwrap_or(defaults.interpreter),
            transformer,
            renderer: file.tools.renderer.unwrap_or(defaults.renderer),
            workdir_prefix: file
                .workdir
                .prefix
                .unwrap_or_else(|| DEFAULT_WORKDIR_PREFIX.to_string()),
            temp_root: file
                .workdir
                .root
                .as_deref()
                .map(|root| resolve_path(&base_dir, root)),
            keep_failed_workdir: file.workdir.keep_failed,
        };

        Self {
            environment,
            settings,
            config_file: path,
        }
    }
}

/// Find config file by searching current directory and parents, then the
/// user config directory
fn find_config_file() -> Option<PathBuf> {
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let config_path = current.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME);
            if config_path.exists() {
                return Some(config_path);
            }

            if !current.pop() {
                break;
            }
        }
    }

    dirs::config_dir()
        .map(|dir| dir.join("slice-preview").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

/// Load and parse config file
pub fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let env = EnvOverrides::from_env();

    match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            Ok(ResolvedConfig::resolve(Some((path.as_path(), file)), &env))
        }
        None => Ok(ResolvedConfig::resolve(None, &env)),
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| format!("{:#}", e)));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
