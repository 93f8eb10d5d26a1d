use convergr::generator::CommandGeneratorConfig;
use convergr::runner::{DEFAULT_HARD_ITERATION_CAP, DEFAULT_STAGNATION_THRESHOLD, LoopConfig};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub convergence: ConvergenceConfig,
    pub generator: GeneratorConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceConfig {
    pub stagnation_threshold: u32,
    pub hard_iteration_cap: u32,
    pub generator_timeout_ms: u64,
    pub root_prefixes: Vec<String>,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            stagnation_threshold: DEFAULT_STAGNATION_THRESHOLD,
            hard_iteration_cap: DEFAULT_HARD_ITERATION_CAP,
            generator_timeout_ms: 300000,
            root_prefixes: vec!["generated".to_string(), "output".to_string()],
        }
    }
}

impl ConvergenceConfig {
    pub fn to_loop_config(&self) -> LoopConfig {
        LoopConfig::default()
            .stagnation_threshold(self.stagnation_threshold)
            .hard_iteration_cap(self.hard_iteration_cap)
            .generator_timeout(Duration::from_millis(self.generator_timeout_ms))
            .root_prefixes(self.root_prefixes.iter().cloned())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    pub command: Option<String>,
    pub env: BTreeMap<String, String>,
    pub working_dir: Option<PathBuf>,
    pub capture_stderr: bool,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            command: None,
            env: BTreeMap::new(),
            working_dir: None,
            capture_stderr: true,
        }
    }
}

impl GeneratorConfig {
    /// Build a command generator config, preferring an explicit command over the configured one
    pub fn to_command_config(&self, command_override: Option<&str>) -> Option<CommandGeneratorConfig> {
        let command = command_override.map(str::to_string).or_else(|| self.command.clone())?;
        let mut config = CommandGeneratorConfig::new(command).capture_stderr(self.capture_stderr);
        for (key, value) in &self.env {
            config = config.env(key, value);
        }
        if let Some(dir) = &self.working_dir {
            config = config.working_dir(dir);
        }
        Some(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_dir: PathBuf,
    pub checkpoint: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("convergr"),
            checkpoint: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            convergence: ConvergenceConfig::default(),
            generator: GeneratorConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}
