use anyhow::{anyhow, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::document::ExtractOptions;
use crate::translation::translator::DEFAULT_SYSTEM_PROMPT;

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Source language code (ISO)
    pub source_language: String,

    /// Default target language code (ISO)
    pub target_language: String,

    /// Translation config
    pub translation: TranslationConfig,

    /// Which parts of a presentation are extracted
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Where job records and outputs go
    #[serde(default)]
    pub storage: StorageConfig,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Model backend
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// Local Ollama server keeping the model on the GPU
    #[default]
    Ollama,
    /// Deterministic in-process model, for dry runs
    Mock,
}

impl ModelProvider {
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::Mock => "Mock",
        }
    }
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ollama => write!(f, "ollama"),
            Self::Mock => write!(f, "mock"),
        }
    }
}

impl std::str::FromStr for ModelProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "mock" => Ok(Self::Mock),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Translation settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TranslationConfig {
    #[serde(default)]
    pub provider: ModelProvider,

    /// Model name as known to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Inference server URL
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Timeout of one batch call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Character budget of one batch
    #[serde(default = "default_max_chars_per_batch")]
    pub max_chars_per_batch: usize,

    /// Unit budget of one batch
    #[serde(default = "default_max_units_per_batch")]
    pub max_units_per_batch: usize,

    /// Pending batches the scheduler accepts before submitters wait
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Uses the `{source_language}` and `{target_language}` placeholders
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,

    /// JSONL file of `{"source": .., "target": ..}` terms
    #[serde(default)]
    pub glossary_path: Option<PathBuf>,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout_secs(),
            max_chars_per_batch: default_max_chars_per_batch(),
            max_units_per_batch: default_max_units_per_batch(),
            queue_capacity: default_queue_capacity(),
            temperature: default_temperature(),
            system_prompt: default_system_prompt(),
            glossary_path: None,
        }
    }
}

/// Extraction settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Extract speaker notes
    #[serde(default = "default_true")]
    pub include_notes: bool,

    /// Extract chart text
    #[serde(default = "default_true")]
    pub include_charts: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            include_notes: true,
            include_charts: true,
        }
    }
}

impl ExtractionConfig {
    pub fn options(&self) -> ExtractOptions {
        ExtractOptions {
            include_notes: self.include_notes,
            include_charts: self.include_charts,
        }
    }
}

/// Storage settings
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct StorageConfig {
    /// Job database; the user data directory when unset
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    /// Output directory; next to each input when unset
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_model() -> String {
    "qwen2.5:7b".to_string()
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_chars_per_batch() -> usize {
    2000
}

fn default_max_units_per_batch() -> usize {
    16
}

fn default_queue_capacity() -> usize {
    64
}

fn default_temperature() -> f32 {
    0.2
}

fn default_true() -> bool {
    true
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Config {
    /// Read the configuration, writing the defaults first when the file is missing
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let file = File::open(path).with_context(|| format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            serde_json::from_reader(reader).with_context(|| format!("Failed to parse config file: {:?}", path))
        } else {
            warn!("Config file not found at {:?}, creating default config.", path);
            let config = Config::default();
            config.save(path)?;
            Ok(config)
        }
    }

    /// Write the configuration as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let config_json = serde_json::to_string_pretty(self).context("Failed to serialize config to JSON")?;
        std::fs::write(path, config_json).with_context(|| format!("Failed to write config file: {:?}", path))
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        crate::language_utils::validate_language_code(&self.source_language)
            .context("Invalid source language")?;
        crate::language_utils::validate_language_code(&self.target_language)
            .context("Invalid target language")?;
        if crate::language_utils::language_codes_match(&self.source_language, &self.target_language) {
            return Err(anyhow!(
                "Source and target language are the same ({} / {})",
                self.source_language,
                self.target_language
            ));
        }

        let translation = &self.translation;
        if translation.max_chars_per_batch == 0 {
            return Err(anyhow!("max_chars_per_batch must be greater than zero"));
        }
        if translation.max_units_per_batch == 0 {
            return Err(anyhow!("max_units_per_batch must be greater than zero"));
        }
        if translation.timeout_secs == 0 {
            return Err(anyhow!("timeout_secs must be greater than zero"));
        }
        if translation.queue_capacity == 0 {
            return Err(anyhow!("queue_capacity must be greater than zero"));
        }
        if translation.provider == ModelProvider::Ollama && translation.model.trim().is_empty() {
            return Err(anyhow!("A model name is required for the Ollama provider"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: "en".to_string(),
            target_language: "fr".to_string(),
            translation: TranslationConfig::default(),
            extraction: ExtractionConfig::default(),
            storage: StorageConfig::default(),
            log_level: LogLevel::default(),
        }
    }
}
