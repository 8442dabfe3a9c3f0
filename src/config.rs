use crate::error::{Result, ScribeError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Thresholds driving the split decision and upload validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Hard cap on accepted uploads.
    pub max_upload_bytes: u64,
    /// Above this byte size the file is split before transcription.
    /// Chosen safely below the Whisper API's 25 MB request ceiling.
    pub max_direct_bytes: u64,
    /// Above this duration the file is split before transcription.
    pub max_direct_secs: f64,
    /// Duration of each split segment.
    pub chunk_secs: f64,
    /// Segments smaller than this are treated as corrupt and discarded.
    pub min_segment_bytes: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_upload_bytes: 100 * 1024 * 1024,
            max_direct_bytes: 20 * 1024 * 1024,
            max_direct_secs: 600.0,
            chunk_secs: 600.0,
            min_segment_bytes: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_api_key: Option<String>,
    pub listen_addr: String,
    pub temp_dir: PathBuf,
    /// ISO 639-1 language hint passed to the speech API.
    pub language: String,
    pub limits: Limits,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            listen_addr: "0.0.0.0:8080".to_string(),
            temp_dir: std::env::temp_dir().join("audioscribe"),
            language: "en".to_string(),
            limits: Limits::default(),
        }
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML config file if present,
    /// then environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::default();

        if let Some(config_path) = Self::config_file_path() {
            if config_path.exists() {
                let contents = std::fs::read_to_string(&config_path)?;
                match toml::from_str::<Config>(&contents) {
                    Ok(file_config) => config = file_config,
                    Err(e) => {
                        return Err(ScribeError::Config(format!(
                            "failed to parse {}: {e}",
                            config_path.display()
                        )))
                    }
                }
            }
        }

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai_api_key = Some(key);
        }
        if let Ok(addr) = std::env::var("AUDIOSCRIBE_LISTEN") {
            config.listen_addr = addr;
        }
        if let Ok(dir) = std::env::var("AUDIOSCRIBE_TEMP_DIR") {
            config.temp_dir = PathBuf::from(dir);
        }
        if let Ok(lang) = std::env::var("AUDIOSCRIBE_LANGUAGE") {
            config.language = lang;
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.openai_api_key.is_none() {
            return Err(ScribeError::Config(
                "OPENAI_API_KEY not set. Export it with: export OPENAI_API_KEY=sk-...".to_string(),
            ));
        }
        if self.limits.chunk_secs <= 0.0 {
            return Err(ScribeError::Config(
                "chunk_secs must be greater than 0".to_string(),
            ));
        }
        if self.limits.max_direct_bytes == 0 || self.limits.max_upload_bytes == 0 {
            return Err(ScribeError::Config(
                "size limits must be greater than 0".to_string(),
            ));
        }
        if self.limits.max_direct_bytes > self.limits.max_upload_bytes {
            return Err(ScribeError::Config(
                "max_direct_bytes cannot exceed max_upload_bytes".to_string(),
            ));
        }
        Ok(())
    }

    fn config_file_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("audioscribe").join("config.toml"))
    }
}
