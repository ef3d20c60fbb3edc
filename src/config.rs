use crate::error::{Error, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "pickscribe.toml";
const ENV_PREFIX: &str = "PICKSCRIBE";

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub youtube: YoutubeConfig,
    pub model: ModelConfig,
    pub pipeline: PipelineConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct YoutubeConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub playlist_id: String,
    pub page_size: u32,
    pub languages: Vec<String>,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Gemini,
    OpenAi,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    pub provider: Provider,
    #[serde(default)]
    pub api_key: String,
    pub name: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Whether a record without an event name still reaches the database.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PersistPolicy {
    #[default]
    Always,
    RequireEventName,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PipelineConfig {
    pub pace_ms: u64,
    pub confirm_before_analysis: bool,
    pub confirm_results: bool,
    pub max_attempts: u32,
    pub persist_policy: PersistPolicy,
}

impl PipelineConfig {
    pub fn pace(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportLayout {
    /// One `fighters` column holding the comma-joined list.
    #[default]
    Joined,
    /// One `fighter_N` column per position.
    Positional,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database: PathBuf,
    pub export_path: PathBuf,
    pub export_layout: ExportLayout,
}

impl Settings {
    /// Layers built-in defaults, the optional TOML file at `path` and
    /// `PICKSCRIBE_*` environment variables, in that order.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .set_default("youtube.page_size", 50)?
            .set_default("youtube.languages", vec!["en"])?
            .set_default("youtube.base_url", "https://www.googleapis.com/youtube/v3")?
            .set_default("model.provider", "gemini")?
            .set_default("model.name", "gemini-2.0-flash")?
            .set_default("model.temperature", 0.2)?
            .set_default("model.top_p", 0.8)?
            .set_default("model.top_k", 40)?
            .set_default("pipeline.pace_ms", 2000)?
            .set_default("pipeline.confirm_before_analysis", true)?
            .set_default("pipeline.confirm_results", false)?
            .set_default("pipeline.max_attempts", 3)?
            .set_default("pipeline.persist_policy", "always")?
            .set_default("storage.database", "ufc_analysis.db")?
            .set_default("storage.export_path", "podcast_analysis.csv")?
            .set_default("storage.export_layout", "joined")?
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("youtube.languages")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Checks the credentials a command needs. The YouTube key and playlist
    /// id are only demanded when `needs_listing` is set.
    pub fn validate(&self, needs_listing: bool) -> Result<()> {
        let mut missing = Vec::new();

        if needs_listing && self.youtube.api_key.trim().is_empty() {
            missing.push(env_name("youtube", "api_key"));
        }
        if needs_listing && self.youtube.playlist_id.trim().is_empty() {
            missing.push(env_name("youtube", "playlist_id"));
        }
        if self.model.api_key.trim().is_empty() {
            missing.push(env_name("model", "api_key"));
        }
        if self.youtube.page_size == 0 || self.youtube.page_size > 50 {
            return Err(Error::config("youtube.page_size must be between 1 and 50"));
        }
        if self.pipeline.max_attempts == 0 {
            return Err(Error::config("pipeline.max_attempts must be at least 1"));
        }

        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::config(format!(
                "missing required values: {}",
                missing.join(", ")
            )))
        }
    }
}

fn env_name(section: &str, key: &str) -> String {
    format!(
        "{ENV_PREFIX}_{}__{}",
        section.to_ascii_uppercase(),
        key.to_ascii_uppercase()
    )
}
