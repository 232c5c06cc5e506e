use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::language::Language;

pub const STREAMING_MODEL_ENV: &str = "VOSK_MODEL";
pub const STREAMING_MODEL_DIR_ENV: &str = "VOSK_MODEL_DIR";
pub const DEFAULT_FRAME_SAMPLES: usize = 4000;
pub const DEFAULT_TRANSCODE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FFMPEG: &str = "ffmpeg";
pub const DEFAULT_BATCH_ENDPOINT: &str = "https://huggingface.co";
pub const DEFAULT_BATCH_REVISION: &str = "main";

/// Process configuration, read once per invocation.
#[derive(Debug, Clone, Serialize)]
pub struct Settings {
    /// Offline model location, already resolved for the requested language.
    pub streaming_model: Option<PathBuf>,
    pub frame_samples: usize,
    pub transcode_timeout: Duration,
    pub ffmpeg_path: PathBuf,
    pub batch: BatchSettings,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSettings {
    pub model_dir: Option<PathBuf>,
    pub repo: Option<String>,
    pub revision: String,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
    pub cache_root: Option<PathBuf>,
}

impl BatchSettings {
    pub fn is_configured(&self) -> bool {
        self.model_dir.is_some() || self.repo.is_some()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            streaming_model: None,
            frame_samples: DEFAULT_FRAME_SAMPLES,
            transcode_timeout: DEFAULT_TRANSCODE_TIMEOUT,
            ffmpeg_path: PathBuf::from(DEFAULT_FFMPEG),
            batch: BatchSettings::default(),
        }
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            model_dir: None,
            repo: None,
            revision: DEFAULT_BATCH_REVISION.to_string(),
            endpoint: DEFAULT_BATCH_ENDPOINT.to_string(),
            token: None,
            cache_root: None,
        }
    }
}

impl Settings {
    pub fn from_env(language: &Language) -> Self {
        Self::from_lookup(language, |key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup<F>(language: &Language, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut settings = Self::default();

        let per_language = format!("{STREAMING_MODEL_ENV}_{}", language.env_suffix());
        settings.streaming_model = get(&per_language)
            .or_else(|| get(STREAMING_MODEL_ENV))
            .or_else(|| get(STREAMING_MODEL_DIR_ENV))
            .map(PathBuf::from);

        if let Some(v) = get("STT_FRAME_SAMPLES") {
            match v.trim().parse::<usize>() {
                Ok(n) if n > 0 => settings.frame_samples = n,
                _ => log::warn!("Ignoring invalid STT_FRAME_SAMPLES value '{}'", v),
            }
        }
        if let Some(v) = get("STT_TRANSCODE_TIMEOUT_SECS") {
            match v.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => settings.transcode_timeout = Duration::from_secs(secs),
                _ => log::warn!("Ignoring invalid STT_TRANSCODE_TIMEOUT_SECS value '{}'", v),
            }
        }
        if let Some(v) = get("FFMPEG_PATH") {
            settings.ffmpeg_path = PathBuf::from(v);
        }

        let batch = &mut settings.batch;
        batch.model_dir = get("STT_BATCH_MODEL_DIR").map(PathBuf::from);
        batch.repo = get("STT_BATCH_REPO").map(|v| v.trim().to_string());
        if let Some(v) = get("STT_BATCH_REVISION") {
            batch.revision = v.trim().to_string();
        }
        if let Some(v) = get("STT_BATCH_ENDPOINT") {
            batch.endpoint = v.trim().trim_end_matches('/').to_string();
        }
        batch.token = get("HF_TOKEN");
        batch.cache_root = get("STT_MODEL_CACHE").map(PathBuf::from);

        settings
    }
}
