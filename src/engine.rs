//! Engine selection and the fallback policy around it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde::Serialize;

use crate::asr::{
    resolve_batch_model_dir, AcousticModel, AsrError, AudioNormalizer, BatchEngine,
    FfmpegTranscoder, NormalizeError, OnnxCtcModel, Transcoder,
};
use crate::error::AppError;
use crate::language::Language;
use crate::settings::Settings;
use crate::streaming::{default_backend, transcribe_stream, StreamingBackend, StreamingModel};

/// The single JSON line written for every non-fatal outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecognitionResult {
    pub text: String,
    pub partial: String,
}

impl RecognitionResult {
    /// `{"text": "", "partial": ""}`: no local engine could serve the request.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            partial: String::new(),
        }
    }

    pub fn with_partial(partial: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            partial: partial.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum EngineChoice {
    /// Offline streaming engine; silent empty result when it is not set up.
    #[default]
    Streaming,
    /// Neural batch engine; model load failures abort the process.
    Batch,
    /// Streaming when available, otherwise batch when configured.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Streaming,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnavailableReason {
    ModelNotConfigured,
    ModelDirMissing(PathBuf),
    LibraryUnavailable(&'static str),
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModelNotConfigured => f.write_str("no offline model configured"),
            Self::ModelDirMissing(dir) => {
                write!(f, "offline model directory {} does not exist", dir.display())
            }
            Self::LibraryUnavailable(name) => write!(f, "{name} decoding library unavailable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamingHandle {
    pub model_dir: PathBuf,
    pub backend: &'static str,
}

/// Derived on every request; never cached across invocations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineAvailability {
    Available(StreamingHandle),
    Unavailable(UnavailableReason),
}

#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub input: PathBuf,
    pub language: Language,
    pub engine: EngineChoice,
}

#[derive(Debug)]
pub enum Outcome {
    Transcribed {
        result: RecognitionResult,
        engine: EngineKind,
    },
    NoEngine(UnavailableReason),
    UnusableAudio(NormalizeError),
    Failed {
        error: AppError,
        partial: String,
    },
    Fatal(AsrError),
}

impl Outcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Transcribed { .. } | Self::NoEngine(_) | Self::UnusableAudio(_) => 0,
            Self::Failed { .. } | Self::Fatal(_) => 1,
        }
    }

    /// Payload for stdout; `None` when the process must fail.
    pub fn response(&self) -> Option<RecognitionResult> {
        match self {
            Self::Transcribed { result, .. } => Some(result.clone()),
            Self::NoEngine(_) | Self::UnusableAudio(_) => Some(RecognitionResult::empty()),
            Self::Failed { .. } | Self::Fatal(_) => None,
        }
    }

    fn failed(error: impl Into<AppError>) -> Self {
        let error = error.into();
        let partial = match &error {
            AppError::Asr(inner) => inner.to_string(),
            other => other.to_string(),
        };
        Self::Failed { error, partial }
    }
}

pub struct SpeechEngine {
    settings: Settings,
    backend: Box<dyn StreamingBackend>,
    transcoder: Box<dyn Transcoder>,
    streaming_model: Mutex<Option<Arc<dyn StreamingModel>>>,
    batch: BatchEngine,
}

impl SpeechEngine {
    pub fn new(settings: Settings) -> Self {
        let transcoder =
            FfmpegTranscoder::new(settings.ffmpeg_path.clone(), settings.transcode_timeout);
        let batch_settings = settings.batch.clone();
        let batch = BatchEngine::new(move || {
            let dir = resolve_batch_model_dir(&batch_settings)?;
            log::info!("Resolved batch model to {}", dir.display());
            Ok(Box::new(OnnxCtcModel::new(&dir)?) as Box<dyn AcousticModel>)
        });
        Self::with_parts(settings, default_backend(), Box::new(transcoder), batch)
    }

    pub fn with_parts(
        settings: Settings,
        backend: Box<dyn StreamingBackend>,
        transcoder: Box<dyn Transcoder>,
        batch: BatchEngine,
    ) -> Self {
        Self {
            settings,
            backend,
            transcoder,
            streaming_model: Mutex::new(None),
            batch,
        }
    }

    pub fn check_availability(&self) -> EngineAvailability {
        let Some(model_dir) = &self.settings.streaming_model else {
            return EngineAvailability::Unavailable(UnavailableReason::ModelNotConfigured);
        };
        if !model_dir.is_dir() {
            return EngineAvailability::Unavailable(UnavailableReason::ModelDirMissing(
                model_dir.clone(),
            ));
        }
        if !self.backend.is_available() {
            return EngineAvailability::Unavailable(UnavailableReason::LibraryUnavailable(
                self.backend.name(),
            ));
        }
        EngineAvailability::Available(StreamingHandle {
            model_dir: model_dir.clone(),
            backend: self.backend.name(),
        })
    }

    pub fn transcribe(&self, request: &TranscriptionRequest) -> Outcome {
        let start = Instant::now();
        log::info!(
            "Transcribing {} (language {}, engine {:?})",
            request.input.display(),
            request.language,
            request.engine
        );

        let outcome = match request.engine {
            EngineChoice::Batch => self.run_batch(&request.input),
            EngineChoice::Streaming => match self.check_availability() {
                EngineAvailability::Available(handle) => self.run_streaming(&request.input, &handle),
                EngineAvailability::Unavailable(reason) => Outcome::NoEngine(reason),
            },
            EngineChoice::Auto => match self.check_availability() {
                EngineAvailability::Available(handle) => self.run_streaming(&request.input, &handle),
                EngineAvailability::Unavailable(reason) if self.settings.batch.is_configured() => {
                    log::info!("Streaming engine unavailable ({reason}); using batch engine");
                    self.run_batch(&request.input)
                }
                EngineAvailability::Unavailable(reason) => Outcome::NoEngine(reason),
            },
        };

        match &outcome {
            Outcome::Transcribed { result, engine } => log::info!(
                "{:?} engine produced {} chars in {:?}",
                engine,
                result.text.chars().count(),
                start.elapsed()
            ),
            Outcome::NoEngine(reason) => log::info!("No local engine: {reason}"),
            Outcome::UnusableAudio(err) => log::warn!("Audio not usable locally: {err}"),
            Outcome::Failed { error, .. } => log::error!("Transcription failed: {error}"),
            Outcome::Fatal(err) => log::error!("Batch model unavailable: {err}"),
        }
        outcome
    }

    fn run_streaming(&self, input: &Path, handle: &StreamingHandle) -> Outcome {
        let normalizer = AudioNormalizer::new(self.transcoder.as_ref());
        let audio = match normalizer.normalize(input) {
            Ok(audio) => audio,
            Err(err) => return Outcome::UnusableAudio(err),
        };

        let decoded = self.streaming_model(handle).and_then(|model| {
            transcribe_stream(model.as_ref(), &audio, self.settings.frame_samples)
        });
        // Removes any transcoded copy before the outcome is reported.
        drop(audio);

        match decoded {
            Ok(transcript) => Outcome::Transcribed {
                result: RecognitionResult::with_text(transcript.text),
                engine: EngineKind::Streaming,
            },
            Err(err) => Outcome::failed(err),
        }
    }

    fn run_batch(&self, input: &Path) -> Outcome {
        if !input.is_file() {
            return Outcome::failed(NormalizeError::NotFound(input.to_path_buf()));
        }
        if let Err(err) = self.batch.ensure_loaded() {
            return Outcome::Fatal(err);
        }

        let normalizer = AudioNormalizer::new(self.transcoder.as_ref());
        let audio = match normalizer.prepare_for_batch(input) {
            Ok(audio) => audio,
            Err(err) => return Outcome::UnusableAudio(err),
        };

        match self.batch.transcribe_file(audio.path()) {
            Ok(text) => Outcome::Transcribed {
                result: RecognitionResult::with_text(text),
                engine: EngineKind::Batch,
            },
            Err(err) => Outcome::failed(err),
        }
    }

    fn streaming_model(&self, handle: &StreamingHandle) -> Result<Arc<dyn StreamingModel>, AsrError> {
        let mut guard = self
            .streaming_model
            .lock()
            .map_err(|_| AsrError::ModelLoad("streaming engine lock poisoned".into()))?;
        if let Some(model) = guard.as_ref() {
            return Ok(Arc::clone(model));
        }

        let start = Instant::now();
        let model: Arc<dyn StreamingModel> = Arc::from(self.backend.load_model(&handle.model_dir)?);
        log::info!(
            "{} model ready from {} in {:?}",
            handle.backend,
            handle.model_dir.display(),
            start.elapsed()
        );
        *guard = Some(Arc::clone(&model));
        Ok(model)
    }
}
