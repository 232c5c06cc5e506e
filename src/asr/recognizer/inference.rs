use std::path::Path;
use std::sync::Mutex;
use std::time::Instant;

use super::config::AsrError;
use super::model::AcousticModel;
use crate::asr::audio_io::load_audio;

type ModelLoader = dyn Fn() -> Result<Box<dyn AcousticModel>, AsrError> + Send + Sync;

/// Lazily loads the batch model on first use and keeps it for the process.
pub struct BatchEngine {
    model: Mutex<Option<Box<dyn AcousticModel>>>,
    loader: Box<ModelLoader>,
}

impl BatchEngine {
    pub fn new<F>(loader: F) -> Self
    where
        F: Fn() -> Result<Box<dyn AcousticModel>, AsrError> + Send + Sync + 'static,
    {
        Self {
            model: Mutex::new(None),
            loader: Box::new(loader),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.model
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Loads the model unless it already is. The lock is held during the
    /// load so concurrent first callers load exactly once.
    pub fn ensure_loaded(&self) -> Result<(), AsrError> {
        let mut guard = self
            .model
            .lock()
            .map_err(|_| AsrError::ModelLoad("batch engine lock poisoned".into()))?;
        if guard.is_none() {
            let start = Instant::now();
            let model = (self.loader)()?;
            log::info!("Batch ASR model ready in {:?}", start.elapsed());
            *guard = Some(model);
        }
        Ok(())
    }

    /// Transcribes a whole file in one forward pass.
    pub fn transcribe_file(&self, path: &Path) -> Result<String, AsrError> {
        self.ensure_loaded()?;
        let mut guard = self
            .model
            .lock()
            .map_err(|_| AsrError::Decoder("batch engine lock poisoned".into()))?;
        let model = guard
            .as_mut()
            .ok_or_else(|| AsrError::Decoder("batch model is not loaded".into()))?;

        let samples = load_audio(path, model.sample_rate())?;
        let start = Instant::now();
        let text = model.transcribe(&samples)?;
        log::info!(
            "Batch transcription of {} samples completed in {:?}",
            samples.len(),
            start.elapsed()
        );
        Ok(text.trim().to_string())
    }
}
