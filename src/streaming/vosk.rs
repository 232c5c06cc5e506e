use std::path::Path;
use std::time::Instant;

use vosk::{DecodingState, Model, Recognizer};

use crate::asr::AsrError;
use crate::streaming::{StreamingBackend, StreamingDecoder, StreamingModel};

/// Kaldi decoding through libvosk.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoskBackend;

impl StreamingBackend for VoskBackend {
    fn name(&self) -> &'static str {
        "vosk"
    }

    /// libvosk is linked at build time, so this is always true. A host
    /// missing the shared library fails at process start-up instead of
    /// falling back to the empty result.
    fn is_available(&self) -> bool {
        true
    }

    fn load_model(&self, model_dir: &Path) -> Result<Box<dyn StreamingModel>, AsrError> {
        let start = Instant::now();
        let path = model_dir
            .to_str()
            .ok_or_else(|| AsrError::ModelLoad(format!("{} (non UTF-8 path)", model_dir.display())))?;
        let model =
            Model::new(path).ok_or_else(|| AsrError::ModelLoad(model_dir.display().to_string()))?;
        log::info!(
            "Vosk model loaded from {} in {:?}",
            model_dir.display(),
            start.elapsed()
        );
        Ok(Box::new(VoskModel { model }))
    }
}

pub struct VoskModel {
    model: Model,
}

impl StreamingModel for VoskModel {
    fn new_decoder(&self, sample_rate: u32) -> Result<Box<dyn StreamingDecoder + '_>, AsrError> {
        let mut recognizer = Recognizer::new(&self.model, sample_rate as f32).ok_or_else(|| {
            AsrError::Decoder(format!("could not create recognizer at {sample_rate} Hz"))
        })?;
        recognizer.set_words(true);
        Ok(Box::new(VoskDecoder { recognizer }))
    }
}

struct VoskDecoder {
    recognizer: Recognizer,
}

impl VoskDecoder {
    fn text_of(result: vosk::CompleteResult<'_>) -> String {
        result
            .single()
            .map(|single| single.text.to_string())
            .unwrap_or_default()
    }
}

impl StreamingDecoder for VoskDecoder {
    fn accept_waveform(&mut self, frame: &[i16]) -> Result<bool, AsrError> {
        match self.recognizer.accept_waveform(frame) {
            Ok(DecodingState::Finalized) => Ok(true),
            Ok(DecodingState::Running) => Ok(false),
            Ok(DecodingState::Failed) => Err(AsrError::Decoder("vosk rejected the waveform".into())),
            Err(err) => Err(AsrError::Decoder(format!("{err:?}"))),
        }
    }

    fn result(&mut self) -> Result<String, AsrError> {
        Ok(Self::text_of(self.recognizer.result()))
    }

    fn final_result(&mut self) -> Result<String, AsrError> {
        Ok(Self::text_of(self.recognizer.final_result()))
    }
}
