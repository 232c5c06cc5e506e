pub mod decoding;
#[cfg(feature = "vosk")]
pub mod vosk;

use std::path::Path;

use crate::asr::AsrError;

pub use decoding::{transcribe_stream, DecodeState, StreamTranscript};

/// A streaming recognizer library, e.g. Kaldi via libvosk.
pub trait StreamingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the native decoding library can be used in this process.
    fn is_available(&self) -> bool;

    fn load_model(&self, model_dir: &Path) -> Result<Box<dyn StreamingModel>, AsrError>;
}

/// A loaded acoustic model. Expensive to build, shared for the process.
pub trait StreamingModel: Send + Sync {
    /// Builds fresh decoder state for one audio stream.
    fn new_decoder(&self, sample_rate: u32) -> Result<Box<dyn StreamingDecoder + '_>, AsrError>;
}

/// Per-stream decoder state. Never reused across audio files.
pub trait StreamingDecoder {
    /// Feeds one frame of 16-bit samples; returns true when an utterance ended.
    fn accept_waveform(&mut self, frame: &[i16]) -> Result<bool, AsrError>;

    /// Text of the utterance that just ended.
    fn result(&mut self) -> Result<String, AsrError>;

    /// Flushes the decoder at end of input.
    fn final_result(&mut self) -> Result<String, AsrError>;
}

/// The streaming backend compiled into this binary.
pub fn default_backend() -> Box<dyn StreamingBackend> {
    #[cfg(feature = "vosk")]
    {
        Box::new(vosk::VoskBackend)
    }
    #[cfg(not(feature = "vosk"))]
    {
        Box::new(UnlinkedBackend)
    }
}

/// Stands in when the binary was built without a decoding library.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnlinkedBackend;

impl StreamingBackend for UnlinkedBackend {
    fn name(&self) -> &'static str {
        "vosk"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn load_model(&self, model_dir: &Path) -> Result<Box<dyn StreamingModel>, AsrError> {
        Err(AsrError::ModelLoad(format!(
            "{} (built without the `vosk` feature)",
            model_dir.display()
        )))
    }
}
