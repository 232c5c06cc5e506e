pub mod audio_io;
pub mod decoder;
pub mod model_store;
pub mod normalizer;
mod recognizer;
pub mod transcoder;

pub use model_store::{cache_root, missing_model_files, repo_cache_dir, resolve_batch_model_dir};
pub use normalizer::{AudioContainer, AudioNormalizer, DecodableAudio, NormalizeError, NormalizedAudio};
pub use recognizer::{
    AcousticModel, AsrError, BatchEngine, Device, OnnxCtcModel, BATCH_SAMPLE_RATE, BLANK_LABEL,
    LABELS_FILE, MODEL_FILE, QUANTIZED_MODEL_FILE, REQUIRED_MODEL_FILES,
};
pub use transcoder::{FfmpegTranscoder, TargetProfile, TranscodeError, Transcoder};
