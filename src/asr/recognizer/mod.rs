pub mod config;
mod inference;
mod model;

pub use config::{
    AsrError, Device, BATCH_SAMPLE_RATE, BLANK_LABEL, LABELS_FILE, MODEL_FILE,
    QUANTIZED_MODEL_FILE, REQUIRED_MODEL_FILES,
};
pub use inference::BatchEngine;
pub use model::{AcousticModel, OnnxCtcModel};
