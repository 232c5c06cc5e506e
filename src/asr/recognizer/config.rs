use ndarray::ShapeError;

use crate::error::AudioError;

#[derive(thiserror::Error, Debug)]
pub enum AsrError {
    #[error("ORT error: {0}")]
    Ort(#[from] ort::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ndarray shape error: {0}")]
    Shape(#[from] ShapeError),
    #[error("Audio processing error: {0}")]
    Resample(#[from] AudioError),
    #[error("Model output not found: {0}")]
    OutputNotFound(String),
    #[error("Invalid label file: {0}")]
    Labels(String),
    #[error("Audio decode error: {0}")]
    Audio(String),
    #[error("Decoder failed: {0}")]
    Decoder(String),
    #[error("Failed to load model from {0}")]
    ModelLoad(String),
    #[error("Model snapshot not found under {0}")]
    SnapshotNotFound(String),
    #[error("Model download failed: {0}")]
    Download(String),
    #[error("Model repository requires authentication: {0}")]
    Unauthorized(String),
    #[error("Model not found in repository: {0}")]
    ModelNotFound(String),
    #[error("No batch model configured")]
    NotConfigured,
}

impl AsrError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::NotConfigured => {
                "No batch model configured. Set STT_BATCH_MODEL_DIR to a local model directory or STT_BATCH_REPO to a repository id."
            }
            Self::Unauthorized(_) => {
                "The model repository refused access. Accept the model's terms and set HF_TOKEN to a valid access token."
            }
            Self::ModelNotFound(_) => {
                "The model repository or one of its files does not exist. Check STT_BATCH_REPO and STT_BATCH_REVISION."
            }
            Self::Download(_) => {
                "Could not download the speech model. Check your internet connection and try again."
            }
            Self::SnapshotNotFound(_) | Self::ModelLoad(_) | Self::Labels(_) => {
                "Speech model files are missing or corrupted. Delete the cached model and run again to download it."
            }
            Self::Audio(_) | Self::Resample(_) => {
                "Could not decode the audio file. Check that it is a supported, non-empty recording."
            }
            Self::Ort(_) | Self::OutputNotFound(_) | Self::Shape(_) | Self::Decoder(_) => {
                "The speech engine failed to run. Check the model files and the ONNX Runtime installation."
            }
            Self::Io(_) => {
                "Could not read or write local files. Check disk space and permissions."
            }
        }
    }
}

pub const BATCH_SAMPLE_RATE: u32 = 16_000;
pub const BLANK_LABEL: &str = "_";

pub const MODEL_FILE: &str = "model.onnx";
pub const QUANTIZED_MODEL_FILE: &str = "model.int8.onnx";
pub const LABELS_FILE: &str = "labels.json";
/// Files a batch model snapshot must contain, in download order.
pub const REQUIRED_MODEL_FILES: &[&str] = &[MODEL_FILE, LABELS_FILE];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cuda,
    CoreMl,
    Cpu,
}
