use thiserror::Error;

use crate::asr::{AsrError, NormalizeError};

/// Unified app errors.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("ASR: {0}")]
    Asr(#[from] AsrError),

    #[error("Input audio: {0}")]
    Normalize(#[from] NormalizeError),
}

/// Audio processing errors
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    #[error("Failed to create resampler: {0}")]
    ResamplerCreation(String),

    #[error("Resampler processing failed: {0}")]
    ResamplerProcessing(String),
}
