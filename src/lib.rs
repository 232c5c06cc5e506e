pub mod asr;
pub mod audio_processing;
pub mod commands;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod language;
pub mod settings;
pub mod streaming;

mod app;

pub use app::run;
