use std::path::Path;
use std::process::{Command, Stdio};

use ort::session::Session;

use crate::asr::{cache_root, missing_model_files, repo_cache_dir};
use crate::settings::Settings;
use crate::streaming::StreamingBackend;

pub fn run_startup_checks(settings: &Settings, backend: &dyn StreamingBackend) {
    log::info!("=== Startup Diagnostics ===");
    log_settings(settings);
    check_streaming_engine(settings, backend);
    check_transcoder(&settings.ffmpeg_path);
    check_ort_environment();
    check_batch_model(settings);
    log::info!("===========================");
}

fn log_settings(settings: &Settings) {
    match serde_json::to_string(settings) {
        Ok(json) => log::info!("Settings: {}", json),
        Err(e) => log::warn!("Could not serialise settings: {}", e),
    }
}

fn check_streaming_engine(settings: &Settings, backend: &dyn StreamingBackend) {
    match &settings.streaming_model {
        Some(dir) if dir.is_dir() => log::info!("Offline model directory: {}", dir.display()),
        Some(dir) => log::warn!("Offline model directory {} does not exist", dir.display()),
        None => log::info!("No offline model configured (VOSK_MODEL unset)"),
    }

    if backend.is_available() {
        log::info!("Streaming library '{}' is available", backend.name());
    } else {
        log::info!("Streaming library '{}' is not available", backend.name());
    }
}

fn check_transcoder(program: &Path) {
    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(status) if status.success() => log::info!("Transcoder found: {}", program.display()),
        Ok(status) => log::warn!("Transcoder {} exited with {}", program.display(), status),
        Err(e) => log::warn!(
            "Transcoder {} not usable: {}. Only WAV input will work.",
            program.display(),
            e
        ),
    }
}

fn check_ort_environment() {
    log::info!("Checking ONNX Runtime environment...");
    match Session::builder() {
        Ok(_) => {
            log::info!("ORT Session Builder initialized successfully (Shared libs likely present).")
        }
        Err(e) => log::error!(
            "ORT Initialization failed: {}. Missing shared libraries (onnxruntime.dll/so)?",
            e
        ),
    }
}

fn check_batch_model(settings: &Settings) {
    let batch = &settings.batch;
    if let Some(dir) = &batch.model_dir {
        let missing = missing_model_files(dir);
        if missing.is_empty() {
            log::info!("Batch model directory {} is complete", dir.display());
        } else {
            log::warn!(
                "Batch model directory {} is missing {}",
                dir.display(),
                missing.join(", ")
            );
        }
        return;
    }

    match &batch.repo {
        Some(repo) => log::info!(
            "Batch model {}@{} from {} (cache {})",
            repo,
            batch.revision,
            batch.endpoint,
            repo_cache_dir(&cache_root(batch), repo).display()
        ),
        None => log::info!("No batch model configured"),
    }
}
