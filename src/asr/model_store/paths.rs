use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::asr::recognizer::{AsrError, REQUIRED_MODEL_FILES};
use crate::settings::BatchSettings;

use super::{download, ModelRepo};

pub fn missing_model_files(snapshot_dir: &Path) -> Vec<String> {
    REQUIRED_MODEL_FILES
        .iter()
        .filter(|file| !snapshot_dir.join(file).exists())
        .map(|file| (*file).to_string())
        .collect()
}

pub fn cache_root(settings: &BatchSettings) -> PathBuf {
    if let Some(path) = &settings.cache_root {
        return path.clone();
    }

    let base = dirs_next::cache_dir()
        .or_else(|| std::env::var_os("HOME").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."));

    base.join("huggingface").join("hub")
}

pub fn repo_cache_dir(root: &Path, repo: &str) -> PathBuf {
    root.join(format!("models--{}", repo.replace('/', "--")))
}

/// Finds a complete batch model directory, downloading it if needed.
pub fn resolve_batch_model_dir(settings: &BatchSettings) -> Result<PathBuf, AsrError> {
    if let Some(dir) = &settings.model_dir {
        log::debug!("Using local batch model at {}", dir.display());
        if !dir.is_dir() {
            return Err(AsrError::SnapshotNotFound(dir.display().to_string()));
        }
        let missing = missing_model_files(dir);
        if !missing.is_empty() {
            return Err(AsrError::SnapshotNotFound(format!(
                "{} (missing {})",
                dir.display(),
                missing.join(", ")
            )));
        }
        return Ok(dir.clone());
    }

    let repo = settings.repo.as_ref().ok_or(AsrError::NotConfigured)?;
    if !is_valid_repo_id(repo) {
        return Err(AsrError::ModelNotFound(format!(
            "'{repo}' is not an owner/name repository id"
        )));
    }

    let remote = ModelRepo {
        endpoint: settings.endpoint.clone(),
        repo: repo.clone(),
        revision: settings.revision.clone(),
        token: settings.token.clone(),
    };
    resolve_snapshot(&repo_cache_dir(&cache_root(settings), repo), &remote)
}

fn is_valid_repo_id(repo: &str) -> bool {
    let mut parts = repo.split('/');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty()
    )
}

fn ensure_snapshot_complete(
    root: &Path,
    snapshot_dir: PathBuf,
    remote: &ModelRepo,
) -> Result<PathBuf, AsrError> {
    let missing = missing_model_files(&snapshot_dir);
    if missing.is_empty() {
        return Ok(snapshot_dir);
    }

    log::warn!(
        "Model snapshot at {} missing required files ({}). Attempting to download missing assets.",
        snapshot_dir.display(),
        missing.join(", ")
    );

    match download::download_missing_files(&snapshot_dir, &missing, remote) {
        Ok(()) => Ok(snapshot_dir),
        Err(err @ (AsrError::Unauthorized(_) | AsrError::ModelNotFound(_))) => Err(err),
        Err(err) => {
            log::warn!(
                "Snapshot repair failed, falling back to fresh download: {}",
                err
            );
            download::download_snapshot(root, remote)
        }
    }
}

pub(crate) fn resolve_snapshot(root: &Path, remote: &ModelRepo) -> Result<PathBuf, AsrError> {
    log::debug!("resolve_snapshot: checking root {}", root.display());

    let refs = root.join("refs").join(&remote.revision);
    if refs.is_file() {
        let commit = fs::read_to_string(&refs)?.trim().to_string();
        let snap = root.join("snapshots").join(&commit);
        if snap.is_dir() {
            log::debug!("refs/{} -> {}", remote.revision, snap.display());
            return ensure_snapshot_complete(root, snap, remote);
        }
        log::warn!(
            "Snapshot {} named by refs/{} does not exist",
            snap.display(),
            remote.revision
        );
    }

    let snapshots = root.join("snapshots");
    if snapshots.is_dir() {
        let mut newest: Option<(SystemTime, PathBuf)> = None;
        for entry in fs::read_dir(&snapshots)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            match &newest {
                Some((ts, _)) if modified <= *ts => {}
                _ => newest = Some((modified, entry.path())),
            }
        }

        if let Some((_, path)) = newest {
            log::info!("Selected newest snapshot: {}", path.display());
            return ensure_snapshot_complete(root, path, remote);
        }
    }

    log::info!(
        "No local batch model snapshot under {}; downloading {}@{}",
        root.display(),
        remote.repo,
        remote.revision
    );
    download::download_snapshot(root, remote)
}
