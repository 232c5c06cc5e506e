use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, RANGE};
use reqwest::StatusCode;

use crate::asr::recognizer::{AsrError, REQUIRED_MODEL_FILES};

use super::{ModelRepo, MAX_RETRIES, REQUEST_TIMEOUT_SECS, RETRY_BACKOFF_SECS};

pub(crate) fn download_missing_files(
    snapshot_dir: &Path,
    missing_files: &[String],
    remote: &ModelRepo,
) -> Result<(), AsrError> {
    if missing_files.is_empty() {
        return Ok(());
    }

    let client = build_client()?;
    for (index, file) in missing_files.iter().enumerate() {
        log::info!("Fetching {} ({}/{})", file, index + 1, missing_files.len());
        download_asset(&client, remote, file, &snapshot_dir.join(file))?;
    }

    log::info!("Repaired model snapshot at {}", snapshot_dir.display());
    Ok(())
}

pub(crate) fn download_snapshot(root: &Path, remote: &ModelRepo) -> Result<PathBuf, AsrError> {
    let snapshot_name = sanitize_revision(&remote.revision);
    let snapshot_dir = root.join("snapshots").join(&snapshot_name);
    fs::create_dir_all(&snapshot_dir)?;

    let client = build_client()?;
    for (index, file) in REQUIRED_MODEL_FILES.iter().enumerate() {
        let dest = snapshot_dir.join(file);
        if dest.exists() {
            continue;
        }
        log::info!(
            "Fetching {} ({}/{})",
            file,
            index + 1,
            REQUIRED_MODEL_FILES.len()
        );
        download_asset(&client, remote, file, &dest)?;
    }

    write_ref(root, &remote.revision, &snapshot_name)?;
    log::info!(
        "Downloaded {}@{} to {}",
        remote.repo,
        remote.revision,
        snapshot_dir.display()
    );
    Ok(snapshot_dir)
}

fn sanitize_revision(revision: &str) -> String {
    revision
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .collect()
}

fn build_client() -> Result<Client, AsrError> {
    Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|e| AsrError::Download(format!("http client: {e}")))
}

fn download_asset(
    client: &Client,
    remote: &ModelRepo,
    file: &str,
    dest: &Path,
) -> Result<(), AsrError> {
    let url = remote.file_url(file);
    let tmp = dest.with_extension("download");
    let mut last_err: Option<AsrError> = None;

    for attempt in 1..=MAX_RETRIES {
        log::info!(
            "Downloading model asset to {} from {url} (attempt {attempt}/{MAX_RETRIES})",
            dest.display()
        );

        match try_download_resumable(client, remote, &url, &tmp, dest) {
            Ok(()) => return Ok(()),
            Err(err @ (AsrError::Unauthorized(_) | AsrError::ModelNotFound(_))) => {
                let _ = fs::remove_file(&tmp);
                return Err(err);
            }
            Err(err) => {
                log::warn!("Download attempt {} failed: {}", attempt, err);
                last_err = Some(err);

                if attempt < MAX_RETRIES {
                    std::thread::sleep(Duration::from_secs(RETRY_BACKOFF_SECS * attempt as u64));
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| AsrError::Download(format!("{url}: failed to download"))))
}

fn write_ref(root: &Path, revision: &str, snapshot_name: &str) -> Result<(), AsrError> {
    let ref_path = root.join("refs").join(revision);
    if let Some(parent) = ref_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&ref_path, snapshot_name)
        .map_err(|e| AsrError::Download(format!("write refs/{revision}: {e}")))
}

fn try_download_resumable(
    client: &Client,
    remote: &ModelRepo,
    url: &str,
    tmp: &Path,
    dest: &Path,
) -> Result<(), AsrError> {
    let current_len = fs::metadata(tmp).map(|m| m.len()).unwrap_or(0);

    let mut request = client.get(url);
    if let Some(token) = &remote.token {
        request = request.header(AUTHORIZATION, format!("Bearer {token}"));
    }
    if current_len > 0 {
        request = request.header(RANGE, format!("bytes={current_len}-"));
    }

    let mut response = request
        .send()
        .map_err(|e| AsrError::Download(format!("{url}: request failed: {e}")))?;

    let status = response.status();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(AsrError::Unauthorized(format!("{url}: {status}")));
        }
        StatusCode::NOT_FOUND => {
            return Err(AsrError::ModelNotFound(format!("{url}: {status}")));
        }
        s if !s.is_success() => {
            return Err(AsrError::Download(format!("{url}: unexpected status {s}")));
        }
        _ => {}
    }

    let resumed = status == StatusCode::PARTIAL_CONTENT;
    let content_len = response
        .headers()
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);
    let total_size = if resumed {
        current_len + content_len
    } else {
        content_len
    };

    let mut file = if resumed {
        log::debug!("Resuming download from byte {}", current_len);
        fs::OpenOptions::new().append(true).open(tmp)?
    } else {
        if current_len > 0 {
            log::warn!("Server ignored the range request (status {status}); restarting download");
        }
        fs::File::create(tmp)?
    };

    let mut downloaded = if resumed { current_len } else { 0 };
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| AsrError::Download(format!("{url}: read failed: {e}")))?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .map_err(|e| AsrError::Download(format!("{url}: write failed: {e}")))?;
        downloaded += bytes_read as u64;
    }

    if total_size > 0 && downloaded != total_size {
        return Err(AsrError::Download(format!(
            "Incomplete download: expected {} bytes, got {}",
            total_size, downloaded
        )));
    }

    fs::rename(tmp, dest)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revisions_become_safe_directory_names() {
        assert_eq!(sanitize_revision("main"), "main");
        assert_eq!(sanitize_revision("refs/pr/3"), "refs_pr_3");
        assert_eq!(sanitize_revision("v1.0-rc"), "v1.0-rc");
    }

    #[test]
    fn file_urls_follow_resolve_layout() {
        let remote = ModelRepo {
            endpoint: "https://hub.example".into(),
            repo: "org/stt".into(),
            revision: "main".into(),
            token: None,
        };
        assert_eq!(
            remote.file_url("labels.json"),
            "https://hub.example/org/stt/resolve/main/labels.json"
        );
    }
}
