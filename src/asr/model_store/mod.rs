//! Local cache of batch models fetched from a remote model repository.
//!
//! Layout mirrors the Hugging Face hub cache:
//! `<root>/models--<owner>--<name>/{refs/<revision>, snapshots/<commit>/...}`.

pub mod download;
mod paths;

pub use paths::{cache_root, missing_model_files, repo_cache_dir, resolve_batch_model_dir};

const MAX_RETRIES: usize = 3;
const RETRY_BACKOFF_SECS: u64 = 2;
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Remote repository coordinates of a batch model.
#[derive(Debug, Clone)]
pub struct ModelRepo {
    pub endpoint: String,
    pub repo: String,
    pub revision: String,
    pub token: Option<String>,
}

impl ModelRepo {
    pub fn file_url(&self, file: &str) -> String {
        format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint, self.repo, self.revision, file
        )
    }
}
