use std::path::PathBuf;

use lok_stt::asr::{missing_model_files, resolve_batch_model_dir, AsrError, LABELS_FILE, MODEL_FILE};
use lok_stt::settings::BatchSettings;

#[test]
fn missing_model_files_detects_incomplete_snapshot() {
    let temp_dir = tempfile::tempdir().expect("temp dir should be creatable");

    let initial_missing = missing_model_files(temp_dir.path());
    assert_eq!(initial_missing, vec![MODEL_FILE.to_string(), LABELS_FILE.to_string()]);

    for file in &initial_missing {
        std::fs::write(temp_dir.path().join(file), b"ok").expect("write should succeed");
    }

    assert!(missing_model_files(temp_dir.path()).is_empty());
}

#[test]
fn complete_local_dir_is_used_as_is() {
    let temp_dir = tempfile::tempdir().unwrap();
    for file in [MODEL_FILE, LABELS_FILE] {
        std::fs::write(temp_dir.path().join(file), b"ok").unwrap();
    }
    let settings = BatchSettings {
        model_dir: Some(temp_dir.path().to_path_buf()),
        repo: Some("ignored/repo".into()),
        ..BatchSettings::default()
    };
    assert_eq!(
        resolve_batch_model_dir(&settings).unwrap(),
        temp_dir.path().to_path_buf()
    );
}

#[test]
fn absent_local_dir_is_reported() {
    let settings = BatchSettings {
        model_dir: Some(PathBuf::from("/definitely/not/a/model")),
        ..BatchSettings::default()
    };
    assert!(matches!(
        resolve_batch_model_dir(&settings),
        Err(AsrError::SnapshotNotFound(_))
    ));
}

#[test]
fn malformed_repo_id_is_rejected_without_network() {
    let cache = tempfile::tempdir().unwrap();
    let settings = BatchSettings {
        repo: Some("just-a-name".into()),
        cache_root: Some(cache.path().to_path_buf()),
        ..BatchSettings::default()
    };
    assert!(matches!(
        resolve_batch_model_dir(&settings),
        Err(AsrError::ModelNotFound(_))
    ));
}
