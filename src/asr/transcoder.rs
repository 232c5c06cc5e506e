//! External transcoding into the canonical decoder input format.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tempfile::TempPath;
use thiserror::Error;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Bytes of transcoder stderr kept for error reports; the rest is drained.
const STDERR_LIMIT: usize = 8 * 1024;

/// Audio parameters a transcoder must produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetProfile {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl TargetProfile {
    pub const CANONICAL: Self = Self {
        sample_rate: 16_000,
        channels: 1,
        bits_per_sample: 16,
    };
}

impl Default for TargetProfile {
    fn default() -> Self {
        Self::CANONICAL
    }
}

#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("transcoder '{0}' is not installed")]
    Missing(String),
    #[error("transcoding timed out after {0:?}")]
    Timeout(Duration),
    #[error("transcoder exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },
    #[error("transcoder produced no output")]
    NoOutput,
    #[error("transcoder I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns arbitrary input audio into an uncompressed WAV matching `profile`.
///
/// The returned [`TempPath`] removes the file when dropped.
pub trait Transcoder: Send + Sync {
    fn transcode(&self, input: &Path, profile: &TargetProfile) -> Result<TempPath, TranscodeError>;
}

/// Runs the `ffmpeg` executable with a hard timeout.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    program: PathBuf,
    timeout: Duration,
}

impl FfmpegTranscoder {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Transcoder for FfmpegTranscoder {
    fn transcode(&self, input: &Path, profile: &TargetProfile) -> Result<TempPath, TranscodeError> {
        let output = tempfile::Builder::new()
            .prefix("lok-stt-")
            .suffix(".wav")
            .tempfile()?
            .into_temp_path();

        let codec = format!("pcm_s{}le", profile.bits_per_sample);
        let start = Instant::now();
        let mut child = Command::new(&self.program)
            .arg("-y")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .args(["-ar", &profile.sample_rate.to_string()])
            .args(["-ac", &profile.channels.to_string()])
            .args(["-c:a", &codec])
            .args(["-f", "wav"])
            .arg(&*output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| match err.kind() {
                std::io::ErrorKind::NotFound => TranscodeError::Missing(self.program_name()),
                _ => TranscodeError::Io(err),
            })?;

        // Drained concurrently so a chatty child never blocks on a full pipe.
        let stderr_reader = child.stderr.take().map(drain_stderr);

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() >= self.timeout {
                log::warn!(
                    "Transcoding {} exceeded {:?}; killing {}",
                    input.display(),
                    self.timeout,
                    self.program_name()
                );
                if let Err(err) = child.kill() {
                    log::debug!("Failed to kill transcoder: {err}");
                }
                let _ = child.wait();
                return Err(TranscodeError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stderr = stderr_reader
            .and_then(|reader| reader.join().ok())
            .unwrap_or_default();
        if !status.success() {
            return Err(TranscodeError::Failed {
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        let produced = std::fs::metadata(&output).map(|m| m.len()).unwrap_or(0);
        if produced == 0 {
            return Err(TranscodeError::NoOutput);
        }

        if !stderr.trim().is_empty() {
            log::debug!("Transcoder stderr: {}", stderr.trim());
        }
        log::info!(
            "Transcoded {} to {} ({} bytes) in {:?}",
            input.display(),
            output.display(),
            produced,
            start.elapsed()
        );
        Ok(output)
    }
}

fn drain_stderr<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut kept = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    let room = STDERR_LIMIT.saturating_sub(kept.len());
                    kept.extend_from_slice(&chunk[..n.min(room)]);
                }
            }
        }
        String::from_utf8_lossy(&kept).into_owned()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_program_is_reported() {
        let transcoder =
            FfmpegTranscoder::new("/nonexistent/bin/ffmpeg-lok", Duration::from_secs(1));
        let err = transcoder
            .transcode(Path::new("in.webm"), &TargetProfile::CANONICAL)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Missing(_)), "{err}");
    }

    /// Shell stand-in for ffmpeg; `$last` holds the output path.
    #[cfg(unix)]
    fn fake_ffmpeg(dir: &Path, body: &str) -> PathBuf {
        use std::io::Write;
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-ffmpeg");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "#!/bin/sh\nfor last; do :; done\n{body}").unwrap();
        file.sync_all().unwrap();
        drop(file);
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn chatty_stderr_does_not_stall_the_transcode() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(
            dir.path(),
            "head -c 262144 /dev/zero | tr '\\000' x >&2\nprintf 'RIFF0000WAVEfmt ' > \"$last\"",
        );
        let transcoder = FfmpegTranscoder::new(program, Duration::from_secs(20));

        let start = Instant::now();
        let output = transcoder
            .transcode(Path::new("in.webm"), &TargetProfile::CANONICAL)
            .unwrap();
        assert!(start.elapsed() < Duration::from_secs(20));
        assert!(std::fs::metadata(&output).unwrap().len() > 0);
    }

    #[cfg(unix)]
    #[test]
    fn slow_transcoder_is_killed_and_its_output_removed() {
        let dir = tempfile::tempdir().unwrap();
        let seen = dir.path().join("seen");
        let program = fake_ffmpeg(
            dir.path(),
            &format!("printf '%s' \"$last\" > '{}'\nsleep 10", seen.display()),
        );
        let transcoder = FfmpegTranscoder::new(program, Duration::from_millis(1500));

        let err = transcoder
            .transcode(Path::new("in.webm"), &TargetProfile::CANONICAL)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::Timeout(_)), "{err}");

        let output = PathBuf::from(std::fs::read_to_string(&seen).unwrap());
        assert!(!output.as_os_str().is_empty());
        assert!(!output.exists());
    }

    #[cfg(unix)]
    #[test]
    fn empty_output_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(dir.path(), "exit 0");
        let transcoder = FfmpegTranscoder::new(program, Duration::from_secs(10));

        let err = transcoder
            .transcode(Path::new("in.webm"), &TargetProfile::CANONICAL)
            .unwrap_err();
        assert!(matches!(err, TranscodeError::NoOutput), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn failure_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let program = fake_ffmpeg(dir.path(), "echo 'Invalid data found' >&2\nexit 3");
        let transcoder = FfmpegTranscoder::new(program, Duration::from_secs(10));

        match transcoder.transcode(Path::new("in.webm"), &TargetProfile::CANONICAL) {
            Err(TranscodeError::Failed { stderr, .. }) => assert_eq!(stderr, "Invalid data found"),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn canonical_profile_is_mono_16k_pcm16() {
        let p = TargetProfile::default();
        assert_eq!((p.sample_rate, p.channels, p.bits_per_sample), (16_000, 1, 16));
    }
}
