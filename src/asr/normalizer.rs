//! Audio Normalizer: turns an input file into mono 16-bit PCM WAV the
//! streaming decoder can consume, or reports why it cannot.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavReader, WavSpec};
use tempfile::TempPath;
use thiserror::Error;

use super::transcoder::{TargetProfile, TranscodeError, Transcoder};

/// Every variant means the input cannot be processed locally.
#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("audio file not found: {0}")]
    NotFound(PathBuf),
    #[error("could not read audio file: {0}")]
    Unreadable(#[from] std::io::Error),
    #[error("unrecognised audio container: {0}")]
    UnknownContainer(PathBuf),
    #[error("transcoding failed: {0}")]
    Transcode(#[from] TranscodeError),
    #[error("invalid WAV data: {0}")]
    InvalidWav(#[from] hound::Error),
    #[error(
        "audio is not mono 16-bit PCM (channels={channels}, bits={bits_per_sample}, format={format})"
    )]
    NonConformant {
        channels: u16,
        bits_per_sample: u16,
        format: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioContainer {
    Wav,
    WebM,
    Ogg,
    Mp3,
    Mp4,
    Flac,
    Aac,
}

impl AudioContainer {
    /// Sniffs magic bytes, falling back to the file extension.
    pub fn detect(path: &Path) -> Result<Option<Self>, NormalizeError> {
        let mut header = [0u8; 12];
        let mut file = File::open(path)?;
        let mut filled = 0;
        while filled < header.len() {
            let n = file.read(&mut header[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        Ok(Self::from_magic(&header[..filled]).or_else(|| Self::from_extension(path)))
    }

    pub fn from_magic(header: &[u8]) -> Option<Self> {
        match header {
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'A', b'V', b'E', ..] => Some(Self::Wav),
            [0x1A, 0x45, 0xDF, 0xA3, ..] => Some(Self::WebM),
            [b'O', b'g', b'g', b'S', ..] => Some(Self::Ogg),
            [b'f', b'L', b'a', b'C', ..] => Some(Self::Flac),
            [b'I', b'D', b'3', ..] => Some(Self::Mp3),
            [_, _, _, _, b'f', b't', b'y', b'p', ..] => Some(Self::Mp4),
            [0xFF, b, ..] if b & 0xF6 == 0xF0 => Some(Self::Aac),
            [0xFF, b, ..] if b & 0xE0 == 0xE0 => Some(Self::Mp3),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "wav" | "wave" => Some(Self::Wav),
            "webm" | "weba" => Some(Self::WebM),
            "ogg" | "oga" | "opus" => Some(Self::Ogg),
            "mp3" => Some(Self::Mp3),
            "m4a" | "mp4" => Some(Self::Mp4),
            "aac" => Some(Self::Aac),
            "flac" => Some(Self::Flac),
            _ => None,
        }
    }

    /// Containers the built-in batch audio loader decodes without a transcoder.
    pub fn is_natively_decodable(self) -> bool {
        matches!(self, Self::Wav | Self::Flac | Self::Mp3)
    }
}

/// Mono 16-bit PCM WAV ready for the streaming decoder.
///
/// If the audio was transcoded, the temporary file is removed when this
/// value is dropped.
#[derive(Debug)]
pub struct NormalizedAudio {
    path: PathBuf,
    spec: WavSpec,
    frames: u32,
    temp: Option<TempPath>,
}

impl NormalizedAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sample_rate(&self) -> u32 {
        self.spec.sample_rate
    }

    pub fn duration_secs(&self) -> f32 {
        if self.spec.sample_rate == 0 {
            return 0.0;
        }
        self.frames as f32 / self.spec.sample_rate as f32
    }

    pub fn open(&self) -> Result<WavReader<std::io::BufReader<File>>, hound::Error> {
        WavReader::open(&self.path)
    }
}

/// Audio the batch loader can decode directly, possibly via a transcoded copy.
#[derive(Debug)]
pub struct DecodableAudio {
    path: PathBuf,
    _temp: Option<TempPath>,
}

impl DecodableAudio {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct AudioNormalizer<'a> {
    transcoder: &'a dyn Transcoder,
    profile: TargetProfile,
}

impl<'a> AudioNormalizer<'a> {
    pub fn new(transcoder: &'a dyn Transcoder) -> Self {
        Self {
            transcoder,
            profile: TargetProfile::CANONICAL,
        }
    }

    pub fn normalize(&self, input: &Path) -> Result<NormalizedAudio, NormalizeError> {
        if !input.is_file() {
            return Err(NormalizeError::NotFound(input.to_path_buf()));
        }

        match AudioContainer::detect(input)? {
            Some(AudioContainer::Wav) => validate_wav(input.to_path_buf(), None),
            Some(container) => {
                log::debug!("Input {} is {:?}; transcoding", input.display(), container);
                let temp = self.transcoder.transcode(input, &self.profile)?;
                validate_wav(temp.to_path_buf(), Some(temp))
            }
            None => Err(NormalizeError::UnknownContainer(input.to_path_buf())),
        }
    }

    pub fn prepare_for_batch(&self, input: &Path) -> Result<DecodableAudio, NormalizeError> {
        if !input.is_file() {
            return Err(NormalizeError::NotFound(input.to_path_buf()));
        }

        match AudioContainer::detect(input)? {
            Some(container) if container.is_natively_decodable() => Ok(DecodableAudio {
                path: input.to_path_buf(),
                _temp: None,
            }),
            Some(_) => {
                let temp = self.transcoder.transcode(input, &self.profile)?;
                Ok(DecodableAudio {
                    path: temp.to_path_buf(),
                    _temp: Some(temp),
                })
            }
            None => Err(NormalizeError::UnknownContainer(input.to_path_buf())),
        }
    }
}

fn validate_wav(path: PathBuf, temp: Option<TempPath>) -> Result<NormalizedAudio, NormalizeError> {
    let reader = WavReader::open(&path)?;
    let spec = reader.spec();
    let frames = reader.duration();
    drop(reader);

    if spec.channels != 1 || spec.bits_per_sample != 16 || spec.sample_format != SampleFormat::Int
    {
        return Err(NormalizeError::NonConformant {
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            format: match spec.sample_format {
                SampleFormat::Int => "int",
                SampleFormat::Float => "float",
            },
        });
    }

    if spec.sample_rate != TargetProfile::CANONICAL.sample_rate {
        log::debug!(
            "{} is {} Hz; the decoder resamples internally",
            path.display(),
            spec.sample_rate
        );
    }

    Ok(NormalizedAudio {
        path,
        spec,
        frames,
        temp,
    })
}
