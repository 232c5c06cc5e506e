#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lok_stt::asr::{AcousticModel, AsrError, TargetProfile, TranscodeError, Transcoder};
use lok_stt::streaming::{StreamingBackend, StreamingDecoder, StreamingModel};
use tempfile::TempPath;

pub fn write_wav(path: &Path, channels: u16, bits: u16, sample_rate: u32, frames: usize) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: bits,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..frames * channels as usize {
        let v = (i as f32 * 0.05).sin() * 0.3;
        if bits == 8 {
            writer.write_sample((v * 127.0) as i8).unwrap();
        } else {
            writer.write_sample((v * 32767.0) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

pub fn canonical_wav(dir: &Path, name: &str, frames: usize) -> PathBuf {
    let path = dir.join(name);
    write_wav(&path, 1, 16, 16_000, frames);
    path
}

/// One entry per fed frame: `Some(text)` ends an utterance with that text.
#[derive(Clone, Default)]
pub struct Script {
    pub frames: Vec<Option<&'static str>>,
    pub final_text: &'static str,
    /// Fails on this (zero-based) frame.
    pub fail_at: Option<usize>,
}

#[derive(Clone, Default)]
pub struct Counters {
    pub model_loads: Arc<AtomicUsize>,
    pub decoders: Arc<AtomicUsize>,
    pub frames_fed: Arc<AtomicUsize>,
}

impl Counters {
    pub fn model_loads(&self) -> usize {
        self.model_loads.load(Ordering::SeqCst)
    }

    pub fn decoders(&self) -> usize {
        self.decoders.load(Ordering::SeqCst)
    }

    pub fn frames_fed(&self) -> usize {
        self.frames_fed.load(Ordering::SeqCst)
    }
}

pub struct FakeBackend {
    pub available: bool,
    pub script: Script,
    pub counters: Counters,
}

impl StreamingBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn load_model(&self, _model_dir: &Path) -> Result<Box<dyn StreamingModel>, AsrError> {
        self.counters.model_loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeModel {
            script: self.script.clone(),
            counters: self.counters.clone(),
        }))
    }
}

struct FakeModel {
    script: Script,
    counters: Counters,
}

impl StreamingModel for FakeModel {
    fn new_decoder(&self, _sample_rate: u32) -> Result<Box<dyn StreamingDecoder + '_>, AsrError> {
        self.counters.decoders.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeDecoder {
            frames: self.script.frames.iter().copied().collect(),
            pending: None,
            final_text: self.script.final_text,
            fail_at: self.script.fail_at,
            fed: 0,
            counters: self.counters.clone(),
        }))
    }
}

struct FakeDecoder {
    frames: VecDeque<Option<&'static str>>,
    pending: Option<&'static str>,
    final_text: &'static str,
    fail_at: Option<usize>,
    fed: usize,
    counters: Counters,
}

impl StreamingDecoder for FakeDecoder {
    fn accept_waveform(&mut self, _frame: &[i16]) -> Result<bool, AsrError> {
        if self.fail_at == Some(self.fed) {
            return Err(AsrError::Decoder("decoder crashed".into()));
        }
        self.fed += 1;
        self.counters.frames_fed.fetch_add(1, Ordering::SeqCst);
        self.pending = self.frames.pop_front().flatten();
        Ok(self.pending.is_some())
    }

    fn result(&mut self) -> Result<String, AsrError> {
        Ok(self.pending.take().unwrap_or_default().to_string())
    }

    fn final_result(&mut self) -> Result<String, AsrError> {
        Ok(self.final_text.to_string())
    }
}

/// Writes a canonical WAV and remembers where, so tests can check cleanup.
#[derive(Clone, Default)]
pub struct FakeTranscoder {
    pub outputs: Arc<Mutex<Vec<PathBuf>>>,
    pub fail: bool,
}

impl FakeTranscoder {
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.outputs.lock().unwrap().clone()
    }
}

impl Transcoder for FakeTranscoder {
    fn transcode(&self, _input: &Path, profile: &TargetProfile) -> Result<TempPath, TranscodeError> {
        if self.fail {
            return Err(TranscodeError::Failed {
                status: "exit status: 1".into(),
                stderr: "Invalid data found when processing input".into(),
            });
        }
        let path = tempfile::Builder::new()
            .suffix(".wav")
            .tempfile()?
            .into_temp_path();
        write_wav(
            &path,
            profile.channels,
            profile.bits_per_sample,
            profile.sample_rate,
            8_000,
        );
        self.outputs.lock().unwrap().push(path.to_path_buf());
        Ok(path)
    }
}

pub struct FakeAcousticModel {
    pub text: &'static str,
}

impl AcousticModel for FakeAcousticModel {
    fn sample_rate(&self) -> u32 {
        16_000
    }

    fn transcribe(&mut self, samples: &[f32]) -> Result<String, AsrError> {
        if samples.is_empty() {
            return Err(AsrError::Audio("no samples".into()));
        }
        Ok(format!("  {}  ", self.text))
    }
}
