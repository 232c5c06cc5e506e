use std::time::Instant;

use crate::asr::{AsrError, NormalizedAudio};
use crate::streaming::{StreamingDecoder, StreamingModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Idle,
    Reading,
    Decoding,
    Finalized,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamTranscript {
    pub text: String,
    pub segments: Vec<String>,
    pub frames: usize,
}

/// One pass over one audio stream. Segments are kept in arrival order.
pub struct DecodingSession<'m> {
    decoder: Box<dyn StreamingDecoder + 'm>,
    state: DecodeState,
    segments: Vec<String>,
    frames: usize,
}

impl<'m> DecodingSession<'m> {
    pub fn new(decoder: Box<dyn StreamingDecoder + 'm>) -> Self {
        Self {
            decoder,
            state: DecodeState::Idle,
            segments: Vec::new(),
            frames: 0,
        }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    pub fn feed(&mut self, frame: &[i16]) -> Result<(), AsrError> {
        debug_assert_ne!(self.state, DecodeState::Finalized);
        self.state = DecodeState::Reading;
        self.frames += 1;

        if self.decoder.accept_waveform(frame)? {
            self.state = DecodeState::Decoding;
            let text = self.decoder.result()?;
            self.push_segment(text);
            self.state = DecodeState::Reading;
        }
        Ok(())
    }

    pub fn finish(mut self) -> Result<StreamTranscript, AsrError> {
        let text = self.decoder.final_result()?;
        self.push_segment(text);
        self.state = DecodeState::Finalized;

        Ok(StreamTranscript {
            text: self.segments.join(" "),
            segments: self.segments,
            frames: self.frames,
        })
    }

    fn push_segment(&mut self, text: String) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        log::debug!("Segment #{}: {} chars", self.segments.len() + 1, trimmed.len());
        self.segments.push(trimmed.to_string());
    }
}

/// Decodes `audio` frame by frame with a fresh decoder and joins every
/// finalized utterance with single spaces.
pub fn transcribe_stream(
    model: &dyn StreamingModel,
    audio: &NormalizedAudio,
    frame_samples: usize,
) -> Result<StreamTranscript, AsrError> {
    let start = Instant::now();
    let frame_samples = frame_samples.max(1);
    let mut reader = audio
        .open()
        .map_err(|e| AsrError::Audio(format!("failed to open {}: {e}", audio.path().display())))?;

    let mut session = DecodingSession::new(model.new_decoder(audio.sample_rate())?);
    let mut samples = reader.samples::<i16>();
    let mut frame = Vec::with_capacity(frame_samples);

    loop {
        frame.clear();
        for sample in samples.by_ref().take(frame_samples) {
            frame.push(sample.map_err(|e| AsrError::Audio(format!("read error: {e}")))?);
        }
        if frame.is_empty() {
            break;
        }
        session.feed(&frame)?;
    }

    let transcript = session.finish()?;
    log::info!(
        "Decoded {:.2}s of audio in {} frames, {} segment(s), in {:?}",
        audio.duration_secs(),
        transcript.frames,
        transcript.segments.len(),
        start.elapsed()
    );
    Ok(transcript)
}
