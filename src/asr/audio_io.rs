use std::path::Path;
use std::time::Instant;

use crate::asr::recognizer::AsrError;
use crate::audio_processing::resample;

/// Decodes a WAV, FLAC or MP3 file, averages channels to mono and resamples
/// to `target_rate`.
pub fn load_audio(path: &Path, target_rate: u32) -> Result<Vec<f32>, AsrError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::DecoderOptions;
    use symphonia::core::errors::Error as SymphoniaError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let io_start = Instant::now();
    let src = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AsrError::Audio(format!("failed to probe audio {}: {e}", path.display())))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AsrError::Audio("missing default track".to_string()))?;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AsrError::Audio(format!("decoder init failed: {e}")))?;

    let track_id = track.id;
    let mut pcm = track
        .codec_params
        .n_frames
        .and_then(|n| usize::try_from(n).ok())
        .map(Vec::with_capacity)
        .unwrap_or_default();
    let mut sample_rate = track.codec_params.sample_rate;

    let decode_start = Instant::now();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(err) => {
                return Err(AsrError::Audio(format!(
                    "read error for {}: {err}",
                    path.display()
                )));
            }
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = sample_rate.or(Some(spec.rate));
                let channels = spec.channels.count();
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);

                if channels == 1 {
                    pcm.extend_from_slice(buf.samples());
                } else {
                    pcm.extend(crate::audio_processing::downmix_interleaved(
                        buf.samples(),
                        channels,
                    )?);
                }
            }
            Err(SymphoniaError::DecodeError(err)) => {
                log::warn!("skipping corrupt packet: {err}");
                continue;
            }
            Err(err) => {
                return Err(AsrError::Audio(format!(
                    "decode error for {}: {err}",
                    path.display()
                )));
            }
        }
    }

    let decode_elapsed = decode_start.elapsed();

    let sr = sample_rate
        .ok_or_else(|| AsrError::Audio(format!("missing sample rate for {}", path.display())))?;

    let (pcm, resample_elapsed) = if sr == target_rate {
        (pcm, None)
    } else {
        log::info!(
            "Resampling from {} Hz to {} Hz for {}",
            sr,
            target_rate,
            path.display()
        );
        let resample_start = Instant::now();
        let output = resample(&pcm, sr, target_rate)?;
        (output, Some(resample_start.elapsed()))
    };

    log::info!(
        "Loaded audio {} samples from {} at {} Hz (I/O+probe: {:?}, decode: {:?}, resample: {:?})",
        pcm.len(),
        path.display(),
        sr,
        io_start.elapsed(),
        decode_elapsed,
        resample_elapsed.unwrap_or_default()
    );

    Ok(pcm)
}
