//! Audio decoding using symphonia
//!
//! Decodes an audio file once into mono f32 samples at the analysis rate.
//! Every downstream stage reads the same buffer.

use crate::error::ExtractionError;
use crate::types::AudioBuffer;
use rubato::{FftFixedInOut, Resampler};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Default analysis sample rate (22050 Hz)
///
/// Spectral descriptors and chroma only need content below ~11 kHz.
pub const TARGET_SAMPLE_RATE: u32 = 22050;

/// Maximum file size we'll attempt to decode (2GB)
const MAX_FILE_SIZE: u64 = 2 * 1024 * 1024 * 1024;

/// Rubato chunk size in input frames
const RESAMPLE_CHUNK: usize = 1024;

/// Decode an audio file to a mono buffer at `target_rate`
///
/// The returned buffer remembers the file's native rate in
/// `source_sample_rate`.
pub fn decode(path: &Path, target_rate: u32) -> Result<AudioBuffer, ExtractionError> {
    let fail = |reason: String| ExtractionError::decode(path, reason);

    let size = std::fs::metadata(path)
        .map_err(|e| fail(format!("Failed to read file metadata: {}", e)))?
        .len();
    if size > MAX_FILE_SIZE {
        return Err(fail(format!(
            "File too large ({:.1} GB). Maximum supported size is 2 GB.",
            size as f64 / (1024.0 * 1024.0 * 1024.0)
        )));
    }

    let file = std::fs::File::open(path).map_err(|e| fail(format!("Failed to open file: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| fail(format!("Failed to probe format: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| fail("No audio tracks found".to_string()))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let source_rate = codec_params
        .sample_rate
        .ok_or_else(|| fail("Audio track does not declare a sample rate".to_string()))?;
    let channels = codec_params.channels.map(|c| c.count()).unwrap_or(2);

    debug!(
        "Decoding: {} @ {}Hz, {} channels",
        path.display(),
        source_rate,
        channels
    );

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| fail(format!("Failed to create decoder: {}", e)))?;

    let mut mono: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(fail(format!("Failed to read packet: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                trace!("Skipping corrupted frame: {}", e);
                continue;
            }
            Err(e) => return Err(fail(format!("Decode error: {}", e))),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);
        mono.extend(to_mono(sample_buf.samples(), spec.channels.count()));
    }

    if mono.is_empty() {
        return Err(fail("File contains no audio samples".to_string()));
    }

    let samples = resample(&mono, source_rate, target_rate);
    let buffer = AudioBuffer::new(samples, target_rate).with_source_rate(source_rate);

    debug!(
        "Decoded {} samples ({:.2}s) at {}Hz",
        buffer.len(),
        buffer.duration,
        buffer.sample_rate
    );

    Ok(buffer)
}

/// Convert interleaved multi-channel audio to mono
fn to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Band-limited resampling using rubato's FFT resampler
///
/// Falls back to linear interpolation if rubato rejects the rate pair.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let mut resampler =
        match FftFixedInOut::<f32>::new(from_rate as usize, to_rate as usize, RESAMPLE_CHUNK, 1) {
            Ok(r) => r,
            Err(e) => {
                debug!("Rubato initialization failed ({}), using linear fallback", e);
                return resample_linear(samples, from_rate, to_rate);
            }
        };

    let frames_in = resampler.input_frames_next();
    let frames_out = resampler.output_frames_next();
    let ratio = to_rate as f64 / from_rate as f64;
    let expected_len = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected_len + frames_out);

    for (chunk_idx, chunk) in samples.chunks(frames_in).enumerate() {
        let mut block = chunk.to_vec();
        block.resize(frames_in, 0.0);

        match resampler.process(&[block], None) {
            Ok(mut channels) => output.append(&mut channels[0]),
            Err(e) => {
                debug!("Rubato processing error ({}), using linear fallback for the rest", e);
                let pos = chunk_idx * frames_in;
                output.truncate((pos as f64 * ratio) as usize);
                output.extend(resample_linear(&samples[pos..], from_rate, to_rate));
                break;
            }
        }
    }

    // Drop output produced from the zero padding of the final block
    output.truncate(expected_len);
    output
}

/// Linear interpolation resampler (may alias; fallback only)
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let step = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / step) as usize;
    let last = samples.len() - 1;

    (0..output_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let frac = (pos - idx as f64) as f32;
            let next = samples[(idx + 1).min(last)];
            samples[idx] * (1.0 - frac) + next * frac
        })
        .collect()
}
