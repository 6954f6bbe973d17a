//! Rhythm/tonal descriptors (secondary feature stage)
//!
//! Tempo and key come from stratum-dsp; loudness, dynamic complexity and
//! onset rate are computed here over the same decoded buffer.

use crate::analysis::spectrum::{rms, MagnitudeSpectrum};
use crate::analysis::traits::SecondaryFeatureExtractor;
use crate::error::ExtractionError;
use crate::types::{AudioBuffer, FeatureSet, Mode, PitchClass};
use stratum_dsp::{analyze_audio, AnalysisConfig, AnalysisError as StratumError, Key};
use tracing::{debug, warn};

/// Short-term loudness window in seconds
const LOUDNESS_WINDOW_SECS: f64 = 0.4;

/// Floor for dBFS conversion
const SILENCE_DB: f64 = -120.0;

/// Onset detection frame and hop
const ONSET_FFT: usize = 1024;
const ONSET_HOP: usize = 512;

/// Secondary extractor backed by stratum-dsp
pub struct StratumFeatureExtractor {
    spectrum: MagnitudeSpectrum,
}

impl StratumFeatureExtractor {
    pub fn new() -> Self {
        Self {
            spectrum: MagnitudeSpectrum::new(ONSET_FFT),
        }
    }

    /// Detected onsets per second
    fn onset_rate(&self, buffer: &AudioBuffer) -> f64 {
        if buffer.duration <= 0.0 || buffer.len() < ONSET_FFT {
            return 0.0;
        }

        let mut flux = Vec::with_capacity(buffer.len() / ONSET_HOP);
        let mut previous: Option<Vec<f32>> = None;
        for frame in buffer.samples.windows(ONSET_FFT).step_by(ONSET_HOP) {
            let mags = self.spectrum.compute(frame);
            let value = previous.as_ref().map_or(0.0, |prev| {
                mags.iter()
                    .zip(prev.iter())
                    .map(|(m, p)| (m - p).max(0.0) as f64)
                    .sum::<f64>()
            });
            flux.push(value);
            previous = Some(mags);
        }

        let onsets = pick_peaks(&flux);
        onsets as f64 / buffer.duration
    }
}

impl Default for StratumFeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl SecondaryFeatureExtractor for StratumFeatureExtractor {
    fn extract(&self, buffer: &AudioBuffer) -> Result<FeatureSet, ExtractionError> {
        debug!(
            "Analyzing rhythm/tonality with stratum-dsp ({} samples, {}Hz)",
            buffer.len(),
            buffer.sample_rate
        );

        let mut features = FeatureSet::new();
        features.insert_scalar("loudness", loudness_dbfs(&buffer.samples));
        features.insert_scalar("dynamic_complexity", dynamic_complexity(buffer));
        features.insert_scalar("onset_rate", self.onset_rate(buffer));

        let result = match analyze_audio(
            &buffer.samples,
            buffer.sample_rate,
            AnalysisConfig::default(),
        ) {
            Ok(result) => result,
            Err(e) if is_silent_audio(&e) => {
                warn!("Audio is silent; skipping tempo and key detection");
                return Ok(features);
            }
            Err(e) => {
                return Err(ExtractionError::Backend {
                    extractor: self.name(),
                    reason: e.to_string(),
                })
            }
        };

        let (tonic, mode) = match result.key {
            Key::Major(idx) => (PitchClass::from_index(idx as u8), Mode::Major),
            Key::Minor(idx) => (PitchClass::from_index(idx as u8), Mode::Minor),
        };
        let tonic = tonic.ok_or_else(|| ExtractionError::Backend {
            extractor: self.name(),
            reason: "key index out of range".to_string(),
        })?;

        features.insert_scalar("bpm", result.bpm as f64);
        features.insert_scalar("bpm_confidence", result.bpm_confidence as f64);
        features.insert_label("key_key", tonic.to_standard_notation());
        features.insert_label(
            "key_scale",
            match mode {
                Mode::Major => "major",
                Mode::Minor => "minor",
            },
        );
        features.insert_scalar("key_strength", result.key_confidence as f64);

        debug!(
            "Detected {:.1} BPM, key {} {:?}",
            result.bpm, tonic, mode
        );

        Ok(features)
    }

    fn name(&self) -> &'static str {
        "stratum-dsp"
    }
}

/// stratum-dsp rejects input that is silent after trimming
fn is_silent_audio(err: &StratumError) -> bool {
    matches!(err, StratumError::ProcessingError(msg) if msg.contains("silent"))
}

fn to_db(amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        (20.0 * amplitude.log10()).max(SILENCE_DB)
    } else {
        SILENCE_DB
    }
}

/// Whole-track RMS level in dBFS
fn loudness_dbfs(samples: &[f32]) -> f64 {
    to_db(rms(samples) as f64)
}

/// Standard deviation (dB) of short-term loudness over non-silent windows
fn dynamic_complexity(buffer: &AudioBuffer) -> f64 {
    let window = (buffer.sample_rate as f64 * LOUDNESS_WINDOW_SECS) as usize;
    if window == 0 {
        return 0.0;
    }

    let levels: Vec<f64> = buffer
        .samples
        .chunks(window)
        .map(|chunk| to_db(rms(chunk) as f64))
        .filter(|db| *db > SILENCE_DB)
        .collect();
    if levels.len() < 2 {
        return 0.0;
    }

    let mean = levels.iter().sum::<f64>() / levels.len() as f64;
    let variance = levels.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / levels.len() as f64;
    variance.sqrt()
}

/// Count local maxima of an onset envelope above mean + one std-dev
fn pick_peaks(envelope: &[f64]) -> usize {
    if envelope.len() < 3 {
        return 0;
    }
    let n = envelope.len() as f64;
    let mean = envelope.iter().sum::<f64>() / n;
    let std = (envelope.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    let threshold = mean + std;

    envelope
        .windows(3)
        .filter(|w| w[1] > threshold && w[1] > w[0] && w[1] >= w[2])
        .count()
}
