//! Spectral/timbral descriptors (primary feature stage)
//!
//! Decodes the input once and computes per-frame descriptors over centred
//! STFT frames:
//! - spectral centroid, bandwidth, rolloff (85%) and flatness
//! - zero-crossing rate and RMS energy
//! - onset strength (positive spectral flux)
//! - 12-bin chroma as a `12 x frames` matrix
//! - 128-band mel spectrogram in dB (relative to its peak), 13 MFCCs and
//!   7-row spectral contrast, all as `bands x frames` matrices
//!
//! Each series also gets a `<name>_mean` scalar.

use crate::analysis::mel::{self, MelFilterbank, SpectralContrast, N_MELS, N_MFCC};
use crate::analysis::spectrum::{rms, MagnitudeSpectrum};
use crate::analysis::traits::{PrimaryExtraction, PrimaryFeatureExtractor};
use crate::audio;
use crate::error::ExtractionError;
use crate::types::{AudioBuffer, FeatureSet};
use std::path::Path;
use tracing::debug;

/// STFT size
pub const N_FFT: usize = 2048;

/// STFT hop
pub const HOP_LENGTH: usize = 512;

/// Fraction of spectral energy below the rolloff frequency
const ROLLOFF_PERCENT: f32 = 0.85;

/// Lowest frequency folded into chroma (A0)
const CHROMA_MIN_HZ: f32 = 27.5;

const EPSILON: f32 = 1e-10;

/// Primary extractor over a Hann-windowed STFT
pub struct SpectralFeatureExtractor {
    sample_rate: u32,
    min_duration_secs: f64,
    spectrum: MagnitudeSpectrum,
}

impl SpectralFeatureExtractor {
    pub fn new(sample_rate: u32, min_duration_secs: f64) -> Self {
        Self {
            sample_rate,
            min_duration_secs,
            spectrum: MagnitudeSpectrum::new(N_FFT),
        }
    }

    /// Compute descriptors for an already-decoded buffer
    pub fn features_for(&self, audio: &AudioBuffer) -> FeatureSet {
        let sr = audio.sample_rate;
        let samples = &audio.samples;
        let frame_count = samples.len() / HOP_LENGTH + 1;

        let mut series = FrameSeries::with_capacity(frame_count);
        let mut chroma: Vec<Vec<f64>> = vec![Vec::with_capacity(frame_count); 12];
        let filterbank = MelFilterbank::new(N_MELS, N_FFT, sr);
        let contrast = SpectralContrast::new(N_FFT, sr);
        let mut mel_power: Vec<Vec<f64>> = vec![Vec::with_capacity(frame_count); N_MELS];
        let mut contrast_rows: Vec<Vec<f64>> =
            vec![Vec::with_capacity(frame_count); contrast.rows()];
        let mut previous: Option<Vec<f32>> = None;

        for t in 0..frame_count {
            let frame = centred_frame(samples, t * HOP_LENGTH, N_FFT);
            let mags = self.spectrum.compute(&frame);

            let (centroid, bandwidth) = self.centroid_and_bandwidth(&mags, sr);
            series.centroid.push(centroid as f64);
            series.bandwidth.push(bandwidth as f64);
            series.rolloff.push(self.rolloff(&mags, sr) as f64);
            series.flatness.push(flatness(&mags) as f64);
            series.zcr.push(zero_crossing_rate(&frame) as f64);
            series.rms.push(rms(&frame) as f64);

            let flux = match &previous {
                Some(prev) => mags
                    .iter()
                    .zip(prev.iter())
                    .map(|(m, p)| (m - p).max(0.0))
                    .sum::<f32>(),
                None => 0.0,
            };
            series.onset.push(flux as f64);

            let bins = self
                .spectrum
                .chroma(&mags, sr, CHROMA_MIN_HZ, sr as f32 / 2.0);
            let peak = bins.iter().cloned().fold(0.0f32, f32::max);
            for (pc, value) in bins.iter().enumerate() {
                let normalized = if peak > EPSILON { value / peak } else { 0.0 };
                chroma[pc].push(normalized as f64);
            }

            for (row, value) in mel_power.iter_mut().zip(filterbank.apply(&mags)) {
                row.push(value);
            }
            for (row, value) in contrast_rows.iter_mut().zip(contrast.compute(&mags)) {
                row.push(value);
            }

            previous = Some(mags);
        }

        let mut features = FeatureSet::new();
        for (name, values) in series.into_named() {
            features.insert_scalar(format!("{}_mean", name), mean(&values));
            features.insert_series(name, values);
        }
        features.insert_matrix("chroma_stft", chroma);
        features.insert_matrix("mfcc", mel::cepstrum(&mel::power_to_db(&mel_power, 1.0), N_MFCC));
        features.insert_matrix(
            "mel_spectrogram",
            mel::power_to_db(&mel_power, mel::matrix_max(&mel_power)),
        );
        features.insert_matrix("spectral_contrast", contrast_rows);
        features.insert_scalar("hop_length", HOP_LENGTH as f64);
        features.insert_scalar("n_fft", N_FFT as f64);
        features.insert_scalar("frame_count", frame_count as f64);
        features
    }

    fn centroid_and_bandwidth(&self, mags: &[f32], sr: u32) -> (f32, f32) {
        let total: f32 = mags.iter().sum();
        if total <= EPSILON {
            return (0.0, 0.0);
        }
        let centroid = mags
            .iter()
            .enumerate()
            .map(|(k, m)| self.spectrum.bin_frequency(k, sr) * m)
            .sum::<f32>()
            / total;
        let spread = mags
            .iter()
            .enumerate()
            .map(|(k, m)| {
                let d = self.spectrum.bin_frequency(k, sr) - centroid;
                m * d * d
            })
            .sum::<f32>()
            / total;
        (centroid, spread.sqrt())
    }

    fn rolloff(&self, mags: &[f32], sr: u32) -> f32 {
        let total: f32 = mags.iter().sum();
        if total <= EPSILON {
            return 0.0;
        }
        let threshold = ROLLOFF_PERCENT * total;
        let mut cumulative = 0.0f32;
        for (k, m) in mags.iter().enumerate() {
            cumulative += m;
            if cumulative >= threshold {
                return self.spectrum.bin_frequency(k, sr);
            }
        }
        self.spectrum.bin_frequency(mags.len().saturating_sub(1), sr)
    }
}

impl PrimaryFeatureExtractor for SpectralFeatureExtractor {
    fn extract(&self, path: &Path) -> Result<PrimaryExtraction, ExtractionError> {
        let audio = audio::decode(path, self.sample_rate)?;

        if audio.duration < self.min_duration_secs {
            return Err(ExtractionError::TooShort {
                duration: audio.duration,
                minimum: self.min_duration_secs,
            });
        }

        let features = self.features_for(&audio);
        debug!(
            "Extracted {} spectral descriptors from {:.1}s of audio",
            features.len(),
            audio.duration
        );

        Ok(PrimaryExtraction { features, audio })
    }

    fn name(&self) -> &'static str {
        "spectral"
    }
}

#[derive(Default)]
struct FrameSeries {
    centroid: Vec<f64>,
    bandwidth: Vec<f64>,
    rolloff: Vec<f64>,
    flatness: Vec<f64>,
    zcr: Vec<f64>,
    rms: Vec<f64>,
    onset: Vec<f64>,
}

impl FrameSeries {
    fn with_capacity(n: usize) -> Self {
        Self {
            centroid: Vec::with_capacity(n),
            bandwidth: Vec::with_capacity(n),
            rolloff: Vec::with_capacity(n),
            flatness: Vec::with_capacity(n),
            zcr: Vec::with_capacity(n),
            rms: Vec::with_capacity(n),
            onset: Vec::with_capacity(n),
        }
    }

    fn into_named(self) -> [(&'static str, Vec<f64>); 7] {
        [
            ("spectral_centroid", self.centroid),
            ("spectral_bandwidth", self.bandwidth),
            ("spectral_rolloff", self.rolloff),
            ("spectral_flatness", self.flatness),
            ("zero_crossing_rate", self.zcr),
            ("rms", self.rms),
            ("onset_strength", self.onset),
        ]
    }
}

/// Frame of `len` samples centred on `centre`, zero-padded past either edge
fn centred_frame(samples: &[f32], centre: usize, len: usize) -> Vec<f32> {
    let half = len / 2;
    (0..len)
        .map(|i| {
            (centre + i)
                .checked_sub(half)
                .and_then(|idx| samples.get(idx))
                .copied()
                .unwrap_or(0.0)
        })
        .collect()
}

/// Geometric over arithmetic mean of the power spectrum
fn flatness(mags: &[f32]) -> f32 {
    if mags.is_empty() {
        return 0.0;
    }
    let n = mags.len() as f32;
    let powers = mags.iter().map(|m| m * m + EPSILON);
    let (log_sum, sum) = powers.fold((0.0f32, 0.0f32), |(l, s), p| (l + p.ln(), s + p));
    (log_sum / n).exp() / (sum / n)
}

fn zero_crossing_rate(frame: &[f32]) -> f32 {
    if frame.len() < 2 {
        return 0.0;
    }
    let crossings = frame
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f32 / frame.len() as f32
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
