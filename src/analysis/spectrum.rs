//! Short-time spectrum helpers shared by the spectral extractor and the
//! chroma chord classifier.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Reference tuning for pitch-class mapping
const A4_HZ: f32 = 440.0;

/// Pitch class index of A (C = 0)
const A_PITCH_CLASS: i32 = 9;

/// Periodic Hann window of length `n`
pub fn hann_window(n: usize) -> Vec<f32> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let phase = 2.0 * std::f32::consts::PI * i as f32 / n as f32;
            0.5 * (1.0 - phase.cos())
        })
        .collect()
}

/// Map a frequency to its nearest equal-tempered pitch class (C = 0)
pub fn pitch_class_of(freq_hz: f32) -> Option<usize> {
    if !(freq_hz.is_finite() && freq_hz > 0.0) {
        return None;
    }
    let semitones_from_a4 = (12.0 * (freq_hz / A4_HZ).log2()).round() as i32;
    Some((semitones_from_a4 + A_PITCH_CLASS).rem_euclid(12) as usize)
}

/// Magnitude spectrum computer with a fixed FFT size
///
/// Frames shorter than the FFT size are windowed then zero-padded; longer
/// frames are truncated to their centre.
pub struct MagnitudeSpectrum {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
}

impl MagnitudeSpectrum {
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(size),
            size,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of non-negative frequency bins
    pub fn bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Frequency in Hz of bin `k`
    pub fn bin_frequency(&self, k: usize, sample_rate: u32) -> f32 {
        k as f32 * sample_rate as f32 / self.size as f32
    }

    /// Hann-windowed magnitude spectrum of one frame
    pub fn compute(&self, frame: &[f32]) -> Vec<f32> {
        let frame = if frame.len() > self.size {
            let offset = (frame.len() - self.size) / 2;
            &frame[offset..offset + self.size]
        } else {
            frame
        };

        let window = hann_window(frame.len());
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.size];
        for (slot, (&x, &w)) in buffer.iter_mut().zip(frame.iter().zip(window.iter())) {
            *slot = Complex::new(x * w, 0.0);
        }

        self.fft.process(&mut buffer);
        buffer[..self.bins()].iter().map(|c| c.norm()).collect()
    }

    /// 12-bin chroma from a magnitude spectrum, summing power of bins whose
    /// frequency lies in `[min_hz, max_hz]`. Unnormalized.
    pub fn chroma(
        &self,
        magnitudes: &[f32],
        sample_rate: u32,
        min_hz: f32,
        max_hz: f32,
    ) -> [f32; 12] {
        let mut chroma = [0.0f32; 12];
        for (k, &m) in magnitudes.iter().enumerate().skip(1) {
            let freq = self.bin_frequency(k, sample_rate);
            if freq < min_hz || freq > max_hz {
                continue;
            }
            if let Some(pc) = pitch_class_of(freq) {
                chroma[pc] += m * m;
            }
        }
        chroma
    }
}

/// Root mean square of a frame
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|x| x * x).sum::<f32>() / frame.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pitch_class_mapping() {
        assert_eq!(pitch_class_of(440.0), Some(9));
        assert_eq!(pitch_class_of(261.63), Some(0));
        assert_eq!(pitch_class_of(392.0), Some(7));
        assert_eq!(pitch_class_of(466.16), Some(10));
        assert_eq!(pitch_class_of(0.0), None);
    }

    #[test]
    fn test_hann_window_endpoints() {
        let w = hann_window(8);
        assert_eq!(w.len(), 8);
        assert!(w[0].abs() < 1e-6);
        assert!((w[4] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let sr = 8000;
        let spectrum = MagnitudeSpectrum::new(1024);
        let frame: Vec<f32> = (0..1024)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sr as f32).sin())
            .collect();
        let mags = spectrum.compute(&frame);
        let peak = mags
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| k)
            .unwrap();
        assert_eq!(peak, 128);
    }

    #[test]
    fn test_rms() {
        assert_eq!(rms(&[]), 0.0);
        assert!((rms(&[1.0, -1.0, 1.0, -1.0]) - 1.0).abs() < 1e-6);
    }
}
