//! Mel-scale and band-contrast descriptors over a magnitude spectrum.
//!
//! Conventions match the common librosa defaults: Slaney mel scale with
//! area-normalized triangular filters, dB conversion floored at `top_db`
//! below the reference, orthonormal DCT-II for cepstra, and octave bands
//! from 200 Hz for spectral contrast.

/// Mel bands in the filterbank
pub const N_MELS: usize = 128;

/// Cepstral coefficients kept per frame
pub const N_MFCC: usize = 13;

/// Octave bands for spectral contrast (the matrix has one more row)
pub const N_CONTRAST_BANDS: usize = 6;

/// Lower edge of the first contrast band in Hz
const CONTRAST_FMIN_HZ: f32 = 200.0;

/// Fraction of each band averaged for its peak and valley
const CONTRAST_QUANTILE: f32 = 0.02;

/// Dynamic range kept by dB conversion
const TOP_DB: f64 = 80.0;

const AMIN: f64 = 1e-10;

// Slaney mel scale: linear below 1 kHz, logarithmic above
const F_SP: f32 = 200.0 / 3.0;
const MIN_LOG_HZ: f32 = 1000.0;
const MIN_LOG_MEL: f32 = MIN_LOG_HZ / F_SP;

fn log_step() -> f32 {
    6.4f32.ln() / 27.0
}

pub fn hz_to_mel(hz: f32) -> f32 {
    if hz < MIN_LOG_HZ {
        hz / F_SP
    } else {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / log_step()
    }
}

pub fn mel_to_hz(mel: f32) -> f32 {
    if mel < MIN_LOG_MEL {
        mel * F_SP
    } else {
        MIN_LOG_HZ * (log_step() * (mel - MIN_LOG_MEL)).exp()
    }
}

/// One triangular filter: first non-zero bin and its weights
struct Filter {
    start: usize,
    weights: Vec<f32>,
}

/// Triangular mel filterbank from 0 Hz to Nyquist
pub struct MelFilterbank {
    filters: Vec<Filter>,
}

impl MelFilterbank {
    /// Filterbank for an FFT of `n_fft` points at `sample_rate`
    pub fn new(n_mels: usize, n_fft: usize, sample_rate: u32) -> Self {
        let n_bins = n_fft / 2 + 1;
        let nyquist = sample_rate as f32 / 2.0;
        let max_mel = hz_to_mel(nyquist);

        let edges: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(max_mel * i as f32 / (n_mels + 1) as f32))
            .collect();
        let bin_hz = |k: usize| k as f32 * sample_rate as f32 / n_fft as f32;

        let filters = (0..n_mels)
            .map(|m| {
                let (lo, centre, hi) = (edges[m], edges[m + 1], edges[m + 2]);
                let norm = 2.0 / (hi - lo).max(f32::EPSILON);
                let mut start = None;
                let mut weights = Vec::new();
                for k in 0..n_bins {
                    let f = bin_hz(k);
                    let rising = (f - lo) / (centre - lo).max(f32::EPSILON);
                    let falling = (hi - f) / (hi - centre).max(f32::EPSILON);
                    let w = rising.min(falling).max(0.0) * norm;
                    if w > 0.0 {
                        start.get_or_insert(k);
                        weights.push(w);
                    } else if start.is_some() {
                        break;
                    }
                }
                Filter {
                    start: start.unwrap_or(0),
                    weights,
                }
            })
            .collect();

        Self { filters }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    /// Mel-band power of one frame from its magnitude spectrum
    pub fn apply(&self, magnitudes: &[f32]) -> Vec<f64> {
        self.filters
            .iter()
            .map(|filter| {
                filter
                    .weights
                    .iter()
                    .zip(magnitudes.iter().skip(filter.start))
                    .map(|(w, m)| (w * m * m) as f64)
                    .sum()
            })
            .collect()
    }
}

/// Convert a `bands x frames` power matrix to dB relative to `reference`,
/// clipped to `TOP_DB` below its maximum
pub fn power_to_db(power: &[Vec<f64>], reference: f64) -> Vec<Vec<f64>> {
    let ref_db = 10.0 * reference.max(AMIN).log10();
    let mut db: Vec<Vec<f64>> = power
        .iter()
        .map(|row| {
            row.iter()
                .map(|p| 10.0 * p.max(AMIN).log10() - ref_db)
                .collect()
        })
        .collect();

    let peak = db
        .iter()
        .flatten()
        .cloned()
        .fold(f64::NEG_INFINITY, f64::max);
    if peak.is_finite() {
        let floor = peak - TOP_DB;
        for value in db.iter_mut().flatten() {
            *value = value.max(floor);
        }
    }
    db
}

/// Largest value of a matrix, 0 when empty
pub fn matrix_max(matrix: &[Vec<f64>]) -> f64 {
    matrix.iter().flatten().cloned().fold(0.0, f64::max)
}

/// First `n_coeffs` orthonormal DCT-II coefficients of every column of a
/// `bands x frames` dB matrix
pub fn cepstrum(log_mel: &[Vec<f64>], n_coeffs: usize) -> Vec<Vec<f64>> {
    let n = log_mel.len();
    let frames = log_mel.first().map_or(0, Vec::len);
    if n == 0 {
        return vec![vec![0.0; frames]; n_coeffs];
    }

    let basis: Vec<Vec<f64>> = (0..n_coeffs)
        .map(|k| {
            let scale = if k == 0 {
                (1.0 / n as f64).sqrt()
            } else {
                (2.0 / n as f64).sqrt()
            };
            (0..n)
                .map(|i| {
                    let angle = std::f64::consts::PI * k as f64 * (2 * i + 1) as f64
                        / (2 * n) as f64;
                    scale * angle.cos()
                })
                .collect()
        })
        .collect();

    basis
        .iter()
        .map(|coeffs| {
            (0..frames)
                .map(|t| {
                    coeffs
                        .iter()
                        .zip(log_mel.iter())
                        .map(|(c, row)| c * row[t])
                        .sum()
                })
                .collect()
        })
        .collect()
}

/// Octave-band peak/valley contrast of one frame, `N_CONTRAST_BANDS + 1`
/// values in dB
pub struct SpectralContrast {
    bands: Vec<(usize, usize)>,
}

impl SpectralContrast {
    pub fn new(n_fft: usize, sample_rate: u32) -> Self {
        let n_bins = n_fft / 2 + 1;
        let bin_hz = |k: usize| k as f32 * sample_rate as f32 / n_fft as f32;

        let mut edges = vec![0.0f32];
        edges.extend((0..=N_CONTRAST_BANDS).map(|i| CONTRAST_FMIN_HZ * 2f32.powi(i as i32)));

        let bands = (0..=N_CONTRAST_BANDS)
            .map(|b| {
                let (low, high) = (edges[b], edges[b + 1]);
                let first = (0..n_bins).find(|&k| bin_hz(k) >= low).unwrap_or(n_bins);
                let start = if b > 0 { first.saturating_sub(1) } else { first };
                let end = if b == N_CONTRAST_BANDS {
                    n_bins
                } else {
                    // upper edge belongs to the next band
                    (0..n_bins)
                        .take_while(|&k| bin_hz(k) <= high)
                        .last()
                        .unwrap_or(0)
                };
                (start, end.max(start))
            })
            .collect();

        Self { bands }
    }

    pub fn compute(&self, magnitudes: &[f32]) -> Vec<f64> {
        self.bands
            .iter()
            .map(|&(start, end)| {
                let end = end.min(magnitudes.len());
                if start >= end {
                    return 0.0;
                }
                let mut band: Vec<f32> = magnitudes[start..end].to_vec();
                band.sort_by(f32::total_cmp);
                let take = ((CONTRAST_QUANTILE * band.len() as f32).round() as usize)
                    .clamp(1, band.len());
                let valley = band[..take].iter().sum::<f32>() as f64 / take as f64;
                let peak = band[band.len() - take..].iter().sum::<f32>() as f64 / take as f64;
                10.0 * peak.max(AMIN).log10() - 10.0 * valley.max(AMIN).log10()
            })
            .collect()
    }

    pub fn rows(&self) -> usize {
        self.bands.len()
    }
}
