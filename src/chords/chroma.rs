//! Chroma template chord classifier
//!
//! Folds a Hann-windowed magnitude spectrum into 12 pitch-class bins and
//! scores it against the 24 binary major/minor triad templates. The best
//! template by cosine similarity wins; silent or ambiguous frames decode as
//! no-chord.

use crate::analysis::spectrum::{rms, MagnitudeSpectrum};
use crate::analysis::traits::{ChordClassifier, FrameClassification};
use crate::error::RecognitionError;
use crate::types::{ChordLabel, ChordQuality, PitchClass};

/// FFT size; frames are truncated or zero-padded to this length
pub const CHROMA_FFT_SIZE: usize = 4096;

/// Lowest frequency folded into chroma (A1)
const MIN_HZ: f32 = 55.0;

/// Highest frequency folded into chroma
const MAX_HZ: f32 = 2000.0;

/// Below this cosine similarity no triad is considered a match
const MIN_SIMILARITY: f32 = 0.6;

/// Intervals (semitones above the root) of each triad quality
const TRIAD_INTERVALS: [(ChordQuality, [usize; 3]); 2] = [
    (ChordQuality::Maj, [0, 4, 7]),
    (ChordQuality::Min, [0, 3, 7]),
];

/// Binary triad template
struct Template {
    label: ChordLabel,
    notes: [usize; 3],
}

/// Frame classifier over 12-bin chroma
pub struct ChromaTemplateClassifier {
    spectrum: MagnitudeSpectrum,
    templates: Vec<Template>,
    silence_rms: f32,
}

impl ChromaTemplateClassifier {
    pub fn new(silence_rms: f32) -> Self {
        let mut templates = Vec::with_capacity(24);
        for (quality, intervals) in TRIAD_INTERVALS {
            for root in 0..12u8 {
                let Some(pitch) = PitchClass::from_index(root) else {
                    continue;
                };
                templates.push(Template {
                    label: ChordLabel::Triad {
                        root: pitch,
                        quality,
                    },
                    notes: intervals.map(|i| (root as usize + i) % 12),
                });
            }
        }

        Self {
            spectrum: MagnitudeSpectrum::new(CHROMA_FFT_SIZE),
            templates,
            silence_rms,
        }
    }

    /// Best triad for a chroma vector, or no-chord
    fn match_chroma(&self, chroma: &[f32; 12]) -> ChordLabel {
        let norm = chroma.iter().map(|c| c * c).sum::<f32>().sqrt();
        if norm <= f32::EPSILON {
            return ChordLabel::NoChord;
        }

        // Binary template with three ones has norm sqrt(3)
        let template_norm = 3.0f32.sqrt();
        let mut best = (ChordLabel::NoChord, MIN_SIMILARITY);
        for template in &self.templates {
            let dot: f32 = template.notes.iter().map(|&n| chroma[n]).sum();
            let similarity = dot / (norm * template_norm);
            if similarity > best.1 {
                best = (template.label, similarity);
            }
        }
        best.0
    }
}

impl Default for ChromaTemplateClassifier {
    fn default() -> Self {
        Self::new(crate::config::ChordSettings::default().silence_rms)
    }
}

impl ChordClassifier for ChromaTemplateClassifier {
    fn classify(
        &self,
        frame: &[f32],
        sample_rate: u32,
    ) -> Result<FrameClassification, RecognitionError> {
        if sample_rate == 0 {
            return Err(RecognitionError::InvalidSampleRate(sample_rate));
        }
        if rms(frame) < self.silence_rms {
            return Ok(ChordLabel::NoChord.into());
        }

        let mags = self.spectrum.compute(frame);
        let chroma = self.spectrum.chroma(&mags, sample_rate, MIN_HZ, MAX_HZ);
        Ok(self.match_chroma(&chroma).into())
    }

    fn name(&self) -> &'static str {
        "chroma-template"
    }
}
