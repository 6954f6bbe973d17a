//! Core data types for chordscope
//!
//! These types represent the domain model and flow through the pipeline.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// =============================================================================
// Musical primitives
// =============================================================================

/// The 12 pitch classes in Western music
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PitchClass {
    C,
    #[serde(rename = "C#")]
    Cs, // C#/Db
    D,
    #[serde(rename = "D#")]
    Ds, // D#/Eb
    E,
    F,
    #[serde(rename = "F#")]
    Fs, // F#/Gb
    G,
    #[serde(rename = "G#")]
    Gs, // G#/Ab
    A,
    #[serde(rename = "A#")]
    As, // A#/Bb
    B,
}

impl PitchClass {
    /// Convert from numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(PitchClass::C),
            1 => Some(PitchClass::Cs),
            2 => Some(PitchClass::D),
            3 => Some(PitchClass::Ds),
            4 => Some(PitchClass::E),
            5 => Some(PitchClass::F),
            6 => Some(PitchClass::Fs),
            7 => Some(PitchClass::G),
            8 => Some(PitchClass::Gs),
            9 => Some(PitchClass::A),
            10 => Some(PitchClass::As),
            11 => Some(PitchClass::B),
            _ => None,
        }
    }

    /// Convert to numeric index (0 = C, 1 = C#, ..., 11 = B)
    pub fn to_index(self) -> u8 {
        self as u8
    }

    /// Standard notation using sharps (e.g., "C", "F#")
    pub fn to_standard_notation(self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        }
    }

    /// Parse a note name; accepts sharps and flats ("F#", "Gb", "Bb")
    pub fn from_notation(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let base = match chars.next()?.to_ascii_uppercase() {
            'C' => 0i8,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let offset = match chars.as_str() {
            "" => 0i8,
            "#" | "s" => 1,
            "b" => -1,
            _ => return None,
        };
        Self::from_index((base + offset).rem_euclid(12) as u8)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_standard_notation())
    }
}

/// Major or Minor scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Major,
    Minor,
}

/// Triad quality in the chord vocabulary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChordQuality {
    Maj,
    Min,
}

impl ChordQuality {
    pub fn suffix(self) -> &'static str {
        match self {
            ChordQuality::Maj => "maj",
            ChordQuality::Min => "min",
        }
    }

    /// Mode implied by treating a chord of this quality as the tonic
    pub fn mode(self) -> Mode {
        match self {
            ChordQuality::Maj => Mode::Major,
            ChordQuality::Min => Mode::Minor,
        }
    }
}

// =============================================================================
// Chord labels
// =============================================================================

/// Number of labels in the closed chord vocabulary (24 triads + no-chord)
pub const CHORD_VOCABULARY_SIZE: usize = 25;

/// Class index of the no-chord label
pub const NO_CHORD_INDEX: u8 = 24;

/// One of the 24 major/minor triads, or `N` (no chord)
///
/// Serialized as `"C:maj"`, `"A#:min"` or `"N"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ChordLabel {
    Triad {
        root: PitchClass,
        quality: ChordQuality,
    },
    NoChord,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid chord label '{0}' (expected e.g. \"C:maj\", \"A#:min\" or \"N\")")]
pub struct ParseChordError(pub String);

impl ChordLabel {
    pub fn major(root: PitchClass) -> Self {
        ChordLabel::Triad {
            root,
            quality: ChordQuality::Maj,
        }
    }

    pub fn minor(root: PitchClass) -> Self {
        ChordLabel::Triad {
            root,
            quality: ChordQuality::Min,
        }
    }

    /// Map a class index to a label: 0-11 major on C..B, 12-23 minor, 24 no-chord
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0..=11 => PitchClass::from_index(index).map(Self::major),
            12..=23 => PitchClass::from_index(index - 12).map(Self::minor),
            NO_CHORD_INDEX => Some(ChordLabel::NoChord),
            _ => None,
        }
    }

    /// Inverse of [`ChordLabel::from_index`]
    pub fn index(self) -> u8 {
        match self {
            ChordLabel::Triad {
                root,
                quality: ChordQuality::Maj,
            } => root.to_index(),
            ChordLabel::Triad {
                root,
                quality: ChordQuality::Min,
            } => 12 + root.to_index(),
            ChordLabel::NoChord => NO_CHORD_INDEX,
        }
    }

    /// All 25 labels in class-index order
    pub fn all() -> impl Iterator<Item = ChordLabel> {
        (0..CHORD_VOCABULARY_SIZE as u8).filter_map(Self::from_index)
    }

    pub fn root(self) -> Option<PitchClass> {
        match self {
            ChordLabel::Triad { root, .. } => Some(root),
            ChordLabel::NoChord => None,
        }
    }

    pub fn quality(self) -> Option<ChordQuality> {
        match self {
            ChordLabel::Triad { quality, .. } => Some(quality),
            ChordLabel::NoChord => None,
        }
    }

    pub fn is_no_chord(self) -> bool {
        matches!(self, ChordLabel::NoChord)
    }
}

impl fmt::Display for ChordLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChordLabel::Triad { root, quality } => write!(f, "{}:{}", root, quality.suffix()),
            ChordLabel::NoChord => f.write_str("N"),
        }
    }
}

impl FromStr for ChordLabel {
    type Err = ParseChordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed == "N" {
            return Ok(ChordLabel::NoChord);
        }

        let (root, quality) = trimmed
            .split_once(':')
            .ok_or_else(|| ParseChordError(s.to_string()))?;
        let root = PitchClass::from_notation(root).ok_or_else(|| ParseChordError(s.to_string()))?;
        let quality = match quality {
            "maj" => ChordQuality::Maj,
            "min" => ChordQuality::Min,
            _ => return Err(ParseChordError(s.to_string())),
        };

        Ok(ChordLabel::Triad { root, quality })
    }
}

impl From<ChordLabel> for String {
    fn from(label: ChordLabel) -> Self {
        label.to_string()
    }
}

impl TryFrom<String> for ChordLabel {
    type Error = ParseChordError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

// =============================================================================
// Chord progression
// =============================================================================

/// A timed, merged run of identical frame labels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChordEvent {
    /// Segment start in seconds
    pub start_time: f64,
    pub chord: ChordLabel,
    /// Segment length in seconds
    pub duration: f64,
    /// Confidence score (0.0 - 1.0)
    pub confidence: f64,
}

impl ChordEvent {
    pub fn end_time(&self) -> f64 {
        self.start_time + self.duration
    }
}

/// Chord progression with derived statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChordProgressionSummary {
    /// Chronological, non-overlapping events
    pub events: Vec<ChordEvent>,
    /// One label per event
    pub sequence: Vec<ChordLabel>,
    pub unique_chords: BTreeSet<ChordLabel>,
    /// Ordered-pair transition counts, serialized as `"C:maj -> G:maj": n`
    #[serde(with = "transition_map")]
    pub transitions: BTreeMap<(ChordLabel, ChordLabel), usize>,
    pub most_common_chord: Option<ChordLabel>,
    /// Heuristic tonic: root of the most common chord. Not a key-profile
    /// estimate; treat as an approximation.
    pub key: Option<PitchClass>,
    pub mode: Option<Mode>,
    pub confidence_mean: f64,
    /// Name of the frame classifier that produced the labels
    pub analyzer: String,
}

impl ChordProgressionSummary {
    /// Total number of transitions (equals `sequence.len() - 1` for non-empty input)
    pub fn transition_count(&self) -> usize {
        self.transitions.values().sum()
    }

    /// Sum of event durations in seconds
    pub fn total_duration(&self) -> f64 {
        self.events.iter().map(|e| e.duration).sum()
    }
}

mod transition_map {
    use super::ChordLabel;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::BTreeMap;

    const SEPARATOR: &str = " -> ";

    pub fn serialize<S: Serializer>(
        transitions: &BTreeMap<(ChordLabel, ChordLabel), usize>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let keyed: BTreeMap<String, usize> = transitions
            .iter()
            .map(|((from, to), count)| (format!("{}{}{}", from, SEPARATOR, to), *count))
            .collect();
        keyed.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<(ChordLabel, ChordLabel), usize>, D::Error> {
        let keyed = BTreeMap::<String, usize>::deserialize(deserializer)?;
        keyed
            .into_iter()
            .map(|(key, count)| {
                let (from, to) = key
                    .split_once(SEPARATOR)
                    .ok_or_else(|| D::Error::custom(format!("invalid transition key '{}'", key)))?;
                let from = from.parse().map_err(D::Error::custom)?;
                let to = to.parse().map_err(D::Error::custom)?;
                Ok(((from, to), count))
            })
            .collect()
    }
}

// =============================================================================
// Feature sets
// =============================================================================

/// A single named descriptor: scalar aggregate, per-frame series, or
/// multi-band per-frame matrix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Scalar(f64),
    Series(Vec<f64>),
    Matrix(Vec<Vec<f64>>),
    Label(String),
}

/// Opaque name -> descriptor mapping produced by a feature extractor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor. JSON has no NaN or infinity, so a non-finite
    /// scalar is dropped and non-finite series/matrix entries become 0.
    pub fn insert(&mut self, name: impl Into<String>, value: FeatureValue) {
        let value = match value {
            FeatureValue::Scalar(v) if !v.is_finite() => return,
            FeatureValue::Series(mut series) => {
                zero_non_finite(&mut series);
                FeatureValue::Series(series)
            }
            FeatureValue::Matrix(mut matrix) => {
                matrix.iter_mut().for_each(|row| zero_non_finite(row));
                FeatureValue::Matrix(matrix)
            }
            other => other,
        };
        self.values.insert(name.into(), value);
    }

    pub fn insert_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.insert(name, FeatureValue::Scalar(value));
    }

    pub fn insert_series(&mut self, name: impl Into<String>, series: Vec<f64>) {
        self.insert(name, FeatureValue::Series(series));
    }

    pub fn insert_matrix(&mut self, name: impl Into<String>, matrix: Vec<Vec<f64>>) {
        self.insert(name, FeatureValue::Matrix(matrix));
    }

    pub fn insert_label(&mut self, name: impl Into<String>, label: impl Into<String>) {
        self.insert(name, FeatureValue::Label(label.into()));
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.values.get(name)
    }

    pub fn scalar(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(FeatureValue::Scalar(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn series(&self, name: &str) -> Option<&[f64]> {
        match self.values.get(name) {
            Some(FeatureValue::Series(v)) => Some(v),
            _ => None,
        }
    }

    pub fn label(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(FeatureValue::Label(v)) => Some(v),
            _ => None,
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn zero_non_finite(values: &mut [f64]) {
    for v in values.iter_mut().filter(|v| !v.is_finite()) {
        *v = 0.0;
    }
}

// =============================================================================
// Transcription
// =============================================================================

/// Time-aligned transcript segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub id: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_speech_prob: Option<f64>,
}

/// Lyric transcription produced by a speech-to-text provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptionResult {
    pub text: String,
    pub language: Option<String>,
    pub segments: Vec<TranscriptSegment>,
    pub confidence_mean: Option<f64>,
    /// Provider model identifier
    pub model: String,
    /// Wall-clock seconds spent in the provider call
    pub processing_time: f64,
}

// =============================================================================
// Track representation
// =============================================================================

/// Metadata extracted from audio file tags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
}

/// Where the analyzed file came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioSource {
    #[default]
    Upload,
    GoogleDrive,
    Local,
}

impl AudioSource {
    pub fn as_str(self) -> &'static str {
        match self {
            AudioSource::Upload => "upload",
            AudioSource::GoogleDrive => "google_drive",
            AudioSource::Local => "local",
        }
    }
}

impl fmt::Display for AudioSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "upload" => Ok(AudioSource::Upload),
            "google_drive" | "gdrive" => Ok(AudioSource::GoogleDrive),
            "local" => Ok(AudioSource::Local),
            other => Err(format!("unknown audio source '{}'", other)),
        }
    }
}

/// File identity section of an analysis record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    /// Size in bytes
    pub file_size: u64,
    /// Duration in seconds
    pub duration: f64,
    /// Native sample rate of the source file
    pub sample_rate: u32,
    pub source: AudioSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,
}

/// Complete output of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub file: FileInfo,
    pub metadata: TrackMetadata,
    /// Spectral/timbral descriptors
    pub primary_features: FeatureSet,
    /// Rhythm/tonal descriptors
    pub secondary_features: FeatureSet,
    pub chord_progression: ChordProgressionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<TranscriptionResult>,
    /// Wall-clock seconds across all stages
    pub total_processing_time: f64,
    pub analyzed_at: chrono::DateTime<chrono::Utc>,
}

// =============================================================================
// Audio buffer types
// =============================================================================

/// Decoded audio samples ready for analysis
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples normalized to [-1.0, 1.0]
    pub samples: Vec<f32>,
    /// Sample rate of `samples` in Hz
    pub sample_rate: u32,
    /// Sample rate of the file before resampling
    pub source_sample_rate: u32,
    /// Duration in seconds
    pub duration: f64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        // Guard against division by zero - use 0 duration for invalid sample rate
        let duration = if sample_rate > 0 {
            samples.len() as f64 / sample_rate as f64
        } else {
            0.0
        };
        Self {
            samples,
            sample_rate,
            source_sample_rate: sample_rate,
            duration,
        }
    }

    /// Record the pre-resampling rate of the decoded file
    pub fn with_source_rate(mut self, source_sample_rate: u32) -> Self {
        self.source_sample_rate = source_sample_rate;
        self
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chord_index_layout() {
        assert_eq!(ChordLabel::from_index(0), Some(ChordLabel::major(PitchClass::C)));
        assert_eq!(ChordLabel::from_index(7), Some(ChordLabel::major(PitchClass::G)));
        assert_eq!(ChordLabel::from_index(21), Some(ChordLabel::minor(PitchClass::A)));
        assert_eq!(ChordLabel::from_index(24), Some(ChordLabel::NoChord));
        assert_eq!(ChordLabel::from_index(25), None);

        for label in ChordLabel::all() {
            assert_eq!(ChordLabel::from_index(label.index()), Some(label));
        }
        assert_eq!(ChordLabel::all().count(), CHORD_VOCABULARY_SIZE);
    }

    #[test]
    fn test_chord_label_notation() {
        assert_eq!(ChordLabel::major(PitchClass::Cs).to_string(), "C#:maj");
        assert_eq!(ChordLabel::minor(PitchClass::A).to_string(), "A:min");
        assert_eq!(ChordLabel::NoChord.to_string(), "N");

        assert_eq!("Bb:min".parse(), Ok(ChordLabel::minor(PitchClass::As)));
        assert_eq!("N".parse(), Ok(ChordLabel::NoChord));
        assert!("C:dim".parse::<ChordLabel>().is_err());
        assert!("H:maj".parse::<ChordLabel>().is_err());
        assert!("Cmaj".parse::<ChordLabel>().is_err());
    }

    #[test]
    fn test_flat_notation_wraps_around() {
        assert_eq!(PitchClass::from_notation("Cb"), Some(PitchClass::B));
        assert_eq!(PitchClass::from_notation("B#"), Some(PitchClass::C));
        assert_eq!(PitchClass::from_notation("X"), None);
    }

    #[test]
    fn test_summary_serializes_transitions_with_arrow_keys() {
        let c = ChordLabel::major(PitchClass::C);
        let g = ChordLabel::major(PitchClass::G);
        let mut summary = ChordProgressionSummary {
            sequence: vec![c, g],
            unique_chords: [c, g].into_iter().collect(),
            key: Some(PitchClass::G),
            mode: Some(Mode::Major),
            ..Default::default()
        };
        summary.transitions.insert((c, g), 1);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["transitions"]["C:maj -> G:maj"], 1);
        assert_eq!(json["sequence"][1], "G:maj");
        assert_eq!(json["mode"], "major");

        let back: ChordProgressionSummary = serde_json::from_value(json).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn test_feature_set_accessors() {
        let mut features = FeatureSet::new();
        features.insert_scalar("tempo", 120.0);
        features.insert_series("rms", vec![0.1, 0.2]);
        features.insert_label("key_scale", "minor");

        assert_eq!(features.scalar("tempo"), Some(120.0));
        assert_eq!(features.series("rms"), Some(&[0.1, 0.2][..]));
        assert_eq!(features.label("key_scale"), Some("minor"));
        assert_eq!(features.scalar("rms"), None);
        assert_eq!(features.len(), 3);

        let json = serde_json::to_value(&features).unwrap();
        assert_eq!(json["tempo"], 120.0);
    }

    #[test]
    fn test_feature_set_keeps_json_finite() {
        let mut features = FeatureSet::new();
        features.insert_scalar("x", f64::NAN);
        features.insert_scalar("y", f64::INFINITY);
        features.insert_series("s", vec![1.0, f64::NAN, f64::NEG_INFINITY]);
        features.insert_matrix("m", vec![vec![f64::NAN], vec![2.0]]);

        assert_eq!(features.scalar("x"), None);
        assert_eq!(features.scalar("y"), None);
        assert_eq!(features.series("s"), Some(&[1.0, 0.0, 0.0][..]));
        assert_eq!(
            features.get("m"),
            Some(&FeatureValue::Matrix(vec![vec![0.0], vec![2.0]]))
        );

        let json = serde_json::to_string(&features).unwrap();
        let back: FeatureSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, features);
    }

    #[test]
    fn test_audio_source_parsing() {
        assert_eq!("google-drive".parse(), Ok(AudioSource::GoogleDrive));
        assert_eq!("Upload".parse(), Ok(AudioSource::Upload));
        assert!("ftp".parse::<AudioSource>().is_err());
    }

    #[test]
    fn test_audio_buffer_duration() {
        let buffer = AudioBuffer::new(vec![0.0; 22050], 22050).with_source_rate(44100);
        assert!((buffer.duration - 1.0).abs() < 1e-9);
        assert_eq!(buffer.source_sample_rate, 44100);
        assert_eq!(AudioBuffer::new(vec![0.0; 10], 0).duration, 0.0);
    }
}
