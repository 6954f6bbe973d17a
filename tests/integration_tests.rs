//! Integration tests for the chordscope analysis pipeline
//!
//! Stage sequencing and failure policy are checked with stub ports; the last
//! section runs the built-in adapters over generated WAV files.

use chordscope::analysis::{
    ChordClassifier, FrameClassification, MetadataReader, PrimaryExtraction,
    PrimaryFeatureExtractor, SecondaryFeatureExtractor, Transcriber,
};
use chordscope::config::Settings;
use chordscope::error::{
    AnalysisError, ExtractionError, MetadataError, RecognitionError, Stage, TranscriptionError,
};
use chordscope::export;
use chordscope::pipeline::{
    AnalysisOrchestrator, AnalysisPorts, AnalysisRequest, CancellationToken,
};
use chordscope::types::{
    AudioBuffer, AudioSource, ChordLabel, FeatureSet, Mode, PitchClass, TrackMetadata,
    TranscriptSegment, TranscriptionResult,
};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// =============================================================================
// Stub ports
// =============================================================================

/// Sample rate of the stub waveform
const STUB_RATE: u32 = 1000;

#[derive(Default)]
struct StubMetadata {
    calls: AtomicUsize,
    fail: bool,
}

impl MetadataReader for StubMetadata {
    fn read(&self, path: &Path) -> Result<TrackMetadata, MetadataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(MetadataError::Unreadable {
                path: path.to_path_buf(),
                reason: "corrupt tag".to_string(),
            });
        }
        Ok(TrackMetadata {
            title: Some("Stub Title".to_string()),
            artist: Some("Stub Artist".to_string()),
            year: Some(1999),
            ..Default::default()
        })
    }

    fn name(&self) -> &'static str {
        "stub-metadata"
    }
}

/// Returns a waveform that is positive for 0.4 s, then negative for 0.6 s
#[derive(Default)]
struct StubPrimary {
    calls: AtomicUsize,
    fail: bool,
    seconds: usize,
}

impl PrimaryFeatureExtractor for StubPrimary {
    fn extract(&self, _path: &Path) -> Result<PrimaryExtraction, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExtractionError::Backend {
                extractor: "stub-primary",
                reason: "decoder exploded".to_string(),
            });
        }

        let seconds = self.seconds.max(1);
        let mut samples = Vec::with_capacity(STUB_RATE as usize * seconds);
        for _ in 0..seconds {
            samples.extend(std::iter::repeat(0.5f32).take(400));
            samples.extend(std::iter::repeat(-0.5f32).take(600));
        }

        let mut features = FeatureSet::new();
        features.insert_scalar("spectral_centroid_mean", 1234.0);
        Ok(PrimaryExtraction {
            features,
            audio: AudioBuffer::new(samples, STUB_RATE).with_source_rate(44100),
        })
    }

    fn name(&self) -> &'static str {
        "stub-primary"
    }
}

#[derive(Default)]
struct StubSecondary {
    calls: AtomicUsize,
    fail: bool,
}

impl SecondaryFeatureExtractor for StubSecondary {
    fn extract(&self, _audio: &AudioBuffer) -> Result<FeatureSet, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ExtractionError::Backend {
                extractor: "stub-secondary",
                reason: "tempo tracker failed".to_string(),
            });
        }
        let mut features = FeatureSet::new();
        features.insert_scalar("bpm", 120.0);
        Ok(features)
    }

    fn name(&self) -> &'static str {
        "stub-secondary"
    }
}

/// C:maj for positive frames, A:min for negative ones
#[derive(Default)]
struct StubClassifier {
    calls: AtomicUsize,
    fail: bool,
    /// Fired on the first classification
    cancel_on_first: Option<CancellationToken>,
}

impl ChordClassifier for StubClassifier {
    fn classify(
        &self,
        frame: &[f32],
        _sample_rate: u32,
    ) -> Result<FrameClassification, RecognitionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = &self.cancel_on_first {
            token.cancel();
        }
        if self.fail {
            return Err(RecognitionError::Classifier {
                classifier: "stub-classifier",
                reason: "model missing".to_string(),
            });
        }
        let mean = frame.iter().sum::<f32>() / frame.len() as f32;
        Ok(if mean > 0.0 {
            ChordLabel::major(PitchClass::C).into()
        } else {
            ChordLabel::minor(PitchClass::A).into()
        })
    }

    fn name(&self) -> &'static str {
        "stub-classifier"
    }
}

enum TranscriberBehavior {
    Succeed,
    Fail,
    Nothing,
    Hang(Duration),
    /// Cancel the run from inside the call, then hang
    CancelAndHang(CancellationToken, Duration),
}

struct StubTranscriber {
    calls: AtomicUsize,
    behavior: TranscriberBehavior,
}

impl StubTranscriber {
    fn new(behavior: TranscriberBehavior) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            behavior,
        }
    }
}

impl Transcriber for StubTranscriber {
    fn transcribe(
        &self,
        _path: &Path,
        language: Option<&str>,
    ) -> Result<Option<TranscriptionResult>, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            TranscriberBehavior::Succeed => Ok(Some(TranscriptionResult {
                text: "la la la".to_string(),
                language: language.map(str::to_string),
                segments: vec![TranscriptSegment {
                    id: 0,
                    start: 0.0,
                    end: 1.0,
                    text: "la la la".to_string(),
                    confidence: Some(0.9),
                    no_speech_prob: None,
                }],
                confidence_mean: Some(0.9),
                model: "stub".to_string(),
                processing_time: 0.0,
            })),
            TranscriberBehavior::Fail => Err(TranscriptionError::Api {
                status: 500,
                body: "internal error".to_string(),
            }),
            TranscriberBehavior::Nothing => Ok(None),
            TranscriberBehavior::Hang(duration) => {
                std::thread::sleep(*duration);
                Ok(None)
            }
            TranscriberBehavior::CancelAndHang(token, duration) => {
                token.cancel();
                std::thread::sleep(*duration);
                Ok(None)
            }
        }
    }

    fn name(&self) -> &'static str {
        "stub-transcriber"
    }
}

/// Stubs plus handles to inspect their call counters
struct Harness {
    metadata: Arc<StubMetadata>,
    primary: Arc<StubPrimary>,
    secondary: Arc<StubSecondary>,
    classifier: Arc<StubClassifier>,
    transcriber: Arc<StubTranscriber>,
    settings: Settings,
    _dir: TempDir,
    audio_path: PathBuf,
}

impl Harness {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let audio_path = dir.path().join("stub_song.mp3");
        fs::write(&audio_path, b"not really audio").expect("Failed to create input file");

        Self {
            metadata: Arc::new(StubMetadata::default()),
            primary: Arc::new(StubPrimary {
                seconds: 3,
                ..Default::default()
            }),
            secondary: Arc::new(StubSecondary::default()),
            classifier: Arc::new(StubClassifier::default()),
            transcriber: Arc::new(StubTranscriber::new(TranscriberBehavior::Succeed)),
            settings: Settings::default(),
            _dir: dir,
            audio_path,
        }
    }

    fn orchestrator(&self) -> AnalysisOrchestrator {
        AnalysisOrchestrator::new(
            self.settings.clone(),
            AnalysisPorts {
                metadata: self.metadata.clone(),
                primary: self.primary.clone(),
                secondary: self.secondary.clone(),
                classifier: self.classifier.clone(),
                transcriber: self.transcriber.clone(),
            },
        )
    }

    fn request(&self) -> AnalysisRequest {
        AnalysisRequest::new(&self.audio_path)
    }

    /// (metadata, primary, secondary, classifier, transcriber) call counts
    fn calls(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.metadata.calls.load(Ordering::SeqCst),
            self.primary.calls.load(Ordering::SeqCst),
            self.secondary.calls.load(Ordering::SeqCst),
            self.classifier.calls.load(Ordering::SeqCst),
            self.transcriber.calls.load(Ordering::SeqCst),
        )
    }
}

// =============================================================================
// Stage sequencing and failure policy
// =============================================================================

#[test]
fn test_successful_run_populates_every_field() {
    let harness = Harness::new();
    let request = harness
        .request()
        .with_source(AudioSource::GoogleDrive, Some("drive://folder/stub_song.mp3".to_string()))
        .with_lyrics(Some("en".to_string()));

    let record = harness
        .orchestrator()
        .analyze(&request)
        .expect("Analysis should succeed");

    assert_eq!(record.file.filename, "stub_song.mp3");
    assert_eq!(record.file.file_size, 16);
    assert!((record.file.duration - 3.0).abs() < 1e-9);
    assert_eq!(record.file.sample_rate, 44100);
    assert_eq!(record.file.source, AudioSource::GoogleDrive);
    assert_eq!(
        record.file.source_path.as_deref(),
        Some("drive://folder/stub_song.mp3")
    );

    assert_eq!(record.metadata.title.as_deref(), Some("Stub Title"));
    assert_eq!(record.primary_features.scalar("spectral_centroid_mean"), Some(1234.0));
    assert_eq!(record.secondary_features.scalar("bpm"), Some(120.0));

    let transcription = record.transcription.expect("transcription should be present");
    assert_eq!(transcription.language.as_deref(), Some("en"));

    // 3 seconds of [C C C C Am Am Am Am Am Am] at 10 Hz
    let chords = &record.chord_progression;
    let c = ChordLabel::major(PitchClass::C);
    let am = ChordLabel::minor(PitchClass::A);
    assert_eq!(chords.sequence, vec![c, am, c, am, c, am]);
    assert_eq!(chords.transitions.get(&(c, am)), Some(&3));
    assert_eq!(chords.transitions.get(&(am, c)), Some(&2));
    assert_eq!(chords.most_common_chord, Some(am));
    assert_eq!(chords.key, Some(PitchClass::A));
    assert_eq!(chords.mode, Some(Mode::Minor));
    assert_eq!(chords.analyzer, "stub-classifier");
    assert!((chords.total_duration() - 3.0).abs() < 1e-9);
    assert!((chords.confidence_mean - 0.85).abs() < 1e-12);

    assert!(record.total_processing_time >= 0.0);
    assert_eq!(harness.calls(), (1, 1, 1, 30, 1));
}

#[test]
fn test_primary_failure_aborts_before_other_stages() {
    let mut harness = Harness::new();
    harness.primary = Arc::new(StubPrimary {
        fail: true,
        ..Default::default()
    });

    let err = harness
        .orchestrator()
        .analyze(&harness.request().with_lyrics(None))
        .expect_err("Primary failure must be fatal");

    assert_eq!(err.stage(), Some(Stage::PrimaryFeatures));
    assert!(matches!(
        err,
        AnalysisError::Extraction {
            stage: Stage::PrimaryFeatures,
            ..
        }
    ));
    assert_eq!(harness.calls(), (0, 1, 0, 0, 0));
}

#[test]
fn test_secondary_failure_is_fatal() {
    let mut harness = Harness::new();
    harness.secondary = Arc::new(StubSecondary {
        fail: true,
        ..Default::default()
    });

    let err = harness
        .orchestrator()
        .analyze(&harness.request().with_lyrics(None))
        .expect_err("Secondary failure must be fatal");

    assert_eq!(err.stage(), Some(Stage::SecondaryFeatures));
    assert_eq!(harness.calls(), (0, 1, 1, 0, 0));
}

#[test]
fn test_recognition_failure_is_fatal() {
    let mut harness = Harness::new();
    harness.classifier = Arc::new(StubClassifier {
        fail: true,
        ..Default::default()
    });

    let err = harness
        .orchestrator()
        .analyze(&harness.request().with_lyrics(None))
        .expect_err("Recognition failure must be fatal");

    assert!(matches!(err, AnalysisError::Recognition { .. }));
    assert_eq!(err.stage(), Some(Stage::Chords));
    assert_eq!(harness.calls(), (0, 1, 1, 1, 0));
}

#[test]
fn test_transcription_failure_leaves_field_absent() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(StubTranscriber::new(TranscriberBehavior::Fail));

    let record = harness
        .orchestrator()
        .analyze(&harness.request().with_lyrics(None))
        .expect("Transcription failure must not be fatal");

    assert!(record.transcription.is_none());
    assert!(!record.chord_progression.events.is_empty());
    assert_eq!(record.secondary_features.scalar("bpm"), Some(120.0));
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_empty_transcription_leaves_field_absent() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(StubTranscriber::new(TranscriberBehavior::Nothing));

    let record = harness
        .orchestrator()
        .analyze(&harness.request().with_lyrics(None))
        .expect("Analysis should succeed");
    assert!(record.transcription.is_none());
}

#[test]
fn test_transcription_skipped_without_lyrics_flag() {
    let harness = Harness::new();
    let record = harness
        .orchestrator()
        .analyze(&harness.request())
        .expect("Analysis should succeed");

    assert!(record.transcription.is_none());
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_metadata_failure_is_not_fatal() {
    let mut harness = Harness::new();
    harness.metadata = Arc::new(StubMetadata {
        fail: true,
        ..Default::default()
    });

    let record = harness
        .orchestrator()
        .analyze(&harness.request())
        .expect("Metadata failure must not be fatal");

    assert_eq!(record.metadata, TrackMetadata::default());
    assert_eq!(harness.metadata.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_transcription_timeout_is_not_fatal() {
    let mut harness = Harness::new();
    harness.transcriber = Arc::new(StubTranscriber::new(TranscriberBehavior::Hang(
        Duration::from_secs(3),
    )));
    harness.settings.transcription.timeout = Duration::from_millis(200);

    let started = Instant::now();
    let record = harness
        .orchestrator()
        .analyze(&harness.request().with_lyrics(None))
        .expect("Timeout must not be fatal");

    assert!(record.transcription.is_none());
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "orchestrator should stop waiting at the timeout"
    );
}

#[test]
fn test_missing_input_fails_before_any_stage() {
    let harness = Harness::new();
    let err = harness
        .orchestrator()
        .analyze(&AnalysisRequest::new("/no/such/file.wav"))
        .expect_err("Missing file must fail");

    assert!(matches!(err, AnalysisError::FileNotFound(_)));
    assert_eq!(harness.calls(), (0, 0, 0, 0, 0));
}

// =============================================================================
// Cancellation
// =============================================================================

#[test]
fn test_cancel_before_start() {
    let harness = Harness::new();
    let token = CancellationToken::new();
    token.cancel();

    let err = harness
        .orchestrator()
        .analyze_with_cancel(&harness.request(), &token)
        .expect_err("Cancelled run must not return a record");

    assert!(matches!(
        err,
        AnalysisError::Cancelled {
            stage: Stage::PrimaryFeatures
        }
    ));
    assert_eq!(harness.calls(), (0, 0, 0, 0, 0));
}

#[test]
fn test_cancel_during_chord_recognition() {
    let mut harness = Harness::new();
    let token = CancellationToken::new();
    harness.primary = Arc::new(StubPrimary {
        seconds: 20,
        ..Default::default()
    });
    harness.classifier = Arc::new(StubClassifier {
        cancel_on_first: Some(token.clone()),
        ..Default::default()
    });

    let err = harness
        .orchestrator()
        .analyze_with_cancel(&harness.request().with_lyrics(None), &token)
        .expect_err("Cancelled run must not return a record");

    assert!(matches!(
        err,
        AnalysisError::Cancelled {
            stage: Stage::Chords
        }
    ));
    // Checked every 64 frames, so the first batch finishes
    assert_eq!(harness.classifier.calls.load(Ordering::SeqCst), 64);
    assert_eq!(harness.metadata.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_cancel_while_waiting_on_transcription() {
    let mut harness = Harness::new();
    let token = CancellationToken::new();
    harness.transcriber = Arc::new(StubTranscriber::new(TranscriberBehavior::CancelAndHang(
        token.clone(),
        Duration::from_secs(3),
    )));

    let started = Instant::now();
    let err = harness
        .orchestrator()
        .analyze_with_cancel(&harness.request().with_lyrics(None), &token)
        .expect_err("Cancelled run must not return a record");

    assert!(matches!(
        err,
        AnalysisError::Cancelled {
            stage: Stage::Transcription
        }
    ));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "cancellation should end the transcription wait"
    );
    let (metadata, primary, secondary, classifier, transcriber) = harness.calls();
    assert_eq!((metadata, primary, secondary, transcriber), (1, 1, 1, 1));
    assert_eq!(classifier, 30);
}

// =============================================================================
// Parallel stages
// =============================================================================

#[test]
fn test_parallel_matches_sequential() {
    let sequential = Harness::new();
    let expected = sequential
        .orchestrator()
        .analyze(&sequential.request())
        .expect("Sequential analysis should succeed");

    let mut parallel = Harness::new();
    parallel.settings.parallel_stages = true;
    let actual = parallel
        .orchestrator()
        .analyze(&parallel.request())
        .expect("Parallel analysis should succeed");

    assert_eq!(actual.chord_progression, expected.chord_progression);
    assert_eq!(actual.secondary_features, expected.secondary_features);
    assert_eq!(parallel.calls(), (1, 1, 1, 30, 0));
}

#[test]
fn test_parallel_reports_earlier_stage_on_double_failure() {
    let mut harness = Harness::new();
    harness.settings.parallel_stages = true;
    harness.secondary = Arc::new(StubSecondary {
        fail: true,
        ..Default::default()
    });
    harness.classifier = Arc::new(StubClassifier {
        fail: true,
        ..Default::default()
    });

    let err = harness
        .orchestrator()
        .analyze(&harness.request().with_lyrics(None))
        .expect_err("Double failure must be fatal");

    assert_eq!(err.stage(), Some(Stage::SecondaryFeatures));
    assert_eq!(harness.metadata.calls.load(Ordering::SeqCst), 0);
    assert_eq!(harness.transcriber.calls.load(Ordering::SeqCst), 0);
}

// =============================================================================
// Built-in adapters over real audio
// =============================================================================

/// Generate a mono 16-bit WAV holding the sum of `frequencies`
fn generate_chord_wav(path: &Path, frequencies: &[f32], duration_secs: f32, sample_rate: u32) {
    use std::f32::consts::PI;

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV file");

    let num_samples = (duration_secs * sample_rate as f32) as usize;
    let amplitude = 0.2f32; // per tone, keeps the sum below full scale

    for i in 0..num_samples {
        let t = i as f32 / sample_rate as f32;
        let sample: f32 = frequencies
            .iter()
            .map(|f| (2.0 * PI * f * t).sin() * amplitude)
            .sum();
        let sample_i16 = (sample * 32767.0) as i16;
        writer.write_sample(sample_i16).expect("Failed to write sample");
    }

    writer.finalize().expect("Failed to finalize WAV");
}

#[test]
fn test_default_pipeline_on_c_major_triad() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let wav = dir.path().join("c_major_triad.wav");
    generate_chord_wav(&wav, &[261.63, 329.63, 392.0], 6.0, 44100);

    let orchestrator = AnalysisOrchestrator::with_defaults(Settings::default());
    let record = orchestrator
        .analyze(&AnalysisRequest::new(&wav).with_source(AudioSource::Local, None))
        .expect("Pipeline should succeed");

    assert_eq!(record.file.filename, "c_major_triad.wav");
    assert_eq!(record.file.sample_rate, 44100);
    assert!((record.file.duration - 6.0).abs() < 0.05, "duration {}", record.file.duration);

    for name in [
        "spectral_centroid_mean",
        "spectral_rolloff_mean",
        "zero_crossing_rate_mean",
        "rms_mean",
        "hop_length",
    ] {
        assert!(record.primary_features.scalar(name).is_some(), "missing {}", name);
    }
    assert!(record.primary_features.get("chroma_stft").is_some());
    assert!(record.secondary_features.scalar("bpm").is_some());
    assert!(record.secondary_features.label("key_key").is_some());
    assert!(record.secondary_features.scalar("loudness").is_some());

    let chords = &record.chord_progression;
    assert_eq!(chords.most_common_chord, Some(ChordLabel::major(PitchClass::C)));
    assert_eq!(chords.key, Some(PitchClass::C));
    assert_eq!(chords.mode, Some(Mode::Major));
    assert_eq!(chords.analyzer, "chroma-template");
    assert_eq!(
        chords.transition_count(),
        chords.sequence.len().saturating_sub(1)
    );
    let unique: BTreeSet<ChordLabel> = chords.sequence.iter().copied().collect();
    assert_eq!(chords.unique_chords, unique);
    assert!((chords.total_duration() - record.file.duration).abs() <= 0.1);

    // No tags in a hound WAV: the title falls back to the file stem when the
    // tag reader accepts the file
    if let Some(title) = &record.metadata.title {
        assert_eq!(title, "c_major_triad");
    }
    assert!(record.transcription.is_none());
}

#[test]
fn test_default_pipeline_on_silent_track() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let wav = dir.path().join("silence.wav");
    generate_chord_wav(&wav, &[], 5.0, 22050);

    let record = AnalysisOrchestrator::with_defaults(Settings::default())
        .analyze(&AnalysisRequest::new(&wav))
        .expect("Silent audio is a valid recording");

    assert_eq!(record.secondary_features.scalar("loudness"), Some(-120.0));
    assert!(record.secondary_features.scalar("onset_rate").is_some());
    assert!(record.secondary_features.scalar("bpm").is_none());

    let chords = &record.chord_progression;
    assert_eq!(chords.sequence, vec![ChordLabel::NoChord]);
    assert_eq!(chords.most_common_chord, Some(ChordLabel::NoChord));
    assert_eq!(chords.key, None);

    // Nothing non-finite survives into the exported record
    let json = dir.path().join("silence.json");
    export::write_record(&record, &json).expect("Export should succeed");
    let loaded = export::read_record(&json).expect("Exported record should load");
    assert!(loaded
        .primary_features
        .names()
        .eq(record.primary_features.names()));
    assert_eq!(loaded.secondary_features.len(), record.secondary_features.len());
}

#[test]
fn test_too_short_audio_fails_primary_stage() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let wav = dir.path().join("blip.wav");
    generate_chord_wav(&wav, &[440.0], 1.0, 22050);

    let err = AnalysisOrchestrator::with_defaults(Settings::default())
        .analyze(&AnalysisRequest::new(&wav))
        .expect_err("Short audio must fail");

    assert!(matches!(
        err,
        AnalysisError::Extraction {
            stage: Stage::PrimaryFeatures,
            source: ExtractionError::TooShort { .. },
        }
    ));
}

#[test]
fn test_invalid_audio_data_fails_primary_stage() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let bogus = dir.path().join("invalid.wav");
    fs::write(&bogus, b"This is not a valid WAV file content!!!!!")
        .expect("Failed to create invalid file");

    let err = AnalysisOrchestrator::with_defaults(Settings::default())
        .analyze(&AnalysisRequest::new(&bogus))
        .expect_err("Invalid audio must fail");

    assert_eq!(err.stage(), Some(Stage::PrimaryFeatures));
}

#[test]
fn test_record_json_export() {
    let harness = Harness::new();
    let record = harness
        .orchestrator()
        .analyze(&harness.request())
        .expect("Analysis should succeed");

    let out_dir = TempDir::new().expect("Failed to create output temp dir");
    let json_path = out_dir.path().join("record.json");
    export::write_record(&record, &json_path).expect("Export should succeed");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&json_path).expect("Failed to read JSON"))
            .expect("Should be valid JSON");

    assert_eq!(json["file"]["filename"], "stub_song.mp3");
    assert_eq!(json["file"]["source"], "upload");
    assert_eq!(json["chord_progression"]["most_common_chord"], "A:min");
    assert_eq!(json["chord_progression"]["transitions"]["C:maj -> A:min"], 3);
    assert_eq!(json["chord_progression"]["mode"], "minor");
    assert!(json["analyzed_at"].is_string());
    assert!(json.get("transcription").is_none());
}
