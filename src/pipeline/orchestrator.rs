//! Pipeline orchestration
//!
//! Runs one analysis: primary extraction (which decodes the audio once),
//! secondary extraction, chord recognition and summarization, then the
//! best-effort metadata and transcription stages. Required stages fail fast;
//! best-effort stages are logged and leave their field absent.
//!
//! Secondary extraction and chord recognition optionally run concurrently
//! on the rayon pool. Transcription runs on its own thread and is bounded by
//! the configured timeout.

use crate::analysis::metadata::with_fallback_title;
use crate::analysis::{
    ChordClassifier, LoftyMetadataReader, MetadataReader, PrimaryExtraction,
    PrimaryFeatureExtractor, SecondaryFeatureExtractor, SpectralFeatureExtractor,
    StratumFeatureExtractor, Transcriber,
};
use crate::chords::{summarize, ChordRecognizer, ChromaTemplateClassifier};
use crate::config::Settings;
use crate::error::{AnalysisError, Result, Stage, TranscriptionError};
use crate::pipeline::cancel::CancellationToken;
use crate::transcription::WhisperTranscriber;
use crate::types::{
    AnalysisRecord, AudioBuffer, AudioSource, ChordProgressionSummary, FeatureSet, FileInfo,
    TrackMetadata, TranscriptionResult,
};
use crossbeam_channel::{bounded, RecvTimeoutError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How often the transcription wait wakes up to check for cancellation
const TRANSCRIPTION_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What to analyze and how the file was obtained
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub audio_path: PathBuf,
    pub source: AudioSource,
    /// Original location (upload name, drive id, ...) for provenance
    pub source_path: Option<String>,
    pub extract_lyrics: bool,
    /// Language hint for transcription
    pub language: Option<String>,
}

impl AnalysisRequest {
    pub fn new(audio_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: audio_path.into(),
            source: AudioSource::default(),
            source_path: None,
            extract_lyrics: false,
            language: None,
        }
    }

    pub fn with_source(mut self, source: AudioSource, source_path: Option<String>) -> Self {
        self.source = source;
        self.source_path = source_path;
        self
    }

    pub fn with_lyrics(mut self, language: Option<String>) -> Self {
        self.extract_lyrics = true;
        self.language = language;
        self
    }
}

/// Capability providers consumed by the orchestrator
#[derive(Clone)]
pub struct AnalysisPorts {
    pub metadata: Arc<dyn MetadataReader>,
    pub primary: Arc<dyn PrimaryFeatureExtractor>,
    pub secondary: Arc<dyn SecondaryFeatureExtractor>,
    pub classifier: Arc<dyn ChordClassifier>,
    pub transcriber: Arc<dyn Transcriber>,
}

impl AnalysisPorts {
    /// Built-in adapters configured from `settings`
    pub fn defaults(settings: &Settings) -> Self {
        Self {
            metadata: Arc::new(LoftyMetadataReader::new()),
            primary: Arc::new(SpectralFeatureExtractor::new(
                settings.analysis_sample_rate,
                settings.min_duration_secs,
            )),
            secondary: Arc::new(StratumFeatureExtractor::new()),
            classifier: Arc::new(ChromaTemplateClassifier::new(settings.chords.silence_rms)),
            transcriber: Arc::new(WhisperTranscriber::new(settings.transcription.clone())),
        }
    }
}

/// Sequences the analysis stages and assembles the record
pub struct AnalysisOrchestrator {
    settings: Settings,
    metadata: Arc<dyn MetadataReader>,
    primary: Arc<dyn PrimaryFeatureExtractor>,
    secondary: Arc<dyn SecondaryFeatureExtractor>,
    recognizer: ChordRecognizer,
    transcriber: Arc<dyn Transcriber>,
}

impl AnalysisOrchestrator {
    pub fn new(settings: Settings, ports: AnalysisPorts) -> Self {
        let recognizer = ChordRecognizer::new(ports.classifier, settings.chords.frame_rate);
        Self {
            settings,
            metadata: ports.metadata,
            primary: ports.primary,
            secondary: ports.secondary,
            recognizer,
            transcriber: ports.transcriber,
        }
    }

    /// Orchestrator wired to the built-in adapters
    pub fn with_defaults(settings: Settings) -> Self {
        let ports = AnalysisPorts::defaults(&settings);
        Self::new(settings, ports)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run one analysis to completion
    pub fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisRecord> {
        self.analyze_with_cancel(request, &CancellationToken::new())
    }

    /// Run one analysis, giving up with [`AnalysisError::Cancelled`] once
    /// `cancel` fires. No partial record is returned.
    pub fn analyze_with_cancel(
        &self,
        request: &AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisRecord> {
        let started = Instant::now();
        let path = request.audio_path.as_path();

        if !path.is_file() {
            return Err(AnalysisError::FileNotFound(path.to_path_buf()));
        }
        let file_size = std::fs::metadata(path)?.len();

        info!("Analyzing {}", path.display());

        // Required stages
        cancel.checkpoint(Stage::PrimaryFeatures)?;
        let stage_start = Instant::now();
        let PrimaryExtraction {
            features: primary_features,
            audio,
        } = self
            .primary
            .extract(path)
            .map_err(|e| AnalysisError::extraction(Stage::PrimaryFeatures, e))?;
        debug!(
            "{} ({}) done in {:.2}s",
            Stage::PrimaryFeatures,
            self.primary.name(),
            stage_start.elapsed().as_secs_f64()
        );

        let duration = audio.duration;
        let sample_rate = audio.source_sample_rate;

        let (secondary_features, chord_progression) = if self.settings.parallel_stages {
            let (secondary, chords) = rayon::join(
                || self.extract_secondary(&audio, cancel),
                || self.recognize_chords(&audio, cancel),
            );
            (secondary?, chords?)
        } else {
            let secondary = self.extract_secondary(&audio, cancel)?;
            (secondary, self.recognize_chords(&audio, cancel)?)
        };
        drop(audio);

        // Best-effort stages
        cancel.checkpoint(Stage::Metadata)?;
        let metadata = self.read_metadata(path);

        let transcription = if request.extract_lyrics {
            cancel.checkpoint(Stage::Transcription)?;
            let language = request
                .language
                .clone()
                .or_else(|| self.settings.transcription.language.clone());
            self.transcribe(path, language, cancel)?
        } else {
            None
        };

        let record = AnalysisRecord {
            file: FileInfo {
                filename: path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_default(),
                file_size,
                duration,
                sample_rate,
                source: request.source,
                source_path: request.source_path.clone(),
            },
            metadata,
            primary_features,
            secondary_features,
            chord_progression,
            transcription,
            total_processing_time: started.elapsed().as_secs_f64(),
            analyzed_at: chrono::Utc::now(),
        };

        info!(
            "Analyzed {} in {:.2}s: {} chord events, {} transitions",
            record.file.filename,
            record.total_processing_time,
            record.chord_progression.events.len(),
            record.chord_progression.transition_count()
        );

        Ok(record)
    }

    fn extract_secondary(
        &self,
        audio: &AudioBuffer,
        cancel: &CancellationToken,
    ) -> Result<FeatureSet> {
        cancel.checkpoint(Stage::SecondaryFeatures)?;
        let stage_start = Instant::now();
        let features = self
            .secondary
            .extract(audio)
            .map_err(|e| AnalysisError::extraction(Stage::SecondaryFeatures, e))?;
        debug!(
            "{} ({}) done in {:.2}s",
            Stage::SecondaryFeatures,
            self.secondary.name(),
            stage_start.elapsed().as_secs_f64()
        );
        Ok(features)
    }

    fn recognize_chords(
        &self,
        audio: &AudioBuffer,
        cancel: &CancellationToken,
    ) -> Result<ChordProgressionSummary> {
        cancel.checkpoint(Stage::Chords)?;
        let stage_start = Instant::now();
        let frames = self
            .recognizer
            .recognize_until(&audio.samples, audio.sample_rate, || cancel.is_cancelled())?;
        let summary = summarize(
            &frames,
            &self.settings.chords,
            self.recognizer.classifier_name(),
        );
        debug!(
            "{} done in {:.2}s: {} frames -> {} events",
            Stage::Chords,
            stage_start.elapsed().as_secs_f64(),
            frames.len(),
            summary.events.len()
        );
        Ok(summary)
    }

    fn read_metadata(&self, path: &Path) -> TrackMetadata {
        match self.metadata.read(path) {
            Ok(metadata) => with_fallback_title(metadata, path),
            Err(e) => {
                warn!("{} ({}): {}", Stage::Metadata, self.metadata.name(), e);
                TrackMetadata::default()
            }
        }
    }

    /// Transcribe on a worker thread, waiting at most the configured timeout
    ///
    /// Every provider failure, including the timeout, yields `Ok(None)`;
    /// only cancellation is an error.
    fn transcribe(
        &self,
        path: &Path,
        language: Option<String>,
        cancel: &CancellationToken,
    ) -> Result<Option<TranscriptionResult>> {
        let timeout = self.settings.transcription.timeout;
        let (tx, rx) = bounded(1);
        let transcriber = Arc::clone(&self.transcriber);
        let owned_path = path.to_path_buf();

        // The worker is detached: on timeout it finishes in the background and
        // its send fails harmlessly.
        let spawned = thread::Builder::new()
            .name("transcription".to_string())
            .spawn(move || {
                let result = transcriber.transcribe(&owned_path, language.as_deref());
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            warn!("{}: cannot start worker thread: {}", Stage::Transcription, e);
            return Ok(None);
        }

        let deadline = Instant::now() + timeout;
        loop {
            cancel.checkpoint(Stage::Transcription)?;

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("{}", TranscriptionError::Timeout { timeout });
                return Ok(None);
            }

            match rx.recv_timeout(remaining.min(TRANSCRIPTION_POLL_INTERVAL)) {
                Ok(Ok(Some(result))) => return Ok(Some(result)),
                Ok(Ok(None)) => {
                    info!("{} returned no transcript", self.transcriber.name());
                    return Ok(None);
                }
                Ok(Err(e)) => {
                    warn!("{} ({}): {}", Stage::Transcription, self.transcriber.name(), e);
                    return Ok(None);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("{} worker exited without a result", Stage::Transcription);
                    return Ok(None);
                }
            }
        }
    }
}
