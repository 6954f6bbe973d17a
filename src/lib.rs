//! chordscope - Audio Analysis with Chord Progression Recognition
//!
//! Analyzes one audio recording into a single structured record combining
//! spectral/timbral descriptors, rhythm/tonal descriptors, a chord
//! progression with derived statistics, and an optional lyric transcription.
//!
//! # Architecture
//!
//! The library is organized into several key modules:
//!
//! - `config`: CLI argument parsing and runtime settings
//! - `audio`: Audio decoding using symphonia
//! - `analysis`: Capability ports plus metadata and feature-extraction backends
//! - `chords`: Fixed-rate chord recognition and progression summarization
//! - `transcription`: Speech-to-text backend
//! - `pipeline`: Stage orchestration, failure policy and cancellation
//! - `export`: JSON output
//!
//! # Example
//!
//! ```no_run
//! use chordscope::config::Settings;
//! use chordscope::pipeline::{AnalysisOrchestrator, AnalysisRequest};
//!
//! let orchestrator = AnalysisOrchestrator::with_defaults(Settings::default());
//! let record = orchestrator
//!     .analyze(&AnalysisRequest::new("song.mp3"))
//!     .expect("Analysis failed");
//! println!("Most common chord: {:?}", record.chord_progression.most_common_chord);
//! ```

pub mod analysis;
pub mod audio;
pub mod chords;
pub mod config;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod transcription;
pub mod types;

// Re-export key types at crate root
pub use error::{AnalysisError, Result, Stage};
pub use types::{AnalysisRecord, AudioBuffer, ChordEvent, ChordLabel, ChordProgressionSummary};
