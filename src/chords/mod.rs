//! Chord progression recognition
//!
//! - `recognizer`: fixed-rate framing over a [`ChordClassifier`](crate::analysis::ChordClassifier)
//! - `chroma`: default chroma/template classifier
//! - `sequence`: segment merging and progression statistics

pub mod chroma;
pub mod recognizer;
pub mod sequence;

pub use chroma::ChromaTemplateClassifier;
pub use recognizer::{ChordRecognizer, FrameLabel};
pub use sequence::{merge_events, summarize};
