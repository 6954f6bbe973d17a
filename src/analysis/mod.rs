//! Audio analysis modules
//!
//! This module provides the capability ports the pipeline consumes and their
//! default implementations. The trait abstraction allows swapping backends
//! without changing pipeline code.

pub mod mel;
pub mod metadata;
pub mod spectral;
pub mod spectrum;
pub mod stratum;
pub mod traits;

pub use traits::{
    ChordClassifier, FrameClassification, MetadataReader, PrimaryExtraction,
    PrimaryFeatureExtractor, SecondaryFeatureExtractor, Transcriber,
};

pub use metadata::LoftyMetadataReader;
pub use spectral::SpectralFeatureExtractor;
pub use stratum::StratumFeatureExtractor;
