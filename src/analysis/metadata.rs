//! Metadata extraction from audio file tags
//!
//! Uses lofty to read ID3v2 (MP3), Vorbis comments (FLAC/OGG), MP4 and AIFF tags.

use crate::analysis::traits::MetadataReader;
use crate::error::MetadataError;
use crate::types::TrackMetadata;
use lofty::file::TaggedFileExt;
use lofty::prelude::*;
use std::path::Path;
use tracing::debug;

/// Tag reader backed by lofty
#[derive(Debug, Default)]
pub struct LoftyMetadataReader;

impl LoftyMetadataReader {
    pub fn new() -> Self {
        Self
    }
}

impl MetadataReader for LoftyMetadataReader {
    fn read(&self, path: &Path) -> Result<TrackMetadata, MetadataError> {
        let unreadable = |e: lofty::error::LoftyError| MetadataError::Unreadable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let tagged_file = lofty::read_from_path(path).map_err(unreadable)?;

        let metadata = match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => TrackMetadata {
                title: tag.title().map(|s| s.to_string()),
                artist: tag.artist().map(|s| s.to_string()),
                album: tag.album().map(|s| s.to_string()),
                genre: tag.genre().map(|s| s.to_string()),
                year: tag.year().map(|y| y as i32),
            },
            None => {
                debug!("No tags found in {}", path.display());
                TrackMetadata::default()
            }
        };

        Ok(metadata)
    }

    fn name(&self) -> &'static str {
        "lofty"
    }
}

/// Fill in a missing title from the file stem
pub fn with_fallback_title(mut metadata: TrackMetadata, path: &Path) -> TrackMetadata {
    if metadata.title.is_none() {
        metadata.title = path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.to_string());
    }
    metadata
}
