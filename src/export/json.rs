//! JSON export of analysis records

use crate::error::{AnalysisError, Result};
use crate::types::AnalysisRecord;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tracing::info;

/// Write a record as pretty-printed JSON
///
/// Uses atomic write pattern: writes to a temp file first, then renames.
/// This prevents a truncated record if the write is interrupted.
pub fn write_record(record: &AnalysisRecord, output_path: &Path) -> Result<()> {
    let output_error = |reason: String| AnalysisError::Output {
        path: output_path.to_path_buf(),
        reason,
    };

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| output_error(e.to_string()))?;
    }

    // Same directory as the target so the rename stays on one filesystem
    let temp_path = output_path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| output_error(format!("Failed to create temp file: {}", e)))?;
    let mut writer = BufWriter::new(file);

    let written = serde_json::to_writer_pretty(&mut writer, record)
        .map_err(|e| e.to_string())
        .and_then(|()| writer.flush().map_err(|e| e.to_string()));
    if let Err(reason) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(output_error(reason));
    }
    drop(writer);

    std::fs::rename(&temp_path, output_path).map_err(|e| {
        let _ = std::fs::remove_file(&temp_path);
        output_error(format!("Failed to finalize file: {}", e))
    })?;

    info!("Wrote analysis record to {}", output_path.display());
    Ok(())
}

/// Load a record previously written by [`write_record`]
pub fn read_record(path: &Path) -> Result<AnalysisRecord> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AnalysisError::FileNotFound(path.to_path_buf())
        } else {
            AnalysisError::Io(e)
        }
    })?;
    serde_json::from_reader(BufReader::new(file)).map_err(|e| AnalysisError::Output {
        path: path.to_path_buf(),
        reason: format!("Invalid analysis record: {}", e),
    })
}
