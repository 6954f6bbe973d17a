//! Cooperative cancellation

use crate::error::{AnalysisError, Result, Stage};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cloneable cancellation flag shared between a caller and a running analysis
///
/// Stages poll it at their boundaries; the chord recognizer also polls it
/// between frame batches.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation; every clone observes it
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Fail with [`AnalysisError::Cancelled`] if cancellation was requested
    pub fn checkpoint(&self, stage: Stage) -> Result<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled { stage })
        } else {
            Ok(())
        }
    }
}
