//! Analysis pipeline

pub mod cancel;
pub mod orchestrator;

pub use cancel::CancellationToken;
pub use orchestrator::{AnalysisOrchestrator, AnalysisPorts, AnalysisRequest};
