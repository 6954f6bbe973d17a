//! OpenAI Whisper transcription over HTTP

use crate::analysis::traits::Transcriber;
use crate::config::TranscriptionSettings;
use crate::error::TranscriptionError;
use crate::types::{TranscriptSegment, TranscriptionResult};
use reqwest::blocking::{multipart, Client};
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("chordscope/", env!("CARGO_PKG_VERSION"));

/// `verbose_json` response body
#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    text: String,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    id: usize,
    start: f64,
    end: f64,
    text: String,
    #[serde(default)]
    avg_logprob: Option<f64>,
    #[serde(default)]
    no_speech_prob: Option<f64>,
}

/// Transcriber calling the `/audio/transcriptions` endpoint
pub struct WhisperTranscriber {
    settings: TranscriptionSettings,
}

impl WhisperTranscriber {
    pub fn new(settings: TranscriptionSettings) -> Self {
        Self { settings }
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/audio/transcriptions",
            self.settings.api_base.trim_end_matches('/')
        )
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(
        &self,
        path: &Path,
        language: Option<&str>,
    ) -> Result<Option<TranscriptionResult>, TranscriptionError> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| TranscriptionError::Unavailable {
                reason: "no OpenAI API key configured".to_string(),
            })?;

        let started = Instant::now();

        let mut form = multipart::Form::new()
            .text("model", self.settings.model.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment")
            .file("file", path)
            .map_err(|source| TranscriptionError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(lang) = language.or(self.settings.language.as_deref()) {
            form = form.text("language", lang.to_string());
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(self.settings.timeout)
            .build()
            .map_err(|e| TranscriptionError::Request {
                reason: e.to_string(),
            })?;

        debug!("Uploading {} to {}", path.display(), self.endpoint());
        let response = client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .map_err(|e| TranscriptionError::Request {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(TranscriptionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body: VerboseTranscription =
            response.json().map_err(|e| TranscriptionError::Request {
                reason: format!("invalid response body: {}", e),
            })?;

        let result = into_result(body, &self.settings.model, started.elapsed().as_secs_f64());
        if let Some(result) = &result {
            info!(
                "Transcribed {} segments in {:.1}s",
                result.segments.len(),
                result.processing_time
            );
        }
        Ok(result)
    }

    fn name(&self) -> &'static str {
        "openai-whisper"
    }
}

/// Convert the provider body; an empty transcript counts as no result
fn into_result(
    body: VerboseTranscription,
    model: &str,
    processing_time: f64,
) -> Option<TranscriptionResult> {
    let text = body.text.trim().to_string();
    if text.is_empty() && body.segments.is_empty() {
        return None;
    }

    let segments: Vec<TranscriptSegment> = body
        .segments
        .into_iter()
        .map(|s| TranscriptSegment {
            id: s.id,
            start: s.start,
            end: s.end,
            text: s.text.trim().to_string(),
            confidence: s.avg_logprob.map(|lp| lp.exp().clamp(0.0, 1.0)),
            no_speech_prob: s.no_speech_prob,
        })
        .collect();

    let confidences: Vec<f64> = segments.iter().filter_map(|s| s.confidence).collect();
    let confidence_mean = if confidences.is_empty() {
        None
    } else {
        Some(confidences.iter().sum::<f64>() / confidences.len() as f64)
    };

    Some(TranscriptionResult {
        text,
        language: body.language,
        segments,
        confidence_mean,
        model: model.to_string(),
        processing_time,
    })
}
