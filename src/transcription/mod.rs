//! Lyric transcription backends

pub mod whisper;

pub use whisper::WhisperTranscriber;
