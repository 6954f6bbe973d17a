//! CLI argument parsing and configuration

use clap::Parser;
use std::path::PathBuf;

/// chordscope - audio analysis with chord progression recognition
///
/// Extracts spectral/timbral and rhythm/tonal descriptors, decodes a chord
/// progression with summary statistics, and optionally transcribes lyrics.
#[derive(Parser, Debug)]
#[command(name = "chordscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Audio file to analyze
    #[arg(short, long, value_name = "PATH")]
    pub input: PathBuf,

    /// Write the analysis record as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Where the file came from
    #[arg(long, default_value = "local")]
    #[arg(value_parser = ["upload", "google-drive", "local"])]
    pub source: String,

    /// Original location of the file (e.g. a Drive path)
    #[arg(long, value_name = "PATH")]
    pub source_path: Option<String>,

    /// Transcribe lyrics with the Whisper API
    #[arg(long, default_value = "false")]
    pub lyrics: bool,

    /// Language hint for transcription (e.g. en, ja, es)
    #[arg(long, value_name = "CODE")]
    pub language: Option<String>,

    /// OpenAI API key used for transcription
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Transcription timeout in seconds
    #[arg(long, value_name = "SECS", default_value = "120")]
    pub transcription_timeout: u64,

    /// Chord decisions per second
    #[arg(long, value_name = "HZ", default_value = "10")]
    pub frame_rate: f64,

    /// Run rhythm/tonal extraction and chord recognition concurrently
    #[arg(long, default_value = "false")]
    pub parallel: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, default_value = "false")]
    pub quiet: bool,
}

impl Cli {
    /// Get the log level based on verbosity flags
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }
}
