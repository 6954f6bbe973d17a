//! chordscope CLI entry point

use chordscope::config::{Cli, Settings};
use chordscope::export;
use chordscope::pipeline::{AnalysisOrchestrator, AnalysisRequest};
use chordscope::types::{AnalysisRecord, AudioSource};
use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Initialize logging
    init_logging(&cli);

    // Validate inputs
    if let Err(e) = validate_inputs(&cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    // Build settings from CLI
    let settings = Settings::from_cli(&cli);
    if let Err(e) = settings.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    let source: AudioSource = match cli.source.parse() {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut request =
        AnalysisRequest::new(&cli.input).with_source(source, cli.source_path.clone());
    if cli.lyrics {
        request = request.with_lyrics(cli.language.clone());
    }

    let orchestrator = AnalysisOrchestrator::with_defaults(settings);
    let record = match orchestrator.analyze(&request) {
        Ok(record) => record,
        Err(e) => {
            eprintln!("Fatal error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    print_summary(&record);

    if let Some(output) = &cli.output {
        if let Err(e) = export::write_record(&record, output) {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
        println!("✓ Wrote analysis record to {}", output.display());
    }

    ExitCode::SUCCESS
}

fn init_logging(cli: &Cli) {
    let filter = cli.log_level().to_string().to_lowercase();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

fn validate_inputs(cli: &Cli) -> Result<(), String> {
    if !cli.input.is_file() {
        return Err(format!(
            "Input file does not exist: {}\n\n  Tip: Check the path is correct and accessible.\n  Example:\n    chordscope -i ./track.mp3 -o ./track.json",
            cli.input.display()
        ));
    }

    if let Some(output) = &cli.output {
        if output.is_dir() {
            return Err(format!(
                "Output path is a directory: {}\n\n  Tip: Pass a file name, e.g. -o {}",
                output.display(),
                output.join("record.json").display()
            ));
        }
    }

    if cli.lyrics && cli.openai_api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        tracing::warn!("--lyrics given without an OpenAI API key; transcription will be skipped");
    }

    Ok(())
}

fn print_summary(record: &AnalysisRecord) {
    let chords = &record.chord_progression;

    println!();
    println!("{}", record.file.filename);
    println!(
        "  Duration:   {:.1}s @ {} Hz",
        record.file.duration, record.file.sample_rate
    );
    if let (Some(title), Some(artist)) = (&record.metadata.title, &record.metadata.artist) {
        println!("  Track:      {} - {}", artist, title);
    }
    if let (Some(bpm), Some(key), Some(scale)) = (
        record.secondary_features.scalar("bpm"),
        record.secondary_features.label("key_key"),
        record.secondary_features.label("key_scale"),
    ) {
        println!("  Tempo/key:  {:.1} BPM, {} {}", bpm, key, scale);
    }
    println!(
        "  Chords:     {} events, {} unique, {} transitions",
        chords.events.len(),
        chords.unique_chords.len(),
        chords.transition_count()
    );
    if let Some(most_common) = chords.most_common_chord {
        println!("  Most common: {}", most_common);
    }
    if let (Some(key), Some(mode)) = (chords.key, chords.mode) {
        println!("  Key (est.): {} {:?} (heuristic)", key, mode);
    }
    if let Some(transcription) = &record.transcription {
        println!(
            "  Lyrics:     {} segments ({})",
            transcription.segments.len(),
            transcription.language.as_deref().unwrap_or("unknown language")
        );
    }
    println!("  Processed in {:.2}s", record.total_processing_time);
}
