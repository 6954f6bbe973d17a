//! Chord sequence analysis
//!
//! Turns fixed-rate frame labels into timed chord events and derives the
//! progression statistics: ordered sequence, unique set, transition counts,
//! most common chord, confidence mean and a tonic/mode estimate.

use crate::chords::recognizer::FrameLabel;
use crate::config::{ChordSettings, Prevalence, TailDuration};
use crate::types::{ChordEvent, ChordLabel, ChordProgressionSummary};
use std::collections::{BTreeMap, HashMap};

/// Maximal run of identical frame labels
struct Run {
    start_time: f64,
    label: ChordLabel,
    frames: usize,
    confidence_sum: f64,
    /// Every frame in the run carried a confidence
    all_confident: bool,
}

impl Run {
    fn start(frame: &FrameLabel) -> Self {
        Self {
            start_time: frame.time,
            label: frame.label,
            frames: 0,
            confidence_sum: 0.0,
            all_confident: true,
        }
    }

    fn push(&mut self, frame: &FrameLabel) {
        self.frames += 1;
        match frame.confidence {
            Some(c) => self.confidence_sum += c,
            None => self.all_confident = false,
        }
    }

    fn confidence(&self, default: f64) -> f64 {
        if self.all_confident && self.frames > 0 {
            self.confidence_sum / self.frames as f64
        } else {
            default
        }
    }
}

fn run_length(frames: &[FrameLabel]) -> Vec<Run> {
    let mut runs: Vec<Run> = Vec::new();
    for frame in frames {
        match runs.last_mut() {
            Some(run) if run.label == frame.label => run.push(frame),
            _ => {
                let mut run = Run::start(frame);
                run.push(frame);
                runs.push(run);
            }
        }
    }
    runs
}

/// Summarize a chronological frame-label sequence
///
/// `analyzer` names the classifier that produced the labels. Empty input
/// yields an empty summary, never an error.
pub fn summarize(
    frames: &[FrameLabel],
    settings: &ChordSettings,
    analyzer: &str,
) -> ChordProgressionSummary {
    let runs = run_length(frames);

    let mut events = Vec::with_capacity(runs.len());
    for (i, run) in runs.iter().enumerate() {
        let duration = match runs.get(i + 1) {
            Some(next) => next.start_time - run.start_time,
            None => match settings.tail {
                TailDuration::FrameSpan => run.frames as f64 * settings.frame_period(),
                TailDuration::Fixed(secs) => secs,
            },
        };
        events.push(ChordEvent {
            start_time: run.start_time,
            chord: run.label,
            duration,
            confidence: run.confidence(settings.default_confidence),
        });
    }

    // Weights in first-seen order for the most-common vote
    let weights: Vec<(ChordLabel, usize)> = match settings.prevalence {
        Prevalence::Frames => tally(runs.iter().map(|r| (r.label, r.frames))),
        Prevalence::Segments => tally(runs.iter().map(|r| (r.label, 1))),
    };

    let mut summary = statistics(events, &weights);
    summary.analyzer = analyzer.to_string();
    summary
}

/// Merge adjacent events with the same chord
///
/// Durations are summed and confidences averaged by duration. Applying it to
/// its own output is a no-op.
pub fn merge_events(events: &[ChordEvent]) -> Vec<ChordEvent> {
    let mut merged: Vec<ChordEvent> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(last) if last.chord == event.chord => {
                let total = last.duration + event.duration;
                if total > 0.0 {
                    last.confidence =
                        (last.confidence * last.duration + event.confidence * event.duration) / total;
                }
                last.duration = total;
            }
            _ => merged.push(event.clone()),
        }
    }
    merged
}

/// Sum weights per label, preserving first-seen order
fn tally(items: impl Iterator<Item = (ChordLabel, usize)>) -> Vec<(ChordLabel, usize)> {
    let mut order: Vec<(ChordLabel, usize)> = Vec::new();
    let mut position: HashMap<ChordLabel, usize> = HashMap::new();
    for (label, weight) in items {
        match position.get(&label) {
            Some(&idx) => order[idx].1 += weight,
            None => {
                position.insert(label, order.len());
                order.push((label, weight));
            }
        }
    }
    order
}

fn statistics(events: Vec<ChordEvent>, weights: &[(ChordLabel, usize)]) -> ChordProgressionSummary {
    let sequence: Vec<ChordLabel> = events.iter().map(|e| e.chord).collect();
    let unique_chords = sequence.iter().copied().collect();

    let mut transitions = BTreeMap::new();
    for pair in sequence.windows(2) {
        *transitions.entry((pair[0], pair[1])).or_insert(0) += 1;
    }

    // Strictly-greater keeps the first-seen label on ties
    let mut most_common: Option<(ChordLabel, usize)> = None;
    for &(label, weight) in weights {
        if most_common.map_or(true, |(_, best)| weight > best) {
            most_common = Some((label, weight));
        }
    }
    let most_common_chord = most_common.map(|(label, _)| label);

    let confidence_mean = if events.is_empty() {
        0.0
    } else {
        events.iter().map(|e| e.confidence).sum::<f64>() / events.len() as f64
    };

    // Tonic heuristic: the most common chord's root and quality
    let (key, mode) = match most_common_chord {
        Some(ChordLabel::Triad { root, quality }) => (Some(root), Some(quality.mode())),
        _ => (None, None),
    };

    ChordProgressionSummary {
        events,
        sequence,
        unique_chords,
        transitions,
        most_common_chord,
        key,
        mode,
        confidence_mean,
        analyzer: String::new(),
    }
}
