//! Frame rendering
//!
//! Writes display snapshots to stdout, one line per frame. Logs and events
//! go elsewhere so stdout stays pipeable.

use std::io::Write;

use serde::Serialize;

use crate::cli::args::OutputFormat;
use crate::frame::Frame;
use crate::observability::{RunSummary, StopReason};
use crate::sequencer::{ControllerState, SequencerEvent, Snapshot};

/// Line-oriented frame writer.
pub struct Renderer<W: Write> {
    out: W,
    format: OutputFormat,
    frames: u64,
}

#[derive(Serialize)]
struct FrameLine<'a> {
    at_ms: u64,
    #[serde(flatten)]
    state: ControllerState,
    cycle: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    applied: Option<&'a str>,
    display: &'a Frame,
}

#[derive(Serialize)]
struct SummaryLine<'a> {
    stopped: StopReason,
    #[serde(flatten)]
    summary: &'a RunSummary,
}

impl Renderer<std::io::Stdout> {
    /// Renderer on stdout.
    #[must_use]
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(std::io::stdout(), format)
    }
}

impl<W: Write> Renderer<W> {
    /// Wraps a writer.
    pub const fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            frames: 0,
        }
    }

    /// Frames written so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Writes one frame. `events` are the transitions that produced it; the
    /// most recently applied phase is shown alongside the display.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails or JSON serialization fails.
    pub fn frame(
        &mut self,
        snapshot: &Snapshot<Frame>,
        events: &[SequencerEvent],
    ) -> std::io::Result<()> {
        let phase = events.iter().rev().find_map(|event| match event {
            SequencerEvent::PhaseApplied { name, .. } => Some(name.as_str()),
            _ => None,
        });

        match self.format {
            OutputFormat::Human => {
                let state = match snapshot.state {
                    ControllerState::Running { phase } => format!("running:{phase}"),
                    other => other.label().to_string(),
                };
                write!(
                    self.out,
                    "{:>8}ms  #{:<3} {state:<11}",
                    snapshot.at_ms, snapshot.cycle
                )?;
                if let Some(phase) = phase {
                    write!(self.out, " [{phase}]")?;
                }
                writeln!(self.out, "  {}", snapshot.display)?;
            }
            OutputFormat::Json => {
                let line = FrameLine {
                    at_ms: snapshot.at_ms,
                    state: snapshot.state,
                    cycle: snapshot.cycle,
                    applied: phase,
                    display: &snapshot.display,
                };
                serde_json::to_writer(&mut self.out, &line)?;
                writeln!(self.out)?;
            }
        }
        self.frames += 1;
        self.out.flush()
    }

    /// Writes the closing summary line.
    ///
    /// # Errors
    ///
    /// Returns an error if the writer fails or JSON serialization fails.
    pub fn summary(&mut self, reason: StopReason, summary: &RunSummary) -> std::io::Result<()> {
        match self.format {
            OutputFormat::Human => {
                let reason = match reason {
                    StopReason::Completed => "completed",
                    StopReason::DurationElapsed => "duration elapsed",
                    StopReason::EffectFailed => "effect failed",
                    StopReason::Interrupted => "interrupted",
                    StopReason::Terminated => "terminated",
                };
                writeln!(
                    self.out,
                    "-- {reason} after {}ms: {} cycle(s), {} mutation(s), {} reset(s), {} failure(s)",
                    summary.elapsed_ms,
                    summary.cycles,
                    summary.mutations,
                    summary.resets,
                    summary.effect_failures,
                )?;
            }
            OutputFormat::Json => {
                serde_json::to_writer(
                    &mut self.out,
                    &SummaryLine {
                        stopped: reason,
                        summary,
                    },
                )?;
                writeln!(self.out)?;
            }
        }
        self.out.flush()
    }

    /// Consumes the renderer, returning the writer.
    pub fn into_inner(self) -> W {
        self.out
    }
}
