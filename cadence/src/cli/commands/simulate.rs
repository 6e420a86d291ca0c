//! `simulate`: step a sequence on a virtual clock.
//!
//! Output is deterministic, so this is also what the end-to-end tests
//! drive.

use chrono::Utc;

use crate::cli::args::SimulateArgs;
use crate::error::CadenceError;
use crate::observability::{Event, RunSummary, StopReason};
use crate::render::Renderer;
use crate::sequencer::controller::millis;

use super::{event_emitter, load_sequence, terminal_reason};

/// Advances the sequence up to `--until`, rendering a frame at every
/// transition or, with `--step`, at every multiple of the step.
///
/// # Errors
///
/// Returns a config, usage, or sequencer error if the sequence cannot be
/// mounted, an I/O error if stdout or the events file fails, and the
/// effect error if a phase effect failed.
pub fn run(args: &SimulateArgs) -> Result<(), CadenceError> {
    if args.step.is_some_and(|step| step.is_zero()) {
        return Err(CadenceError::Usage(
            "--step must be greater than zero".to_string(),
        ));
    }

    let sequence = load_sequence(&args.source, args.cycles)?;
    let emitter = event_emitter(args.events_file.as_deref())?;
    let mut renderer = Renderer::stdout(args.format);

    emitter.emit(Event::RunStarted {
        timestamp: Utc::now(),
        sequence_name: sequence.name.clone(),
        phases: sequence.timeline.len(),
        mode: "simulate".to_string(),
    });

    let (mut guard, started) = sequence.mount()?;
    tracing::debug!(instance = %guard.id(), until = ?args.until, "simulating");
    emitter.emit_transitions(started.iter().cloned());
    renderer.frame(&guard.controller().snapshot(), &started)?;

    let mut outcome = terminal_reason(&started);

    while outcome.is_none() {
        let next = match args.step {
            Some(step) => guard.controller().now() + step,
            None => match guard.controller().next_deadline() {
                Some(deadline) => deadline,
                None => break,
            },
        };
        if next > args.until {
            break;
        }

        let events = guard.advance_to(next);
        emitter.emit_transitions(events.iter().cloned());
        renderer.frame(&guard.controller().snapshot(), &events)?;
        outcome = terminal_reason(&events);
    }

    // Still running at `until`: bring the clock up to it, firing anything
    // due between the last rendered instant and the limit.
    if outcome.is_none() && guard.controller().next_deadline().is_some() {
        let events = guard.advance_to(args.until);
        if !events.is_empty() {
            emitter.emit_transitions(events.iter().cloned());
            renderer.frame(&guard.controller().snapshot(), &events)?;
            outcome = terminal_reason(&events);
        }
    }

    // Nothing left scheduled without finishing: the run went idle on its
    // own.
    let reason = outcome.unwrap_or_else(|| {
        if guard.controller().next_deadline().is_some() {
            StopReason::DurationElapsed
        } else {
            StopReason::Completed
        }
    });

    let failure = guard.take_failure();
    let elapsed_ms = millis(guard.controller().now());
    let report = guard.unmount();
    let summary = RunSummary::from_stats(report.stats, elapsed_ms);

    emitter.emit(Event::RunStopped {
        timestamp: Utc::now(),
        reason,
        summary,
    });
    renderer.summary(reason, &summary)?;

    failure.map_or(Ok(()), |e| Err(e.into()))
}
