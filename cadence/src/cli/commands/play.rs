//! `play`: run a sequence against the wall clock.

use chrono::Utc;
use tokio_stream::StreamExt;

use crate::cli::args::PlayArgs;
use crate::error::CadenceError;
use crate::observability::{Event, RunSummary, StopReason, init_metrics};
use crate::render::Renderer;
use crate::sequencer::SequencerEvent;
use crate::sequencer::controller::millis;

use super::{Shutdown, event_emitter, load_sequence, terminal_reason};

/// Plays a sequence until it finishes, `--duration` elapses, or a signal
/// arrives. Each published snapshot is rendered as one line on stdout.
///
/// # Errors
///
/// Returns a config, usage, or sequencer error if the sequence cannot be
/// mounted, an I/O error if stdout or the events file fails, and the
/// effect error if a phase effect failed during playback.
pub async fn run(args: &PlayArgs, shutdown: &Shutdown) -> Result<(), CadenceError> {
    let sequence = load_sequence(&args.source, args.cycles)?;

    if let Some(port) = args.metrics_port {
        init_metrics(Some(port))?;
        tracing::info!(port, "Prometheus metrics endpoint started");
    }

    let emitter = event_emitter(args.events_file.as_deref())?;
    let mut renderer = Renderer::stdout(args.format);

    emitter.emit(Event::RunStarted {
        timestamp: Utc::now(),
        sequence_name: sequence.name.clone(),
        phases: sequence.timeline.len(),
        mode: "play".to_string(),
    });

    let (player, mut events) = sequence.play()?;
    tracing::debug!(instance = %player.id(), "playing");
    let mut snapshots = player.stream();

    let limit = async {
        match args.duration {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(limit);

    // Events for the next frame. Drained before snapshots so a frame is
    // labelled with the transitions that produced it.
    let mut pending: Vec<SequencerEvent> = Vec::new();

    let reason = loop {
        tokio::select! {
            biased;

            () = shutdown.cancelled() => {
                break shutdown.reason().unwrap_or(StopReason::Interrupted);
            }
            () = &mut limit => break StopReason::DurationElapsed,
            Some(event) = events.recv() => {
                emitter.emit(Event::transition(event.clone()));
                pending.push(event);
                if let Some(reason) = terminal_reason(&pending) {
                    break reason;
                }
            }
            Some(snapshot) = snapshots.next() => {
                renderer.frame(&snapshot, &pending)?;
                pending.clear();
            }
        }
    };

    if !pending.is_empty() {
        renderer.frame(&player.snapshot(), &pending)?;
    }

    let failure = player.take_failure();
    let elapsed_ms = millis(player.elapsed());
    let report = player.unmount().await;
    let summary = RunSummary::from_stats(report.stats, elapsed_ms);
    tracing::info!(
        reason = ?reason,
        cycles = summary.cycles,
        cancelled = report.cancelled,
        "playback stopped"
    );

    emitter.emit(Event::RunStopped {
        timestamp: Utc::now(),
        reason,
        summary,
    });
    renderer.summary(reason, &summary)?;

    failure.map_or(Ok(()), |e| Err(e.into()))
}
