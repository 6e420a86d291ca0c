//! Structured event stream for `Cadence`.
//!
//! Discrete, typed events emitted while a sequence plays. Events are
//! serialized as newline-delimited JSON (JSONL) with a monotonically
//! increasing sequence number.

use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sequencer::{ControllerStats, SequencerEvent};

// ---------------------------------------------------------------------------
// Event variants
// ---------------------------------------------------------------------------

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The configured number of passes finished
    Completed,
    /// The `--duration` limit elapsed
    DurationElapsed,
    /// An effect failed and the sequencer went idle
    EffectFailed,
    /// SIGINT
    Interrupted,
    /// SIGTERM
    Terminated,
}

/// Counters reported when a run ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Milliseconds the run lasted
    pub elapsed_ms: u64,
    /// Passes completed
    pub cycles: u64,
    /// Effects applied
    pub mutations: u64,
    /// Display resets
    pub resets: u64,
    /// Effect failures
    pub effect_failures: u64,
    /// Dropped stale transitions
    pub stale_fires: u64,
    /// Cancelled transitions
    pub timers_cancelled: u64,
}

impl RunSummary {
    /// Builds a summary from controller counters.
    #[must_use]
    pub const fn from_stats(stats: ControllerStats, elapsed_ms: u64) -> Self {
        Self {
            elapsed_ms,
            cycles: stats.cycles_completed,
            mutations: stats.mutations,
            resets: stats.resets,
            effect_failures: stats.effect_failures,
            stale_fires: stats.stale_fires,
            timers_cancelled: stats.timers_cancelled,
        }
    }
}

/// A discrete event emitted during a run.
///
/// Each variant is tagged with `"type"` when serialized to JSON so consumers
/// can dispatch on the event kind.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum Event {
    /// A sequence was mounted.
    RunStarted {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Sequence name. Distinct from the envelope's `sequence` counter.
        sequence_name: String,
        /// Number of phases after expansion.
        phases: usize,
        /// `"play"` or `"simulate"`.
        mode: String,
    },

    /// The sequencer did something.
    Transition {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// What happened, with its offset from mount.
        event: SequencerEvent,
    },

    /// The run ended.
    RunStopped {
        /// Wall-clock time.
        timestamp: DateTime<Utc>,
        /// Why.
        reason: StopReason,
        /// Final counters.
        summary: RunSummary,
    },
}

impl Event {
    /// Wraps a sequencer event with the current time.
    #[must_use]
    pub fn transition(event: SequencerEvent) -> Self {
        Self::Transition {
            timestamp: Utc::now(),
            event,
        }
    }
}

/// Wraps an [`Event`] with a monotonically increasing sequence number.
#[derive(Debug, Serialize)]
struct EventEnvelope {
    /// Zero-based, monotonically increasing sequence counter.
    sequence: u64,
    /// The wrapped event (flattened into the same JSON object).
    #[serde(flatten)]
    event: Event,
}

// ---------------------------------------------------------------------------
// Emitter
// ---------------------------------------------------------------------------

/// Thread-safe, buffered JSONL event writer.
///
/// Serialization or I/O failures are dropped; a broken event sink never
/// stops playback.
pub struct EventEmitter {
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    sequence: AtomicU64,
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("sequence", &self.sequence.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl EventEmitter {
    /// Creates an emitter that writes to the given writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write + Send>) -> Self {
        Self {
            writer: Mutex::new(BufWriter::new(writer)),
            sequence: AtomicU64::new(0),
        }
    }

    /// Creates an emitter that silently discards all events.
    #[must_use]
    pub fn noop() -> Self {
        Self::new(Box::new(std::io::sink()))
    }

    /// Creates an emitter that writes to a file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be created or opened.
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        let file = std::fs::File::create(path)?;
        Ok(Self::new(Box::new(file)))
    }

    /// Emits an event as a single JSONL line.
    pub fn emit(&self, event: Event) {
        let seq = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope {
            sequence: seq,
            event,
        };

        if let Ok(mut w) = self.writer.lock() {
            if let Ok(line) = serde_json::to_string(&envelope) {
                let _ = writeln!(w, "{line}");
                let _ = w.flush();
            }
        }
    }

    /// Emits every sequencer event in order.
    pub fn emit_transitions(&self, events: impl IntoIterator<Item = SequencerEvent>) {
        for event in events {
            self.emit(Event::transition(event));
        }
    }

    /// Returns the number of events emitted so far.
    #[must_use]
    pub fn event_count(&self) -> u64 {
        self.sequence.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex as StdMutex};

    use super::*;

    #[derive(Clone)]
    struct TestWriter(Arc<StdMutex<Vec<u8>>>);

    impl TestWriter {
        fn new() -> Self {
            Self(Arc::new(StdMutex::new(Vec::new())))
        }

        fn lines(&self) -> Vec<serde_json::Value> {
            let buf = self.0.lock().unwrap();
            String::from_utf8_lossy(&buf)
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for TestWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn started() -> Event {
        Event::RunStarted {
            timestamp: DateTime::parse_from_rfc3339("2026-02-04T10:15:30Z")
                .unwrap()
                .with_timezone(&Utc),
            sequence_name: "otp-reveal".to_owned(),
            phases: 12,
            mode: "play".to_owned(),
        }
    }

    #[test]
    fn emitter_writes_flat_envelope() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(started());

        let lines = tw.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["type"], "RunStarted");
        assert_eq!(lines[0]["phases"], 12);
        assert_eq!(lines[0]["sequence_name"], "otp-reveal");
    }

    #[test]
    fn run_started_has_one_sequence_key() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit(started());

        let raw = String::from_utf8(tw.0.lock().unwrap().clone()).unwrap();
        assert_eq!(raw.matches("\"sequence\":").count(), 1, "{raw}");
    }

    #[test]
    fn transitions_nest_the_sequencer_event() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        emitter.emit_transitions([
            SequencerEvent::CycleStarted { at_ms: 0, cycle: 1 },
            SequencerEvent::HoldEntered {
                at_ms: 200,
                cycle: 1,
            },
        ]);

        assert_eq!(emitter.event_count(), 2);
        let lines = tw.lines();
        assert_eq!(lines[0]["type"], "Transition");
        assert_eq!(lines[0]["event"]["event"], "cycle_started");
        assert_eq!(lines[1]["sequence"], 1);
        assert_eq!(lines[1]["event"]["at_ms"], 200);
    }

    #[test]
    fn run_stopped_carries_summary() {
        let tw = TestWriter::new();
        let emitter = EventEmitter::new(Box::new(tw.clone()));
        let stats = ControllerStats {
            mutations: 4,
            cycles_completed: 2,
            resets: 2,
            ..ControllerStats::default()
        };
        emitter.emit(Event::RunStopped {
            timestamp: Utc::now(),
            reason: StopReason::Completed,
            summary: RunSummary::from_stats(stats, 1_500),
        });

        let lines = tw.lines();
        assert_eq!(lines[0]["reason"], "completed");
        assert_eq!(lines[0]["summary"]["cycles"], 2);
        assert_eq!(lines[0]["summary"]["elapsed_ms"], 1_500);
    }

    #[test]
    fn noop_counts_but_discards() {
        let emitter = EventEmitter::noop();
        emitter.emit(started());
        assert_eq!(emitter.event_count(), 1);
    }
}
