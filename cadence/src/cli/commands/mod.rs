//! CLI command dispatch and handlers
//!
//! Routes parsed CLI arguments to the appropriate command handler, and holds
//! the pieces `play` and `simulate` share: resolving a sequence source and
//! tracking why a run was asked to stop.

pub mod completions;
pub mod list;
pub mod play;
pub mod simulate;
pub mod validate;
pub mod version;

use std::path::Path;
use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;

use crate::cli::args::{Cli, Commands, SourceArgs};
use crate::config::loader::{ConfigLoader, inline_source};
use crate::config::Sequence;
use crate::error::{CadenceError, ExitCode};
use crate::observability::{EventEmitter, StopReason};
use crate::scenarios::{find_scenario, suggest_scenario};
use crate::sequencer::{Repeat, SequencerEvent};

/// Dispatch a parsed CLI invocation to the appropriate command handler.
///
/// # Errors
///
/// Returns an error if the dispatched command handler fails.
pub async fn dispatch(cli: Cli, shutdown: Shutdown) -> Result<(), CadenceError> {
    match cli.command {
        Commands::Play(args) => play::run(&args, &shutdown).await,
        Commands::Simulate(args) => simulate::run(&args),
        Commands::Validate(args) => validate::run(&args),
        Commands::List(args) => list::run(&args),
        Commands::Completions(args) => {
            completions::run(&args);
            Ok(())
        }
        Commands::Version(args) => {
            version::run(&args);
            Ok(())
        }
    }
}

// ============================================================================
// Shutdown
// ============================================================================

/// Cancellation shared between the signal handler and the running command.
///
/// The first signal wins; its reason decides the process exit code.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
    reason: Arc<OnceLock<StopReason>>,
}

impl Shutdown {
    /// Creates an untriggered handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `reason` (if none was recorded yet) and cancels.
    pub fn trigger(&self, reason: StopReason) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    /// Resolves once [`trigger`](Self::trigger) has been called.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Whether a shutdown was requested.
    #[must_use]
    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }

    /// The recorded reason, if triggered.
    #[must_use]
    pub fn reason(&self) -> Option<StopReason> {
        self.reason.get().copied()
    }

    /// Exit code for a signal-driven shutdown.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        match self.reason()? {
            StopReason::Interrupted => Some(ExitCode::INTERRUPTED),
            StopReason::Terminated => Some(ExitCode::TERMINATED),
            _ => None,
        }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Loads, validates, and compiles the sequence named by `source`.
///
/// # Errors
///
/// Returns a usage error for an unknown scenario or a zero `--cycles`, and
/// a config or sequencer error if the sequence fails to load or compile.
pub(crate) fn load_sequence(
    source: &SourceArgs,
    cycles: Option<u64>,
) -> Result<Sequence, CadenceError> {
    let loader = ConfigLoader::with_defaults();

    let loaded = match (&source.sequence, &source.scenario) {
        (Some(path), _) => {
            tracing::info!(sequence = %path.display(), "loading sequence");
            loader.load(path)?
        }
        (None, Some(name)) => {
            let scenario = find_scenario(name).ok_or_else(|| {
                let hint = suggest_scenario(name)
                    .map(|s| format!(" (did you mean '{s}'?)"))
                    .unwrap_or_default();
                CadenceError::Usage(format!("unknown scenario '{name}'{hint}"))
            })?;
            tracing::info!(scenario = scenario.name, "loading built-in scenario");
            loader.load_from_str(scenario.yaml, &inline_source(scenario.name))?
        }
        (None, None) => {
            return Err(CadenceError::Usage(
                "either --sequence or --scenario is required".to_string(),
            ));
        }
    };

    for warning in &loaded.warnings {
        tracing::warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }

    let sequence = Sequence::compile_with_limits(&loaded.config, loader.limits())?;
    match cycles {
        None => Ok(sequence),
        Some(0) => Err(CadenceError::Usage(
            "--cycles must be at least 1".to_string(),
        )),
        Some(n) => Ok(sequence.with_repeat(Repeat::Times(n))),
    }
}

/// JSONL event sink: the given file, or nothing.
pub(crate) fn event_emitter(path: Option<&Path>) -> Result<EventEmitter, CadenceError> {
    match path {
        Some(path) => Ok(EventEmitter::from_file(path)?),
        None => Ok(EventEmitter::noop()),
    }
}

/// Why a batch of transitions ends a run, if it does.
pub(crate) fn terminal_reason(events: &[SequencerEvent]) -> Option<StopReason> {
    events.iter().find_map(|event| match event {
        SequencerEvent::Finished { .. } => Some(StopReason::Completed),
        SequencerEvent::EffectFailed { .. } => Some(StopReason::EffectFailed),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(sequence: Option<&str>, scenario: Option<&str>) -> SourceArgs {
        SourceArgs {
            sequence: sequence.map(Into::into),
            scenario: scenario.map(Into::into),
        }
    }

    #[test]
    fn test_shutdown_first_reason_wins() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_triggered());
        assert_eq!(shutdown.exit_code(), None);

        shutdown.trigger(StopReason::Terminated);
        shutdown.trigger(StopReason::Interrupted);
        assert!(shutdown.is_triggered());
        assert_eq!(shutdown.reason(), Some(StopReason::Terminated));
        assert_eq!(shutdown.exit_code(), Some(ExitCode::TERMINATED));
    }

    #[test]
    fn test_shutdown_clones_share_state() {
        let shutdown = Shutdown::new();
        let handle = shutdown.clone();
        handle.trigger(StopReason::Interrupted);
        assert_eq!(shutdown.exit_code(), Some(ExitCode::INTERRUPTED));
    }

    #[test]
    fn test_load_builtin_scenario() {
        let sequence = load_sequence(&source(None, Some("otp-reveal")), Some(2)).unwrap();
        assert_eq!(sequence.name, "otp-reveal");
        assert_eq!(sequence.cycle.repeat, Repeat::Times(2));
    }

    #[test]
    fn test_unknown_scenario_suggests() {
        let err = load_sequence(&source(None, Some("otp-revael")), None).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
        assert!(err.to_string().contains("did you mean 'otp-reveal'"));
    }

    #[test]
    fn test_zero_cycles_rejected() {
        let err = load_sequence(&source(None, Some("otp-reveal")), Some(0)).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::USAGE_ERROR);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = load_sequence(&source(Some("/nonexistent/seq.yaml"), None), None).unwrap_err();
        assert_eq!(err.exit_code(), ExitCode::CONFIG_ERROR);
    }

    #[test]
    fn test_terminal_reason() {
        let events = vec![
            SequencerEvent::CycleCompleted { at_ms: 10, cycle: 1 },
            SequencerEvent::Finished { at_ms: 10, cycles: 1 },
        ];
        assert_eq!(terminal_reason(&events), Some(StopReason::Completed));
        assert_eq!(terminal_reason(&events[..1]), None);
    }

    #[test]
    fn test_effect_failure_is_terminal() {
        let events = vec![SequencerEvent::EffectFailed {
            at_ms: 5,
            cycle: 1,
            ordinal: 3,
            name: "unlock".to_string(),
            error: "lock jammed".to_string(),
        }];
        assert_eq!(terminal_reason(&events), Some(StopReason::EffectFailed));
    }
}
