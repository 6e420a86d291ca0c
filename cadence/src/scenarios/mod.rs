//! Built-in sequences
//!
//! Curated sequence files embedded in the binary at compile time, so
//! `cadence play --scenario otp-reveal` works without any file on disk.

use std::sync::LazyLock;

/// A built-in sequence embedded in the binary.
#[derive(Debug)]
pub struct BuiltinScenario {
    /// Unique identifier (kebab-case, e.g., "otp-reveal").
    pub name: &'static str,

    /// Short human-readable description.
    pub description: &'static str,

    /// Tags for filtering.
    pub tags: &'static [&'static str],

    /// Raw YAML content (embedded at compile time).
    pub yaml: &'static str,
}

static BUILTIN_SCENARIOS: LazyLock<Vec<BuiltinScenario>> = LazyLock::new(|| {
    vec![
        BuiltinScenario {
            name: "otp-reveal",
            description: "Six-digit code typed one box at a time, then verified",
            tags: &["reveal", "digits", "auth"],
            yaml: include_str!("../../scenarios/otp-reveal.yaml"),
        },
        BuiltinScenario {
            name: "secure-vault",
            description: "Circuit segments light up, then the vault unlocks and opens",
            tags: &["reveal", "security", "loop"],
            yaml: include_str!("../../scenarios/secure-vault.yaml"),
        },
        BuiltinScenario {
            name: "spam-notifications",
            description: "Staggered notifications stack up, fade, and clear",
            tags: &["stagger", "notifications", "loop"],
            yaml: include_str!("../../scenarios/spam-notifications.yaml"),
        },
        BuiltinScenario {
            name: "realtime-editor",
            description: "A collaborator selects text and applies formatting step by step",
            tags: &["editor", "collaboration", "loop"],
            yaml: include_str!("../../scenarios/realtime-editor.yaml"),
        },
    ]
});

/// Look up a scenario by exact name.
#[must_use]
pub fn find_scenario(name: &str) -> Option<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS.iter().find(|s| s.name == name)
}

/// List all scenarios, optionally filtered by tag.
#[must_use]
pub fn list_scenarios(tag: Option<&str>) -> Vec<&'static BuiltinScenario> {
    BUILTIN_SCENARIOS
        .iter()
        .filter(|s| tag.is_none_or(|t| s.tags.contains(&t)))
        .collect()
}

/// Suggest a similar scenario name for typo correction.
///
/// Returns the closest match if its Damerau-Levenshtein distance is at
/// most 3.
#[must_use]
pub fn suggest_scenario(input: &str) -> Option<String> {
    BUILTIN_SCENARIOS
        .iter()
        .map(|s| (s.name, strsim::damerau_levenshtein(input, s.name)))
        .filter(|(_, dist)| *dist <= 3)
        .min_by_key(|(_, dist)| *dist)
        .map(|(name, _)| name.to_string())
}

/// Returns all scenario names in registry order.
#[must_use]
pub fn list_scenario_names() -> Vec<&'static str> {
    BUILTIN_SCENARIOS.iter().map(|s| s.name).collect()
}
