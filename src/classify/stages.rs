//! Per-module stage templates used when the manifest reports no steps.

use crate::data::{Priority, StageHints, StageResult, TestResult, TestStage};

/// How a template stage's outcome is decided.
#[derive(Clone, Copy, Debug)]
enum Outcome {
    /// Always passes.
    Pass,
    /// Follows the overall test result.
    FollowsResult,
}

struct StageTemplate {
    name: &'static str,
    outcome: Outcome,
    causes: &'static [&'static str],
    fixes: &'static [&'static str],
    debug: &'static [&'static str],
    priority: Priority,
}

const BASE_STAGES: &[StageTemplate] = &[
    StageTemplate {
        name: "home navigation",
        outcome: Outcome::Pass,
        causes: &["home page failed to load", "navigation link missing or renamed"],
        fixes: &["check the home route renders", "verify navigation selectors"],
        debug: &["open the trace at the first navigation", "inspect network errors"],
        priority: Priority::Medium,
    },
    StageTemplate {
        name: "feature entry",
        outcome: Outcome::Pass,
        causes: &["feature entry point hidden behind a dialog", "feature flag disabled"],
        fixes: &["dismiss blocking dialogs before entering", "enable the feature in the test environment"],
        debug: &["screenshot the page before the entry click"],
        priority: Priority::Medium,
    },
    StageTemplate {
        name: "core functionality",
        outcome: Outcome::FollowsResult,
        causes: &["logic regression in the feature", "test data out of date"],
        fixes: &["compare against the last passing recording", "refresh fixtures"],
        debug: &["replay the trace step by step", "check console errors"],
        priority: Priority::High,
    },
];

const GAMES_STAGES: &[StageTemplate] = &[
    StageTemplate {
        name: "game configuration",
        outcome: Outcome::Pass,
        causes: &["configuration panel did not open", "invalid default options"],
        fixes: &["verify the configuration panel selectors"],
        debug: &["inspect the configuration state in the trace"],
        priority: Priority::Medium,
    },
    StageTemplate {
        name: "gameplay",
        outcome: Outcome::FollowsResult,
        causes: &["pause overlay blocking input", "canvas not focused", "timing-sensitive animation"],
        fixes: &["resume the game before interacting", "wait for the scene to settle"],
        debug: &["step through pointer events in the trace", "check frame timing"],
        priority: Priority::High,
    },
    StageTemplate {
        name: "memory science validation",
        outcome: Outcome::FollowsResult,
        causes: &["spaced-repetition state not persisted", "score not reported"],
        fixes: &["verify progress is saved after the round"],
        debug: &["inspect storage writes at the end of the round"],
        priority: Priority::Medium,
    },
];

const CONTENT_STAGES: &[StageTemplate] = &[
    StageTemplate {
        name: "grading level check",
        outcome: Outcome::Pass,
        causes: &["level selector missing", "vocabulary list empty"],
        fixes: &["seed the vocabulary list"],
        debug: &["inspect the level selector state"],
        priority: Priority::Low,
    },
    StageTemplate {
        name: "ai content generation",
        outcome: Outcome::FollowsResult,
        causes: &["generation request timed out", "empty response from the generator"],
        fixes: &["raise the generation timeout", "stub the generator in tests"],
        debug: &["check the generation request and response in the trace"],
        priority: Priority::High,
    },
];

fn module_stages(module: &str) -> &'static [StageTemplate] {
    match module {
        "games" => GAMES_STAGES,
        "content" => CONTENT_STAGES,
        _ => &[],
    }
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}

/// Synthesize the default stage list for `module`.
///
/// Every module starts with the base stages; `games` and `content` append their own.
pub fn default_stages(module: &str, result: TestResult) -> Vec<TestStage> {
    BASE_STAGES
        .iter()
        .chain(module_stages(module))
        .enumerate()
        .map(|(idx, template)| {
            let stage_result = match (template.outcome, result) {
                (Outcome::FollowsResult, TestResult::Failure) => StageResult::Fail,
                _ => StageResult::Pass,
            };
            TestStage {
                stage_number: idx as u32 + 1,
                name: template.name.to_string(),
                result: stage_result,
                error_detail: None,
                hints: Some(StageHints {
                    possible_causes: owned(template.causes),
                    suggested_fixes: owned(template.fixes),
                    debug_steps: owned(template.debug),
                    priority: template.priority,
                }),
            }
        })
        .collect()
}
