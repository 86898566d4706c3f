//! Ordered keyword rules used when neither the manifest nor the filename
//! structure determines a field. Evaluation is first-match-wins.

use crate::data::TestResult;

/// One `(predicate, classification)` pair.
#[derive(Clone, Copy, Debug)]
pub struct KeywordRule<T> {
    /// Any of these substrings (matched on the lowercased name) fires the rule.
    pub keywords: &'static [&'static str],
    /// Classification the rule yields.
    pub outcome: T,
}

impl<T> KeywordRule<T> {
    fn matches(&self, haystack: &str) -> bool {
        self.keywords.iter().any(|keyword| haystack.contains(keyword))
    }
}

/// Module and feature inferred together.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModuleGuess {
    /// Inferred module.
    pub module: &'static str,
    /// Inferred feature.
    pub feature: &'static str,
}

/// Module/feature rules, most specific first.
pub const MODULE_RULES: &[KeywordRule<ModuleGuess>] = &[
    KeywordRule {
        keywords: &["match"],
        outcome: ModuleGuess { module: "games", feature: "match-game" },
    },
    KeywordRule {
        keywords: &["game"],
        outcome: ModuleGuess { module: "games", feature: "unknown-game" },
    },
    KeywordRule {
        keywords: &["ai"],
        outcome: ModuleGuess { module: "content", feature: "ai-content-generation" },
    },
    KeywordRule {
        keywords: &["content"],
        outcome: ModuleGuess { module: "content", feature: "unknown-content" },
    },
    KeywordRule {
        keywords: &["file", "space"],
        outcome: ModuleGuess { module: "file-space", feature: "file-manager" },
    },
];

/// Result rules; success keywords win over failure keywords.
pub const RESULT_RULES: &[KeywordRule<TestResult>] = &[
    KeywordRule {
        keywords: &["success", "pass"],
        outcome: TestResult::Success,
    },
    KeywordRule {
        keywords: &["fail", "error"],
        outcome: TestResult::Failure,
    },
];

/// First rule whose keywords occur in `name` (case-insensitive).
pub fn first_match<T: Copy>(rules: &[KeywordRule<T>], name: &str) -> Option<T> {
    let haystack = name.to_lowercase();
    rules
        .iter()
        .find(|rule| rule.matches(&haystack))
        .map(|rule| rule.outcome)
}

/// Module and feature implied by keywords in `name`.
pub fn infer_module(name: &str) -> Option<ModuleGuess> {
    first_match(MODULE_RULES, name)
}

/// Result implied by keywords in `name`.
pub fn infer_result(name: &str) -> Option<TestResult> {
    first_match(RESULT_RULES, name)
}
