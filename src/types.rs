/// Stable artifact identifier derived from the recording's path relative to the input root.
/// Examples: `20240101_games_MatchGame_fail_v1.0.0_001`, `match-game-chromium__video`
pub type VideoId = String;
/// Product module a recording belongs to.
/// Examples: `games`, `content`, `file-space`, `system`
pub type ModuleName = String;
/// Feature within a module.
/// Examples: `MatchGame`, `ai-content-generation`, `unknown`
pub type FeatureName = String;
/// Browser/project name reported by the test runner.
/// Examples: `chromium`, `firefox`, `webkit`
pub type BrowserName = String;
/// Identifier of an entry in the memory log.
/// Example: `20240101_games_MatchGame_fail_v1.0.0_001-m3`
pub type MemoryId = String;
/// Failure-pattern fingerprint.
/// Examples: `pause-overlay-blocking`, `stage-gameplay-3f9a01bc`
pub type PatternId = String;
/// Semantic version label carried in structured filenames.
/// Example: `v1.0.0`
pub type VersionLabel = String;
/// Human-readable message stored in reports and logs.
/// Example: `processing success rate 80.0% is below 90%`
pub type Message = String;
