//! Append-only memory log with an aggregate recomputed from the full list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::constants::stores::MAX_RELATED_MEMORIES;
use crate::data::{ArtifactRecord, Priority, StageResult, TestResult, TestStage};
use crate::errors::PipelineError;
use crate::metrics::{ModuleStats, breakdown, success_rate};
use crate::stores::json_file::{JsonFileStore, StoreDocument};
use crate::stores::{ArtifactQuery, Queryable};
use crate::types::{BrowserName, FeatureName, MemoryId, ModuleName, VideoId};

/// What one stage contributed to a memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMemory {
    /// 1-based stage position.
    pub stage_number: u32,
    /// Stage name.
    pub name: String,
    /// Pass or fail.
    pub result: StageResult,
    /// One-line description of the stage outcome.
    pub memory: String,
}

/// Performance figures captured with a memory.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    /// Test duration.
    pub duration_ms: u64,
    /// Source size in bytes.
    pub file_size: u64,
    /// Size reduction in percent.
    pub compression_ratio: f64,
}

/// One processed artifact as remembered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryEntry {
    /// `{videoId}-m{n}`.
    pub memory_id: MemoryId,
    /// Artifact this memory is about.
    pub video_id: VideoId,
    /// Module.
    pub module: ModuleName,
    /// Feature.
    pub feature: FeatureName,
    /// Test outcome.
    pub result: TestResult,
    /// Classified from defaults.
    pub unmapped: bool,
    /// Browser project.
    pub browser: BrowserName,
    /// Archived trace, when one was copied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_path: Option<PathBuf>,
    /// When the memory was written.
    pub timestamp: DateTime<Utc>,
    /// Review priority.
    pub priority: Priority,
    /// One-sentence summary.
    pub summary: String,
    /// Notable observations.
    pub key_insights: Vec<String>,
    /// Up to five earlier memories for the same module and feature.
    pub related_memories: Vec<MemoryId>,
    /// Archived recording.
    pub video_path: PathBuf,
    /// Per-stage notes.
    pub test_stages: Vec<StageMemory>,
    /// Performance snapshot.
    pub performance: PerformanceSnapshot,
}

impl Queryable for MemoryEntry {
    fn module(&self) -> &str {
        &self.module
    }

    fn feature(&self) -> &str {
        &self.feature
    }

    fn result(&self) -> TestResult {
        self.result
    }

    fn searchable_text(&self) -> Vec<&str> {
        std::iter::once(self.summary.as_str())
            .chain(self.key_insights.iter().map(String::as_str))
            .collect()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Aggregate over the memory log.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    /// Memories in the log.
    pub total_tests: u64,
    /// Success share in percent.
    pub success_rate: f64,
    /// Outcomes per module.
    pub module_breakdown: BTreeMap<ModuleName, ModuleStats>,
}

impl MemoryStats {
    /// Recompute the aggregate from `entries`.
    pub fn from_entries(entries: &[MemoryEntry]) -> Self {
        let total_tests = entries.len() as u64;
        let successes = entries
            .iter()
            .filter(|entry| entry.result == TestResult::Success)
            .count() as u64;
        Self {
            total_tests,
            success_rate: success_rate(successes, total_tests),
            module_breakdown: breakdown(
                entries.iter().map(|entry| (entry.module.as_str(), entry.result)),
            ),
        }
    }
}

/// On-disk memory log document.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MemoryDocument {
    /// Append-only entries.
    pub memories: Vec<MemoryEntry>,
    /// Length of `memories`.
    pub total_memories: u64,
    /// Aggregate recomputed on every write.
    pub memory_stats: MemoryStats,
    /// Time of the last write.
    pub last_updated: Option<DateTime<Utc>>,
}

impl StoreDocument for MemoryDocument {
    const NAME: &'static str = "memory";

    fn recompute(&mut self) {
        self.total_memories = self.memories.len() as u64;
        self.memory_stats = MemoryStats::from_entries(&self.memories);
    }

    fn touch(&mut self, at: DateTime<Utc>) {
        self.last_updated = Some(at);
    }
}

/// Historical record of every processed artifact; grows on reprocessing.
#[derive(Clone, Debug)]
pub struct MemoryStore {
    file: JsonFileStore<MemoryDocument>,
}

impl MemoryStore {
    /// Log stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFileStore::new(path),
        }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the log; a missing file is an empty log.
    pub fn load(&self) -> Result<MemoryDocument, PipelineError> {
        self.file.load()
    }

    /// Append an entry for `record` and return its memory id.
    pub fn append(&self, record: &ArtifactRecord) -> Result<MemoryId, PipelineError> {
        self.file.mutate(|doc| {
            let entry = build_entry(record, &doc.memories);
            let memory_id = entry.memory_id.clone();
            doc.memories.push(entry);
            memory_id
        })
    }

    /// Memories matching `query`.
    pub fn query(&self, query: &ArtifactQuery) -> Result<Vec<MemoryEntry>, PipelineError> {
        Ok(self
            .load()?
            .memories
            .into_iter()
            .filter(|entry| query.matches(entry))
            .collect())
    }
}

fn build_entry(record: &ArtifactRecord, existing: &[MemoryEntry]) -> MemoryEntry {
    let meta = &record.metadata;
    let related_memories = existing
        .iter()
        .filter(|m| m.module == meta.module && m.feature == meta.feature && m.video_id != meta.video_id)
        .map(|m| m.memory_id.clone())
        .take(MAX_RELATED_MEMORIES)
        .collect();
    MemoryEntry {
        memory_id: format!("{}-m{}", meta.video_id, existing.len() + 1),
        video_id: meta.video_id.clone(),
        module: meta.module.clone(),
        feature: meta.feature.clone(),
        result: meta.result,
        unmapped: meta.unmapped,
        browser: meta.browser.clone(),
        trace_path: record.trace_archive_path.clone(),
        timestamp: meta.test_date,
        priority: meta.priority,
        summary: summarize(record),
        key_insights: key_insights(record),
        related_memories,
        video_path: record.archive_path.clone(),
        test_stages: meta.stages.iter().map(stage_memory).collect(),
        performance: PerformanceSnapshot {
            duration_ms: meta.duration_ms,
            file_size: meta.original_size_bytes,
            compression_ratio: record.compression_ratio_pct,
        },
    }
}

/// `"<feature> test succeeded, passed X/Y stages"`.
pub fn summarize(record: &ArtifactRecord) -> String {
    let meta = &record.metadata;
    let verb = match meta.result {
        TestResult::Success => "succeeded",
        TestResult::Failure => "failed",
    };
    format!(
        "{} test {verb}, passed {}/{} stages",
        meta.feature,
        meta.passed_stage_count(),
        meta.stages.len()
    )
}

fn key_insights(record: &ArtifactRecord) -> Vec<String> {
    let meta = &record.metadata;
    let mut insights: Vec<String> = meta
        .failed_stages()
        .map(|stage| format!("{} stage failed and needs attention", stage.name))
        .collect();
    if meta.result == TestResult::Success {
        insights.push("core functionality works end to end".to_string());
    }
    match meta.module.as_str() {
        "games" => insights.push("game logic exercised".to_string()),
        "content" => insights.push("content generation exercised".to_string()),
        _ => {}
    }
    if meta.unmapped {
        insights.push("classification fell back to defaults".to_string());
    }
    insights
}

fn stage_memory(stage: &TestStage) -> StageMemory {
    let memory = match stage.result {
        StageResult::Pass => format!("{} completed successfully", stage.name),
        StageResult::Fail => format!("{} failed; investigate and fix", stage.name),
    };
    StageMemory {
        stage_number: stage.stage_number,
        name: stage.name.clone(),
        result: stage.result,
        memory,
    }
}
