//! JSON-backed stores: memory log, catalog, pattern index, compression stats,
//! and failure analyses. Each is an explicit struct built from the archive root.

pub mod catalog;
pub mod compression_stats;
pub mod failure_analysis;
pub mod json_file;
pub mod lock;
pub mod memory;
pub mod patterns;

use chrono::{DateTime, Utc};

use crate::config::PipelineConfig;
use crate::data::{ArtifactRecord, TestResult};
use crate::errors::PipelineError;
use crate::types::{FeatureName, ModuleName};

pub use catalog::CatalogStore;
pub use compression_stats::CompressionStatsStore;
pub use failure_analysis::FailureAnalysisStore;
pub use json_file::{JsonFileStore, StoreDocument};
pub use lock::RunLock;
pub use memory::MemoryStore;
pub use patterns::PatternIndex;

/// Fields a store entry exposes to [`ArtifactQuery`].
pub trait Queryable {
    /// Module of the item.
    fn module(&self) -> &str;
    /// Feature of the item.
    fn feature(&self) -> &str;
    /// Test outcome of the item.
    fn result(&self) -> TestResult;
    /// Free text searched by the keyword filter.
    fn searchable_text(&self) -> Vec<&str>;
    /// Time compared against the date range.
    fn timestamp(&self) -> DateTime<Utc>;
}

/// Store query. Provided filters are OR'd; a query with no filters matches nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ArtifactQuery {
    /// Match this module.
    pub module: Option<ModuleName>,
    /// Match this feature.
    pub feature: Option<FeatureName>,
    /// Match this result.
    pub result: Option<TestResult>,
    /// Case-insensitive substring of the searchable text.
    pub keyword: Option<String>,
    /// Inclusive `[from, to]` range.
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
}

impl ArtifactQuery {
    /// Query with no filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Also match `module`.
    pub fn module(mut self, module: impl Into<ModuleName>) -> Self {
        self.module = Some(module.into());
        self
    }

    /// Also match `feature`.
    pub fn feature(mut self, feature: impl Into<FeatureName>) -> Self {
        self.feature = Some(feature.into());
        self
    }

    /// Also match `result`.
    pub fn result(mut self, result: TestResult) -> Self {
        self.result = Some(result);
        self
    }

    /// Also match text containing `keyword`.
    pub fn keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = Some(keyword.into());
        self
    }

    /// Also match timestamps in `[from, to]`.
    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.date_range = Some((from, to));
        self
    }

    /// True when no filter is set.
    pub fn is_empty(&self) -> bool {
        self.module.is_none()
            && self.feature.is_none()
            && self.result.is_none()
            && self.keyword.is_none()
            && self.date_range.is_none()
    }

    /// True when any provided filter matches `item`.
    pub fn matches<T: Queryable + ?Sized>(&self, item: &T) -> bool {
        let module = self.module.as_deref().is_some_and(|m| item.module() == m);
        let feature = self.feature.as_deref().is_some_and(|f| item.feature() == f);
        let result = self.result.is_some_and(|r| item.result() == r);
        let keyword = self.keyword.as_deref().is_some_and(|keyword| {
            let needle = keyword.to_lowercase();
            item.searchable_text()
                .iter()
                .any(|text| text.to_lowercase().contains(&needle))
        });
        let dated = self
            .date_range
            .is_some_and(|(from, to)| (from..=to).contains(&item.timestamp()));
        module || feature || result || keyword || dated
    }
}

/// All per-archive-root stores except compression stats, which the compression
/// engine owns.
#[derive(Clone, Debug)]
pub struct ArtifactStores {
    /// Append-only memory log.
    pub memory: MemoryStore,
    /// Upsert-by-id catalog.
    pub catalog: CatalogStore,
    /// Failure-pattern index.
    pub patterns: PatternIndex,
    /// Failure analyses.
    pub failures: FailureAnalysisStore,
}

impl ArtifactStores {
    /// Stores under the configured archive root.
    pub fn open(config: &PipelineConfig) -> Self {
        Self {
            memory: MemoryStore::new(config.memory_path()),
            catalog: CatalogStore::new(config.catalog_path()),
            patterns: PatternIndex::new(config.patterns_path()),
            failures: FailureAnalysisStore::new(config.failure_analysis_path()),
        }
    }

    /// Load every document without writing, so a corrupt store surfaces before
    /// an artifact touches the archive.
    pub fn check_readable(&self) -> Result<(), PipelineError> {
        self.catalog.load()?;
        self.patterns.load()?;
        self.memory.load()?;
        self.failures.load()?;
        Ok(())
    }

    /// Persist one processed artifact into every store.
    pub fn record(&self, record: &ArtifactRecord) -> Result<(), PipelineError> {
        self.catalog.upsert(record)?;
        let pattern_ids = self.patterns.observe(&record.metadata)?;
        self.memory.append(record)?;
        self.failures.analyze(&record.metadata, &pattern_ids)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Row {
        module: &'static str,
        result: TestResult,
        note: &'static str,
        at: DateTime<Utc>,
    }

    impl Queryable for Row {
        fn module(&self) -> &str {
            self.module
        }
        fn feature(&self) -> &str {
            "feature"
        }
        fn result(&self) -> TestResult {
            self.result
        }
        fn searchable_text(&self) -> Vec<&str> {
            vec![self.note]
        }
        fn timestamp(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn row() -> Row {
        Row {
            module: "games",
            result: TestResult::Failure,
            note: "Gameplay stage failed",
            at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn empty_query_matches_nothing() {
        assert!(ArtifactQuery::new().is_empty());
        assert!(!ArtifactQuery::new().matches(&row()));
    }

    #[test]
    fn filters_are_ored() {
        let row = row();
        assert!(ArtifactQuery::new().module("content").result(TestResult::Failure).matches(&row));
        assert!(ArtifactQuery::new().keyword("GAMEPLAY").matches(&row));
        assert!(!ArtifactQuery::new().module("content").keyword("quiz").matches(&row));
        let day = |d| Utc.with_ymd_and_hms(2024, 5, d, 0, 0, 0).unwrap();
        assert!(ArtifactQuery::new().between(day(1), day(2)).matches(&row));
        assert!(!ArtifactQuery::new().between(day(2), day(3)).matches(&row));
    }
}
