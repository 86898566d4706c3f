//! Structured filename parsing and date helpers.
//!
//! Recordings named `DATE_MODULE_FEATURE_RESULT[_VERSION[_SEQ]].webm` carry their
//! classification positionally.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use std::path::Path;

use crate::constants::artifacts::VIDEO_ID_PATH_SEPARATOR;
use crate::constants::classify::{FILENAME_DATE_FORMAT, STRUCTURED_MIN_SEGMENTS};
use crate::data::TestResult;
use crate::types::VideoId;

/// Fields extracted from a structured filename. Empty segments stay `None`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StructuredName {
    /// `YYYYMMDD` segment.
    pub date: Option<NaiveDate>,
    /// Module segment.
    pub module: Option<String>,
    /// Feature segment.
    pub feature: Option<String>,
    /// `success`/`fail` segment.
    pub result: Option<TestResult>,
    /// Version segment, when present.
    pub version: Option<String>,
    /// Sequence segment, when present.
    pub sequence: Option<String>,
}

/// Split a file stem on `_`; fewer than four segments is not structured.
pub fn parse_structured(stem: &str) -> Option<StructuredName> {
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < STRUCTURED_MIN_SEGMENTS {
        return None;
    }
    let segment = |idx: usize| {
        parts
            .get(idx)
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(str::to_string)
    };
    Some(StructuredName {
        date: parse_filename_date(parts[0]),
        module: segment(1),
        feature: segment(2),
        result: TestResult::from_token(parts[3]),
        version: segment(4),
        sequence: segment(5),
    })
}

/// Parse a compact `YYYYMMDD` date segment.
pub fn parse_filename_date(segment: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(segment.trim(), FILENAME_DATE_FORMAT).ok()
}

/// Put a filename date on the wall-clock time of `time_of_day` (midnight when absent).
pub fn date_with_time_of_day(date: NaiveDate, time_of_day: Option<DateTime<Utc>>) -> DateTime<Utc> {
    let time = time_of_day
        .and_then(|ts| NaiveTime::from_hms_opt(ts.hour(), ts.minute(), ts.second()))
        .unwrap_or(NaiveTime::MIN);
    Utc.from_utc_datetime(&date.and_time(time))
}

/// Stable id: the path relative to the input root, extension dropped, separators folded.
///
/// Files sitting directly in the root keep their bare stem, so
/// `root/a/b/video.webm` becomes `a__b__video` and `root/clip.webm` becomes `clip`.
pub fn video_id_for(input_root: &Path, path: &Path) -> VideoId {
    let relative = path.strip_prefix(input_root).unwrap_or(path);
    let relative = relative.with_extension("");
    relative
        .components()
        .filter_map(|component| match component {
            std::path::Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join(VIDEO_ID_PATH_SEPARATOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_structured_name() {
        let parsed = parse_structured("20240101_games_MatchGame_fail_v1.0.0_001").unwrap();
        assert_eq!(parsed.date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(parsed.module.as_deref(), Some("games"));
        assert_eq!(parsed.feature.as_deref(), Some("MatchGame"));
        assert_eq!(parsed.result, Some(TestResult::Failure));
        assert_eq!(parsed.version.as_deref(), Some("v1.0.0"));
        assert_eq!(parsed.sequence.as_deref(), Some("001"));
    }

    #[test]
    fn short_or_odd_names_degrade_per_segment() {
        assert!(parse_structured("match_game_video").is_none());

        let parsed = parse_structured("notadate__quiz_maybe").unwrap();
        assert_eq!(parsed.date, None);
        assert_eq!(parsed.module, None);
        assert_eq!(parsed.feature.as_deref(), Some("quiz"));
        assert_eq!(parsed.result, None);
        assert_eq!(parsed.version, None);
    }

    #[test]
    fn filename_date_keeps_time_of_day_from_mtime() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let mtime = Utc.with_ymd_and_hms(2025, 6, 30, 13, 45, 12).unwrap();
        let combined = date_with_time_of_day(date, Some(mtime));
        assert_eq!(combined, Utc.with_ymd_and_hms(2024, 1, 1, 13, 45, 12).unwrap());
        assert_eq!(
            date_with_time_of_day(date, None),
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn video_ids_fold_relative_directories() {
        let root = Path::new("/runs/today");
        assert_eq!(
            video_id_for(root, Path::new("/runs/today/games-match-chromium/video.webm")),
            "games-match-chromium__video"
        );
        assert_eq!(video_id_for(root, Path::new("/runs/today/clip.webm")), "clip");
    }
}
