//! Identification of input files by name and covered date range.
//!
//! The extractor names its output `mlb_raw_<start>_<end>_<timestamp>.json`.
//! The name is the ledger key; the embedded range is used to reject files
//! that overlap data already loaded. Names that do not follow the pattern
//! are still valid keys, just without a range.

use std::path::Path;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static RAW_FILE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^mlb_raw_(\d{4}-\d{2}-\d{2})_(\d{4}-\d{2}-\d{2})_.*\.json$")
        .expect("static regex must compile")
});

/// Closed interval of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `start` is after `end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Ledger identity of one input file.
///
/// # Examples
///
/// ```
/// use mlb_stats_core::FileKey;
///
/// let key = FileKey::parse("mlb_raw_2024-04-01_2024-04-07_20240408_101500.json");
/// let range = key.range().unwrap();
/// assert_eq!(range.start.to_string(), "2024-04-01");
///
/// assert!(FileKey::parse("notes.json").range().is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKey {
    name: String,
    range: Option<DateRange>,
}

impl FileKey {
    pub fn parse(name: &str) -> Self {
        let range = RAW_FILE_RE.captures(name).and_then(|caps| {
            let start = NaiveDate::parse_from_str(&caps[1], "%Y-%m-%d").ok()?;
            let end = NaiveDate::parse_from_str(&caps[2], "%Y-%m-%d").ok()?;
            DateRange::new(start, end)
        });
        Self {
            name: name.to_string(),
            range,
        }
    }

    /// Builds a key from a path's final component.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(Self::parse)
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn range(&self) -> Option<DateRange> {
        self.range
    }
}

impl AsRef<FileKey> for FileKey {
    fn as_ref(&self) -> &FileKey {
        self
    }
}

impl std::fmt::Display for FileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
