//! Core record types and the pure transform for MLB statistics ingestion.
//!
//! This crate defines what one input file turns into before it touches the
//! database:
//!
//! - [`Team`], [`Player`], [`Game`], [`BatterStat`], [`PitcherStat`] — typed
//!   rows keyed by the identifiers the upstream API reports.
//! - [`Record`] — a tagged variant over those rows, collected into a
//!   [`Batch`] per input file.
//! - [`transform`] — validates a raw extractor document and produces a
//!   [`TransformOutput`] (the batch plus any [`RecordIssue`]s).
//! - [`FileKey`] — the ledger identity of an input file, including the
//!   [`DateRange`] encoded in its name.
//!
//! # Example
//!
//! ```
//! use mlb_stats_core::*;
//! use serde_json::json;
//!
//! let doc = json!({
//!     "teams": [{"id": 147, "name": "New York Yankees"}],
//!     "rosters": {"147": [{"person": {"id": 592450, "fullName": "Aaron Judge"}}]},
//! });
//! let output = transform(&doc).unwrap();
//! assert_eq!(output.batch.players[0].team_id, Some(147));
//! assert_eq!(output.batch.players[0].position, UNKNOWN);
//! ```

mod error;
mod file_key;
mod transform;
mod types;

pub use error::{Result, TransformError};
pub use file_key::{DateRange, FileKey};
pub use transform::{DroppedCounts, RecordIssue, TransformOutput, transform, transform_slice};
pub use types::*;
