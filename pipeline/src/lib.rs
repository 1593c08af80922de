//! Ingestion runs for the MLB statistics store.
//!
//! A run discovers extractor output in the pending directory, asks the
//! ledger which files still need loading, loads each one in its own
//! transaction, and moves committed files to the done directory.
//!
//! # Quick start
//!
//! ```no_run
//! use mlb_stats_pipeline::{Pipeline, PipelineConfig};
//!
//! let config = PipelineConfig::load("mlb-stats.yml").unwrap();
//! let summary = Pipeline::new(config).run().unwrap();
//! println!("{summary}");
//! ```

mod config;
mod error;
mod lifecycle;
mod pipeline;

pub use config::{PipelineConfig, QueryConfig};
pub use error::{ErrorKind, PipelineError, Result};
pub use lifecycle::{DirectoryArchiver, FileLifecycle, pending_files};
pub use pipeline::{Pipeline, RunSummary, open_store};
