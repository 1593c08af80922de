//! Run configuration for the ingestion pipeline and the query command.
//!
//! Every field has a default, so an empty file (or no file) is a valid
//! configuration.
//!
//! # Example YAML
//!
//! ```yaml
//! database: mlb.db
//! pending_dir: raw
//! done_dir: historical
//! table_prefix: mlb_
//! chunk_size: 500
//! query:
//!   top_n: 10
//!   grouping: date
//!   excluded_players:
//!     - Aaron Judge
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use mlb_stats_sqlite::{DEFAULT_CHUNK_SIZE, DEFAULT_TOP_N, Grouping, QueryOptions};
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Settings for the co-occurrence report.
///
/// The report prints the unrestricted ranking followed by a ranking with
/// [`excluded_players`](Self::excluded_players) left out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    pub top_n: usize,
    pub grouping: Grouping,
    pub excluded_players: Vec<String>,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            grouping: Grouping::Date,
            excluded_players: vec!["Aaron Judge".to_string()],
        }
    }
}

impl QueryConfig {
    /// Options for the ranking over all players.
    pub fn unrestricted(&self) -> QueryOptions {
        QueryOptions {
            top_n: self.top_n,
            excluded_players: Vec::new(),
            grouping: self.grouping,
        }
    }

    /// Options for the ranking without the excluded players.
    pub fn restricted(&self) -> QueryOptions {
        QueryOptions {
            excluded_players: self.excluded_players.clone(),
            ..self.unrestricted()
        }
    }
}

/// Top-level pipeline configuration.
///
/// # Examples
///
/// ```
/// use mlb_stats_pipeline::PipelineConfig;
///
/// let config: PipelineConfig = serde_yaml::from_str("chunk_size: 200").unwrap();
/// assert_eq!(config.chunk_size, 200);
/// assert_eq!(config.table_prefix, "mlb_");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// SQLite database file.
    pub database: PathBuf,
    /// Directory scanned for new extractor output.
    pub pending_dir: PathBuf,
    /// Directory processed files are moved into.
    pub done_dir: PathBuf,
    pub table_prefix: String,
    /// Maximum rows per insert statement.
    pub chunk_size: usize,
    pub query: QueryConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("mlb.db"),
            pending_dir: PathBuf::from("raw"),
            done_dir: PathBuf::from("historical"),
            table_prefix: "mlb_".to_string(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            query: QueryConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](PipelineError::Io) if the file cannot be read, or
    /// [`Yaml`](PipelineError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Rejects values no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(PipelineError::Configuration(
                "chunk_size must be at least 1".into(),
            ));
        }
        if self.pending_dir == self.done_dir {
            return Err(PipelineError::Configuration(format!(
                "pending_dir and done_dir are both {}",
                self.pending_dir.display()
            )));
        }
        Ok(())
    }
}
