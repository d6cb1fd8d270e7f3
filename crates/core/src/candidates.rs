//! Candidate identifier sources.
//!
//! The harvester walks an ordered list of TMDB identifiers. The list either
//! comes inline from configuration or from a file, which is re-read on every
//! cold run so it can be updated without a restart.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::config::HarvestConfig;

/// Errors loading the candidate list.
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("Failed to read candidate file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid candidate id on line {line}: {value:?}")]
    InvalidId { line: usize, value: String },

    #[error("Failed to parse candidate JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Yields the ordered candidate id list for a run.
///
/// `load` may block on I/O; the lifecycle controller calls it through
/// `spawn_blocking`.
pub trait CandidateSource: Send + Sync {
    fn load(&self) -> Result<Vec<u32>, CandidateError>;
}

/// Fixed list of ids.
#[derive(Debug, Clone)]
pub struct StaticCandidateSource {
    ids: Vec<u32>,
}

impl StaticCandidateSource {
    pub fn new(ids: Vec<u32>) -> Self {
        Self { ids }
    }
}

impl CandidateSource for StaticCandidateSource {
    fn load(&self) -> Result<Vec<u32>, CandidateError> {
        Ok(normalize_ids(self.ids.clone()))
    }
}

/// Ids read from a file.
///
/// Accepted formats:
/// - a JSON array of integers
/// - one id per line; blank lines and `#` comments are ignored
#[derive(Debug, Clone)]
pub struct FileCandidateSource {
    path: PathBuf,
}

impl FileCandidateSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CandidateSource for FileCandidateSource {
    fn load(&self) -> Result<Vec<u32>, CandidateError> {
        let content = std::fs::read_to_string(&self.path).map_err(|source| CandidateError::Io {
            path: self.path.clone(),
            source,
        })?;

        let ids = parse_candidates(&content)?;
        debug!(
            "Loaded {} candidate ids from {}",
            ids.len(),
            self.path.display()
        );
        Ok(ids)
    }
}

/// Parse a candidate list in either supported format.
pub fn parse_candidates(content: &str) -> Result<Vec<u32>, CandidateError> {
    let trimmed = content.trim_start();
    if trimmed.starts_with('[') {
        let ids: Vec<u32> = serde_json::from_str(trimmed)?;
        return Ok(normalize_ids(ids));
    }

    let mut ids = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = match line.split_once('#') {
            Some((before, _)) => before,
            None => line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let id = line.parse::<u32>().map_err(|_| CandidateError::InvalidId {
            line: index + 1,
            value: line.to_string(),
        })?;
        ids.push(id);
    }

    Ok(normalize_ids(ids))
}

/// Drop zero ids and repeats, keeping first-seen order.
fn normalize_ids(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter()
        .filter(|id| *id != 0 && seen.insert(*id))
        .collect()
}

/// Build the candidate source described by the harvest config.
///
/// A configured file takes precedence over the inline list.
pub fn from_config(config: &HarvestConfig) -> Box<dyn CandidateSource> {
    match &config.candidates_file {
        Some(path) => Box::new(FileCandidateSource::new(path.clone())),
        None => Box::new(StaticCandidateSource::new(config.candidates.clone())),
    }
}
