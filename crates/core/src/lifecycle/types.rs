//! Types for the lifecycle controller.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// State of the harvest lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    /// Nothing started yet, or a paused run was abandoned.
    #[default]
    Idle,
    Running,
    /// Cancelled at a group boundary; whatever was accumulated is cached.
    Paused,
    Completed,
}

impl LifecycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Idle => "idle",
            LifecycleState::Running => "running",
            LifecycleState::Paused => "paused",
            LifecycleState::Completed => "completed",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from lifecycle operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("cannot {operation} while {state}")]
    InvalidTransition {
        operation: &'static str,
        state: LifecycleState,
    },
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// A fresh cache entry answered the run without fetching.
    CacheHit,
    Completed,
    Cancelled,
    /// The candidate list could not be loaded.
    Failed,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::CacheHit => "cache_hit",
            RunOutcome::Completed => "completed",
            RunOutcome::Cancelled => "cancelled",
            RunOutcome::Failed => "failed",
        }
    }
}

/// Summary of the most recent finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub outcome: RunOutcome,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Items accumulated (or served from cache).
    pub total: usize,
    pub processed: usize,
    pub candidates: usize,
}

/// Point-in-time view of the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerStatus {
    pub state: LifecycleState,
    /// Items in the in-process cache tier.
    pub cached_items: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    /// Persistent writes were given up on for this process.
    pub cache_degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
