//! Durable workflow checkpoint.
//!
//! A checkpoint is written before every remediation attempt and after its
//! outcome. `milestones` records which non-idempotent observability effects
//! have already happened, so a re-run skips them.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::breaker::RemediationRequest;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    /// Submitted, no attempt started.
    Pending,
    /// An attempt started and has not recorded an outcome.
    Running,
    Succeeded,
    /// The latest attempt failed.
    Failed,
}

/// Effects that must happen at most once per workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Milestone {
    /// "disabling resource" announcement before the first stop call.
    Announced,
    /// "successfully stopped" notice.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowCheckpoint {
    pub execution_id: String,
    pub request: RemediationRequest,
    pub status: WorkflowStatus,
    pub attempts: u32,
    pub milestones: BTreeSet<Milestone>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowCheckpoint {
    pub fn new(request: RemediationRequest, now: DateTime<Utc>) -> Self {
        Self {
            execution_id: request.execution_id.clone(),
            request,
            status: WorkflowStatus::Pending,
            attempts: 0,
            milestones: BTreeSet::new(),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn begin_attempt(&mut self, now: DateTime<Utc>) -> u32 {
        self.attempts += 1;
        self.status = WorkflowStatus::Running;
        self.updated_at = now;
        self.attempts
    }

    /// Record a milestone. Returns `true` only the first time.
    pub fn first_time(&mut self, milestone: Milestone) -> bool {
        self.milestones.insert(milestone)
    }

    pub fn has(&self, milestone: Milestone) -> bool {
        self.milestones.contains(&milestone)
    }

    pub fn succeed(&mut self, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Succeeded;
        self.last_error = None;
        self.updated_at = now;
    }

    pub fn fail(&mut self, error: String, now: DateTime<Utc>) {
        self.status = WorkflowStatus::Failed;
        self.last_error = Some(error);
        self.updated_at = now;
    }

    pub fn is_terminal(&self, max_attempts: u32) -> bool {
        match self.status {
            WorkflowStatus::Succeeded => true,
            WorkflowStatus::Failed => self.attempts >= max_attempts,
            WorkflowStatus::Pending | WorkflowStatus::Running => false,
        }
    }
}
