use crate::client::Invocation;
use serde::{Deserialize, Serialize};

/// How a stage ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Ran; no verdict attached.
    Completed,
    /// Ran and its verdict was positive.
    Passed,
    /// Ran and its verdict was negative.
    Failed,
    /// Not run because an earlier verdict made it unnecessary.
    Skipped,
}

/// One step of a pipeline run, as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    /// Display label, e.g. `"Generator"` or `"Step 2: Draft"`.
    pub label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,

    /// Raw model output (empty on provider failure).
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passed: Option<bool>,

    pub status: StageStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StageRecord {
    /// A stage that ran, with the output and error of its invocation.
    pub fn from_invocation(label: impl Into<String>, inv: &Invocation) -> Self {
        Self {
            label: label.into(),
            round: None,
            output: inv.output.clone(),
            passed: None,
            status: StageStatus::Completed,
            error: inv.error.clone(),
        }
    }

    /// A stage that was not run.
    pub fn skipped(label: impl Into<String>, note: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            round: None,
            output: note.into(),
            passed: None,
            status: StageStatus::Skipped,
            error: None,
        }
    }

    pub fn in_round(mut self, round: u32) -> Self {
        self.round = Some(round);
        self
    }

    /// Attach a verdict; sets the status to `Passed` or `Failed`.
    pub fn with_verdict(mut self, passed: bool) -> Self {
        self.passed = Some(passed);
        self.status = if passed {
            StageStatus::Passed
        } else {
            StageStatus::Failed
        };
        self
    }

    pub fn is_skipped(&self) -> bool {
        self.status == StageStatus::Skipped
    }
}
