use serde::{Deserialize, Serialize};

/// The merge request a CI job runs for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewTarget {
    /// Numeric project id or URL path (`group/project`).
    pub project_id: String,
    pub merge_request_iid: u64,
}

/// One approval rule of a merge request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRule {
    pub name: String,
    pub approvals_required: u32,
    pub approved_by: Vec<String>,
}

impl ApprovalRule {
    pub fn is_satisfied(&self) -> bool {
        self.approved_by.len() >= self.approvals_required as usize
    }
}

/// Summary of an open merge request (for ordering checks).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeRequest {
    pub iid: u64,
    pub title: String,
}
