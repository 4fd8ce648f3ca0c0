//! Pre-execution policy gates evaluated against the merge request.
//!
//! Every check is a fresh round trip to the review system. Approval or
//! ordering may still change between the check and the end of the run.

use std::fmt;

use crate::config::GateConfig;
use crate::error::{AppError, Result};
use crate::platform::types::{ApprovalRule, MergeRequest, ReviewTarget};
use crate::platform::{ApprovalSource, MergeRequestSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Every approval rule has enough approvers.
    Approval,
    /// No older merge request is still open.
    Oldest,
}

impl Gate {
    pub fn name(self) -> &'static str {
        match self {
            Gate::Approval => "approved",
            Gate::Oldest => "oldest",
        }
    }
}

impl fmt::Display for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateOutcome {
    pub approved: bool,
    pub reason: Option<String>,
}

impl GateOutcome {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            approved: false,
            reason: Some(reason.into()),
        }
    }
}

/// Result of running every enabled gate in order.
#[derive(Debug)]
pub enum Verdict {
    Pass,
    Rejected { gate: Gate, outcome: GateOutcome },
    Errored { gate: Gate, error: AppError },
}

fn require_target(target: Option<&ReviewTarget>) -> Result<&ReviewTarget> {
    target.ok_or_else(|| {
        AppError::MissingContext(
            "CI_PROJECT_ID or CI_MERGE_REQUEST_IID env var is not defined, cigate must run in a merge request pipeline"
                .to_string(),
        )
    })
}

/// True when every rule is satisfied. An empty rule set is approved.
pub fn rules_satisfied(rules: &[ApprovalRule]) -> bool {
    rules.iter().all(ApprovalRule::is_satisfied)
}

/// True when no other open merge request has a smaller IID than `current`.
pub fn is_oldest(current: u64, open: &[MergeRequest]) -> bool {
    !open.iter().any(|mr| mr.iid < current)
}

pub async fn check_approval<S>(source: &S, target: Option<&ReviewTarget>) -> Result<bool>
where
    S: ApprovalSource + ?Sized,
{
    let target = require_target(target)?;
    let rules = source.approval_rules(target).await?;

    let approved = rules_satisfied(&rules);
    tracing::info!(
        mr = target.merge_request_iid,
        rules = rules.len(),
        approved,
        "Checked merge request approval"
    );
    Ok(approved)
}

pub async fn check_oldest<S>(source: &S, target: Option<&ReviewTarget>) -> Result<bool>
where
    S: MergeRequestSource + ?Sized,
{
    let target = require_target(target)?;
    let open = source.open_merge_requests(&target.project_id).await?;

    let oldest = is_oldest(target.merge_request_iid, &open);
    tracing::info!(
        mr = target.merge_request_iid,
        open = open.len(),
        oldest,
        "Checked merge request ordering"
    );
    Ok(oldest)
}

/// Run the enabled gates in fixed order, stopping at the first that fails.
pub async fn evaluate<P>(platform: &P, target: Option<&ReviewTarget>, gates: &GateConfig) -> Verdict
where
    P: ApprovalSource + MergeRequestSource + ?Sized,
{
    if gates.approved {
        match check_approval(platform, target).await {
            Ok(true) => {}
            Ok(false) => {
                return Verdict::Rejected {
                    gate: Gate::Approval,
                    outcome: GateOutcome::reject("merge request must be approved"),
                }
            }
            Err(error) => {
                return Verdict::Errored {
                    gate: Gate::Approval,
                    error,
                }
            }
        }
    }

    if gates.oldest {
        match check_oldest(platform, target).await {
            Ok(true) => {}
            Ok(false) => {
                return Verdict::Rejected {
                    gate: Gate::Oldest,
                    outcome: GateOutcome::reject("all older merge requests must be closed"),
                }
            }
            Err(error) => {
                return Verdict::Errored {
                    gate: Gate::Oldest,
                    error,
                }
            }
        }
    }

    Verdict::Pass
}
