use std::fmt;

use crate::gate::Gate;
use crate::notify::Template;

/// Terraform sub-command driven by a workflow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Init,
    Plan,
    Apply,
}

impl Action {
    pub fn command(self) -> &'static str {
        match self {
            Action::Init => "init",
            Action::Plan => "plan",
            Action::Apply => "apply",
        }
    }

    /// Only apply changes infrastructure, so only apply is gated.
    pub fn is_gated(self) -> bool {
        matches!(self, Action::Apply)
    }

    pub fn running_template(self) -> Option<Template> {
        match self {
            Action::Init => None,
            Action::Plan => Some(Template::PlanRunning),
            Action::Apply => Some(Template::ApplyRunning),
        }
    }

    pub fn failed_template(self) -> Template {
        match self {
            Action::Init => Template::InitFailed,
            Action::Plan => Template::PlanFailed,
            Action::Apply => Template::ApplyFailed,
        }
    }

    pub fn summary_template(self) -> Option<Template> {
        match self {
            Action::Init => None,
            Action::Plan => Some(Template::PlanSummary),
            Action::Apply => Some(Template::ApplySummary),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

pub fn rejection_template(gate: Gate) -> Template {
    match gate {
        Gate::Approval => Template::ApplyNotApproved,
        Gate::Oldest => Template::ApplyBlocked,
    }
}

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    GateCheck,
    Running,
    Reporting,
    Done,
    /// A gate rejected or failed before the tool started.
    Aborted,
    /// The tool could not start, its output could not be read, or it exited non-zero.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::GateCheck => "gate-check",
            Stage::Running => "running",
            Stage::Reporting => "reporting",
            Stage::Done => "done",
            Stage::Aborted => "aborted",
            Stage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub action: Action,
    pub stage: Stage,
    pub exit_code: i32,
    pub summary: String,
}
