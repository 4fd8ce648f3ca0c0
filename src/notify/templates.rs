use std::borrow::Cow;
use std::fmt;

use crate::error::{AppError, Result};

use super::NotificationContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    InitFailed,
    PlanRunning,
    PlanFailed,
    PlanSummary,
    ApplyRunning,
    ApplyFailed,
    ApplySummary,
    ApplyNotApproved,
    ApplyBlocked,
}

impl Template {
    pub const ALL: [Template; 9] = [
        Template::InitFailed,
        Template::PlanRunning,
        Template::PlanFailed,
        Template::PlanSummary,
        Template::ApplyRunning,
        Template::ApplyFailed,
        Template::ApplySummary,
        Template::ApplyNotApproved,
        Template::ApplyBlocked,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Template::InitFailed => "init-failed",
            Template::PlanRunning => "plan-running",
            Template::PlanFailed => "plan-failed",
            Template::PlanSummary => "plan-summary",
            Template::ApplyRunning => "apply-running",
            Template::ApplyFailed => "apply-failed",
            Template::ApplySummary => "apply-summary",
            Template::ApplyNotApproved => "apply-not-approved",
            Template::ApplyBlocked => "apply-blocked",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            Template::InitFailed => INIT_FAILED,
            Template::PlanRunning => PLAN_RUNNING,
            Template::PlanFailed => PLAN_FAILED,
            Template::PlanSummary => PLAN_SUMMARY,
            Template::ApplyRunning => APPLY_RUNNING,
            Template::ApplyFailed => APPLY_FAILED,
            Template::ApplySummary => APPLY_SUMMARY,
            Template::ApplyNotApproved => APPLY_NOT_APPROVED,
            Template::ApplyBlocked => APPLY_BLOCKED,
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const INIT_FAILED: &str = concat!(
    ":red_circle: Terraform init **failed** in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    "<details><summary>Output</summary>\n\n{{fence}}text\n{{output}}\n{{fence}}\n\n</details>\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const PLAN_RUNNING: &str = concat!(
    ":hourglass: Terraform plan running in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const PLAN_FAILED: &str = concat!(
    ":red_circle: Terraform plan **failed** in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    "<details><summary>Output</summary>\n\n{{fence}}text\n{{output}}\n{{fence}}\n\n</details>\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const PLAN_SUMMARY: &str = concat!(
    ":white_check_mark: Terraform plan ran in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    "**Plan summary**: {{summary}}\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const APPLY_RUNNING: &str = concat!(
    ":hourglass: Terraform apply running in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const APPLY_FAILED: &str = concat!(
    ":red_circle: Terraform apply **failed** in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    "<details><summary>Output</summary>\n\n{{fence}}text\n{{output}}\n{{fence}}\n\n</details>\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const APPLY_SUMMARY: &str = concat!(
    ":white_check_mark: Terraform apply ran in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    "**Apply summary**: {{summary}}\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const APPLY_NOT_APPROVED: &str = concat!(
    ":no_entry: Terraform apply **not authorized**, merge request must be approved, in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

const APPLY_BLOCKED: &str = concat!(
    ":no_entry: Terraform apply **blocked**, all older merge requests must be closed, in dir `{{dir}}` for commit `{{commit}}` in pipeline [{{pipeline_id}}]({{pipeline_url}}).\n\n",
    ":memo: [see job log]({{job_url}}) | :arrow_forward: [see pipeline]({{pipeline_url}})",
);

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Text(&'a str),
    Field(&'a str),
}

/// Split a template into literal text and `{{field}}` placeholders.
fn parse(source: &str) -> Result<Vec<Segment<'_>>> {
    let mut segments = Vec::new();
    let mut rest = source;

    while let Some(start) = rest.find("{{") {
        if start > 0 {
            segments.push(Segment::Text(&rest[..start]));
        }
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            AppError::Template(format!("Unterminated placeholder at: {}", &rest[start..]))
        })?;
        let name = after[..end].trim();
        if name.is_empty() {
            return Err(AppError::Template("Empty placeholder".to_string()));
        }
        segments.push(Segment::Field(name));
        rest = &after[end + 2..];
    }

    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }

    Ok(segments)
}

/// Backtick fence longer than any backtick run in `content`, at least three.
fn code_fence(content: &str) -> String {
    let longest = content
        .split(|c| c != '`')
        .map(str::len)
        .max()
        .unwrap_or(0);
    "`".repeat((longest + 1).max(3))
}

fn lookup<'c>(ctx: &'c NotificationContext, field: &str) -> Result<Cow<'c, str>> {
    let value = match field {
        "dir" => Some(ctx.dir.as_str()),
        "commit" => Some(ctx.commit.as_str()),
        "job_url" => Some(ctx.job_url.as_str()),
        "pipeline_id" => Some(ctx.pipeline_id.as_str()),
        "pipeline_url" => Some(ctx.pipeline_url.as_str()),
        "summary" => ctx.summary.as_deref(),
        "output" => ctx.output.as_deref(),
        // Fences `output` so it cannot close the block it sits in
        "fence" => return Ok(Cow::Owned(code_fence(ctx.output.as_deref().unwrap_or("")))),
        other => return Err(AppError::Template(format!("Unknown field: {other}"))),
    };

    value
        .map(Cow::Borrowed)
        .ok_or_else(|| AppError::Template(format!("Field '{field}' is not set")))
}

/// Render `source` against the context. Parsed on every call.
pub fn render_source(source: &str, ctx: &NotificationContext) -> Result<String> {
    let mut body = String::with_capacity(source.len());
    for segment in parse(source)? {
        match segment {
            Segment::Text(text) => body.push_str(text),
            Segment::Field(field) => body.push_str(&lookup(ctx, field)?),
        }
    }
    Ok(body)
}

pub fn render(template: Template, ctx: &NotificationContext) -> Result<String> {
    render_source(template.source(), ctx).map_err(|e| match e {
        AppError::Template(msg) => AppError::Template(format!("{template}: {msg}")),
        other => other,
    })
}
