pub mod templates;

use std::path::Path;

use crate::config::CiContext;
use crate::error::{AppError, Result};
use crate::platform::types::ReviewTarget;
use crate::platform::CommentSink;

pub use templates::{render, Template};

/// Values a comment template can reference. Built fresh per comment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationContext {
    pub dir: String,
    pub commit: String,
    pub job_url: String,
    pub pipeline_id: String,
    pub pipeline_url: String,
    pub summary: Option<String>,
    pub output: Option<String>,
}

impl NotificationContext {
    pub fn from_ci(ci: &CiContext, work_dir: &Path) -> Self {
        Self {
            dir: relative_dir(work_dir, ci.project_dir.as_deref()),
            commit: ci.commit_short_sha.clone(),
            job_url: ci.job_url.clone(),
            pipeline_id: ci.pipeline_id.clone(),
            pipeline_url: ci.pipeline_url.clone(),
            summary: None,
            output: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }
}

/// Path of `work_dir` below the project root, written as `/sub/dir`.
///
/// The root itself becomes `"."`. A directory outside the root is kept whole.
pub fn relative_dir(work_dir: &Path, project_dir: Option<&Path>) -> String {
    let relative = project_dir
        .filter(|root| !root.as_os_str().is_empty())
        .and_then(|root| work_dir.strip_prefix(root).ok());

    match relative {
        Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Some(rel) => format!("/{}", rel.to_string_lossy()),
        None => work_dir.to_string_lossy().into_owned(),
    }
}

/// Posts rendered templates as merge request comments.
pub struct Notifier<'a, S: CommentSink + ?Sized> {
    sink: &'a S,
    target: Option<&'a ReviewTarget>,
}

impl<'a, S: CommentSink + ?Sized> Notifier<'a, S> {
    pub fn new(sink: &'a S, target: Option<&'a ReviewTarget>) -> Self {
        Self { sink, target }
    }

    pub fn has_target(&self) -> bool {
        self.target.is_some()
    }

    /// Render `template` and post it as one new comment. Never retried.
    pub async fn notify(&self, template: Template, ctx: &NotificationContext) -> Result<()> {
        let target = self.target.ok_or_else(|| {
            AppError::MissingContext(format!(
                "cannot post '{template}' comment: CI_PROJECT_ID or CI_MERGE_REQUEST_IID env var is not defined"
            ))
        })?;

        let body = render(template, ctx)?;

        self.sink
            .create_comment(target, &body)
            .await
            .map_err(|e| AppError::Notification(format!("'{template}' comment: {e}")))?;

        tracing::info!(
            template = %template,
            mr = target.merge_request_iid,
            "Posted merge request comment"
        );
        Ok(())
    }
}
