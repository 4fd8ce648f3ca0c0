pub mod types;

use std::path::PathBuf;

use crate::config::{AppConfig, CiContext, GateConfig};
use crate::error::{AppError, Result};
use crate::exec::{CommandRunner, ExecutionRequest};
use crate::gate::{self, Verdict};
use crate::notify::{NotificationContext, Notifier};
use crate::platform::ReviewPlatform;
use crate::summary::summarize;

use types::{rejection_template, Action, RunReport, Stage};

/// Everything a run needs, resolved once at startup.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub tool: String,
    pub gates: GateConfig,
    pub ci: CiContext,
    pub work_dir: PathBuf,
}

impl RunConfig {
    pub fn from_app(config: &AppConfig, work_dir: PathBuf) -> Self {
        Self {
            tool: config.tool.binary.clone(),
            gates: config.gates,
            ci: config.ci.clone(),
            work_dir,
        }
    }
}

pub struct Orchestrator<P, R> {
    config: RunConfig,
    platform: P,
    runner: R,
}

fn transition(stage: &mut Stage, next: Stage) {
    tracing::debug!(from = %stage, to = %next, "Stage transition");
    *stage = next;
}

fn strip_ansi(text: &str) -> String {
    console::strip_ansi_codes(text).into_owned()
}

impl<P, R> Orchestrator<P, R>
where
    P: ReviewPlatform,
    R: CommandRunner,
{
    pub fn new(config: RunConfig, platform: P, runner: R) -> Self {
        Self {
            config,
            platform,
            runner,
        }
    }

    /// Gate, run and report one tool invocation.
    ///
    /// Every failure is returned after the matching comment was posted (or
    /// could not be). Nothing is retried.
    pub async fn run(&self, action: Action, extra_args: &[String]) -> Result<RunReport> {
        let target = self.config.ci.review_target()?;
        let notifier = Notifier::new(&self.platform, target.as_ref());
        let ctx = NotificationContext::from_ci(&self.config.ci, &self.config.work_dir);
        let mut stage = Stage::Idle;

        tracing::info!(action = %action, dir = %ctx.dir, "Starting workflow");

        if action.is_gated() {
            transition(&mut stage, Stage::GateCheck);

            match gate::evaluate(&self.platform, target.as_ref(), &self.config.gates).await {
                Verdict::Pass => {}
                Verdict::Rejected { gate, outcome } => {
                    transition(&mut stage, Stage::Aborted);
                    let reason = outcome
                        .reason
                        .unwrap_or_else(|| "gate not satisfied".to_string());
                    tracing::warn!(gate = %gate, reason = %reason, "Gate rejected {action}");

                    let failure = AppError::GateRejected {
                        gate: gate.to_string(),
                        reason,
                    };
                    if let Err(e) = notifier.notify(rejection_template(gate), &ctx).await {
                        return Err(AppError::FailureNotNotified {
                            failure: Box::new(failure),
                            notification: Box::new(e),
                        });
                    }
                    return Err(failure);
                }
                Verdict::Errored { gate, error } => {
                    transition(&mut stage, Stage::Aborted);
                    tracing::error!(gate = %gate, error = %error, "Gate check failed");

                    if notifier.has_target() {
                        if let Err(e) = notifier.notify(rejection_template(gate), &ctx).await {
                            tracing::warn!(error = %e, "Failed to post rejection comment");
                        }
                    }
                    return Err(error);
                }
            }
        }

        if let Some(template) = action.running_template() {
            notifier.notify(template, &ctx).await?;
        }

        transition(&mut stage, Stage::Running);
        let mut args = vec![action.command().to_string()];
        args.extend_from_slice(extra_args);
        let request = ExecutionRequest {
            tool: self.config.tool.clone(),
            args,
            work_dir: self.config.work_dir.clone(),
        };
        let result = self.runner.run(&request).await;

        if let Some(failure) = result.failure() {
            transition(&mut stage, Stage::Failed);
            tracing::error!(error = %failure, exit_code = result.exit_code, "{action} failed");

            let failed_ctx = ctx.with_output(strip_ansi(&result.stderr_lossy()));
            if let Err(e) = notifier.notify(action.failed_template(), &failed_ctx).await {
                return Err(AppError::FailureNotNotified {
                    failure: Box::new(failure),
                    notification: Box::new(e),
                });
            }
            return Err(failure);
        }

        transition(&mut stage, Stage::Reporting);
        let stdout = strip_ansi(&result.stdout_lossy());
        let summary = summarize(action, &stdout);

        if let Some(template) = action.summary_template() {
            let summary_ctx = ctx.with_summary(summary.clone()).with_output(stdout);
            notifier.notify(template, &summary_ctx).await?;
        }

        transition(&mut stage, Stage::Done);
        tracing::info!(action = %action, summary = %summary, "Workflow complete");

        Ok(RunReport {
            action,
            stage,
            exit_code: result.exit_code,
            summary,
        })
    }
}
