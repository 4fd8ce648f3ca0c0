pub mod gitlab;
pub mod types;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

#[async_trait]
pub trait ApprovalSource: Send + Sync {
    /// Fetch the approval rules of a merge request with their current approvers.
    async fn approval_rules(&self, target: &ReviewTarget) -> Result<Vec<ApprovalRule>>;
}

#[async_trait]
pub trait MergeRequestSource: Send + Sync {
    /// List every merge request of the project that is still open.
    async fn open_merge_requests(&self, project_id: &str) -> Result<Vec<MergeRequest>>;
}

#[async_trait]
pub trait CommentSink: Send + Sync {
    /// Post a new comment on a merge request.
    async fn create_comment(&self, target: &ReviewTarget, body: &str) -> Result<()>;
}

/// Everything the workflow needs from the review system.
pub trait ReviewPlatform: ApprovalSource + MergeRequestSource + CommentSink {}

impl<T> ReviewPlatform for T where T: ApprovalSource + MergeRequestSource + CommentSink {}

#[async_trait]
impl<T: ApprovalSource + ?Sized> ApprovalSource for &T {
    async fn approval_rules(&self, target: &ReviewTarget) -> Result<Vec<ApprovalRule>> {
        (**self).approval_rules(target).await
    }
}

#[async_trait]
impl<T: MergeRequestSource + ?Sized> MergeRequestSource for &T {
    async fn open_merge_requests(&self, project_id: &str) -> Result<Vec<MergeRequest>> {
        (**self).open_merge_requests(project_id).await
    }
}

#[async_trait]
impl<T: CommentSink + ?Sized> CommentSink for &T {
    async fn create_comment(&self, target: &ReviewTarget, body: &str) -> Result<()> {
        (**self).create_comment(target, body).await
    }
}
