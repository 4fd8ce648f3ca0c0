use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;

use crate::config::GitLabConfig;
use crate::error::{AppError, Result};
use crate::platform::types::*;
use crate::platform::{ApprovalSource, CommentSink, MergeRequestSource};

use super::mapper::{self, ApiApprovalState, ApiMergeRequest};

const PER_PAGE: u32 = 100;

pub struct GitLabPlatform {
    client: Client,
    base_url: String,
    token: String,
}

impl GitLabPlatform {
    pub fn new(config: &GitLabConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(AppError::Config("GitLab API URL is empty".to_string()));
        }

        let client = Client::builder()
            .user_agent(concat!("cigate/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Build `/projects/:id` for a numeric id or a `group/project` path.
    fn project_url(&self, project_id: &str) -> String {
        format!(
            "{}/projects/{}",
            self.base_url,
            urlencoding::encode(project_id)
        )
    }

    fn merge_request_url(&self, target: &ReviewTarget) -> String {
        format!(
            "{}/merge_requests/{}",
            self.project_url(&target.project_id),
            target.merge_request_iid
        )
    }

    async fn check_status(response: Response, action: &str) -> Result<Response> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ReviewApi(format!(
                "Failed to {action}: API returned {status}: {body}"
            )));
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, action: &str) -> Result<T> {
        let response = self
            .client
            .get(url)
            .header("PRIVATE-TOKEN", &self.token)
            .send()
            .await?;

        let response = Self::check_status(response, action).await?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl ApprovalSource for GitLabPlatform {
    async fn approval_rules(&self, target: &ReviewTarget) -> Result<Vec<ApprovalRule>> {
        let url = format!("{}/approval_state", self.merge_request_url(target));
        let state: ApiApprovalState = self
            .get_json(&url, "get merge request approval state")
            .await?;

        Ok(mapper::map_approval_rules(state))
    }
}

#[async_trait]
impl MergeRequestSource for GitLabPlatform {
    async fn open_merge_requests(&self, project_id: &str) -> Result<Vec<MergeRequest>> {
        let url = format!("{}/merge_requests", self.project_url(project_id));
        let mut result = Vec::new();
        let mut page: u32 = 1;

        loop {
            let response = self
                .client
                .get(&url)
                .header("PRIVATE-TOKEN", &self.token)
                .query(&[
                    ("state", "opened".to_string()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await?;

            let response = Self::check_status(response, "list project merge requests").await?;

            // GitLab leaves X-Next-Page empty on the last page
            let next_page = response
                .headers()
                .get("x-next-page")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());

            let items: Vec<ApiMergeRequest> = response.json().await?;
            result.extend(items.into_iter().map(mapper::map_merge_request));

            match next_page {
                Some(next) if next > page => page = next,
                _ => break,
            }
        }

        tracing::debug!(project = project_id, count = result.len(), "Listed open merge requests");
        Ok(result)
    }
}

#[async_trait]
impl CommentSink for GitLabPlatform {
    async fn create_comment(&self, target: &ReviewTarget, body: &str) -> Result<()> {
        let url = format!("{}/notes", self.merge_request_url(target));
        let response = self
            .client
            .post(&url)
            .header("PRIVATE-TOKEN", &self.token)
            .json(&json!({ "body": body }))
            .send()
            .await?;

        Self::check_status(response, "create merge request comment").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn platform(url: &str) -> GitLabPlatform {
        GitLabPlatform::new(&GitLabConfig {
            url: url.to_string(),
            token: "token".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn test_project_url_encodes_path() {
        let p = platform("https://gitlab.example.com/api/v4/");
        assert_eq!(
            p.project_url("group/sub/project"),
            "https://gitlab.example.com/api/v4/projects/group%2Fsub%2Fproject"
        );
        assert_eq!(
            p.project_url("42"),
            "https://gitlab.example.com/api/v4/projects/42"
        );
    }

    #[test]
    fn test_merge_request_url() {
        let p = platform("https://gitlab.example.com/api/v4");
        let target = ReviewTarget {
            project_id: "42".to_string(),
            merge_request_iid: 7,
        };
        assert_eq!(
            p.merge_request_url(&target),
            "https://gitlab.example.com/api/v4/projects/42/merge_requests/7"
        );
    }

    #[test]
    fn test_new_rejects_empty_url() {
        let result = GitLabPlatform::new(&GitLabConfig::default());
        assert!(result.is_err());
    }
}
