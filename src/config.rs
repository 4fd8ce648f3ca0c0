use serde::Deserialize;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::platform::types::ReviewTarget;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub gitlab: GitLabConfig,
    #[serde(default)]
    pub gates: GateConfig,
    #[serde(default)]
    pub tool: ToolConfig,
    /// Ambient CI values. Never read from the config file.
    #[serde(skip)]
    pub ci: CiContext,
}

#[derive(Deserialize, Clone, Default)]
pub struct GitLabConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub token: String,
}

// Manual Debug impl to avoid leaking the API token
impl std::fmt::Debug for GitLabConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitLabConfig")
            .field("url", &self.url)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct GateConfig {
    /// Require every approval rule of the merge request to be satisfied.
    #[serde(default = "default_true")]
    pub approved: bool,
    /// Require the merge request to be the oldest one still open.
    #[serde(default = "default_true")]
    pub oldest: bool,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            approved: true,
            oldest: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ToolConfig {
    #[serde(default = "default_binary")]
    pub binary: String,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
        }
    }
}

/// Values the GitLab runner exposes to every job.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CiContext {
    pub api_url: Option<String>,
    pub project_id: Option<String>,
    pub merge_request_iid: Option<String>,
    pub project_dir: Option<PathBuf>,
    pub commit_short_sha: String,
    pub job_url: String,
    pub pipeline_id: String,
    pub pipeline_url: String,
}

impl CiContext {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());

        Self {
            api_url: non_empty("CI_API_V4_URL"),
            project_id: non_empty("CI_PROJECT_ID"),
            merge_request_iid: non_empty("CI_MERGE_REQUEST_IID"),
            project_dir: non_empty("CI_PROJECT_DIR").map(PathBuf::from),
            commit_short_sha: lookup("CI_COMMIT_SHORT_SHA").unwrap_or_default(),
            job_url: lookup("CI_JOB_URL").unwrap_or_default(),
            pipeline_id: lookup("CI_PIPELINE_ID").unwrap_or_default(),
            pipeline_url: lookup("CI_PIPELINE_URL").unwrap_or_default(),
        }
    }

    /// Resolve the merge request this job runs for.
    ///
    /// `None` when the job does not run in a merge request pipeline.
    pub fn review_target(&self) -> Result<Option<ReviewTarget>> {
        let (Some(project_id), Some(iid)) = (&self.project_id, &self.merge_request_iid) else {
            return Ok(None);
        };

        let merge_request_iid = iid.parse::<u64>().map_err(|e| {
            AppError::Config(format!("Failed to parse CI_MERGE_REQUEST_IID '{iid}': {e}"))
        })?;

        Ok(Some(ReviewTarget {
            project_id: project_id.clone(),
            merge_request_iid,
        }))
    }
}

/// Command-line values that take precedence over file and environment.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub gitlab_url: Option<String>,
    pub gitlab_token: Option<String>,
    pub approved: Option<bool>,
    pub oldest: Option<bool>,
    pub binary: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_binary() -> String {
    "terraform".to_string()
}

impl AppConfig {
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        Self::load_with_env(config_path, None)
    }

    /// Load configuration, optionally reading `CIGATE__*` overrides from
    /// `env` instead of the process environment.
    pub fn load_with_env(
        config_path: Option<&str>,
        env: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = config::Config::builder();

        // Load from file if specified
        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path));
        } else {
            builder = builder.add_source(config::File::with_name("cigate").required(false));
        }

        // Environment variable overrides with CIGATE_ prefix
        builder = builder.add_source(
            config::Environment::with_prefix("CIGATE")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let config = builder
            .build()
            .map_err(|e| AppError::Config(e.to_string()))?;

        let mut app: AppConfig = config
            .try_deserialize()
            .map_err(|e| AppError::Config(e.to_string()))?;
        app.ci = CiContext::from_env();
        Ok(app)
    }

    pub fn apply_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(url) = overrides.gitlab_url {
            self.gitlab.url = url;
        }
        if let Some(token) = overrides.gitlab_token {
            self.gitlab.token = token;
        }
        if let Some(approved) = overrides.approved {
            self.gates.approved = approved;
        }
        if let Some(oldest) = overrides.oldest {
            self.gates.oldest = oldest;
        }
        if let Some(binary) = overrides.binary {
            self.tool.binary = binary;
        }
        self
    }

    /// Fill in the GitLab URL from the runner and check required settings.
    pub fn finalize(mut self) -> Result<Self> {
        if self.gitlab.url.is_empty() {
            if let Some(api_url) = &self.ci.api_url {
                self.gitlab.url = api_url.clone();
            }
        }

        if self.gitlab.url.is_empty() {
            return Err(AppError::Config(
                "GitLab API URL must be defined (--gitlab-url or CI_API_V4_URL)".to_string(),
            ));
        }
        if self.gitlab.token.is_empty() {
            return Err(AppError::Config(
                "GitLab API token must be defined (--gitlab-token, CIGATE_GITLAB_TOKEN or CIGATE__GITLAB__TOKEN)"
                    .to_string(),
            ));
        }
        if self.tool.binary.is_empty() {
            return Err(AppError::Config("Tool binary must not be empty".to_string()));
        }

        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ci_vars(pairs: &[(&str, &str)]) -> CiContext {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        CiContext::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_review_target_requires_both_identifiers() {
        let ci = ci_vars(&[("CI_PROJECT_ID", "42")]);
        assert_eq!(ci.review_target().unwrap(), None);

        let ci = ci_vars(&[("CI_PROJECT_ID", "42"), ("CI_MERGE_REQUEST_IID", "")]);
        assert_eq!(ci.review_target().unwrap(), None);
    }

    #[test]
    fn test_review_target_parses_iid() {
        let ci = ci_vars(&[("CI_PROJECT_ID", "42"), ("CI_MERGE_REQUEST_IID", "7")]);
        let target = ci.review_target().unwrap().unwrap();
        assert_eq!(target.project_id, "42");
        assert_eq!(target.merge_request_iid, 7);
    }

    #[test]
    fn test_review_target_rejects_non_numeric_iid() {
        let ci = ci_vars(&[("CI_PROJECT_ID", "42"), ("CI_MERGE_REQUEST_IID", "seven")]);
        let err = ci.review_target().unwrap_err().to_string();
        assert!(err.contains("CI_MERGE_REQUEST_IID"));
    }

    #[test]
    fn test_env_overrides_and_defaults() {
        let env = HashMap::from([
            ("CIGATE__GITLAB__TOKEN".to_string(), "secret".to_string()),
            ("CIGATE__GATES__OLDEST".to_string(), "false".to_string()),
        ]);
        let config = AppConfig::load_with_env(None, Some(env)).unwrap();

        assert_eq!(config.gitlab.token, "secret");
        assert!(config.gates.approved);
        assert!(!config.gates.oldest);
        assert_eq!(config.tool.binary, "terraform");
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cigate.toml");
        std::fs::write(
            &path,
            "[gitlab]\nurl = \"https://gitlab.example.com/api/v4\"\n\n[tool]\nbinary = \"tofu\"\n",
        )
        .unwrap();

        let config = AppConfig::load_with_env(path.to_str(), Some(HashMap::new())).unwrap();
        assert_eq!(config.gitlab.url, "https://gitlab.example.com/api/v4");
        assert_eq!(config.tool.binary, "tofu");
        assert_eq!(config.gates, GateConfig::default());
    }

    #[test]
    fn test_overrides_win_and_finalize_uses_ci_url() {
        let mut config = AppConfig::default();
        config.ci.api_url = Some("https://gitlab.example.com/api/v4".to_string());

        let config = config
            .apply_overrides(Overrides {
                gitlab_token: Some("tok".to_string()),
                approved: Some(false),
                ..Default::default()
            })
            .finalize()
            .unwrap();

        assert_eq!(config.gitlab.url, "https://gitlab.example.com/api/v4");
        assert!(!config.gates.approved);
        assert!(config.gates.oldest);
    }

    #[test]
    fn test_finalize_requires_token() {
        let mut config = AppConfig::default();
        config.gitlab.url = "https://gitlab.example.com/api/v4".to_string();
        let err = config.finalize().unwrap_err().to_string();
        assert!(err.contains("token"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let gitlab = GitLabConfig {
            url: "https://gitlab.example.com".to_string(),
            token: "glpat-secret".to_string(),
        };
        let debug = format!("{gitlab:?}");
        assert!(!debug.contains("glpat-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
