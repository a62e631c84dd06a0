//! GitLab API client.
//!
//! Fetches merge requests for the analytics mirror via the v4 API with a
//! personal access token.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::GitLabConfig;
use crate::error::{AppError, FieldError, Result};
use crate::store::GitLabMergeRequestRecord;

#[derive(Clone)]
pub struct GitLabClient {
    client: Client,
    config: GitLabConfig,
}

#[derive(Debug, Deserialize)]
struct MergeRequestEnvelope {
    iid: i64,
    title: String,
    state: String,
    author: Option<AuthorEnvelope>,
    #[serde(default)]
    web_url: String,
}

#[derive(Debug, Deserialize)]
struct AuthorEnvelope {
    username: String,
}

impl GitLabClient {
    pub fn new(config: GitLabConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    fn credentials(&self) -> Result<(&str, &str)> {
        let mut missing = Vec::new();
        if self.config.base_url.is_none() {
            missing.push(FieldError::new("integrations.gitlab.base_url", "not configured"));
        }
        if self.config.token.is_none() {
            missing.push(FieldError::new("integrations.gitlab.token", "not configured"));
        }

        if !missing.is_empty() {
            return Err(AppError::Validation {
                message: "GitLab integration is not configured".to_string(),
                details: missing,
            });
        }

        Ok((
            self.config.base_url.as_deref().unwrap(),
            self.config.token.as_deref().unwrap(),
        ))
    }

    /// List merge requests of a GitLab project (numeric ID or URL-encoded
    /// path), returning mirror records.
    pub async fn list_merge_requests(
        &self,
        gitlab_project: &str,
        state: &str,
        per_page: u32,
    ) -> Result<Vec<GitLabMergeRequestRecord>> {
        let (base_url, token) = self.credentials()?;

        let url = format!(
            "{}/api/v4/projects/{}/merge_requests",
            base_url.trim_end_matches('/'),
            urlencode(gitlab_project),
        );

        let per_page = per_page.to_string();

        let response = self
            .client
            .get(&url)
            .header("PRIVATE-TOKEN", token)
            .query(&[("state", state), ("per_page", per_page.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("GitLab request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "GitLab merge_requests returned {}",
                status
            )));
        }

        let body: Vec<MergeRequestEnvelope> = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("GitLab response was not valid JSON: {}", e)))?;

        let merge_requests = body
            .into_iter()
            .map(|mr| GitLabMergeRequestRecord {
                iid: mr.iid,
                title: mr.title,
                state: mr.state,
                author_username: mr
                    .author
                    .map(|a| a.username)
                    .unwrap_or_else(|| "unknown".to_string()),
                web_url: mr.web_url,
            })
            .collect();

        Ok(merge_requests)
    }
}

/// Percent-encode a project path for use as a GitLab path parameter.
/// Numeric IDs pass through untouched.
fn urlencode(project: &str) -> String {
    project.replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencode_path() {
        assert_eq!(urlencode("group/app"), "group%2Fapp");
        assert_eq!(urlencode("12345"), "12345");
    }

    #[test]
    fn test_unconfigured_client_reports_missing_settings() {
        let client = GitLabClient::new(GitLabConfig::default());
        let err = client.credentials().unwrap_err();

        match err {
            AppError::Validation { details, .. } => {
                assert_eq!(details.len(), 2);
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_merge_request_parsing() {
        let json = r#"[
            {"iid": 7, "title": "Fix flaky suite", "state": "merged",
             "author": {"username": "rk"}, "web_url": "https://gitlab.example.com/mr/7"},
            {"iid": 8, "title": "Draft", "state": "opened"}
        ]"#;

        let parsed: Vec<MergeRequestEnvelope> = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].iid, 7);
        assert!(parsed[1].author.is_none());
    }
}
