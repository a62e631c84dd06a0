//! Jira REST client.
//!
//! Fetches issues for the analytics mirror via the v2 search API using
//! basic auth (account email + API token).

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::config::JiraConfig;
use crate::error::{AppError, FieldError, Result};
use crate::store::JiraIssueRecord;

#[derive(Clone)]
pub struct JiraClient {
    client: Client,
    config: JiraConfig,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<IssueEnvelope>,
}

#[derive(Debug, Deserialize)]
struct IssueEnvelope {
    key: String,
    fields: IssueFields,
}

#[derive(Debug, Deserialize)]
struct IssueFields {
    #[serde(default)]
    summary: String,
    status: Option<NamedField>,
    issuetype: Option<NamedField>,
}

#[derive(Debug, Deserialize)]
struct NamedField {
    name: String,
}

impl JiraClient {
    pub fn new(config: JiraConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    /// Settings required before a sync can run; 400 with the missing keys
    /// named when absent.
    fn credentials(&self) -> Result<(&str, &str, &str)> {
        let mut missing = Vec::new();
        if self.config.base_url.is_none() {
            missing.push(FieldError::new("integrations.jira.base_url", "not configured"));
        }
        if self.config.email.is_none() {
            missing.push(FieldError::new("integrations.jira.email", "not configured"));
        }
        if self.config.api_token.is_none() {
            missing.push(FieldError::new("integrations.jira.api_token", "not configured"));
        }

        if !missing.is_empty() {
            return Err(AppError::Validation {
                message: "Jira integration is not configured".to_string(),
                details: missing,
            });
        }

        Ok((
            self.config.base_url.as_deref().unwrap(),
            self.config.email.as_deref().unwrap(),
            self.config.api_token.as_deref().unwrap(),
        ))
    }

    /// Search issues by JQL, returning mirror records.
    pub async fn search_issues(&self, jql: &str, max_results: u32) -> Result<Vec<JiraIssueRecord>> {
        let (base_url, email, api_token) = self.credentials()?;

        let url = format!("{}/rest/api/2/search", base_url.trim_end_matches('/'));
        let max_results = max_results.to_string();

        let response = self
            .client
            .get(&url)
            .basic_auth(email, Some(api_token))
            .query(&[("jql", jql), ("maxResults", max_results.as_str())])
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("Jira request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Upstream(format!(
                "Jira search returned {}",
                status
            )));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Jira response was not valid JSON: {}", e)))?;

        let issues = body
            .issues
            .into_iter()
            .map(|issue| JiraIssueRecord {
                issue_key: issue.key,
                summary: issue.fields.summary,
                status: issue
                    .fields
                    .status
                    .map(|s| s.name)
                    .unwrap_or_else(|| "unknown".to_string()),
                issue_type: issue
                    .fields
                    .issuetype
                    .map(|t| t.name)
                    .unwrap_or_else(|| "unknown".to_string()),
            })
            .collect();

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_client_reports_missing_settings() {
        let client = JiraClient::new(JiraConfig::default());
        let err = client.credentials().unwrap_err();

        match err {
            AppError::Validation { details, .. } => {
                assert_eq!(details.len(), 3);
                assert!(details.iter().any(|d| d.field == "integrations.jira.base_url"));
            }
            _ => panic!("expected validation error"),
        }
    }

    #[test]
    fn test_search_response_parsing() {
        let json = r#"{
            "issues": [
                {"key": "QA-1", "fields": {"summary": "Login broken",
                 "status": {"name": "Open"}, "issuetype": {"name": "Bug"}}},
                {"key": "QA-2", "fields": {"summary": "Spec gap"}}
            ]
        }"#;

        let parsed: SearchResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.issues.len(), 2);
        assert_eq!(parsed.issues[0].key, "QA-1");
        assert!(parsed.issues[1].fields.status.is_none());
    }
}
