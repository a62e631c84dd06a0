//! Outbound integration clients (Jira, GitLab, Google Sheets).
//!
//! Calls are synchronous from the caller's point of view: a sync endpoint
//! performs the upstream fetch, upserts the mirror rows, and returns. There
//! is no retry or circuit breaking; upstream failures surface as 502.

mod gitlab;
mod jira;
mod sheets;

pub use gitlab::GitLabClient;
pub use jira::JiraClient;
pub use sheets::{ExportOutcome, SheetsClient};
