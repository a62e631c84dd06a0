//! Data access layer.
//!
//! One store per resource. Every tenant-scoped query filters on
//! `tenant_id`, and reads exclude soft-deleted rows unless a caller asks
//! for them explicitly. Lists are paginated with a separate filtered
//! `COUNT(*)`.

mod attachments;
mod audit;
mod bugs;
mod cases;
mod comments;
mod integrations;
mod notifications;
mod plans;
mod projects;
mod repositories;
mod retention;
mod runs;
mod runs_view;
mod suites;
mod tenants;
mod tokens;
mod users;

pub use attachments::{Attachment, AttachmentStore, NewAttachment};
pub use audit::{AuditLogEntry, AuditLogFilter, AuditLogStore};
pub use bugs::{
    budget_period, Bug, BugBudget, BugBudgetStatus, BugStore, NewBug, UpdateBug, BUG_SEVERITIES,
    BUG_STATUSES,
};
pub use cases::{CaseStore, NewCase, TestCase, UpdateCase};
pub use comments::{Comment, CommentStore, COMMENTABLE_TYPES};
pub use integrations::{
    GitLabMergeRequestRecord, IntegrationStore, JiraIssueRecord, StoredGitLabMergeRequest,
    StoredJiraIssue,
};
pub use notifications::{Notification, NotificationStore};
pub use plans::{NewPlan, PlanStore, TestPlan, UpdatePlan};
pub use projects::{NewProject, Project, ProjectStore, UpdateProject};
pub use repositories::{NewRepository, Repository, RepositoryStore, UpdateRepository};
pub use retention::RetentionStore;
pub use runs::{
    NewRun, RecordResult, RunStore, TestResult, TestRun, RESULT_STATUSES, RUN_STATUS_ABORTED,
    RUN_STATUS_COMPLETED, RUN_STATUS_RUNNING,
};
pub use runs_view::{RunsViewRow, RunsViewStore};
pub use suites::{NewSuite, SuiteStore, TestSuite, UpdateSuite};
pub use tenants::{Tenant, TenantStore};
pub use tokens::{PersonalAccessToken, TokenAuthRow, TokenStore};
pub use users::{NewUser, UpdateUser, User, UserStore};

use crate::error::AppError;

/// Translate a unique-constraint violation into a 409, leaving every other
/// database error as a 500.
pub(crate) fn conflict_on_unique(e: sqlx::Error, message: &str) -> AppError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            AppError::Conflict(message.to_string())
        }
        _ => AppError::Database(e),
    }
}
