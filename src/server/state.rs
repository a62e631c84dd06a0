use std::sync::Arc;
use std::time::Instant;

use sqlx::PgPool;

use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::domain::changelog::ChangeLogger;
use crate::domain::events::EventBus;
use crate::integrations::{GitLabClient, JiraClient, SheetsClient};
use crate::store::{
    AttachmentStore, AuditLogStore, BugStore, CaseStore, CommentStore, IntegrationStore,
    NotificationStore, PlanStore, ProjectStore, RepositoryStore, RetentionStore, RunStore,
    RunsViewStore, SuiteStore, TenantStore, TokenStore, UserStore,
};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub pool: PgPool,
    pub jwt_validator: Arc<JwtValidator>,
    pub event_bus: Arc<EventBus>,
    pub change_logger: ChangeLogger,
    pub start_time: Instant,

    pub tenants: TenantStore,
    pub users: UserStore,
    pub tokens: TokenStore,
    pub projects: ProjectStore,
    pub repositories: RepositoryStore,
    pub suites: SuiteStore,
    pub cases: CaseStore,
    pub plans: PlanStore,
    pub runs: RunStore,
    pub runs_view: RunsViewStore,
    pub bugs: BugStore,
    pub comments: CommentStore,
    pub notifications: NotificationStore,
    pub audit: AuditLogStore,
    pub attachments: AttachmentStore,
    pub mirrors: IntegrationStore,
    pub retention: RetentionStore,

    pub jira: JiraClient,
    pub gitlab: GitLabClient,
    pub sheets: SheetsClient,
}

impl AppState {
    pub fn new(settings: Settings, pool: PgPool) -> Self {
        crate::metrics::init();

        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let event_bus = Arc::new(EventBus::new(settings.events.capacity));
        let change_logger = ChangeLogger::new(pool.clone());

        let jira = JiraClient::new(settings.integrations.jira.clone());
        let gitlab = GitLabClient::new(settings.integrations.gitlab.clone());
        let sheets = SheetsClient::new(settings.integrations.sheets.clone());

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            event_bus,
            change_logger,
            start_time: Instant::now(),

            tenants: TenantStore::new(pool.clone()),
            users: UserStore::new(pool.clone()),
            tokens: TokenStore::new(pool.clone()),
            projects: ProjectStore::new(pool.clone()),
            repositories: RepositoryStore::new(pool.clone()),
            suites: SuiteStore::new(pool.clone()),
            cases: CaseStore::new(pool.clone()),
            plans: PlanStore::new(pool.clone()),
            runs: RunStore::new(pool.clone()),
            runs_view: RunsViewStore::new(pool.clone()),
            bugs: BugStore::new(pool.clone()),
            comments: CommentStore::new(pool.clone()),
            notifications: NotificationStore::new(pool.clone()),
            audit: AuditLogStore::new(pool.clone()),
            attachments: AttachmentStore::new(pool.clone()),
            mirrors: IntegrationStore::new(pool.clone()),
            retention: RetentionStore::new(pool.clone()),

            jira,
            gitlab,
            sheets,

            pool,
        }
    }
}
