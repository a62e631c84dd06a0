use serde::Serialize;

/// Domain events published on the in-process bus.
///
/// Each variant carries the tenant, the acting user, and the entity IDs a
/// listener needs to re-query state. Events are fire-and-forget: a listener
/// that cannot keep up loses events, and a listener failure is only logged.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    CaseCreated {
        tenant_id: i64,
        actor_id: i64,
        case_id: i64,
        suite_id: i64,
    },
    CaseUpdated {
        tenant_id: i64,
        actor_id: i64,
        case_id: i64,
    },
    CaseDeleted {
        tenant_id: i64,
        actor_id: i64,
        case_id: i64,
    },
    RunStarted {
        tenant_id: i64,
        actor_id: i64,
        run_id: i64,
        plan_id: i64,
    },
    ResultRecorded {
        tenant_id: i64,
        actor_id: i64,
        run_id: i64,
        case_id: i64,
        status: String,
    },
    RunFinished {
        tenant_id: i64,
        actor_id: i64,
        run_id: i64,
        started_by: i64,
        status: String,
    },
    BugCreated {
        tenant_id: i64,
        actor_id: i64,
        bug_id: i64,
        assignee_id: Option<i64>,
    },
    BugUpdated {
        tenant_id: i64,
        actor_id: i64,
        bug_id: i64,
        assignee_id: Option<i64>,
    },
    CommentAdded {
        tenant_id: i64,
        actor_id: i64,
        comment_id: i64,
        entity_type: String,
        entity_id: i64,
    },
}

impl DomainEvent {
    /// Stable dotted event name, used for metrics labels and logging.
    pub fn kind(&self) -> &'static str {
        match self {
            DomainEvent::CaseCreated { .. } => "case.created",
            DomainEvent::CaseUpdated { .. } => "case.updated",
            DomainEvent::CaseDeleted { .. } => "case.deleted",
            DomainEvent::RunStarted { .. } => "run.started",
            DomainEvent::ResultRecorded { .. } => "run.result_recorded",
            DomainEvent::RunFinished { .. } => "run.finished",
            DomainEvent::BugCreated { .. } => "bug.created",
            DomainEvent::BugUpdated { .. } => "bug.updated",
            DomainEvent::CommentAdded { .. } => "comment.added",
        }
    }

    pub fn tenant_id(&self) -> i64 {
        match self {
            DomainEvent::CaseCreated { tenant_id, .. }
            | DomainEvent::CaseUpdated { tenant_id, .. }
            | DomainEvent::CaseDeleted { tenant_id, .. }
            | DomainEvent::RunStarted { tenant_id, .. }
            | DomainEvent::ResultRecorded { tenant_id, .. }
            | DomainEvent::RunFinished { tenant_id, .. }
            | DomainEvent::BugCreated { tenant_id, .. }
            | DomainEvent::BugUpdated { tenant_id, .. }
            | DomainEvent::CommentAdded { tenant_id, .. } => *tenant_id,
        }
    }

    pub fn actor_id(&self) -> i64 {
        match self {
            DomainEvent::CaseCreated { actor_id, .. }
            | DomainEvent::CaseUpdated { actor_id, .. }
            | DomainEvent::CaseDeleted { actor_id, .. }
            | DomainEvent::RunStarted { actor_id, .. }
            | DomainEvent::ResultRecorded { actor_id, .. }
            | DomainEvent::RunFinished { actor_id, .. }
            | DomainEvent::BugCreated { actor_id, .. }
            | DomainEvent::BugUpdated { actor_id, .. }
            | DomainEvent::CommentAdded { actor_id, .. } => *actor_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names() {
        let event = DomainEvent::RunStarted {
            tenant_id: 1,
            actor_id: 2,
            run_id: 3,
            plan_id: 4,
        };
        assert_eq!(event.kind(), "run.started");
        assert_eq!(event.tenant_id(), 1);
        assert_eq!(event.actor_id(), 2);
    }

    #[test]
    fn test_serializes_with_tag() {
        let event = DomainEvent::CommentAdded {
            tenant_id: 1,
            actor_id: 2,
            comment_id: 3,
            entity_type: "bug".to_string(),
            entity_id: 4,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "comment_added");
        assert_eq!(json["entity_type"], "bug");
    }
}
