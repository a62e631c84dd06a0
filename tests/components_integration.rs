//! Cross-component integration tests.
//!
//! These tests verify interactions between components that do not require
//! a database: the domain event bus and listener loop, JWT validation, the
//! personal-access-token scheme, and the pagination envelope.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use qahub::auth::{generate_token, hash_token, is_personal_token, Claims, JwtValidator};
use qahub::config::JwtConfig;
use qahub::domain::events::{DomainEvent, EventBus};
use qahub::domain::pagination::{Page, PageParams};
use qahub::listeners::{spawn_listener, EventListener};

struct RecordingListener {
    kinds: std::sync::Mutex<Vec<&'static str>>,
    handled: AtomicUsize,
}

impl RecordingListener {
    fn new() -> Self {
        Self {
            kinds: std::sync::Mutex::new(Vec::new()),
            handled: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EventListener for RecordingListener {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn handle(&self, event: &DomainEvent) -> qahub::error::Result<()> {
        self.kinds.lock().unwrap().push(event.kind());
        self.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn run_started(run_id: i64) -> DomainEvent {
    DomainEvent::RunStarted {
        tenant_id: 1,
        actor_id: 2,
        run_id,
        plan_id: 9,
    }
}

#[tokio::test]
async fn test_event_flow_through_listener_loop() {
    let bus = EventBus::new(64);
    let listener = Arc::new(RecordingListener::new());
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

    let handle = spawn_listener(&bus, listener.clone(), shutdown_rx);
    tokio::time::sleep(Duration::from_millis(20)).await;

    bus.emit(run_started(1));
    bus.emit(DomainEvent::ResultRecorded {
        tenant_id: 1,
        actor_id: 2,
        run_id: 1,
        case_id: 5,
        status: "passed".to_string(),
    });
    bus.emit(DomainEvent::RunFinished {
        tenant_id: 1,
        actor_id: 2,
        run_id: 1,
        started_by: 2,
        status: "completed".to_string(),
    });

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(listener.handled.load(Ordering::SeqCst), 3);
    assert_eq!(
        *listener.kinds.lock().unwrap(),
        vec!["run.started", "run.result_recorded", "run.finished"]
    );

    let stats = bus.stats();
    assert_eq!(stats.emitted.get("run.started"), Some(&1));
    assert_eq!(stats.subscribers, 1);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("listener should stop")
        .expect("listener should not panic");
}

#[tokio::test]
async fn test_two_listeners_both_receive_each_event() {
    let bus = EventBus::new(64);
    let first = Arc::new(RecordingListener::new());
    let second = Arc::new(RecordingListener::new());
    let (shutdown_tx, _) = broadcast::channel(1);

    let h1 = spawn_listener(&bus, first.clone(), shutdown_tx.subscribe());
    let h2 = spawn_listener(&bus, second.clone(), shutdown_tx.subscribe());
    tokio::time::sleep(Duration::from_millis(20)).await;

    for run_id in 0..5 {
        bus.emit(run_started(run_id));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(first.handled.load(Ordering::SeqCst), 5);
    assert_eq!(second.handled.load(Ordering::SeqCst), 5);

    shutdown_tx.send(()).unwrap();
    let _ = tokio::join!(h1, h2);
}

#[test]
fn test_jwt_round_trip_with_tenant_claim() {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let config = JwtConfig {
        secret: "integration-test-secret".to_string(),
        issuer: None,
        audience: None,
    };
    let validator = JwtValidator::new(&config);

    let claims = Claims {
        sub: "42".to_string(),
        exp: chrono::Utc::now().timestamp() + 600,
        iat: chrono::Utc::now().timestamp(),
        tenant_id: Some("7".to_string()),
        roles: vec!["admin".to_string()],
        extra: Default::default(),
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .unwrap();

    let validated = validator.validate(&token).unwrap();
    assert_eq!(validated.user_id(), Some(42));
    assert_eq!(validated.tenant_id(), Some(7));
    assert!(validated.has_role("admin"));
}

#[test]
fn test_personal_token_scheme() {
    let secret = generate_token();

    // PATs are distinguishable from JWTs by prefix.
    assert!(is_personal_token(&secret));
    assert!(!is_personal_token("eyJhbGciOiJIUzI1NiJ9.e30.x"));

    // The stored hash is deterministic and never equals the secret.
    let hash = hash_token(&secret);
    assert_eq!(hash, hash_token(&secret));
    assert_ne!(hash, secret);
    assert_eq!(hash.len(), 64);
}

#[test]
fn test_page_envelope_preserves_total_across_map() {
    let params = PageParams {
        page: Some(2),
        limit: Some(10),
    };
    let page = Page::new(vec![1, 2, 3], params, 23);
    assert_eq!(page.page, 2);
    assert_eq!(page.limit, 10);
    assert_eq!(page.total, 23);

    let mapped = page.map(|n| n.to_string());
    assert_eq!(mapped.items, vec!["1", "2", "3"]);
    assert_eq!(mapped.total, 23);
}
