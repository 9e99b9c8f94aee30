//! Integration test verifying that authorization checks produce spans and
//! structured audit events.

#![allow(clippy::expect_used)]

use std::sync::{Arc, Mutex};

use tracing::{
    Subscriber,
    field::{Field, Visit},
};
use tracing_subscriber::{layer::SubscriberExt, registry::LookupSpan};
use warden_authz::{AuthorizationEvaluator, AuthorizationRequest, PolicyDirectory};
use warden_transport::{Endpoints, MemoryTransport, Tenancy};

// ---------------------------------------------------------------------------
// Collecting layer: records span names and audit event fields
// ---------------------------------------------------------------------------

#[derive(Clone, Default)]
struct Collector {
    spans: Arc<Mutex<Vec<String>>>,
    audits: Arc<Mutex<Vec<Vec<(String, String)>>>>,
}

#[derive(Default)]
struct FieldVisitor {
    fields: Vec<(String, String)>,
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.fields.push((field.name().to_owned(), format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.fields.push((field.name().to_owned(), value.to_owned()));
    }
}

impl<S> tracing_subscriber::Layer<S> for Collector
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(
        &self,
        _attrs: &tracing::span::Attributes<'_>,
        id: &tracing::span::Id,
        ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if let Some(span) = ctx.span(id) {
            self.spans.lock().expect("lock poisoned").push(span.name().to_owned());
        }
    }

    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let is_audit = visitor.fields.iter().any(|(k, v)| k == "message" && v == "audit_event");
        if is_audit {
            self.audits.lock().expect("lock poisoned").push(visitor.fields);
        }
    }
}

fn field<'a>(fields: &'a [(String, String)], name: &str) -> Option<&'a str> {
    fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
}

fn evaluator() -> AuthorizationEvaluator {
    let endpoints = Endpoints::new("project-test-1", Tenancy::B2b);
    let transport = MemoryTransport::new();
    transport.respond(
        endpoints.policy(),
        serde_json::json!({ "policy": { "roles": [{
            "role_id": "admin",
            "permissions": [{ "actions": ["*"], "resource_id": "users" }]
        }] } }),
    );
    AuthorizationEvaluator::new(Arc::new(PolicyDirectory::new(Arc::new(transport), &endpoints)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn authorize_creates_span_and_policy_span() {
    let collector = Collector::default();
    let spans = Arc::clone(&collector.spans);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let request = AuthorizationRequest::new("read", "users").in_organization("org-A");
    evaluator().authorize(&["admin"], "org-A", &request).await.expect("should be allowed");

    let recorded = spans.lock().expect("lock poisoned");
    assert!(recorded.iter().any(|s| s == "authorize"), "expected 'authorize', got: {recorded:?}");
    assert!(recorded.iter().any(|s| s == "get_policy"), "expected 'get_policy', got: {recorded:?}");
}

#[tokio::test]
async fn allowed_check_emits_success_audit_event() {
    let collector = Collector::default();
    let audits = Arc::clone(&collector.audits);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let request = AuthorizationRequest::new("read", "users");
    evaluator().authorize_consumer(&["admin"], &request).await.expect("should be allowed");

    let recorded = audits.lock().expect("lock poisoned");
    assert_eq!(recorded.len(), 1);
    assert_eq!(field(&recorded[0], "audit.action"), Some("authorize_consumer"));
    assert_eq!(field(&recorded[0], "audit.resource"), Some("users"));
    assert_eq!(field(&recorded[0], "audit.result"), Some("success"));
}

#[tokio::test]
async fn tenancy_mismatch_emits_failure_audit_event() {
    let collector = Collector::default();
    let audits = Arc::clone(&collector.audits);

    let subscriber = tracing_subscriber::registry().with(collector);
    let _guard = tracing::subscriber::set_default(subscriber);

    let request = AuthorizationRequest::new("read", "users").in_organization("org-B");
    let _ = evaluator().authorize(&["admin"], "org-A", &request).await;

    let recorded = audits.lock().expect("lock poisoned");
    assert_eq!(recorded.len(), 1);
    assert_eq!(field(&recorded[0], "audit.action"), Some("authorize_tenant"));
    assert_eq!(field(&recorded[0], "audit.organization"), Some("org-B"));
    let result = field(&recorded[0], "audit.result").expect("audit.result recorded");
    assert!(result.starts_with("failure: Tenancy mismatch"), "got: {result}");
}
