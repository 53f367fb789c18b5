//! Shared fixtures: an in-memory service graph, a recording publisher and request helpers.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use armonia::app::{Integrations, Services};
use armonia::config::AssemblyConfig;
use armonia::notifications::{EventPublisher, PublishError, RealtimeEvent};
use armonia::store::Database;
use armonia::tenancy::{SchemaName, TENANT_HEADER, USER_ID_HEADER, USER_ROLE_HEADER};
use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

pub const TENANT_A: &str = "torres_del_parque";
pub const TENANT_B: &str = "altos_del_rio";

pub fn schema(raw: &str) -> SchemaName {
    SchemaName::parse(raw).expect("valid schema")
}

/// Keeps every broadcast so tests can assert on channels and payloads.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(SchemaName, RealtimeEvent)>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<(SchemaName, RealtimeEvent)> {
        self.events.lock().expect("publisher mutex poisoned").clone()
    }

    pub fn of_type(&self, event_type: &str) -> Vec<RealtimeEvent> {
        self.events()
            .into_iter()
            .filter(|(_, event)| event.event_type == event_type)
            .map(|(_, event)| event)
            .collect()
    }
}

impl EventPublisher for RecordingPublisher {
    fn broadcast(&self, schema: &SchemaName, event: RealtimeEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .expect("publisher mutex poisoned")
            .push((schema.clone(), event));
        Ok(())
    }
}

pub struct Harness {
    pub services: Services,
    pub publisher: Arc<RecordingPublisher>,
    pub router: Router,
}

pub fn harness() -> Harness {
    harness_with(Database::in_memory())
}

pub fn harness_with(database: Database) -> Harness {
    build(database, |_| {})
}

/// Harness whose outbound collaborators are adjusted by `customize`.
pub fn harness_integrating(customize: impl FnOnce(&mut Integrations)) -> Harness {
    build(Database::in_memory(), customize)
}

fn build(database: Database, customize: impl FnOnce(&mut Integrations)) -> Harness {
    let publisher = Arc::new(RecordingPublisher::default());
    let config = AssemblyConfig {
        signatures_required: 2,
        documents_base_url: "https://docs.armonia.test".to_string(),
    };
    let mut integrations = Integrations::in_process(publisher.clone(), &config);
    customize(&mut integrations);
    let services = Services::new(&database, integrations, config);
    let router = services.router();
    Harness {
        services,
        publisher,
        router,
    }
}

/// Caller identity attached to a request.
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub tenant: &'static str,
    pub user_id: u64,
    pub role: &'static str,
}

pub const fn admin(tenant: &'static str) -> Caller {
    Caller {
        tenant,
        user_id: 1,
        role: "ADMIN",
    }
}

pub const fn resident(tenant: &'static str, user_id: u64) -> Caller {
    Caller {
        tenant,
        user_id,
        role: "RESIDENT",
    }
}

pub const fn staff(tenant: &'static str, user_id: u64) -> Caller {
    Caller {
        tenant,
        user_id,
        role: "STAFF",
    }
}

impl Harness {
    pub async fn send(
        &self,
        caller: Caller,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(TENANT_HEADER, caller.tenant)
            .header(USER_ID_HEADER, caller.user_id.to_string())
            .header(USER_ROLE_HEADER, caller.role);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .expect("request builds");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        (status, read_json_body(response.into_body()).await)
    }

    /// POST a raw body, as the image upload route expects.
    pub async fn post_bytes(
        &self,
        caller: Caller,
        uri: &str,
        bytes: Vec<u8>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(TENANT_HEADER, caller.tenant)
            .header(USER_ID_HEADER, caller.user_id.to_string())
            .header(USER_ROLE_HEADER, caller.role)
            .header("content-type", "application/octet-stream")
            .body(Body::from(bytes))
            .expect("request builds");
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router responds");
        let status = response.status();
        (status, read_json_body(response.into_body()).await)
    }

    pub async fn get(&self, caller: Caller, uri: &str) -> (StatusCode, Value) {
        self.send(caller, Method::GET, uri, None).await
    }

    pub async fn post(&self, caller: Caller, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(caller, Method::POST, uri, Some(body)).await
    }

    pub async fn post_empty(&self, caller: Caller, uri: &str) -> (StatusCode, Value) {
        self.send(caller, Method::POST, uri, None).await
    }

    pub async fn put(&self, caller: Caller, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(caller, Method::PUT, uri, Some(body)).await
    }

    pub async fn delete(&self, caller: Caller, uri: &str) -> (StatusCode, Value) {
        self.send(caller, Method::DELETE, uri, None).await
    }
}

pub async fn read_json_body(body: Body) -> Value {
    let bytes = to_bytes(body, usize::MAX).await.expect("body reads");
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(
        String::from_utf8_lossy(&bytes).into_owned(),
    ))
}

pub fn id_of(body: &Value) -> u64 {
    body["id"].as_u64().expect("response carries an id")
}
