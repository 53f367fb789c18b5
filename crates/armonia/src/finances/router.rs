use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use super::domain::{
    ApplyRequest, EvaluationRequest, InvoiceRuleFilter, InvoiceRuleUpdate, NewInvoiceRule,
    ToggleRequest,
};
use super::service::InvoiceRuleService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<InvoiceRuleService>>;

/// Router builder for `/api/v1/finances/invoice-rules`.
pub fn invoice_rules_router(service: Arc<InvoiceRuleService>) -> Router {
    Router::new()
        .route("/api/v1/finances/invoice-rules", get(list).post(create))
        .route("/api/v1/finances/invoice-rules/apply", post(apply))
        .route(
            "/api/v1/finances/invoice-rules/:id",
            get(fetch).put(update).delete(remove),
        )
        .route("/api/v1/finances/invoice-rules/:id/toggle", post(toggle))
        .route("/api/v1/finances/invoice-rules/:id/evaluate", post(evaluate))
        .with_state(service)
}

async fn list(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(filter): Query<InvoiceRuleFilter>,
) -> Response {
    reply(StatusCode::OK, service.list(&schema, &actor, &filter))
}

async fn create(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewInvoiceRule>,
) -> Response {
    reply(StatusCode::CREATED, service.create(&schema, &actor, input))
}

async fn fetch(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get(&schema, &actor, id))
}

async fn update(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<InvoiceRuleUpdate>,
) -> Response {
    reply(StatusCode::OK, service.update(&schema, &actor, id, input))
}

async fn remove(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.delete(&schema, &actor, id))
}

async fn toggle(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<ToggleRequest>,
) -> Response {
    reply(
        StatusCode::OK,
        service.toggle_active(&schema, &actor, id, input.active),
    )
}

async fn evaluate(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<EvaluationRequest>,
) -> Response {
    reply(
        StatusCode::OK,
        service.evaluate(&schema, &actor, id, &input.data),
    )
}

async fn apply(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<ApplyRequest>,
) -> Response {
    reply(
        StatusCode::OK,
        service.apply(&schema, &actor, &input.category, &input.data),
    )
}
