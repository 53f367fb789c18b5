use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use super::domain::{GatewayUpdate, NewGateway, PaymentRequest, RefundRequest};
use super::service::PaymentService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<PaymentService>>;

/// Router builder for `/api/v1/payment-gateways`.
pub fn payments_router(service: Arc<PaymentService>) -> Router {
    Router::new()
        .route(
            "/api/v1/payment-gateways",
            get(list_gateways).post(create_gateway),
        )
        .route("/api/v1/payment-gateways/active", get(active_gateways))
        .route("/api/v1/payment-gateways/process", post(process_payment))
        .route("/api/v1/payment-gateways/payments", get(payments))
        .route("/api/v1/payment-gateways/payments/:id", get(payment))
        .route(
            "/api/v1/payment-gateways/payments/:id/transactions",
            get(transactions),
        )
        .route("/api/v1/payment-gateways/refunds", post(refund))
        .route(
            "/api/v1/payment-gateways/:id",
            get(get_gateway).put(update_gateway).delete(delete_gateway),
        )
        .with_state(service)
}

async fn create_gateway(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewGateway>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_gateway(&schema, &actor, input),
    )
}

async fn list_gateways(State(service): Service, Tenant(schema): Tenant, actor: Actor) -> Response {
    reply(StatusCode::OK, service.list_gateways(&schema, &actor))
}

async fn active_gateways(State(service): Service, Tenant(schema): Tenant) -> Response {
    reply(StatusCode::OK, service.active_gateways(&schema))
}

async fn get_gateway(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_gateway(&schema, &actor, id))
}

async fn update_gateway(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<GatewayUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_gateway(&schema, &actor, id, update),
    )
}

async fn delete_gateway(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.delete_gateway(&schema, &actor, id))
}

async fn process_payment(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(request): Json<PaymentRequest>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.process_payment(&schema, &actor, request),
    )
}

async fn payments(State(service): Service, Tenant(schema): Tenant, actor: Actor) -> Response {
    reply(StatusCode::OK, service.payments_for(&schema, &actor))
}

async fn payment(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_payment(&schema, &actor, id))
}

async fn transactions(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.transactions_for(&schema, &actor, id))
}

async fn refund(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(request): Json<RefundRequest>,
) -> Response {
    reply(StatusCode::CREATED, service.refund(&schema, &actor, request))
}
