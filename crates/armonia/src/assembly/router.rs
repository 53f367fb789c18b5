use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};

use super::domain::{
    AssemblyFilter, AssemblyUpdate, NewAssembly, NewAttendance, NewVote, NewVoting,
    SignatureContext, Signer,
};
use super::service::AssemblyService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

type Service = State<Arc<AssemblyService>>;

/// Router builder for `/api/v1/assemblies`.
pub fn assemblies_router(service: Arc<AssemblyService>) -> Router {
    Router::new()
        .route(
            "/api/v1/assemblies",
            get(list_assemblies).post(create_assembly),
        )
        .route(
            "/api/v1/assemblies/:id",
            get(get_assembly).put(update_assembly).delete(delete_assembly),
        )
        .route("/api/v1/assemblies/:id/cancel", post(cancel_assembly))
        .route("/api/v1/assemblies/:id/attendance", post(register_attendance))
        .route("/api/v1/assemblies/:id/quorum", get(quorum))
        .route("/api/v1/assemblies/:id/start", post(start_assembly))
        .route("/api/v1/assemblies/:id/end", post(end_assembly))
        .route("/api/v1/assemblies/:id/minutes", get(minutes))
        .route("/api/v1/assemblies/:id/votings", post(create_voting))
        .route(
            "/api/v1/assemblies/votings/:voting_id/start",
            post(start_voting),
        )
        .route("/api/v1/assemblies/votings/:voting_id/votes", post(cast_vote))
        .route(
            "/api/v1/assemblies/votings/:voting_id/results",
            get(voting_results),
        )
        .route(
            "/api/v1/assemblies/votings/:voting_id/close",
            post(close_voting),
        )
        .route(
            "/api/v1/assemblies/minutes/:minutes_id/signers",
            post(register_signers),
        )
        .route(
            "/api/v1/assemblies/minutes/:minutes_id/signatures",
            get(signatures),
        )
        .route(
            "/api/v1/assemblies/minutes/:minutes_id/finalize",
            post(finalize),
        )
        .route(
            "/api/v1/assemblies/signatures/:signature_id/sign",
            post(sign),
        )
        .with_state(service)
}

async fn create_assembly(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewAssembly>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_assembly(&schema, &actor, input),
    )
}

async fn list_assemblies(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(filter): Query<AssemblyFilter>,
) -> Response {
    reply(StatusCode::OK, service.list_assemblies(&schema, &filter))
}

async fn get_assembly(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_assembly(&schema, id))
}

async fn update_assembly(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<AssemblyUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_assembly(&schema, &actor, id, update),
    )
}

async fn delete_assembly(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.delete_assembly(&schema, &actor, id))
}

async fn cancel_assembly(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.cancel_assembly(&schema, &actor, id))
}

async fn register_attendance(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<NewAttendance>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.register_attendance(&schema, &actor, id, input),
    )
}

async fn quorum(State(service): Service, Tenant(schema): Tenant, Path(id): Path<u64>) -> Response {
    reply(StatusCode::OK, service.quorum_status(&schema, id))
}

async fn start_assembly(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.start_assembly(&schema, &actor, id))
}

async fn end_assembly(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.end_assembly(&schema, &actor, id))
}

async fn minutes(State(service): Service, Tenant(schema): Tenant, Path(id): Path<u64>) -> Response {
    reply(StatusCode::OK, service.minutes_for(&schema, id))
}

async fn create_voting(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(input): Json<NewVoting>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_voting(&schema, &actor, id, input),
    )
}

async fn start_voting(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(voting_id): Path<u64>,
) -> Response {
    reply(
        StatusCode::OK,
        service.start_voting(&schema, &actor, voting_id),
    )
}

async fn cast_vote(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(voting_id): Path<u64>,
    Json(input): Json<NewVote>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.cast_vote(&schema, &actor, voting_id, input),
    )
}

async fn voting_results(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(voting_id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.voting_results(&schema, voting_id))
}

async fn close_voting(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(voting_id): Path<u64>,
) -> Response {
    reply(
        StatusCode::OK,
        service.close_voting(&schema, &actor, voting_id),
    )
}

async fn register_signers(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(minutes_id): Path<u64>,
    Json(signers): Json<Vec<Signer>>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.register_required_signers(&schema, &actor, minutes_id, signers),
    )
}

async fn signatures(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(minutes_id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.signatures_for(&schema, minutes_id))
}

async fn finalize(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(minutes_id): Path<u64>,
) -> Response {
    reply(
        StatusCode::OK,
        service.retry_finalization(&schema, &actor, minutes_id),
    )
}

async fn sign(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(signature_id): Path<u64>,
    context: Option<Json<SignatureContext>>,
) -> Response {
    let context = context.map(|Json(context)| context).unwrap_or_default();
    reply(
        StatusCode::OK,
        service.sign_minutes(&schema, &actor, signature_id, context),
    )
}
