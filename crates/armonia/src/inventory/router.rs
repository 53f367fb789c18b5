use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use super::domain::{
    CommonAreaUpdate, NewCommonArea, NewParkingSpot, NewPet, NewProperty, NewResident, NewVehicle,
    ParkingSpotUpdate, PropertyUpdate, ResidentUpdate,
};
use super::service::InventoryService;
use crate::error::reply;
use crate::tenancy::{Actor, Tenant};

#[derive(Debug, Deserialize)]
pub struct InventoryQuery {
    pub complex_id: u64,
    pub property_id: Option<u64>,
    #[serde(default)]
    pub active_only: bool,
}

type Service = State<Arc<InventoryService>>;

/// Router builder for `/api/v1/inventory`.
pub fn inventory_router(service: Arc<InventoryService>) -> Router {
    Router::new()
        .route(
            "/api/v1/inventory/properties",
            get(list_properties).post(create_property),
        )
        .route("/api/v1/inventory/properties/export", get(export_properties))
        .route("/api/v1/inventory/properties/import", post(import_properties))
        .route(
            "/api/v1/inventory/properties/:id",
            get(get_property).put(update_property),
        )
        .route(
            "/api/v1/inventory/residents",
            get(list_residents).post(create_resident),
        )
        .route(
            "/api/v1/inventory/residents/:id",
            axum::routing::put(update_resident).delete(delete_resident),
        )
        .route("/api/v1/inventory/pets", get(list_pets).post(create_pet))
        .route(
            "/api/v1/inventory/vehicles",
            get(list_vehicles).post(create_vehicle),
        )
        .route(
            "/api/v1/inventory/common-areas",
            get(list_common_areas).post(create_common_area),
        )
        .route(
            "/api/v1/inventory/common-areas/:id",
            get(get_common_area)
                .put(update_common_area)
                .delete(delete_common_area),
        )
        .route(
            "/api/v1/inventory/parking-spots",
            get(list_parking_spots).post(create_parking_spot),
        )
        .route(
            "/api/v1/inventory/parking-spots/:id",
            get(get_parking_spot)
                .put(update_parking_spot)
                .delete(delete_parking_spot),
        )
        .route("/api/v1/inventory/stats", get(stats))
        .with_state(service)
}

async fn list_properties(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    reply(
        StatusCode::OK,
        service.list_properties(&schema, query.complex_id),
    )
}

async fn create_property(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewProperty>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_property(&schema, &actor, input),
    )
}

async fn get_property(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_property(&schema, id))
}

async fn update_property(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<PropertyUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_property(&schema, &actor, id, update),
    )
}

async fn export_properties(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    match service.export_properties_csv(&schema, query.complex_id) {
        Ok(body) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                (
                    header::CONTENT_DISPOSITION,
                    "attachment; filename=\"properties.csv\"",
                ),
            ],
            body,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn import_properties(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Query(query): Query<InventoryQuery>,
    body: String,
) -> Response {
    reply(
        StatusCode::OK,
        service.import_properties_csv(&schema, &actor, query.complex_id, body.as_bytes()),
    )
}

async fn list_residents(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    reply(
        StatusCode::OK,
        service.list_residents(&schema, query.complex_id, query.property_id),
    )
}

async fn create_resident(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewResident>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_resident(&schema, &actor, input),
    )
}

async fn update_resident(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<ResidentUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_resident(&schema, &actor, id, update),
    )
}

async fn delete_resident(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.delete_resident(&schema, &actor, id))
}

async fn list_pets(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    reply(
        StatusCode::OK,
        service.list_pets(&schema, query.complex_id, query.property_id),
    )
}

async fn create_pet(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewPet>,
) -> Response {
    reply(StatusCode::CREATED, service.create_pet(&schema, &actor, input))
}

async fn list_vehicles(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    reply(
        StatusCode::OK,
        service.list_vehicles(&schema, query.complex_id, query.property_id),
    )
}

async fn create_vehicle(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewVehicle>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_vehicle(&schema, &actor, input),
    )
}

async fn list_common_areas(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    reply(
        StatusCode::OK,
        service.list_common_areas(&schema, query.complex_id, query.active_only),
    )
}

async fn create_common_area(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewCommonArea>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_common_area(&schema, &actor, input),
    )
}

async fn get_common_area(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_common_area(&schema, id))
}

async fn update_common_area(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<CommonAreaUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_common_area(&schema, &actor, id, update),
    )
}

async fn delete_common_area(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(
        StatusCode::OK,
        service.delete_common_area(&schema, &actor, id),
    )
}

async fn list_parking_spots(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    reply(
        StatusCode::OK,
        service.list_parking_spots(&schema, query.complex_id),
    )
}

async fn create_parking_spot(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Json(input): Json<NewParkingSpot>,
) -> Response {
    reply(
        StatusCode::CREATED,
        service.create_parking_spot(&schema, &actor, input),
    )
}

async fn get_parking_spot(
    State(service): Service,
    Tenant(schema): Tenant,
    Path(id): Path<u64>,
) -> Response {
    reply(StatusCode::OK, service.get_parking_spot(&schema, id))
}

async fn update_parking_spot(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
    Json(update): Json<ParkingSpotUpdate>,
) -> Response {
    reply(
        StatusCode::OK,
        service.update_parking_spot(&schema, &actor, id, update),
    )
}

async fn delete_parking_spot(
    State(service): Service,
    Tenant(schema): Tenant,
    actor: Actor,
    Path(id): Path<u64>,
) -> Response {
    reply(
        StatusCode::OK,
        service.delete_parking_spot(&schema, &actor, id),
    )
}

async fn stats(
    State(service): Service,
    Tenant(schema): Tenant,
    Query(query): Query<InventoryQuery>,
) -> Response {
    reply(
        StatusCode::OK,
        service.inventory_stats(&schema, query.complex_id),
    )
}
