//! Payments, common-area bookings, the marketplace and the unit inventory over HTTP.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{admin, harness, id_of, resident, Harness, TENANT_A};

async fn wompi_gateway(h: &Harness) -> Value {
    let (status, gateway) = h
        .post(
            admin(TENANT_A),
            "/api/v1/payment-gateways",
            json!({
                "gateway_type": "WOMPI",
                "name": "Wompi principal",
                "api_key": "pub_test_9f8e7d6c5b4a",
                "secret_key": "prv_test_1234abcd5678",
                "supported_currencies": ["cop", "COP"],
                "supported_methods": ["card", "pse"],
                "min_amount": 1000,
                "max_amount": 5000000,
                "commission_rate": 2.9,
                "fixed_commission": 900
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{gateway}");
    gateway
}

#[tokio::test]
async fn payment_is_charged_and_partially_refunded() {
    let h = harness();
    let gateway = wompi_gateway(&h).await;
    assert_eq!(gateway["secret_key"], "****5678");
    assert_eq!(gateway["supported_currencies"], json!(["COP"]));
    let gateway_id = id_of(&gateway);

    let (status, _) = h
        .post(
            admin(TENANT_A),
            "/api/v1/payment-gateways",
            json!({
                "gateway_type": "STRIPE",
                "name": "Wompi principal",
                "api_key": "pk",
                "secret_key": "sk",
                "supported_currencies": ["USD"],
                "supported_methods": ["CARD"]
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "gateway names are unique");

    let (_, active) = h
        .get(resident(TENANT_A, 60), "/api/v1/payment-gateways/active")
        .await;
    assert_eq!(active.as_array().map(Vec::len), Some(1));

    let (status, _) = h
        .post(
            resident(TENANT_A, 60),
            "/api/v1/payment-gateways/process",
            json!({
                "gateway_id": gateway_id,
                "amount": 150000,
                "currency": "USD",
                "method": "CARD"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "unsupported currency");

    let (status, outcome) = h
        .post(
            resident(TENANT_A, 60),
            "/api/v1/payment-gateways/process",
            json!({
                "gateway_id": gateway_id,
                "amount": 100000,
                "currency": "cop",
                "method": "card",
                "description": "Cuota de administración octubre"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{outcome}");
    assert_eq!(outcome["payment"]["status"], "COMPLETED");
    assert_eq!(outcome["transaction"]["processing_fee"], 3800);
    assert_eq!(outcome["transaction"]["net_amount"], 96200);
    let payment_id = outcome["payment"]["id"].as_u64().expect("payment id");

    let (status, _) = h
        .get(
            resident(TENANT_A, 61),
            &format!("/api/v1/payment-gateways/payments/{payment_id}"),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND, "payments are private to the payer");

    let (status, _) = h
        .post(
            resident(TENANT_A, 60),
            "/api/v1/payment-gateways/refunds",
            json!({ "payment_id": payment_id, "amount": 1000 }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, partial) = h
        .post(
            admin(TENANT_A),
            "/api/v1/payment-gateways/refunds",
            json!({ "payment_id": payment_id, "amount": 40000, "reason": "Cobro duplicado" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{partial}");
    assert_eq!(partial["payment"]["status"], "COMPLETED");
    assert_eq!(partial["payment"]["refunded_amount"], 40000);

    let (status, _) = h
        .post(
            admin(TENANT_A),
            "/api/v1/payment-gateways/refunds",
            json!({ "payment_id": payment_id, "amount": 70000 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "above the remaining balance");

    let (status, full) = h
        .post(
            admin(TENANT_A),
            "/api/v1/payment-gateways/refunds",
            json!({ "payment_id": payment_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(full["payment"]["status"], "REFUNDED");
    assert_eq!(full["transaction"]["amount"], 60000);

    let (_, ledger) = h
        .get(
            resident(TENANT_A, 60),
            &format!("/api/v1/payment-gateways/payments/{payment_id}/transactions"),
        )
        .await;
    assert_eq!(ledger.as_array().map(Vec::len), Some(3));

    let (status, _) = h
        .delete(admin(TENANT_A), &format!("/api/v1/payment-gateways/{gateway_id}"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "gateway has payments");
}

async fn salon(h: &Harness, requires_approval: bool) -> u64 {
    let (status, area) = h
        .post(
            admin(TENANT_A),
            "/api/v1/inventory/common-areas",
            json!({
                "complex_id": 1,
                "name": "Salón social",
                "area_type": "SALON",
                "capacity": 40,
                "requires_approval": requires_approval,
                "hourly_rate": 25000
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{area}");
    id_of(&area)
}

fn booking(area_id: u64, start: &str, end: &str) -> Value {
    json!({
        "common_area_id": area_id,
        "title": "Cumpleaños",
        "start_time": start,
        "end_time": end,
        "attendees": 25
    })
}

#[tokio::test]
async fn bookings_reject_overlaps_and_price_the_slot() {
    let h = harness();
    let area_id = salon(&h, true).await;

    let (status, first) = h
        .post(
            resident(TENANT_A, 64),
            "/api/v1/reservations",
            booking(area_id, "2026-11-07T18:00:00Z", "2026-11-07T22:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    assert_eq!(first["status"], "PENDING");
    assert_eq!(first["payment_amount"], 100000);
    let first_id = id_of(&first);

    let (status, _) = h
        .post(
            resident(TENANT_A, 65),
            "/api/v1/reservations",
            booking(area_id, "2026-11-07T21:00:00Z", "2026-11-07T23:00:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = h
        .post(
            resident(TENANT_A, 65),
            "/api/v1/reservations",
            booking(area_id, "2026-11-07T22:00:00Z", "2026-11-07T23:30:00Z"),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "back-to-back slots do not overlap");

    let (status, _) = h
        .post(
            resident(TENANT_A, 66),
            "/api/v1/reservations",
            json!({
                "common_area_id": area_id,
                "title": "Reunión",
                "start_time": "2026-11-08T10:00:00Z",
                "end_time": "2026-11-08T09:00:00Z"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, approved) = h
        .post_empty(
            admin(TENANT_A),
            &format!("/api/v1/reservations/{first_id}/approve"),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{approved}");
    assert_eq!(approved["status"], "APPROVED");

    let (_, inbox) = h.get(resident(TENANT_A, 64), "/api/v1/notifications").await;
    assert_eq!(inbox.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn marketplace_listing_is_reported_and_moderated() {
    let h = harness();
    let (status, listing) = h
        .post(
            resident(TENANT_A, 67),
            "/api/v1/marketplace/listings",
            json!({
                "title": "Bicicleta de ruta",
                "description": "Talla M, poco uso",
                "price": 1200000,
                "category": "OTHER"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{listing}");
    let listing_id = id_of(&listing);

    let (status, message) = h
        .post(
            resident(TENANT_A, 68),
            "/api/v1/marketplace/messages",
            json!({ "listing_id": listing_id, "receiver_id": 67, "content": "¿Aún disponible?" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{message}");
    let pushed = h.publisher.of_type("MARKET_MESSAGE");
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].channel, "user-67");

    let report = json!({ "listing_id": listing_id, "reason": "Precio engañoso" });
    let (status, _) = h
        .post(resident(TENANT_A, 68), "/api/v1/marketplace/listings/report", report.clone())
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = h
        .post(resident(TENANT_A, 68), "/api/v1/marketplace/listings/report", report)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, page) = h.get(resident(TENANT_A, 69), "/api/v1/marketplace/listings").await;
    assert_eq!(page["total"], 0, "reported listings leave the catalogue");

    let (status, _) = h
        .get(resident(TENANT_A, 69), "/api/v1/marketplace/moderation/reports")
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (_, reports) = h
        .get(admin(TENANT_A), "/api/v1/marketplace/moderation/reports")
        .await;
    let report_id = id_of(&reports[0]);

    let (status, resolved) = h
        .post(
            admin(TENANT_A),
            &format!("/api/v1/marketplace/moderation/reports/{report_id}/resolve"),
            json!({ "action": "DISMISS", "notes": "Precio acorde al mercado" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{resolved}");
    assert_eq!(resolved["listing"]["status"], "ACTIVE");

    let (_, page) = h.get(resident(TENANT_A, 69), "/api/v1/marketplace/listings").await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn inventory_tracks_units_and_residents() {
    let h = harness();
    let (status, property) = h
        .post(
            admin(TENANT_A),
            "/api/v1/inventory/properties",
            json!({
                "complex_id": 1,
                "unit_number": "502",
                "property_type": "APARTMENT",
                "block": "Torre 2",
                "coefficient": 1.25
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{property}");
    let property_id = id_of(&property);

    let (status, _) = h
        .post(
            admin(TENANT_A),
            "/api/v1/inventory/properties",
            json!({
                "complex_id": 1,
                "unit_number": "502",
                "property_type": "APARTMENT"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "unit numbers are unique per complex");

    let (status, _) = h
        .post(
            admin(TENANT_A),
            "/api/v1/inventory/residents",
            json!({
                "property_id": property_id,
                "name": "María Fernanda Ortiz",
                "is_owner": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, stats) = h
        .get(admin(TENANT_A), "/api/v1/inventory/stats?complex_id=1")
        .await;
    assert_eq!(status, StatusCode::OK, "{stats}");
    assert_eq!(stats["total_properties"], 1);
    assert_eq!(stats["active_residents"], 1);
}
