//! Reservation moderation, common-area pricing limits and marketplace image uploads.

mod common;

use armonia::marketplace::MAX_IMAGE_BYTES;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{admin, harness, id_of, resident, Harness, TENANT_A};

async fn gym(h: &Harness, hourly_rate: Value) -> (StatusCode, Value) {
    h.post(
        admin(TENANT_A),
        "/api/v1/inventory/common-areas",
        json!({
            "complex_id": 1,
            "name": "Gimnasio",
            "area_type": "GYM",
            "capacity": 12,
            "requires_approval": true,
            "hourly_rate": hourly_rate
        }),
    )
    .await
}

async fn book(h: &Harness, user_id: u64, area_id: u64, start: &str, end: &str) -> Value {
    let (status, body) = h
        .post(
            resident(TENANT_A, user_id),
            "/api/v1/reservations",
            json!({
                "common_area_id": area_id,
                "title": "Entrenamiento",
                "start_time": start,
                "end_time": end,
                "attendees": 4
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

#[tokio::test]
async fn rejection_needs_a_reason_and_a_pending_booking() {
    let h = harness();
    let (_, area) = gym(&h, json!(8000)).await;
    let area_id = id_of(&area);
    let booking = book(&h, 70, area_id, "2026-11-10T07:00:00Z", "2026-11-10T08:00:00Z").await;
    let uri = format!("/api/v1/reservations/{}/reject", id_of(&booking));

    let (status, body) = h.post(admin(TENANT_A), &uri, json!({ "reason": "   " })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");

    let (status, rejected) = h
        .post(admin(TENANT_A), &uri, json!({ "reason": "Mantenimiento de máquinas" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{rejected}");
    assert_eq!(rejected["status"], "REJECTED");
    assert_eq!(rejected["rejection_reason"], "Mantenimiento de máquinas");

    let (status, _) = h.post(admin(TENANT_A), &uri, json!({ "reason": "Otra vez" })).await;
    assert_eq!(status, StatusCode::CONFLICT, "only pending bookings are rejected");
}

#[tokio::test]
async fn cancellation_is_limited_to_owner_and_live_bookings() {
    let h = harness();
    let (_, area) = gym(&h, json!(8000)).await;
    let area_id = id_of(&area);
    let booking = book(&h, 71, area_id, "2026-11-11T07:00:00Z", "2026-11-11T08:00:00Z").await;
    let uri = format!("/api/v1/reservations/{}/cancel", id_of(&booking));

    let (status, _) = h
        .post(resident(TENANT_A, 72), &uri, json!({ "reason": "No la necesito" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN, "another resident's booking");

    let (status, cancelled) = h
        .post(resident(TENANT_A, 71), &uri, json!({ "reason": "Viaje" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{cancelled}");
    assert_eq!(cancelled["status"], "CANCELLED");
    assert_eq!(cancelled["cancellation_reason"], "Viaje");

    let (status, _) = h.post_empty(resident(TENANT_A, 71), &uri).await;
    assert_eq!(status, StatusCode::CONFLICT, "cancelled is terminal");

    let freed = book(&h, 72, area_id, "2026-11-11T07:30:00Z", "2026-11-11T08:30:00Z").await;
    assert_eq!(freed["status"], "PENDING", "a cancelled booking frees its slot");
}

#[tokio::test]
async fn rescheduling_onto_a_held_slot_is_a_conflict() {
    let h = harness();
    let (_, area) = gym(&h, json!(8000)).await;
    let area_id = id_of(&area);
    book(&h, 73, area_id, "2026-11-12T09:00:00Z", "2026-11-12T10:00:00Z").await;
    let later = book(&h, 74, area_id, "2026-11-12T11:00:00Z", "2026-11-12T12:00:00Z").await;
    let uri = format!("/api/v1/reservations/{}", id_of(&later));

    let (status, body) = h
        .put(
            resident(TENANT_A, 74),
            &uri,
            json!({ "start_time": "2026-11-12T09:30:00Z" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");

    let (status, moved) = h
        .put(
            resident(TENANT_A, 74),
            &uri,
            json!({ "start_time": "2026-11-12T10:00:00Z", "title": "Clase de yoga" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{moved}");
    assert_eq!(moved["title"], "Clase de yoga");
    assert_eq!(moved["status"], "PENDING");
}

#[tokio::test]
async fn hourly_rates_are_bounded() {
    let h = harness();
    let (status, body) = gym(&h, json!(u64::MAX / 2)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert!(body["error"]
        .as_str()
        .is_some_and(|error| error.starts_with("hourly_rate")));

    let (status, area) = gym(&h, json!(1_000_000_000u64)).await;
    assert_eq!(status, StatusCode::CREATED, "{area}");

    let (status, _) = h
        .put(
            admin(TENANT_A),
            &format!("/api/v1/inventory/common-areas/{}", id_of(&area)),
            json!({ "hourly_rate": 1_000_000_001u64 }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn image_upload_returns_a_content_addressed_url() {
    let h = harness();
    let uri = "/api/v1/marketplace/upload-image?file_name=sofa.PNG";

    let (status, uploaded) = h
        .post_bytes(resident(TENANT_A, 76), uri, b"\x89PNG fake pixels".to_vec())
        .await;
    assert_eq!(status, StatusCode::CREATED, "{uploaded}");
    assert_eq!(uploaded["content_type"], "image/png");
    assert_eq!(uploaded["size"], 16);
    let url = uploaded["url"].as_str().expect("url");
    let prefix = format!("/uploads/{TENANT_A}/marketplace/");
    let name = url.strip_prefix(&prefix).expect("tenant upload prefix");
    let (digest, extension) = name.split_once('.').expect("extension");
    assert_eq!(extension, "png");
    assert_eq!(digest.len(), 16);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));

    let (_, again) = h
        .post_bytes(resident(TENANT_A, 77), uri, b"\x89PNG fake pixels".to_vec())
        .await;
    assert_eq!(again["url"], uploaded["url"], "same bytes, same name");
}

#[tokio::test]
async fn image_upload_rejects_bad_files() {
    let h = harness();

    let (status, _) = h
        .post_bytes(
            resident(TENANT_A, 78),
            "/api/v1/marketplace/upload-image?file_name=empty.jpg",
            Vec::new(),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "empty body");

    let (status, _) = h
        .post_bytes(
            resident(TENANT_A, 78),
            "/api/v1/marketplace/upload-image?file_name=contrato.pdf",
            b"%PDF-1.7".to_vec(),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "not an image");

    let (status, _) = h
        .post_bytes(
            resident(TENANT_A, 78),
            "/api/v1/marketplace/upload-image?file_name=huge.jpg",
            vec![0u8; MAX_IMAGE_BYTES + 1],
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE, "body limit on the route");
}
