//! Member directory, role notifications, provider reviews, direct messages, the event
//! calendar and invoice rules, exercised through the HTTP router.

mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{admin, harness, id_of, resident, staff, Harness, TENANT_A, TENANT_B};

async fn enrol(h: &Harness, user_id: u64, name: &str, role: &str) {
    let (status, body) = h
        .post(
            admin(TENANT_A),
            "/api/v1/members",
            json!({ "user_id": user_id, "name": name, "role": role }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

fn titles(body: &Value) -> Vec<String> {
    body.as_array()
        .expect("array body")
        .iter()
        .map(|item| item["title"].as_str().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn members_are_unique_and_private() {
    let h = harness();
    enrol(&h, 10, "Lucía Gómez", "RESIDENT").await;

    let (status, _) = h
        .post(
            admin(TENANT_A),
            "/api/v1/members",
            json!({ "user_id": 10, "name": "Otra Lucía", "role": "RESIDENT" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = h
        .post(
            resident(TENANT_A, 10),
            "/api/v1/members",
            json!({ "user_id": 11, "name": "Intruso", "role": "ADMIN" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = h.get(admin(TENANT_B), "/api/v1/members").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]), "other tenants see their own directory");
}

#[tokio::test]
async fn role_notifications_require_confirmation_once() {
    let h = harness();
    enrol(&h, 10, "Lucía Gómez", "RESIDENT").await;
    enrol(&h, 11, "Mario Ruiz", "RESIDENT").await;
    enrol(&h, 20, "Portería", "STAFF").await;

    let (status, body) = h
        .post(
            admin(TENANT_A),
            "/api/v1/notifications/by-role",
            json!({
                "role": "RESIDENT",
                "title": "Corte de agua",
                "message": "Mañana de 8:00 a 12:00",
                "require_confirmation": true
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body.as_array().map(Vec::len), Some(2));

    let (_, staff_inbox) = h.get(staff(TENANT_A, 20), "/api/v1/notifications").await;
    assert!(titles(&staff_inbox).is_empty());

    let (_, inbox) = h.get(resident(TENANT_A, 10), "/api/v1/notifications").await;
    assert_eq!(titles(&inbox), vec!["Corte de agua"]);
    let notification_id = id_of(&inbox[0]);

    let uri = format!("/api/v1/notifications/{notification_id}/confirm");
    let (status, _) = h.post_empty(resident(TENANT_A, 11), &uri).await;
    assert_eq!(status, StatusCode::FORBIDDEN, "only the recipient confirms");

    let (status, first) = h.post_empty(resident(TENANT_A, 10), &uri).await;
    assert_eq!(status, StatusCode::CREATED, "{first}");
    let (_, second) = h.post_empty(resident(TENANT_A, 10), &uri).await;
    assert_eq!(first["id"], second["id"]);

    let (_, unread) = h
        .get(resident(TENANT_A, 10), "/api/v1/notifications?unread=true")
        .await;
    assert!(titles(&unread).is_empty(), "confirming also marks it read");

    let (status, confirmations) = h
        .get(
            admin(TENANT_A),
            &format!("/api/v1/notifications/{notification_id}/confirmations"),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmations.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn provider_reviews_update_the_rating() {
    let h = harness();
    enrol(&h, 10, "Lucía Gómez", "RESIDENT").await;
    let (status, provider) = h
        .post(
            admin(TENANT_A),
            "/api/v1/service-providers",
            json!({
                "name": "Tubos Ya",
                "category": "PLUMBING",
                "description": "Plomería 24 horas",
                "contact_phone": "3105550000",
                "contact_email": "tubos@example.com",
                "address": "Calle 10 # 4-20"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{provider}");
    let reviews_uri = format!("/api/v1/service-providers/{}/reviews", id_of(&provider));

    let (status, review) = h
        .post(
            resident(TENANT_A, 10),
            &reviews_uri,
            json!({ "rating": 4, "comment": "Llegó a tiempo" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{review}");
    assert_eq!(review["user_name"], "Lucía Gómez");
    let (status, _) = h
        .post(resident(TENANT_A, 10), &reviews_uri, json!({ "rating": 1 }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = h
        .post(resident(TENANT_A, 11), &reviews_uri, json!({ "rating": 0 }))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    h.post(resident(TENANT_A, 11), &reviews_uri, json!({ "rating": 5 }))
        .await;

    let (_, listed) = h
        .get(
            resident(TENANT_A, 10),
            "/api/v1/service-providers?category=PLUMBING&min_rating=4",
        )
        .await;
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["providers"][0]["review_count"], 2);
    assert_eq!(listed["providers"][0]["rating"], 4.5);
}

#[tokio::test]
async fn direct_messages_reach_the_other_participant() {
    let h = harness();
    enrol(&h, 10, "Lucía Gómez", "RESIDENT").await;

    let (status, conversation) = h
        .post(
            resident(TENANT_A, 10),
            "/api/v1/messages/conversations",
            json!({ "user_id": 11 }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{conversation}");
    let messages_uri = format!(
        "/api/v1/messages/conversations/{}/messages",
        id_of(&conversation)
    );

    let (status, message) = h
        .post(
            resident(TENANT_A, 10),
            &messages_uri,
            json!({ "content": "¿Me prestas la escalera?" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{message}");
    assert_eq!(h.publisher.of_type("NEW_MESSAGE").len(), 1);

    let (status, _) = h.get(resident(TENANT_A, 12), &messages_uri).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, inbox) = h.get(resident(TENANT_A, 11), "/api/v1/notifications").await;
    assert_eq!(titles(&inbox), vec!["Nuevo mensaje"]);
    assert_eq!(
        inbox[0]["message"],
        "Lucía Gómez: ¿Me prestas la escalera?"
    );

    let (_, thread) = h.get(resident(TENANT_A, 11), &messages_uri).await;
    assert_eq!(thread[0]["status"], "DELIVERED");
    let (status, _) = h
        .post_empty(
            resident(TENANT_A, 11),
            &format!("/api/v1/messages/{}/read", id_of(&message)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, thread) = h.get(resident(TENANT_A, 10), &messages_uri).await;
    assert_eq!(thread[0]["status"], "READ");
}

#[tokio::test]
async fn event_attendance_stops_at_capacity() {
    let h = harness();
    enrol(&h, 10, "Lucía Gómez", "RESIDENT").await;
    enrol(&h, 11, "Mario Ruiz", "RESIDENT").await;

    let (status, event) = h
        .post(
            admin(TENANT_A),
            "/api/v1/events",
            json!({
                "title": "Taller de compostaje",
                "location": "Terraza",
                "start_time": "2031-03-14T14:00:00Z",
                "end_time": "2031-03-14T16:00:00Z",
                "event_type": "SOCIAL",
                "max_attendees": 1
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{event}");
    assert_eq!(h.publisher.of_type("COMMUNITY_EVENT").len(), 1);
    let (_, inbox) = h.get(resident(TENANT_A, 11), "/api/v1/notifications").await;
    assert_eq!(titles(&inbox), vec!["Nuevo evento"]);

    let attendance = format!("/api/v1/events/{}/attendance", id_of(&event));
    let (status, body) = h
        .post(
            resident(TENANT_A, 10),
            &attendance,
            json!({ "status": "CONFIRMED" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let (status, _) = h
        .post(
            resident(TENANT_A, 11),
            &attendance,
            json!({ "status": "CONFIRMED" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = h
        .post(
            resident(TENANT_A, 11),
            &attendance,
            json!({ "status": "TENTATIVE" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "tentative answers skip the cap");

    let (_, listed) = h
        .get(resident(TENANT_A, 10), "/api/v1/events?upcoming=true")
        .await;
    assert_eq!(listed[0]["confirmed_attendees"], 1);
    assert_eq!(listed[0]["user_attendance"]["status"], "CONFIRMED");
}

#[tokio::test]
async fn invoice_rules_evaluate_and_apply_by_priority() {
    let h = harness();
    let base = "/api/v1/finances/invoice-rules";
    let (status, rule) = h
        .post(
            admin(TENANT_A),
            base,
            json!({
                "name": "Cuota por área",
                "category": "admin_fee",
                "formula": "round(area * rate, 0)",
                "parameters": { "rate": 2150.5 },
                "priority": 10
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{rule}");
    assert_eq!(rule["category"], "ADMIN_FEE");
    h.post(
        admin(TENANT_A),
        base,
        json!({
            "name": "Mínimo",
            "category": "ADMIN_FEE",
            "formula": "max(area * rate, minimum)",
            "parameters": { "rate": 2150.5, "minimum": 120000 },
            "priority": 20
        }),
    )
    .await;

    let (status, _) = h
        .post(
            admin(TENANT_A),
            base,
            json!({ "name": "Rota", "formula": "area * * rate" }),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = h.get(resident(TENANT_A, 10), base).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, evaluation) = h
        .post(
            admin(TENANT_A),
            &format!("{base}/{}/evaluate", id_of(&rule)),
            json!({ "data": { "area": 40 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{evaluation}");
    assert_eq!(evaluation["success"], true);
    assert_eq!(evaluation["result"], 86020.0);

    let (status, applied) = h
        .post(
            admin(TENANT_A),
            &format!("{base}/apply"),
            json!({ "category": "admin_fee", "data": { "area": 40 } }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{applied}");
    assert_eq!(applied["results"].as_array().map(Vec::len), Some(2));
    assert_eq!(applied["final_result"], 120000.0);

    let (_, toggled) = h
        .post(
            admin(TENANT_A),
            &format!("{base}/{}/toggle", id_of(&rule)),
            json!({}),
        )
        .await;
    assert_eq!(toggled["active"], false);
    let (_, applied) = h
        .post(
            admin(TENANT_A),
            &format!("{base}/apply"),
            json!({ "category": "ADMIN_FEE", "data": { "area": 40 } }),
        )
        .await;
    assert_eq!(applied["results"].as_array().map(Vec::len), Some(1));
}
