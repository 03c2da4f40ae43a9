mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{ADMIN_EMAIL, portal, portal_with};
use serde_json::json;

#[tokio::test]
async fn health_reports_ok() {
    let portal = portal("health").await;
    let (status, body) = portal.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn register_login_and_me() {
    let portal = portal("auth").await;

    let (status, body) = portal
        .send(
            "POST",
            "/api/auth",
            None,
            Some(json!({
                "email": "  Anna@Portal.test ",
                "password": "anna-secret",
                "name": "Anna",
                "role": "ADMIN"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "anna@portal.test");
    assert_eq!(body["role"], "USER");
    assert!(body.get("password").is_none());

    let (status, body) = portal
        .send(
            "POST",
            "/api/auth",
            None,
            Some(json!({"email": "anna@portal.test", "password": "x", "name": "Anna"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "BAD_REQUEST");

    let (status, body) = portal
        .send(
            "PUT",
            "/api/auth",
            None,
            Some(json!({"email": "anna@portal.test", "password": "wrong-one"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["message"], "Invalid credentials");

    let (token, user) = portal.login("ANNA@portal.test", "anna-secret").await;
    assert_eq!(user["name"], "Anna");

    let (status, me) = portal.send("GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);

    let (status, _) = portal.send("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = portal
        .send("GET", "/api/auth/me", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, found) = portal
        .send("GET", "/api/auth?email=anna%40portal.test", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], user["id"]);
}

#[tokio::test]
async fn user_management_is_admin_only() {
    let portal = portal("users").await;
    let (_, resident_token) = portal.resident("Bram").await;
    let admin = portal.admin_token().await;

    let new_user = json!({
        "email": "coach@portal.test",
        "password": "coach-pass",
        "name": "Coach Carla",
        "role": "COACH"
    });
    let (status, _) = portal
        .send("POST", "/api/users", None, Some(new_user.clone()))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, body) = portal
        .send("POST", "/api/users", Some(&resident_token), Some(new_user.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "FORBIDDEN");

    let (status, coach) = portal
        .send("POST", "/api/users", Some(&admin), Some(new_user))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(coach["role"], "COACH");

    let (status, _) = portal
        .send(
            "POST",
            "/api/users",
            Some(&admin),
            Some(json!({"email": "not-an-email", "password": "long-enough", "name": "X"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = portal
        .send(
            "POST",
            "/api/users",
            Some(&admin),
            Some(json!({"email": "x@portal.test", "password": "short", "name": "X"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, page) = portal
        .send("GET", "/api/users?limit=2&page=2&sortBy=name&sortOrder=asc", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["pagination"]["total"], 3);
    assert_eq!(page["pagination"]["totalPages"], 2);
    assert_eq!(page["users"].as_array().unwrap().len(), 1);
    assert_eq!(page["users"][0]["name"], "Coach Carla");

    let (_, coaches) = portal
        .send("GET", "/api/users?role=COACH", None, None)
        .await;
    assert_eq!(coaches["users"].as_array().unwrap().len(), 1);

    let coach_id = coach["id"].as_str().unwrap();
    let (status, updated) = portal
        .send(
            "PUT",
            &format!("/api/users?id={coach_id}"),
            Some(&admin),
            Some(json!({"name": "Carla"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["name"], "Carla");
    assert_eq!(updated["email"], "coach@portal.test");

    let (status, _) = portal
        .send(
            "PUT",
            &format!("/api/users?id={coach_id}"),
            Some(&admin),
            Some(json!({"email": ADMIN_EMAIL})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, deleted) = portal
        .send("DELETE", &format!("/api/users?id={coach_id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted, json!({"success": true, "id": coach_id}));

    let (status, _) = portal
        .send("GET", &format!("/api/users?id={coach_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn appointments_respect_availability() {
    let portal = portal("appointments").await;
    let (host_id, _) = portal.resident("Hanna").await;
    let (guest_id, _) = portal.resident("Gijs").await;

    let (status, _) = portal
        .send(
            "POST",
            "/api/availability",
            None,
            Some(json!({
                "userId": host_id,
                "userName": "Hanna",
                "role": "COACH",
                "weeklySchedule": [
                    {"day": "MONDAY", "slots": [{"startTime": "09:00", "endTime": "12:00"}]}
                ],
                "exceptions": [{"date": "2025-06-09", "available": false, "reason": "Holiday"}]
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let booking = |start: &str, end: &str, host: &str| {
        json!({
            "title": "Intake",
            "startTime": start,
            "endTime": end,
            "type": "MEETING",
            "hostId": host,
            "attendeeIds": [guest_id.clone()]
        })
    };

    // 2025-06-02 is a Monday.
    let (status, first) = portal
        .send(
            "POST",
            "/api/appointments",
            None,
            Some(booking("2025-06-02T09:00:00Z", "2025-06-02T10:00:00Z", &host_id)),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{first}");
    assert_eq!(first["status"], "PENDING");

    let (status, body) = portal
        .send(
            "POST",
            "/api/appointments",
            None,
            Some(booking("2025-06-02T09:30:00Z", "2025-06-02T10:30:00Z", &host_id)),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Time slot is not available")
    );

    // Back to back with the first booking is fine.
    let (status, _) = portal
        .send(
            "POST",
            "/api/appointments",
            None,
            Some(booking("2025-06-02T10:00:00Z", "2025-06-02T11:00:00Z", &host_id)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    for (start, end) in [
        ("2025-06-02T11:30:00Z", "2025-06-02T12:30:00Z"),
        ("2025-06-03T09:00:00Z", "2025-06-03T10:00:00Z"),
        ("2025-06-09T09:00:00Z", "2025-06-09T10:00:00Z"),
    ] {
        let (status, _) = portal
            .send(
                "POST",
                "/api/appointments",
                None,
                Some(booking(start, end, &host_id)),
            )
            .await;
        assert_eq!(status, StatusCode::CONFLICT, "{start}");
    }

    let (status, _) = portal
        .send(
            "POST",
            "/api/appointments",
            None,
            Some(booking("2025-06-02T10:00:00Z", "2025-06-02T09:00:00Z", &host_id)),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = portal
        .send(
            "POST",
            "/api/appointments",
            None,
            Some(booking("2025-06-02T09:00:00Z", "2025-06-02T10:00:00Z", "nobody")),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, rejected) = portal
        .send(
            "PATCH",
            "/api/appointments",
            None,
            Some(json!({"id": first["id"], "status": "REJECTED", "rejectionReason": "Sick"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rejected["rejectionReason"], "Sick");

    let (status, _) = portal
        .send(
            "POST",
            "/api/appointments",
            None,
            Some(booking("2025-06-02T09:00:00Z", "2025-06-02T10:00:00Z", &host_id)),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, listed) = portal
        .send(
            "GET",
            &format!("/api/appointments?hostId={host_id}&startDate=2025-06-02&endDate=2025-06-02"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let starts: Vec<_> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["startTime"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(starts.len(), 3);
    assert!(starts.windows(2).all(|w| w[0] <= w[1]));

    let (status, views) = portal
        .send("GET", "/api/availability?date=2025-06-09", None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(views[0]["unavailableReason"], "Holiday");
    assert_eq!(views[0]["availableSlots"], json!([]));
}

#[tokio::test]
async fn only_owner_or_admin_deletes_posts() {
    let portal = portal("ownership").await;
    let (owner_id, owner_token) = portal.resident("Olga").await;
    let (other_id, other_token) = portal.resident("Otto").await;

    let post = |title: &str| {
        json!({
            "title": title,
            "content": "Bring your own cup",
            "userId": owner_id,
            "userName": "Olga"
        })
    };
    let mut ids = Vec::new();
    for title in ["Coffee morning", "Garden day", "Book swap"] {
        let (status, created) = portal
            .send("POST", "/api/bulletin", None, Some(post(title)))
            .await;
        assert_eq!(status, StatusCode::OK);
        ids.push(created["id"].as_str().unwrap().to_string());
    }

    let (status, _) = portal
        .send("DELETE", &format!("/api/bulletin?id={}", ids[0]), None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = portal
        .send(
            "DELETE",
            &format!("/api/bulletin?id={}&userId={other_id}", ids[0]),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = portal
        .send(
            "DELETE",
            &format!("/api/bulletin?id={}", ids[0]),
            Some(&other_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = portal
        .send(
            "DELETE",
            &format!("/api/bulletin?id={}", ids[0]),
            Some(&owner_token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"success": true}));

    let admin = portal.admin_token().await;
    let (status, _) = portal
        .send(
            "DELETE",
            &format!("/api/bulletin?id={}", ids[1]),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = portal
        .send(
            "DELETE",
            &format!("/api/bulletin?id={}&userId={owner_id}", ids[0]),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, remaining) = portal.send("GET", "/api/bulletin", None, None).await;
    assert_eq!(remaining.as_array().unwrap().len(), 1);
    assert_eq!(remaining[0]["title"], "Book swap");
}

#[tokio::test]
async fn messages_threads_and_read_state() {
    let portal = portal("messages").await;
    let (anna, _) = portal.resident("Anna").await;
    let (bram, _) = portal.resident("Bram").await;

    let send = |from: &str, to: Option<&str>, content: &str| {
        json!({"senderId": from, "recipientId": to, "content": content})
    };
    for body in [
        send(&anna, Some(bram.as_str()), "Hoi Bram"),
        send(&bram, Some(anna.as_str()), "Hoi Anna"),
        send(&anna, Some(bram.as_str()), "Koffie?"),
        send(&anna, None, "Hello everyone"),
    ] {
        let (status, created) = portal.send("POST", "/api/messages", None, Some(body)).await;
        assert_eq!(status, StatusCode::OK, "{created}");
    }

    let (status, guest) = portal
        .send(
            "POST",
            "/api/messages",
            None,
            Some(json!({"senderId": "temp-42", "content": "Is the office open?", "recipientId": anna})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(guest["senderName"], "Guest");

    let (status, _) = portal
        .send("POST", "/api/messages", None, Some(send("ghost", None, "boo")))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, thread) = portal
        .send(
            "GET",
            &format!("/api/messages?userId={anna}&recipientId={bram}"),
            None,
            None,
        )
        .await;
    let contents: Vec<_> = thread
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, ["Hoi Bram", "Hoi Anna", "Koffie?"]);

    let (_, group) = portal.send("GET", "/api/messages?type=group", None, None).await;
    assert_eq!(group.as_array().unwrap().len(), 1);
    assert_eq!(group[0]["type"], "group");

    let (status, marked) = portal
        .send(
            "PUT",
            "/api/messages",
            None,
            Some(json!({"userId": bram, "senderId": anna})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(marked, json!({"success": true, "updatedCount": 2}));

    let (_, marked_again) = portal
        .send(
            "PUT",
            "/api/messages",
            None,
            Some(json!({"userId": bram, "senderId": anna})),
        )
        .await;
    assert_eq!(marked_again["updatedCount"], 0);
}

#[tokio::test]
async fn expired_notices_are_hidden() {
    let portal = portal("notices").await;
    for (title, expires) in [("Old", "2001-01-01"), ("Current", "2999-12-31")] {
        let (status, created) = portal
            .send(
                "POST",
                "/api/notices",
                None,
                Some(json!({"title": title, "content": "...", "expiresAt": expires})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{created}");
        assert_eq!(created["userName"], "Anonymous");
    }

    let (_, notices) = portal.send("GET", "/api/notices", None, None).await;
    let notices = notices.as_array().unwrap();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0]["title"], "Current");
    assert_eq!(notices[0]["expiresAt"], "2999-12-31T23:59:59Z");
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let portal = portal_with("limit", |cfg| cfg.body_limit_bytes = 256).await;
    let (status, body) = portal
        .send(
            "POST",
            "/api/notices",
            None,
            Some(json!({"title": "Long", "content": "x".repeat(4096)})),
        )
        .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn malformed_json_is_a_bad_request() {
    let portal = portal("malformed").await;
    let req = Request::builder()
        .method("POST")
        .uri("/api/reports")
        .header("content-type", "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let (status, body) = portal.raw(req).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Invalid request body")
    );
}

#[tokio::test]
async fn data_survives_a_restart() {
    let first = portal("restart").await;
    let (status, report) = first
        .send(
            "POST",
            "/api/reports",
            None,
            Some(json!({
                "title": "Leaking tap",
                "description": "Kitchen tap drips",
                "category": "MAINTENANCE",
                "reporterId": "u1",
                "reporterName": "Jan"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{report}");

    let raw = std::fs::read_to_string(first.dir.path().join("reports.json")).unwrap();
    let on_disk: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(on_disk[0]["id"], report["id"]);
    assert_eq!(on_disk[0]["status"], "NEW");
}
