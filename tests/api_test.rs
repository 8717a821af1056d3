//! HTTP tests for the admin review surface

mod common;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;

use audit_trail::audit::{Actor, AuditAction, ChangeSet, RoleChange, Target};
use audit_trail::authorization::AdminPrincipal;
use common::*;

#[tokio::test]
async fn test_health_and_status() {
    let state = test_state(setup_test_db().await);
    let app = test_app(&state);

    let (status, body) = get(&app, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = get(&app, "/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["writer"]["pendingRedelivery"], 0);
}

#[tokio::test]
async fn test_invalid_credential_gets_401_without_entries() {
    let state = test_state(setup_test_db().await);
    record(&state, staff(), AuditAction::CourseDeleted(ChangeSet::default()), course_target("c-1")).await;
    let app = test_app(&state);

    let (status, body) = get(&app, "/admin/audit", Some("fake_token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "unauthorized" }));
    assert!(body.get("entries").is_none());

    let (status, _) = get(&app, "/admin/audit", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admin_role_is_rejected_everywhere() {
    let state = test_state(setup_test_db().await);
    let entry = record(&state, staff(), AuditAction::CouponCreated(ChangeSet::default()), None).await;
    let app = test_app(&state);
    let token = token_for(&AdminPrincipal::new("staff-7", "Sam Staff", "instructor"));

    let (status, _) = get(&app, "/admin/audit", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&app, &format!("/admin/audit/{}", entry.id), Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        &format!("/admin/audit/{}/retract", entry.id),
        Some(&token),
        json!({ "reason": "not mine" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Nothing was written by the rejected retraction
    let stored = state.queries.get_by_id(&admin(), &entry.id).await.unwrap();
    assert_eq!(stored.status.as_str(), "active");
}

#[tokio::test]
async fn test_list_filters_and_total_count() {
    let state = test_state(setup_test_db().await);
    for i in 0..3 {
        record(
            &state,
            staff(),
            AuditAction::CourseUpdated(ChangeSet::default()),
            course_target(&format!("c-{}", i)),
        )
        .await;
    }
    record(
        &state,
        staff(),
        AuditAction::UserRoleChanged(RoleChange {
            from: "student".to_string(),
            to: "instructor".to_string(),
        }),
        None,
    )
    .await;
    let app = test_app(&state);
    let token = admin_token();

    let (status, body) = get(&app, "/admin/audit?action=course.updated&limit=2", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 3);
    assert_eq!(body["entries"].as_array().unwrap().len(), 2);
    assert_eq!(body["page"], 1);
    assert!(body["nextCursor"].is_string());

    let (_, body) = get(&app, "/admin/audit?action=user.*", Some(&token)).await;
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["entries"][0]["action"], "user.role.changed");
    assert_eq!(body["entries"][0]["metadata"]["to"], "instructor");

    let (_, body) = get(&app, "/admin/audit?targetType=course&targetId=c-2", Some(&token)).await;
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["entries"][0]["targetId"], "c-2");

    let (status, _) = get(&app, "/admin/audit?status=gone", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_get_entry_by_id() {
    let state = test_state(setup_test_db().await);
    let entry = record(&state, staff(), AuditAction::BadgeAwarded(ChangeSet::default()), None).await;
    let app = test_app(&state);
    let token = admin_token();

    let (status, body) = get(&app, &format!("/admin/audit/{}", entry.id), Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["entry"]["id"], entry.id.as_str());
    assert_eq!(body["entry"]["contentHash"], entry.content_hash.as_str());

    let (status, _) = get(&app, "/admin/audit/does-not-exist", Some(&token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_retract_then_conflict() {
    let state = test_state(setup_test_db().await);
    let entry = record(&state, staff(), AuditAction::CourseDeleted(ChangeSet::default()), course_target("c-9")).await;
    let app = test_app(&state);
    let token = admin_token();
    let uri = format!("/admin/audit/{}/retract", entry.id);

    let (status, body) = post_json(&app, &uri, Some(&token), json!({ "reason": "wrong course" })).await;
    assert_eq!(status, StatusCode::OK);
    let record = &body["retractionRecord"];
    assert_eq!(record["action"], "audit.retracted");
    assert_eq!(record["metadata"]["retractedEntryId"], entry.id.as_str());
    assert_eq!(record["metadata"]["retractedBy"], "admin-1");
    assert_eq!(record["actor"]["id"], "admin-1");

    let (_, body) = get(&app, &format!("/admin/audit/{}", entry.id), Some(&token)).await;
    assert_eq!(body["entry"]["status"], "retracted");
    assert_eq!(body["entry"]["retractionRef"], record["id"]);

    let (status, _) = post_json(&app, &uri, Some(&token), json!({ "reason": "again" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let record_uri = format!("/admin/audit/{}/retract", record["id"].as_str().unwrap());
    let (status, _) = post_json(&app, &record_uri, Some(&token), json!({ "reason": "undo" })).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = post_json(&app, "/admin/audit/missing/retract", Some(&token), json!({ "reason": "x" })).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = post_json(&app, &uri, Some(&token), json!({ "reason": "  " })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_actor_and_action_filters_combine() {
    let state = test_state(setup_test_db().await);
    let ada = Actor::new("admin-a", "Ada").with_role("admin");
    let bea = Actor::new("admin-b", "Bea").with_role("admin");
    let role_change = || {
        AuditAction::UserRoleChanged(RoleChange {
            from: "student".to_string(),
            to: "instructor".to_string(),
        })
    };

    record(&state, ada.clone(), role_change(), Some(Target::new("user", "u-1"))).await;
    record(&state, ada.clone(), role_change(), Some(Target::new("user", "u-2"))).await;
    record(&state, ada.clone(), AuditAction::CourseUpdated(ChangeSet::default()), course_target("c-1")).await;
    record(&state, bea.clone(), role_change(), Some(Target::new("user", "u-3"))).await;
    record(&state, bea, AuditAction::CourseUpdated(ChangeSet::default()), course_target("c-2")).await;
    let app = test_app(&state);
    let token = admin_token();

    let (status, body) = get(
        &app,
        "/admin/audit?actor=admin-a&action=user.role.changed&limit=1",
        Some(&token),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalCount"], 2);
    assert_eq!(body["entries"].as_array().unwrap().len(), 1);
    assert_eq!(body["entries"][0]["actor"]["id"], "admin-a");
    assert_eq!(body["entries"][0]["action"], "user.role.changed");
    assert_eq!(body["entries"][0]["targetId"], "u-2");

    let (_, body) = get(&app, "/admin/audit?actor=admin-b&action=user.role.changed", Some(&token)).await;
    assert_eq!(body["totalCount"], 1);
    assert_eq!(body["entries"][0]["targetId"], "u-3");
}

#[tokio::test]
async fn test_malformed_requests_get_json_errors() {
    let state = test_state(setup_test_db().await);
    let entry = record(&state, staff(), AuditAction::CourseDeleted(ChangeSet::default()), None).await;
    let app = test_app(&state);
    let token = admin_token();

    let (status, body) = get(&app, "/admin/audit?limit=lots", Some(&token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("query string"));

    let uri = format!("/admin/audit/{}/retract", entry.id);
    let (status, body) = post_json(&app, &uri, Some(&token), json!({ "why": "typo" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let request = Request::builder()
        .method("POST")
        .uri(&uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    // Credentials are checked before the body
    let (status, body) = get(&app, "/admin/audit?limit=lots", Some("fake_token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, json!({ "error": "unauthorized" }));

    let stored = state.queries.get_by_id(&admin(), &entry.id).await.unwrap();
    assert_eq!(stored.status.as_str(), "active");
}
