use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::leave::domain::{LeaveType, UserId};
use crate::leave::repository::{BalanceFilter, LeaveStore};
use crate::leave::{leave_router, router, InMemoryLeaveStore, LeaveService};

async fn seeded_router() -> (Router, Arc<InMemoryLeaveStore>) {
    let store = seeded_store_with_casual_rule().await;
    let (service, _) = build_service(store.clone());
    (leave_router(Arc::new(service)), store)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("encode body")))
        .expect("request")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

#[tokio::test]
async fn submit_route_returns_created_with_the_verdict() {
    let (router, store) = seeded_router().await;

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/leave-requests",
            json!({
                "user_id": "alice",
                "leave_type": "casual",
                "start_date": "2025-03-05",
                "end_date": "2025-03-05",
                "reason": "dentist"
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = read_json_body(response).await;
    assert_eq!(body["decision"]["decision"], "approved");
    assert_eq!(body["request"]["status"], "approved");
    assert_eq!(body["request"]["days"], 1);
    assert_eq!(body["ledger"]["result"], "applied");
    assert_eq!(body["ledger"]["balance"]["remaining"], 9);
    assert_eq!(
        stored_balance(store.as_ref(), "alice", LeaveType::Casual).await.used,
        1
    );
}

#[tokio::test]
async fn submit_route_rejects_inverted_ranges_as_unprocessable() {
    let (router, _) = seeded_router().await;

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/leave-requests",
            json!({
                "user_id": "alice",
                "leave_type": "casual",
                "start_date": "2025-03-07",
                "end_date": "2025-03-05"
            }),
        ))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("precedes"));
}

#[tokio::test]
async fn decision_and_listing_routes_round_trip_through_the_service() {
    let (router, _) = seeded_router().await;

    let submitted = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/leave-requests",
            json!({
                "user_id": "bob",
                "leave_type": "annual",
                "start_date": "2025-04-07",
                "end_date": "2025-04-08"
            }),
        ))
        .await
        .expect("router responds");
    let body = read_json_body(submitted).await;
    assert_eq!(body["decision"]["decision"], "pending");
    let id = body["request"]["id"].as_str().expect("id").to_string();

    let decided = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/v1/tenants/acme/leave-requests/{id}/decision"),
            json!({ "status": "approved" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(decided.status(), StatusCode::OK);
    let change = read_json_body(decided).await;
    assert_eq!(change["previous"], "pending");
    assert_eq!(change["current"], "approved");
    assert_eq!(change["ledger"]["balance"]["used"], 2);

    let listed = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/tenants/acme/leave-requests?status=approved&user_id=bob",
        ))
        .await
        .expect("router responds");
    assert_eq!(listed.status(), StatusCode::OK);
    let listing = read_json_body(listed).await;
    let rows = listing.as_array().expect("array");
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["id"], id.as_str());
}

#[tokio::test]
async fn deleting_a_decided_request_conflicts() {
    let (router, _) = seeded_router().await;
    let submitted = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/leave-requests",
            json!({
                "user_id": "alice",
                "leave_type": "casual",
                "start_date": "2025-03-05",
                "end_date": "2025-03-05"
            }),
        ))
        .await
        .expect("router responds");
    let id = read_json_body(submitted).await["request"]["id"]
        .as_str()
        .expect("id")
        .to_string();

    let response = router
        .clone()
        .oneshot(empty_request(
            Method::DELETE,
            &format!("/api/v1/tenants/acme/leave-requests/{id}"),
        ))
        .await
        .expect("router responds");
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let missing = router
        .oneshot(empty_request(
            Method::DELETE,
            "/api/v1/tenants/acme/leave-requests/lr-nope",
        ))
        .await
        .expect("router responds");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn balance_routes_list_adjust_and_correct() {
    let (router, _) = seeded_router().await;

    let adjusted = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/balances/adjust",
            json!({ "user_id": "carol", "leave_type": "annual", "days": 3, "op": "deduct" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(adjusted.status(), StatusCode::OK);
    assert_eq!(read_json_body(adjusted).await["balance"]["remaining"], 11);

    let corrected = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/tenants/acme/balances",
            json!({ "user_id": "carol", "leave_type": "casual", "total": 7, "used": 2 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(corrected.status(), StatusCode::OK);

    let listed = router
        .oneshot(empty_request(
            Method::GET,
            "/api/v1/tenants/acme/balances?user_id=carol",
        ))
        .await
        .expect("router responds");
    let rows = read_json_body(listed).await;
    let rows = rows.as_array().expect("array");
    assert_eq!(rows.len(), 2);
    let casual = rows
        .iter()
        .find(|row| row["leave_type"] == "casual")
        .expect("casual row");
    assert_eq!(casual["remaining"], 5);
}

#[tokio::test]
async fn balance_routes_refuse_day_counts_that_would_overflow() {
    let (router, store) = seeded_router().await;
    let before = stored_balance(store.as_ref(), "carol", LeaveType::Casual).await;

    let corrected = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/tenants/acme/balances",
            json!({ "user_id": "carol", "leave_type": "casual", "total": i32::MIN, "used": 1 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(corrected.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(read_json_body(corrected).await["error"]
        .as_str()
        .is_some_and(|message| message.contains("total")));

    let adjusted = router
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/balances/adjust",
            json!({ "user_id": "carol", "leave_type": "casual", "days": i32::MAX, "op": "deduct" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(adjusted.status(), StatusCode::UNPROCESSABLE_ENTITY);

    assert_eq!(
        stored_balance(store.as_ref(), "carol", LeaveType::Casual).await,
        before
    );
}

#[tokio::test]
async fn policy_and_rule_routes_enforce_their_invariants() {
    let (router, store) = seeded_router().await;

    let policy = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/tenants/acme/policy",
            json!({ "annual": 18, "sick": 10, "casual": 5 }),
        ))
        .await
        .expect("router responds");
    assert_eq!(policy.status(), StatusCode::OK);
    assert_eq!(
        stored_balance(store.as_ref(), "bob", LeaveType::Annual).await.total,
        18
    );

    let renewed = router
        .clone()
        .oneshot(empty_request(Method::POST, "/api/v1/tenants/acme/policy/renew"))
        .await
        .expect("router responds");
    assert_eq!(renewed.status(), StatusCode::OK);

    let duplicate = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/rules",
            json!({
                "leave_type": "casual",
                "enabled": true,
                "min_days_notice": 0,
                "max_duration": 5,
                "require_sufficient_balance": false
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let toggled = router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            "/api/v1/tenants/acme/rules/rule-casual/toggle",
        ))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(toggled).await["enabled"], false);

    let listed = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/tenants/acme/rules"))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(listed).await.as_array().map(Vec::len), Some(1));

    let deleted = router
        .oneshot(empty_request(
            Method::DELETE,
            "/api/v1/tenants/acme/rules/rule-casual",
        ))
        .await
        .expect("router responds");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn employee_and_sweep_routes() {
    let (router, store) = seeded_router().await;

    let created = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/employees",
            json!({
                "id": "erin",
                "name": "Erin Example",
                "email": "erin@acme.test",
                "role": "employee",
                "job_title": "Analyst"
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);
    assert_eq!(
        stored_balance(store.as_ref(), "erin", LeaveType::Sick).await.total,
        10
    );

    let swept = router
        .oneshot(empty_request(Method::POST, "/api/v1/tenants/acme/sweep"))
        .await
        .expect("router responds");
    assert_eq!(swept.status(), StatusCode::OK);
    let report = read_json_body(swept).await;
    assert_eq!(report["tenant"], "acme");
    assert_eq!(report["evaluated"], 0);
}

#[tokio::test]
async fn employee_admin_routes_edit_and_remove_roster_entries() {
    let (router, store) = seeded_router().await;

    let updated = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            "/api/v1/tenants/acme/employees/bob",
            json!({
                "name": "Bob Example",
                "email": "bob@acme.test",
                "role": "manager",
                "job_title": "Support"
            }),
        ))
        .await
        .expect("router responds");
    assert_eq!(updated.status(), StatusCode::OK);
    let body = read_json_body(updated).await;
    assert_eq!(body["job_title"], "Support");
    assert_eq!(body["role"], "manager");

    let removed = router
        .clone()
        .oneshot(empty_request(Method::DELETE, "/api/v1/tenants/acme/employees/carol"))
        .await
        .expect("router responds");
    assert_eq!(removed.status(), StatusCode::NO_CONTENT);
    assert!(store
        .list_balances(&tenant(), &BalanceFilter::for_user(&UserId::new("carol")))
        .await
        .expect("list balances")
        .is_empty());

    let again = router
        .clone()
        .oneshot(empty_request(Method::DELETE, "/api/v1/tenants/acme/employees/carol"))
        .await
        .expect("router responds");
    assert_eq!(again.status(), StatusCode::NOT_FOUND);

    let listed = router
        .oneshot(empty_request(Method::GET, "/api/v1/tenants/acme/employees"))
        .await
        .expect("router responds");
    let roster = read_json_body(listed).await;
    let ids: Vec<_> = roster
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|employee| employee["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["alice", "bob"]);
}

#[tokio::test]
async fn department_routes_manage_departments_and_roles() {
    let (router, _) = seeded_router().await;

    let created = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/departments",
            json!({ "name": "Support" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);
    let department_id = read_json_body(created).await["id"]
        .as_str()
        .expect("department id")
        .to_string();

    let duplicate = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/v1/tenants/acme/departments",
            json!({ "name": "support" }),
        ))
        .await
        .expect("router responds");
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let roles_uri = format!("/api/v1/tenants/acme/departments/{department_id}/roles");
    let with_role = router
        .clone()
        .oneshot(json_request(Method::POST, &roles_uri, json!({ "role": "Agent" })))
        .await
        .expect("router responds");
    assert_eq!(with_role.status(), StatusCode::OK);
    assert_eq!(read_json_body(with_role).await["roles"], json!(["Agent"]));

    let without_role = router
        .clone()
        .oneshot(empty_request(Method::DELETE, &format!("{roles_uri}/Agent")))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(without_role).await["roles"], json!([]));

    let listed = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/v1/tenants/acme/departments"))
        .await
        .expect("router responds");
    assert_eq!(read_json_body(listed).await.as_array().map(Vec::len), Some(1));

    let department_uri = format!("/api/v1/tenants/acme/departments/{department_id}");
    let deleted = router
        .clone()
        .oneshot(empty_request(Method::DELETE, &department_uri))
        .await
        .expect("router responds");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);
    let missing = router
        .oneshot(empty_request(Method::DELETE, &department_uri))
        .await
        .expect("router responds");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outages_map_to_service_unavailable() {
    let (service, _) = build_service(Arc::new(UnavailableStore));

    let response = router::list_rules_handler::<UnavailableStore, RecordingNotifier>(
        State(Arc::new(service)),
        Path("acme".to_string()),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = read_json_body(response).await;
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("database offline"));
}

#[tokio::test]
async fn disconnected_service_answers_service_unavailable() {
    let service: LeaveService<InMemoryLeaveStore, RecordingNotifier> =
        LeaveService::disconnected(Arc::new(RecordingNotifier::default()));
    let router = leave_router(Arc::new(service));

    let response = router
        .oneshot(empty_request(Method::GET, "/api/v1/tenants/acme/balances"))
        .await
        .expect("router responds");

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
