mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::Router;
use common::{at, entry, TestHarness};
use finance_service::models::{ReportSetting, TransactionType, User};
use finance_service::services::FinanceStore;
use finance_service::startup::router;
use serde_json::{json, Value};
use tower::ServiceExt;

fn app(harness: &TestHarness) -> Router {
    router(harness.state.clone())
}

fn request(method: &str, uri: &str, user: &User, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("X-User-ID", user.id.to_hex());

    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn requests_without_user_header_are_unauthorized() {
    let harness = TestHarness::new(at(2024, 3, 10, 12, 0));

    let response = app(&harness)
        .oneshot(Request::get("/reports").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn created_transaction_is_stored_in_minor_units() {
    let harness = TestHarness::new(at(2024, 3, 10, 12, 0));
    let user = harness.add_user("Ada");

    let response = app(&harness)
        .oneshot(request(
            "POST",
            "/transactions",
            &user,
            Some(json!({
                "title": "Rent",
                "amount": "1250.50",
                "type": "EXPENSE",
                "category": "housing",
                "date": "2024-03-01T00:00:00Z",
                "isRecurring": true,
                "recurringInterval": "MONTHLY"
            })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let created = json_body(response).await;
    assert_eq!(created["title"], "Rent");
    assert_eq!(created["isRecurring"], true);

    let stored = harness.store.transactions();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].amount, 125_050);
    assert_eq!(stored[0].user_id, user.id);
    assert_eq!(created["id"], stored[0].id.to_hex());
}

#[tokio::test]
async fn transactions_are_scoped_to_their_owner() {
    let harness = TestHarness::new(at(2024, 3, 10, 12, 0));
    let owner = harness.add_user("Ada");
    let other = harness.add_user("Grace");
    let tx = entry(
        owner.id,
        TransactionType::Expense,
        "food",
        1_500,
        at(2024, 3, 2, 9, 0),
    );
    harness.store.insert_transactions(&[tx.clone()]).await.unwrap();
    let uri = format!("/transactions/{}", tx.id.to_hex());

    let response = app(&harness)
        .oneshot(request("GET", &uri, &other, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app(&harness)
        .oneshot(request("DELETE", &uri, &owner, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(harness.store.transactions().is_empty());
}

#[tokio::test]
async fn malformed_transaction_id_is_a_bad_request() {
    let harness = TestHarness::new(at(2024, 3, 10, 12, 0));
    let user = harness.add_user("Ada");

    let response = app(&harness)
        .oneshot(request("GET", "/transactions/nope", &user, None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn report_settings_are_created_once_and_toggled() {
    let harness = TestHarness::new(at(2024, 3, 10, 12, 0));
    let user = harness.add_user("Ada");

    let response = app(&harness)
        .oneshot(request("POST", "/reports/settings", &user, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["isEnabled"], true);
    assert_eq!(created["frequency"], "MONTHLY");
    assert_eq!(created["nextReportDate"], "2024-04-01T00:00:00Z");

    let response = app(&harness)
        .oneshot(request("POST", "/reports/settings", &user, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app(&harness)
        .oneshot(request(
            "PUT",
            "/reports/settings",
            &user,
            Some(json!({ "isEnabled": false })),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["isEnabled"], false);
    assert_eq!(updated["nextReportDate"], Value::Null);

    let response = app(&harness)
        .oneshot(request("GET", "/reports/settings", &user, None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["isEnabled"], false);
}

#[tokio::test]
async fn delivered_reports_are_listed() {
    let harness = TestHarness::new(at(2024, 3, 1, 2, 30));
    let user = harness.add_user("Ada");
    harness
        .store
        .insert_transactions(&[entry(
            user.id,
            TransactionType::Expense,
            "food",
            2_000,
            at(2024, 2, 14, 9, 0),
        )])
        .await
        .unwrap();
    let setting = ReportSetting::new(user.id, at(2024, 3, 1, 0, 0), at(2024, 2, 10, 0, 0));
    harness.store.insert_report_setting(&setting).await.unwrap();
    harness.state.report_delivery.run().await;

    let response = app(&harness)
        .oneshot(request("GET", "/reports?pageSize=1&pageNumber=1", &user, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let page = json_body(response).await;
    assert_eq!(page["totalCount"], 1);
    assert_eq!(page["totalPages"], 1);
    assert_eq!(page["pageSize"], 1);
    assert_eq!(page["reports"][0]["status"], "SENT");
    assert_eq!(page["reports"][0]["period"], "February 1 - 29, 2024");
}

#[tokio::test]
async fn generated_report_without_activity_is_null() {
    let harness = TestHarness::new(at(2024, 3, 10, 12, 0));
    let user = harness.add_user("Ada");

    let response = app(&harness)
        .oneshot(request(
            "GET",
            "/reports/generate?from=2024-02-01T00:00:00Z&to=2024-02-29T23:59:59Z",
            &user,
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, Value::Null);
}
