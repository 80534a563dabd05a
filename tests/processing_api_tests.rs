//! End-to-end tests of the processing record endpoints.

mod support;

use axum::http::{Method, StatusCode};
use serde_json::json;
use support::{ADMIN, Farm, TestApp};

#[tokio::test]
async fn create_splits_cost_across_field_owners() {
    // Arrange
    let farm = Farm::new(TestApp::in_memory()).await;

    // Act
    let (status, record) = farm
        .app
        .post("/processing-records", farm.partner(), farm.submission("2024-05-01"))
        .await;

    // Assert
    assert_eq!(status, StatusCode::CREATED, "{record}");
    assert_eq!(record["totalFuelConsumption"], 25.0);
    assert_eq!(record["totalCost"], 750.0);
    assert_eq!(record["inventoryItemName"], "Plough");
    assert_eq!(record["fieldName"], "North");
    assert_eq!(record["ownerDistribution"][0]["userId"], farm.ali.as_str());
    assert_eq!(record["ownerDistribution"][0]["amount"], 450.0);
    assert_eq!(record["ownerDistribution"][0]["ownerName"], "Ali");
    assert_eq!(record["ownerDistribution"][1]["amount"], 300.0);
    assert_eq!(record["fieldOwners"][1]["ownershipPercentage"], 40.0);
    assert!(record["createdAt"].is_string());
}

#[tokio::test]
async fn partial_ledger_distributes_only_its_share() {
    let farm = Farm::new(TestApp::in_memory()).await;
    let mut body = farm.submission("2024-05-01");
    // 2.5 L/da over 40 da at 10 per liter costs 1000
    body["processedArea"] = json!(40);
    body["fuelUnitPrice"] = json!(10);
    body["fieldOwners"] = json!([
        {"userId": farm.ali, "ownershipPercentage": 50, "ownerName": "Ali"},
        {"userId": farm.veli, "ownershipPercentage": 30, "ownerName": "Veli"}
    ]);

    let (status, record) = farm.app.post("/processing-records", ADMIN, body).await;

    assert_eq!(status, StatusCode::CREATED, "{record}");
    assert_eq!(record["totalCost"], 1000.0);
    assert_eq!(record["ownerDistribution"][0]["amount"], 500.0);
    assert_eq!(record["ownerDistribution"][1]["amount"], 300.0);
}

#[tokio::test]
async fn strict_mode_rejects_partial_ledger() {
    let farm = Farm::new(TestApp::strict()).await;
    let mut body = farm.submission("2024-05-01");
    body["fieldOwners"] = json!([{"userId": farm.ali, "ownershipPercentage": 50}]);

    let (status, error) = farm.app.post("/processing-records", ADMIN, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["field"], "fieldOwners");
}

#[tokio::test]
async fn empty_owner_list_creates_nothing() {
    let farm = Farm::new(TestApp::in_memory()).await;
    let mut body = farm.submission("2024-05-01");
    body["fieldOwners"] = json!([]);

    let (status, error) = farm.app.post("/processing-records", ADMIN, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "ValidationError");
    assert_eq!(error["field"], "fieldOwners");
    assert!(error["errorId"].as_str().unwrap().starts_with("err_"));

    let (_, records) = farm.app.get("/processing-records", ADMIN).await;
    assert_eq!(records, json!([]));
}

#[tokio::test]
async fn missing_values_are_reported_by_field() {
    let farm = Farm::new(TestApp::in_memory()).await;
    for missing in ["inventoryItemId", "fieldId", "date", "processedArea", "fuelUnitPrice"] {
        let mut body = farm.submission("2024-05-01");
        body.as_object_mut().unwrap().remove(missing);

        let (status, error) = farm.app.post("/processing-records", ADMIN, body).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "{missing}");
        assert_eq!(error["field"], missing);
    }
}

#[tokio::test]
async fn unknown_references_are_bad_requests() {
    let farm = Farm::new(TestApp::in_memory()).await;
    let mut body = farm.submission("2024-05-01");
    body["inventoryItemId"] = json!("no-such-item");

    let (status, error) = farm.app.post("/processing-records", ADMIN, body).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["field"], "inventoryItemId");
}

#[tokio::test]
async fn malformed_json_is_a_validation_error() {
    let app = TestApp::in_memory();
    let (status, error) = app
        .post("/processing-records", ADMIN, json!("not an object"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["code"], "ValidationError");
}

#[tokio::test]
async fn update_recomputes_and_keeps_creation_time() {
    let farm = Farm::new(TestApp::in_memory()).await;
    let (_, created) = farm
        .app
        .post("/processing-records", ADMIN, farm.submission("2024-05-01"))
        .await;
    let id = created["id"].as_str().unwrap();

    let mut body = farm.submission("2024-05-03");
    body["processedArea"] = json!(4);
    let (status, updated) = farm
        .app
        .put(&format!("/processing-records/{id}"), farm.partner(), body)
        .await;

    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["id"], created["id"]);
    assert_eq!(updated["createdAt"], created["createdAt"]);
    assert_eq!(updated["date"], "2024-05-03");
    assert_eq!(updated["totalCost"], 300.0);
    assert_eq!(updated["ownerDistribution"][0]["amount"], 180.0);

    let (_, fetched) = farm
        .app
        .get(&format!("/processing-records/{id}"), ADMIN)
        .await;
    assert_eq!(fetched, updated);
}

#[tokio::test]
async fn update_of_unknown_record_is_not_found() {
    let farm = Farm::new(TestApp::in_memory()).await;
    let (status, error) = farm
        .app
        .put("/processing-records/ghost", ADMIN, farm.submission("2024-05-01"))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error["code"], "NotFound");
}

#[tokio::test]
async fn list_is_sorted_by_date_descending() {
    let farm = Farm::new(TestApp::in_memory()).await;
    for date in ["2024-03-10", "2024-06-01", "2024-04-20"] {
        farm.app
            .post("/processing-records", ADMIN, farm.submission(date))
            .await;
    }

    let (status, records) = farm.app.get("/processing-records", farm.partner()).await;

    assert_eq!(status, StatusCode::OK);
    let dates: Vec<_> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["date"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(dates, ["2024-06-01", "2024-04-20", "2024-03-10"]);
}

#[tokio::test]
async fn preview_computes_without_storing() {
    let farm = Farm::new(TestApp::in_memory()).await;

    let (status, preview) = farm
        .app
        .post("/processing-records/preview", farm.partner(), farm.submission("2024-05-01"))
        .await;

    assert_eq!(status, StatusCode::OK, "{preview}");
    assert_eq!(preview["totalCost"], 750.0);
    assert_eq!(preview["ownerDistribution"][1]["ownerName"], "Veli");
    let (_, records) = farm.app.get("/processing-records", ADMIN).await;
    assert_eq!(records, json!([]));
}

#[tokio::test]
async fn only_admin_deletes_records() {
    let farm = Farm::new(TestApp::in_memory()).await;
    let (_, created) = farm
        .app
        .post("/processing-records", ADMIN, farm.submission("2024-05-01"))
        .await;
    let uri = format!("/processing-records/{}", created["id"].as_str().unwrap());

    let (status, _) = farm.app.delete(&uri, farm.partner()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = farm.app.delete(&uri, ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"], true);

    let (status, _) = farm.app.get(&uri, ADMIN).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn workers_cannot_see_or_record_processing() {
    let farm = Farm::new(TestApp::in_memory()).await;
    let worker = ("w-1", "worker");

    let (status, _) = farm.app.get("/processing-records", worker).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = farm
        .app
        .post("/processing-records", worker, farm.submission("2024-05-01"))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn requests_without_identity_are_unauthorized() {
    let farm = Farm::new(TestApp::in_memory()).await;

    let (status, _) = farm
        .app
        .send(Method::GET, "/processing-records", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = farm
        .app
        .get("/processing-records", ("u-1", "Superuser"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn overflowing_cost_is_rejected_and_store_stays_readable() {
    // Arrange
    let farm = Farm::new(TestApp::in_memory()).await;
    let mut body = farm.submission("2024-05-01");
    body["processedArea"] = json!(1e300);
    body["fuelUnitPrice"] = json!(1e300);

    // Act
    let (status, error) = farm.app.post("/processing-records", ADMIN, body).await;

    // Assert
    assert_eq!(status, StatusCode::BAD_REQUEST, "{error}");
    assert_eq!(error["field"], "totalCost");
    let (status, records) = farm.app.get("/processing-records", ADMIN).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(records, json!([]));
}
