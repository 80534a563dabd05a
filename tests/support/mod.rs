//! Shared harness for driving the router in-process.
#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use farm_ops::{AppState, MemoryStore, ServerConfig, router};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

pub const ADMIN: (&str, &str) = ("admin-1", "Admin");

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

impl TestApp {
    pub fn in_memory() -> Self {
        Self::with_config(ServerConfig::in_memory())
    }

    pub fn strict() -> Self {
        Self::with_config(ServerConfig {
            strict_ownership: true,
            ..ServerConfig::in_memory()
        })
    }

    pub fn with_config(config: ServerConfig) -> Self {
        Self::with_state(AppState::new(config, Arc::new(MemoryStore::new())))
    }

    pub fn with_state(state: AppState) -> Self {
        Self {
            router: router(state.clone()),
            state,
        }
    }

    /// Sends one request; `caller` is `(user id, role)`.
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        caller: Option<(&str, &str)>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        if let Some((user, role)) = caller {
            request = request.header("x-user-id", user).header("x-user-role", role);
        }
        let request = match body {
            Some(body) => request
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => request.body(Body::empty()),
        }
        .expect("request builds");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body collects")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, caller: (&str, &str)) -> (StatusCode, Value) {
        self.send(Method::GET, uri, Some(caller), None).await
    }

    pub async fn post(&self, uri: &str, caller: (&str, &str), body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(caller), Some(body)).await
    }

    pub async fn put(&self, uri: &str, caller: (&str, &str), body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, Some(caller), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, caller: (&str, &str)) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, Some(caller), None).await
    }

    /// Creates a document as admin and returns its id.
    pub async fn create(&self, uri: &str, body: Value) -> String {
        let (status, created) = self.post(uri, ADMIN, body).await;
        assert_eq!(status, StatusCode::CREATED, "POST {uri}: {created}");
        created["id"].as_str().expect("created document has an id").to_string()
    }

    pub async fn user(&self, name: &str, role: &str) -> String {
        self.create(
            "/users",
            json!({
                "name": name,
                "email": format!("{}@farm.example", name.to_lowercase()),
                "role": role
            }),
        )
        .await
    }
}

/// Two partners owning a field 60/40 and a plough burning 2.5 L/da.
pub struct Farm {
    pub app: TestApp,
    pub ali: String,
    pub veli: String,
    pub field: String,
    pub item: String,
}

impl Farm {
    pub async fn new(app: TestApp) -> Self {
        let ali = app.user("Ali", "Ortak").await;
        let veli = app.user("Veli", "Ortak").await;
        let field = app
            .create(
                "/fields",
                json!({
                    "name": "North",
                    "size": 20,
                    "status": "Ekili",
                    "owners": [
                        {"userId": ali, "percentage": 60},
                        {"userId": veli, "percentage": 40}
                    ]
                }),
            )
            .await;
        let item = app
            .create(
                "/inventory",
                json!({
                    "name": "Plough",
                    "category": "Equipment",
                    "subCategory": "Tillage",
                    "fuelConsumptionRate": 2.5,
                    "owners": [{"userId": ali, "percentage": 100}]
                }),
            )
            .await;
        Self {
            app,
            ali,
            veli,
            field,
            item,
        }
    }

    pub fn submission(&self, date: &str) -> Value {
        json!({
            "inventoryItemId": self.item,
            "fieldId": self.field,
            "date": date,
            "processedArea": 10,
            "fuelUnitPrice": 30
        })
    }

    pub fn partner(&self) -> (&str, &str) {
        (self.ali.as_str(), "Ortak")
    }
}
