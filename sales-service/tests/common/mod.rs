//! Common test utilities for sales-service integration tests.
//!
//! These tests exercise the full HTTP surface against a live PostgreSQL
//! instance. When TEST_DATABASE_URL is not set each test skips with a note,
//! so `cargo test` stays green without external services. Isolation comes
//! from a fresh owner id (and company names derived from it) per spawn.

use sales_service::config::{DatabaseConfig, SalesConfig};
use sales_service::startup::Application;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use std::sync::Once;
use uuid::Uuid;

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,sales_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn test_config(database_url: String) -> SalesConfig {
    SalesConfig {
        common: CommonConfig { port: 0 },
        service_name: "sales-service-test".to_string(),
        log_level: "debug".to_string(),
        database: DatabaseConfig {
            url: database_url,
            max_connections: 2,
            min_connections: 1,
        },
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub owner_id: Uuid,
}

/// Spawn the application against TEST_DATABASE_URL, or return None (the
/// caller skips) when the variable is not set.
pub async fn try_spawn_app() -> Option<TestApp> {
    init_tracing();

    let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping integration test");
        return None;
    };

    let app = Application::build(test_config(database_url))
        .await
        .expect("Failed to build application");
    let port = app.port();

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    Some(TestApp {
        address: format!("http://127.0.0.1:{}", port),
        client: reqwest::Client::new(),
        owner_id: Uuid::new_v4(),
    })
}

#[allow(dead_code)]
impl TestApp {
    pub async fn post(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("X-User-ID", self.owner_id.to_string())
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("X-User-ID", self.owner_id.to_string())
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn patch(&self, path: &str, body: &Value) -> reqwest::Response {
        self.client
            .patch(format!("{}{}", self.address, path))
            .header("X-User-ID", self.owner_id.to_string())
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.address, path))
            .header("X-User-ID", self.owner_id.to_string())
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Unique company name for this app instance.
    pub fn company_name(&self) -> String {
        format!("TestCompany-{}", self.owner_id)
    }

    /// Create the default test company and return its name.
    pub async fn create_company(&self) -> String {
        let name = self.company_name();
        let response = self.post("/companies", &company_payload(&name)).await;
        assert_eq!(response.status(), 201, "company creation failed");
        name
    }
}

#[allow(dead_code)]
pub fn company_payload(name: &str) -> Value {
    json!({
        "name": name,
        "nip_number": "1234567890",
        "company_address": {
            "street": "Teststreet",
            "building_number": "12",
            "post_code": "12-345",
            "city": "TestCity",
            "country": "Poland"
        }
    })
}

#[allow(dead_code)]
pub fn receipt_payload(company_name: &str) -> Value {
    json!({
        "header": "Thank you for supporting our shop",
        "company_name": company_name,
        "currency": "PLN",
        "checkout_number": "5",
        "products": [
            { "name": "Egg", "unit_price": 1, "quantity": 5, "vat_type": "A" },
            { "name": "Apple", "unit_price": 0.95, "quantity": 100, "vat_type": "B" }
        ]
    })
}

#[allow(dead_code)]
pub fn invoice_payload(company_name: &str) -> Value {
    json!({
        "company_name": company_name,
        "buyer_address": {
            "street": "Teststreet",
            "building_number": "12",
            "post_code": "12-345",
            "city": "TestCity",
            "country": "Poland"
        },
        "buyer_name": "TestBuyer",
        "buyer_nip": "1234567890",
        "date_finished": "2026-09-01",
        "products": [
            { "name": "Shelf", "unit_price": 4.99, "unit": "pcs", "quantity": 10, "vat_tax": 23 },
            { "name": "Kettle", "unit_price": 10.99, "unit": "pcs", "quantity": 2, "vat_tax": 23 }
        ],
        "currency": "EUR",
        "is_paid": true
    })
}

/// Decimal fields serialize as strings; parse them back for comparisons.
#[allow(dead_code)]
pub fn dec(value: &Value) -> rust_decimal::Decimal {
    value
        .as_str()
        .unwrap_or_else(|| panic!("expected decimal string, got {}", value))
        .parse()
        .expect("Failed to parse decimal")
}
