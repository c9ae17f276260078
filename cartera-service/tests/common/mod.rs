//! Common test utilities for cartera-service integration tests.

use async_trait::async_trait;
use cartera_service::config::{
    AuthConfig, BootstrapAdmin, CarteraConfig, ConfirmationConfig, DatabaseConfig, MediaConfig,
    SiteConfig, SmtpConfig,
};
use cartera_service::services::{ConfirmationTokens, Mailer, OutgoingEmail};
use cartera_service::startup::Application;
use chrono::FixedOffset;
use reqwest::multipart::{Form, Part};
use secrecy::Secret;
use serde_json::{json, Value};
use service_core::config::Config as CommonConfig;
use service_core::error::AppError;
use std::sync::{Arc, Mutex, Once};
use tempfile::TempDir;
use uuid::Uuid;

static INIT: Once = Once::new();

pub const SIGNING_SECRET: &str = "test-signing-secret";
pub const ADMIN_PASSWORD: &str = "admin-password-123";
pub const USER_PASSWORD: &str = "cashier-password-123";

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,cartera_service=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Mailer that keeps every message instead of delivering it.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingEmail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &OutgoingEmail) -> Result<(), AppError> {
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

fn test_config(database_url: String, media_root: &TempDir, admin: &str) -> CarteraConfig {
    CarteraConfig {
        common: CommonConfig { port: 0 },
        service_name: "cartera-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: Secret::new(database_url),
            max_connections: 4,
            min_connections: 1,
        },
        site: SiteConfig {
            url: "http://cartera.test/".to_string(),
            utc_offset: FixedOffset::west_opt(5 * 3600).unwrap(),
        },
        media: MediaConfig {
            root: media_root.path().to_path_buf(),
            max_upload_bytes: 1024 * 1024,
        },
        auth: AuthConfig {
            jwt_secret: Secret::new("test-jwt-secret".to_string()),
            token_expiry_minutes: 30,
        },
        confirmation: ConfirmationConfig {
            signing_secret: Secret::new(SIGNING_SECRET.to_string()),
            max_age_days: 7,
        },
        smtp: SmtpConfig {
            enabled: false,
            host: "localhost".to_string(),
            port: 25,
            user: String::new(),
            password: Secret::new(String::new()),
            from_email: "cartera@example.com".to_string(),
            from_name: "Cartera".to_string(),
        },
        bootstrap: Some(BootstrapAdmin {
            username: admin.to_string(),
            email: format!("{}@example.com", admin),
            password: Secret::new(ADMIN_PASSWORD.to_string()),
        }),
    }
}

/// Test application wrapper.
#[allow(dead_code)]
pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub admin_token: String,
    pub mailer: RecordingMailer,
    pub tokens: ConfirmationTokens,
    pub media: TempDir,
}

/// Spawn the application on a random port with a fresh bootstrap admin.
pub async fn spawn_app() -> TestApp {
    let database_url = std::env::var("TEST_DATABASE_URL")
        .expect("TEST_DATABASE_URL must be set to run the PostgreSQL-backed tests");
    init_tracing();

    let media = TempDir::new().expect("Failed to create media dir");
    let admin = unique("admin");
    let config = test_config(database_url, &media, &admin);
    let mailer = RecordingMailer::default();

    let app = Application::build_with_mailer(config, Arc::new(mailer.clone()), true)
        .await
        .expect("Failed to build application");
    let address = format!("http://127.0.0.1:{}", app.http_port());

    tokio::spawn(async move {
        app.run_until_stopped().await.ok();
    });

    let client = reqwest::Client::new();
    let mut attempts = 0;
    loop {
        match client.get(format!("{}/ready", address)).send().await {
            Ok(res) if res.status().is_success() => break,
            _ if attempts < 20 => {
                attempts += 1;
                tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
            }
            _ => panic!("Application did not become ready"),
        }
    }

    let mut app = TestApp {
        address,
        client,
        admin_token: String::new(),
        mailer,
        tokens: ConfirmationTokens::new(SIGNING_SECRET, 7),
        media,
    };
    app.admin_token = app.login(&admin, ADMIN_PASSWORD).await;
    app
}

/// Unique name so tests sharing one database do not collide.
pub fn unique(prefix: &str) -> String {
    format!("{}-{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

/// A small PDF voucher part.
pub fn voucher_part() -> Part {
    Part::bytes(b"%PDF-1.4 test voucher".to_vec())
        .file_name("comprobante.pdf")
        .mime_str("application/pdf")
        .unwrap()
}

#[allow(dead_code)]
impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    pub async fn login(&self, username: &str, password: &str) -> String {
        let res = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), 200, "login failed for {}", username);
        let body: Value = res.json().await.unwrap();
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn get(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_json(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn put_json(&self, token: &str, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    pub async fn delete(&self, token: &str, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .unwrap()
    }

    pub async fn post_form(&self, token: &str, path: &str, form: Form) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await
            .unwrap()
    }

    pub async fn create_point_of_sale(&self, name: &str) -> i64 {
        let res = self
            .post_json(
                &self.admin_token,
                "/points-of-sale",
                json!({ "name": name, "city": "Bogotá" }),
            )
            .await;
        assert_eq!(res.status(), 201);
        let body: Value = res.json().await.unwrap();
        body["pos_id"].as_i64().unwrap()
    }

    /// Create a non-staff user, optionally assigned to a point of sale, and
    /// return a bearer token for it.
    pub async fn create_cashier(&self, pos_id: Option<i64>) -> String {
        let username = unique("caja");
        let res = self
            .post_json(
                &self.admin_token,
                "/users",
                json!({ "username": username, "password": USER_PASSWORD }),
            )
            .await;
        assert_eq!(res.status(), 201);
        let user: Value = res.json().await.unwrap();
        let user_id = user["user_id"].as_i64().unwrap();

        if let Some(pos_id) = pos_id {
            let res = self
                .put_json(
                    &self.admin_token,
                    &format!("/users/{}/point-of-sale", user_id),
                    json!({ "point_of_sale_id": pos_id }),
                )
                .await;
            assert_eq!(res.status(), 200);
        }

        self.login(&username, USER_PASSWORD).await
    }

    /// Create a supplier; an empty `email` leaves it without one.
    pub async fn create_supplier(&self, email: &str) -> i64 {
        let email = Some(email).filter(|e| !e.is_empty());
        let res = self
            .post_json(
                &self.admin_token,
                "/suppliers",
                json!({ "name": unique("Proveedor"), "tax_id": "900123456", "email": email }),
            )
            .await;
        assert_eq!(res.status(), 201);
        let body: Value = res.json().await.unwrap();
        body["supplier_id"].as_i64().unwrap()
    }

    /// Create an invoice as staff on the given point of sale.
    pub async fn create_invoice(
        &self,
        supplier_id: i64,
        pos_id: i64,
        amount: &str,
        status: &str,
    ) -> Value {
        let res = self
            .post_json(
                &self.admin_token,
                "/invoices",
                json!({
                    "supplier_id": supplier_id,
                    "point_of_sale_id": pos_id,
                    "invoice_number": unique("fv"),
                    "invoice_date": "2025-03-10",
                    "amount": amount,
                    "status": status,
                }),
            )
            .await;
        assert_eq!(res.status(), 201);
        res.json().await.unwrap()
    }
}
