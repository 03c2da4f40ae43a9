#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use resident_portal::config::{Config, StorageMode};
use resident_portal::db::JsonFileStore;
use resident_portal::router::{PortalState, portal_router};
use resident_portal::service::bootstrap::{self, AdminSeed};
use resident_portal::service::mailer::{MailService, MailSettings};
use resident_portal::service::store_actor;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@portal.test";
pub const ADMIN_PASSWORD: &str = "Admin123!";

pub struct TestPortal {
    pub app: Router,
    /// Data directory of this portal; removed when the portal is dropped.
    pub dir: TempDir,
}

pub async fn portal(tag: &str) -> TestPortal {
    portal_with(tag, |_| {}).await
}

pub async fn portal_with(tag: &str, tweak: impl FnOnce(&mut Config)) -> TestPortal {
    build(data_dir(tag), tweak).await
}

/// A portal whose data directory already holds `files` (name, JSON contents).
pub async fn portal_from_files(tag: &str, files: &[(&str, Value)]) -> TestPortal {
    let dir = data_dir(tag);
    for (name, contents) in files {
        std::fs::write(dir.path().join(name), contents.to_string())
            .expect("failed to seed data file");
    }
    build(dir, |_| {}).await
}

fn data_dir(tag: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("resident-portal-{tag}-"))
        .tempdir()
        .expect("failed to create data dir")
}

async fn build(dir: TempDir, tweak: impl FnOnce(&mut Config)) -> TestPortal {
    let mut cfg = Config {
        data_dir: dir.path().to_path_buf(),
        storage_mode: StorageMode::File,
        jwt_secret: "integration-test-secret-integration-test".to_string(),
        ..Config::default()
    };
    tweak(&mut cfg);

    let store = store_actor::spawn(JsonFileStore::new(&cfg.data_dir), cfg.storage_mode)
        .await
        .expect("failed to spawn store");
    bootstrap::run(
        &store,
        Some(&AdminSeed {
            email: ADMIN_EMAIL.to_string(),
            password: ADMIN_PASSWORD.to_string(),
            name: "Administrator".to_string(),
        }),
    )
    .await
    .expect("bootstrap failed");

    let mailer = MailService::new(MailSettings {
        relay_url: None,
        from: cfg.mail_from.clone(),
        per_minute: 600,
        concurrency: 1,
    })
    .expect("failed to build mailer");

    let state = PortalState::new(store, mailer, &cfg);
    TestPortal {
        app: portal_router(state),
        dir,
    }
}

impl TestPortal {
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        self.raw(builder.body(body).expect("failed to build request"))
            .await
    }

    pub async fn raw(&self, req: Request<Body>) -> (StatusCode, Value) {
        let resp = self
            .app
            .clone()
            .oneshot(req)
            .await
            .expect("request failed");
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("failed to read response body");
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn login(&self, email: &str, password: &str) -> (String, Value) {
        let (status, body) = self
            .send(
                "PUT",
                "/api/auth",
                None,
                Some(json!({"email": email, "password": password})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        let token = body["token"].as_str().expect("token missing").to_string();
        (token, body["user"].clone())
    }

    pub async fn admin_token(&self) -> String {
        self.login(ADMIN_EMAIL, ADMIN_PASSWORD).await.0
    }

    /// Register a resident and return `(id, token)`.
    pub async fn resident(&self, name: &str) -> (String, String) {
        let email = format!("{}@portal.test", name.to_lowercase());
        let (status, body) = self
            .send(
                "POST",
                "/api/auth",
                None,
                Some(json!({"email": email, "password": "resident-pass", "name": name})),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        let id = body["id"].as_str().expect("id missing").to_string();
        let (token, _) = self.login(&email, "resident-pass").await;
        (id, token)
    }
}
