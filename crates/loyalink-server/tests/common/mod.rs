#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Request, StatusCode};
use chrono::Utc;
use loyalink_common::types::NewClient;
use loyalink_crm::{CrmClient, CrmError};
use loyalink_server::app;
use loyalink_server::config::ServerConfig;
use loyalink_server::registration::{EnrollmentWorkflow, RegistrationService};
use loyalink_server::state::AppState;
use loyalink_storage::{RegistrationStore, TokenCodec};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::util::ServiceExt;

pub const BASE_URL: &str = "https://x.test/register?token=";
pub const TEST_KEY: [u8; 32] = [7u8; 32];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrmCall {
    FindOrCreate { name: String, phone: String, birthday: String },
    GrantBonus { client_id: i64, amount: i64 },
}

/// In-memory CRM that records every call.
#[derive(Default)]
pub struct FakeCrm {
    calls: Mutex<Vec<CrmCall>>,
    clients: Mutex<HashMap<String, i64>>,
    pub fail_find_or_create: AtomicBool,
    pub fail_bonus: AtomicBool,
    /// Delay inside `find_or_create_client`, to widen race windows.
    pub delay: Option<Duration>,
}

impl FakeCrm {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<CrmCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn client_count(&self) -> usize {
        self.clients.lock().unwrap().len()
    }

    fn fail(detail: &str) -> CrmError {
        CrmError::HttpError {
            provider: "fake".into(),
            status: 502,
            body: detail.into(),
        }
    }
}

#[async_trait]
impl CrmClient for FakeCrm {
    fn name(&self) -> &str {
        "fake"
    }

    async fn find_or_create_client(&self, client: &NewClient) -> loyalink_crm::Result<i64> {
        self.calls.lock().unwrap().push(CrmCall::FindOrCreate {
            name: client.name.clone(),
            phone: client.phone.clone(),
            birthday: client.birthday.clone(),
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_find_or_create.load(Ordering::SeqCst) {
            return Err(Self::fail("create failed"));
        }
        let mut clients = self.clients.lock().unwrap();
        let next = clients.len() as i64 + 1;
        Ok(*clients.entry(client.phone.clone()).or_insert(next))
    }

    async fn grant_bonus(&self, client_id: i64, amount: i64) -> loyalink_crm::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(CrmCall::GrantBonus { client_id, amount });
        if self.fail_bonus.load(Ordering::SeqCst) {
            return Err(Self::fail("bonus failed"));
        }
        Ok(())
    }
}

pub struct TestContext {
    pub temp_dir: TempDir,
    pub state: AppState,
    pub app: axum::Router,
    pub store: Arc<RegistrationStore>,
    pub crm: Arc<FakeCrm>,
}

impl TestContext {
    pub fn registration(&self) -> &RegistrationService {
        &self.state.registration
    }

    pub fn workflow(&self) -> &EnrollmentWorkflow {
        &self.state.workflow
    }

    /// Issues a link and returns its encrypted token part.
    pub async fn issue_encrypted_token(&self) -> String {
        let link = self.registration().issue_link(BASE_URL).await.unwrap();
        link.strip_prefix(BASE_URL).unwrap().to_string()
    }
}

pub async fn build_test_context() -> Result<TestContext> {
    build_test_context_with(Arc::new(FakeCrm::default())).await
}

pub async fn build_test_context_with(crm: Arc<FakeCrm>) -> Result<TestContext> {
    let temp_dir = tempfile::tempdir()?;

    let static_dir = temp_dir.path().join("static");
    std::fs::create_dir_all(static_dir.join("styles"))?;
    std::fs::write(static_dir.join("styles").join("main.css"), "body { color: red; }")?;

    let db_url = format!(
        "sqlite://{}?mode=rwc",
        temp_dir.path().join("registration.db").display()
    );
    let store = Arc::new(RegistrationStore::new(&db_url).await?);
    let codec = Arc::new(TokenCodec::new(&TEST_KEY)?);

    let mut config = ServerConfig::default();
    config.data_dir = temp_dir.path().to_string_lossy().to_string();
    config.base_url = BASE_URL.to_string();
    config.locale = "en".to_string();
    config.crm.token = "test-token".to_string();
    config.http.static_dir = static_dir.to_string_lossy().to_string();

    let registration = Arc::new(RegistrationService::new(store.clone(), codec));
    let workflow = Arc::new(EnrollmentWorkflow::new(
        store.clone(),
        crm.clone(),
        config.crm.bonus_amount,
        config.crm.default_sex,
    ));

    let state = AppState {
        registration,
        workflow,
        start_time: Utc::now(),
        config: Arc::new(config),
    };
    let app = app::build_http_app(state.clone());

    Ok(TestContext {
        temp_dir,
        state,
        app,
        store,
        crm,
    })
}

/// Percent-encodes a form value (`application/x-www-form-urlencoded`).
pub fn form_encode(pairs: &[(&str, &str)]) -> String {
    fn encode(s: &str) -> String {
        s.bytes()
            .map(|b| match b {
                b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                    (b as char).to_string()
                }
                _ => format!("%{b:02X}"),
            })
            .collect()
    }
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

pub async fn get(app: &axum::Router, uri: &str) -> (StatusCode, String, HeaderMap) {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("request should build");
    send(app, req).await
}

pub async fn post_form(
    app: &axum::Router,
    uri: &str,
    pairs: &[(&str, &str)],
) -> (StatusCode, String, HeaderMap) {
    let req = Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .body(Body::from(form_encode(pairs)))
        .expect("request should build");
    send(app, req).await
}

async fn send(app: &axum::Router, req: Request<Body>) -> (StatusCode, String, HeaderMap) {
    let resp = app
        .clone()
        .oneshot(req)
        .await
        .expect("request should succeed");
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    (status, String::from_utf8_lossy(&body).to_string(), headers)
}
