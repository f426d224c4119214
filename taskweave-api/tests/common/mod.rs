//! Common test utilities for API tests
//!
//! Every test gets its own router over a fresh in-memory store and a manual
//! clock, so tests run in parallel without a database and can move time.
//!
//! - `TestContext::new()` builds the app
//! - `account` / `admin` create accounts directly in the store
//! - `session_for` mints session cookies without going through login
//! - `send` drives the router with `tower::ServiceExt::oneshot`

#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde_json::Value;
use taskweave_api::{
    app::{build_router, AppState},
    config::Config,
    middleware::session::CookieCarrier,
};
use taskweave_shared::{
    auth::session::SessionCarrier,
    clock::{Clock, ManualClock},
    models::{Account, AccountRole, NewAccount},
};
use tower::ServiceExt;

/// Response as seen by a test
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    /// Raw `Set-Cookie` header values
    pub fn set_cookies(&self) -> Vec<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    /// `name=value` pairs from `Set-Cookie`, usable as a `Cookie` header
    pub fn cookie_header(&self) -> String {
        self.set_cookies()
            .iter()
            .map(|c| c.split(';').next().unwrap().to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Test context containing the app and its collaborators
pub struct TestContext {
    pub app: Router,
    pub state: AppState,
    pub clock: ManualClock,
}

pub fn test_config() -> Config {
    Config::from_vars(|key| {
        let value = match key {
            "DATABASE_URL" => "postgresql://localhost/taskweave_test",
            "JWT_ACCESS_SECRET" => "test-access-secret-at-least-32-bytes",
            "JWT_REFRESH_SECRET" => "test-refresh-secret-at-least-32-bytes",
            _ => return None,
        };
        Some(value.to_string())
    })
    .unwrap()
}

impl TestContext {
    pub fn new() -> Self {
        let clock = ManualClock::new(Utc::now());
        let state = AppState::in_memory(Arc::new(clock.clone()), test_config());

        Self {
            app: build_router(state.clone()),
            state,
            clock,
        }
    }

    /// Creates an active regular account
    pub async fn account(&self, email: &str) -> Account {
        self.create(email, AccountRole::User).await
    }

    /// Creates an active admin account
    pub async fn admin(&self, email: &str) -> Account {
        self.create(email, AccountRole::Admin).await
    }

    async fn create(&self, email: &str, role: AccountRole) -> Account {
        self.state
            .accounts
            .create_account(
                NewAccount {
                    email: email.to_string(),
                    // Never verified; sessions are minted directly.
                    password_hash: "unused".to_string(),
                    role,
                },
                self.clock.now(),
            )
            .await
            .unwrap()
    }

    /// `Cookie` header value for a fresh session of `account`
    pub fn session_for(&self, account: &Account) -> String {
        let mut carrier = CookieCarrier::new(CookieJar::new(), self.state.cookie_policy);
        self.state.guard.establish(account, &mut carrier).unwrap();

        format!(
            "taskweave_access={}; taskweave_refresh={}",
            carrier.access_token().unwrap(),
            carrier.refresh_token().unwrap()
        )
    }

    /// Sends a request, optionally with cookies and a JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        cookies: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookies) = cookies {
            builder = builder.header(header::COOKIE, cookies);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }
}
