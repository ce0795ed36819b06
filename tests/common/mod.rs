//! Shared utilities for integration tests.
#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use resource_server::config::ServerConfig;
use resource_server::http::server::ServerError;
use resource_server::notifications::{Notification, Notifier, NotifyError};
use resource_server::routing::Router;
use resource_server::store::Models;
use resource_server::{api, AppState, HttpServer, Shutdown, ShutdownReport};

pub const PASSWORD: &str = "pa55word!";

/// Defaults tuned for tests: ephemeral port, cheap bcrypt, no rate limit.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.security.password_cost = 4;
    config.rate_limit.enabled = false;
    config.timeouts.shutdown_ms = 2_000;
    config
}

/// Remembers every notification instead of delivering it.
#[derive(Default)]
pub struct CapturingNotifier {
    sent: Mutex<Vec<(String, Notification)>>,
}

impl CapturingNotifier {
    pub fn activation_token_for(&self, email: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, n)| match n {
                Notification::Welcome { activation_token, .. } => activation_token.clone(),
            })
    }
}

#[async_trait]
impl Notifier for CapturingNotifier {
    async fn send(&self, recipient: &str, notification: &Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), notification.clone()));
        Ok(())
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub notifier: Arc<CapturingNotifier>,
    pub client: reqwest::Client,
    shutdown: Shutdown,
    handle: JoinHandle<Result<ShutdownReport, ServerError>>,
}

/// Start the standard API on an ephemeral port.
pub async fn spawn_server(config: ServerConfig) -> TestServer {
    spawn_with_routes(config, |router| router).await
}

/// Start the standard API plus whatever `extend` adds to the routing table.
pub async fn spawn_with_routes<F>(config: ServerConfig, extend: F) -> TestServer
where
    F: FnOnce(Router) -> Router,
{
    let notifier = Arc::new(CapturingNotifier::default());
    let state = AppState::new(config, Models::in_memory()).with_notifier(notifier.clone());
    let server = HttpServer::with_router(extend(api::routes(state.clone())));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestServer {
        addr,
        state,
        notifier,
        client: reqwest::Client::new(),
        shutdown,
        handle,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Trigger shutdown and wait for the drain report.
    pub async fn shutdown(self) -> ShutdownReport {
        self.shutdown.trigger("test");
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
            .unwrap()
    }

    pub fn trigger_shutdown(&self) {
        self.shutdown.trigger("test");
    }

    /// Register `email`, returning the new user's id.
    pub async fn register(&self, email: &str) -> i64 {
        let response = self
            .client
            .post(self.url("/v1/users"))
            .json(&json!({"name": "Test User", "email": email, "password": PASSWORD}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 201);
        let body: Value = response.json().await.unwrap();
        body["user"]["id"].as_i64().unwrap()
    }

    /// Wait for the welcome notification, then activate with its token.
    pub async fn activate(&self, email: &str) {
        let mut token = None;
        for _ in 0..100 {
            token = self.notifier.activation_token_for(email);
            if token.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let token = token.expect("no welcome notification sent");

        let response = self
            .client
            .put(self.url("/v1/users/activated"))
            .json(&json!({ "token": token }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    /// Exchange credentials for a bearer token.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/v1/users/authentication"))
            .json(&json!({"email": email, "password": PASSWORD}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 202);
        let body: Value = response.json().await.unwrap();
        body["authentication_token"]["token"].as_str().unwrap().to_string()
    }

    /// Register, activate and log in; optionally grant extra permissions.
    pub async fn member(&self, email: &str, extra: &[&str]) -> String {
        let id = self.register(email).await;
        self.activate(email).await;
        if !extra.is_empty() {
            self.state.models.permissions.add_for_user(id, extra).await.unwrap();
        }
        self.login(email).await
    }
}
