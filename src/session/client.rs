//! Session-aware API client
//!
//! Every business call goes through [`SessionClient::request`]. A 401 puts
//! the client into recovery: the first caller to see it drives a session
//! refresh, later callers queue behind it, and everyone retries exactly once
//! when the refresh succeeds. When it fails, queued callers get
//! [`FintrackError::AuthFailed`], the driver gets
//! [`FintrackError::SessionExpired`] and the login navigator fires once.
//! If the driver is cancelled mid-refresh, queued callers join the refresh
//! themselves instead of failing.

use super::navigator::LoginNavigator;
use super::refresh::{lock, RefreshCoordinator};
use crate::config::Config;
use crate::error::{FintrackError, FintrackResult};
use crate::http::{ApiRequest, Method, Reply, RequestExecutor, Transport, UreqTransport};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Where the client talks to
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Base URL of business endpoints
    pub api_base: String,
    /// Base URL of `/api/auth/*` endpoints
    pub auth_base: String,
    /// Login page handed to the navigator when the session cannot be renewed
    pub login_url: String,
    /// Per-exchange timeout
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_base: config.api.base_url.clone(),
            auth_base: config.api.auth_base_url.clone(),
            login_url: config.session.login_url.clone(),
            timeout: Duration::from_secs(config.api.timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshOutcome {
    Renewed,
    Failed,
    /// Driver went away before the refresh settled
    Abandoned,
}

/// A request parked while another caller refreshes the session
struct PendingRequest {
    method: Method,
    url: String,
    settle: oneshot::Sender<RefreshOutcome>,
}

#[derive(Default)]
struct AuthGate {
    recovering: bool,
    queue: Vec<PendingRequest>,
}

struct Inner {
    executor: RequestExecutor,
    coordinator: RefreshCoordinator,
    navigator: Arc<dyn LoginNavigator>,
    auth_base: String,
    login_url: String,
    gate: Mutex<AuthGate>,
}

/// Cloneable handle; clones share session state
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

enum Role {
    Driver,
    Queued(oneshot::Receiver<RefreshOutcome>),
}

impl SessionClient {
    pub fn new(
        transport: Arc<dyn Transport>,
        options: ClientOptions,
        navigator: Arc<dyn LoginNavigator>,
    ) -> Self {
        let executor = RequestExecutor::new(transport, &options.api_base, options.timeout);
        let coordinator = RefreshCoordinator::new(executor.clone(), &options.auth_base);

        Self {
            inner: Arc::new(Inner {
                executor,
                coordinator,
                navigator,
                auth_base: options.auth_base.trim_end_matches('/').to_string(),
                login_url: options.login_url,
                gate: Mutex::new(AuthGate::default()),
            }),
        }
    }

    /// Build a client over the ureq transport from configuration
    pub fn from_config(config: &Config, navigator: Arc<dyn LoginNavigator>) -> Self {
        let options = ClientOptions::from_config(config);
        let transport = Arc::new(UreqTransport::new(options.timeout));
        Self::new(transport, options, navigator)
    }

    /// Issue a request, recovering once from an expired session
    pub async fn request(&self, request: ApiRequest) -> FintrackResult<Reply> {
        match self.inner.executor.execute(&request).await {
            Err(e) if e.is_unauthorized() => self.recover(request).await,
            other => other,
        }
    }

    pub async fn get(&self, path: &str) -> FintrackResult<Reply> {
        self.request(ApiRequest::get(path)).await
    }

    pub async fn post(&self, path: &str, body: serde_json::Value) -> FintrackResult<Reply> {
        self.request(ApiRequest::post(path).json(body)).await
    }

    pub async fn put(&self, path: &str, body: serde_json::Value) -> FintrackResult<Reply> {
        self.request(ApiRequest::put(path).json(body)).await
    }

    pub async fn delete(&self, path: &str) -> FintrackResult<Reply> {
        self.request(ApiRequest::delete(path)).await
    }

    /// Current user as reported by the auth service. Not retried on 401.
    pub async fn me(&self) -> FintrackResult<serde_json::Value> {
        let request = ApiRequest::get(self.auth_url("me"));
        self.inner.executor.execute(&request).await?.into_json()
    }

    /// End the server-side session. Not retried on 401.
    pub async fn logout(&self) -> FintrackResult<()> {
        let request = ApiRequest::post(self.auth_url("logout"));
        self.inner.executor.execute(&request).await?;
        info!("Logged out");
        Ok(())
    }

    /// Renew the session directly, sharing any refresh already in flight
    pub async fn refresh_session(&self) -> bool {
        self.inner.coordinator.refresh().await
    }

    /// Requests currently parked behind a session refresh
    pub fn queued_requests(&self) -> usize {
        lock(&self.inner.gate).queue.len()
    }

    /// Whether a 401 recovery is underway
    pub fn is_recovering(&self) -> bool {
        lock(&self.inner.gate).recovering
    }

    fn auth_url(&self, action: &str) -> String {
        format!("{}/api/auth/{}", self.inner.auth_base, action)
    }

    async fn recover(&self, request: ApiRequest) -> FintrackResult<Reply> {
        let role = {
            let mut gate = lock(&self.inner.gate);
            if gate.recovering {
                let (settle, outcome) = oneshot::channel();
                gate.queue.push(PendingRequest {
                    method: request.effective_method(),
                    url: self.inner.executor.url_for(&request.path),
                    settle,
                });
                Role::Queued(outcome)
            } else {
                gate.recovering = true;
                Role::Driver
            }
        };

        match role {
            Role::Queued(outcome) => match outcome.await {
                Ok(RefreshOutcome::Renewed) => self.inner.executor.execute(&request).await,
                Ok(RefreshOutcome::Abandoned) => {
                    debug!("Joining orphaned session refresh for {}", request.path);
                    if self.inner.coordinator.refresh().await {
                        self.inner.executor.execute(&request).await
                    } else {
                        Err(FintrackError::AuthFailed)
                    }
                }
                Ok(RefreshOutcome::Failed) | Err(_) => Err(FintrackError::AuthFailed),
            },
            Role::Driver => {
                debug!("Got 401 for {}, refreshing session", request.path);
                let recovery = Recovery::new(&self.inner.gate);

                if self.inner.coordinator.refresh().await {
                    recovery.settle(RefreshOutcome::Renewed);
                    self.inner.executor.execute(&request).await
                } else {
                    recovery.settle(RefreshOutcome::Failed);
                    self.inner
                        .navigator
                        .redirect_to_login(&self.inner.login_url);
                    Err(FintrackError::SessionExpired)
                }
            }
        }
    }
}

/// Ends a recovery: clears the flag and releases every queued request.
/// Dropping it unsettled (driver cancelled) releases them as `Abandoned`,
/// leaving each to await the still-running refresh on its own.
struct Recovery<'a> {
    gate: &'a Mutex<AuthGate>,
    settled: bool,
}

impl<'a> Recovery<'a> {
    fn new(gate: &'a Mutex<AuthGate>) -> Self {
        Self {
            gate,
            settled: false,
        }
    }

    fn settle(mut self, outcome: RefreshOutcome) {
        self.settled = true;
        drain(self.gate, outcome);
    }
}

impl Drop for Recovery<'_> {
    fn drop(&mut self) {
        if !self.settled {
            warn!("Session recovery driver cancelled, handing refresh to queued requests");
            drain(self.gate, RefreshOutcome::Abandoned);
        }
    }
}

fn drain(gate: &Mutex<AuthGate>, outcome: RefreshOutcome) {
    let queue = {
        let mut gate = lock(gate);
        gate.recovering = false;
        std::mem::take(&mut gate.queue)
    };

    if !queue.is_empty() {
        debug!("Releasing {} queued request(s): {:?}", queue.len(), outcome);
    }
    for pending in queue {
        if pending.settle.send(outcome).is_err() {
            debug!("Caller for {} {} went away", pending.method, pending.url);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::{wait_until, MockReply, MockTransport};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const REFRESH: &str = "/api/auth/refresh";

    struct Harness {
        transport: Arc<MockTransport>,
        client: SessionClient,
        redirects: Arc<AtomicUsize>,
    }

    fn harness() -> Harness {
        let transport = Arc::new(MockTransport::new());
        let redirects = Arc::new(AtomicUsize::new(0));
        let counter = redirects.clone();
        let navigator = move |url: &str| {
            assert_eq!(url, "http://app.test/login");
            counter.fetch_add(1, Ordering::SeqCst);
        };
        let options = ClientOptions {
            api_base: "http://api.test/api".to_string(),
            auth_base: "http://auth.test".to_string(),
            login_url: "http://app.test/login".to_string(),
            timeout: Duration::from_secs(5),
        };
        let client = SessionClient::new(transport.clone(), options, Arc::new(navigator));
        Harness {
            transport,
            client,
            redirects,
        }
    }

    fn spawn_get(
        client: &SessionClient,
        path: &'static str,
    ) -> tokio::task::JoinHandle<FintrackResult<Reply>> {
        let client = client.clone();
        tokio::spawn(async move { client.get(path).await })
    }

    #[tokio::test]
    async fn success_passes_through() {
        let h = harness();
        h.transport
            .reply(Method::Get, "/api/expenses", MockReply::json(200, json!([1, 2])));

        let reply = h.client.get("/expenses").await.unwrap();
        assert_eq!(reply, Reply::Json(json!([1, 2])));
        assert_eq!(h.transport.count(Method::Post, REFRESH), 0);
    }

    #[tokio::test]
    async fn non_auth_errors_are_not_intercepted() {
        let h = harness();
        h.transport
            .reply(Method::Get, "/api/expenses", MockReply::text(500, "db down"));

        let err = h.client.get("/expenses").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(h.transport.count(Method::Post, REFRESH), 0);
    }

    #[tokio::test]
    async fn concurrent_401s_share_one_refresh_and_all_retry() {
        let h = harness();
        let gate = h.transport.hold(Method::Post, REFRESH);
        h.transport.reply(Method::Post, REFRESH, MockReply::empty(200));
        for path in ["/api/a", "/api/b", "/api/c"] {
            h.transport.reply(Method::Get, path, MockReply::empty(401));
            h.transport
                .reply(Method::Get, path, MockReply::json(200, json!({ "path": path })));
        }

        let a = spawn_get(&h.client, "/a");
        let b = spawn_get(&h.client, "/b");
        let c = spawn_get(&h.client, "/c");
        wait_until(|| h.client.queued_requests() == 2).await;
        assert!(h.client.is_recovering());
        gate.add_permits(1);

        assert_eq!(a.await.unwrap().unwrap(), Reply::Json(json!({"path": "/api/a"})));
        assert_eq!(b.await.unwrap().unwrap(), Reply::Json(json!({"path": "/api/b"})));
        assert_eq!(c.await.unwrap().unwrap(), Reply::Json(json!({"path": "/api/c"})));

        assert_eq!(h.transport.count(Method::Post, REFRESH), 1);
        for path in ["/api/a", "/api/b", "/api/c"] {
            assert_eq!(h.transport.count(Method::Get, path), 2);
        }
        assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
        assert!(!h.client.is_recovering());
    }

    #[tokio::test]
    async fn queued_replay_fails_independently() {
        let h = harness();
        let gate = h.transport.hold(Method::Post, REFRESH);
        h.transport.reply(Method::Post, REFRESH, MockReply::empty(200));
        h.transport.reply(Method::Get, "/api/ok", MockReply::empty(401));
        h.transport
            .reply(Method::Get, "/api/ok", MockReply::json(200, json!(true)));
        h.transport.reply(Method::Get, "/api/broken", MockReply::empty(401));
        h.transport
            .reply(Method::Get, "/api/broken", MockReply::text(500, "boom"));

        let ok = spawn_get(&h.client, "/ok");
        wait_until(|| h.client.is_recovering()).await;
        let broken = spawn_get(&h.client, "/broken");
        wait_until(|| h.client.queued_requests() == 1).await;
        gate.add_permits(1);

        assert_eq!(ok.await.unwrap().unwrap(), Reply::Json(json!(true)));
        let err = broken.await.unwrap().unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert_eq!(h.transport.count(Method::Get, "/api/broken"), 2);
    }

    #[tokio::test]
    async fn failed_refresh_rejects_all_and_redirects_once() {
        let h = harness();
        let gate = h.transport.hold(Method::Post, REFRESH);
        h.transport
            .reply(Method::Post, REFRESH, MockReply::network("connection reset"));
        for path in ["/api/a", "/api/b", "/api/c"] {
            h.transport.reply(Method::Get, path, MockReply::empty(401));
        }

        let a = spawn_get(&h.client, "/a");
        let b = spawn_get(&h.client, "/b");
        let c = spawn_get(&h.client, "/c");
        wait_until(|| h.client.queued_requests() == 2).await;
        gate.add_permits(1);

        let results = [
            a.await.unwrap().unwrap_err(),
            b.await.unwrap().unwrap_err(),
            c.await.unwrap().unwrap_err(),
        ];
        assert!(results.iter().all(FintrackError::is_auth_failure));
        let expired = results
            .iter()
            .filter(|e| matches!(e, FintrackError::SessionExpired))
            .count();
        let failed = results
            .iter()
            .filter(|e| e.to_string() == "Authentication failed")
            .count();
        assert_eq!(expired, 1);
        assert_eq!(failed, 2);

        assert_eq!(h.redirects.load(Ordering::SeqCst), 1);
        assert_eq!(h.transport.count(Method::Post, REFRESH), 1);
        for path in ["/api/a", "/api/b", "/api/c"] {
            assert_eq!(h.transport.count(Method::Get, path), 1);
        }
    }

    #[tokio::test]
    async fn second_401_after_refresh_is_an_http_error() {
        let h = harness();
        h.transport.reply(Method::Post, REFRESH, MockReply::empty(200));
        h.transport
            .reply(Method::Get, "/api/expenses", MockReply::empty(401));

        let err = h.client.get("/expenses").await.unwrap_err();
        assert!(err.is_unauthorized());
        assert!(matches!(err, FintrackError::Http { status: 401, .. }));
        assert_eq!(h.transport.count(Method::Post, REFRESH), 1);
        assert_eq!(h.transport.count(Method::Get, "/api/expenses"), 2);
        assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn retry_replays_method_and_body() {
        let h = harness();
        h.transport.reply(Method::Post, REFRESH, MockReply::empty(200));
        h.transport
            .reply(Method::Post, "/api/expenses", MockReply::empty(401));
        h.transport
            .reply(Method::Post, "/api/expenses", MockReply::json(201, json!({"id": 9})));

        let reply = h
            .client
            .post("/expenses", json!({"amount": 40}))
            .await
            .unwrap();
        assert_eq!(reply, Reply::Json(json!({"id": 9})));

        let sent: Vec<_> = h
            .transport
            .requests()
            .into_iter()
            .filter(|r| r.url.ends_with("/api/expenses"))
            .collect();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].body, sent[1].body);
    }

    #[tokio::test]
    async fn later_expiry_starts_a_fresh_refresh() {
        let h = harness();
        h.transport.reply(Method::Post, REFRESH, MockReply::empty(200));
        h.transport.reply(Method::Get, "/api/me-data", MockReply::empty(401));
        h.transport
            .reply(Method::Get, "/api/me-data", MockReply::json(200, json!(1)));
        h.transport.reply(Method::Get, "/api/me-data", MockReply::empty(401));
        h.transport
            .reply(Method::Get, "/api/me-data", MockReply::json(200, json!(2)));

        assert_eq!(h.client.get("/me-data").await.unwrap(), Reply::Json(json!(1)));
        assert_eq!(h.client.get("/me-data").await.unwrap(), Reply::Json(json!(2)));
        assert_eq!(h.transport.count(Method::Post, REFRESH), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_driver_hands_refresh_to_queue() {
        let h = harness();
        let gate = h.transport.hold(Method::Post, REFRESH);
        h.transport.reply(Method::Post, REFRESH, MockReply::empty(200));
        h.transport.reply(Method::Get, "/api/a", MockReply::empty(401));
        h.transport.reply(Method::Get, "/api/b", MockReply::empty(401));
        h.transport
            .reply(Method::Get, "/api/b", MockReply::json(200, json!("b")));

        let client = h.client.clone();
        let driver = tokio::spawn(async move {
            tokio::time::timeout(Duration::from_millis(50), client.get("/a")).await
        });
        wait_until(|| h.client.is_recovering()).await;
        let queued = spawn_get(&h.client, "/b");
        wait_until(|| h.client.queued_requests() == 1).await;

        assert!(driver.await.unwrap().is_err());
        assert!(!h.client.is_recovering());
        gate.add_permits(1);

        assert_eq!(queued.await.unwrap().unwrap(), Reply::Json(json!("b")));
        assert_eq!(h.transport.count(Method::Post, REFRESH), 1);
        assert_eq!(h.transport.count(Method::Get, "/api/a"), 1);
        assert_eq!(h.transport.count(Method::Get, "/api/b"), 2);
        assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancelled_driver_with_failed_refresh_rejects_queue() {
        let h = harness();
        let gate = h.transport.hold(Method::Post, REFRESH);
        h.transport.reply(Method::Post, REFRESH, MockReply::empty(401));
        h.transport.reply(Method::Get, "/api/a", MockReply::empty(401));
        h.transport.reply(Method::Get, "/api/b", MockReply::empty(401));

        let driver = spawn_get(&h.client, "/a");
        wait_until(|| h.client.is_recovering()).await;
        let queued = spawn_get(&h.client, "/b");
        wait_until(|| h.client.queued_requests() == 1).await;

        driver.abort();
        let _ = driver.await;
        assert!(!h.client.is_recovering());
        gate.add_permits(1);

        let err = queued.await.unwrap().unwrap_err();
        assert!(matches!(err, FintrackError::AuthFailed));
        assert_eq!(h.transport.count(Method::Post, REFRESH), 1);
        assert_eq!(h.transport.count(Method::Get, "/api/b"), 1);
        assert_eq!(h.redirects.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn session_endpoints_use_auth_base_without_retry() {
        let h = harness();
        h.transport.reply(
            Method::Get,
            "/api/auth/me",
            MockReply::json(200, json!({"id": "user-42"})),
        );
        h.transport
            .reply(Method::Post, "/api/auth/logout", MockReply::empty(401));

        let me = h.client.me().await.unwrap();
        assert_eq!(me["id"], "user-42");
        assert_eq!(h.transport.requests()[0].url, "http://auth.test/api/auth/me");

        let err = h.client.logout().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(h.transport.count(Method::Post, REFRESH), 0);
    }
}
