//! Scripted backend for unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::backend::{Backend, BackendFuture, BackendRequest, BackendResponse, Unreachable};

#[derive(Debug, Clone)]
enum Reply {
    Respond(u16, Vec<u8>),
    Unreachable,
    Panic,
    Hang,
}

/// Records every call and answers from a per-path script.
///
/// Paths without a script answer 404. A held backend parks every call until
/// [`MockBackend::release`] hands out a permit, which keeps actions observably
/// in progress.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendRequest>>,
    replies: Mutex<HashMap<String, Reply>>,
    hold: Option<Arc<Semaphore>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn held() -> Arc<Self> {
        Arc::new(Self {
            hold: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        })
    }

    pub fn respond(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.script(path, Reply::Respond(status, body.into()));
    }

    pub fn respond_json(&self, path: &str, body: serde_json::Value) {
        self.respond(path, 200, body.to_string());
    }

    pub fn unreachable(&self, path: &str) {
        self.script(path, Reply::Unreachable);
    }

    pub fn panic_on(&self, path: &str) {
        self.script(path, Reply::Panic);
    }

    /// Never answer; the call fails once the request's own timeout expires
    pub fn hang(&self, path: &str) {
        self.script(path, Reply::Hang);
    }

    /// Let `n` parked calls answer
    pub fn release(&self, n: usize) {
        if let Some(hold) = &self.hold {
            hold.add_permits(n);
        }
    }

    pub fn calls(&self) -> Vec<BackendRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, path: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| c.path == path).count()
    }

    fn script(&self, path: &str, reply: Reply) {
        self.replies.lock().unwrap().insert(path.to_string(), reply);
    }
}

impl Backend for MockBackend {
    fn call(&self, request: BackendRequest) -> BackendFuture<'_> {
        Box::pin(async move {
            self.calls.lock().unwrap().push(request.clone());

            if let Some(hold) = &self.hold {
                hold.acquire().await.unwrap().forget();
            }

            let reply = self.replies.lock().unwrap().get(&request.path).cloned();
            match reply.unwrap_or(Reply::Respond(404, Vec::new())) {
                Reply::Respond(status, body) => {
                    let response = BackendResponse::new(status, body);
                    if response.is_success() {
                        Ok(response)
                    } else {
                        Err(Unreachable::Status(status))
                    }
                }
                Reply::Unreachable => Err(Unreachable::Connect("connection refused".into())),
                Reply::Panic => panic!("backend blew up on {}", request.path),
                Reply::Hang => {
                    let never = std::future::pending::<Result<BackendResponse, Unreachable>>();
                    match tokio::time::timeout(request.timeout, never).await {
                        Ok(result) => result,
                        Err(_) => Err(Unreachable::Timeout(request.timeout)),
                    }
                }
            }
        })
    }
}

/// Poll `condition` until it holds, failing the test after five seconds
pub async fn eventually(condition: impl Fn() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}
