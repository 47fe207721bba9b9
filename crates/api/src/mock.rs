//! Scripted stand-ins for the HTTP client and the socket.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::FxHashMap;
use serde_json::{json, Value};
use steve_core::{HttpRequest, HttpResponse, Method, SteveResult, WatchFrame};

use crate::{HttpClient, Transport};

/// Responses are queued per method and URL and served in order; unscripted
/// requests get a 404.
#[derive(Default)]
pub struct MockHttp {
    script: Mutex<FxHashMap<(Method, String), VecDeque<HttpResponse>>>,
    log: Mutex<Vec<HttpRequest>>,
}

impl MockHttp {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn respond(&self, method: Method, url: &str, status: u16, body: Value) {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry((method, url.to_string()))
            .or_default()
            .push_back(HttpResponse::new(status, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> { self.log.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    pub fn count(&self, method: Method, url: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method && r.url == url).count()
    }
}

#[async_trait::async_trait]
impl HttpClient for MockHttp {
    async fn execute(&self, req: HttpRequest) -> SteveResult<HttpResponse> {
        let key = (req.method, req.url.clone());
        self.log.lock().unwrap_or_else(PoisonError::into_inner).push(req);
        let next = self.script.lock().unwrap_or_else(PoisonError::into_inner).get_mut(&key).and_then(VecDeque::pop_front);
        Ok(next.unwrap_or_else(|| HttpResponse::new(404, json!({ "message": "no scripted response" }))))
    }
}

/// Records frames while "connected"; refuses them otherwise.
pub struct MockTransport {
    connected: AtomicBool,
    sent: Mutex<Vec<WatchFrame>>,
}

impl MockTransport {
    pub fn new(connected: bool) -> Arc<Self> {
        Arc::new(Self { connected: AtomicBool::new(connected), sent: Mutex::new(Vec::new()) })
    }

    pub fn set_connected(&self, on: bool) { self.connected.store(on, Ordering::SeqCst) }

    pub fn sent(&self) -> Vec<WatchFrame> { self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone() }

    pub fn take_sent(&self) -> Vec<WatchFrame> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl Transport for MockTransport {
    fn send_frame(&self, frame: &WatchFrame) -> bool {
        if !self.is_connected() {
            return false;
        }
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(frame.clone());
        true
    }

    fn is_connected(&self) -> bool { self.connected.load(Ordering::SeqCst) }
}
