use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Instant;

use metrics::{counter, histogram};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::{json, Value};
use steve_core::{
    join_id, resource_id, Backend, HttpRequest, HttpResponse, QueueAction, RequestOpts, Schema, ServerMessage,
    SteveError, SteveResult, WatchDescriptor, WatchFrame, WatchKey, SCHEMA_TYPE,
};
use steve_schema::{normalize_type, SchemaRegistry};
use steve_socket::{Socket, SocketEvent};
use steve_store::{Collection, EventQueue, FindOpts, Resource, Scope, TypeStore};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{resolve_url, ConnectionConfig, HttpClient, ReqwestHttp, Transport};

/// Reasons after which a watch is never retried automatically.
const TERMINAL_WATCH_ERRORS: &[&str] = &["watch not allowed", "failed to find schema"];

fn is_too_old(reason: &str) -> bool { reason.contains("too old") || reason.contains("410") }

/// Connection-level notifications for embedding code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionEvent {
    SocketConnected,
    SocketDisconnected,
    SocketError { reason: String },
    Unauthenticated,
    WatchError { key: WatchKey, reason: String },
}

#[derive(Default)]
struct WatchState {
    /// Acknowledged by the server.
    started: BTreeSet<WatchKey>,
    /// Sent but not yet acknowledged.
    requested: BTreeSet<WatchKey>,
    /// Terminal failures by subscribe key.
    in_error: BTreeMap<String, String>,
    /// Stops we asked for; their `resource.stop` is not retried.
    explicit_stops: BTreeSet<WatchKey>,
    pending_frames: Vec<WatchFrame>,
    ever_connected: bool,
}

/// One backend: schema registry, type stores, watch bookkeeping and the
/// event queue feeding the stores.
pub struct Connection {
    config: ConnectionConfig,
    http: Arc<dyn HttpClient>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    socket: Mutex<Option<Arc<Socket>>>,
    schemas: SchemaRegistry,
    stores: Mutex<FxHashMap<String, Arc<TypeStore>>>,
    watches: Mutex<WatchState>,
    queue: Mutex<EventQueue>,
    events: broadcast::Sender<ConnectionEvent>,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    me: Weak<Connection>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> { m.lock().unwrap_or_else(PoisonError::into_inner) }

fn frame_key(f: &WatchFrame) -> WatchKey {
    WatchKey {
        resource_type: f.resource_type.clone(),
        namespace: f.namespace.clone(),
        id: f.id.clone(),
        selector: f.selector.clone(),
    }
}

fn normalize_key(mut key: WatchKey) -> WatchKey {
    key.resource_type = normalize_type(&key.resource_type);
    key
}

impl Connection {
    /// A connection without a socket; attach one with `attach_transport`.
    pub fn new(config: ConnectionConfig, http: Arc<dyn HttpClient>) -> Arc<Self> {
        let (events, _) = broadcast::channel(256);
        let queue = EventQueue::with_capacity(config.queue_cap);
        Arc::new_cyclic(|me| Self {
            config,
            http,
            transport: Mutex::new(None),
            socket: Mutex::new(None),
            schemas: SchemaRegistry::new(),
            stores: Mutex::new(FxHashMap::default()),
            watches: Mutex::new(WatchState::default()),
            queue: Mutex::new(queue),
            events,
            cancel: CancellationToken::new(),
            tasks: Mutex::new(Vec::new()),
            me: me.clone(),
        })
    }

    /// Connect for real: reqwest client, websocket, flush loop, then the schema load.
    pub async fn open(config: ConnectionConfig) -> SteveResult<Arc<Self>> {
        let http: Arc<dyn HttpClient> = Arc::new(ReqwestHttp::new()?);
        let socket = Socket::new(config.socket_config());
        let conn = Connection::new(config, http);
        conn.attach_transport(socket.clone());
        *lock(&conn.socket) = Some(socket.clone());
        conn.spawn_socket_pump(&socket);
        socket.connect(json!({ "purpose": "steve" }));
        conn.spawn_flush_loop();
        conn.load_schemas(true).await?;
        Ok(conn)
    }

    pub fn config(&self) -> &ConnectionConfig { &self.config }
    pub fn schemas(&self) -> &SchemaRegistry { &self.schemas }
    pub fn schema_for(&self, ty: &str) -> Option<Arc<Schema>> { self.schemas.get(ty) }
    pub fn subscribe_events(&self) -> broadcast::Receiver<ConnectionEvent> { self.events.subscribe() }

    pub fn attach_transport(&self, transport: Arc<dyn Transport>) { *lock(&self.transport) = Some(transport); }

    fn emit(&self, ev: ConnectionEvent) { let _ = self.events.send(ev); }

    /// The store for a type, created and wired on first use.
    pub fn store_for(&self, ty: &str) -> Arc<TypeStore> {
        let ty = normalize_type(ty);
        let mut stores = lock(&self.stores);
        if let Some(s) = stores.get(&ty) {
            return Arc::clone(s);
        }
        let store = TypeStore::new(ty.clone(), self.config.store_config());
        let backend: Weak<dyn Backend> = self.me.clone();
        store.configure(backend);
        stores.insert(ty, Arc::clone(&store));
        store
    }

    /// Resolve, decorate and execute. Non-2xx statuses become errors; a 401
    /// also raises `Unauthenticated` unless the caller opted out.
    pub async fn request(&self, opts: RequestOpts) -> SteveResult<HttpResponse> {
        let url = resolve_url(&self.config.base_url, &opts.url)?;
        let mut headers = vec![("accept".to_string(), "application/json".to_string())];
        if let Some(csrf) = &self.config.csrf {
            headers.push(("x-api-csrf".to_string(), csrf.clone()));
        }
        headers.extend(opts.headers);
        let req = HttpRequest { method: opts.method, url: url.clone(), headers, body: opts.body };
        let method = req.method;
        let t0 = Instant::now();
        counter!("steve_http_requests_total", 1u64);
        let res = self.http.execute(req).await;
        let took_ms = t0.elapsed().as_millis();
        histogram!("steve_http_latency_ms", t0.elapsed().as_secs_f64() * 1000.0);
        let resp = match res {
            Ok(r) => r,
            Err(e) => {
                counter!("steve_http_errors_total", 1u64);
                warn!(method = %method, url = %url, error = %e, took_ms = %took_ms, "request failed");
                return Err(e);
            }
        };
        debug!(method = %method, url = %url, status = resp.status, took_ms = %took_ms, "request done");
        if resp.is_success() {
            return Ok(resp);
        }
        counter!("steve_http_errors_total", 1u64);
        if resp.status == 401 && opts.redirect_unauthorized {
            warn!(url = %url, "unauthenticated");
            self.emit(ConnectionEvent::Unauthenticated);
            return Err(SteveError::Unauthenticated);
        }
        let body = match resp.body {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Err(SteveError::Http { status: resp.status, body })
    }

    /// Fetch the schema collection into the registry (and the `schema` store),
    /// optionally watching it for live changes.
    pub async fn load_schemas(&self, watch: bool) -> SteveResult<usize> {
        let t0 = Instant::now();
        let resp = self.request(RequestOpts::get("schemas")).await?;
        let col = Collection::from_body(resp.body)?;
        let n = self.schemas.load_all(&col.data);
        let revision = col.revision;
        self.store_for(SCHEMA_TYPE).load_all(col.data, revision);
        info!(count = n, took_ms = %t0.elapsed().as_millis(), "schemas loaded");
        if watch {
            let mut desc = WatchDescriptor::new(SCHEMA_TYPE);
            desc.revision = revision;
            self.watch(desc)?;
        }
        Ok(n)
    }

    pub async fn find(&self, ty: &str, id: &str, opts: FindOpts) -> SteveResult<Resource> {
        self.store_for(ty).find(id, opts).await
    }

    pub async fn find_all(&self, ty: &str, opts: FindOpts) -> SteveResult<Vec<Resource>> {
        self.store_for(ty).find_all(opts).await
    }

    pub async fn find_namespace(&self, ty: &str, ns: &str, opts: FindOpts) -> SteveResult<Vec<Resource>> {
        self.store_for(ty).find_namespace(ns, opts).await
    }

    pub async fn find_matching(
        &self,
        ty: &str,
        selector: &str,
        namespace: Option<&str>,
        opts: FindOpts,
    ) -> SteveResult<Vec<Resource>> {
        self.store_for(ty).find_matching(selector, namespace, opts).await
    }

    /// An unsaved resource of `ty` with schema defaults filled in.
    pub fn create(&self, ty: &str, partial: Value) -> SteveResult<Resource> {
        let data = self.schemas.populate_defaults(ty, partial)?;
        Ok(Resource::unsaved(self.store_for(ty), data))
    }

    fn is_namespaced(&self, ty: &str) -> bool { self.schemas.get(ty).map_or(false, |s| s.is_namespaced()) }

    /// Subscribe to changes. Equivalent and terminally failed watches are
    /// skipped unless forced; a missing revision is taken from the store.
    pub fn watch(&self, desc: WatchDescriptor) -> SteveResult<()> {
        let mut desc = desc;
        desc.resource_type = normalize_type(&desc.resource_type);
        if let Some(only) = &self.config.namespace {
            if self.is_namespaced(&desc.resource_type) {
                if desc.namespace.is_none() {
                    desc.namespace = Some(only.clone());
                } else if desc.namespace.as_deref() != Some(only.as_str()) {
                    warn!(ty = %desc.resource_type, ns = ?desc.namespace, allowed = %only, "watch outside namespace restriction skipped");
                    return Ok(());
                }
            }
        }
        let key = desc.key();
        if desc.stop {
            desc.revision = None;
        } else if desc.revision.is_none() {
            let id = desc.id.as_deref().map(|id| join_id(desc.namespace.as_deref(), id));
            desc.revision = self.store_for(&desc.resource_type).next_resource_version(id.as_deref());
        }
        {
            let mut w = lock(&self.watches);
            if desc.stop {
                w.requested.remove(&key);
                w.explicit_stops.insert(key.clone());
            } else {
                if !desc.force {
                    if w.started.contains(&key) || w.requested.contains(&key) {
                        debug!(key = %key.subscribe_key(), "already watching");
                        return Ok(());
                    }
                    if let Some(reason) = w.in_error.get(&key.subscribe_key()) {
                        debug!(key = %key.subscribe_key(), reason = %reason, "watch blocked by error");
                        return Ok(());
                    }
                }
                w.requested.insert(key.clone());
                w.explicit_stops.remove(&key);
                if desc.force {
                    w.in_error.remove(&key.subscribe_key());
                }
            }
        }
        info!(key = %key.subscribe_key(), revision = ?desc.revision, stop = desc.stop, "watch");
        self.send_frame(desc.frame());
        Ok(())
    }

    /// Stop a watch; the server's `resource.stop` for it is not retried.
    pub fn unwatch(&self, desc: WatchDescriptor) -> SteveResult<()> {
        let mut desc = desc;
        desc.stop = true;
        self.watch(desc)
    }

    fn send_frame(&self, frame: WatchFrame) {
        let transport = lock(&self.transport).clone().filter(|t| t.is_connected());
        if transport.map_or(false, |t| t.send_frame(&frame)) {
            counter!("steve_watch_frames_sent_total", 1u64);
        } else {
            debug!(ty = %frame.resource_type, "socket not ready; frame buffered");
            lock(&self.watches).pending_frames.push(frame);
        }
    }

    pub fn can_watch(&self, desc: &WatchDescriptor) -> bool {
        let key = normalize_key(desc.key());
        !lock(&self.watches).in_error.contains_key(&key.subscribe_key())
    }

    pub fn watch_started(&self, desc: &WatchDescriptor) -> bool {
        lock(&self.watches).started.contains(&normalize_key(desc.key()))
    }

    pub fn watch_error(&self, desc: &WatchDescriptor) -> Option<String> {
        let key = normalize_key(desc.key());
        lock(&self.watches).in_error.get(&key.subscribe_key()).cloned()
    }

    pub fn started(&self) -> Vec<WatchKey> { lock(&self.watches).started.iter().cloned().collect() }

    pub fn pending_frames(&self) -> usize { lock(&self.watches).pending_frames.len() }

    /// Stop every watch of a type, clear its error gates and empty its store.
    pub fn forget_type(&self, ty: &str) {
        let ty = normalize_type(ty);
        let keys: Vec<WatchKey> = {
            let mut w = lock(&self.watches);
            let prefix = format!("type={},", ty);
            w.in_error.retain(|k, _| !k.starts_with(&prefix));
            w.started.iter().chain(w.requested.iter()).filter(|k| k.resource_type == ty).cloned().collect()
        };
        for key in keys {
            if let Err(e) = self.unwatch(key.descriptor()) {
                warn!(ty = %ty, error = %e, "stop failed");
            }
        }
        if let Some(store) = lock(&self.stores).get(&ty).cloned() {
            store.reset();
        }
        info!(ty = %ty, "type forgotten");
    }

    /// Single entry point for socket lifecycle events and frames.
    pub fn handle_socket_event(&self, ev: SocketEvent) {
        match ev {
            SocketEvent::Connected { tries, after_ms } => {
                info!(tries, after_ms, "watch socket connected");
                self.on_connected();
                self.emit(ConnectionEvent::SocketConnected);
            }
            SocketEvent::Disconnected => {
                info!("watch socket disconnected");
                self.emit(ConnectionEvent::SocketDisconnected);
            }
            SocketEvent::ConnectError { reason } => {
                warn!(reason = %reason, "watch socket failed to connect");
                self.emit(ConnectionEvent::SocketError { reason });
            }
            SocketEvent::Message { raw } => match ServerMessage::parse(&raw) {
                Ok(msg) => self.handle_message(msg),
                Err(e) => warn!(error = %e, "undecodable socket frame"),
            },
            SocketEvent::FrameTimeout => debug!("watch socket frame timeout"),
            SocketEvent::Connecting | SocketEvent::Reconnecting { .. } => {}
        }
    }

    fn on_connected(&self) {
        let (reissue, pending) = {
            let mut w = lock(&self.watches);
            let reconnected = std::mem::replace(&mut w.ever_connected, true);
            let reissue: Vec<WatchKey> = if reconnected {
                w.started.iter().chain(w.requested.iter()).cloned().collect::<BTreeSet<_>>().into_iter().collect()
            } else {
                Vec::new()
            };
            let mut pending = std::mem::take(&mut w.pending_frames);
            pending.retain(|f| f.stop == Some(true) || reissue.binary_search(&frame_key(f)).is_err());
            (reissue, pending)
        };
        if !reissue.is_empty() {
            info!(count = reissue.len(), "re-issuing watches after reconnect");
        }
        for key in reissue {
            self.send_frame(key.descriptor().frame());
        }
        for frame in pending {
            self.send_frame(frame);
        }
    }

    /// Dispatch one decoded server message.
    pub fn handle_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Ping => {}
            ServerMessage::Start(key) => {
                let key = normalize_key(key);
                debug!(key = %key.subscribe_key(), "watch started");
                let mut w = lock(&self.watches);
                w.requested.remove(&key);
                w.in_error.remove(&key.subscribe_key());
                w.started.insert(key);
            }
            ServerMessage::Error { key, reason } => self.on_watch_error(normalize_key(key), reason),
            ServerMessage::Stop(key) => self.on_watch_stop(normalize_key(key)),
            ServerMessage::Create { key, data, .. } => self.enqueue_load(key, data, "created"),
            ServerMessage::Change { key, data, .. } => self.enqueue_load(key, data, "changed"),
            ServerMessage::Remove { key, data, .. } => {
                let ty = normalize_type(&key.resource_type);
                let id = resource_id(&data).or_else(|| key.id.as_deref().map(|id| join_id(key.namespace.as_deref(), id)));
                let Some(id) = id else {
                    warn!(ty = %ty, "remove frame without id");
                    return;
                };
                let mut q = lock(&self.queue);
                if ty == SCHEMA_TYPE {
                    q.push(QueueAction::ForgetType { ty: id.clone() });
                }
                q.push(QueueAction::Remove { ty, id, event: Some("removed".into()) });
            }
        }
    }

    fn enqueue_load(&self, key: WatchKey, data: Value, event: &str) {
        let ty = normalize_type(&key.resource_type);
        lock(&self.queue).push(QueueAction::Load { ty, body: data, event: Some(event.to_string()) });
    }

    fn on_watch_error(&self, key: WatchKey, reason: String) {
        counter!("steve_watch_errors_total", 1u64);
        warn!(key = %key.subscribe_key(), reason = %reason, "watch error");
        {
            let mut w = lock(&self.watches);
            w.started.remove(&key);
            w.requested.remove(&key);
            if TERMINAL_WATCH_ERRORS.iter().any(|t| reason.contains(t)) {
                w.in_error.insert(key.subscribe_key(), reason.clone());
            }
        }
        if is_too_old(&reason) {
            let desc = key.descriptor();
            let me = self.me.clone();
            self.spawn_bg("resync", async move {
                if let Some(conn) = me.upgrade() {
                    conn.resync_and_rewatch(desc).await;
                }
            });
        } else {
            self.emit(ConnectionEvent::WatchError { key, reason });
        }
    }

    fn on_watch_stop(&self, key: WatchKey) {
        let rewatch = {
            let mut w = lock(&self.watches);
            w.started.remove(&key);
            w.requested.remove(&key);
            let asked = w.explicit_stops.remove(&key);
            !asked && !w.in_error.contains_key(&key.subscribe_key())
        };
        if !rewatch {
            debug!(key = %key.subscribe_key(), "watch stopped");
            return;
        }
        let delay = self.config.rewatch_delay;
        info!(key = %key.subscribe_key(), delay_ms = %delay.as_millis(), "watch stopped by server; re-watching");
        let me = self.me.clone();
        self.spawn_bg("rewatch", async move {
            tokio::time::sleep(delay).await;
            if let Some(conn) = me.upgrade() {
                if let Err(e) = conn.watch(key.descriptor()) {
                    warn!(error = %e, "re-watch failed");
                }
            }
        });
    }

    fn spawn_bg<F>(&self, what: &'static str, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    tokio::select! {
                        _ = cancel.cancelled() => {}
                        _ = fut => {}
                    }
                });
            }
            Err(_) => warn!(task = what, "no runtime; background task skipped"),
        }
    }

    /// Apply everything queued, in order. After an overflow every started
    /// watch is resynced.
    pub async fn flush_queue(&self) -> usize {
        let (actions, overflowed) = {
            let mut q = lock(&self.queue);
            (q.drain(), q.take_overflow())
        };
        let n = actions.len();
        for action in actions {
            self.apply(action);
        }
        if n > 0 {
            counter!("steve_queue_flushed_total", n as u64);
            debug!(count = n, "queue flushed");
        }
        if overflowed {
            let keys = self.started();
            warn!(watches = keys.len(), "events were dropped; resyncing");
            for key in keys {
                if let Err(e) = self.resync_watch(key.descriptor()).await {
                    warn!(key = %key.subscribe_key(), error = %e, "resync failed");
                }
            }
        }
        n
    }

    fn apply(&self, action: QueueAction) {
        match action {
            QueueAction::Load { ty, body, event } => {
                if ty == SCHEMA_TYPE {
                    if let Err(e) = self.schemas.upsert(&body) {
                        warn!(error = %e, "schema change ignored");
                    }
                }
                match self.store_for(&ty).load(body) {
                    Ok(r) => {
                        if let Some(ev) = event {
                            r.notify(&ev);
                        }
                    }
                    Err(e) => warn!(ty = %ty, error = %e, "queued load failed"),
                }
            }
            QueueAction::Remove { ty, id, event } => {
                if ty == SCHEMA_TYPE {
                    self.schemas.remove(&id);
                }
                let store = self.store_for(&ty);
                store.remove(&id);
                if let Some(ev) = event {
                    store.notify(&id, &ev);
                }
            }
            QueueAction::ForgetType { ty } => self.forget_type(&ty),
        }
    }

    /// Flush on a fixed cadence; the next tick is scheduled only after the
    /// previous flush finished.
    pub fn spawn_flush_loop(&self) {
        let me = self.me.clone();
        let every = self.config.flush_interval;
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(every) => {}
                }
                let Some(conn) = me.upgrade() else { break };
                conn.flush_queue().await;
            }
            debug!("flush loop stopped");
        });
        lock(&self.tasks).push(handle);
    }

    fn spawn_socket_pump(&self, socket: &Arc<Socket>) {
        let mut rx = socket.subscribe();
        let me = self.me.clone();
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                let ev = tokio::select! {
                    _ = cancel.cancelled() => break,
                    ev = rx.recv() => ev,
                };
                let Some(conn) = me.upgrade() else { break };
                match ev {
                    Ok(ev) => conn.handle_socket_event(ev),
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(lost = n, "socket events lagged");
                        lock(&conn.queue).mark_lost();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        lock(&self.tasks).push(handle);
    }

    /// Refetch what a watch covers. For id watches the single resource is
    /// reloaded (or dropped on 404); otherwise the scope is reloaded and any
    /// cached member missing from the response is removed.
    pub async fn resync_watch(&self, desc: WatchDescriptor) -> SteveResult<()> {
        counter!("steve_resync_total", 1u64);
        let ty = normalize_type(&desc.resource_type);
        let store = self.store_for(&ty);
        if let Some(id) = &desc.id {
            let full = join_id(desc.namespace.as_deref(), id);
            match store.find(&full, FindOpts::default().force().no_watch()).await {
                Ok(_) => {}
                Err(SteveError::Http { status: 404, .. }) => {
                    store.remove(&full);
                }
                Err(e) => return Err(e),
            }
            info!(ty = %ty, id = %full, "resource resynced");
            return Ok(());
        }
        let scope = match (&desc.selector, &desc.namespace) {
            (Some(sel), ns) => Scope::Selector { selector: sel.clone(), namespace: ns.clone() },
            (None, Some(ns)) => Scope::Namespace(ns.clone()),
            (None, None) => Scope::All,
        };
        let col = store.fetch_collection(&scope, &FindOpts::default()).await?;
        let keep: FxHashSet<String> = col.data.iter().filter_map(resource_id).collect();
        let fetched = keep.len();
        store.load_scope(&scope, col);
        let removed = store.prune(&scope, &keep).len();
        info!(ty = %ty, scope = ?scope, fetched, removed, "watch resynced");
        Ok(())
    }

    async fn resync_and_rewatch(&self, desc: WatchDescriptor) {
        if let Err(e) = self.resync_watch(desc.clone()).await {
            warn!(ty = %desc.resource_type, error = %e, "resync failed");
            return;
        }
        let mut again = desc.key().descriptor();
        again.force = true;
        if let Err(e) = self.watch(again) {
            warn!(error = %e, "re-watch after resync failed");
        }
    }

    /// Stop background work and close the socket.
    pub async fn close(&self) {
        self.cancel.cancel();
        let socket = lock(&self.socket).take();
        if let Some(s) = socket {
            s.disconnect().await;
        }
        let tasks: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.tasks));
        for t in tasks {
            let _ = t.await;
        }
        info!("connection closed");
    }
}

#[async_trait::async_trait]
impl Backend for Connection {
    async fn request(&self, opts: RequestOpts) -> SteveResult<HttpResponse> { Connection::request(self, opts).await }

    fn watch(&self, desc: WatchDescriptor) -> SteveResult<()> { Connection::watch(self, desc) }

    fn schema_for(&self, ty: &str) -> Option<Arc<Schema>> { self.schemas.get(ty) }
}
