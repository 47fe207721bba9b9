#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{json, Value};
use steve_api::mock::{MockHttp, MockTransport};
use steve_api::{Connection, ConnectionConfig, ConnectionEvent, Transport};
use steve_core::{Method, RequestOpts, ServerMessage, SteveError, WatchDescriptor, WatchFrame};
use steve_socket::SocketEvent;
use steve_store::{SaveOpts, StoreEvent};

const BASE: &str = "https://h/v1";

fn schemas() -> Value {
    json!({
        "revision": "5",
        "data": [
            {
                "id": "pod",
                "type": "schema",
                "attributes": { "namespaced": true },
                "links": { "collection": "/v1/pods" },
                "resourceFields": {
                    "spec": { "type": "podSpec" },
                    "restartPolicy": { "type": "string", "default": "Always" }
                }
            },
            {
                "id": "podSpec",
                "type": "schema",
                "resourceFields": { "replicas": { "type": "int", "default": 1 } }
            },
            {
                "id": "node",
                "type": "schema",
                "links": { "collection": "/v1/nodes" }
            }
        ]
    })
}

fn pod(ns: &str, name: &str, rv: u64) -> Value {
    json!({
        "id": format!("{}/{}", ns, name),
        "type": "pod",
        "metadata": { "name": name, "namespace": ns, "resourceVersion": rv.to_string() },
        "links": { "self": format!("/v1/pods/{}/{}", ns, name) }
    })
}

fn setup_with(config: ConnectionConfig) -> (Arc<Connection>, Arc<MockHttp>, Arc<MockTransport>) {
    let http = MockHttp::new();
    let conn = Connection::new(config, http.clone());
    let transport = MockTransport::new(true);
    conn.attach_transport(transport.clone());
    (conn, http, transport)
}

fn setup() -> (Arc<Connection>, Arc<MockHttp>, Arc<MockTransport>) { setup_with(ConnectionConfig::new(BASE)) }

async fn with_schemas(conn: &Connection, http: &MockHttp) {
    http.respond(Method::Get, "https://h/v1/schemas", 200, schemas());
    conn.load_schemas(false).await.unwrap();
}

fn frame(v: Value) -> ServerMessage { ServerMessage::parse(&v.to_string()).unwrap() }

fn pods_ns() -> WatchDescriptor { WatchDescriptor::new("pod").namespace("ns") }

async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn schema_load_fills_registry_and_watches_from_its_revision() {
    let mut cfg = ConnectionConfig::new(BASE);
    cfg.csrf = Some("tok".into());
    let (conn, http, transport) = setup_with(cfg);
    http.respond(Method::Get, "https://h/v1/schemas", 200, schemas());

    assert_eq!(conn.load_schemas(true).await.unwrap(), 3);
    assert!(conn.schema_for("POD").is_some());
    assert_eq!(conn.store_for("schema").len(), 3);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(serde_json::to_value(&sent[0]).unwrap(), json!({ "resourceType": "schema", "resourceVersion": "5" }));

    let req = &http.requests()[0];
    assert!(req.headers.contains(&("x-api-csrf".to_string(), "tok".to_string())));
    assert!(req.headers.contains(&("accept".to_string(), "application/json".to_string())));
}

#[tokio::test]
async fn equivalent_watches_are_sent_once() {
    let (conn, _http, transport) = setup();
    conn.watch(pods_ns()).unwrap();
    conn.watch(WatchDescriptor::new("Pod").namespace("ns")).unwrap();
    assert_eq!(transport.sent().len(), 1);

    conn.handle_message(frame(json!({ "name": "resource.start", "resourceType": "pod", "namespace": "ns" })));
    assert!(conn.watch_started(&pods_ns()));
    assert_eq!(conn.started().len(), 1);

    conn.watch(pods_ns().revision(9)).unwrap();
    assert_eq!(transport.sent().len(), 1);

    conn.watch(pods_ns().force()).unwrap();
    assert_eq!(transport.sent().len(), 2);
    assert_eq!(conn.started().len(), 1);
}

#[tokio::test]
async fn frames_buffer_until_the_socket_connects() {
    let (conn, _http, transport) = setup();
    transport.set_connected(false);
    conn.watch(pods_ns()).unwrap();
    assert!(transport.sent().is_empty());
    assert_eq!(conn.pending_frames(), 1);

    transport.set_connected(true);
    conn.handle_socket_event(SocketEvent::Connected { tries: 1, after_ms: 3 });
    assert_eq!(transport.sent(), vec![pods_ns().frame()]);
    assert_eq!(conn.pending_frames(), 0);

    conn.handle_socket_event(SocketEvent::Connected { tries: 1, after_ms: 3 });
    assert_eq!(transport.sent().len(), 2, "reconnect re-issues the requested watch only");
}

#[tokio::test]
async fn watch_issued_while_disconnected_is_sent_once_on_reconnect() {
    let (conn, _http, transport) = setup();
    conn.handle_socket_event(SocketEvent::Connected { tries: 1, after_ms: 0 });
    transport.set_connected(false);
    conn.handle_socket_event(SocketEvent::Disconnected);

    conn.watch(pods_ns()).unwrap();
    assert_eq!(conn.pending_frames(), 1);

    transport.set_connected(true);
    conn.handle_socket_event(SocketEvent::Connected { tries: 2, after_ms: 500 });
    assert_eq!(transport.sent(), vec![pods_ns().frame()]);
    assert_eq!(conn.pending_frames(), 0);
}

#[tokio::test]
async fn stop_buffered_while_disconnected_still_goes_out() {
    let (conn, _http, transport) = setup();
    conn.handle_socket_event(SocketEvent::Connected { tries: 1, after_ms: 0 });
    conn.watch(pods_ns()).unwrap();
    transport.take_sent();

    transport.set_connected(false);
    conn.handle_socket_event(SocketEvent::Disconnected);
    conn.unwatch(pods_ns()).unwrap();

    transport.set_connected(true);
    conn.handle_socket_event(SocketEvent::Connected { tries: 2, after_ms: 500 });
    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].stop, Some(true));
}

/// Accepts every frame, whatever it reports about the link.
struct EagerTransport {
    connected: AtomicBool,
    sent: Mutex<Vec<WatchFrame>>,
}

impl Transport for EagerTransport {
    fn send_frame(&self, frame: &WatchFrame) -> bool {
        self.sent.lock().unwrap().push(frame.clone());
        true
    }

    fn is_connected(&self) -> bool { self.connected.load(Ordering::SeqCst) }
}

#[tokio::test]
async fn frames_are_not_handed_to_a_disconnected_transport() {
    let conn = Connection::new(ConnectionConfig::new(BASE), MockHttp::new());
    let transport = Arc::new(EagerTransport { connected: AtomicBool::new(false), sent: Mutex::new(Vec::new()) });
    conn.attach_transport(transport.clone());

    conn.watch(pods_ns()).unwrap();
    assert!(transport.sent.lock().unwrap().is_empty());
    assert_eq!(conn.pending_frames(), 1);

    transport.connected.store(true, Ordering::SeqCst);
    conn.handle_socket_event(SocketEvent::Connected { tries: 1, after_ms: 0 });
    assert_eq!(*transport.sent.lock().unwrap(), vec![pods_ns().frame()]);
    assert_eq!(conn.pending_frames(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_equivalent_watches_send_one_frame() {
    let (conn, _http, transport) = setup();
    conn.handle_socket_event(SocketEvent::Connected { tries: 1, after_ms: 0 });
    let calls: Vec<_> = (0..16)
        .map(|_| {
            let conn = conn.clone();
            tokio::task::spawn_blocking(move || conn.watch(pods_ns()))
        })
        .collect();
    for call in calls {
        call.await.unwrap().unwrap();
    }
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn reconnect_reissues_started_watches_without_revision() {
    let (conn, _http, transport) = setup();
    conn.handle_socket_event(SocketEvent::Connected { tries: 1, after_ms: 0 });
    conn.store_for("pod").load(pod("ns", "a", 7)).unwrap();

    conn.watch(pods_ns()).unwrap();
    let first = transport.take_sent();
    assert_eq!(first[0].resource_version.as_deref(), Some("7"));
    conn.handle_message(frame(json!({ "name": "resource.start", "resourceType": "pod", "namespace": "ns" })));

    let mut events = conn.subscribe_events();
    conn.handle_socket_event(SocketEvent::Disconnected);
    conn.handle_socket_event(SocketEvent::Connected { tries: 2, after_ms: 1000 });
    assert_eq!(transport.take_sent(), vec![pods_ns().frame()]);
    assert_eq!(events.recv().await.unwrap(), ConnectionEvent::SocketDisconnected);
    assert_eq!(events.recv().await.unwrap(), ConnectionEvent::SocketConnected);
}

#[tokio::test]
async fn terminal_errors_gate_watches_until_forced() {
    let (conn, _http, transport) = setup();
    let mut events = conn.subscribe_events();
    conn.watch(pods_ns()).unwrap();
    conn.handle_message(frame(json!({
        "name": "resource.error", "resourceType": "pod", "namespace": "ns", "reason": "watch not allowed"
    })));

    assert!(!conn.can_watch(&pods_ns()));
    assert_eq!(conn.watch_error(&pods_ns()).as_deref(), Some("watch not allowed"));
    match events.recv().await.unwrap() {
        ConnectionEvent::WatchError { key, reason } => {
            assert_eq!(key, pods_ns().key());
            assert_eq!(reason, "watch not allowed");
        }
        other => panic!("unexpected event {:?}", other),
    }

    conn.watch(pods_ns()).unwrap();
    assert_eq!(transport.sent().len(), 1);

    conn.watch(pods_ns().force()).unwrap();
    assert_eq!(transport.sent().len(), 2);
    assert!(conn.can_watch(&pods_ns()));
}

#[tokio::test]
async fn too_old_error_resyncs_then_rewatches_from_the_new_revision() {
    let (conn, http, transport) = setup();
    with_schemas(&conn, &http).await;
    let store = conn.store_for("pod");
    store.load(pod("ns", "a", 10)).unwrap();
    store.load(pod("ns", "b", 11)).unwrap();
    store.load(pod("other", "c", 3)).unwrap();

    conn.watch(pods_ns()).unwrap();
    conn.handle_message(frame(json!({ "name": "resource.start", "resourceType": "pod", "namespace": "ns" })));
    transport.take_sent();

    http.respond(Method::Get, "https://h/v1/pods/ns", 200, json!({ "data": [pod("ns", "a", 12)], "revision": "40" }));
    conn.handle_message(frame(json!({
        "name": "resource.error", "resourceType": "pod", "namespace": "ns",
        "reason": "too old resource version: 11 (38)"
    })));
    settle().await;

    assert_eq!(store.ids(), vec!["ns/a", "other/c"]);
    assert_eq!(store.by_id("ns/a").and_then(|r| r.resource_version()), Some(12));
    let sent = transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].namespace.as_deref(), Some("ns"));
    assert_eq!(sent[0].resource_version.as_deref(), Some("40"));
    assert!(conn.can_watch(&pods_ns()));
}

#[tokio::test]
async fn id_resync_refreshes_or_drops_the_resource() {
    let (conn, http, _transport) = setup();
    with_schemas(&conn, &http).await;
    let store = conn.store_for("pod");
    store.load(pod("ns", "a", 1)).unwrap();
    store.load(pod("ns", "b", 1)).unwrap();

    http.respond(Method::Get, "https://h/v1/pods/ns/a", 200, pod("ns", "a", 9));
    conn.resync_watch(pods_ns().id("a")).await.unwrap();
    assert_eq!(store.by_id("ns/a").and_then(|r| r.resource_version()), Some(9));

    conn.resync_watch(pods_ns().id("b")).await.unwrap();
    assert!(!store.contains("ns/b"));
    assert_eq!(http.count(Method::Get, "https://h/v1/pods/ns/b"), 1);
}

#[tokio::test(start_paused = true)]
async fn unexpected_stop_rewatches_after_the_delay() {
    let (conn, _http, transport) = setup();
    conn.watch(pods_ns()).unwrap();
    conn.handle_message(frame(json!({ "name": "resource.start", "resourceType": "pod", "namespace": "ns" })));
    conn.handle_message(frame(json!({ "name": "resource.stop", "resourceType": "pod", "namespace": "ns" })));
    assert!(!conn.watch_started(&pods_ns()));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(transport.sent().len(), 1);
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn requested_stop_is_not_retried() {
    let (conn, _http, transport) = setup();
    conn.watch(pods_ns()).unwrap();
    conn.handle_message(frame(json!({ "name": "resource.start", "resourceType": "pod", "namespace": "ns" })));
    conn.unwatch(pods_ns()).unwrap();
    conn.handle_message(frame(json!({ "name": "resource.stop", "resourceType": "pod", "namespace": "ns" })));

    tokio::time::sleep(Duration::from_secs(30)).await;
    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].stop, Some(true));
    assert!(conn.started().is_empty());
}

#[tokio::test]
async fn queue_flush_applies_changes_in_order_and_notifies() {
    let (conn, http, _transport) = setup();
    with_schemas(&conn, &http).await;
    let store = conn.store_for("pod");
    let mut events = store.subscribe();

    for msg in [
        json!({ "name": "resource.create", "resourceType": "pod", "data": pod("ns", "a", 1) }),
        json!({ "name": "resource.change", "resourceType": "pod", "data": pod("ns", "a", 2) }),
        json!({ "name": "resource.create", "resourceType": "pod", "data": pod("ns", "b", 3) }),
        json!({ "name": "resource.remove", "resourceType": "pod", "data": pod("ns", "b", 4) }),
    ] {
        conn.handle_socket_event(SocketEvent::Message { raw: msg.to_string() });
    }
    assert!(store.is_empty(), "nothing applies before the flush");

    assert_eq!(conn.flush_queue().await, 4);
    assert_eq!(store.ids(), vec!["ns/a"]);
    assert_eq!(store.by_id("ns/a").and_then(|r| r.resource_version()), Some(2));

    let mut seen = Vec::new();
    while let Ok(ev) = events.try_recv() {
        seen.push(ev);
    }
    assert!(seen.contains(&StoreEvent::Notified { id: "ns/a".into(), event: "created".into() }));
    assert!(seen.contains(&StoreEvent::Notified { id: "ns/a".into(), event: "changed".into() }));
    assert!(seen.contains(&StoreEvent::Notified { id: "ns/b".into(), event: "removed".into() }));
    assert_eq!(conn.flush_queue().await, 0);
}

#[tokio::test]
async fn schema_events_update_the_registry() {
    let (conn, http, transport) = setup();
    with_schemas(&conn, &http).await;
    let secret = json!({ "id": "secret", "type": "schema", "links": { "collection": "/v1/secrets" } });

    conn.handle_message(frame(json!({ "name": "resource.create", "resourceType": "schema", "data": secret })));
    conn.flush_queue().await;
    assert!(conn.schema_for("secret").is_some());
    assert!(conn.store_for("schema").contains("secret"));

    conn.store_for("secret").load(json!({ "id": "s1", "type": "secret" })).unwrap();
    conn.watch(WatchDescriptor::new("secret")).unwrap();
    conn.handle_message(frame(json!({ "name": "resource.start", "resourceType": "secret" })));

    conn.handle_message(frame(json!({ "name": "resource.remove", "resourceType": "schema", "data": secret })));
    conn.flush_queue().await;
    assert!(conn.schema_for("secret").is_none());
    assert!(conn.store_for("secret").is_empty());
    assert_eq!(transport.sent().last().and_then(|f| f.stop), Some(true));
}

#[tokio::test(start_paused = true)]
async fn flush_loop_applies_queued_events_on_its_cadence() {
    let (conn, http, _transport) = setup();
    with_schemas(&conn, &http).await;
    conn.spawn_flush_loop();
    conn.handle_message(frame(json!({ "name": "resource.create", "resourceType": "pod", "data": pod("ns", "a", 1) })));

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(conn.store_for("pod").is_empty());
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(conn.store_for("pod").len(), 1);

    conn.close().await;
}

#[tokio::test]
async fn unauthorized_raises_the_signal_unless_opted_out() {
    let (conn, http, _transport) = setup();
    let mut events = conn.subscribe_events();
    http.respond(Method::Get, "https://h/v1/secrets", 401, json!({ "message": "no" }));
    http.respond(Method::Get, "https://h/v1/secrets", 401, json!({ "message": "no" }));

    let err = conn.request(RequestOpts::get("secrets")).await.unwrap_err();
    assert!(matches!(err, SteveError::Unauthenticated));
    assert_eq!(events.recv().await.unwrap(), ConnectionEvent::Unauthenticated);

    let mut quiet = RequestOpts::get("secrets");
    quiet.redirect_unauthorized = false;
    let err = conn.request(quiet).await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn namespace_restriction_applies_to_namespaced_types_only() {
    let (conn, http, transport) = setup_with(ConnectionConfig::new(BASE).with_namespace("team"));
    with_schemas(&conn, &http).await;

    conn.watch(WatchDescriptor::new("pod")).unwrap();
    conn.watch(WatchDescriptor::new("pod").namespace("other")).unwrap();
    conn.watch(WatchDescriptor::new("node")).unwrap();

    let sent: Vec<WatchFrame> = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].namespace.as_deref(), Some("team"));
    assert_eq!(sent[1].resource_type, "node");
    assert_eq!(sent[1].namespace, None);
}

#[tokio::test]
async fn created_resources_carry_defaults_and_save_into_the_store() {
    let (conn, http, _transport) = setup();
    with_schemas(&conn, &http).await;

    let mut r = conn
        .create("pod", json!({ "metadata": { "namespace": "ns", "name": "web" }, "spec": { "replicas": 3 } }))
        .unwrap();
    assert_eq!(r.data()["type"], "pod");
    assert_eq!(r.data()["restartPolicy"], "Always");
    assert_eq!(r.data()["spec"]["replicas"], 3);
    assert!(r.original().is_none());

    http.respond(Method::Post, "https://h/v1/pods/ns", 201, pod("ns", "web", 1));
    r.save(SaveOpts::default()).await.unwrap();
    assert_eq!(r.id().as_deref(), Some("ns/web"));
    assert!(conn.store_for("pod").contains("ns/web"));

    assert!(matches!(conn.create("nope", json!({})), Err(SteveError::UnknownSchema(_))));
}

#[tokio::test]
async fn overflow_resyncs_every_started_watch() {
    let mut cfg = ConnectionConfig::new(BASE);
    cfg.queue_cap = 2;
    let (conn, http, _transport) = setup_with(cfg);
    with_schemas(&conn, &http).await;
    conn.watch(WatchDescriptor::new("pod")).unwrap();
    conn.handle_message(frame(json!({ "name": "resource.start", "resourceType": "pod" })));

    for (name, rv) in [("a", 1), ("b", 2), ("c", 3)] {
        conn.handle_message(frame(json!({ "name": "resource.create", "resourceType": "pod", "data": pod("ns", name, rv) })));
    }
    http.respond(Method::Get, "https://h/v1/pods", 200, json!({ "data": [pod("ns", "b", 2), pod("ns", "c", 3)], "revision": "50" }));

    assert_eq!(conn.flush_queue().await, 2);
    assert_eq!(http.count(Method::Get, "https://h/v1/pods"), 1);
    let store = conn.store_for("pod");
    assert_eq!(store.ids(), vec!["ns/b", "ns/c"]);
    assert_eq!(store.revision(), Some(50));
}

#[tokio::test]
async fn global_resync_drops_members_missing_from_the_refetch() {
    let (conn, http, _transport) = setup();
    with_schemas(&conn, &http).await;
    let nodes = conn.store_for("node");
    for id in ["1", "2", "3"] {
        nodes.load(json!({ "id": id, "type": "node" })).unwrap();
    }

    http.respond(Method::Get, "https://h/v1/nodes", 200, json!({ "data": [{ "id": "1" }, { "id": "3" }], "revision": "8" }));
    conn.resync_watch(WatchDescriptor::new("node")).await.unwrap();

    assert_eq!(nodes.ids(), vec!["1", "3"]);
    assert!(nodes.have_all());
    assert_eq!(nodes.next_resource_version(None), Some(8));
}
