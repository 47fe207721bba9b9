use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use once_cell::sync::OnceCell;
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use steve_core::{
    lookup, resource_id, resource_version, split_id, Backend, RequestOpts, Revision, Schema, SteveError,
    SteveResult, WatchDescriptor,
};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::find::{collection_url, namespace_of};
use crate::resource::state_of;
use crate::{Collection, FindOpts, LabelSelector, Resource, Scope, StoreConfig};

/// Change notifications raised by a type store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    Loaded { id: String },
    Removed { id: String },
    Notified { id: String, event: String },
    Reset,
}

#[derive(Default)]
struct Cache {
    list: Vec<String>,
    map: FxHashMap<String, Value>,
    have_all: bool,
    have_namespace: BTreeSet<String>,
    have_selector: BTreeSet<String>,
    /// Highest revision seen; 0 when none.
    revision: Revision,
    generation: u64,
    sort_fields: Vec<String>,
    sort_pending: bool,
    polling: FxHashSet<String>,
}

/// Client-side cache for one resource type.
///
/// `list` keeps insertion (or sort) order and `map` holds the data by id; the
/// two always describe the same set. All writes go through `load*`/`remove`.
pub struct TypeStore {
    ty: String,
    config: StoreConfig,
    backend: OnceCell<Weak<dyn Backend>>,
    cache: Mutex<Cache>,
    generation: watch::Sender<u64>,
    events: broadcast::Sender<StoreEvent>,
}

fn cmp_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().partial_cmp(&y.as_f64()).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn sort_list(c: &mut Cache) {
    let Cache { list, map, sort_fields, .. } = c;
    if sort_fields.is_empty() {
        return;
    }
    list.sort_by(|a, b| {
        let (ra, rb) = (map.get(a), map.get(b));
        sort_fields
            .iter()
            .map(|f| cmp_values(ra.and_then(|r| lookup(r, f)), rb.and_then(|r| lookup(r, f))))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

impl TypeStore {
    pub fn new(ty: impl Into<String>, config: StoreConfig) -> Arc<Self> {
        let (generation, _) = watch::channel(0u64);
        let (events, _) = broadcast::channel(1024);
        Arc::new(Self {
            ty: ty.into(),
            config,
            backend: OnceCell::new(),
            cache: Mutex::new(Cache::default()),
            generation,
            events,
        })
    }

    /// Wire the store to its connection. Only the first call takes effect.
    pub fn configure(&self, backend: Weak<dyn Backend>) {
        if self.backend.set(backend).is_err() {
            debug!(ty = %self.ty, "type store already configured");
        }
    }

    pub fn ty(&self) -> &str { &self.ty }
    pub fn config(&self) -> &StoreConfig { &self.config }

    fn lock(&self) -> MutexGuard<'_, Cache> { self.cache.lock().unwrap_or_else(PoisonError::into_inner) }

    pub(crate) fn backend(&self) -> SteveResult<Arc<dyn Backend>> {
        self.backend.get().and_then(Weak::upgrade).ok_or(SteveError::ConnectionClosed)
    }

    pub fn schema(&self) -> SteveResult<Arc<Schema>> {
        self.backend()?.schema_for(&self.ty).ok_or_else(|| SteveError::UnknownSchema(self.ty.clone()))
    }

    pub fn generation(&self) -> u64 { self.lock().generation }
    pub fn subscribe_generation(&self) -> watch::Receiver<u64> { self.generation.subscribe() }
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> { self.events.subscribe() }

    pub fn len(&self) -> usize { self.lock().list.len() }
    pub fn is_empty(&self) -> bool { self.lock().list.is_empty() }
    pub fn ids(&self) -> Vec<String> { self.lock().list.clone() }
    pub fn contains(&self, id: &str) -> bool { self.lock().map.contains_key(id) }

    pub fn have_all(&self) -> bool { self.lock().have_all }
    pub fn have_namespace(&self, ns: &str) -> bool {
        let c = self.lock();
        c.have_all || c.have_namespace.contains(ns)
    }
    pub fn have_selector(&self, selector: &str, namespace: Option<&str>) -> bool {
        let key = Scope::Selector { selector: selector.to_string(), namespace: namespace.map(str::to_string) }.flag_key();
        let c = self.lock();
        c.have_all || c.have_selector.contains(&key)
    }

    /// Highest revision recorded by a load; `None` before anything was loaded.
    pub fn revision(&self) -> Option<Revision> { Some(self.lock().revision).filter(|r| *r > 0) }

    pub fn by_id(self: &Arc<Self>, id: &str) -> Option<Resource> {
        let data = self.lock().map.get(id).cloned()?;
        Some(Resource::new(Arc::clone(self), data))
    }

    /// Cached members in list order.
    pub fn all(self: &Arc<Self>) -> Vec<Resource> { self.select(|_| true) }

    pub fn in_namespace(self: &Arc<Self>, ns: &str) -> Vec<Resource> {
        self.select(|raw| namespace_of(raw).as_deref() == Some(ns))
    }

    pub fn matching(self: &Arc<Self>, selector: &str, namespace: Option<&str>) -> SteveResult<Vec<Resource>> {
        let sel = LabelSelector::parse(selector)?;
        Ok(self.select(|raw| {
            namespace.map_or(true, |ns| namespace_of(raw).as_deref() == Some(ns)) && sel.matches_resource(raw)
        }))
    }

    fn select(self: &Arc<Self>, keep: impl Fn(&Value) -> bool) -> Vec<Resource> {
        let picked: Vec<Value> = {
            let c = self.lock();
            c.list.iter().filter_map(|id| c.map.get(id)).filter(|raw| keep(raw)).cloned().collect()
        };
        picked.into_iter().map(|d| Resource::new(Arc::clone(self), d)).collect()
    }

    fn bump(&self, c: &mut Cache) -> u64 {
        c.generation += 1;
        c.generation
    }

    fn publish(&self, generation: u64, events: Vec<StoreEvent>) {
        self.generation.send_if_modified(|g| {
            let newer = generation > *g;
            if newer {
                *g = generation;
            }
            newer
        });
        for ev in events {
            let _ = self.events.send(ev);
        }
    }

    /// Upsert one member into the locked cache; returns its id.
    fn upsert(self: &Arc<Self>, c: &mut Cache, raw: Value) -> SteveResult<String> {
        let id = resource_id(&raw)
            .ok_or_else(|| SteveError::Validation(format!("{} resource without id", self.ty)))?;
        if let Some(rv) = resource_version(&raw) {
            c.revision = c.revision.max(rv);
        }
        let st = state_of(&raw);
        match c.map.get_mut(&id) {
            Some(slot) => *slot = raw,
            None => {
                c.list.push(id.clone());
                c.map.insert(id.clone(), raw);
            }
        }
        if st.transitioning || st.error {
            self.arm_poll(c, &id);
        }
        Ok(id)
    }

    /// Upsert by id, keeping list position for existing members.
    pub fn load(self: &Arc<Self>, raw: Value) -> SteveResult<Resource> {
        let (id, gen) = {
            let mut c = self.lock();
            let id = self.upsert(&mut c, raw)?;
            self.schedule_sort(&mut c);
            (id, self.bump(&mut c))
        };
        self.publish(gen, vec![StoreEvent::Loaded { id: id.clone() }]);
        self.by_id(&id).ok_or_else(|| SteveError::Internal(format!("{} {} vanished after load", self.ty, id)))
    }

    fn load_batch(
        self: &Arc<Self>,
        data: Vec<Value>,
        revision: Option<Revision>,
        replace: impl Fn(&Value) -> bool,
        mark: impl FnOnce(&mut Cache),
    ) -> Vec<Resource> {
        let (ids, gen, events) = {
            let mut guard = self.lock();
            let c = &mut *guard;
            let mut ids = Vec::with_capacity(data.len());
            for raw in data {
                match self.upsert(c, raw) {
                    Ok(id) => ids.push(id),
                    Err(e) => warn!(ty = %self.ty, error = %e, "skipping collection member"),
                }
            }
            let fresh: FxHashSet<&String> = ids.iter().collect();
            let stale: Vec<String> = c
                .list
                .iter()
                .filter(|id| !fresh.contains(id) && c.map.get(*id).map_or(false, &replace))
                .cloned()
                .collect();
            for id in &stale {
                c.map.remove(id);
            }
            if !stale.is_empty() {
                c.list.retain(|id| c.map.contains_key(id));
            }
            if let Some(r) = revision {
                c.revision = c.revision.max(r);
            }
            mark(&mut *c);
            self.schedule_sort(c);
            let mut events: Vec<StoreEvent> = stale.into_iter().map(|id| StoreEvent::Removed { id }).collect();
            events.extend(ids.iter().map(|id| StoreEvent::Loaded { id: id.clone() }));
            (ids, self.bump(c), events)
        };
        debug!(ty = %self.ty, count = ids.len(), "collection loaded");
        self.publish(gen, events);
        ids.iter().filter_map(|id| self.by_id(id)).collect()
    }

    /// Authoritative load of the whole type: members missing from `data` are dropped.
    pub fn load_all(self: &Arc<Self>, data: Vec<Value>, revision: Option<Revision>) -> Vec<Resource> {
        self.load_batch(data, revision, |_| true, |c| c.have_all = true)
    }

    /// Authoritative load of one namespace.
    pub fn load_namespace(self: &Arc<Self>, ns: &str, data: Vec<Value>, revision: Option<Revision>) -> Vec<Resource> {
        let owned = ns.to_string();
        self.load_batch(
            data,
            revision,
            |raw| namespace_of(raw).as_deref() == Some(ns),
            move |c| {
                c.have_namespace.insert(owned);
            },
        )
    }

    /// Upsert a selector page; nothing is dropped.
    pub fn load_selector(
        self: &Arc<Self>,
        selector: &str,
        namespace: Option<&str>,
        data: Vec<Value>,
        revision: Option<Revision>,
    ) -> Vec<Resource> {
        let key = Scope::Selector { selector: selector.to_string(), namespace: namespace.map(str::to_string) }.flag_key();
        self.load_batch(data, revision, |_| false, move |c| {
            c.have_selector.insert(key);
        })
    }

    /// Load a page into its scope without marking completeness.
    pub fn load_page(self: &Arc<Self>, data: Vec<Value>, revision: Option<Revision>) -> Vec<Resource> {
        self.load_batch(data, revision, |_| false, |_| {})
    }

    pub fn load_scope(self: &Arc<Self>, scope: &Scope, col: Collection) -> Vec<Resource> {
        match scope {
            Scope::All => self.load_all(col.data, col.revision),
            Scope::Namespace(ns) => self.load_namespace(ns, col.data, col.revision),
            Scope::Selector { selector, namespace } => {
                self.load_selector(selector, namespace.as_deref(), col.data, col.revision)
            }
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let gen = {
            let mut c = self.lock();
            if c.map.remove(id).is_none() {
                return false;
            }
            c.list.retain(|x| x != id);
            self.bump(&mut c)
        };
        self.publish(gen, vec![StoreEvent::Removed { id: id.to_string() }]);
        true
    }

    /// Drop cached members of `scope` whose ids are not in `keep`.
    pub fn prune(&self, scope: &Scope, keep: &FxHashSet<String>) -> Vec<String> {
        let (gone, gen) = {
            let mut guard = self.lock();
            let c = &mut *guard;
            let gone: Vec<String> = c
                .list
                .iter()
                .filter(|id| !keep.contains(*id) && c.map.get(*id).map_or(false, |raw| scope.contains(raw)))
                .cloned()
                .collect();
            if gone.is_empty() {
                return gone;
            }
            for id in &gone {
                c.map.remove(id);
            }
            c.list.retain(|id| c.map.contains_key(id));
            (gone, self.bump(c))
        };
        info!(ty = %self.ty, removed = gone.len(), "pruned members missing from refetch");
        self.publish(gen, gone.iter().map(|id| StoreEvent::Removed { id: id.clone() }).collect());
        gone
    }

    /// Resume point for a watch: the member's own revision when given, else
    /// the max of the watermark and every cached member.
    pub fn next_resource_version(&self, id: Option<&str>) -> Option<Revision> {
        let c = self.lock();
        if let Some(rv) = id.and_then(|id| c.map.get(id)).and_then(resource_version) {
            return Some(rv);
        }
        c.map.values().filter_map(resource_version).chain(Some(c.revision)).max().filter(|r| *r > 0)
    }

    /// Forget everything cached for this type.
    pub fn reset(&self) {
        let gen = {
            let mut c = self.lock();
            let sort_fields = std::mem::take(&mut c.sort_fields);
            let generation = c.generation;
            *c = Cache { sort_fields, generation, ..Cache::default() };
            self.bump(&mut c)
        };
        info!(ty = %self.ty, "type store reset");
        self.publish(gen, vec![StoreEvent::Reset]);
    }

    pub fn notify(&self, id: &str, event: &str) {
        let _ = self.events.send(StoreEvent::Notified { id: id.to_string(), event: event.to_string() });
    }

    /// Order members by these dot paths, compared left to right.
    pub fn set_sort_fields(&self, fields: Vec<String>) {
        let mut c = self.lock();
        c.sort_fields = fields;
        sort_list(&mut c);
    }

    fn schedule_sort(self: &Arc<Self>, c: &mut Cache) {
        if c.sort_fields.is_empty() || c.sort_pending {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                c.sort_pending = true;
                let weak = Arc::downgrade(self);
                let delay = self.config.sort_debounce;
                rt.spawn(async move {
                    tokio::time::sleep(delay).await;
                    if let Some(store) = weak.upgrade() {
                        let mut c = store.lock();
                        c.sort_pending = false;
                        sort_list(&mut c);
                    }
                });
            }
            Err(_) => sort_list(c),
        }
    }

    /// Refresh a transitioning or errored member until it settles or disappears.
    fn arm_poll(self: &Arc<Self>, c: &mut Cache, id: &str) {
        if c.polling.contains(id) {
            return;
        }
        let Ok(rt) = tokio::runtime::Handle::try_current() else { return };
        c.polling.insert(id.to_string());
        let weak = Arc::downgrade(self);
        let id = id.to_string();
        let every = self.config.poll_interval;
        rt.spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let Some(store) = weak.upgrade() else { return };
                let settled = store.lock().map.get(&id).map_or(true, |raw| {
                    let st = state_of(raw);
                    !(st.transitioning || st.error)
                });
                if settled {
                    break;
                }
                debug!(ty = %store.ty, id = %id, "polling unsettled resource");
                match store.find(&id, FindOpts::default().force().no_watch()).await {
                    Ok(_) => {}
                    Err(SteveError::ConnectionClosed) => break,
                    Err(e) => debug!(ty = %store.ty, id = %id, error = %e, "poll refresh failed"),
                }
            }
            if let Some(store) = weak.upgrade() {
                store.lock().polling.remove(&id);
            }
        });
    }

    fn collection_base(&self) -> SteveResult<(String, bool)> {
        let schema = self.schema()?;
        let base = schema.collection_link().ok_or_else(|| SteveError::UnknownLink("collection".into()))?;
        Ok((base.to_string(), schema.is_namespaced()))
    }

    /// GET one collection page without touching the cache.
    pub async fn fetch_collection(&self, scope: &Scope, opts: &FindOpts) -> SteveResult<Collection> {
        let backend = self.backend()?;
        let (base, namespaced) = self.collection_base()?;
        let url = collection_url(&base, namespaced, scope, opts);
        let resp = backend.request(RequestOpts::get(url)).await?;
        Collection::from_body(resp.body)
    }

    fn watch_scope(&self, scope: &Scope, revision: Option<Revision>) {
        let mut desc = WatchDescriptor::new(self.ty.clone());
        match scope {
            Scope::All => {}
            Scope::Namespace(ns) => desc = desc.namespace(ns.clone()),
            Scope::Selector { selector, namespace } => {
                desc = desc.selector(selector.clone());
                if let Some(ns) = namespace {
                    desc = desc.namespace(ns.clone());
                }
            }
        }
        desc.revision = revision;
        self.send_watch(desc);
    }

    fn send_watch(&self, desc: WatchDescriptor) {
        match self.backend() {
            Ok(b) => {
                if let Err(e) = b.watch(desc) {
                    warn!(ty = %self.ty, error = %e, "watch failed");
                }
            }
            Err(e) => debug!(ty = %self.ty, error = %e, "watch skipped"),
        }
    }

    /// Cached member, else GET `{collection}/{id}` and load it.
    pub async fn find(self: &Arc<Self>, id: &str, opts: FindOpts) -> SteveResult<Resource> {
        if !opts.force {
            if let Some(r) = self.by_id(id) {
                return Ok(r);
            }
        }
        let backend = self.backend()?;
        let (base, _) = self.collection_base()?;
        let url = format!("{}/{}", base.trim_end_matches('/'), id);
        let resp = backend.request(RequestOpts::get(url)).await?;
        let res = self.load(resp.body)?;
        if opts.watch {
            let (ns, name) = split_id(id);
            let mut desc = WatchDescriptor::new(self.ty.clone()).id(name);
            if let Some(ns) = ns {
                desc = desc.namespace(ns);
            }
            desc.revision = res.resource_version();
            self.send_watch(desc);
        }
        Ok(res)
    }

    async fn find_scope(self: &Arc<Self>, scope: Scope, opts: FindOpts) -> SteveResult<Vec<Resource>> {
        let cached = match &scope {
            Scope::All => self.have_all(),
            Scope::Namespace(ns) => self.have_namespace(ns),
            Scope::Selector { selector, namespace } => self.have_selector(selector, namespace.as_deref()),
        };
        if cached && !opts.force {
            return match &scope {
                Scope::All => Ok(self.all()),
                Scope::Namespace(ns) => Ok(self.in_namespace(ns)),
                Scope::Selector { selector, namespace } => self.matching(selector, namespace.as_deref()),
            };
        }
        let col = self.fetch_collection(&scope, &opts).await?;
        let revision = col.revision;
        let out = if opts.is_partial() { self.load_page(col.data, revision) } else { self.load_scope(&scope, col) };
        if opts.watch {
            self.watch_scope(&scope, revision);
        }
        Ok(out)
    }

    pub async fn find_all(self: &Arc<Self>, opts: FindOpts) -> SteveResult<Vec<Resource>> {
        self.find_scope(Scope::All, opts).await
    }

    pub async fn find_namespace(self: &Arc<Self>, ns: &str, opts: FindOpts) -> SteveResult<Vec<Resource>> {
        self.find_scope(Scope::Namespace(ns.to_string()), opts).await
    }

    pub async fn find_matching(
        self: &Arc<Self>,
        selector: &str,
        namespace: Option<&str>,
        opts: FindOpts,
    ) -> SteveResult<Vec<Resource>> {
        let scope = Scope::Selector { selector: selector.to_string(), namespace: namespace.map(str::to_string) };
        self.find_scope(scope, opts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pod(id: &str, rv: u64) -> Value {
        let (ns, name) = split_id(id);
        json!({ "id": id, "metadata": { "name": name, "namespace": ns, "resourceVersion": rv.to_string() } })
    }

    #[test]
    fn load_keeps_one_entry_per_id_and_position() {
        let s = TypeStore::new("pod", StoreConfig::default());
        s.load(pod("ns/a", 1)).unwrap();
        s.load(pod("ns/b", 2)).unwrap();
        s.load(json!({ "id": "ns/a", "spec": 2, "metadata": { "resourceVersion": "3" } })).unwrap();
        assert_eq!(s.ids(), vec!["ns/a", "ns/b"]);
        assert_eq!(s.by_id("ns/a").map(|r| r.data()["spec"].clone()), Some(json!(2)));
        assert_eq!(s.generation(), 3);
        assert!(s.load(json!({ "spec": 1 })).is_err());
    }

    #[test]
    fn generation_watchers_never_see_it_go_backwards() {
        let s = TypeStore::new("pod", StoreConfig::default());
        let rx = s.subscribe_generation();
        s.load(pod("a", 1)).unwrap();
        s.load(pod("b", 2)).unwrap();
        // a slower writer publishing its earlier bump after a later one
        s.publish(1, Vec::new());
        assert_eq!(*rx.borrow(), 2);
        assert_eq!(*rx.borrow(), s.generation());
    }

    #[test]
    fn watermark_survives_out_of_order_delivery() {
        let s = TypeStore::new("pod", StoreConfig::default());
        assert_eq!(s.next_resource_version(None), None);
        s.load(pod("a", 5)).unwrap();
        s.load(pod("a", 3)).unwrap();
        assert!(s.next_resource_version(None) >= Some(5));
        // the member's own revision wins when asked by id
        assert_eq!(s.next_resource_version(Some("a")), Some(3));
    }

    #[test]
    fn load_all_replaces_and_namespace_scopes() {
        let s = TypeStore::new("pod", StoreConfig::default());
        s.load_all(vec![pod("x/1", 1), pod("x/2", 2), pod("y/3", 3)], Some(10));
        assert!(s.have_all());
        s.load_namespace("x", vec![pod("x/1", 4)], None);
        assert_eq!(s.ids(), vec!["x/1", "y/3"]);
        assert!(s.have_namespace("x"));
        s.load_all(vec![pod("z/9", 9)], None);
        assert_eq!(s.ids(), vec!["z/9"]);
        assert_eq!(s.next_resource_version(None), Some(10));
    }

    #[test]
    fn selector_loads_only_upsert_and_prune_is_scoped() {
        let s = TypeStore::new("pod", StoreConfig::default());
        let labelled = |id: &str, app: &str| json!({ "id": id, "metadata": { "labels": { "app": app } } });
        s.load(labelled("1", "web")).unwrap();
        s.load(labelled("2", "db")).unwrap();
        s.load_selector("app=web", None, vec![labelled("3", "web")], None);
        assert_eq!(s.len(), 3);
        assert!(s.have_selector("app=web", None));
        let keep: FxHashSet<String> = ["3".to_string()].into_iter().collect();
        let gone = s.prune(&Scope::Selector { selector: "app=web".into(), namespace: None }, &keep);
        assert_eq!(gone, vec!["1".to_string()]);
        assert_eq!(s.ids(), vec!["2", "3"]);
    }

    #[test]
    fn remove_and_reset() {
        let s = TypeStore::new("pod", StoreConfig::default());
        let mut rx = s.subscribe();
        s.load(pod("a", 1)).unwrap();
        assert!(s.remove("a"));
        assert!(!s.remove("a"));
        assert!(s.by_id("a").is_none());
        s.load_all(vec![pod("b", 2)], Some(7));
        s.reset();
        assert!(s.is_empty());
        assert!(!s.have_all());
        assert_eq!(s.next_resource_version(None), None);
        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::Loaded { id: "a".into() }));
        assert_eq!(rx.try_recv().ok(), Some(StoreEvent::Removed { id: "a".into() }));
    }

    #[test]
    fn sorting_without_runtime_is_immediate() {
        let s = TypeStore::new("pod", StoreConfig::default());
        s.set_sort_fields(vec!["metadata.name".into()]);
        for n in ["c", "a", "b"] {
            s.load(json!({ "id": n, "metadata": { "name": n } })).unwrap();
        }
        assert_eq!(s.ids(), vec!["a", "b", "c"]);
    }

    #[test]
    fn local_queries() {
        let s = TypeStore::new("pod", StoreConfig::default());
        s.load(json!({ "id": "x/1", "metadata": { "namespace": "x", "labels": { "app": "web" } } })).unwrap();
        s.load(json!({ "id": "y/2", "metadata": { "namespace": "y", "labels": { "app": "web" } } })).unwrap();
        assert_eq!(s.in_namespace("x").len(), 1);
        assert_eq!(s.matching("app=web", None).unwrap().len(), 2);
        assert_eq!(s.matching("app=web", Some("y")).unwrap().len(), 1);
        assert!(s.matching("=bad", None).is_err());
    }

    #[test]
    fn unconfigured_store_reports_closed_connection() {
        let s = TypeStore::new("pod", StoreConfig::default());
        assert_eq!(s.schema().err(), Some(SteveError::ConnectionClosed));
    }
}
