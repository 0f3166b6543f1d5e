use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};

use crate::errors::{OrderError, Result};
use crate::metrics::names as metric;

/// Callback fired once for every entry removed from the cache, whatever the
/// removal path (LRU eviction, TTL sweep, purge). Invoked outside the cache
/// lock.
pub type EvictCallback<K, V> = Arc<dyn Fn(&K, &V) + Send + Sync>;

const NIL: usize = usize::MAX;

struct Node<K, V> {
    key: K,
    value: V,
    /// Absolute expiry; `None` never expires.
    expires: Option<Instant>,
    prev: usize,
    next: usize,
}

/// Recency-ordered store: a hash index over a slab-allocated doubly-linked
/// list. `head` is most-recently-used, `tail` least.
struct Inner<K, V> {
    map: HashMap<K, usize>,
    nodes: Vec<Option<Node<K, V>>>,
    free: Vec<usize>,
    head: usize,
    tail: usize,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn new(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
        }
    }

    fn len(&self) -> usize {
        self.map.len()
    }

    fn node(&self, idx: usize) -> &Node<K, V> {
        self.nodes[idx].as_ref().expect("live node index")
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<K, V> {
        self.nodes[idx].as_mut().expect("live node index")
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let node = self.node(idx);
            (node.prev, node.next)
        };
        if prev != NIL {
            self.node_mut(prev).next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.node_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }
    }

    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let node = self.node_mut(idx);
            node.prev = NIL;
            node.next = old_head;
        }
        if old_head != NIL {
            self.node_mut(old_head).prev = idx;
        }
        self.head = idx;
        if self.tail == NIL {
            self.tail = idx;
        }
    }

    fn promote(&mut self, idx: usize) {
        if self.head == idx {
            return;
        }
        self.detach(idx);
        self.push_front(idx);
    }

    fn insert_front(&mut self, node: Node<K, V>) {
        let key = node.key.clone();
        let idx = match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = Some(node);
                idx
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.map.insert(key, idx);
        self.push_front(idx);
    }

    /// Unlink and return the node; the caller owns the callback invocation.
    fn remove(&mut self, idx: usize) -> Node<K, V> {
        self.detach(idx);
        let node = self.nodes[idx].take().expect("live node index");
        self.map.remove(&node.key);
        self.free.push(idx);
        node
    }
}

fn is_expired<K, V>(node: &Node<K, V>, now: Instant) -> bool {
    node.expires.is_some_and(|expires| now > expires)
}

struct Shared<K, V> {
    inner: Mutex<Inner<K, V>>,
    on_evicted: Mutex<Option<EvictCallback<K, V>>>,
    capacity: usize,
    /// Metric label for this cache instance, supplied by the owner.
    cache_type: String,
}

impl<K: Eq + Hash + Clone, V> Shared<K, V> {
    fn notify_evicted(&self, removed: &[(K, V)], reason: &str) {
        if !removed.is_empty() {
            metrics::counter!(
                metric::CACHE_EVICTIONS_TOTAL,
                "type" => self.cache_type.clone(),
                "reason" => reason.to_string(),
            )
            .increment(removed.len() as u64);
        }
        let callback = self.on_evicted.lock().clone();
        if let Some(callback) = callback {
            for (key, value) in removed {
                callback(key, value);
            }
        }
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        let mut removed = Vec::new();
        {
            let mut inner = self.inner.lock();
            let expired: Vec<usize> = inner
                .map
                .values()
                .copied()
                .filter(|&idx| is_expired(inner.node(idx), now))
                .collect();
            for idx in expired {
                let node = inner.remove(idx);
                removed.push((node.key, node.value));
            }
        }
        if !removed.is_empty() {
            let remaining = self.inner.lock().len();
            tracing::info!(
                removed = removed.len(),
                remaining,
                "cache cleanup removed expired entries"
            );
            self.notify_evicted(&removed, "ttl");
        }
    }
}

/// Thread-safe bounded LRU cache with per-entry TTL and an optional
/// background expiry sweeper.
///
/// All methods serialize on one internal mutex. A sweep holds the lock for
/// the duration of its scan; capacity is bounded to 10^6 entries by config
/// validation, keeping the scan cheap.
pub struct LruCache<K, V> {
    shared: Arc<Shared<K, V>>,
    cleanup_stop: Mutex<Option<watch::Sender<bool>>>,
}

impl<K, V> LruCache<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Create a cache bounded to `capacity` entries. Rejects zero capacity.
    /// `cache_type` labels this instance's hit/miss/eviction counters.
    pub fn new(capacity: usize, cache_type: impl Into<String>) -> Result<Self> {
        if capacity == 0 {
            return Err(OrderError::Cache(
                "capacity must be positive".to_string(),
            ));
        }
        Ok(Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::new(capacity)),
                on_evicted: Mutex::new(None),
                capacity,
                cache_type: cache_type.into(),
            }),
            cleanup_stop: Mutex::new(None),
        })
    }

    /// Look up a key. A live hit promotes the entry to most-recently-used;
    /// an expired entry is removed before reporting the miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let mut expired_entry = None;

        let result = {
            let mut inner = self.shared.inner.lock();
            match inner.map.get(key).copied() {
                None => None,
                Some(idx) if is_expired(inner.node(idx), now) => {
                    let node = inner.remove(idx);
                    expired_entry = Some((node.key, node.value));
                    None
                }
                Some(idx) => {
                    inner.promote(idx);
                    Some(inner.node(idx).value.clone())
                }
            }
        };

        if let Some(entry) = expired_entry {
            self.shared.notify_evicted(std::slice::from_ref(&entry), "ttl");
        }

        let label = self.shared.cache_type.clone();
        match &result {
            Some(_) => metrics::counter!(metric::CACHE_HITS_TOTAL, "type" => label).increment(1),
            None => metrics::counter!(metric::CACHE_MISSES_TOTAL, "type" => label).increment(1),
        }

        result
    }

    /// Insert or update. `ttl == 0` means the entry never expires. Updating
    /// an existing key replaces value and expiry and promotes it without
    /// changing the size; inserting at capacity evicts the LRU entry first.
    pub fn put(&self, key: K, value: V, ttl: Duration) {
        let expires = (ttl > Duration::ZERO).then(|| Instant::now() + ttl);
        let mut evicted = None;

        {
            let mut inner = self.shared.inner.lock();
            if let Some(idx) = inner.map.get(&key).copied() {
                inner.promote(idx);
                let node = inner.node_mut(idx);
                node.value = value;
                node.expires = expires;
                return;
            }

            if inner.len() >= self.shared.capacity {
                let tail = inner.tail;
                if tail != NIL {
                    let node = inner.remove(tail);
                    evicted = Some((node.key, node.value));
                }
            }

            inner.insert_front(Node {
                key,
                value,
                expires,
                prev: NIL,
                next: NIL,
            });
        }

        if let Some(entry) = evicted {
            self.shared.notify_evicted(std::slice::from_ref(&entry), "lru");
        }
    }

    /// Whether a live (non-expired) entry exists, without promoting it.
    pub fn has(&self, key: &K) -> bool {
        let now = Instant::now();
        let inner = self.shared.inner.lock();
        inner
            .map
            .get(key)
            .is_some_and(|&idx| !is_expired(inner.node(idx), now))
    }

    pub fn len(&self) -> usize {
        self.shared.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Remove every entry, invoking the eviction callback for each.
    pub fn purge(&self) {
        let removed: Vec<(K, V)> = {
            let mut inner = self.shared.inner.lock();
            let indices: Vec<usize> = inner.map.values().copied().collect();
            indices
                .into_iter()
                .map(|idx| {
                    let node = inner.remove(idx);
                    (node.key, node.value)
                })
                .collect()
        };
        self.shared.notify_evicted(&removed, "purge");
    }

    /// Register the eviction callback. Last writer wins.
    pub fn set_on_evicted(&self, callback: EvictCallback<K, V>) {
        *self.shared.on_evicted.lock() = Some(callback);
    }

    /// Spawn the background sweeper removing expired entries every
    /// `interval`. A running sweeper is replaced.
    pub fn start_cleanup(&self, interval: Duration) {
        let (stop_tx, mut stop_rx) = watch::channel(false);
        if let Some(prev) = self.cleanup_stop.lock().replace(stop_tx) {
            let _ = prev.send(true);
        }

        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                    _ = ticker.tick() => shared.sweep_expired(),
                }
            }
        });
    }

    /// Stop the background sweeper. Idempotent.
    pub fn stop_cleanup(&self) {
        if let Some(stop) = self.cleanup_stop.lock().take() {
            let _ = stop.send(true);
        }
    }
}

impl<K, V> Drop for LruCache<K, V> {
    fn drop(&mut self) {
        if let Some(stop) = self.cleanup_stop.lock().take() {
            let _ = stop.send(true);
        }
    }
}
