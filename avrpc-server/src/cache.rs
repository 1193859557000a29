//! Bounded cache of validated client protocols.
//!
//! Keyed by protocol hash, bounded by capacity, and evicted strictly in
//! insertion order. Lookups never reorder entries, so a long-lived client
//! is evicted exactly as fast as an idle one; clients recover transparently
//! by resending their protocol text on the next call.

use avrpc_schema::{Protocol, ProtocolHash};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

pub struct ClientCache {
    capacity: usize,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ProtocolHash, Arc<Protocol>>,
    order: VecDeque<ProtocolHash>,
}

impl ClientCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(Inner::default()),
        }
    }

    pub fn get(&self, hash: &ProtocolHash) -> Option<Arc<Protocol>> {
        self.inner.lock().entries.get(hash).cloned()
    }

    /// Inserts a validated protocol, then evicts oldest-inserted entries
    /// down to capacity. Re-inserting an existing hash replaces the value
    /// without refreshing its position.
    pub fn insert(&self, hash: ProtocolHash, protocol: Arc<Protocol>) {
        let mut inner = self.inner.lock();
        if inner.entries.insert(hash, protocol).is_none() {
            inner.order.push_back(hash);
        }
        while inner.entries.len() > self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
    }

    pub fn contains(&self, hash: &ProtocolHash) -> bool {
        self.inner.lock().entries.contains_key(hash)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
