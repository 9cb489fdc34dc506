// Licensed to Elasticsearch B.V. under one or more contributor
// license agreements. See the NOTICE file distributed with
// this work for additional information regarding copyright
// ownership. Elasticsearch B.V. licenses this file to you under
// the Apache License, Version 2.0 (the "License"); you may
// not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND,
// either express or implied. See the License for the specific
// language governing permissions and limitations under the
// License.

//! The Node Pool: ordered view of [`Node`]s, dead-node bookkeeping, reseed
//! (spec §4.2).

use std::sync::atomic::{
    AtomicBool,
    AtomicI64,
    Ordering,
};

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use time::OffsetDateTime;
use tokio::sync::{
    Semaphore,
    SemaphorePermit,
};
use url::Url;

use crate::audit::{
    Audit,
    AuditEventKind,
};
use crate::node::Node;

/// Which of the five pool variants this instance behaves as (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    /// One node; no ping, no reseed, no retries.
    SingleNode,
    /// Fixed list; pinging on, no reseed.
    Static,
    /// `Static` plus reseed on.
    Sniffing,
    /// Prefers the first alive node in list order; never reseeds.
    Sticky,
    /// `SingleNode` rooted at a URL parsed from a cloud identifier.
    Cloud,
}

impl Kind {
    #[must_use]
    pub fn supports_pinging(self) -> bool {
        matches!(self, Self::Static | Self::Sniffing | Self::Sticky)
    }

    #[must_use]
    pub fn supports_reseeding(self) -> bool {
        matches!(self, Self::Sniffing)
    }
}

struct PoolData {
    nodes: Vec<Node>,
    last_update: OffsetDateTime,
}

/// Ordered collection of [`Node`]s with a monotonic cursor, a `last_update`
/// timestamp, and capability flags (spec §3).
pub struct NodePool {
    kind: Kind,
    data: ArcSwap<PoolData>,
    cursor: AtomicI64,
    reseed_lock: Mutex<()>,
    bootstrap: Semaphore,
    sniffed_on_startup: AtomicBool,
}

impl NodePool {
    #[must_use]
    pub fn new(kind: Kind, nodes: Vec<Node>) -> Self {
        Self {
            kind,
            data: ArcSwap::from_pointee(PoolData { nodes, last_update: OffsetDateTime::now_utc() }),
            cursor: AtomicI64::new(-1),
            reseed_lock: Mutex::new(()),
            bootstrap: Semaphore::new(1),
            sniffed_on_startup: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn single(node: Node) -> Self {
        Self::new(Kind::SingleNode, vec![node])
    }

    #[must_use]
    pub fn static_list(nodes: Vec<Node>) -> Self {
        Self::new(Kind::Static, nodes)
    }

    #[must_use]
    pub fn sniffing(nodes: Vec<Node>) -> Self {
        Self::new(Kind::Sniffing, nodes)
    }

    #[must_use]
    pub fn sticky(nodes: Vec<Node>) -> Self {
        Self::new(Kind::Sticky, nodes)
    }

    #[must_use]
    pub fn cloud(seed_url: Url) -> Self {
        Self::new(Kind::Cloud, vec![Node::new(seed_url)])
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        self.kind
    }

    #[must_use]
    pub fn supports_pinging(&self) -> bool {
        self.kind.supports_pinging()
    }

    #[must_use]
    pub fn supports_reseeding(&self) -> bool {
        self.kind.supports_reseeding()
    }

    #[must_use]
    pub fn last_update(&self) -> OffsetDateTime {
        self.data.load().last_update
    }

    /// A defensive snapshot of the current node list.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        self.data.load().nodes.clone()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.data.load().nodes.len()
    }

    #[must_use]
    pub(crate) fn global_cursor(&self) -> i64 {
        self.cursor.load(Ordering::Acquire)
    }

    fn advance_cursor(&self, idx: usize) {
        self.cursor.store(idx as i64, Ordering::Release);
    }

    /// Yields one lazy, deterministic round-robin view over the current
    /// node snapshot (spec §4.2).
    #[must_use]
    pub fn create_view(&self) -> NodeView<'_> {
        let snapshot = self.data.load_full();
        let len = snapshot.nodes.len();
        let sticky = self.kind == Kind::Sticky;

        let start = if sticky || len == 0 {
            0
        } else {
            let cursor = self.cursor.load(Ordering::Acquire);
            (cursor + 1).rem_euclid(len as i64) as usize
        };

        NodeView {
            pool: self,
            nodes: snapshot.nodes.clone(),
            start,
            len,
            position: 0,
            any_yielded: false,
            fallback_used: false,
            sticky,
        }
    }

    /// Atomically replaces the node list (spec §4.2). Only meaningful for
    /// pools that [`Kind::supports_reseeding`]; callers are expected to
    /// check that before calling.
    pub fn reseed(&self, mut new_nodes: Vec<Node>) {
        let _guard = self.reseed_lock.lock();

        let mut seen = std::collections::HashSet::new();
        new_nodes.retain(|node| seen.insert(node.base_url().clone()));

        self.data.store(Arc::new(PoolData { nodes: new_nodes, last_update: OffsetDateTime::now_utc() }));
        self.cursor.store(-1, Ordering::Release);
    }

    #[must_use]
    pub(crate) fn sniffed_on_startup(&self) -> bool {
        self.sniffed_on_startup.load(Ordering::Acquire)
    }

    /// Atomically marks the pool as having sniffed on startup, returning
    /// whether this call is the one that made the transition (i.e. whether
    /// the caller is responsible for actually performing the sniff).
    pub(crate) fn claim_sniff_on_startup(&self) -> bool {
        self.sniffed_on_startup.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).is_ok()
    }

    /// The process-wide bootstrap mutex gating concurrent first-time
    /// sniff-on-startup (spec §5): only one caller proceeds with the sniff,
    /// the rest wait for it to finish.
    pub(crate) async fn bootstrap_permit(&self) -> SemaphorePermit<'_> {
        self.bootstrap.acquire().await.expect("bootstrap semaphore is never closed")
    }
}

/// A lazy, single-pass iterator over one snapshot of a [`NodePool`]'s nodes.
pub struct NodeView<'a> {
    pool: &'a NodePool,
    nodes: Vec<Node>,
    start: usize,
    len: usize,
    position: usize,
    any_yielded: bool,
    fallback_used: bool,
    sticky: bool,
}

impl<'a> NodeView<'a> {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Advances the view by one node, applying the dead/resurrection and
    /// all-nodes-dead rules and appending the matching audit events.
    pub fn next(&mut self, now: OffsetDateTime, audit: &mut Audit) -> Option<Node> {
        if self.len == 0 {
            return None;
        }

        while self.position < self.len {
            let idx = if self.sticky { self.position } else { (self.start + self.position) % self.len };
            self.position += 1;
            let node = &self.nodes[idx];

            if node.is_alive() {
                self.any_yielded = true;
                if !self.sticky {
                    self.pool.advance_cursor(idx);
                }
                return Some(node.clone());
            }

            if node.quarantine_expired(now) {
                node.set_resurrected(true);
                audit.record_instant(AuditEventKind::Resurrection, Some(node));
                self.any_yielded = true;
                if !self.sticky {
                    self.pool.advance_cursor(idx);
                }
                return Some(node.clone());
            }
        }

        if !self.any_yielded && !self.fallback_used {
            self.fallback_used = true;
            let idx = self.start % self.len;
            let node = self.nodes[idx].clone();
            audit.record_instant(AuditEventKind::AllNodesDead, Some(&node));
            node.set_resurrected(true);
            audit.record_instant(AuditEventKind::Resurrection, Some(&node));
            return Some(node);
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(port: u16) -> Node {
        Node::new(Url::parse(&format!("http://localhost:{port}/")).unwrap())
    }

    #[test]
    fn static_pool_cursor_advances_across_calls() {
        let pool = NodePool::static_list(vec![node(1), node(2), node(3)]);
        let mut audit = Audit::new();
        let now = OffsetDateTime::now_utc();

        let mut view = pool.create_view();
        let first = view.next(now, &mut audit).unwrap();
        assert_eq!(first.base_url().port(), Some(1));

        let mut view = pool.create_view();
        let second = view.next(now, &mut audit).unwrap();
        assert_eq!(second.base_url().port(), Some(2));

        assert!(pool.global_cursor() > -1);
    }

    #[test]
    fn dead_node_is_skipped_until_quarantine_expires() {
        let a = node(1);
        let b = node(2);
        a.mark_dead(std::time::Duration::from_secs(3600), std::time::Duration::from_secs(7200));

        let pool = NodePool::static_list(vec![a, b]);
        let mut audit = Audit::new();
        let now = OffsetDateTime::now_utc();

        let mut view = pool.create_view();
        let first = view.next(now, &mut audit).unwrap();

        assert_eq!(first.base_url().port(), Some(2));
    }

    #[test]
    fn all_nodes_dead_falls_back_to_cursor_node() {
        let a = node(1);
        let b = node(2);
        a.mark_dead(std::time::Duration::from_secs(3600), std::time::Duration::from_secs(7200));
        b.mark_dead(std::time::Duration::from_secs(3600), std::time::Duration::from_secs(7200));

        let pool = NodePool::static_list(vec![a, b]);
        let mut audit = Audit::new();
        let now = OffsetDateTime::now_utc();

        let mut view = pool.create_view();
        let fallback = view.next(now, &mut audit).unwrap();
        assert!(view.next(now, &mut audit).is_none());

        assert_eq!(fallback.base_url().port(), Some(1));
        assert!(audit.contains(AuditEventKind::AllNodesDead));
    }

    #[test]
    fn resurrected_node_is_yielded_and_flagged() {
        let a = node(1);
        a.mark_dead(std::time::Duration::from_millis(1), std::time::Duration::from_millis(1));
        let b = node(2);

        std::thread::sleep(std::time::Duration::from_millis(5));

        let pool = NodePool::static_list(vec![a, b]);
        let mut audit = Audit::new();
        let now = OffsetDateTime::now_utc();

        let mut view = pool.create_view();
        let first = view.next(now, &mut audit).unwrap();

        assert_eq!(first.base_url().port(), Some(1));
        assert!(first.is_resurrected());
        assert!(audit.contains(AuditEventKind::Resurrection));
    }

    #[test]
    fn sticky_pool_always_starts_at_index_zero() {
        let pool = NodePool::sticky(vec![node(1), node(2)]);
        let mut audit = Audit::new();
        let now = OffsetDateTime::now_utc();

        for _ in 0..3 {
            let mut view = pool.create_view();
            let first = view.next(now, &mut audit).unwrap();
            assert_eq!(first.base_url().port(), Some(1));
        }
    }

    #[test]
    fn reseed_deduplicates_by_url_and_resets_cursor() {
        let pool = NodePool::sniffing(vec![node(1)]);
        let mut audit = Audit::new();
        let now = OffsetDateTime::now_utc();

        {
            let mut view = pool.create_view();
            view.next(now, &mut audit);
        }
        assert!(pool.global_cursor() > -1);

        pool.reseed(vec![node(2), node(2), node(3)]);

        assert_eq!(pool.node_count(), 2);
        assert_eq!(pool.global_cursor(), -1);
    }
}
