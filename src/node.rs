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

//! [`Node`] — a single reachable endpoint of the cluster (spec §3, §4.3).

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{
    AtomicBool,
    AtomicU32,
    Ordering,
};
use std::time::Duration;

use parking_lot::RwLock;
use time::OffsetDateTime;
use triomphe::Arc;
use url::Url;

/// A capability tag attached to a [`Node`], derived from a sniff response's
/// roles (spec §6) or set explicitly by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeFeature {
    /// The node holds data shards.
    Data,
    /// The node is eligible to be elected master/coordinator.
    MasterEligible,
    /// The node runs the ingest pipeline.
    Ingest,
    /// The node has the HTTP layer enabled and can serve client requests.
    Http,
}

/// Default minimum dead-node quarantine (spec §4.3).
pub const DEFAULT_DEAD_TIMEOUT_MIN: Duration = Duration::from_secs(60);
/// Default maximum dead-node quarantine (spec §4.3).
pub const DEFAULT_DEAD_TIMEOUT_MAX: Duration = Duration::from_secs(30 * 60);

/// `timeout(n, dmin, dmax) = min(dmax, dmin * 2^min(n-1, 20))` (spec §4.3).
///
/// The exponent is clamped to 20 so the multiplication can never overflow
/// regardless of how many times a node has failed in a row.
#[must_use]
pub fn dead_node_backoff(failed_attempts: u32, dmin: Duration, dmax: Duration) -> Duration {
    if failed_attempts == 0 {
        return dmin.min(dmax);
    }

    let exponent = (failed_attempts - 1).min(20);
    let scale = 1u64 << exponent;

    dmin.saturating_mul(scale as u32).min(dmax)
}

struct Liveness {
    is_alive: AtomicBool,
    is_resurrected: AtomicBool,
    failed_attempts: AtomicU32,
    dead_until: RwLock<Option<OffsetDateTime>>,
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            is_alive: AtomicBool::new(true),
            is_resurrected: AtomicBool::new(false),
            failed_attempts: AtomicU32::new(0),
            dead_until: RwLock::new(None),
        }
    }
}

struct NodeInner {
    base_url: Url,
    id: Option<String>,
    name: Option<String>,
    features: Vec<NodeFeature>,
    settings: HashMap<String, String>,
    liveness: Liveness,
}

/// A reachable endpoint of the cluster.
///
/// Identity is the normalized base URL: two `Node`s constructed from the
/// same URL are `==` and, once cloned from the pool, share liveness state
/// (they're backed by the same `Arc`) so that `mark_dead`/`mark_alive`
/// performed through one clone is visible through every other.
#[derive(Clone)]
pub struct Node(Arc<NodeInner>);

impl Node {
    /// Builds a new, alive node from a base URL.
    ///
    /// The URL is normalized to always end with `/`, per spec §3.
    #[must_use]
    pub fn new(mut base_url: Url) -> Self {
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Self(Arc::new(NodeInner {
            base_url,
            id: None,
            name: None,
            features: Vec::new(),
            settings: HashMap::new(),
            liveness: Liveness::default(),
        }))
    }

    /// Attaches an id to this node, returning the updated node.
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        let mut inner = (*self.0).clone_fields();
        inner.id = Some(id.into());
        Self(Arc::new(inner))
    }

    /// Attaches a name to this node, returning the updated node.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        let mut inner = (*self.0).clone_fields();
        inner.name = Some(name.into());
        Self(Arc::new(inner))
    }

    /// Attaches feature tags to this node, returning the updated node.
    #[must_use]
    pub fn with_features(self, features: Vec<NodeFeature>) -> Self {
        let mut inner = (*self.0).clone_fields();
        inner.features = features;
        Self(Arc::new(inner))
    }

    /// Attaches a settings dictionary to this node, returning the updated
    /// node (spec §3, §6: the sniff response's per-node `settings{}`).
    #[must_use]
    pub fn with_settings(self, settings: HashMap<String, String>) -> Self {
        let mut inner = (*self.0).clone_fields();
        inner.settings = settings;
        Self(Arc::new(inner))
    }

    /// The node's normalized base URL. Identity is based on this value.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.0.base_url
    }

    /// The node's id, if known (set by a sniff response or explicitly).
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.id.as_deref()
    }

    /// The node's name, if known.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    /// The feature tags attached to this node.
    #[must_use]
    pub fn features(&self) -> &[NodeFeature] {
        &self.0.features
    }

    /// Whether the node has the given feature tag.
    #[must_use]
    pub fn has_feature(&self, feature: NodeFeature) -> bool {
        self.0.features.contains(&feature)
    }

    /// The node's settings dictionary.
    #[must_use]
    pub fn settings(&self) -> &HashMap<String, String> {
        &self.0.settings
    }

    /// Whether this node is currently considered alive.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.liveness.is_alive.load(Ordering::Acquire)
    }

    /// Whether this node is currently flagged as resurrected (its
    /// quarantine expired but it hasn't yet proven itself via a ping or a
    /// successful response).
    #[must_use]
    pub fn is_resurrected(&self) -> bool {
        self.0.liveness.is_resurrected.load(Ordering::Acquire)
    }

    /// How many consecutive times this node has been marked dead.
    #[must_use]
    pub fn failed_attempts(&self) -> u32 {
        self.0.liveness.failed_attempts.load(Ordering::Acquire)
    }

    /// When this node's quarantine expires, if it's currently dead.
    #[must_use]
    pub fn dead_until(&self) -> Option<OffsetDateTime> {
        *self.0.liveness.dead_until.read()
    }

    pub(crate) fn set_resurrected(&self, value: bool) {
        self.0.liveness.is_resurrected.store(value, Ordering::Release);
    }

    /// Marks this node dead, scheduling its resurrection per the
    /// exponential backoff policy (spec §4.3).
    pub fn mark_dead(&self, dmin: Duration, dmax: Duration) {
        let attempts = self.0.liveness.failed_attempts.fetch_add(1, Ordering::AcqRel) + 1;
        self.0.liveness.is_alive.store(false, Ordering::Release);
        self.0.liveness.is_resurrected.store(false, Ordering::Release);

        let backoff = dead_node_backoff(attempts, dmin, dmax);
        *self.0.liveness.dead_until.write() = Some(OffsetDateTime::now_utc() + backoff);

        log::debug!(
            "marking node {} dead (attempt {attempts}, quarantined for {backoff:?})",
            self.0.base_url
        );
    }

    /// Marks this node alive, clearing all liveness bookkeeping.
    pub fn mark_alive(&self) {
        self.0.liveness.is_alive.store(true, Ordering::Release);
        self.0.liveness.is_resurrected.store(false, Ordering::Release);
        self.0.liveness.failed_attempts.store(0, Ordering::Release);
        *self.0.liveness.dead_until.write() = None;
    }

    /// Whether the node's quarantine has expired as of `now` (used by the
    /// node-pool view to decide whether to resurrect it).
    #[must_use]
    pub(crate) fn quarantine_expired(&self, now: OffsetDateTime) -> bool {
        self.dead_until().is_none_or(|until| until <= now)
    }
}

impl NodeInner {
    fn clone_fields(&self) -> Self {
        Self {
            base_url: self.base_url.clone(),
            id: self.id.clone(),
            name: self.name.clone(),
            features: self.features.clone(),
            settings: self.settings.clone(),
            liveness: Liveness::default(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.0.base_url == other.0.base_url
    }
}

impl Eq for Node {}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("base_url", &self.0.base_url)
            .field("is_alive", &self.is_alive())
            .field("failed_attempts", &self.failed_attempts())
            .finish()
    }
}
