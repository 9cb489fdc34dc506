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

//! The per-call structured audit trail (spec §3, §4.4).

use std::fmt;

use time::OffsetDateTime;

use crate::node::Node;

/// The closed set of audit event kinds a pipeline run can produce.
///
/// This mirrors spec §3's `Audit Event` closed set exactly; adding a new
/// kind here is a deliberate protocol change, not something call sites
/// should do casually.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditEventKind {
    /// Sniffing was attempted because the pool had never been sniffed.
    SniffOnStartup,
    /// A sniff attempt found at least one node and reseeded the pool.
    SniffSuccess,
    /// A sniff attempt exhausted every eligible node without success.
    SniffFailure,
    /// Sniffing was attempted because the pool's `last_update` was stale.
    SniffOnStaleCluster,
    /// A ping to a resurrected node succeeded.
    PingSuccess,
    /// A ping to a resurrected node failed.
    PingFailure,
    /// A previously dead node's quarantine expired and it re-entered rotation.
    Resurrection,
    /// A full pass over the node view found no alive node.
    AllNodesDead,
    /// A response was received and classified as unsuccessful.
    BadResponse,
    /// A response was received and classified as successful.
    HealthyResponse,
    /// The call's total timeout budget was exhausted.
    MaxTimeoutReached,
    /// The call's retry budget was exhausted.
    MaxRetriesReached,
    /// A response was received and classified as a known, non-retriable
    /// client error.
    BadRequest,
    /// The node view yielded no nodes at all.
    NoNodesAttempted,
    /// The call's cancellation token fired.
    CancellationRequested,
    /// Every node in the retry budget was tried and failed over.
    FailedOverAllNodes,
}

impl fmt::Display for AuditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SniffOnStartup => "SniffOnStartup",
            Self::SniffSuccess => "SniffSuccess",
            Self::SniffFailure => "SniffFailure",
            Self::SniffOnStaleCluster => "SniffOnStaleCluster",
            Self::PingSuccess => "PingSuccess",
            Self::PingFailure => "PingFailure",
            Self::Resurrection => "Resurrection",
            Self::AllNodesDead => "AllNodesDead",
            Self::BadResponse => "BadResponse",
            Self::HealthyResponse => "HealthyResponse",
            Self::MaxTimeoutReached => "MaxTimeoutReached",
            Self::MaxRetriesReached => "MaxRetriesReached",
            Self::BadRequest => "BadRequest",
            Self::NoNodesAttempted => "NoNodesAttempted",
            Self::CancellationRequested => "CancellationRequested",
            Self::FailedOverAllNodes => "FailedOverAllNodes",
        };
        f.write_str(s)
    }
}

/// A single entry in a call's audit trail.
#[derive(Debug, Clone)]
pub struct AuditEvent {
    /// Which transition this event records.
    pub kind: AuditEventKind,
    /// The node involved, if any (sniff/ping/invoke events; absent for
    /// pool-level events like `NoNodesAttempted`).
    pub node: Option<Node>,
    /// When this event's operation started.
    pub started_at: OffsetDateTime,
    /// When this event's operation ended. `None` while the operation that
    /// produced this event is still in flight.
    pub ended_at: Option<OffsetDateTime>,
    /// A short description of the exception associated with this event,
    /// if the transition was caused by one.
    pub exception: Option<String>,
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(node) = &self.node {
            write!(f, " node={}", node.base_url())?;
        }
        if let Some(exception) = &self.exception {
            write!(f, " exception={exception}")?;
        }
        Ok(())
    }
}

/// An append-only list of [`AuditEvent`]s owned by one pipeline run.
///
/// Every state-machine transition that crosses a boundary (sniff
/// start/end, ping start/end, request start/end, node status change)
/// appends exactly one event (spec §4.4). The list travels with the
/// response regardless of success or failure.
#[derive(Debug, Clone, Default)]
pub struct Audit {
    events: Vec<AuditEvent>,
}

impl Audit {
    /// Creates an empty audit trail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a completed (start and end known at once) event.
    pub fn record(
        &mut self,
        kind: AuditEventKind,
        node: Option<&Node>,
        started_at: OffsetDateTime,
        exception: Option<&str>,
    ) {
        self.events.push(AuditEvent {
            kind,
            node: node.cloned(),
            started_at,
            ended_at: Some(OffsetDateTime::now_utc()),
            exception: exception.map(ToOwned::to_owned),
        });
    }

    /// Appends an instantaneous event (no meaningful start/end split, e.g.
    /// `Resurrection` or `NoNodesAttempted`).
    pub fn record_instant(&mut self, kind: AuditEventKind, node: Option<&Node>) {
        let now = OffsetDateTime::now_utc();
        self.events.push(AuditEvent {
            kind,
            node: node.cloned(),
            started_at: now,
            ended_at: Some(now),
            exception: None,
        });
    }

    /// The events recorded so far, in the order they occurred.
    #[must_use]
    pub fn events(&self) -> &[AuditEvent] {
        &self.events
    }

    /// Whether any event of the given kind is present.
    #[must_use]
    pub fn contains(&self, kind: AuditEventKind) -> bool {
        self.events.iter().any(|e| e.kind == kind)
    }

    #[must_use]
    pub(crate) fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
