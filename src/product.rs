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

//! The [`ProductRegistration`] contract — per-product hooks for sniff/ping
//! requests, error detection, and response decoration (spec §4.6).

use crate::endpoint::Method;
use crate::node::Node;

/// How a received status code should be treated by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    /// Counts as a successful call; the node is marked alive.
    Success,
    /// A known, non-retriable client error; the response still flows back
    /// to the caller but the pipeline does not fail over.
    KnownError,
    /// Should be retried against the next node; the node is marked dead.
    Retriable,
    /// Neither success, known error, nor retriable — surfaces as
    /// `Error::UnexpectedStatus`.
    Unexpected,
}

/// Per-product hooks the pipeline calls at fixed points. It never inspects
/// the product payload directly (spec §4.6).
pub trait ProductRegistration: Send + Sync {
    /// Default MIME type accepted in responses.
    fn default_mime_type(&self) -> &str {
        "application/json"
    }

    /// Default MIME type sent in requests.
    fn default_content_type(&self) -> &str {
        "application/json"
    }

    /// Path and query used for the sniff (topology discovery) request.
    fn sniff_path(&self) -> &str;

    /// Path and query used for the ping (liveness probe) request.
    fn ping_path(&self) -> &str;

    /// Method used for the ping request.
    fn ping_method(&self) -> Method {
        Method::Head
    }

    /// Classifies a received status code for the given method.
    ///
    /// Default rule (spec §4.1): 200-299 is success; a HEAD request
    /// answered with 404 is also success (the "HEAD 404 is success" rule);
    /// 502/503/504 and 429 are retriable; 400/401/403/404/409 are known
    /// errors; anything else is unexpected.
    fn classify_status(&self, method: Method, status: u16, allowed: &[u16], forbidden: &[u16]) -> StatusClass {
        if forbidden.contains(&status) {
            return StatusClass::KnownError;
        }

        if (200..300).contains(&status) || allowed.contains(&status) {
            return StatusClass::Success;
        }

        if method == Method::Head && status == 404 {
            return StatusClass::Success;
        }

        match status {
            502 | 503 | 504 | 429 => StatusClass::Retriable,
            400 | 401 | 403 | 404 | 409 => StatusClass::KnownError,
            400..=599 => StatusClass::KnownError,
            _ => StatusClass::Unexpected,
        }
    }

    /// Extracts a short, human-readable server-provided error reason from a
    /// response body, if the product embeds one (e.g. an `error.reason`
    /// field in a JSON error body).
    fn try_get_server_error_reason(&self, body: &[u8]) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(body).ok()?;
        value.get("error")?.get("reason")?.as_str().map(ToOwned::to_owned)
    }

    /// Whether a node is eligible to receive sniff requests. Falls back to
    /// "any node" when the caller doesn't care about roles.
    fn node_predicate(&self, node: &Node) -> bool {
        node.has_feature(crate::node::NodeFeature::MasterEligible)
            || node.features().is_empty()
    }
}

/// The default [`ProductRegistration`] for an Elasticsearch-like cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticsearchProductRegistration;

impl ProductRegistration for ElasticsearchProductRegistration {
    fn sniff_path(&self) -> &str {
        "_nodes/http"
    }

    fn ping_path(&self) -> &str {
        "/"
    }

    fn ping_method(&self) -> Method {
        Method::Head
    }
}
