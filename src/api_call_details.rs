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

//! [`ApiCallDetails`] and [`Response`] — the structured metadata produced
//! for every completed pipeline execution (spec §3).

use reqwest::header::HeaderMap;

use crate::audit::Audit;
use crate::endpoint::Method;
use crate::error::Error;
use crate::node::Node;

/// Per-call record attached to every response, success or failure.
#[derive(Debug)]
pub struct ApiCallDetails {
    pub method: Method,
    pub url: String,
    pub node: Option<Node>,
    pub status: Option<u16>,
    pub success: bool,
    pub audit: Audit,
    pub request_body: Option<Vec<u8>>,
    pub response_body: Option<Vec<u8>>,
    pub response_headers: Option<HeaderMap>,
    pub mime_type: Option<String>,
    pub original_exception: Option<Error>,
}

impl ApiCallDetails {
    /// `true` iff `success`, or status is in `[400, 599)` except for
    /// 502/503/504 (spec §3) — the status codes that represent a
    /// known-and-meaningful product error rather than a transport failure.
    #[must_use]
    pub fn success_or_known_error(&self) -> bool {
        if self.success {
            return true;
        }

        match self.status {
            Some(status) => (400..599).contains(&status) && !matches!(status, 502 | 503 | 504),
            None => false,
        }
    }

    /// The canonical multi-line human-readable post-mortem (spec §7).
    #[must_use]
    pub fn debug_information(&self) -> String {
        crate::error::debug_information(
            self.method.as_str(),
            &self.url,
            self.status,
            &self.audit,
            self.request_body.as_deref(),
            self.response_body.as_deref(),
            self.original_exception.as_ref(),
        )
    }
}

/// The outcome of one pipeline execution: a typed body plus the structured
/// call metadata that travels with it regardless of success or failure.
#[derive(Debug)]
pub struct Response<T> {
    pub body: T,
    pub details: ApiCallDetails,
}

impl<T> Response<T> {
    #[must_use]
    pub fn success(&self) -> bool {
        self.details.success
    }
}

impl Response<Vec<u8>> {
    pub(crate) fn failure(details: ApiCallDetails) -> Self {
        Self { body: Vec::new(), details }
    }
}
