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

//! Transport-wide defaults, per-call overrides, and their merge (spec §3, §9).

use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::node::{
    DEFAULT_DEAD_TIMEOUT_MAX,
    DEFAULT_DEAD_TIMEOUT_MIN,
};

/// How a request should authenticate itself, overriding whatever the
/// transport's default is.
#[derive(Debug, Clone)]
pub enum Authentication {
    Basic { username: String, password: String },
    Bearer(String),
    ApiKey(String),
}

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_SNIFF_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_SNIFF_STALE_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Transport-wide defaults, applied to every call unless overridden by a
/// [`RequestConfiguration`].
#[derive(Debug, Clone)]
pub struct TransportConfiguration {
    pub(crate) request_timeout: Duration,
    pub(crate) ping_timeout: Duration,
    pub(crate) sniff_timeout: Duration,
    pub(crate) max_retries: Option<usize>,
    pub(crate) dead_timeout_min: Duration,
    pub(crate) dead_timeout_max: Duration,
    pub(crate) sniff_on_startup: bool,
    pub(crate) sniff_on_stale: bool,
    pub(crate) sniff_stale_interval: Duration,
    pub(crate) disable_pings: bool,
    pub(crate) disable_direct_streaming: bool,
    pub(crate) http_compression: bool,
    pub(crate) proxy_address: Option<String>,
    pub(crate) authentication: Option<Authentication>,
    pub(crate) headers: HeaderMap,
    pub(crate) accept_mime_type: String,
    pub(crate) content_type: String,
}

impl Default for TransportConfiguration {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            sniff_timeout: DEFAULT_SNIFF_TIMEOUT,
            max_retries: None,
            dead_timeout_min: DEFAULT_DEAD_TIMEOUT_MIN,
            dead_timeout_max: DEFAULT_DEAD_TIMEOUT_MAX,
            sniff_on_startup: false,
            sniff_on_stale: false,
            sniff_stale_interval: DEFAULT_SNIFF_STALE_INTERVAL,
            disable_pings: false,
            disable_direct_streaming: false,
            http_compression: false,
            proxy_address: None,
            authentication: None,
            headers: HeaderMap::new(),
            accept_mime_type: "application/json".to_owned(),
            content_type: "application/json".to_owned(),
        }
    }
}

impl TransportConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_ping_timeout(mut self, timeout: Duration) -> Self {
        self.ping_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_sniff_timeout(mut self, timeout: Duration) -> Self {
        self.sniff_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn with_dead_timeouts(mut self, min: Duration, max: Duration) -> Self {
        self.dead_timeout_min = min;
        self.dead_timeout_max = max;
        self
    }

    #[must_use]
    pub fn with_sniff_on_startup(mut self, enabled: bool) -> Self {
        self.sniff_on_startup = enabled;
        self
    }

    #[must_use]
    pub fn with_sniff_on_stale(mut self, enabled: bool, interval: Duration) -> Self {
        self.sniff_on_stale = enabled;
        self.sniff_stale_interval = interval;
        self
    }

    #[must_use]
    pub fn with_disable_pings(mut self, disabled: bool) -> Self {
        self.disable_pings = disabled;
        self
    }

    #[must_use]
    pub fn with_disable_direct_streaming(mut self, disabled: bool) -> Self {
        self.disable_direct_streaming = disabled;
        self
    }

    #[must_use]
    pub fn with_http_compression(mut self, enabled: bool) -> Self {
        self.http_compression = enabled;
        self
    }

    #[must_use]
    pub fn with_proxy_address(mut self, proxy: impl Into<String>) -> Self {
        self.proxy_address = Some(proxy.into());
        self
    }

    #[must_use]
    pub fn with_authentication(mut self, auth: Authentication) -> Self {
        self.authentication = Some(auth);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: reqwest::header::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Immutable per-call overrides (spec §3). Any field left `None` falls back
/// to the transport's [`TransportConfiguration`].
#[derive(Debug, Clone, Default)]
pub struct RequestConfiguration {
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) max_retries: Option<usize>,
    pub(crate) allowed_status_codes: Vec<u16>,
    pub(crate) forbidden_status_codes: Vec<u16>,
    pub(crate) http_compression: Option<bool>,
    pub(crate) content_type: Option<String>,
    pub(crate) accept_mime_type: Option<String>,
    pub(crate) disable_direct_streaming: Option<bool>,
    pub(crate) authentication: Option<Authentication>,
    pub(crate) headers: HeaderMap,
    /// Disables sniffing for this single call.
    pub(crate) pipelined: bool,
}

impl RequestConfiguration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    #[must_use]
    pub fn with_allowed_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.allowed_status_codes = codes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_forbidden_status_codes(mut self, codes: impl IntoIterator<Item = u16>) -> Self {
        self.forbidden_status_codes = codes.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_http_compression(mut self, enabled: bool) -> Self {
        self.http_compression = Some(enabled);
        self
    }

    #[must_use]
    pub fn with_disable_direct_streaming(mut self, disabled: bool) -> Self {
        self.disable_direct_streaming = Some(disabled);
        self
    }

    #[must_use]
    pub fn with_authentication(mut self, auth: Authentication) -> Self {
        self.authentication = Some(auth);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: reqwest::header::HeaderName, value: reqwest::header::HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Marks the call as pipelined, disabling sniffing for it.
    #[must_use]
    pub fn pipelined(mut self) -> Self {
        self.pipelined = true;
        self
    }
}

/// The fully-merged, immutable configuration for one HTTP attempt (spec §3).
#[derive(Debug, Clone)]
pub struct BoundConfiguration {
    pub request_timeout: Duration,
    pub allowed_status_codes: Vec<u16>,
    pub forbidden_status_codes: Vec<u16>,
    pub http_compression: bool,
    pub content_type: String,
    pub accept_mime_type: String,
    pub disable_direct_streaming: bool,
    pub authentication: Option<Authentication>,
    pub headers: HeaderMap,
}

impl BoundConfiguration {
    pub(crate) fn merge(transport: &TransportConfiguration, request: &RequestConfiguration) -> Self {
        let mut headers = transport.headers.clone();
        headers.extend(request.headers.clone());

        Self {
            request_timeout: request.request_timeout.unwrap_or(transport.request_timeout),
            allowed_status_codes: request.allowed_status_codes.clone(),
            forbidden_status_codes: request.forbidden_status_codes.clone(),
            http_compression: request.http_compression.unwrap_or(transport.http_compression),
            content_type: request.content_type.clone().unwrap_or_else(|| transport.content_type.clone()),
            accept_mime_type: request
                .accept_mime_type
                .clone()
                .unwrap_or_else(|| transport.accept_mime_type.clone()),
            disable_direct_streaming: request
                .disable_direct_streaming
                .unwrap_or(transport.disable_direct_streaming),
            authentication: request.authentication.clone().or_else(|| transport.authentication.clone()),
            headers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_config_overrides_transport_defaults() {
        let transport = TransportConfiguration::new().with_request_timeout(Duration::from_secs(30));
        let request = RequestConfiguration::new().with_request_timeout(Duration::from_secs(5));

        let bound = BoundConfiguration::merge(&transport, &request);

        assert_eq!(bound.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn unset_request_fields_fall_back_to_transport() {
        let transport = TransportConfiguration::new().with_http_compression(true);
        let request = RequestConfiguration::new();

        let bound = BoundConfiguration::merge(&transport, &request);

        assert!(bound.http_compression);
    }
}
