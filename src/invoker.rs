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

//! The [`Invoker`] contract — a thin adapter to an HTTP library (spec §4.5).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{
    HeaderMap,
    HeaderValue,
    ACCEPT,
    ACCEPT_ENCODING,
    CONTENT_TYPE,
};

use crate::cancellation::CancellationToken;
use crate::config::BoundConfiguration;
use crate::endpoint::Endpoint;
use crate::error::{
    Error,
    Result,
};

/// The raw HTTP outcome of one invocation: status, headers, and body bytes.
/// The pipeline (not the invoker) decides whether this counts as success.
#[derive(Debug, Clone)]
pub struct InvokerResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Abstract capability that turns a bound request into an HTTP response.
///
/// Invokers never retry — retry is strictly the pipeline's job (spec §4.5).
/// An implementation must honor the bound request timeout and surface
/// cancellation promptly; anything that isn't a clean HTTP response (DNS,
/// TLS, connect-refused, reset, read-timeout) must be raised as
/// [`Error::Transport`].
#[async_trait]
pub trait Invoker: Send + Sync {
    async fn invoke(
        &self,
        endpoint: &Endpoint,
        config: &BoundConfiguration,
        body: Option<&[u8]>,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<InvokerResponse>;
}

/// The default [`Invoker`], backed by a shared [`reqwest::Client`].
pub struct ReqwestInvoker {
    client: reqwest::Client,
}

impl ReqwestInvoker {
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestInvoker {
    fn default() -> Self {
        Self::new(reqwest::Client::new())
    }
}

#[async_trait]
impl Invoker for ReqwestInvoker {
    async fn invoke(
        &self,
        endpoint: &Endpoint,
        config: &BoundConfiguration,
        body: Option<&[u8]>,
        timeout: Duration,
        cancellation: &CancellationToken,
    ) -> Result<InvokerResponse> {
        let url = endpoint.resolve()?;

        let method = match endpoint.method() {
            crate::endpoint::Method::Get => reqwest::Method::GET,
            crate::endpoint::Method::Post => reqwest::Method::POST,
            crate::endpoint::Method::Put => reqwest::Method::PUT,
            crate::endpoint::Method::Delete => reqwest::Method::DELETE,
            crate::endpoint::Method::Head => reqwest::Method::HEAD,
        };

        let mut headers = HeaderMap::new();
        if let Ok(accept) = HeaderValue::from_str(&config.accept_mime_type) {
            headers.insert(ACCEPT, accept);
        }
        if config.http_compression {
            headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip"));
        }
        if body.is_some() {
            if let Ok(content_type) = HeaderValue::from_str(&config.content_type) {
                headers.insert(CONTENT_TYPE, content_type);
            }
        }
        headers.extend(config.headers.clone());

        let mut builder = self.client.request(method, url).timeout(timeout).headers(headers);

        if let Some(body) = body {
            builder = builder.body(body.to_vec());
        }

        let send = builder.send();
        tokio::pin!(send);

        let response = tokio::select! {
            result = &mut send => result.map_err(classify_transport_error),
            () = cancellation.cancelled() => return Err(Error::Cancelled),
        }?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();

        let recv = response.bytes();
        tokio::pin!(recv);

        let body = tokio::select! {
            result = &mut recv => result.map_err(classify_transport_error),
            () = cancellation.cancelled() => return Err(Error::Cancelled),
        }?;

        Ok(InvokerResponse { status, headers, body: body.to_vec() })
    }
}

/// Every failure a [`reqwest::Client`] can raise before a status line is
/// received is a hard transport error (spec §4.1); reqwest never returns
/// `Err` for a received non-2xx response, only for connect/TLS/timeout/body
/// failures, so this is an unconditional mapping.
fn classify_transport_error(err: reqwest::Error) -> Error {
    log::debug!("transport error: {err}");
    Error::transport(err)
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{
        AtomicUsize,
        Ordering,
    };

    use parking_lot::Mutex;

    use super::*;

    /// A scripted sequence of outcomes, one per call, consumed in order.
    /// Exists only to drive the pipeline's state machine in tests; not part
    /// of the public API.
    pub enum Scripted {
        Response(u16, Vec<u8>),
        ResponseWithHeaders(u16, Vec<u8>, HeaderMap),
        Transport,
        TransportMsg(&'static str),
    }

    pub struct MockInvoker {
        script: Mutex<Vec<Scripted>>,
        cursor: AtomicUsize,
        pub(crate) calls: Mutex<Vec<String>>,
    }

    impl MockInvoker {
        pub fn new(script: Vec<Scripted>) -> Self {
            Self { script: Mutex::new(script), cursor: AtomicUsize::new(0), calls: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl Invoker for MockInvoker {
        async fn invoke(
            &self,
            endpoint: &Endpoint,
            _config: &BoundConfiguration,
            _body: Option<&[u8]>,
            _timeout: Duration,
            _cancellation: &CancellationToken,
        ) -> Result<InvokerResponse> {
            let index = self.cursor.fetch_add(1, Ordering::AcqRel);
            self.calls.lock().push(format!(
                "{} {}",
                endpoint.method(),
                endpoint.node().map(|n| n.base_url().to_string()).unwrap_or_default()
            ));

            let outcome = {
                let script = self.script.lock();
                match script.get(index) {
                    Some(Scripted::Response(status, body)) => Ok((*status, body.clone(), HeaderMap::new())),
                    Some(Scripted::ResponseWithHeaders(status, body, headers)) => {
                        Ok((*status, body.clone(), headers.clone()))
                    }
                    Some(Scripted::Transport) => Err("mock transport failure"),
                    Some(Scripted::TransportMsg(msg)) => Err(*msg),
                    None => Err("mock transport failure"),
                }
            };

            match outcome {
                Ok((status, body, headers)) => Ok(InvokerResponse { status, headers, body }),
                Err(msg) => Err(Error::transport(msg)),
            }
        }
    }
}
