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

//! [`Transport`] — the public call surface (spec §4.1, §6, §9).

use once_cell::sync::OnceCell;
use url::Url;

use crate::api_call_details::Response;
use crate::cancellation::CancellationToken;
use crate::cloud_id;
use crate::config::{
    RequestConfiguration,
    TransportConfiguration,
};
use crate::endpoint::Method;
use crate::error::Result;
use crate::invoker::{
    Invoker,
    ReqwestInvoker,
};
use crate::node::Node;
use crate::pipeline::{
    self,
    Collaborators,
};
use crate::pool::NodePool;
use crate::product::{
    ElasticsearchProductRegistration,
    ProductRegistration,
};

/// Owns exactly one [`NodePool`], one [`Invoker`], and one
/// [`ProductRegistration`] for its lifetime (spec §9).
pub struct Transport {
    pool: NodePool,
    invoker: Box<dyn Invoker>,
    product: Box<dyn ProductRegistration>,
    config: TransportConfiguration,
    blocking_runtime: OnceCell<tokio::runtime::Runtime>,
}

impl Transport {
    /// Builds a transport from its three collaborators directly.
    #[must_use]
    pub fn new(
        pool: NodePool,
        invoker: Box<dyn Invoker>,
        product: Box<dyn ProductRegistration>,
        config: TransportConfiguration,
    ) -> Self {
        Self { pool, invoker, product, config, blocking_runtime: OnceCell::new() }
    }

    /// A transport over a single node: no ping, no reseed, no retries.
    #[must_use]
    pub fn single_node(url: Url, config: TransportConfiguration) -> Self {
        Self::new(
            NodePool::single(Node::new(url)),
            Box::new(ReqwestInvoker::default()),
            Box::new(ElasticsearchProductRegistration),
            config,
        )
    }

    /// A transport over a fixed node list, with pinging on and no reseed.
    #[must_use]
    pub fn static_nodes(urls: Vec<Url>, config: TransportConfiguration) -> Self {
        Self::new(
            NodePool::static_list(urls.into_iter().map(Node::new).collect()),
            Box::new(ReqwestInvoker::default()),
            Box::new(ElasticsearchProductRegistration),
            config,
        )
    }

    /// A transport that discovers and periodically refreshes cluster
    /// topology via sniffing.
    #[must_use]
    pub fn sniffing(urls: Vec<Url>, config: TransportConfiguration) -> Self {
        Self::new(
            NodePool::sniffing(urls.into_iter().map(Node::new).collect()),
            Box::new(ReqwestInvoker::default()),
            Box::new(ElasticsearchProductRegistration),
            config,
        )
    }

    /// A transport that prefers the first alive node in list order and
    /// never reseeds.
    #[must_use]
    pub fn sticky(urls: Vec<Url>, config: TransportConfiguration) -> Self {
        Self::new(
            NodePool::sticky(urls.into_iter().map(Node::new).collect()),
            Box::new(ReqwestInvoker::default()),
            Box::new(ElasticsearchProductRegistration),
            config,
        )
    }

    /// A single-node transport rooted at a URL parsed from a cloud
    /// identifier (spec §6).
    pub fn for_cloud_id(id: &str, config: TransportConfiguration) -> Result<Self> {
        let parsed = cloud_id::parse(id)?;
        Ok(Self::new(
            NodePool::cloud(parsed.seed_url),
            Box::new(ReqwestInvoker::default()),
            Box::new(ElasticsearchProductRegistration),
            config,
        ))
    }

    #[must_use]
    pub fn node_pool(&self) -> &NodePool {
        &self.pool
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            pool: &self.pool,
            invoker: self.invoker.as_ref(),
            product: self.product.as_ref(),
            transport_config: &self.config,
        }
    }

    fn blocking_runtime(&self) -> &tokio::runtime::Runtime {
        self.blocking_runtime.get_or_init(|| {
            tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
                .expect("failed to build blocking-call runtime")
        })
    }

    /// Executes one request, suspending form. Uses a fresh, never-cancelled
    /// token; use [`Self::request_async_cancellable`] to pass your own.
    pub async fn request_async(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        config: Option<RequestConfiguration>,
    ) -> Response<Vec<u8>> {
        self.request_async_cancellable(method, path, body, config, &CancellationToken::new()).await
    }

    /// Executes one request, suspending form, with an explicit cancellation
    /// token (spec §5).
    pub async fn request_async_cancellable(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        config: Option<RequestConfiguration>,
        cancellation: &CancellationToken,
    ) -> Response<Vec<u8>> {
        let request_config = config.unwrap_or_default();
        let collaborators = self.collaborators();
        pipeline::execute(&collaborators, method, path, body, &request_config, cancellation).await
    }

    /// Executes one request, blocking form. Drives the same state machine
    /// as [`Self::request_async`] on a dedicated single-threaded runtime
    /// (spec §9: "a blocking and a suspending path are mandatory; share the
    /// state machine").
    pub fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
        config: Option<RequestConfiguration>,
    ) -> Response<Vec<u8>> {
        self.blocking_runtime().block_on(self.request_async(method, path, body, config))
    }

    pub async fn get_async(&self, path: &str) -> Response<Vec<u8>> {
        self.request_async(Method::Get, path, None, None).await
    }

    pub async fn post_async(&self, path: &str, body: Vec<u8>) -> Response<Vec<u8>> {
        self.request_async(Method::Post, path, Some(body), None).await
    }

    pub async fn put_async(&self, path: &str, body: Vec<u8>) -> Response<Vec<u8>> {
        self.request_async(Method::Put, path, Some(body), None).await
    }

    pub async fn delete_async(&self, path: &str) -> Response<Vec<u8>> {
        self.request_async(Method::Delete, path, None, None).await
    }

    pub async fn head_async(&self, path: &str) -> Response<Vec<u8>> {
        self.request_async(Method::Head, path, None, None).await
    }

    pub fn get(&self, path: &str) -> Response<Vec<u8>> {
        self.request(Method::Get, path, None, None)
    }

    pub fn post(&self, path: &str, body: Vec<u8>) -> Response<Vec<u8>> {
        self.request(Method::Post, path, Some(body), None)
    }

    pub fn put(&self, path: &str, body: Vec<u8>) -> Response<Vec<u8>> {
        self.request(Method::Put, path, Some(body), None)
    }

    pub fn delete(&self, path: &str) -> Response<Vec<u8>> {
        self.request(Method::Delete, path, None, None)
    }

    pub fn head(&self, path: &str) -> Response<Vec<u8>> {
        self.request(Method::Head, path, None, None)
    }
}
