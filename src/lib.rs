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

//! A resilient, cluster-aware HTTP transport core for distributed
//! search/data products.
//!
//! The [`Transport`] owns a [`pool::NodePool`], an [`Invoker`], and a
//! [`ProductRegistration`], and turns each call into a bounded,
//! observable run of the Request Pipeline: pick a live node, possibly
//! sniff the cluster topology, possibly ping a resurrected node, invoke
//! the request, and fail over on recoverable errors — emitting a
//! structured [`audit::Audit`] trail along the way.

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod api_call_details;
pub mod audit;
pub mod cancellation;
pub mod cloud_id;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod invoker;
pub mod node;
pub(crate) mod pipeline;
pub mod pool;
pub mod product;
pub mod sniff;
pub mod transport;

pub use api_call_details::{
    ApiCallDetails,
    Response,
};
pub use cancellation::CancellationToken;
pub use config::{
    Authentication,
    BoundConfiguration,
    RequestConfiguration,
    TransportConfiguration,
};
pub use endpoint::{
    Endpoint,
    Method,
};
pub use error::{
    Error,
    Result,
};
pub use invoker::{
    Invoker,
    InvokerResponse,
    ReqwestInvoker,
};
pub use node::{
    Node,
    NodeFeature,
};
pub use pool::{
    Kind as NodePoolKind,
    NodePool,
};
pub use product::{
    ElasticsearchProductRegistration,
    ProductRegistration,
    StatusClass,
};
pub use transport::Transport;
