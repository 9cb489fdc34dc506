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

//! [`Endpoint`] — `(method, path-and-query, node)` resolved to a full URL
//! (spec §3).

use std::fmt;

use url::Url;

use crate::node::Node;

/// The HTTP method of a call. A small closed set rather than a string, so
/// the pipeline and product registration can match on it exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
}

impl Method {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sentinel host used by [`Endpoint::empty`] so a default-constructed
/// endpoint is still a valid, printable URL rather than requiring an
/// `Option`.
const EMPTY_SENTINEL: &str = "http://empty.invalid/";

/// `(method, path-and-query, node)`, resolved to a full request URL.
#[derive(Debug, Clone)]
pub struct Endpoint {
    method: Method,
    path_and_query: String,
    node: Option<Node>,
}

impl Endpoint {
    /// Builds an endpoint bound to a node.
    #[must_use]
    pub fn new(method: Method, path_and_query: impl Into<String>, node: Node) -> Self {
        Self { method, path_and_query: path_and_query.into(), node: Some(node) }
    }

    /// The zero value: no node bound yet, resolves against a sentinel host.
    #[must_use]
    pub fn empty(method: Method, path_and_query: impl Into<String>) -> Self {
        Self { method, path_and_query: path_and_query.into(), node: None }
    }

    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    #[must_use]
    pub fn path_and_query(&self) -> &str {
        &self.path_and_query
    }

    #[must_use]
    pub fn node(&self) -> Option<&Node> {
        self.node.as_ref()
    }

    /// Rebinds this endpoint to a different node, keeping method and path.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.node = Some(node);
        self
    }

    /// Resolves the endpoint to a full URL by joining the node's base URL
    /// with the path-and-query. Falls back to the sentinel host when no
    /// node is bound (the `Empty` zero value).
    pub fn resolve(&self) -> crate::error::Result<Url> {
        let base = match &self.node {
            Some(node) => node.base_url().clone(),
            None => Url::parse(EMPTY_SENTINEL).expect("sentinel URL is valid"),
        };

        base.join(self.path_and_query.trim_start_matches('/')).map_err(crate::error::Error::parse)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve() {
            Ok(url) => write!(f, "{} {url}", self.method),
            Err(_) => write!(f, "{} {}", self.method, self.path_and_query),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_against_bound_node() {
        let node = Node::new(Url::parse("http://localhost:9200/").unwrap());
        let endpoint = Endpoint::new(Method::Get, "my-index/_doc/1", node);

        assert_eq!(endpoint.resolve().unwrap().as_str(), "http://localhost:9200/my-index/_doc/1");
    }

    #[test]
    fn empty_endpoint_resolves_against_sentinel() {
        let endpoint = Endpoint::empty(Method::Get, "_cluster/health");
        let url = endpoint.resolve().unwrap();

        assert_eq!(url.host_str(), Some("empty.invalid"));
    }
}
