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

//! Sniff wire format parsing — turns a cluster topology response into a
//! list of [`Node`]s (spec §6).

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use url::Url;

use crate::error::{
    Error,
    Result,
};
use crate::node::{
    Node,
    NodeFeature,
};

#[derive(Debug, Deserialize)]
struct SniffResponse {
    #[allow(dead_code)]
    cluster_name: Option<String>,
    nodes: HashMap<String, NodeInfo>,
}

#[derive(Debug, Deserialize)]
struct NodeInfo {
    name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    settings: HashMap<String, String>,
    #[serde(rename = "http")]
    http: Option<HttpInfo>,
}

#[derive(Debug, Deserialize, Default)]
struct HttpInfo {
    publish_address: Option<String>,
    #[serde(default)]
    bound_address: Vec<String>,
}

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?P<fqdn>[^/]+)/)?(?P<ip>[^:]+|\[[0-9a-fA-F:.]+\]):(?P<port>\d+)$").unwrap());

/// Parses a sniff response body into the node list it describes.
///
/// `force_tls` selects `https` over `http` for the derived node URLs; it
/// mirrors the caller's own scheme, since the sniff response carries no
/// scheme information of its own (spec §6).
pub fn parse_sniff_response(body: &[u8], force_tls: bool) -> Result<Vec<Node>> {
    let response: SniffResponse = serde_json::from_slice(body).map_err(Error::parse)?;

    let mut nodes = Vec::with_capacity(response.nodes.len());

    for (id, info) in response.nodes {
        let Some(http) = &info.http else {
            continue;
        };

        let address = match &http.publish_address {
            Some(address) if !address.is_empty() => address.as_str(),
            _ => match http.bound_address.first() {
                Some(address) => address.as_str(),
                None => continue,
            },
        };

        let Some(node) = node_from_address(address, force_tls) else {
            continue;
        };

        let mut features: Vec<NodeFeature> = info
            .roles
            .iter()
            .filter_map(|role| match role.as_str() {
                "master" => Some(NodeFeature::MasterEligible),
                "data" => Some(NodeFeature::Data),
                "ingest" => Some(NodeFeature::Ingest),
                _ => None,
            })
            .collect();
        features.push(NodeFeature::Http);

        let mut node = node.with_id(id).with_features(features).with_settings(info.settings);
        if let Some(name) = info.name {
            node = node.with_name(name);
        }

        nodes.push(node);
    }

    Ok(nodes)
}

fn node_from_address(address: &str, force_tls: bool) -> Option<Node> {
    let captures = ADDRESS_RE.captures(address)?;

    let host = captures
        .name("fqdn")
        .or_else(|| captures.name("ip"))
        .map(|m| m.as_str())?;
    let port = captures.name("port").map(|m| m.as_str())?;

    let scheme = if force_tls { "https" } else { "http" };
    let url = Url::parse(&format!("{scheme}://{host}:{port}/")).ok()?;

    Some(Node::new(url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_first_bound_address_when_publish_address_is_absent() {
        let body = br#"{
            "cluster_name": "test",
            "nodes": {
                "abc123": {
                    "name": "node-1",
                    "roles": ["master", "data"],
                    "http": { "bound_address": ["127.0.0.1:9200", "10.0.0.1:9200"] }
                }
            }
        }"#;

        let nodes = parse_sniff_response(body, false).unwrap();

        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].base_url().as_str(), "http://127.0.0.1:9200/");
    }

    #[test]
    fn prefers_fqdn_over_ip_and_uses_publish_address_when_present() {
        let body = br#"{
            "nodes": {
                "n1": {
                    "roles": ["data"],
                    "http": { "publish_address": "es-node-1.internal/10.0.0.5:9200" }
                }
            }
        }"#;

        let nodes = parse_sniff_response(body, true).unwrap();

        assert_eq!(nodes[0].base_url().as_str(), "https://es-node-1.internal:9200/");
    }

    #[test]
    fn nodes_without_http_are_filtered_out() {
        let body = br#"{
            "nodes": {
                "n1": { "roles": ["master"] }
            }
        }"#;

        let nodes = parse_sniff_response(body, false).unwrap();
        assert!(nodes.is_empty());
    }

    #[test]
    fn settings_dictionary_is_attached_to_the_node() {
        let body = br#"{
            "nodes": {
                "n1": {
                    "roles": ["data"],
                    "settings": { "node.attr.rack_id": "1" },
                    "http": { "publish_address": "10.0.0.1:9200" }
                }
            }
        }"#;

        let nodes = parse_sniff_response(body, false).unwrap();

        assert_eq!(nodes[0].settings().get("node.attr.rack_id").map(String::as_str), Some("1"));
    }

    #[test]
    fn roles_map_to_feature_tags() {
        let body = br#"{
            "nodes": {
                "n1": {
                    "roles": ["master", "data", "ingest"],
                    "http": { "publish_address": "10.0.0.1:9200" }
                }
            }
        }"#;

        let nodes = parse_sniff_response(body, false).unwrap();
        let node = &nodes[0];

        assert!(node.has_feature(NodeFeature::MasterEligible));
        assert!(node.has_feature(NodeFeature::Data));
        assert!(node.has_feature(NodeFeature::Ingest));
        assert!(node.has_feature(NodeFeature::Http));
    }
}
