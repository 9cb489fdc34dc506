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

//! Cloud identifier parsing (spec §6).

use base64::Engine as _;
use url::Url;

use crate::error::{
    Error,
    Result,
};

/// The parsed result of a cloud identifier: the cluster name the caller
/// supplied and the seed URL derived from its base64 payload.
#[derive(Debug, Clone)]
pub struct CloudId {
    pub cluster_name: String,
    pub seed_url: Url,
}

/// Parses a cloud identifier of the form `cluster_name:base64`.
///
/// The base64 payload, decoded as UTF-8, is a `$`-separated string
/// `host[:port]$elasticsearch_uuid[:port][$kibana_uuid[:port]]`. The
/// resulting seed URL is `https://<elasticsearch_uuid>.<host>[:port]`.
pub fn parse(cloud_id: &str) -> Result<CloudId> {
    if cloud_id.is_empty() {
        return Err(Error::parse("cloud id is empty"));
    }

    let (cluster_name, encoded) =
        cloud_id.split_once(':').ok_or_else(|| Error::parse("cloud id is missing a ':' separator"))?;

    if encoded.is_empty() {
        return Err(Error::parse("cloud id base64 payload is empty"));
    }

    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .map_err(Error::parse)?;
    let decoded = String::from_utf8(decoded).map_err(Error::parse)?;

    let fields: Vec<&str> = decoded.split('$').collect();
    if fields.len() < 2 {
        return Err(Error::parse("cloud id payload must have at least two '$'-separated fields"));
    }

    let (host, default_port) = split_host_port(fields[0]);
    if host.is_empty() {
        return Err(Error::parse("cloud id host field is empty"));
    }

    let (es_uuid, es_port) = split_host_port(fields[1]);
    if es_uuid.is_empty() {
        return Err(Error::parse("cloud id elasticsearch uuid field is empty"));
    }

    let port = es_port.or(default_port);
    let authority = match port {
        Some(port) => format!("{es_uuid}.{host}:{port}"),
        None => format!("{es_uuid}.{host}"),
    };

    let seed_url = Url::parse(&format!("https://{authority}")).map_err(Error::parse)?;

    Ok(CloudId { cluster_name: cluster_name.to_owned(), seed_url })
}

/// Splits a `host[:port]`-shaped field into its host and optional port.
fn split_host_port(field: &str) -> (&str, Option<&str>) {
    match field.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) => (host, Some(port)),
        _ => (field, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(payload: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(payload)
    }

    #[test]
    fn parses_a_well_formed_cloud_id() {
        let encoded = encode("us-east-1.aws.elastic.co$es-uuid$kibana-uuid");
        let cloud_id = format!("my-cluster:{encoded}");

        let parsed = parse(&cloud_id).unwrap();

        assert_eq!(parsed.cluster_name, "my-cluster");
        assert_eq!(parsed.seed_url.as_str(), "https://es-uuid.us-east-1.aws.elastic.co/");
    }

    #[test]
    fn per_service_port_overrides_host_level_port() {
        let encoded = encode("us-east-1.aws.elastic.co:9243$es-uuid:9443$kibana-uuid");
        let cloud_id = format!("my-cluster:{encoded}");

        let parsed = parse(&cloud_id).unwrap();

        assert_eq!(parsed.seed_url.as_str(), "https://es-uuid.us-east-1.aws.elastic.co:9443/");
    }

    #[test]
    fn host_level_port_is_used_when_service_has_none() {
        let encoded = encode("us-east-1.aws.elastic.co:9243$es-uuid");
        let cloud_id = format!("my-cluster:{encoded}");

        let parsed = parse(&cloud_id).unwrap();

        assert_eq!(parsed.seed_url.as_str(), "https://es-uuid.us-east-1.aws.elastic.co:9243/");
    }

    #[test]
    fn rejects_empty_input() {
        assert!(parse("").is_err());
    }

    #[test]
    fn rejects_missing_colon_separator() {
        assert!(parse("my-cluster").is_err());
    }

    #[test]
    fn rejects_empty_base64() {
        assert!(parse("my-cluster:").is_err());
    }

    #[test]
    fn rejects_fewer_than_two_dollar_fields() {
        let encoded = encode("us-east-1.aws.elastic.co");
        assert!(parse(&format!("my-cluster:{encoded}")).is_err());
    }

    #[test]
    fn rejects_empty_host() {
        let encoded = encode("$es-uuid");
        assert!(parse(&format!("my-cluster:{encoded}")).is_err());
    }

    #[test]
    fn rejects_empty_elasticsearch_uuid() {
        let encoded = encode("us-east-1.aws.elastic.co$");
        assert!(parse(&format!("my-cluster:{encoded}")).is_err());
    }
}
