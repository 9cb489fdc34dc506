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

//! The Request Pipeline — the per-call state machine (spec §4.1).

use std::time::{
    Duration,
    Instant,
};

use time::OffsetDateTime;

use crate::api_call_details::{
    ApiCallDetails,
    Response,
};
use crate::audit::{
    Audit,
    AuditEventKind,
};
use crate::cancellation::CancellationToken;
use crate::config::{
    BoundConfiguration,
    RequestConfiguration,
    TransportConfiguration,
};
use crate::endpoint::{
    Endpoint,
    Method,
};
use crate::error::{
    Error,
    Result,
};
use crate::invoker::Invoker;
use crate::node::Node;
use crate::pool::{
    Kind,
    NodePool,
};
use crate::product::{
    ProductRegistration,
    StatusClass,
};
use crate::sniff;

/// The collaborators one pipeline execution needs. Borrowed for the
/// duration of a single call; the [`crate::transport::Transport`] owns
/// them for its whole lifetime (spec §9).
pub(crate) struct Collaborators<'a> {
    pub pool: &'a NodePool,
    pub invoker: &'a dyn Invoker,
    pub product: &'a dyn ProductRegistration,
    pub transport_config: &'a TransportConfiguration,
}

/// Executes one user request as a bounded, observable state machine (spec
/// §4.1). Shared by both the blocking and the suspending public surface —
/// the blocking path just runs this on a dedicated runtime.
pub(crate) async fn execute(
    collaborators: &Collaborators<'_>,
    method: Method,
    path: &str,
    body: Option<Vec<u8>>,
    request_config: &RequestConfiguration,
    cancellation: &CancellationToken,
) -> Response<Vec<u8>> {
    let Collaborators { pool, invoker, product, transport_config } = *collaborators;

    if transport_config.sniff_on_startup && !pool.supports_reseeding() {
        let mut audit = Audit::new();
        audit.record_instant(AuditEventKind::SniffOnStartup, None);
        audit.record_instant(AuditEventKind::SniffFailure, None);
        return failure_response(
            method,
            path,
            None,
            audit,
            Some(Error::Misconfiguration("sniff_on_startup is enabled on a pool that does not support reseeding")),
            0,
        );
    }

    let start = Instant::now();
    let total_timeout = request_config.request_timeout.unwrap_or(transport_config.request_timeout);
    let mut audit = Audit::new();
    let mut attempts: usize = 0;
    let mut seen_exceptions: Vec<Error> = Vec::new();

    let mut sniff_on_connection_failure = false;

    'outer: loop {
        let elapsed = start.elapsed();
        if elapsed >= total_timeout {
            audit.record_instant(AuditEventKind::MaxTimeoutReached, None);
            return timeout_response(method, path, audit, attempts);
        }

        if !request_config.pipelined {
            if let Err(response) =
                run_sniff_prelude(pool, invoker, product, transport_config, cancellation, &mut audit, &mut sniff_on_connection_failure, method, path)
                    .await
            {
                return response;
            }
        }

        let mut view = pool.create_view();
        if view.is_empty() {
            audit.record_instant(AuditEventKind::NoNodesAttempted, None);
            return failure_response(method, path, None, audit, Some(Error::NoNodesAttempted), attempts);
        }

        // Computed per spec.md's resolution of "max_retries > node count":
        // clamp at view time, using the node count as of *this* view (after
        // any sniffing that just happened), not the count at call start.
        let node_count = pool.node_count().max(1);
        let retry_limit = if matches!(pool.kind(), Kind::SingleNode | Kind::Cloud) {
            0
        } else {
            request_config
                .max_retries
                .or(transport_config.max_retries)
                .unwrap_or(node_count.saturating_sub(1))
                .min(node_count.saturating_sub(1))
        };

        let mut had_transport_failure = false;

        for _ in 0..=retry_limit {
            if cancellation.is_cancelled() {
                audit.record_instant(AuditEventKind::CancellationRequested, None);
                return failure_response(method, path, None, audit, Some(Error::Cancelled), attempts);
            }

            let remaining = match total_timeout.checked_sub(start.elapsed()) {
                Some(remaining) if remaining > Duration::ZERO => remaining,
                _ => {
                    audit.record_instant(AuditEventKind::MaxTimeoutReached, None);
                    return timeout_response(method, path, audit, attempts);
                }
            };

            let now = OffsetDateTime::now_utc();
            let Some(node) = view.next(now, &mut audit) else {
                break;
            };
            attempts += 1;

            if node.is_resurrected() && pool.supports_pinging() && !transport_config.disable_pings {
                let ping_timeout = transport_config.ping_timeout.min(remaining);
                let ping_start = OffsetDateTime::now_utc();

                match ping(&node, invoker, product, transport_config, ping_timeout, cancellation).await {
                    Ok(()) => {
                        audit.record(AuditEventKind::PingSuccess, Some(&node), ping_start, None);
                        node.set_resurrected(false);
                    }
                    Err(err) => {
                        audit.record(AuditEventKind::PingFailure, Some(&node), ping_start, Some(&err.to_string()));
                        node.mark_dead(transport_config.dead_timeout_min, transport_config.dead_timeout_max);
                        seen_exceptions.push(err);
                        continue;
                    }
                }
            }

            let bound = BoundConfiguration::merge(transport_config, request_config);
            let endpoint = Endpoint::new(method, path, node.clone());
            let attempt_timeout = bound.request_timeout.min(remaining);
            let call_start = OffsetDateTime::now_utc();

            let invocation = invoker.invoke(&endpoint, &bound, body.as_deref(), attempt_timeout, cancellation).await;

            match invocation {
                Err(Error::Cancelled) => {
                    audit.record_instant(AuditEventKind::CancellationRequested, None);
                    return failure_response(method, path, None, audit, Some(Error::Cancelled), attempts);
                }
                Err(err) => {
                    audit.record(AuditEventKind::BadResponse, Some(&node), call_start, Some(&err.to_string()));
                    node.mark_dead(transport_config.dead_timeout_min, transport_config.dead_timeout_max);
                    had_transport_failure = true;
                    seen_exceptions.push(err);
                    continue;
                }
                Ok(raw) => {
                    let reason = product.try_get_server_error_reason(&raw.body);
                    let class = product.classify_status(method, raw.status, &bound.allowed_status_codes, &bound.forbidden_status_codes);

                    match class {
                        StatusClass::Success => {
                            node.mark_alive();
                            audit.record(AuditEventKind::HealthyResponse, Some(&node), call_start, None);

                            let url = endpoint.resolve().map(|u| u.to_string()).unwrap_or_default();
                            let details = ApiCallDetails {
                                method,
                                url,
                                node: Some(node),
                                status: Some(raw.status),
                                success: true,
                                audit,
                                request_body: bound.disable_direct_streaming.then(|| body.clone()).flatten(),
                                response_body: bound.disable_direct_streaming.then(|| raw.body.clone()),
                                response_headers: Some(raw.headers),
                                mime_type: Some(bound.accept_mime_type.clone()),
                                original_exception: None,
                            };
                            return Response { body: raw.body, details };
                        }
                        StatusClass::KnownError => {
                            audit.record(AuditEventKind::BadRequest, Some(&node), call_start, reason.as_deref());

                            let url = endpoint.resolve().map(|u| u.to_string()).unwrap_or_default();
                            let details = ApiCallDetails {
                                method,
                                url,
                                node: Some(node),
                                status: Some(raw.status),
                                success: false,
                                audit,
                                request_body: bound.disable_direct_streaming.then(|| body.clone()).flatten(),
                                response_body: Some(raw.body.clone()),
                                response_headers: Some(raw.headers),
                                mime_type: Some(bound.accept_mime_type.clone()),
                                original_exception: None,
                            };
                            return Response { body: raw.body, details };
                        }
                        StatusClass::Retriable => {
                            audit.record(AuditEventKind::BadResponse, Some(&node), call_start, reason.as_deref());

                            let dead_timeout_min = if raw.status == 429 {
                                retry_after(&raw.headers).map_or(transport_config.dead_timeout_min, |floor| {
                                    floor.max(transport_config.dead_timeout_min)
                                })
                            } else {
                                transport_config.dead_timeout_min
                            };
                            node.mark_dead(dead_timeout_min, transport_config.dead_timeout_max);
                            continue;
                        }
                        StatusClass::Unexpected => {
                            let url = endpoint.resolve().map(|u| u.to_string()).unwrap_or_default();
                            return failure_response(
                                method,
                                path,
                                Some(raw.status),
                                audit,
                                Some(Error::UnexpectedStatus { method: method.to_string(), url, status: raw.status }),
                                attempts,
                            );
                        }
                    }
                }
            }
        }

        if had_transport_failure && pool.supports_reseeding() && !sniff_on_connection_failure {
            sniff_on_connection_failure = true;
            continue 'outer;
        }

        // A pool with no retry capability (`SingleNode`/`Cloud`) has nothing
        // to exhaust: the single attempt's own `BadResponse` is the whole
        // story, with no separate "retries exhausted" marker.
        if matches!(pool.kind(), Kind::SingleNode | Kind::Cloud) {
            return failure_response(method, path, None, audit, Error::aggregate(seen_exceptions), attempts);
        }

        if attempts > retry_limit {
            audit.record_instant(AuditEventKind::MaxRetriesReached, None);
            return failure_response(
                method,
                path,
                None,
                audit,
                Some(Error::aggregate(seen_exceptions).unwrap_or(Error::MaxRetriesReached { retry_limit })),
                attempts,
            );
        }

        audit.record_instant(AuditEventKind::FailedOverAllNodes, None);
        return failure_response(method, path, None, audit, Error::aggregate(seen_exceptions), attempts);
    }
}

/// Parses the `Retry-After` header's seconds form into a duration to use as
/// a minimum quarantine floor for a 429 response (spec §9, Open Question 2).
/// The HTTP-date form is not handled: none of this crate's products emit it
/// for 429s, and it would need a calendar dependency this crate otherwise
/// has no use for.
fn retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    let value = headers.get(reqwest::header::RETRY_AFTER)?.to_str().ok()?;
    let seconds: u64 = value.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

/// Runs the three sniff triggers described in spec §4.1 step 2. Returns
/// `Err(response)` if a sniff failure leaves the pool with no nodes at all
/// (the one case where a sniff failure is fatal to the call).
#[allow(clippy::too_many_arguments)]
async fn run_sniff_prelude(
    pool: &NodePool,
    invoker: &dyn Invoker,
    product: &dyn ProductRegistration,
    transport_config: &TransportConfiguration,
    cancellation: &CancellationToken,
    audit: &mut Audit,
    sniff_on_connection_failure: &mut bool,
    method: Method,
    path: &str,
) -> std::result::Result<(), Response<Vec<u8>>> {
    if transport_config.sniff_on_startup && pool.supports_reseeding() && !pool.sniffed_on_startup() {
        if pool.claim_sniff_on_startup() {
            let _permit = pool.bootstrap_permit().await;
            let result = sniff(pool, invoker, product, transport_config, cancellation).await;
            record_sniff_outcome(audit, AuditEventKind::SniffOnStartup, result);
        } else {
            let _permit = pool.bootstrap_permit().await;
        }

        if pool.nodes().is_empty() {
            return Err(failure_response(method, path, None, std::mem::take(audit), Some(Error::NoNodesAttempted), 0));
        }
    }

    let stale_interval = time::Duration::try_from(transport_config.sniff_stale_interval).unwrap_or(time::Duration::MAX);
    if transport_config.sniff_on_stale
        && pool.supports_reseeding()
        && OffsetDateTime::now_utc() - pool.last_update() >= stale_interval
    {
        let result = sniff(pool, invoker, product, transport_config, cancellation).await;
        record_sniff_outcome(audit, AuditEventKind::SniffOnStaleCluster, result);

        if pool.nodes().is_empty() {
            return Err(failure_response(method, path, None, std::mem::take(audit), Some(Error::NoNodesAttempted), 0));
        }
    }

    if *sniff_on_connection_failure && pool.supports_reseeding() {
        *sniff_on_connection_failure = false;
        let result = sniff(pool, invoker, product, transport_config, cancellation).await;
        record_sniff_outcome(audit, AuditEventKind::SniffOnStartup, result);

        if pool.nodes().is_empty() {
            return Err(failure_response(method, path, None, std::mem::take(audit), Some(Error::NoNodesAttempted), 0));
        }
    }

    Ok(())
}

fn record_sniff_outcome(audit: &mut Audit, trigger: AuditEventKind, result: Result<()>) {
    audit.record_instant(trigger, None);
    match result {
        Ok(()) => audit.record_instant(AuditEventKind::SniffSuccess, None),
        Err(_) => audit.record_instant(AuditEventKind::SniffFailure, None),
    }
}

/// The sniff subroutine (spec §4.1): restricts the view to sniff-eligible
/// nodes, issues the sniff request against each in turn, reseeds the pool
/// on the first success.
async fn sniff(
    pool: &NodePool,
    invoker: &dyn Invoker,
    product: &dyn ProductRegistration,
    transport_config: &TransportConfiguration,
    cancellation: &CancellationToken,
) -> Result<()> {
    let all = pool.nodes();
    let eligible: Vec<Node> = all.iter().filter(|n| product.node_predicate(n)).cloned().collect();
    let candidates = if eligible.is_empty() { all } else { eligible };

    let mut last_error = None;

    for node in candidates {
        let force_tls = node.base_url().scheme() == "https";
        let endpoint = Endpoint::new(Method::Get, product.sniff_path(), node);
        let bound = BoundConfiguration::merge(transport_config, &RequestConfiguration::default());

        let outcome =
            invoker.invoke(&endpoint, &bound, None, transport_config.sniff_timeout, cancellation).await.and_then(|raw| {
                if (200..300).contains(&raw.status) {
                    sniff::parse_sniff_response(&raw.body, force_tls)
                } else {
                    Err(Error::UnexpectedStatus {
                        method: Method::Get.to_string(),
                        url: endpoint.resolve().map(|u| u.to_string()).unwrap_or_default(),
                        status: raw.status,
                    })
                }
            });

        match outcome {
            Ok(nodes) if !nodes.is_empty() => {
                pool.reseed(nodes);
                return Ok(());
            }
            Ok(_) => last_error = Some(Error::parse(std::io::Error::other("sniff response had no nodes"))),
            Err(err) => last_error = Some(err),
        }
    }

    Err(last_error.unwrap_or(Error::NoNodesAttempted))
}

/// The ping subroutine (spec §4.1): a cheap liveness probe before routing a
/// real call to a resurrected node.
async fn ping(
    node: &Node,
    invoker: &dyn Invoker,
    product: &dyn ProductRegistration,
    transport_config: &TransportConfiguration,
    timeout: Duration,
    cancellation: &CancellationToken,
) -> Result<()> {
    let endpoint = Endpoint::new(product.ping_method(), product.ping_path(), node.clone());
    let bound = BoundConfiguration::merge(transport_config, &RequestConfiguration::default());

    let raw = invoker.invoke(&endpoint, &bound, None, timeout, cancellation).await?;

    if (200..300).contains(&raw.status) {
        Ok(())
    } else {
        Err(Error::UnexpectedStatus {
            method: product.ping_method().to_string(),
            url: endpoint.resolve().map(|u| u.to_string()).unwrap_or_default(),
            status: raw.status,
        })
    }
}

fn timeout_response(method: Method, path: &str, audit: Audit, attempts: usize) -> Response<Vec<u8>> {
    failure_response(method, path, None, audit, Some(Error::Timeout { attempts }), attempts)
}

fn failure_response(
    method: Method,
    path: &str,
    status: Option<u16>,
    audit: Audit,
    exception: Option<Error>,
    _attempts: usize,
) -> Response<Vec<u8>> {
    let details = ApiCallDetails {
        method,
        url: path.to_owned(),
        node: None,
        status,
        success: false,
        audit,
        request_body: None,
        response_body: None,
        response_headers: None,
        mime_type: None,
        original_exception: exception,
    };
    Response::<Vec<u8>>::failure(details)
}

#[cfg(test)]
mod tests {
    use url::Url;

    use super::*;
    use crate::invoker::mock::{
        MockInvoker,
        Scripted,
    };
    use crate::product::ElasticsearchProductRegistration;

    fn node(port: u16) -> Node {
        Node::new(Url::parse(&format!("http://localhost:{port}/")).unwrap())
    }

    fn fast_config() -> TransportConfiguration {
        TransportConfiguration::new()
            .with_request_timeout(Duration::from_secs(5))
            .with_dead_timeouts(Duration::from_secs(60), Duration::from_secs(1800))
    }

    async fn run(
        pool: &NodePool,
        invoker: &MockInvoker,
        config: &TransportConfiguration,
    ) -> Response<Vec<u8>> {
        let _ = env_logger::builder().is_test(true).try_init();

        let product = ElasticsearchProductRegistration;
        let collaborators = Collaborators { pool, invoker, product: &product, transport_config: config };
        execute(&collaborators, Method::Get, "my-index/_doc/1", None, &RequestConfiguration::new(), &CancellationToken::new()).await
    }

    #[tokio::test]
    async fn single_node_unreachable_then_resurrected_on_retry() {
        let pool = NodePool::single(node(9200));
        let config = fast_config();
        let invoker = MockInvoker::new(vec![Scripted::Transport]);

        let response = run(&pool, &invoker, &config).await;

        assert!(!response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AuditEventKind::BadResponse]);

        let touched = pool.nodes();
        assert_eq!(touched[0].failed_attempts(), 1);
        assert!(!touched[0].is_alive());

        // A second call before the quarantine (default 60s) expires falls
        // back to the last-ditch node and resurrects it inline.
        let invoker = MockInvoker::new(vec![Scripted::Transport]);
        let response = run(&pool, &invoker, &config).await;

        assert!(!response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![AuditEventKind::AllNodesDead, AuditEventKind::Resurrection, AuditEventKind::BadResponse]
        );
        assert_eq!(pool.nodes()[0].failed_attempts(), 2);
    }

    #[tokio::test]
    async fn two_node_failover_to_healthy_node() {
        let pool = NodePool::static_list(vec![node(1), node(2)]);
        let config = fast_config();
        let invoker = MockInvoker::new(vec![Scripted::Response(503, Vec::new()), Scripted::Response(200, Vec::new())]);

        let response = run(&pool, &invoker, &config).await;

        assert!(response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AuditEventKind::BadResponse, AuditEventKind::HealthyResponse]);

        let nodes = pool.nodes();
        assert!(!nodes[0].is_alive());
        assert!(nodes[1].is_alive());
    }

    #[tokio::test]
    async fn sniff_on_startup_promotes_topology() {
        let seed = node(9200);
        let pool = NodePool::sniffing(vec![seed]);
        let config = fast_config().with_sniff_on_startup(true);

        let sniff_body = br#"{
            "nodes": {
                "n1": { "roles": ["data"], "http": { "publish_address": "127.0.0.1:9201" } },
                "n2": { "roles": ["data"], "http": { "publish_address": "127.0.0.1:9202" } },
                "n3": { "roles": ["data"], "http": { "publish_address": "127.0.0.1:9203" } }
            }
        }"#;

        let invoker = MockInvoker::new(vec![
            Scripted::Response(200, sniff_body.to_vec()),
            Scripted::Response(200, Vec::new()),
        ]);

        let response = run(&pool, &invoker, &config).await;

        assert!(response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds[0], AuditEventKind::SniffOnStartup);
        assert_eq!(kinds[1], AuditEventKind::SniffSuccess);

        let nodes = pool.nodes();
        assert_eq!(nodes.len(), 3);
        assert!(!nodes.iter().any(|n| n.base_url().port() == Some(9200)));
    }

    #[tokio::test]
    async fn ping_failure_on_resurrected_node_fails_over() {
        let a = node(1);
        a.mark_dead(Duration::from_millis(1), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;
        let b = node(2);

        let pool = NodePool::static_list(vec![a, b]);
        let config = fast_config();
        let invoker = MockInvoker::new(vec![Scripted::Transport, Scripted::Response(200, Vec::new())]);

        let response = run(&pool, &invoker, &config).await;

        assert!(response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![AuditEventKind::Resurrection, AuditEventKind::PingFailure, AuditEventKind::HealthyResponse]
        );
    }

    #[tokio::test]
    async fn ping_success_on_resurrected_node_then_real_call_succeeds() {
        let a = node(1);
        a.mark_dead(Duration::from_millis(1), Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(5)).await;

        let pool = NodePool::static_list(vec![a]);
        let config = fast_config();
        let invoker = MockInvoker::new(vec![Scripted::Response(200, Vec::new()), Scripted::Response(200, Vec::new())]);

        let response = run(&pool, &invoker, &config).await;

        assert!(response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![AuditEventKind::Resurrection, AuditEventKind::PingSuccess, AuditEventKind::HealthyResponse]
        );
    }

    #[tokio::test]
    async fn head_404_is_treated_as_success() {
        let pool = NodePool::single(node(1));
        let config = fast_config();
        let invoker = MockInvoker::new(vec![Scripted::Response(404, Vec::new())]);
        let product = ElasticsearchProductRegistration;
        let collaborators = Collaborators { pool: &pool, invoker: &invoker, product: &product, transport_config: &config };

        let response =
            execute(&collaborators, Method::Head, "my-index", None, &RequestConfiguration::new(), &CancellationToken::new())
                .await;

        assert!(response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![AuditEventKind::HealthyResponse]);
    }

    #[tokio::test]
    async fn sniff_on_startup_on_a_non_reseeding_pool_is_a_misconfiguration() {
        let pool = NodePool::static_list(vec![node(9200)]);
        let config = fast_config().with_sniff_on_startup(true);
        let invoker = MockInvoker::new(vec![]);

        let response = run(&pool, &invoker, &config).await;

        assert!(!response.success());
        assert_matches::assert_matches!(response.details.original_exception, Some(Error::Misconfiguration(_)));
    }

    #[tokio::test]
    async fn stale_sniff_is_not_triggered_when_disabled() {
        let seed = node(9200);
        let pool = NodePool::sniffing(vec![seed]);
        // The interval has clearly elapsed by the time we call; only the
        // `sniff_on_stale=false` default should be keeping this from firing.
        let config = fast_config().with_sniff_on_stale(false, Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let invoker = MockInvoker::new(vec![Scripted::Response(200, Vec::new())]);

        let response = run(&pool, &invoker, &config).await;

        assert!(response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert!(!kinds.contains(&AuditEventKind::SniffOnStaleCluster));
    }

    #[tokio::test]
    async fn stale_sniff_fires_once_the_interval_elapses_when_enabled() {
        let seed = node(9200);
        let pool = NodePool::sniffing(vec![seed]);
        let config = fast_config().with_sniff_on_stale(true, Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(10)).await;
        let invoker = MockInvoker::new(vec![
            Scripted::Response(200, br#"{"nodes":{}}"#.to_vec()),
            Scripted::Response(200, Vec::new()),
        ]);

        let response = run(&pool, &invoker, &config).await;

        assert!(response.success());
        let kinds: Vec<_> = response.details.audit.events().iter().map(|e| e.kind).collect();
        assert!(kinds.contains(&AuditEventKind::SniffOnStaleCluster));
    }

    #[tokio::test]
    async fn retry_after_header_on_429_floors_the_dead_timeout() {
        let pool = NodePool::static_list(vec![node(1), node(2)]);
        let config = fast_config();

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, reqwest::header::HeaderValue::from_static("1200"));
        let invoker = MockInvoker::new(vec![
            Scripted::ResponseWithHeaders(429, Vec::new(), headers),
            Scripted::Response(200, Vec::new()),
        ]);

        let response = run(&pool, &invoker, &config).await;

        assert!(response.success());
        let throttled = pool.nodes().into_iter().find(|n| n.base_url().port() == Some(1)).unwrap();
        let floor = throttled.dead_until().unwrap() - OffsetDateTime::now_utc();
        assert!(floor >= time::Duration::seconds(1190), "expected the 1200s Retry-After floor, got {floor}");
    }

    #[tokio::test]
    async fn distinct_errors_across_nodes_are_aggregated() {
        let pool = NodePool::static_list(vec![node(1), node(2)]);
        let config = fast_config().with_max_retries(1);
        let invoker = MockInvoker::new(vec![
            Scripted::TransportMsg("dns resolution failed"),
            Scripted::TransportMsg("connection reset"),
        ]);

        let response = run(&pool, &invoker, &config).await;

        assert!(!response.success());
        assert_matches::assert_matches!(response.details.original_exception, Some(Error::Aggregate { ref errors }) if errors.len() == 2);
    }

    #[tokio::test]
    async fn repeated_identical_errors_across_nodes_are_not_aggregated() {
        let pool = NodePool::static_list(vec![node(1), node(2)]);
        let config = fast_config().with_max_retries(1);
        let invoker = MockInvoker::new(vec![Scripted::Transport, Scripted::Transport]);

        let response = run(&pool, &invoker, &config).await;

        assert!(!response.success());
        assert_matches::assert_matches!(response.details.original_exception, Some(Error::Transport(_)));
    }
}
