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

//! The crate-wide error type.

use std::result::Result as StdResult;

use crate::audit::Audit;

/// `Result<T, Error>`
pub type Result<T> = StdResult<T, Error>;

pub(crate) type BoxStdError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents any possible error raised by the transport.
///
/// Transport and retriable-status errors are recovered locally by the
/// [`Pipeline`](crate::pipeline) via failover and never reach the caller
/// directly; this type is what's attached to
/// [`ApiCallDetails::original_exception`](crate::ApiCallDetails::original_exception)
/// once a call has exhausted its failover options.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// A hard transport failure (network error, DNS, TLS, connect refused,
    /// connection reset, read timeout) raised by the [`Invoker`](crate::Invoker).
    #[error("transport error: {0}")]
    Transport(#[source] BoxStdError),

    /// The caller's cancellation token fired before the call completed.
    #[error("request was cancelled")]
    Cancelled,

    /// The call's total request timeout elapsed before a node could be
    /// reached successfully.
    #[error("failed to complete request within the maximum time allowed ({attempts} attempt(s) made)")]
    Timeout {
        /// Number of attempts made before the timeout elapsed.
        attempts: usize,
    },

    /// Every node in the retry budget was tried and none of them produced a
    /// successful or known-error response.
    #[error("max retries ({retry_limit}) reached without a successful response")]
    MaxRetriesReached {
        /// The retry limit that was exceeded.
        retry_limit: usize,
    },

    /// A response was received that the [`ProductRegistration`](crate::ProductRegistration)
    /// classified as neither successful, nor a known client error, nor retriable.
    #[error("unexpected status code {status} from {method} {url}")]
    UnexpectedStatus {
        /// The HTTP method of the request.
        method: String,
        /// The URL the request was sent to.
        url: String,
        /// The status code received.
        status: u16,
    },

    /// The pipeline reached a state that configuration should have made
    /// unreachable (e.g. sniff requested on a pool that cannot reseed).
    #[error("pipeline misconfigured: {0}")]
    Misconfiguration(&'static str),

    /// The node pool had no nodes to try at all.
    #[error("no nodes are configured")]
    NoNodesAttempted,

    /// Failed to parse a basic value from a string (cloud ID, URL, sniff
    /// response, ...).
    #[error("failed to parse: {0}")]
    Parse(#[source] BoxStdError),

    /// More than one distinct error occurred across the nodes attempted
    /// during a single call. The pipeline folds them into this single
    /// "unexpected transport exception" rather than reporting only the
    /// last one and silently dropping the rest (spec §4.1, failure
    /// response construction).
    #[error("multiple distinct transport errors occurred: {}", render_errors(errors))]
    Aggregate {
        /// The distinct errors observed, in the order they occurred.
        errors: Vec<Error>,
    },
}

fn render_errors(errors: &[Error]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

impl Error {
    pub(crate) fn transport<E: Into<BoxStdError>>(error: E) -> Self {
        Self::Transport(error.into())
    }

    pub(crate) fn parse<E: Into<BoxStdError>>(error: E) -> Self {
        Self::Parse(error.into())
    }

    /// Folds a run's observed errors into at most one `Error` to attach to
    /// the final response: `None` if none occurred, the error itself if
    /// only one (or only repeats of one) occurred, otherwise `Self::Aggregate`
    /// over the distinct ones, in order of first occurrence (spec §4.1).
    pub(crate) fn aggregate(errors: Vec<Error>) -> Option<Error> {
        let mut distinct: Vec<Error> = Vec::new();
        for error in errors {
            if !distinct.iter().any(|seen| seen.to_string() == error.to_string()) {
                distinct.push(error);
            }
        }

        match distinct.len() {
            0 => None,
            1 => distinct.into_iter().next(),
            _ => Some(Self::Aggregate { errors: distinct }),
        }
    }
}

/// A multi-line, human-readable post-mortem for a failed call.
///
/// This is the canonical diagnostic artifact described in spec §7: it's
/// built from the method, URL, status, audit trail, and (when captured)
/// the request/response bodies, and is meant to be logged or attached to
/// a bug report rather than parsed.
pub fn debug_information(
    method: &str,
    url: &str,
    status: Option<u16>,
    audit: &Audit,
    request_body: Option<&[u8]>,
    response_body: Option<&[u8]>,
    exception: Option<&Error>,
) -> String {
    use std::fmt::Write as _;

    let mut out = String::new();

    let _ = writeln!(out, "# Request");
    let _ = writeln!(out, "{method} {url}");

    if let Some(status) = status {
        let _ = writeln!(out, "# Response");
        let _ = writeln!(out, "status: {status}");
    }

    if let Some(exception) = exception {
        let _ = writeln!(out, "# Exception");
        let _ = writeln!(out, "{exception}");
    }

    let _ = writeln!(out, "# Audit trail");
    for event in audit.events() {
        let _ = writeln!(out, "{event}");
    }

    if let Some(body) = request_body {
        let _ = writeln!(out, "# Request body");
        let _ = writeln!(out, "{}", String::from_utf8_lossy(body));
    }

    if let Some(body) = response_body {
        let _ = writeln!(out, "# Response body");
        let _ = writeln!(out, "{}", String::from_utf8_lossy(body));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_of_no_errors_is_none() {
        assert!(Error::aggregate(Vec::new()).is_none());
    }

    #[test]
    fn aggregate_of_one_error_is_that_error_unwrapped() {
        let result = Error::aggregate(vec![Error::NoNodesAttempted]);
        assert_matches::assert_matches!(result, Some(Error::NoNodesAttempted));
    }

    #[test]
    fn aggregate_of_repeated_identical_errors_is_not_wrapped() {
        let result = Error::aggregate(vec![Error::NoNodesAttempted, Error::NoNodesAttempted]);
        assert_matches::assert_matches!(result, Some(Error::NoNodesAttempted));
    }

    #[test]
    fn aggregate_of_distinct_errors_folds_into_one_exception() {
        let result = Error::aggregate(vec![
            Error::transport("dns resolution failed"),
            Error::NoNodesAttempted,
        ]);

        assert_matches::assert_matches!(result, Some(Error::Aggregate { ref errors }) if errors.len() == 2);
    }
}
