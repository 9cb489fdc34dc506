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

//! A per-call cancellation token (spec §5).

use std::sync::atomic::{
    AtomicBool,
    Ordering,
};

use tokio::sync::Notify;
use triomphe::Arc;

struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// A cheaply-cloneable token that propagates cancellation to every
/// suspension point of a single pipeline call (the invoker call, the sniff
/// sub-call, and the ping sub-call).
#[derive(Clone)]
pub struct CancellationToken(Arc<Inner>);

impl CancellationToken {
    #[must_use]
    pub fn new() -> Self {
        Self(Arc::new(Inner { cancelled: AtomicBool::new(false), notify: Notify::new() }))
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::Release);
        self.0.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once [`Self::cancel`] has been called.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        self.0.notify.notified().await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
