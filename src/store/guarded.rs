//! Failure-absorbing wrapper around a [`KeyValueStore`].
//!
//! Nothing here returns an error. Every call is bounded by a timeout; a read
//! that fails or times out is reported as absent, a write or delete that
//! fails is reported as skipped (`false`). Failures are logged and counted so
//! callers can surface a degraded-health signal instead of crashing the bot.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, warn};

use crate::store::{KeyValueStore, StoreError, StoreResult};

/// Timeout, retry and health settings for a [`GuardedStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardPolicy {
    pub timeout: Duration,
    /// Total attempts per write or delete; 1 means no retry.
    pub write_attempts: u32,
    /// Delay before the first retry, doubled for each later one.
    pub retry_backoff: Duration,
    /// Consecutive failures after which the store counts as degraded.
    pub degraded_after: u64,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            write_attempts: 1,
            retry_backoff: Duration::from_millis(200),
            degraded_after: 3,
        }
    }
}

#[derive(Debug, Default)]
struct Health {
    consecutive_failures: AtomicU64,
    total_failures: AtomicU64,
}

/// Cloneable handle; clones share the backend and the health counters.
#[derive(Clone)]
pub struct GuardedStore {
    inner: Arc<dyn KeyValueStore>,
    policy: GuardPolicy,
    health: Arc<Health>,
}

impl GuardedStore {
    pub fn new(inner: Arc<dyn KeyValueStore>, policy: GuardPolicy) -> Self {
        Self {
            inner,
            policy,
            health: Arc::new(Health::default()),
        }
    }

    pub fn policy(&self) -> GuardPolicy {
        self.policy
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.name()
    }

    /// Read `key`; failures and timeouts read as absent.
    pub async fn read(&self, key: &str) -> Option<String> {
        debug!(key, "store read");
        match self.bounded(self.inner.get(key)).await {
            Ok(value) => {
                self.record_success();
                value
            }
            Err(e) => {
                self.record_failure();
                error!(key, backend = self.inner.name(), error = %e, "store read failed, treating as absent");
                None
            }
        }
    }

    /// Write `value` under `key`. Returns `false` if the write was skipped.
    pub async fn write(&self, key: &str, value: &str) -> bool {
        debug!(key, bytes = value.len(), "store write");
        self.mutate(key, "write", || self.inner.set(key, value)).await
    }

    /// Delete `key`. Returns `false` if the delete was skipped.
    pub async fn remove(&self, key: &str) -> bool {
        debug!(key, "store delete");
        self.mutate(key, "delete", || self.inner.delete(key)).await
    }

    /// Number of failures since the last successful call.
    pub fn consecutive_failures(&self) -> u64 {
        self.health.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.health.total_failures.load(Ordering::Relaxed)
    }

    pub fn is_degraded(&self) -> bool {
        self.consecutive_failures() >= self.policy.degraded_after
    }

    async fn mutate<F, Fut>(&self, key: &str, op: &'static str, call: F) -> bool
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = StoreResult<()>>,
    {
        let attempts = self.policy.write_attempts.max(1);
        let mut delay = self.policy.retry_backoff;

        for attempt in 1..=attempts {
            match self.bounded(call()).await {
                Ok(()) => {
                    self.record_success();
                    return true;
                }
                Err(e) => {
                    self.record_failure();
                    if attempt < attempts {
                        warn!(key, op, attempt, error = %e, "store {op} failed, retrying in {delay:?}");
                        tokio::time::sleep(delay).await;
                        delay = delay.saturating_mul(2);
                    } else {
                        error!(key, op, backend = self.inner.name(), error = %e, "store {op} failed, skipping");
                    }
                }
            }
        }
        false
    }

    async fn bounded<T, Fut>(&self, call: Fut) -> StoreResult<T>
    where
        Fut: std::future::Future<Output = StoreResult<T>>,
    {
        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.policy.timeout)),
        }
    }

    fn record_success(&self) {
        let previous = self.health.consecutive_failures.swap(0, Ordering::Relaxed);
        if previous >= self.policy.degraded_after {
            warn!(backend = self.inner.name(), failures = previous, "store recovered");
        }
    }

    fn record_failure(&self) {
        self.health.total_failures.fetch_add(1, Ordering::Relaxed);
        let now = self.health.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
        if now == self.policy.degraded_after {
            error!(backend = self.inner.name(), failures = now, "store degraded");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Misbehaving backends for exercising the error policy.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::store::{KeyValueStore, MemoryStore, StoreError, StoreResult};

    /// Fails the first `failures` calls, then behaves like a [`MemoryStore`].
    #[derive(Default)]
    pub struct FlakyStore {
        pub inner: MemoryStore,
        failures: AtomicU32,
    }

    impl FlakyStore {
        pub fn failing(failures: u32) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures: AtomicU32::new(failures),
            }
        }

        fn trip(&self) -> StoreResult<()> {
            let left = self.failures.load(Ordering::SeqCst);
            if left > 0 {
                self.failures.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::Unavailable("connection refused".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl KeyValueStore for FlakyStore {
        async fn get(&self, key: &str) -> StoreResult<Option<String>> {
            self.trip()?;
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
            self.trip()?;
            self.inner.set(key, value).await
        }

        async fn delete(&self, key: &str) -> StoreResult<()> {
            self.trip()?;
            self.inner.delete(key).await
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    /// Never answers within any reasonable timeout.
    pub struct HungStore;

    #[async_trait]
    impl KeyValueStore for HungStore {
        async fn get(&self, _key: &str) -> StoreResult<Option<String>> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> StoreResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        async fn delete(&self, _key: &str) -> StoreResult<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "hung"
        }
    }
}
