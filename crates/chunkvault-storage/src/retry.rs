use std::time::Duration;

use chunkvault_types::error::Result;

use crate::{BlobStore, MetadataStore, RetryConfig};

/// Retry a closure on transient errors with exponential backoff + jitter.
///
/// Permanent errors (not found, bad key, short read) are returned on the
/// first attempt.
pub fn retry_call<T>(
    config: &RetryConfig,
    op_name: &str,
    key: &str,
    f: impl Fn() -> Result<T>,
) -> Result<T> {
    let mut delay_ms = config.retry_delay_ms;
    let mut attempt = 0;
    loop {
        match f() {
            Ok(val) => return Ok(val),
            Err(e) if e.is_transient() && attempt < config.max_retries => {
                attempt += 1;
                tracing::warn!(
                    op = op_name,
                    key,
                    attempt,
                    max_retries = config.max_retries,
                    error = %e,
                    "transient storage error, retrying"
                );
                let jitter = rand::random::<u64>() % delay_ms.max(1);
                std::thread::sleep(Duration::from_millis(delay_ms + jitter));
                delay_ms = (delay_ms * 2).min(config.retry_max_delay_ms);
            }
            Err(e) => return Err(e),
        }
    }
}

/// Blob store adapter that retries transient failures of the inner store.
pub struct RetryingBlobStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: BlobStore> RetryingBlobStore<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S: BlobStore> BlobStore for RetryingBlobStore<S> {
    fn put(&self, key: &str, data: &[u8]) -> Result<()> {
        retry_call(&self.config, "put", key, || self.inner.put(key, data))
    }

    fn get_range(&self, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        retry_call(&self.config, "get_range", key, || {
            self.inner.get_range(key, start, end)
        })
    }
}

/// Metadata store adapter that retries transient failures of the inner store.
///
/// A retried `batch_set` rewrites the whole batch; writes are idempotent so
/// re-applying pairs that already landed is harmless.
pub struct RetryingMetadataStore<S> {
    inner: S,
    config: RetryConfig,
}

impl<S: MetadataStore> RetryingMetadataStore<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }
}

impl<S: MetadataStore> MetadataStore for RetryingMetadataStore<S> {
    fn batch_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        let label = format!("{} keys", keys.len());
        retry_call(&self.config, "batch_get", &label, || {
            self.inner.batch_get(keys)
        })
    }

    fn batch_set(&self, pairs: Vec<(String, Vec<u8>)>) -> Result<()> {
        let label = format!("{} keys", pairs.len());
        retry_call(&self.config, "batch_set", &label, || {
            self.inner.batch_set(pairs.clone())
        })
    }
}
