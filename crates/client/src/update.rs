//! Optimistic update: read, modify, compare-and-swap, back off, repeat
//!
//! The loop only retries on a version mismatch. Validation failures and
//! transport errors end it immediately. With the default policy there is no
//! attempt cap, so callers that need bounded latency should either set
//! `max_attempts` or run the update under their own deadline.

use std::thread;

use tracing::{debug, trace};

use docfeed_core::{Limits, Value};

use crate::config::RetryPolicy;
use crate::error::{ClientError, Result};
use crate::transport::StoreApi;

/// Apply `updater` to the current value of `key` until a CAS write lands.
///
/// `updater` receives `None` for a missing or deleted key and may be called
/// once per attempt. Returns the value that was written.
///
/// # Errors
///
/// - `ClientError::Store` with a validation error if the new value violates `limits`
/// - `ClientError::RetriesExhausted` if `policy` caps attempts and they run out
/// - any error from `api`, unchanged
pub fn optimistic_update<F>(
    api: &dyn StoreApi,
    policy: &RetryPolicy,
    limits: &Limits,
    key: &str,
    mut updater: F,
) -> Result<Value>
where
    F: FnMut(Option<&Value>) -> Value,
{
    limits.validate_key(key)?;
    let mut delays = policy.backoff();
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        let current = api.get_with_version(key)?;
        let new_value = updater(current.value.as_ref());
        limits.validate_value(&new_value)?;

        if api.set_if_version(key, current.version, new_value.clone())? {
            trace!(key = %key, attempts, "optimistic update committed");
            return Ok(new_value);
        }

        if policy.is_exhausted(attempts) {
            debug!(key = %key, attempts, "optimistic update gave up");
            return Err(ClientError::RetriesExhausted {
                key: key.to_string(),
                attempts,
            });
        }

        let delay = delays.next_delay();
        debug!(
            key = %key,
            attempts,
            expected = %current.version,
            delay_ms = delay.as_millis() as u64,
            "version conflict, retrying"
        );
        thread::sleep(delay);
    }
}
