//! Remote tag lookup policy.
//!
//! Lookup never fails a run: a confirmed missing object is
//! [`RemoteTag::Absent`], anything else that goes wrong is
//! [`RemoteTag::LookupFailed`]. Both read as "changed" downstream.

use quire_core::DestinationKey;

use crate::backend::{RemoteTag, StorageBackend};
use crate::cancel::CancelSignal;
use crate::error::StorageError;
use crate::retry::{with_retry, RetryPolicy};

pub async fn lookup_remote_tag(
    backend: &dyn StorageBackend,
    key: &DestinationKey,
    policy: &RetryPolicy,
    cancel: &CancelSignal,
) -> RemoteTag {
    match with_retry(policy, cancel, "lookup", key, || backend.lookup_tag(key)).await {
        Ok(Some(tag)) => RemoteTag::Present(tag),
        Ok(None) | Err(StorageError::NotFound(_)) => RemoteTag::Absent,
        Err(err) => {
            tracing::warn!(key = %key, backend = backend.name(), error = %err, "remote tag lookup failed; treating as changed");
            RemoteTag::LookupFailed(err.to_string())
        }
    }
}
