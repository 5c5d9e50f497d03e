//! Collection lifecycle: idempotent ensure and destructive recreate.
//!
//! No internal locking; concurrent writers against the same collection must
//! be serialized by the caller.

use tracing::{debug, info, warn};

use crate::config::RetryConfig;
use crate::errors::RagError;
use crate::retry::with_retry;
use crate::store::{VectorSpace, VectorStore};

/// Ensures that the collection exists with the declared vector space.
///
/// - Already exists with a matching vector size → no-op.
/// - Missing → created.
/// - Exists with a different vector size → fatal `RagError::Collection`;
///   collections are never implicitly resized.
///
/// Store calls run under the retry budget; exhaustion surfaces as
/// `RagError::RetryExhausted`.
pub async fn ensure_collection(
    store: &dyn VectorStore,
    name: &str,
    space: &VectorSpace,
    retry: &RetryConfig,
) -> Result<(), RagError> {
    info!(
        "ensuring collection '{name}' with size={} distance={:?}",
        space.size, space.distance
    );

    let existing = with_retry(
        || store.collection_dim(name),
        retry.max_retries,
        retry.base_delay(),
    )
    .await?;

    match existing {
        Some(dim) if dim == space.size => {
            debug!("collection '{name}' already exists");
            Ok(())
        }
        Some(dim) => Err(RagError::Collection(format!(
            "collection '{name}' exists with vector size {dim}, want {}",
            space.size
        ))),
        None => {
            with_retry(
                || store.create_collection(name, space),
                retry.max_retries,
                retry.base_delay(),
            )
            .await?;
            info!("collection '{name}' created");
            Ok(())
        }
    }
}

/// Unconditionally destroys and recreates the collection, losing all prior
/// records.
pub async fn recreate_collection(
    store: &dyn VectorStore,
    name: &str,
    space: &VectorSpace,
    retry: &RetryConfig,
) -> Result<(), RagError> {
    info!("recreating collection '{name}'");

    // Best-effort delete: a missing collection is fine.
    if let Err(e) = store.delete_collection(name).await {
        warn!("delete '{name}': {e} (ignored)");
    }

    with_retry(
        || store.create_collection(name, space),
        retry.max_retries,
        retry.base_delay(),
    )
    .await?;
    info!("collection '{name}' recreated");
    Ok(())
}
