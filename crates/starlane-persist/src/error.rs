//! Error types for the persistence gateway.

/// Errors a gateway implementation can surface.
///
/// The realtime core treats these uniformly: admission-gating reads turn
/// into an `error` event for the caller; fire-and-forget flushes are
/// logged and dropped.
#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    /// The store could not be reached (connection refused, pool
    /// exhausted, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the operation.
    #[error("query failed: {0}")]
    Query(String),
}
