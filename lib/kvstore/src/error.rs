use thiserror::Error;

/// Errors surfaced to store callers.
///
/// The first four are domain and lifecycle outcomes the HTTP layer
/// translates to status codes. `Serialize` and `Interrupted` are
/// internal faults a caller can only treat as server-side failures.
#[derive(Debug, Error)]
pub enum StoreError {
  #[error("key not present")]
  KeyNotPresent,
  #[error("user is not authorised to access this key")]
  Unauthorized,
  #[error("bad store request")]
  BadRequest,
  #[error("the store is shutting down")]
  Shutdown,
  #[error("failed to serialize key listing")]
  Serialize(#[from] serde_json::Error),
  /// The request was dropped before a reply could be delivered,
  /// which happens when the guardian is restarted underneath it.
  #[error("the request was interrupted by a store restart")]
  Interrupted,
}
