use thiserror::Error;

/// Error handed to every caller waiting on a query.
///
/// Coalesced callers share one fetch, so the error has to be cloneable; the
/// underlying `eyre::Report` is flattened into `message`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// The fetcher kept failing after the retry budget was spent.
  #[error("failed to fetch {key} after {attempts} attempt(s): {message}")]
  Failed {
    key: String,
    attempts: u32,
    message: String,
  },

  /// The background fetch task panicked or was torn down with the runtime.
  #[error("fetch for {key} was aborted: {message}")]
  Aborted { key: String, message: String },

  /// The key already holds a value of another type.
  #[error("cached value for {key} has an unexpected type")]
  TypeMismatch { key: String },
}

#[cfg(test)]
impl FetchError {
  pub fn key(&self) -> &str {
    match self {
      Self::Failed { key, .. } | Self::Aborted { key, .. } | Self::TypeMismatch { key } => key,
    }
  }
}
