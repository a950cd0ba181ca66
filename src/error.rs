use thiserror::Error;

/// Errors that can occur when building a cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
  /// The debounce filter was configured with zero slots.
  #[error("debounce slot count cannot be zero")]
  ZeroDebounceSlots,
  /// The writer poll interval was configured as zero, which would make the
  /// writer busy-loop whenever the queues are non-empty.
  #[error("writer poll interval cannot be zero")]
  ZeroPollInterval,
}
