//! Error type shared by all journal operations.

/// Error type for journal operations, generic over the disk error.
///
/// Every public API returns exactly one of these; there is no
/// partial-success reporting. File-system adapters above this layer are
/// expected to translate the variants into their own error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[non_exhaustive]
pub enum Error<E> {
    /// Error surfaced by the underlying disk capability.
    Io(E),
    /// Invalid argument: bad geometry, out-of-range sector, buffer length
    /// not a multiple of the sector size, out-of-range handle.
    InvalidInput,
    /// Operation not permitted in the current transaction status, or the
    /// on-disk master record is inconsistent with the mount configuration.
    InvalidState,
    /// Handle refers to an empty slot.
    NotFound,
    /// Handle table full, or not enough journal store space left to log
    /// the operation.
    NoMem,
    /// Header or data checksum mismatch found while replaying the log.
    InvalidCrc,
}

impl<E> From<E> for Error<E> {
    fn from(e: E) -> Self {
        Self::Io(e)
    }
}

impl<E: core::fmt::Display> core::fmt::Display for Error<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Io(e) => write!(f, "disk IO error: {}", e),
            Error::InvalidInput => write!(f, "invalid argument"),
            Error::InvalidState => write!(f, "invalid journal state"),
            Error::NotFound => write!(f, "journal instance not found"),
            Error::NoMem => write!(f, "out of handles or journal store space"),
            Error::InvalidCrc => write!(f, "journal record checksum mismatch"),
        }
    }
}

impl<E: core::fmt::Debug + core::fmt::Display> core::error::Error for Error<E> {}
