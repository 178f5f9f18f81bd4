/// A result type defaulting to this crate's [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// All error variants that `flakeid` can emit.
///
/// Every variant except [`Error::LockPoisoned`] means the generator can no
/// longer promise unique, increasing IDs. Callers should treat those as fatal
/// and stop issuing IDs (usually by letting the process exit and restart)
/// rather than retrying. [`Error::is_fatal`] makes that distinction explicit.
#[derive(Clone, Debug, PartialEq, Eq, Hash, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The clock reported a time earlier than one already used to build an ID.
    ///
    /// Issuing more IDs after this could repeat or reorder earlier ones.
    #[error("clock moved backwards: refusing to generate id ({now} ms < last {last} ms)")]
    ClockMovedBackwards {
        /// Last timestamp (ms since 1970) used by the generator.
        last: u64,
        /// Timestamp (ms since 1970) the clock just reported.
        now: u64,
    },

    /// The clock reads earlier than the configured epoch, so the elapsed time
    /// would be negative.
    #[error("clock ({now} ms) is before the configured epoch ({epoch} ms)")]
    ClockBeforeEpoch {
        /// Timestamp (ms since 1970) the clock reported.
        now: u64,
        /// Configured epoch (ms since 1970).
        epoch: u64,
    },

    /// Elapsed time no longer fits the 41-bit timestamp field (about 69 years
    /// after the epoch) and would spill into the sign bit.
    #[error("elapsed time {elapsed} ms exceeds the 41-bit timestamp field")]
    TimestampOverflow {
        /// Milliseconds since the configured epoch.
        elapsed: u64,
    },

    /// Another thread panicked while holding the generator lock.
    ///
    /// Not available with the `parking-lot` feature, whose mutexes do not
    /// poison.
    #[cfg_attr(docsrs, doc(cfg(not(feature = "parking-lot"))))]
    #[cfg(not(feature = "parking-lot"))]
    #[error("generator lock poisoned")]
    LockPoisoned,
}

impl Error {
    /// Whether the generator must stop issuing IDs after this error.
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::ClockMovedBackwards { .. }
            | Self::ClockBeforeEpoch { .. }
            | Self::TimestampOverflow { .. } => true,
            #[cfg(not(feature = "parking-lot"))]
            Self::LockPoisoned => false,
        }
    }
}

#[cfg(not(feature = "parking-lot"))]
use crate::generator::{MutexGuard, PoisonError};
#[cfg(not(feature = "parking-lot"))]
impl<T> From<PoisonError<MutexGuard<'_, T>>> for Error {
    fn from(_: PoisonError<MutexGuard<'_, T>>) -> Self {
        Self::LockPoisoned
    }
}
