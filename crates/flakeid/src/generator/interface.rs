use crate::{Result, id::SnowflakeId};

/// A minimal interface for generating Snowflake IDs.
pub trait IdGenerator {
    /// Generates the next ID, treating every failure as fatal.
    ///
    /// This is the infallible counterpart to [`IdGenerator::try_next_id`].
    ///
    /// # Panics
    ///
    /// Panics if the clock moved backwards (or any other [`Error`] occurs).
    /// Continuing past a clock regression could hand out duplicate or
    /// out-of-order IDs, so the panic is the intended way to stop the process.
    ///
    /// [`Error`]: crate::Error
    fn next_id(&self) -> SnowflakeId {
        match self.try_next_id() {
            Ok(id) => id,
            Err(e) => panic!("{e}"),
        }
    }

    /// Generates the next ID with fallible error handling.
    ///
    /// # Errors
    ///
    /// Returns an error if the clock moved backwards, if the clock is outside
    /// the range the ID layout can represent, or if the underlying lock is
    /// poisoned.
    fn try_next_id(&self) -> Result<SnowflakeId>;
}
