use core::{cmp::Ordering, fmt};

#[cfg(feature = "tracing")]
use tracing::instrument;

use crate::{
    Error, Result,
    generator::{IdGenerator, Mutex},
    id::SnowflakeId,
    node::NodeId,
    time::{Epoch, SystemClock, TimeSource},
};

/// Mutable part of a generator, guarded by its mutex.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct State {
    /// Absolute timestamp (ms since 1970) used by the most recent ID.
    pub(crate) last_timestamp: u64,
    /// Sequence value of the most recent ID.
    pub(crate) sequence: u64,
}

/// A lock-based Snowflake ID generator suitable for multi-threaded
/// environments.
///
/// The last timestamp and sequence live behind a single mutex, so any
/// number of threads can share one generator (for example through an `Arc`)
/// and still receive unique, strictly increasing IDs.
///
/// When 4096 IDs have been issued within one millisecond the generator spins,
/// still holding the lock, until the clock reaches the next millisecond.
/// Callers queued behind it wait at most about a millisecond.
///
/// If the clock ever reports a time earlier than the last one it used, the
/// generator refuses to continue: [`try_next_id`] returns
/// [`Error::ClockMovedBackwards`] and [`next_id`] panics.
///
/// Generators with different [`NodeId`]s never produce the same ID, whatever
/// their clocks say, because the identity bits differ.
///
/// [`try_next_id`]: SnowflakeGenerator::try_next_id
/// [`next_id`]: SnowflakeGenerator::next_id
pub struct SnowflakeGenerator<T = SystemClock>
where
    T: TimeSource,
{
    epoch: Epoch,
    node: NodeId,
    #[cfg(feature = "cache-padded")]
    pub(crate) state: crossbeam_utils::CachePadded<Mutex<State>>,
    #[cfg(not(feature = "cache-padded"))]
    pub(crate) state: Mutex<State>,
    time: T,
}

impl SnowflakeGenerator<SystemClock> {
    /// Creates a generator whose epoch is midnight UTC of today and whose
    /// identity is derived from the host's network interfaces (see
    /// [`NodeId::resolve`]).
    ///
    /// # Example
    /// ```
    /// use flakeid::SnowflakeGenerator;
    ///
    /// let generator = SnowflakeGenerator::new();
    /// let a = generator.next_id();
    /// let b = generator.next_id();
    /// assert!(b > a);
    /// ```
    pub fn new() -> Self {
        Self::with_epoch(Epoch::today_utc())
    }

    /// Creates a generator with an explicit epoch and an identity derived
    /// from the host's network interfaces.
    ///
    /// Epochs are Unix milliseconds, so a [`SystemTime`] before 1970 converts
    /// to the Unix epoch itself. Build the epoch with
    /// [`Epoch::checked_from_system_time`] to catch that case.
    ///
    /// [`SystemTime`]: std::time::SystemTime
    pub fn with_epoch(epoch: impl Into<Epoch>) -> Self {
        Self::with_time(epoch, NodeId::resolve(), SystemClock)
    }

    /// Creates a generator with an explicit epoch and identity.
    ///
    /// A single `u8` sets both the group and worker ID; a `(group, worker)`
    /// tuple sets them separately. Values above 31 are masked to their low
    /// five bits. The epoch follows the same rules as in
    /// [`SnowflakeGenerator::with_epoch`].
    ///
    /// # Example
    /// ```
    /// use flakeid::{CUSTOM_EPOCH, NodeId, SnowflakeGenerator};
    ///
    /// let generator = SnowflakeGenerator::with_node(CUSTOM_EPOCH, NodeId::new(1, 37));
    /// let id = generator.next_id();
    /// assert_eq!(id.group_id(), 1);
    /// assert_eq!(id.worker_id(), 5);
    /// ```
    pub fn with_node(epoch: impl Into<Epoch>, node: impl Into<NodeId>) -> Self {
        Self::with_time(epoch, node, SystemClock)
    }
}

impl Default for SnowflakeGenerator<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SnowflakeGenerator<T>
where
    T: TimeSource,
{
    /// Creates a generator reading time from `time`.
    ///
    /// # Parameters
    ///
    /// - `epoch`: zero point of the timestamp field.
    /// - `node`: identity encoded into every ID.
    /// - `time`: a [`TimeSource`] returning absolute Unix milliseconds.
    pub fn with_time(epoch: impl Into<Epoch>, node: impl Into<NodeId>, time: T) -> Self {
        Self::from_components(epoch, node, 0, 0, time)
    }

    /// Creates a generator preloaded with a last timestamp (absolute Unix
    /// milliseconds) and sequence.
    ///
    /// In typical use cases, you should prefer [`Self::with_time`].
    pub fn from_components(
        epoch: impl Into<Epoch>,
        node: impl Into<NodeId>,
        last_timestamp: u64,
        sequence: u64,
        time: T,
    ) -> Self {
        let state = Mutex::new(State {
            last_timestamp,
            sequence: sequence & SnowflakeId::SEQUENCE_MASK,
        });
        Self {
            epoch: epoch.into(),
            node: node.into(),
            #[cfg(feature = "cache-padded")]
            state: crossbeam_utils::CachePadded::new(state),
            #[cfg(not(feature = "cache-padded"))]
            state,
            time,
        }
    }

    pub const fn epoch(&self) -> Epoch {
        self.epoch
    }

    pub const fn node(&self) -> NodeId {
        self.node
    }

    /// Generates the next ID.
    ///
    /// # Panics
    ///
    /// Panics on any error [`Self::try_next_id`] would return:
    ///
    /// - the clock moved backwards;
    /// - the clock is earlier than the epoch;
    /// - more than 2^41 ms have passed since the epoch;
    /// - the lock is poisoned (std mutex only).
    ///
    /// See [`IdGenerator::next_id`].
    pub fn next_id(&self) -> SnowflakeId {
        <Self as IdGenerator>::next_id(self)
    }

    /// Generates the next ID as a non-negative `i64`.
    ///
    /// # Panics
    ///
    /// Panics in the same cases as [`Self::next_id`].
    pub fn next_i64(&self) -> i64 {
        self.next_id().to_i64()
    }

    /// Generates the next ID with fallible error handling.
    ///
    /// The clock is read while holding the lock, so concurrent callers can
    /// never observe each other's timestamps out of order.
    ///
    /// # Errors
    ///
    /// - [`Error::ClockMovedBackwards`] if the clock reports a time earlier
    ///   than the last one used. This is fatal: stop issuing IDs.
    /// - [`Error::ClockBeforeEpoch`] if the clock is earlier than the epoch.
    /// - [`Error::TimestampOverflow`] if more than 2^41 ms have passed since
    ///   the epoch.
    /// - `Error::LockPoisoned` if another thread panicked while holding the
    ///   lock (std mutex only).
    ///
    /// # Example
    /// ```
    /// use flakeid::{CUSTOM_EPOCH, NodeId, SnowflakeGenerator};
    ///
    /// let generator = SnowflakeGenerator::with_node(CUSTOM_EPOCH, NodeId::new(0, 1));
    /// match generator.try_next_id() {
    ///     Ok(id) => println!("{id}"),
    ///     Err(e) if e.is_fatal() => panic!("stop issuing ids: {e}"),
    ///     Err(e) => eprintln!("{e}"),
    /// }
    /// ```
    #[cfg_attr(feature = "tracing", instrument(level = "trace", skip(self)))]
    pub fn try_next_id(&self) -> Result<SnowflakeId> {
        let (elapsed, sequence) = {
            let mut state = {
                #[cfg(feature = "parking-lot")]
                {
                    self.state.lock()
                }
                #[cfg(not(feature = "parking-lot"))]
                {
                    self.state.lock()?
                }
            };

            let now = self.time.current_millis();
            let last = state.last_timestamp;
            let (now, sequence) = match now.cmp(&last) {
                Ordering::Equal => {
                    let sequence = (state.sequence + 1) & SnowflakeId::SEQUENCE_MASK;
                    if sequence == 0 {
                        (self.cold_wait_past(last), sequence)
                    } else {
                        (now, sequence)
                    }
                }
                Ordering::Greater => (now, 0),
                Ordering::Less => return Err(Self::cold_clock_behind(last, now)),
            };

            let elapsed = self.elapsed_since_epoch(now)?;
            state.last_timestamp = now;
            state.sequence = sequence;
            (elapsed, sequence)
        };

        Ok(SnowflakeId::from_components(
            elapsed,
            u64::from(self.node.group_id()),
            u64::from(self.node.worker_id()),
            sequence,
        ))
    }

    /// Renders the configuration and last-used state for diagnostics.
    ///
    /// The format is meant for humans and may change between versions.
    pub fn describe(&self) -> String {
        self.to_string()
    }

    fn elapsed_since_epoch(&self, now: u64) -> Result<u64> {
        let epoch = self.epoch.as_millis();
        let elapsed = now
            .checked_sub(epoch)
            .ok_or(Error::ClockBeforeEpoch { now, epoch })?;
        if elapsed > SnowflakeId::max_timestamp() {
            return Err(Error::TimestampOverflow { elapsed });
        }
        Ok(elapsed)
    }

    /// Spins until the clock moves past `last` and returns the new time.
    #[cold]
    #[inline(never)]
    fn cold_wait_past(&self, last: u64) -> u64 {
        #[cfg(feature = "tracing")]
        tracing::trace!(last, "sequence exhausted, spinning until the next millisecond");
        loop {
            let now = self.time.current_millis();
            if now > last {
                return now;
            }
            core::hint::spin_loop();
        }
    }

    #[cold]
    #[inline(never)]
    fn cold_clock_behind(last: u64, now: u64) -> Error {
        #[cfg(feature = "tracing")]
        tracing::error!(last, now, "clock moved backwards, refusing to generate id");
        Error::ClockMovedBackwards { last, now }
    }

    fn snapshot(&self) -> State {
        #[cfg(feature = "parking-lot")]
        {
            *self.state.lock()
        }
        #[cfg(not(feature = "parking-lot"))]
        {
            // Read-only, so a poisoned lock still holds a usable value
            *self
                .state
                .lock()
                .unwrap_or_else(crate::generator::PoisonError::into_inner)
        }
    }
}

impl<T> IdGenerator for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn try_next_id(&self) -> Result<SnowflakeId> {
        self.try_next_id()
    }
}

impl<T> fmt::Display for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.snapshot();
        write!(
            f,
            "epoch: {} ms, group_id: {}, worker_id: {}, last_timestamp: {} ms, sequence: {}",
            self.epoch.as_millis(),
            self.node.group_id(),
            self.node.worker_id(),
            state.last_timestamp,
            state.sequence,
        )
    }
}

impl<T> fmt::Debug for SnowflakeGenerator<T>
where
    T: TimeSource,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnowflakeGenerator")
            .field("epoch", &self.epoch)
            .field("node", &self.node)
            .field("state", &self.snapshot())
            .finish_non_exhaustive()
    }
}
