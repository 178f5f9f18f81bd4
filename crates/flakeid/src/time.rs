use core::time::Duration;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds in a UTC day. Unix time has no leap seconds, so every day is
/// exactly this long.
const MILLIS_PER_DAY: u64 = 86_400_000;

/// Custom epoch: Wednesday, January 1, 2025 00:00:00 UTC
pub const CUSTOM_EPOCH: Epoch = Epoch::from_unix_millis(1_735_689_600_000);

/// Twitter epoch: Thursday, November 4, 2010 1:42:54.657 UTC
pub const TWITTER_EPOCH: Epoch = Epoch::from_unix_millis(1_288_834_974_657);

/// The reference point from which a generator measures elapsed milliseconds.
///
/// Stored as milliseconds since 1970-01-01 UTC, so it carries no timezone: an
/// epoch built from any [`SystemTime`] is already normalized to UTC.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Epoch {
    millis: u64,
}

impl Epoch {
    pub const fn from_unix_millis(millis: u64) -> Self {
        Self { millis }
    }

    /// Builds an epoch from an absolute point in time, truncated to the
    /// millisecond.
    ///
    /// Times before 1970 clamp to the Unix epoch, so IDs would measure
    /// elapsed time from 1970 instead of `time`. Use
    /// [`Epoch::checked_from_system_time`] to reject such times instead.
    pub fn from_system_time(time: SystemTime) -> Self {
        Self::from_unix_millis(unix_millis(time))
    }

    /// Like [`Epoch::from_system_time`], but returns `None` for times before
    /// 1970 instead of clamping them.
    pub fn checked_from_system_time(time: SystemTime) -> Option<Self> {
        time.duration_since(UNIX_EPOCH)
            .ok()
            .map(Self::from)
    }

    /// Midnight (00:00:00.000 UTC) of the day containing `time`.
    ///
    /// # Example
    /// ```
    /// use std::time::{Duration, UNIX_EPOCH};
    /// use flakeid::Epoch;
    ///
    /// // 2025-01-01T13:45:00Z
    /// let afternoon = UNIX_EPOCH + Duration::from_millis(1_735_739_100_000);
    /// assert_eq!(Epoch::midnight_utc(afternoon).as_millis(), 1_735_689_600_000);
    /// ```
    pub fn midnight_utc(time: SystemTime) -> Self {
        let millis = unix_millis(time);
        Self::from_unix_millis(millis - millis % MILLIS_PER_DAY)
    }

    /// Midnight UTC of the current day. This is the epoch used by default
    /// construction.
    pub fn today_utc() -> Self {
        Self::midnight_utc(SystemTime::now())
    }

    /// Milliseconds since 1970-01-01 UTC.
    pub const fn as_millis(&self) -> u64 {
        self.millis
    }

    pub fn to_system_time(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(self.millis)
    }
}

impl From<SystemTime> for Epoch {
    fn from(time: SystemTime) -> Self {
        Self::from_system_time(time)
    }
}

impl From<Duration> for Epoch {
    /// Interprets the duration as an offset from 1970-01-01 UTC. Offsets past
    /// `u64::MAX` milliseconds saturate.
    fn from(since_unix: Duration) -> Self {
        Self::from_unix_millis(saturating_millis(since_unix))
    }
}

/// A source of absolute wall-clock time in milliseconds since the Unix epoch.
///
/// Generators read the clock through this trait so that tests can hold time
/// still, step it forward, or move it backward.
///
/// # Example
///
/// ```
/// use flakeid::TimeSource;
///
/// struct FixedTime;
/// impl TimeSource for FixedTime {
///     fn current_millis(&self) -> u64 {
///         1234
///     }
/// }
///
/// assert_eq!(FixedTime.current_millis(), 1234);
/// ```
pub trait TimeSource {
    /// Returns the current time in milliseconds since 1970-01-01 UTC.
    fn current_millis(&self) -> u64;
}

/// The system wall clock.
///
/// Unlike a monotonic timer this follows NTP steps and manual adjustments,
/// including backward ones, which generators detect and refuse.
#[derive(Copy, Clone, Debug, Default)]
pub struct SystemClock;

impl TimeSource for SystemClock {
    fn current_millis(&self) -> u64 {
        unix_millis(SystemTime::now())
    }
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, saturating_millis)
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
