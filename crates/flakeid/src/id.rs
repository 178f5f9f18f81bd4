use core::fmt;

use crate::time::Epoch;

/// A 64-bit Snowflake ID with a split node identity.
///
/// - 1 bit reserved (always zero, so the ID is a non-negative `i64`)
/// - 41 bits timestamp (ms since the generator's [`Epoch`])
/// - 5 bits group ID
/// - 5 bits worker ID
/// - 12 bits sequence
///
/// ```text
///  Bit Index:  63           63 62            22 21          17 16           12 11             0
///              +--------------+----------------+--------------+---------------+---------------+
///  Field:      | reserved (1) | timestamp (41) | group ID (5) | worker ID (5) | sequence (12) |
///              +--------------+----------------+--------------+---------------+---------------+
///              |<------------------- MSB ------------- 64 bits ------------ LSB ------------->|
/// ```
///
/// The 41-bit timestamp covers roughly 69 years from the epoch.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SnowflakeId {
    id: u64,
}

impl SnowflakeId {
    /// Bitmask for the 41-bit timestamp field. Occupies bits 22 through 62.
    pub const TIMESTAMP_MASK: u64 = (1 << 41) - 1;

    /// Bitmask for the 5-bit group ID field. Occupies bits 17 through 21.
    pub const GROUP_ID_MASK: u64 = (1 << 5) - 1;

    /// Bitmask for the 5-bit worker ID field. Occupies bits 12 through 16.
    pub const WORKER_ID_MASK: u64 = (1 << 5) - 1;

    /// Bitmask for the 12-bit sequence field. Occupies bits 0 through 11.
    pub const SEQUENCE_MASK: u64 = (1 << 12) - 1;

    /// Number of bits to shift the timestamp to its position (bit 22).
    pub const TIMESTAMP_SHIFT: u64 = 22;

    /// Number of bits to shift the group ID to its position (bit 17).
    pub const GROUP_ID_SHIFT: u64 = 17;

    /// Number of bits to shift the worker ID to its position (bit 12).
    pub const WORKER_ID_SHIFT: u64 = 12;

    /// Number of bits to shift the sequence field (bit 0).
    pub const SEQUENCE_SHIFT: u64 = 0;

    /// Packs the four fields into an ID. Each component is masked to its
    /// field width.
    pub const fn from_components(
        timestamp: u64,
        group_id: u64,
        worker_id: u64,
        sequence: u64,
    ) -> Self {
        let timestamp = (timestamp & Self::TIMESTAMP_MASK) << Self::TIMESTAMP_SHIFT;
        let group_id = (group_id & Self::GROUP_ID_MASK) << Self::GROUP_ID_SHIFT;
        let worker_id = (worker_id & Self::WORKER_ID_MASK) << Self::WORKER_ID_SHIFT;
        let sequence = (sequence & Self::SEQUENCE_MASK) << Self::SEQUENCE_SHIFT;
        Self {
            id: timestamp | group_id | worker_id | sequence,
        }
    }

    /// Extracts the epoch-relative timestamp (milliseconds).
    pub const fn timestamp(&self) -> u64 {
        (self.id >> Self::TIMESTAMP_SHIFT) & Self::TIMESTAMP_MASK
    }

    /// Extracts the group ID.
    pub const fn group_id(&self) -> u64 {
        (self.id >> Self::GROUP_ID_SHIFT) & Self::GROUP_ID_MASK
    }

    /// Extracts the worker ID.
    pub const fn worker_id(&self) -> u64 {
        (self.id >> Self::WORKER_ID_SHIFT) & Self::WORKER_ID_MASK
    }

    /// Extracts the sequence number.
    pub const fn sequence(&self) -> u64 {
        (self.id >> Self::SEQUENCE_SHIFT) & Self::SEQUENCE_MASK
    }

    /// Largest timestamp the layout can hold.
    pub const fn max_timestamp() -> u64 {
        Self::TIMESTAMP_MASK
    }

    /// Largest sequence value issued within a single millisecond.
    pub const fn max_sequence() -> u64 {
        Self::SEQUENCE_MASK
    }

    /// Returns the absolute Unix timestamp (ms) this ID was generated at,
    /// given the epoch of the generator that produced it.
    ///
    /// Returns `None` if the sum does not fit in a `u64`, which only happens
    /// with an epoch no generator could have used.
    ///
    /// # Example
    /// ```
    /// use flakeid::{Epoch, SnowflakeId};
    ///
    /// let epoch = Epoch::from_unix_millis(1_700_000_000_000);
    /// let id = SnowflakeId::from_components(1_500, 3, 7, 0);
    /// assert_eq!(id.unix_millis(epoch), Some(1_700_000_001_500));
    /// ```
    pub const fn unix_millis(&self, epoch: Epoch) -> Option<u64> {
        self.timestamp().checked_add(epoch.as_millis())
    }

    pub const fn to_raw(&self) -> u64 {
        self.id
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self { id: raw }
    }

    /// Returns the ID as a signed integer. The reserved bit is never set by a
    /// generator, so the value is non-negative.
    pub const fn to_i64(&self) -> i64 {
        self.id as i64
    }

    /// Returns the ID as a zero-padded 20-digit string.
    pub fn to_padded_string(&self) -> String {
        format!("{:020}", self.id)
    }
}

impl From<SnowflakeId> for u64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_raw()
    }
}

impl From<SnowflakeId> for i64 {
    fn from(id: SnowflakeId) -> Self {
        id.to_i64()
    }
}

impl fmt::Display for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl fmt::Debug for SnowflakeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = [
            ("timestamp", 41, self.timestamp()),
            ("group", 5, self.group_id()),
            ("worker", 5, self.worker_id()),
            ("sequence", 12, self.sequence()),
        ];

        // Widest of label, decimal and hex per column, plus padding
        let widths: Vec<usize> = fields
            .iter()
            .map(|(name, bits, value)| {
                let label = format!("{name} ({bits})").len();
                let dec = value.to_string().len();
                let hex = format!("0x{value:x}").len();
                label.max(dec).max(hex) + 2
            })
            .collect();

        writeln!(f, "SnowflakeId {{")?;
        writeln!(f, "    raw id     : 0x{:016x} ({})", self.id, self.id)?;

        let rule: String = widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("+");
        writeln!(f, "    +{rule}+")?;

        write!(f, "    |")?;
        for ((name, bits, _), &width) in fields.iter().zip(&widths) {
            write!(f, "{:^width$}|", format!("{name} ({bits})"))?;
        }
        writeln!(f)?;
        writeln!(f, "    +{rule}+")?;

        write!(f, "    |")?;
        for ((_, _, value), &width) in fields.iter().zip(&widths) {
            write!(f, "{value:^width$}|")?;
        }
        writeln!(f)?;

        write!(f, "    |")?;
        for ((_, _, value), &width) in fields.iter().zip(&widths) {
            write!(f, "{:^width$}|", format!("0x{value:x}"))?;
        }
        writeln!(f)?;
        writeln!(f, "    +{rule}+")?;
        write!(f, "}}")
    }
}
