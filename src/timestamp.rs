//! PTP timestamp and time-interval representations.
//!
//! IEEE 1588 uses 80-bit timestamps (48-bit seconds + 32-bit nanoseconds)
//! and a signed 64-bit scaled-nanosecond unit (nanoseconds × 2^16) for the
//! correctionField and all residence-time/asymmetry arithmetic. This module
//! provides both with lossless wire round-tripping.

use serde::{Deserialize, Serialize};

/// IEEE 1588 PTP timestamp: 48-bit seconds + 32-bit nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PtpTimestamp {
    /// Seconds since the PTP epoch (TAI).
    pub seconds: u64,
    /// Nanoseconds within the current second (`0..999_999_999`).
    pub nanoseconds: u32,
}

impl PtpTimestamp {
    /// Nanoseconds per second.
    pub const NANOS_PER_SEC: u32 = 1_000_000_000;

    /// Zero timestamp.
    pub const ZERO: Self = Self {
        seconds: 0,
        nanoseconds: 0,
    };

    /// Create a new timestamp, clamping nanoseconds to valid range.
    #[must_use]
    pub fn new(seconds: u64, nanoseconds: u32) -> Self {
        Self {
            seconds,
            nanoseconds: nanoseconds.min(Self::NANOS_PER_SEC - 1),
        }
    }

    /// Convert to total nanoseconds since epoch.
    #[must_use]
    pub fn to_nanos(&self) -> i128 {
        i128::from(self.seconds) * i128::from(Self::NANOS_PER_SEC) + i128::from(self.nanoseconds)
    }

    /// Create from total nanoseconds since epoch.
    ///
    /// Negative values clamp to [`Self::ZERO`].
    #[must_use]
    pub fn from_nanos(nanos: i128) -> Self {
        if nanos <= 0 {
            return Self::ZERO;
        }
        let seconds = u64::try_from(nanos / i128::from(Self::NANOS_PER_SEC)).unwrap_or(u64::MAX);
        let nanoseconds =
            u32::try_from(nanos % i128::from(Self::NANOS_PER_SEC)).unwrap_or(Self::NANOS_PER_SEC - 1);
        Self {
            seconds,
            nanoseconds,
        }
    }

    /// Signed difference in nanoseconds: `self - other`.
    #[must_use]
    pub fn diff_nanos(&self, other: &Self) -> i128 {
        self.to_nanos() - other.to_nanos()
    }

    /// The scaled-nanosecond interval `self - earlier`.
    ///
    /// This is the residence-time subtraction used throughout the
    /// forwarding paths; the result saturates at the [`TimeInterval`]
    /// range limits.
    #[must_use]
    pub fn interval_since(&self, earlier: &Self) -> TimeInterval {
        TimeInterval::from_nanos_i128(self.diff_nanos(earlier))
    }

    /// Encode as IEEE 1588 wire format: 6-byte seconds (BE) + 4-byte nanoseconds (BE).
    ///
    /// Returns 10 bytes.
    #[must_use]
    pub fn encode_ieee1588(&self) -> [u8; 10] {
        let mut buf = [0u8; 10];
        let sec_bytes = self.seconds.to_be_bytes();
        // 48-bit seconds: take lower 6 bytes of the 8-byte u64
        buf[0..6].copy_from_slice(&sec_bytes[2..8]);
        buf[6..10].copy_from_slice(&self.nanoseconds.to_be_bytes());
        buf
    }

    /// Decode from IEEE 1588 wire format: 6-byte seconds (BE) + 4-byte nanoseconds (BE).
    ///
    /// Returns `None` if the slice is too short.
    #[must_use]
    pub fn decode_ieee1588(data: &[u8]) -> Option<Self> {
        if data.len() < 10 {
            return None;
        }
        let seconds =
            u64::from_be_bytes([0, 0, data[0], data[1], data[2], data[3], data[4], data[5]]);
        let nanoseconds = u32::from_be_bytes([data[6], data[7], data[8], data[9]]);
        Some(Self {
            seconds,
            nanoseconds,
        })
    }
}

impl std::fmt::Display for PtpTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:09}", self.seconds, self.nanoseconds)
    }
}

/// A signed PTP time interval in scaled nanoseconds (ns × 2^16).
///
/// This is the unit of the on-wire correctionField and of every
/// residence-time and asymmetry value handled by the forwarding engine.
/// The 16 fractional bits give sub-nanosecond resolution.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct TimeInterval(pub i64);

impl TimeInterval {
    /// Number of fractional bits in the scaled representation.
    pub const FRACTIONAL_BITS: u32 = 16;

    /// Zero interval.
    pub const ZERO: Self = Self(0);

    /// Create from whole nanoseconds.
    #[must_use]
    pub fn from_nanos(nanos: i64) -> Self {
        Self(nanos.saturating_mul(1 << Self::FRACTIONAL_BITS))
    }

    /// Create from a wide nanosecond value, saturating at the range limits.
    #[must_use]
    pub fn from_nanos_i128(nanos: i128) -> Self {
        let scaled = nanos.saturating_mul(1 << Self::FRACTIONAL_BITS);
        Self(i64::try_from(scaled).unwrap_or(if scaled < 0 { i64::MIN } else { i64::MAX }))
    }

    /// Whole nanoseconds (fraction truncated toward zero).
    #[must_use]
    pub fn nanos(&self) -> i64 {
        self.0 / (1 << Self::FRACTIONAL_BITS)
    }

    /// The raw scaled-nanosecond value.
    #[must_use]
    pub fn raw(&self) -> i64 {
        self.0
    }
}

impl std::ops::Add for TimeInterval {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::AddAssign for TimeInterval {
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl std::ops::Sub for TimeInterval {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl std::ops::Neg for TimeInterval {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(self.0.saturating_neg())
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let abs = self.0.unsigned_abs();
        let nanos = abs >> Self::FRACTIONAL_BITS;
        // four decimal digits of the 1/65536 ns fraction
        let frac = (abs & 0xFFFF) * 10_000 / 65_536;
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}{nanos}.{frac:04}ns")
    }
}
