//! Device time and the timestamp arithmetic used by two-way ranging
//!
//! The transceiver counts time in a free-running 40-bit counter with a unit of
//! 1/(128*499.2*10^6) seconds (~15.65 ps). Three encodings of that time show
//! up in the ranging path:
//!
//! - full 40-bit timestamps ([`Instant`]), as read from the TX/RX timestamp
//!   registers,
//! - 32-bit delayed-transmission times ([`truncate_to_schedule_time`]), which
//!   drop the low 8 bits and can only address even 512-tick boundaries,
//! - the low 32 bits of a timestamp, which is what travels in a Response frame
//!   and what [`time_of_flight`] works on. Only differences of these are ever
//!   used, so wrapping is harmless.

use core::ops::{Add, Sub};

#[cfg(feature = "defmt")]
use defmt::Format;

/// The maximum value of 40-bit system time stamps.
pub const TIME_MAX: u64 = 0xffffffffff;

/// Duration of one device time unit, in seconds
pub const TIME_UNIT: f64 = 1.0 / 499.2e6 / 128.0;

/// Device time units per "UWB microsecond" (512/499.2 µs)
pub const UUS_TO_DEVICE_TIME: u64 = 65536;

/// Propagation speed used to turn time of flight into distance, in m/s
///
/// This is the speed of light in air rather than in vacuum.
pub const SPEED_OF_LIGHT: f64 = 299_702_547.0;

/// Represents an instant in device time
///
/// Internally uses the same 40-bit timestamps that the transceiver uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Instant(u64);

impl Instant {
    /// Creates a new instance of `Instant`
    ///
    /// The given value must fit in a 40-bit timestamp, so:
    /// 0 <= `value` <= 2^40 - 1
    ///
    /// Returns `Some(...)`, if `value` is within the valid range, `None` if it
    /// isn't.
    ///
    /// # Example
    ///
    /// ``` rust
    /// use uwb_rtls::time::{
    ///     TIME_MAX,
    ///     Instant,
    /// };
    ///
    /// let valid_instant   = Instant::new(TIME_MAX);
    /// let invalid_instant = Instant::new(TIME_MAX + 1);
    ///
    /// assert!(valid_instant.is_some());
    /// assert!(invalid_instant.is_none());
    /// ```
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Instant(value))
        } else {
            None
        }
    }

    /// Creates an `Instant` from any 64-bit value, keeping its low 40 bits
    ///
    /// Timestamp registers are 40 bits wide and are usually read into a wider
    /// container, so this is the lossless way in for register values.
    pub fn from_register(value: u64) -> Self {
        Instant(value & TIME_MAX)
    }

    /// Reconstructs the transmit instant implied by a delayed-TX schedule time
    ///
    /// See [`expand_schedule_time`].
    pub fn from_schedule_time(schedule_time: u32) -> Self {
        Instant(expand_schedule_time(schedule_time))
    }

    /// Returns the raw 40-bit timestamp
    ///
    /// The returned value is guaranteed to be in the following range:
    /// 0 <= `value` <= 2^40 - 1
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Returns the low 32 bits of the timestamp
    ///
    /// This is the form that is carried in Response frames and used for
    /// time-of-flight arithmetic.
    pub fn low32(&self) -> u32 {
        self.0 as u32
    }

    /// Returns the delayed-TX schedule time closest below this instant
    pub fn schedule_time(&self) -> u32 {
        truncate_to_schedule_time(self.0)
    }

    /// Returns the amount of time passed between the two `Instant`s
    ///
    /// Assumes that `&self` represents a later time than the argument
    /// `earlier`. Please make sure that this is the case, as this method has no
    /// way of knowing (device timestamps can overflow, so comparing the
    /// numerical value of the timestamp doesn't tell anything about order).
    ///
    /// # Example
    ///
    /// ``` rust
    /// use uwb_rtls::time::{
    ///     TIME_MAX,
    ///     Instant,
    /// };
    ///
    /// let instant_1 = Instant::new(TIME_MAX - 50).unwrap();
    /// let instant_2 = Instant::new(TIME_MAX).unwrap();
    /// let instant_3 = Instant::new(49).unwrap();
    ///
    /// let duration = instant_2.duration_since(instant_1);
    /// assert_eq!(duration.value(), 50);
    ///
    /// // Still works across the 40-bit wrap.
    /// let duration = instant_3.duration_since(instant_2);
    /// assert_eq!(duration.value(), 50);
    /// ```
    pub fn duration_since(&self, earlier: Instant) -> Duration {
        Duration(self.0.wrapping_sub(earlier.0) & TIME_MAX)
    }
}

impl Add<Duration> for Instant {
    type Output = Instant;

    fn add(self, rhs: Duration) -> Self::Output {
        // Both operands are 40-bit numbers, so the sum can't overflow `u64`.
        Instant((self.0 + rhs.0) & TIME_MAX)
    }
}

impl Sub<Duration> for Instant {
    type Output = Instant;

    fn sub(self, rhs: Duration) -> Self::Output {
        Instant(self.0.wrapping_sub(rhs.0) & TIME_MAX)
    }
}

/// A duration between two instants in device time
///
/// Internally uses the same 40-bit timestamps that the transceiver uses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(C)]
pub struct Duration(u64);

impl Duration {
    /// Creates a new instance of `Duration`
    ///
    /// The given value must fit in a 40-bit timestamp, so:
    /// 0 <= `value` <= 2^40 - 1
    ///
    /// Returns `Some(...)`, if `value` is within the valid range, `None` if it
    /// isn't.
    pub fn new(value: u64) -> Option<Self> {
        if value <= TIME_MAX {
            Some(Duration(value))
        } else {
            None
        }
    }

    /// Creates a `Duration` from a number of "UWB microseconds"
    ///
    /// One UWB microsecond is 65536 device time units (~1.0256 µs). A `u16`
    /// worth of them always fits into 40 bits.
    pub fn from_uus(uus: u16) -> Self {
        Duration(uus as u64 * UUS_TO_DEVICE_TIME)
    }

    /// Returns the raw 40-bit value
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Antenna delays are programmed as 16-bit device time values.
impl From<u16> for Duration {
    fn from(ticks: u16) -> Self {
        Duration(ticks as u64)
    }
}

/// Converts a 40-bit timestamp into a 32-bit delayed-TX schedule time
///
/// Drops the 8 low-order bits and clears bit 0 of the result, since delayed
/// transmissions can only be scheduled on even 512-tick boundaries.
pub fn truncate_to_schedule_time(timestamp: u64) -> u32 {
    ((timestamp >> 8) as u32) & !1
}

/// Converts a delayed-TX schedule time back into a 40-bit timestamp
///
/// This is the instant the transceiver will actually transmit at, before the
/// TX antenna delay is added.
pub fn expand_schedule_time(schedule_time: u32) -> u64 {
    (schedule_time as u64) << 8
}

/// Single-sided TWR time of flight, in seconds
///
/// All timestamps are the low 32 bits of device time. `poll_tx_ts` and
/// `resp_rx_ts` come from the initiator's clock, `poll_rx_ts` and `resp_tx_ts`
/// from the responder's. `clock_offset_ratio` is the relative drift of the
/// responder's clock against the initiator's, as derived from the carrier
/// frequency offset (see [`CarrierFreqOffset`]).
///
/// [`CarrierFreqOffset`]: crate::radio::CarrierFreqOffset
pub fn time_of_flight(
    poll_tx_ts: u32,
    poll_rx_ts: u32,
    resp_tx_ts: u32,
    resp_rx_ts: u32,
    clock_offset_ratio: f64,
) -> f64 {
    let round_trip = resp_rx_ts.wrapping_sub(poll_tx_ts) as f64;
    let reply = resp_tx_ts.wrapping_sub(poll_rx_ts) as f64;

    ((round_trip - reply * (1.0 - clock_offset_ratio)) / 2.0) * TIME_UNIT
}

/// Converts a time of flight in seconds into a distance in meters
pub fn distance(time_of_flight: f64) -> f64 {
    time_of_flight * SPEED_OF_LIGHT
}
