//! The transceiver capabilities the ranging core relies on
//!
//! The register-level driver is not part of this crate. Instead, ranging is
//! written against [`Transceiver`], which any driver can implement. All
//! methods are plain blocking register accesses; the only waiting happens in
//! [`wait_for_status`], which is bounded by an explicit timeout.

use core::{fmt, ops::BitOr};

use embedded_hal::delay::DelayNs;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::{configs::RadioConfig, time::Instant, Error};

pub use carrier_freq_offset::*;

mod carrier_freq_offset;

/// Transceiver operations needed by two-way ranging
pub trait Transceiver {
    /// Error of the underlying bus or driver
    type Error: fmt::Debug;

    /// Resets the chip and applies the PHY configuration
    ///
    /// May fail transiently right after power-up; callers retry.
    fn initialize(&mut self, config: &RadioConfig) -> Result<(), Self::Error>;

    /// Sets the RX and TX antenna delays, in device time units
    fn set_antenna_delay(&mut self, rx_delay: u16, tx_delay: u16) -> Result<(), Self::Error>;

    /// Sets the PAN id and short address used for frame filtering
    fn set_address(&mut self, pan_id: u16, addr: u16) -> Result<(), Self::Error>;

    /// Reads the system status register
    fn read_status(&mut self) -> Result<SysStatus, Self::Error>;

    /// Clears the given status flags
    fn clear_status(&mut self, flags: SysStatus) -> Result<(), Self::Error>;

    /// Soft-resets the receiver
    fn rx_reset(&mut self) -> Result<(), Self::Error>;

    /// Sets the hardware frame-wait timeout of the next reception
    ///
    /// Zero disables the timeout.
    fn set_rx_timeout(&mut self, timeout_uus: u16) -> Result<(), Self::Error>;

    /// Sets the delay between the end of a transmission that expects a
    /// response and turning on the receiver
    fn set_rx_after_tx_delay(&mut self, delay_uus: u32) -> Result<(), Self::Error>;

    /// Turns on the receiver immediately
    fn enable_rx(&mut self) -> Result<(), Self::Error>;

    /// Length of the received frame, without FCS
    fn rx_frame_len(&mut self) -> Result<usize, Self::Error>;

    /// Copies the received frame into `buffer`
    ///
    /// `buffer` is exactly as long as the frame, as reported by
    /// [`Transceiver::rx_frame_len`].
    fn read_rx_data(&mut self, buffer: &mut [u8]) -> Result<(), Self::Error>;

    /// Writes a frame into the TX buffer; the transceiver appends the FCS
    fn write_tx_data(&mut self, frame: &[u8]) -> Result<(), Self::Error>;

    /// Starts transmitting the frame in the TX buffer
    ///
    /// If `response_expected` is set, the receiver is turned on automatically
    /// after the configured RX-after-TX delay.
    fn start_tx(
        &mut self,
        send_time: SendTime,
        response_expected: bool,
    ) -> Result<TxStart, Self::Error>;

    /// Timestamp of the last transmitted frame
    fn tx_timestamp(&mut self) -> Result<Instant, Self::Error>;

    /// Timestamp of the last received frame
    fn rx_timestamp(&mut self) -> Result<Instant, Self::Error>;

    /// Carrier recovery integrator value of the last received frame
    ///
    /// See [`CarrierFreqOffset`] for how to interpret it.
    fn carrier_integrator(&mut self) -> Result<i32, Self::Error>;
}

/// The time at which the transmission will start
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum SendTime {
    /// As fast as possible
    Now,
    /// At the given delayed-TX schedule time
    ///
    /// See [`truncate_to_schedule_time`](crate::time::truncate_to_schedule_time).
    Delayed(u32),
}

/// Outcome of starting a transmission
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum TxStart {
    /// The transmission has started or is scheduled
    Started,
    /// The scheduled time had already passed, nothing was sent
    TooLate,
}

/// Flags of the system status register
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct SysStatus(pub u32);

impl SysStatus {
    /// Transmit Frame Sent
    pub const TXFRS: SysStatus = SysStatus(1 << 7);
    /// Receiver PHY Header Error
    pub const RXPHE: SysStatus = SysStatus(1 << 12);
    /// Receiver FCS Good
    pub const RXFCG: SysStatus = SysStatus(1 << 14);
    /// Receiver FCS Error
    pub const RXFCE: SysStatus = SysStatus(1 << 15);
    /// Receiver Reed Solomon Frame Sync Loss
    pub const RXRFSL: SysStatus = SysStatus(1 << 16);
    /// Receiver Frame Wait Timeout
    pub const RXRFTO: SysStatus = SysStatus(1 << 17);
    /// Leading Edge Detection Processing Error
    pub const LDEERR: SysStatus = SysStatus(1 << 18);
    /// Preamble Detection Timeout
    pub const RXPTO: SysStatus = SysStatus(1 << 21);
    /// Receiver SFD Timeout
    pub const RXSFDTO: SysStatus = SysStatus(1 << 26);
    /// Automatic Frame Filtering Rejection
    pub const AFFREJ: SysStatus = SysStatus(1 << 29);

    /// Every receive error flag
    pub const ALL_RX_ERR: SysStatus = SysStatus(
        Self::RXPHE.0
            | Self::RXFCE.0
            | Self::RXRFSL.0
            | Self::RXSFDTO.0
            | Self::AFFREJ.0
            | Self::LDEERR.0,
    );

    /// Every receive timeout flag
    pub const ALL_RX_TO: SysStatus = SysStatus(Self::RXRFTO.0 | Self::RXPTO.0);

    /// Every flag that ends a reception, good or bad
    pub const RX_DONE: SysStatus =
        SysStatus(Self::RXFCG.0 | Self::ALL_RX_ERR.0 | Self::ALL_RX_TO.0);

    /// Returns true if all flags of `flags` are set
    pub fn contains(&self, flags: SysStatus) -> bool {
        self.0 & flags.0 == flags.0
    }

    /// Returns true if any flag of `flags` is set
    pub fn intersects(&self, flags: SysStatus) -> bool {
        self.0 & flags.0 != 0
    }
}

impl BitOr for SysStatus {
    type Output = SysStatus;

    fn bitor(self, rhs: SysStatus) -> SysStatus {
        SysStatus(self.0 | rhs.0)
    }
}

/// Checks whether any of the status flags in `mask` is set
///
/// This method returns an `nb::Result` to indicate whether the awaited event
/// has happened. Use [`wait_for_status`] for a bounded blocking wait.
pub fn poll_status<R>(radio: &mut R, mask: SysStatus) -> nb::Result<SysStatus, R::Error>
where
    R: Transceiver,
{
    let status = radio.read_status().map_err(nb::Error::Other)?;

    if status.intersects(mask) {
        Ok(status)
    } else {
        Err(nb::Error::WouldBlock)
    }
}

/// Waits until any of the status flags in `mask` is set
///
/// Gives up with [`Error::Timeout`] after roughly `timeout_us` microseconds,
/// reading the status register every `interval_us` microseconds. The wait
/// can't be cut short other than by the timeout.
pub fn wait_for_status<R, D>(
    radio: &mut R,
    delay: &mut D,
    mask: SysStatus,
    timeout_us: u32,
    interval_us: u32,
) -> Result<SysStatus, Error<R::Error>>
where
    R: Transceiver,
    D: DelayNs,
{
    let interval_us = interval_us.max(1);
    let mut waited_us: u32 = 0;

    loop {
        match poll_status(radio, mask) {
            Ok(status) => return Ok(status),
            Err(nb::Error::Other(error)) => return Err(Error::Radio(error)),
            Err(nb::Error::WouldBlock) => {}
        }

        if waited_us >= timeout_us {
            return Err(Error::Timeout);
        }

        delay.delay_us(interval_us);
        waited_us = waited_us.saturating_add(interval_us);
    }
}
