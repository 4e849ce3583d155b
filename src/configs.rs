//! Configuration structs for ranging and positioning
//!
//! Everything here is fixed at deployment time. There is no runtime
//! reconfiguration; a node is built with one [`Config`] and, for tags, one
//! anchor table.

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::rtls::Anchor;

/// PAN id used by [`Config::default`]
pub const DEFAULT_PAN_ID: u16 = 0xDECA;

/// Antenna delay of the reference hardware, in device time units
pub const DEFAULT_ANTENNA_DELAY: u16 = 16436;

/// Largest anchor table accepted by [`AnchorSet`]
pub const MAX_ANCHORS: usize = 16;

/// Ranging node configuration
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Config {
    /// PAN id that frames are sent with and filtered against
    pub pan_id: u16,
    /// Own short address
    pub addr: u16,
    /// Ranging scheme
    pub mode: TwrMode,
    /// PHY settings of the transceiver
    pub radio: RadioConfig,
    /// Antenna delays programmed during bring-up
    pub antenna_delay: AntennaDelay,
    /// Delays and timeouts of the ranging exchange
    pub timeouts: Timeouts,
    /// Only answer Polls from this initiator
    ///
    /// Only meaningful for responders. `None` answers any initiator on the
    /// PAN, so the source address of a Poll is not checked at all.
    pub accept_from: Option<u16>,
}

impl Config {
    /// Creates a single-sided ranging configuration for the given PAN and address
    pub fn new(pan_id: u16, addr: u16) -> Self {
        Config {
            pan_id,
            addr,
            ..Default::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            pan_id: DEFAULT_PAN_ID,
            addr: 0,
            mode: TwrMode::SingleSided,
            radio: RadioConfig::for_mode(TwrMode::SingleSided),
            antenna_delay: AntennaDelay::default(),
            timeouts: Timeouts::default(),
            accept_from: None,
        }
    }
}

/// The two-way ranging scheme
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TwrMode {
    /// Poll/Response, with clock drift corrected from the carrier offset
    SingleSided,
    /// Poll/Response/Final. Not implemented; exchanges report `Unsupported`.
    DoubleSided,
}

/// RX and TX antenna delays, in device time units
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AntennaDelay {
    /// Subtracted from RX timestamps by the transceiver
    pub rx: u16,
    /// Added to TX timestamps by the transceiver
    pub tx: u16,
}

impl Default for AntennaDelay {
    fn default() -> Self {
        AntennaDelay {
            rx: DEFAULT_ANTENNA_DELAY,
            tx: DEFAULT_ANTENNA_DELAY,
        }
    }
}

/// Delays and timeouts of a ranging exchange
///
/// Hardware delays are in "UWB microseconds" (uus, 512/499.2 µs). Software
/// wait bounds are in regular microseconds.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timeouts {
    /// Initiator: delay between Poll TX and turning on the receiver
    pub poll_tx_to_resp_rx_uus: u32,
    /// Initiator: hardware frame-wait timeout for the Response
    pub resp_rx_timeout_uus: u16,
    /// Responder: hardware frame-wait timeout for a Poll
    pub poll_rx_timeout_uus: u16,
    /// Responder: delay between Poll RX and Response TX
    ///
    /// Measured on the reference hardware. Too short a delay makes the
    /// delayed transmission miss its slot.
    pub poll_rx_to_resp_tx_uus: u16,
    /// Initiator: software bound on waiting for the Response
    pub response_wait_us: u32,
    /// Responder: software bound on waiting for a Poll
    pub poll_wait_us: u32,
    /// Software bound on waiting for a transmission to complete
    pub tx_done_wait_us: u32,
    /// Interval between two status register reads while waiting
    pub status_poll_interval_us: u32,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            poll_tx_to_resp_rx_uus: 140 + 800,
            resp_rx_timeout_uus: 210,
            // 16-bit maximum, about 67 ms
            poll_rx_timeout_uus: u16::MAX,
            poll_rx_to_resp_tx_uus: 330 + 800,
            response_wait_us: 10_000,
            poll_wait_us: 80_000,
            tx_done_wait_us: 5_000,
            status_poll_interval_us: 10,
        }
    }
}

/// Positioning cycle configuration
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PositioningConfig {
    /// Period of the positioning cycle
    pub period_ms: u32,
    /// Pause between two ranging exchanges of the same cycle
    pub exchange_gap_ms: u32,
}

impl Default for PositioningConfig {
    fn default() -> Self {
        PositioningConfig {
            period_ms: 200,
            exchange_gap_ms: 10,
        }
    }
}

/// An anchor table that is large enough to position with
#[derive(Copy, Clone, Debug)]
pub struct AnchorSet<'a> {
    anchors: &'a [Anchor],
}

impl<'a> AnchorSet<'a> {
    /// Validates an anchor table
    ///
    /// At least 4 and at most [`MAX_ANCHORS`] anchors are required.
    pub fn new(anchors: &'a [Anchor]) -> Result<Self, ConfigError> {
        if anchors.len() < 4 {
            return Err(ConfigError::TooFewAnchors);
        }
        if anchors.len() > MAX_ANCHORS {
            return Err(ConfigError::TooManyAnchors);
        }

        Ok(AnchorSet { anchors })
    }

    /// Returns the anchors
    pub fn anchors(&self) -> &'a [Anchor] {
        self.anchors
    }

    /// Looks up an anchor by address
    pub fn get(&self, addr: u16) -> Option<&'a Anchor> {
        self.anchors.iter().find(|anchor| anchor.addr == addr)
    }
}

/// An invalid configuration
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum ConfigError {
    /// Fewer than 4 anchors were configured
    TooFewAnchors,
    /// More than [`MAX_ANCHORS`] anchors were configured
    TooManyAnchors,
}

/// PHY settings of the transceiver
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RadioConfig {
    /// The channel to transmit and listen on
    pub channel: UwbChannel,
    /// Pulse repetition frequency
    pub pulse_repetition_frequency: PulseRepetitionFrequency,
    /// Preamble length, used in TX only
    pub preamble_length: PreambleLength,
    /// Preamble acquisition chunk size, used in RX only
    pub pac_size: PacSize,
    /// TX preamble code
    pub tx_preamble_code: u8,
    /// RX preamble code
    pub rx_preamble_code: u8,
    /// SFD sequence
    pub sfd_sequence: SfdSequence,
    /// Data rate
    pub bitrate: BitRate,
    /// SFD timeout in symbols (preamble length + 1 + SFD length - PAC size)
    pub sfd_timeout: u16,
    /// Enable frame filtering
    ///
    /// If true, only frames addressed to this node's PAN and short address,
    /// and broadcasts, will be received.
    pub frame_filtering: bool,
}

impl RadioConfig {
    /// The PHY settings the reference deployment uses for each ranging scheme
    ///
    /// Single-sided ranging uses a short preamble at 6.8 Mbps to keep the
    /// exchange short, since clock drift grows with the reply time.
    /// Double-sided ranging trades airtime for range.
    pub fn for_mode(mode: TwrMode) -> Self {
        let channel = UwbChannel::Channel2;
        let prf = PulseRepetitionFrequency::Mhz64;
        let preamble_code = channel.recommended_preamble_code(prf);

        match mode {
            TwrMode::SingleSided => RadioConfig {
                channel,
                pulse_repetition_frequency: prf,
                preamble_length: PreambleLength::Symbols128,
                pac_size: PacSize::Symbols8,
                tx_preamble_code: preamble_code,
                rx_preamble_code: preamble_code,
                sfd_sequence: SfdSequence::Ieee,
                bitrate: BitRate::Kbps6800,
                sfd_timeout: 129 + 8 - 8,
                frame_filtering: true,
            },
            TwrMode::DoubleSided => RadioConfig {
                channel,
                pulse_repetition_frequency: prf,
                preamble_length: PreambleLength::Symbols1024,
                pac_size: PacSize::Symbols32,
                tx_preamble_code: preamble_code,
                rx_preamble_code: preamble_code,
                sfd_sequence: SfdSequence::Decawave,
                bitrate: BitRate::Kbps110,
                sfd_timeout: 1025 + 64 - 32,
                frame_filtering: true,
            },
        }
    }
}

impl Default for RadioConfig {
    fn default() -> Self {
        RadioConfig::for_mode(TwrMode::SingleSided)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// The bitrate at which a message is transmitted
pub enum BitRate {
    /// 110 kilobits per second.
    /// This is an unofficial extension from decawave.
    Kbps110 = 0b00,
    /// 850 kilobits per second.
    Kbps850 = 0b01,
    /// 6.8 megabits per second.
    Kbps6800 = 0b10,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// The PRF value
pub enum PulseRepetitionFrequency {
    /// 16 megahertz
    Mhz16 = 0b01,
    /// 64 megahertz
    Mhz64 = 0b10,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// An enum that specifies the length of the preamble.
///
/// Longer preambles improve the reception quality and thus range.
/// This comes at the cost of longer transmission times and thus power consumption and bandwidth use.
pub enum PreambleLength {
    /// 64 symbols of preamble.
    Symbols64,
    /// 128 symbols of preamble.
    Symbols128,
    /// 256 symbols of preamble.
    Symbols256,
    /// 512 symbols of preamble.
    Symbols512,
    /// 1024 symbols of preamble.
    Symbols1024,
    /// 1536 symbols of preamble.
    Symbols1536,
    /// 2048 symbols of preamble.
    Symbols2048,
    /// 4096 symbols of preamble.
    Symbols4096,
}

impl PreambleLength {
    /// Gets the recommended PAC size based on the preamble length.
    pub fn recommended_pac_size(&self) -> PacSize {
        match self {
            PreambleLength::Symbols64 | PreambleLength::Symbols128 => PacSize::Symbols8,
            PreambleLength::Symbols256 | PreambleLength::Symbols512 => PacSize::Symbols16,
            PreambleLength::Symbols1024 => PacSize::Symbols32,
            _ => PacSize::Symbols64,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// Preamble acquisition chunk size
pub enum PacSize {
    /// 8 symbols
    Symbols8,
    /// 16 symbols
    Symbols16,
    /// 32 symbols
    Symbols32,
    /// 64 symbols
    Symbols64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// An enum that allows the selection between different SFD sequences
pub enum SfdSequence {
    /// The standard sequence defined by the IEEE standard.
    Ieee,
    /// A sequence defined by Decawave that is supposed to be more robust.
    /// This is an unofficial addition.
    Decawave,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
/// The UWB channels supported by the transceiver
pub enum UwbChannel {
    /// Channel 1, centre frequency 3494.4 MHz
    Channel1,
    /// Channel 2, centre frequency 3993.6 MHz
    Channel2,
    /// Channel 3, centre frequency 4492.8 MHz
    Channel3,
    /// Channel 4, centre frequency 3993.6 MHz (wide band)
    Channel4,
    /// Channel 5, centre frequency 6489.6 MHz
    Channel5,
    /// Channel 7, centre frequency 6489.6 MHz (wide band)
    Channel7,
}

impl UwbChannel {
    /// Centre frequency of the channel in Hz
    pub fn center_frequency_hz(&self) -> u64 {
        match self {
            UwbChannel::Channel1 => 3_494_400_000,
            UwbChannel::Channel2 | UwbChannel::Channel4 => 3_993_600_000,
            UwbChannel::Channel3 => 4_492_800_000,
            UwbChannel::Channel5 | UwbChannel::Channel7 => 6_489_600_000,
        }
    }

    /// Gets the recommended preamble code
    pub fn recommended_preamble_code(&self, prf_value: PulseRepetitionFrequency) -> u8 {
        match (self, prf_value) {
            (UwbChannel::Channel1, PulseRepetitionFrequency::Mhz16) => 1,
            (UwbChannel::Channel2, PulseRepetitionFrequency::Mhz16) => 3,
            (UwbChannel::Channel3, PulseRepetitionFrequency::Mhz16) => 5,
            (UwbChannel::Channel4, PulseRepetitionFrequency::Mhz16) => 7,
            (UwbChannel::Channel5, PulseRepetitionFrequency::Mhz16) => 4,
            (UwbChannel::Channel7, PulseRepetitionFrequency::Mhz16) => 8,
            (UwbChannel::Channel4 | UwbChannel::Channel7, PulseRepetitionFrequency::Mhz64) => 17,
            (_, PulseRepetitionFrequency::Mhz64) => 9,
        }
    }
}
