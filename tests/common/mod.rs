//! A simulated transceiver
//!
//! On the tag side it answers every Poll itself, as if a virtual anchor at a
//! known position had received it, so that the ranging session sees
//! physically consistent timestamps. On the anchor side, Polls are delivered
//! from an inbox and transmitted frames are recorded.
#![allow(dead_code)]

use uwb_rtls::{
    configs::{RadioConfig, UwbChannel},
    frame::{encode_response, POLL_LEN},
    radio::{SendTime, SysStatus, Transceiver, TxStart},
    time::{expand_schedule_time, Instant, SPEED_OF_LIGHT, TIME_MAX, TIME_UNIT},
    Position,
};

/// Reply time of the virtual anchors, in their own clock's device time
pub const ANCHOR_REPLY_TICKS: u64 = 1130 * 65536;

/// Sampling frequency over two, divided by 2^17
const F_S_OVER_2_17: f64 = 998.4e6 / 2.0 / 131072.0;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

#[derive(Debug, Clone, Copy)]
pub struct VirtualAnchor {
    pub addr: u16,
    pub pos: Position,
    /// How much faster the anchor's clock runs than the tag's, in ppm
    pub drift_ppm: f64,
    /// Doesn't answer Polls
    pub silent: bool,
}

impl VirtualAnchor {
    pub fn new(addr: u16, pos: Position) -> Self {
        VirtualAnchor {
            addr,
            pos,
            drift_ppm: 0.0,
            silent: false,
        }
    }
}

/// What the simulated radio does to the next Response it delivers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tamper {
    None,
    /// Deliver it from a foreign PAN
    ForeignPan,
    /// Cut off its last byte
    Truncate,
    /// Receive it with a bad checksum
    FcsError,
}

pub struct SimRadio {
    pub pan_id: u16,
    pub addr: u16,
    /// Where the tag is, for Polls answered by virtual anchors
    pub position: Position,
    pub anchors: Vec<VirtualAnchor>,
    pub tamper: Tamper,
    /// Delayed transmissions report `TooLate`
    pub late: bool,
    /// Number of initialization attempts that fail before one succeeds
    pub init_failures: u32,

    /// Polls waiting to be received, on the anchor side
    pub inbox: Vec<Vec<u8>>,
    /// Every frame that was transmitted
    pub sent: Vec<Vec<u8>>,
    /// Destination of every Poll that was transmitted
    pub polled: Vec<u16>,
    /// Schedule time of every delayed transmission
    pub scheduled: Vec<u32>,

    pub init_attempts: u32,
    pub rx_resets: u32,
    pub antenna_delay: Option<(u16, u16)>,
    pub address: Option<(u16, u16)>,
    pub rx_timeout_uus: u16,
    pub rx_after_tx_delay_uus: u32,

    /// The tag's clock, in device time
    pub now: u64,
    status: u32,
    tx_buffer: Vec<u8>,
    rx_buffer: Vec<u8>,
    tx_ts: u64,
    rx_ts: u64,
    integrator: i32,
}

impl SimRadio {
    pub fn new(pan_id: u16, addr: u16) -> Self {
        SimRadio {
            pan_id,
            addr,
            position: Position::default(),
            anchors: Vec::new(),
            tamper: Tamper::None,
            late: false,
            init_failures: 0,
            inbox: Vec::new(),
            sent: Vec::new(),
            polled: Vec::new(),
            scheduled: Vec::new(),
            init_attempts: 0,
            rx_resets: 0,
            antenna_delay: None,
            address: None,
            rx_timeout_uus: 0,
            rx_after_tx_delay_uus: 0,
            // Close to the 40-bit wrap, so exchanges straddle it.
            now: TIME_MAX - 40_000_000,
            status: 0,
            tx_buffer: Vec::new(),
            rx_buffer: Vec::new(),
            tx_ts: 0,
            rx_ts: 0,
            integrator: 0,
        }
    }

    pub fn with_anchors(mut self, anchors: &[VirtualAnchor]) -> Self {
        self.anchors = anchors.to_vec();
        self
    }

    pub fn at(mut self, position: Position) -> Self {
        self.position = position;
        self
    }

    pub fn status(&self) -> SysStatus {
        SysStatus(self.status)
    }

    fn advance(&mut self, ticks: u64) {
        self.now = (self.now + ticks) & TIME_MAX;
    }

    /// Plays the part of the polled anchor
    fn answer_poll(&mut self) {
        let frame = self.tx_buffer.clone();
        let dst = u16::from_le_bytes([frame[5], frame[6]]);
        let src = u16::from_le_bytes([frame[7], frame[8]]);
        let seq = frame[2];
        self.polled.push(dst);

        let poll_tx = self.now;
        self.tx_ts = poll_tx;
        self.status |= SysStatus::TXFRS.0;

        let anchor = match self.anchors.iter().find(|anchor| anchor.addr == dst) {
            Some(anchor) if !anchor.silent => *anchor,
            _ => {
                self.status |= SysStatus::RXRFTO.0;
                self.advance(1_000_000);
                return;
            }
        };

        let distance = anchor.pos.distance_squared(&self.position).sqrt();
        let tof_ticks = distance / SPEED_OF_LIGHT / TIME_UNIT;
        let rate = 1.0 + anchor.drift_ppm / 1e6;

        // The anchor timestamps in its own clock, which runs at `rate`
        // and has an arbitrary origin.
        let poll_rx = (poll_tx + 0x12_3456_789a) & TIME_MAX;
        let resp_tx = (poll_rx + ANCHOR_REPLY_TICKS) & TIME_MAX;
        let reply_in_tag_time = ANCHOR_REPLY_TICKS as f64 / rate;

        let resp_rx = (poll_tx + (2.0 * tof_ticks + reply_in_tag_time).round() as u64) & TIME_MAX;

        let mut response =
            encode_response(self.pan_id, anchor.addr, src, poll_rx, resp_tx, seq).to_vec();
        match self.tamper {
            Tamper::None => {}
            Tamper::ForeignPan => response[3] ^= 0xFF,
            Tamper::Truncate => {
                response.pop();
            }
            Tamper::FcsError => {
                self.status |= SysStatus::RXFCE.0;
                self.advance(1_000_000);
                return;
            }
        }

        // The carrier of a faster clock shows up as a negative offset.
        let f_c = UwbChannel::Channel2.center_frequency_hz() as f64;
        let f_offset_hz = -anchor.drift_ppm * f_c / 1e6;
        self.integrator = (f_offset_hz * 1024.0 / F_S_OVER_2_17).round() as i32;

        self.rx_buffer = response;
        self.rx_ts = resp_rx;
        self.status |= SysStatus::RXFCG.0;
        self.now = resp_rx;
        self.advance(100_000);
    }
}

impl Transceiver for SimRadio {
    type Error = SimError;

    fn initialize(&mut self, _: &RadioConfig) -> Result<(), SimError> {
        self.init_attempts += 1;
        if self.init_failures > 0 {
            self.init_failures -= 1;
            return Err(SimError);
        }
        Ok(())
    }

    fn set_antenna_delay(&mut self, rx_delay: u16, tx_delay: u16) -> Result<(), SimError> {
        self.antenna_delay = Some((rx_delay, tx_delay));
        Ok(())
    }

    fn set_address(&mut self, pan_id: u16, addr: u16) -> Result<(), SimError> {
        self.address = Some((pan_id, addr));
        Ok(())
    }

    fn read_status(&mut self) -> Result<SysStatus, SimError> {
        Ok(SysStatus(self.status))
    }

    fn clear_status(&mut self, flags: SysStatus) -> Result<(), SimError> {
        self.status &= !flags.0;
        Ok(())
    }

    fn rx_reset(&mut self) -> Result<(), SimError> {
        self.rx_resets += 1;
        Ok(())
    }

    fn set_rx_timeout(&mut self, timeout_uus: u16) -> Result<(), SimError> {
        self.rx_timeout_uus = timeout_uus;
        Ok(())
    }

    fn set_rx_after_tx_delay(&mut self, delay_uus: u32) -> Result<(), SimError> {
        self.rx_after_tx_delay_uus = delay_uus;
        Ok(())
    }

    fn enable_rx(&mut self) -> Result<(), SimError> {
        if self.inbox.is_empty() {
            self.status |= SysStatus::RXRFTO.0;
            return Ok(());
        }

        self.rx_buffer = self.inbox.remove(0);
        self.rx_ts = self.now;
        self.status |= SysStatus::RXFCG.0;
        Ok(())
    }

    fn rx_frame_len(&mut self) -> Result<usize, SimError> {
        Ok(self.rx_buffer.len())
    }

    fn read_rx_data(&mut self, buffer: &mut [u8]) -> Result<(), SimError> {
        buffer.copy_from_slice(&self.rx_buffer);
        Ok(())
    }

    fn write_tx_data(&mut self, frame: &[u8]) -> Result<(), SimError> {
        self.tx_buffer = frame.to_vec();
        Ok(())
    }

    fn start_tx(&mut self, send_time: SendTime, response_expected: bool) -> Result<TxStart, SimError> {
        match send_time {
            SendTime::Now => {
                self.sent.push(self.tx_buffer.clone());
                if response_expected && self.tx_buffer.len() == POLL_LEN {
                    self.answer_poll();
                } else {
                    self.tx_ts = self.now;
                    self.status |= SysStatus::TXFRS.0;
                }
            }
            SendTime::Delayed(schedule_time) => {
                if self.late {
                    return Ok(TxStart::TooLate);
                }
                self.scheduled.push(schedule_time);
                self.sent.push(self.tx_buffer.clone());
                let tx_delay = self.antenna_delay.map_or(0, |(_, tx)| tx as u64);
                self.tx_ts = (expand_schedule_time(schedule_time) + tx_delay) & TIME_MAX;
                self.status |= SysStatus::TXFRS.0;
            }
        }
        Ok(TxStart::Started)
    }

    fn tx_timestamp(&mut self) -> Result<Instant, SimError> {
        Ok(Instant::from_register(self.tx_ts))
    }

    fn rx_timestamp(&mut self) -> Result<Instant, SimError> {
        Ok(Instant::from_register(self.rx_ts))
    }

    fn carrier_integrator(&mut self) -> Result<i32, SimError> {
        Ok(self.integrator)
    }
}
