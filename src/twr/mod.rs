//! Two-way ranging sessions
//!
//! A [`Session`] owns the transceiver for the lifetime of a node and runs one
//! ranging exchange at a time, either as the initiator (tag) or as the
//! responder (anchor). The ranging scheme is picked by [`Config::mode`] and
//! dispatched to an [`Exchange`] implementation.
//!
//! Every exchange ends with the receiver reset, whatever its outcome, so that
//! no stale frame or status flag leaks into the next one.

use core::num::Wrapping;

use embedded_hal::delay::DelayNs;

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::{
    configs::{Config, TwrMode},
    radio::{SysStatus, Transceiver},
    time::Instant,
    Error,
};

pub use double_sided::DoubleSided;
pub use single_sided::SingleSided;

mod double_sided;
mod single_sided;

/// How long bring-up keeps retrying to initialize the transceiver
const INIT_TIMEOUT_MS: u32 = 2000;

/// Pause between two initialization attempts
const INIT_RETRY_MS: u32 = 10;

/// A ranging scheme
///
/// Implementations drive a single exchange on the session's transceiver. They
/// don't need to clean up after themselves; [`Session`] resets the receiver
/// once the exchange is over.
pub trait Exchange {
    /// Ranges against the responder at `target`, returning the distance in meters
    fn initiate<R, D>(session: &mut Session<R, D>, target: u16) -> Result<f64, Error<R::Error>>
    where
        R: Transceiver,
        D: DelayNs;

    /// Waits for a Poll and answers it
    fn respond<R, D>(session: &mut Session<R, D>) -> Result<Reply, Error<R::Error>>
    where
        R: Transceiver,
        D: DelayNs;
}

/// The frame a session is waiting for
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum ExchangeKind {
    /// A responder waiting for an initiator's Poll
    Poll,
    /// An initiator waiting for the responder's Response
    Response,
}

/// Where a session is in its current exchange
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub enum ExchangeState {
    /// No exchange in progress
    Idle,
    /// A frame has been sent or the receiver armed, and a peer frame is awaited
    AwaitingPeer(ExchangeKind),
}

/// What a responder did to answer a Poll
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Reply {
    /// Address of the initiator that sent the Poll
    pub peer: u16,
    /// When the Poll was received
    pub poll_rx: Instant,
    /// When the Response was scheduled to leave the antenna
    pub resp_tx: Instant,
}

/// A ranging session
///
/// Holds everything that lives as long as the node does: the transceiver, a
/// delay provider for bounded waits, the configuration and the sequence
/// counter.
pub struct Session<R, D> {
    pub(crate) radio: R,
    pub(crate) delay: D,
    pub(crate) config: Config,
    pub(crate) seq: Wrapping<u8>,
    pub(crate) state: ExchangeState,
}

impl<R, D> Session<R, D>
where
    R: Transceiver,
    D: DelayNs,
{
    /// Creates a session
    ///
    /// The transceiver is used as is. Call [`Session::bring_up`] first unless
    /// it has already been initialized.
    pub fn new(radio: R, delay: D, config: Config) -> Self {
        Session {
            radio,
            delay,
            config,
            seq: Wrapping(0),
            state: ExchangeState::Idle,
        }
    }

    /// Initializes the transceiver and programs antenna delays and addresses
    ///
    /// Initialization is retried for up to 2 seconds. If it still fails, the
    /// node can't range and [`Error::InitializationFailure`] is returned.
    pub fn bring_up(&mut self) -> Result<(), Error<R::Error>> {
        let mut waited_ms = 0;

        while self.radio.initialize(&self.config.radio).is_err() {
            if waited_ms >= INIT_TIMEOUT_MS {
                error!("transceiver did not initialize within {} ms", INIT_TIMEOUT_MS);
                return Err(Error::InitializationFailure);
            }

            debug!("transceiver initialization failed, retrying");
            self.delay.delay_ms(INIT_RETRY_MS);
            waited_ms += INIT_RETRY_MS;
        }

        let antenna_delay = self.config.antenna_delay;
        self.radio
            .set_antenna_delay(antenna_delay.rx, antenna_delay.tx)
            .map_err(Error::Radio)?;
        self.radio
            .set_address(self.config.pan_id, self.config.addr)
            .map_err(Error::Radio)?;

        info!(
            "transceiver ready: pan {} addr {}",
            self.config.pan_id, self.config.addr
        );
        Ok(())
    }

    /// Ranges against the responder at `target`
    ///
    /// Returns the measured distance in meters. Errors only concern this one
    /// attempt; the session is ready for the next exchange either way.
    pub fn initiate(&mut self, target: u16) -> Result<f64, Error<R::Error>> {
        let result = match self.config.mode {
            TwrMode::SingleSided => SingleSided::initiate(self, target),
            TwrMode::DoubleSided => DoubleSided::initiate(self, target),
        };

        self.finish(result)
    }

    /// Waits for a single Poll and answers it
    ///
    /// Errors only concern this one attempt; the session is ready for the
    /// next exchange either way.
    pub fn respond(&mut self) -> Result<Reply, Error<R::Error>> {
        let result = match self.config.mode {
            TwrMode::SingleSided => SingleSided::respond(self),
            TwrMode::DoubleSided => DoubleSided::respond(self),
        };

        self.finish(result)
    }

    /// Answers Polls forever
    ///
    /// This is the main loop of an anchor. Timeouts are expected while no tag
    /// is around and are not logged.
    pub fn serve(&mut self) -> ! {
        let mut replies: u32 = 0;
        let mut failures: u32 = 0;

        loop {
            match self.respond() {
                Ok(reply) => {
                    replies = replies.wrapping_add(1);
                    info!(
                        "answered {} ({} replies, {} failures)",
                        reply.peer, replies, failures
                    );
                }
                Err(Error::Timeout) => {}
                Err(error) => {
                    failures = failures.wrapping_add(1);
                    warn!("exchange failed: {}", error.kind());
                }
            }
        }
    }

    /// The current exchange state
    pub fn state(&self) -> ExchangeState {
        self.state
    }

    /// The session's configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The sequence number the next frame will carry
    pub fn seq(&self) -> u8 {
        self.seq.0
    }

    /// Direct access to the transceiver
    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    /// Direct access to the delay provider
    pub fn delay_mut(&mut self) -> &mut D {
        &mut self.delay
    }

    /// Ends the session and hands back the transceiver and the delay provider
    pub fn release(self) -> (R, D) {
        (self.radio, self.delay)
    }

    /// Returns the current sequence number and advances the counter
    pub(crate) fn next_seq(&mut self) -> u8 {
        let seq = self.seq.0;
        self.seq += 1;
        seq
    }

    /// Waits until any of the flags in `mask` is set, for at most `timeout_us`
    pub(crate) fn wait_for(
        &mut self,
        mask: SysStatus,
        timeout_us: u32,
    ) -> Result<SysStatus, Error<R::Error>> {
        crate::radio::wait_for_status(
            &mut self.radio,
            &mut self.delay,
            mask,
            timeout_us,
            self.config.timeouts.status_poll_interval_us,
        )
    }

    /// Resets the receiver after an exchange
    ///
    /// The exchange's own error takes precedence over a failing reset.
    fn finish<T>(&mut self, result: Result<T, Error<R::Error>>) -> Result<T, Error<R::Error>> {
        self.state = ExchangeState::Idle;

        let reset = self
            .radio
            .clear_status(SysStatus::RX_DONE | SysStatus::TXFRS)
            .and_then(|()| self.radio.rx_reset());

        let value = result?;
        reset.map_err(Error::Radio)?;
        Ok(value)
    }
}
