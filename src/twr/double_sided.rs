use embedded_hal::delay::DelayNs;

use super::{Exchange, Reply, Session};
use crate::{radio::Transceiver, Error};

/// Double-sided two-way ranging
///
/// Poll, Response and Final frames, which cancel clock drift without a
/// carrier offset estimate. Not implemented: both roles report
/// [`Error::Unsupported`] without touching the transceiver.
pub struct DoubleSided;

impl Exchange for DoubleSided {
    fn initiate<R, D>(_: &mut Session<R, D>, target: u16) -> Result<f64, Error<R::Error>>
    where
        R: Transceiver,
        D: DelayNs,
    {
        warn!("double-sided ranging with {} is not supported", target);
        Err(Error::Unsupported)
    }

    fn respond<R, D>(_: &mut Session<R, D>) -> Result<Reply, Error<R::Error>>
    where
        R: Transceiver,
        D: DelayNs,
    {
        warn!("double-sided ranging is not supported");
        Err(Error::Unsupported)
    }
}
