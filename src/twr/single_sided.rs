use byte::BytesExt;
use embedded_hal::delay::DelayNs;

use super::{Exchange, ExchangeKind, ExchangeState, Reply, Session};
use crate::{
    frame::{
        encode_poll, encode_response, verify_masked, Poll, Response, POLL_LEN, POLL_MASK,
        POLL_MASK_ANY_SOURCE, RESPONSE_LEN, RESPONSE_MASK,
    },
    radio::{CarrierFreqOffset, SendTime, SysStatus, Transceiver, TxStart},
    time::{distance, time_of_flight, Duration, Instant},
    Error,
};

/// Single-sided two-way ranging
///
/// The initiator sends a Poll, the responder answers with a Response that
/// carries its Poll RX and Response TX timestamps. The initiator then knows
/// both the round trip time and the responder's reply time, and corrects the
/// latter for the clock offset between the two nodes, which it estimates from
/// the carrier frequency offset of the Response.
pub struct SingleSided;

impl Exchange for SingleSided {
    fn initiate<R, D>(session: &mut Session<R, D>, target: u16) -> Result<f64, Error<R::Error>>
    where
        R: Transceiver,
        D: DelayNs,
    {
        let config = session.config;
        let timeouts = config.timeouts;

        let poll = encode_poll(config.pan_id, config.addr, target, session.next_seq());

        let radio = &mut session.radio;
        radio.rx_reset().map_err(Error::Radio)?;
        radio
            .clear_status(SysStatus::RX_DONE | SysStatus::TXFRS)
            .map_err(Error::Radio)?;
        radio
            .set_rx_after_tx_delay(timeouts.poll_tx_to_resp_rx_uus)
            .map_err(Error::Radio)?;
        radio
            .set_rx_timeout(timeouts.resp_rx_timeout_uus)
            .map_err(Error::Radio)?;
        radio.write_tx_data(&poll).map_err(Error::Radio)?;

        if radio.start_tx(SendTime::Now, true).map_err(Error::Radio)? == TxStart::TooLate {
            return Err(Error::TransmitFailure);
        }

        session.state = ExchangeState::AwaitingPeer(ExchangeKind::Response);
        let status = session.wait_for(SysStatus::RX_DONE, timeouts.response_wait_us)?;

        let mut buffer = [0; RESPONSE_LEN];
        read_frame(&mut session.radio, status, &mut buffer)?;

        let expected = encode_response(config.pan_id, target, config.addr, 0, 0, 0);
        if !verify_masked(&expected, &buffer, &RESPONSE_MASK) {
            debug!("unexpected response from {}: {:?}", target, buffer);
            return Err(Error::FrameContentMismatch);
        }
        let response: Response = buffer.read(&mut 0)?;

        let radio = &mut session.radio;
        let poll_tx = radio.tx_timestamp().map_err(Error::Radio)?;
        let resp_rx = radio.rx_timestamp().map_err(Error::Radio)?;
        let carrier_integrator = radio.carrier_integrator().map_err(Error::Radio)?;

        let offset = CarrierFreqOffset::from_drx_car_int(
            carrier_integrator,
            config.radio.bitrate,
            config.radio.channel,
        );

        let tof = time_of_flight(
            poll_tx.low32(),
            response.poll_rx_ts,
            response.resp_tx_ts,
            resp_rx.low32(),
            offset.clock_offset_ratio(),
        );

        trace!(
            "ranged {}: tof {} s, clock offset {} ppm",
            target,
            tof,
            offset.f_offset_ppm
        );
        Ok(distance(tof))
    }

    fn respond<R, D>(session: &mut Session<R, D>) -> Result<Reply, Error<R::Error>>
    where
        R: Transceiver,
        D: DelayNs,
    {
        let config = session.config;
        let timeouts = config.timeouts;

        let radio = &mut session.radio;
        radio
            .clear_status(SysStatus::RX_DONE | SysStatus::TXFRS)
            .map_err(Error::Radio)?;
        radio
            .set_rx_timeout(timeouts.poll_rx_timeout_uus)
            .map_err(Error::Radio)?;
        radio.enable_rx().map_err(Error::Radio)?;

        session.state = ExchangeState::AwaitingPeer(ExchangeKind::Poll);
        let status = session.wait_for(SysStatus::RX_DONE, timeouts.poll_wait_us)?;

        let mut buffer = [0; POLL_LEN];
        read_frame(&mut session.radio, status, &mut buffer)?;

        let (expected, mask) = match config.accept_from {
            Some(initiator) => (encode_poll(config.pan_id, initiator, config.addr, 0), &POLL_MASK),
            None => (
                encode_poll(config.pan_id, 0, config.addr, 0),
                &POLL_MASK_ANY_SOURCE,
            ),
        };
        if !verify_masked(&expected, &buffer, mask) {
            debug!("unexpected poll: {:?}", buffer);
            return Err(Error::FrameContentMismatch);
        }
        let poll: Poll = buffer.read(&mut 0)?;

        let radio = &mut session.radio;
        let poll_rx = radio.rx_timestamp().map_err(Error::Radio)?;

        // The transceiver adds the TX antenna delay to the scheduled time, so
        // the Response carries the time the frame actually leaves the antenna.
        let resp_tx_time =
            (poll_rx + Duration::from_uus(timeouts.poll_rx_to_resp_tx_uus)).schedule_time();
        let resp_tx =
            Instant::from_schedule_time(resp_tx_time) + Duration::from(config.antenna_delay.tx);

        let response = encode_response(
            config.pan_id,
            config.addr,
            poll.src_addr,
            poll_rx.value(),
            resp_tx.value(),
            session.seq.0,
        );

        let radio = &mut session.radio;
        radio.write_tx_data(&response).map_err(Error::Radio)?;
        if radio
            .start_tx(SendTime::Delayed(resp_tx_time), false)
            .map_err(Error::Radio)?
            == TxStart::TooLate
        {
            warn!("response to {} missed its slot", poll.src_addr);
            return Err(Error::TransmitFailure);
        }

        session.wait_for(SysStatus::TXFRS, timeouts.tx_done_wait_us)?;
        session
            .radio
            .clear_status(SysStatus::TXFRS)
            .map_err(Error::Radio)?;
        session.seq += 1;

        Ok(Reply {
            peer: poll.src_addr,
            poll_rx,
            resp_tx,
        })
    }
}

/// Reads a received frame of exactly `buffer.len()` bytes
///
/// Any status other than a good FCS means no qualifying frame arrived in the
/// receive window.
fn read_frame<R>(radio: &mut R, status: SysStatus, buffer: &mut [u8]) -> Result<(), Error<R::Error>>
where
    R: Transceiver,
{
    if !status.contains(SysStatus::RXFCG) {
        if status.intersects(SysStatus::ALL_RX_ERR) {
            debug!("receive error, status {}", status.0);
        }
        return Err(Error::Timeout);
    }

    radio
        .clear_status(SysStatus::RXFCG | SysStatus::TXFRS)
        .map_err(Error::Radio)?;

    let len = radio.rx_frame_len().map_err(Error::Radio)?;
    if len != buffer.len() {
        return Err(Error::FrameLengthMismatch {
            expected: buffer.len(),
            actual: len,
        });
    }

    radio.read_rx_data(buffer).map_err(Error::Radio)
}
