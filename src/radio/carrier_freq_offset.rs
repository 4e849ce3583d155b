#[cfg(feature = "defmt")]
use defmt::Format;

use crate::configs::{BitRate, UwbChannel};

/// Sampling frequency over two, divided by 2^17
const F_S_OVER_2_17: f64 = 998.4e6 / 2.0 / 131072.0;

/// The carrier frequency offset of a received frame
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CarrierFreqOffset {
    /// Carrier frequency offset in Hertz
    pub f_offset_hz: f64,

    /// Carrier frequency offset in PPM of the channel center frequency
    ///
    /// NOTE: A positive value means that the local receiver's clock is
    /// running faster than that of the remote transmitter.
    pub f_offset_ppm: f64,
}

impl CarrierFreqOffset {
    /// Calculates the offset from the carrier recovery integrator
    ///
    /// The integrator is scaled by the number of samples per symbol, which
    /// depends on the data rate.
    pub fn from_drx_car_int(
        carrier_integrator: i32,
        bitrate: BitRate,
        channel: UwbChannel,
    ) -> CarrierFreqOffset {
        let samples = match bitrate {
            BitRate::Kbps110 => 8192.0,
            BitRate::Kbps850 | BitRate::Kbps6800 => 1024.0,
        };

        let f_offset_hz = carrier_integrator as f64 * F_S_OVER_2_17 / samples;

        CarrierFreqOffset::from_f_offset_hz(f_offset_hz, channel.center_frequency_hz())
    }

    /// Calculates the offset in PPM from an offset in Hertz and the center
    /// frequency of the channel
    pub fn from_f_offset_hz(f_offset_hz: f64, f_c: u64) -> CarrierFreqOffset {
        let f_offset_ppm = 1e6 * f_offset_hz / (f_c as f64);

        CarrierFreqOffset {
            f_offset_hz,
            f_offset_ppm,
        }
    }

    /// Ratio of the remote clock's rate error to the local one
    ///
    /// This is the correction factor applied to the responder's reply time
    /// when computing a time of flight.
    pub fn clock_offset_ratio(&self) -> f64 {
        -self.f_offset_ppm / 1e6
    }
}
