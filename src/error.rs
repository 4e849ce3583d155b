use core::fmt::{self, Display, Formatter};

#[cfg(feature = "defmt")]
use defmt::Format;

use crate::rtls::DegenerateGeometry;

/// An error that can occur while ranging or positioning
///
/// `E` is the error of the transceiver driver.
pub enum Error<E> {
    /// Error reported by the transceiver driver
    Radio(E),

    /// The awaited frame or event did not arrive in time
    ///
    /// Covers both the hardware frame-wait timeout and the software bound on
    /// waiting for a status flag.
    Timeout,

    /// A frame of unexpected length was received
    FrameLengthMismatch {
        /// Length of the expected frame
        expected: usize,
        /// Length of the received frame
        actual: usize,
    },

    /// The received frame did not match the expected template
    FrameContentMismatch,

    /// Frame could not be decoded
    Frame(byte::Error),

    /// The transmission could not be started
    ///
    /// For delayed transmissions this means the scheduled time had already
    /// passed, and nothing was sent.
    TransmitFailure,

    /// The requested ranging scheme is not implemented
    Unsupported,

    /// The selected anchors don't allow a position fix
    DegenerateGeometry,

    /// The transceiver could not be initialized
    InitializationFailure,
}

impl<E> Error<E> {
    /// Name of the error variant, without any payload
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Radio(_) => "Radio",
            Error::Timeout => "Timeout",
            Error::FrameLengthMismatch { .. } => "FrameLengthMismatch",
            Error::FrameContentMismatch => "FrameContentMismatch",
            Error::Frame(_) => "Frame",
            Error::TransmitFailure => "TransmitFailure",
            Error::Unsupported => "Unsupported",
            Error::DegenerateGeometry => "DegenerateGeometry",
            Error::InitializationFailure => "InitializationFailure",
        }
    }
}

impl<E> From<DegenerateGeometry> for Error<E> {
    fn from(_: DegenerateGeometry) -> Self {
        Error::DegenerateGeometry
    }
}

impl<E> From<byte::Error> for Error<E> {
    fn from(error: byte::Error) -> Self {
        Error::Frame(error)
    }
}

impl<E> Display for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[cfg(feature = "std")]
impl<E> std::error::Error for Error<E> where E: fmt::Debug {}

impl<E> fmt::Debug for Error<E>
where
    E: fmt::Debug,
{
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Error::Radio(error) => write!(f, "Radio({:?})", error),
            Error::Timeout => write!(f, "Timeout"),
            Error::FrameLengthMismatch { expected, actual } => write!(
                f,
                "FrameLengthMismatch {{ expected: {:?}, actual: {:?} }}",
                expected, actual,
            ),
            Error::FrameContentMismatch => write!(f, "FrameContentMismatch"),
            Error::Frame(error) => write!(f, "Frame({:?})", error),
            Error::TransmitFailure => write!(f, "TransmitFailure"),
            Error::Unsupported => write!(f, "Unsupported"),
            Error::DegenerateGeometry => write!(f, "DegenerateGeometry"),
            Error::InitializationFailure => write!(f, "InitializationFailure"),
        }
    }
}

#[cfg(feature = "defmt")]
impl<E> Format for Error<E>
where
    E: Format,
{
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::Radio(error) => defmt::write!(f, "Radio({:?})", error),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::FrameLengthMismatch { expected, actual } => defmt::write!(
                f,
                "FrameLengthMismatch {{ expected: {:?}, actual: {:?} }}",
                expected,
                actual,
            ),
            Error::FrameContentMismatch => defmt::write!(f, "FrameContentMismatch"),
            Error::Frame(error) => defmt::write!(f, "Frame({:?})", defmt::Debug2Format(error)),
            Error::TransmitFailure => defmt::write!(f, "TransmitFailure"),
            Error::Unsupported => defmt::write!(f, "Unsupported"),
            Error::DegenerateGeometry => defmt::write!(f, "DegenerateGeometry"),
            Error::InitializationFailure => defmt::write!(f, "InitializationFailure"),
        }
    }
}
