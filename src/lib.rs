//! Ranging and positioning core for UWB indoor positioning
//!
//! Fixed anchor nodes and mobile tag nodes measure their distance through
//! single-sided two-way ranging (TWR) over the transceiver's hardware clock.
//! A tag ranges against the four anchors closest to its last fix and turns
//! those distances into a 3D position by trilateration.
//!
//! The crate is organised bottom-up:
//!
//! - [`time`]: 40-bit device time, delayed-TX scheduling, time of flight
//! - [`frame`]: the fixed-layout Poll/Response ranging frames
//! - [`radio`]: the capability set the core needs from a transceiver driver
//! - [`twr`]: the ranging session in its initiator (tag) and responder
//!   (anchor) roles
//! - [`rtls`]: anchor selection and the trilateration solver
//! - [`positioning`]: the periodic positioning cycle and the publish queue
//!
//! The transceiver driver itself is not part of this crate. Any driver that
//! implements [`radio::Transceiver`] can be plugged in.
#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[macro_use]
mod fmt;

pub mod configs;
pub mod error;
pub mod frame;
pub mod positioning;
pub mod radio;
pub mod rtls;
pub mod time;
pub mod twr;

pub use crate::{
    configs::{AnchorSet, Config, PositioningConfig, RadioConfig, Timeouts, TwrMode},
    error::Error,
    positioning::{Cadence, Location, Positioning},
    radio::{SendTime, SysStatus, Transceiver, TxStart},
    rtls::{Anchor, Fix, Measurement, Position},
    twr::{Reply, Session},
};
