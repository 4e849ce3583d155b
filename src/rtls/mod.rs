//! Position types, anchor selection and trilateration

#[cfg(feature = "defmt")]
use defmt::Format;

pub use selector::*;
pub use solver::*;

mod selector;
mod solver;

/// A point in the deployment's coordinate frame, in meters
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    /// x coordinate
    pub x: f64,
    /// y coordinate
    pub y: f64,
    /// z coordinate
    pub z: f64,
}

impl Position {
    /// Creates a position from its coordinates
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Position { x, y, z }
    }

    /// Squared distance from the origin
    pub fn norm_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// Squared Euclidean distance to `other`
    pub fn distance_squared(&self, other: &Position) -> f64 {
        Position::new(self.x - other.x, self.y - other.y, self.z - other.z).norm_squared()
    }
}

/// A fixed node at a known position
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Anchor {
    /// Short address, identifies the anchor
    pub addr: u16,
    /// Where the anchor is installed
    pub pos: Position,
}

impl Anchor {
    /// Creates an anchor
    pub const fn new(addr: u16, pos: Position) -> Self {
        Anchor { addr, pos }
    }
}

/// Distance to an anchor, as measured by one ranging exchange
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct Measurement {
    /// Position of the anchor that was ranged against
    pub anchor_pos: Position,
    /// Measured distance in meters
    pub distance: f64,
}

/// A position fix
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Fix {
    /// Estimated position
    pub pos: Position,
    /// Residual of the solved system
    ///
    /// Zero for perfectly consistent measurements. It grows with measurement
    /// noise and anchor misplacement, but it is not an uncertainty in meters.
    pub error: f64,
}
