use nalgebra::{Matrix4, Vector4};
#[allow(unused_imports)]
use num_traits::Float;

#[cfg(feature = "defmt")]
use defmt::Format;

use super::{Fix, Measurement, Position};

/// The anchors of a measurement set are coplanar
///
/// Four coplanar anchors can't tell apart the two mirror images of a point
/// across their plane, so the linearised system is singular.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(Format))]
pub struct DegenerateGeometry;

/// Solves for the position that is consistent with 4 distance measurements
///
/// Every measurement gives `|p - a|^2 = d^2`, which expands to
/// `|p|^2 - 2 a.p = d^2 - |a|^2`. Treating `w = |p|^2` as a fourth unknown
/// turns the 4 equations into a linear system in `[w, x, y, z]`.
///
/// For consistent measurements the solution satisfies `w = |p|^2`; the
/// mismatch between the two is reported as [`Fix::error`].
pub fn find_position(measurements: &[Measurement; 4]) -> Result<Fix, DegenerateGeometry> {
    let a = Matrix4::from_fn(|row, col| {
        let anchor = &measurements[row].anchor_pos;
        match col {
            0 => 1.0,
            1 => -2.0 * anchor.x,
            2 => -2.0 * anchor.y,
            _ => -2.0 * anchor.z,
        }
    });

    if a.determinant() == 0.0 {
        return Err(DegenerateGeometry);
    }

    let a_inv = a.try_inverse().ok_or(DegenerateGeometry)?;

    let b = Vector4::from_fn(|row, _| {
        let m = &measurements[row];
        m.distance * m.distance - m.anchor_pos.norm_squared()
    });

    let solution = a_inv * b;
    let pos = Position::new(solution[1], solution[2], solution[3]);

    Ok(Fix {
        pos,
        error: (solution[0] - pos.norm_squared()).abs(),
    })
}
