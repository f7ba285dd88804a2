//! Angle bookkeeping
//!
//! Radians are canonical everywhere in the crate. Degrees only appear when
//! indexing the lookup table, which always stores [`HEADINGS`] whole-degree
//! headings regardless of how many beams a scan uses.

use nalgebra::Vector2;
use std::f64::consts::{PI, TAU};

/// Number of whole-degree headings stored per lookup table cell
pub const HEADINGS: usize = 360;

/// Wrap an angle in degrees into `[0, 360)`
pub fn wrap_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Whole-degree heading index in `[0, 360)` for an angle in degrees
pub fn heading_index(degrees: f64) -> usize {
    // absorb degree -> radian -> degree round-trip error, 30.0 must not land on 29
    ((wrap_degrees(degrees) + 1e-9).floor() as usize) % HEADINGS
}

/// Whole-degree heading index for an angle in radians
pub fn heading_index_from_radians(radians: f64) -> usize {
    heading_index(radians.to_degrees())
}

/// Normalize an angle in radians to `[-pi, pi]`
pub fn normalize(radians: f64) -> f64 {
    let mut angle = radians.rem_euclid(TAU);
    if angle > PI {
        angle -= TAU;
    }
    angle
}

/// Offset of beam `index` when `beam_count` beams are spread evenly over a full turn
pub fn beam_offset(index: usize, beam_count: usize) -> f64 {
    TAU * index as f64 / beam_count as f64
}

/// Same as [`beam_offset`], in degrees
pub fn beam_offset_degrees(index: usize, beam_count: usize) -> f64 {
    360.0 * index as f64 / beam_count as f64
}

/// Unit vector pointing along `radians`
pub fn unit_vector(radians: f64) -> Vector2<f64> {
    Vector2::new(radians.cos(), radians.sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_heading_index_wraps_negative() {
        assert_eq!(heading_index(-1.0), 359);
        assert_eq!(heading_index(-360.0), 0);
        assert_eq!(heading_index(721.5), 1);
        assert_eq!(heading_index(-1e-15), 0);
    }

    #[test]
    fn test_heading_index_from_radians() {
        assert_eq!(heading_index_from_radians(PI), 180);
        assert_eq!(heading_index_from_radians(-PI / 2.0), 270);
    }

    #[test]
    fn test_normalize() {
        assert_relative_eq!(normalize(3.0 * PI), PI, epsilon = 1e-12);
        assert_relative_eq!(normalize(-PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_relative_eq!(normalize(TAU + 0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_beam_offsets_cover_full_turn_without_duplicate() {
        let beams = 72;
        assert_eq!(beam_offset_degrees(0, beams), 0.0);
        assert_relative_eq!(beam_offset_degrees(71, beams), 355.0);
        assert!(beam_offset(beams - 1, beams) < TAU);
    }
}
