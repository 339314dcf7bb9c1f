//! 64-bit draw order keys
//!
//! ```text
//!  63        36 35    33  32            31                0
//! +------------+--------+-------------+--------------------+
//! |   unused   |  pass  | manipulator |     depth bits     |
//! +------------+--------+-------------+--------------------+
//! ```
//!
//! Ascending order runs passes in ordinal order, manipulators after ordinary
//! geometry of the same pass, and far objects before near ones. An explicit
//! override index replaces the depth bits and keeps signed order.

use super::pass::Pass;

/// Bit position of the pass ordinal
pub const PASS_SHIFT: u32 = 33;

/// Set for manipulator entries
pub const MANIPULATOR_BIT: u64 = 1 << 32;

/// Compose a key
pub fn sort_key(pass: Pass, manipulator: bool, depth_bits: u32) -> u64 {
    let manipulator = if manipulator { MANIPULATOR_BIT } else { 0 };
    (pass.ordinal() << PASS_SHIFT) | manipulator | u64::from(depth_bits)
}

/// Depth bits for a window depth in `[0, 1]` (0 = near plane). Out of range
/// depths are clamped.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn depth_bits(window_z: f64) -> u32 {
    let inverted = (1.0 - window_z).clamp(0.0, 1.0);
    (inverted * f64::from(u32::MAX)).round() as u32
}

/// Depth bits for an explicit draw order; flipping the sign bit makes
/// unsigned comparison agree with signed order.
#[allow(clippy::cast_sign_loss)]
pub fn override_bits(index: i32) -> u32 {
    (index as u32) ^ 0x8000_0000
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass_of(key: u64) -> Option<Pass> {
        let ordinal = usize::try_from(key >> PASS_SHIFT).ok()?;
        Pass::ALL.get(ordinal).copied()
    }

    #[test]
    fn test_pass_dominates() {
        let late_far = sort_key(Pass::Transparent, false, depth_bits(1.0));
        let early_near = sort_key(Pass::Opaque, true, depth_bits(0.0));
        assert!(early_near < late_far);
    }

    #[test]
    fn test_manipulator_after_geometry() {
        let geometry = sort_key(Pass::Selection, false, u32::MAX);
        let handle = sort_key(Pass::Selection, true, 0);
        assert!(geometry < handle);
    }

    #[test]
    fn test_far_before_near() {
        let far = sort_key(Pass::Transparent, false, depth_bits(0.9));
        let near = sort_key(Pass::Transparent, false, depth_bits(0.1));
        assert!(far < near);
        assert_eq!(depth_bits(-3.0), u32::MAX);
        assert_eq!(depth_bits(7.0), 0);
    }

    #[test]
    fn test_override_keeps_signed_order() {
        let indices = [i32::MIN, -5, -1, 0, 1, 42, i32::MAX];
        for pair in indices.windows(2) {
            assert!(override_bits(pair[0]) < override_bits(pair[1]), "{pair:?}");
        }
    }

    #[test]
    fn test_pass_round_trips_through_key() {
        for pass in Pass::ALL {
            assert_eq!(pass_of(sort_key(pass, true, 123)), Some(pass));
        }
    }
}
