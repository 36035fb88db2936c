//! Curve evaluation for frame progress

use std::f32::consts::TAU;

/// Curve shape applied to a frame's remapped progress
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Curve {
    #[default]
    Linear,
    /// `sin(t * 2pi)`
    Sin,
    /// `cos(t * 2pi)`
    Cos,
    /// `(t * 2pi - sin(t * 2pi)) / 2pi`, an ease blending linear and
    /// sinusoidal terms
    XSin,
}

impl Curve {
    /// Evaluate the curve at `t`.
    ///
    /// `t` is the remapped normalized progress and may lie outside `[0, 1]`;
    /// callers rely on overshoot (amplified or inverted domain weights), so
    /// the result is never clamped.
    pub fn apply(&self, t: f32) -> f32 {
        match self {
            Curve::Linear => t,
            Curve::Sin => (t * TAU).sin(),
            Curve::Cos => (t * TAU).cos(),
            Curve::XSin => (t * TAU - (t * TAU).sin()) / TAU,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_is_identity() {
        assert_eq!(Curve::Linear.apply(0.0), 0.0);
        assert_eq!(Curve::Linear.apply(0.3), 0.3);
        assert_eq!(Curve::Linear.apply(1.0), 1.0);
    }

    #[test]
    fn test_sin_peaks_at_quarter_turn() {
        assert!(Curve::Sin.apply(0.0).abs() < 1e-6);
        assert!((Curve::Sin.apply(0.25) - 1.0).abs() < 1e-6);
        assert!(Curve::Sin.apply(0.5).abs() < 1e-6);
    }

    #[test]
    fn test_cos_starts_at_one() {
        assert!((Curve::Cos.apply(0.0) - 1.0).abs() < 1e-6);
        assert!((Curve::Cos.apply(0.5) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_xsin_endpoints_and_slow_start() {
        assert!(Curve::XSin.apply(0.0).abs() < 1e-6);
        assert!((Curve::XSin.apply(1.0) - 1.0).abs() < 1e-6);
        // Eases in: trails the linear curve over the first half
        assert!(Curve::XSin.apply(0.25) < 0.25);
    }

    #[test]
    fn test_no_clamping_outside_unit_range() {
        assert_eq!(Curve::Linear.apply(1.5), 1.5);
        assert_eq!(Curve::Linear.apply(-0.25), -0.25);
    }
}
