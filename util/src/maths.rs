//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Quaternion, UnitQuaternion};
use num_traits::{Float, FloatConst};

/// Calculates the least nonnegative remainder of `lhs (mod rhs)`.
///
/// This function is taken from the std library as num is missing it.
///
/// In particular, the return value `r` satisfies `0.0 <= r < rhs.abs()` in
/// most cases. However, due to a floating point round-off error it can
/// result in `r == rhs.abs()` if `lhs` is much smaller than `rhs.abs()` in
/// magnitude and `lhs < 0.0`.
pub fn rem_euclid<T>(lhs: T, rhs: T) -> T
where
    T: Float
{
    let r = lhs % rhs;
    if r < T::zero() { r + rhs.abs() } else { r }
}

/// Wrap an angle into the range (-pi, pi].
pub fn wrap_pi<T>(angle: T) -> T
where
    T: Float + FloatConst
{
    let tau = T::PI() + T::PI();
    let wrapped = rem_euclid(angle + T::PI(), tau) - T::PI();

    // rem_euclid lands on [-pi, pi), move the lower bound over to +pi
    if wrapped <= -T::PI() {
        wrapped + tau
    }
    else {
        wrapped
    }
}

/// Extract the yaw (rotation about +Z) from a quaternion given as `[x, y, z, w]` using the
/// roll-pitch-yaw decomposition.
///
/// The quaternion is normalised first, so any non-zero quaternion gives a valid yaw. Returns
/// `None` if the quaternion is non-finite or has (near) zero norm.
pub fn quat_to_yaw(x: f64, y: f64, z: f64, w: f64) -> Option<f64> {
    let q = Quaternion::new(w, x, y, z);

    if !(x.is_finite() && y.is_finite() && z.is_finite() && w.is_finite()) {
        return None
    }

    UnitQuaternion::try_new(q, f64::EPSILON).map(|u| u.euler_angles().2)
}

/// Build a yaw-only attitude quaternion.
pub fn yaw_to_quat(yaw_rad: f64) -> UnitQuaternion<f64> {
    UnitQuaternion::from_euler_angles(0.0, 0.0, yaw_rad)
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::{FRAC_PI_2, PI, TAU};

    #[test]
    fn test_wrap_pi() {
        assert_abs_diff_eq!(wrap_pi(0f64), 0f64);
        assert_abs_diff_eq!(wrap_pi(PI), PI);
        assert_abs_diff_eq!(wrap_pi(-PI), PI);
        assert_abs_diff_eq!(wrap_pi(TAU + 1.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_pi(-TAU - 1.0), -1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_pi(3.0 * FRAC_PI_2), -FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_quat_to_yaw() {
        let q = yaw_to_quat(1.2);
        let yaw = quat_to_yaw(q.i, q.j, q.k, q.w).unwrap();
        assert_abs_diff_eq!(yaw, 1.2, epsilon = 1e-12);

        // Non-unit quaternions are normalised
        let yaw = quat_to_yaw(0.0, 0.0, 2.0, 2.0).unwrap();
        assert_abs_diff_eq!(yaw, FRAC_PI_2, epsilon = 1e-12);

        // Degenerate quaternions are rejected
        assert_eq!(quat_to_yaw(0.0, 0.0, 0.0, 0.0), None);
        assert_eq!(quat_to_yaw(f64::NAN, 0.0, 0.0, 1.0), None);
    }
}
