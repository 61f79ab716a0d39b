//! Path following mode

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::debug;
use nalgebra::Vector2;
use util::maths::wrap_pi;

use super::{MotionCtrl, Pose2, Twist2, ZERO_ERROR_ROT_SIGN};
use crate::{anim::AnimClip, target::TargetState};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionCtrl {
    /// Perform one tick of path following.
    ///
    /// The actor either turns on the spot towards the current waypoint, or walks straight towards
    /// it with its heading snapped onto the bearing. It never does both in the same tick.
    pub(super) fn mode_follow_path(
        &mut self,
        target: &mut TargetState,
        pose: &Pose2,
        dt_s: f64,
    ) -> (Pose2, Twist2, AnimClip) {
        let mut disp_m: Vector2<f64>;

        if target.is_aborted() || target.waypoints().is_empty() {
            // Nothing to follow, hold the current position
            target.hold(pose.position_m);
            disp_m = Vector2::zeros();

            self.report.aborted = target.is_aborted();
            self.report.holding = true;
        } else {
            disp_m = target.target().position_m - pose.position_m;

            if disp_m.norm() < self.params.linear_tolerance_m {
                if target.advance() {
                    debug!(
                        "Waypoint reached, moving to {} of {}",
                        target.index(),
                        target.waypoints().len()
                    );
                    disp_m = target.target().position_m - pose.position_m;
                } else {
                    disp_m = Vector2::zeros();
                    self.report.path_complete = true;
                }
            }
        }

        self.report.target_index = target.index();
        self.report.num_waypoints = target.waypoints().len();
        self.report.dist_to_target_m = disp_m.norm();

        // Unit vector towards the target, or zero if already there
        let dist_m = disp_m.norm();
        let dir = if dist_m != 0.0 {
            disp_m / dist_m
        } else {
            Vector2::zeros()
        };

        let clip = if dist_m == 0.0 {
            AnimClip::Standing
        } else {
            AnimClip::Walking
        };

        let ang_error_rad = if dist_m != 0.0 {
            wrap_pi(dir[1].atan2(dir[0]) + self.params.default_rotation_rad - pose.heading_rad)
        } else {
            0.0
        };
        self.report.ang_error_rad = ang_error_rad;

        if ang_error_rad.abs() > self.params.angular_tolerance_rad {
            // Turn on the spot
            let rate_rads = rot_sign(ang_error_rad) * self.params.angular_velocity_rads;
            self.report.rotating = true;

            (
                Pose2 {
                    position_m: pose.position_m,
                    heading_rad: wrap_pi(pose.heading_rad + rate_rads * dt_s),
                },
                Twist2 {
                    linear_ms: Vector2::zeros(),
                    angular_rads: rate_rads,
                },
                clip,
            )
        } else {
            // Walk towards the target, stopping on it rather than stepping past
            let vel_ms = dir * self.params.linear_velocity_ms;
            let step_m = (self.params.linear_velocity_ms * dt_s).min(dist_m);

            (
                Pose2 {
                    position_m: pose.position_m + dir * step_m,
                    heading_rad: wrap_pi(pose.heading_rad + ang_error_rad),
                },
                Twist2 {
                    linear_ms: vel_ms,
                    angular_rads: if dt_s > 0.0 {
                        ang_error_rad / dt_s
                    } else {
                        0.0
                    },
                },
                clip,
            )
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Direction to turn in to reduce the given heading error, `+1` or `-1`.
pub fn rot_sign(ang_error_rad: f64) -> f64 {
    if ang_error_rad > 0.0 {
        1.0
    } else if ang_error_rad < 0.0 {
        -1.0
    } else {
        ZERO_ERROR_ROT_SIGN
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
