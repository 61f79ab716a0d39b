//! Velocity following mode

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use util::maths::wrap_pi;

use super::{MotionCtrl, Pose2, Twist2};
use crate::{anim::AnimClip, target::TargetState};

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotionCtrl {
    /// Perform one tick of velocity following.
    ///
    /// At most one queued velocity sample is consumed per tick, when none is queued the previous
    /// command is held.
    pub(super) fn mode_follow_vel(
        &mut self,
        target: &mut TargetState,
        pose: &Pose2,
        dt_s: f64,
    ) -> (Pose2, Twist2, AnimClip) {
        let cmd = target.pop_vel();

        // Direction of travel, the model's yaw minus the offset of its forward axis
        let heading_rad = pose.heading_rad - self.params.default_rotation_rad;
        let vel_ms = Vector2::new(heading_rad.cos(), heading_rad.sin()) * cmd.speed_ms;

        let clip = if cmd.is_zero() {
            AnimClip::Standing
        } else {
            AnimClip::Walking
        };

        (
            Pose2 {
                position_m: pose.position_m + vel_ms * dt_s,
                heading_rad: wrap_pi(pose.heading_rad + cmd.rate_rads * dt_s),
            },
            Twist2 {
                linear_ms: vel_ms,
                angular_rads: cmd.rate_rads,
            },
            clip,
        )
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
