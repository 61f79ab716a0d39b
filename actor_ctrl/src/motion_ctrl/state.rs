//! Implementations for the MotionCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use serde::Serialize;

// Internal
use super::{MotionCtrlError, Pose2, Twist2};
use crate::{
    anim::AnimClip,
    params::{ActorParams, FollowMode},
    target::SharedTarget,
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motion control module state
pub struct MotionCtrl {
    pub(crate) params: ActorParams,

    pub(crate) target: SharedTarget,

    pub(crate) report: StatusReport,
}

/// Input data to Motion Control.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputData {
    /// The actor's pose at the start of the tick.
    pub pose: Pose2,

    /// Simulated time elapsed since the previous tick.
    ///
    /// Units: seconds
    pub dt_s: f64,
}

/// Output of one tick of Motion Control.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OutputData {
    /// The actor's new pose.
    pub pose: Pose2,

    /// Velocity estimate for this tick.
    pub twist: Twist2,

    /// Animation the actor should play.
    pub clip: AnimClip,

    /// Distance moved this tick.
    ///
    /// Units: meters
    pub dist_travelled_m: f64,
}

/// Status report for MotionCtrl processing.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StatusReport {
    /// `true` if following a path, `false` if following velocity commands.
    pub path_mode: bool,

    /// Index of the waypoint being targeted.
    pub target_index: usize,

    /// Number of waypoints in the current path.
    pub num_waypoints: usize,

    /// Distance to the current target at the start of the tick (after any waypoint change).
    ///
    /// Units: meters
    pub dist_to_target_m: f64,

    /// Heading error to the current target.
    ///
    /// Units: radians
    pub ang_error_rad: f64,

    /// The actor turned on the spot this tick.
    pub rotating: bool,

    /// The abort flag was set.
    pub aborted: bool,

    /// The actor holds its position, either because of an abort or because it has no path.
    pub holding: bool,

    /// The final waypoint has been reached.
    pub path_complete: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for MotionCtrl {
    type InitData = (ActorParams, SharedTarget);
    type InitError = MotionCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = MotionCtrlError;

    /// Initialise the MotionCtrl module.
    ///
    /// Expected init data is the actor parameters and the target state shared with the command
    /// workers.
    fn init(init_data: Self::InitData) -> Result<Self, Self::InitError> {
        let (params, target) = init_data;

        params.validate()?;

        Ok(Self {
            params,
            target,
            report: StatusReport::default(),
        })
    }

    /// Perform cyclic processing of Motion Control.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        self.report = StatusReport::default();

        // Negative or non-finite time steps produce no motion
        let dt_s = if input_data.dt_s.is_finite() && input_data.dt_s > 0.0 {
            input_data.dt_s
        } else {
            0.0
        };

        // Hold the target lock for the whole tick so no command is seen half applied
        let target = self.target.clone();
        let mut target = target.lock().map_err(|_| MotionCtrlError::PoisonError)?;

        let (pose, twist, clip) = match target.mode() {
            FollowMode::Path => {
                self.report.path_mode = true;
                self.mode_follow_path(&mut target, &input_data.pose, dt_s)
            }
            FollowMode::Velocity => self.mode_follow_vel(&mut target, &input_data.pose, dt_s),
        };

        let output = OutputData {
            pose,
            twist,
            clip,
            dist_travelled_m: (pose.position_m - input_data.pose.position_m).norm(),
        };

        trace!(
            "MotionCtrl output:\n    pose: {:?}\n    twist: {:?}\n    clip: {:?}",
            output.pose,
            output.twist,
            output.clip
        );

        Ok((output, self.report))
    }
}

impl MotionCtrl {
    /// The parameters the controller was initialised with.
    pub fn params(&self) -> &ActorParams {
        &self.params
    }

    /// The status report from the latest tick.
    pub fn report(&self) -> &StatusReport {
        &self.report
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
