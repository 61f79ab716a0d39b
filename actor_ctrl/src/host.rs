//! # Host interface
//!
//! The simulation engine that owns the actor is reached only through the [`ActorHost`] trait.
//! The engine calls [`ActorPlugin::on_update`](crate::plugin::ActorPlugin::on_update) once per
//! simulation step, everything the controller needs from the engine during that step goes through
//! this trait.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::{anim::AnimClip, motion_ctrl::Pose2};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The pose (position and attitude in the world frame) of the actor.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// The position in the world frame
    pub position_m: Vector3<f64>,

    /// The attitude of the actor in the world frame.
    pub attitude_q: UnitQuaternion<f64>,
}

/// Timing information for one simulation step.
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct UpdateInfo {
    /// Simulated time at the start of this step.
    ///
    /// Units: seconds
    pub sim_time_s: f64,
}

/// A custom trajectory installed on the actor, replacing the engine's scripted animation.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TrajectoryInfo {
    /// The skeleton animation played by the trajectory.
    pub clip: AnimClip,

    /// Nominal duration of the trajectory.
    ///
    /// Units: seconds
    pub duration_s: f64,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// The services the host simulation engine provides for one actor.
pub trait ActorHost {
    /// Name of the actor, used to derive the odometry topic.
    fn name(&self) -> &str;

    /// Current pose of the actor in the world.
    fn world_pose(&self) -> Pose;

    /// Move the actor to a new pose.
    fn set_world_pose(&mut self, pose: Pose);

    /// Current value of the actor's animation clock.
    fn script_time(&self) -> f64;

    /// Set the actor's animation clock.
    fn set_script_time(&mut self, time_s: f64);

    /// Names of all the skeleton animations available to the actor.
    fn skeleton_animations(&self) -> Vec<String>;

    /// Install a custom trajectory on the actor.
    fn set_custom_trajectory(&mut self, trajectory: TrajectoryInfo);

    /// Change the animation played by the installed custom trajectory.
    fn set_trajectory_clip(&mut self, clip: AnimClip);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Pose {
    /// Create a pose from a position and roll, pitch and yaw angles.
    pub fn from_parts(position_m: Vector3<f64>, roll: f64, pitch: f64, yaw: f64) -> Self {
        Self {
            position_m,
            attitude_q: UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        }
    }

    /// Return the heading (yaw about the world Z axis) of the actor in radians.
    pub fn get_heading(&self) -> f64 {
        self.attitude_q.euler_angles().2
    }

    /// Project the pose onto the ground plane, discarding height, roll and pitch.
    pub fn planar(&self) -> Pose2 {
        Pose2 {
            position_m: Vector2::new(self.position_m[0], self.position_m[1]),
            heading_rad: self.get_heading(),
        }
    }

    /// Return a copy of this pose moved to the given planar pose.
    ///
    /// Height, roll and pitch are kept from `self`.
    pub fn with_planar(&self, planar: &Pose2) -> Self {
        let (roll, pitch, _) = self.attitude_q.euler_angles();

        Self::from_parts(
            Vector3::new(planar.position_m[0], planar.position_m[1], self.position_m[2]),
            roll,
            pitch,
            planar.heading_rad,
        )
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position_m: Vector3::zeros(),
            attitude_q: UnitQuaternion::identity(),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
