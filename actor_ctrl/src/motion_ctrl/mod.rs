//! # Motion control module
//!
//! Motion control is the per-tick state machine of the actor. Given the actor's current planar
//! pose, the time elapsed since the last tick and the shared [`TargetState`](crate::target::TargetState)
//! it computes the actor's new pose, a twist estimate and the animation clip to play.
//!
//! Which of the two following modes is used is fixed by [`ActorParams::follow_mode`] for the
//! lifetime of the actor:
//!
//! - `Velocity`: the latest velocity command is integrated along the actor's heading.
//! - `Path`: the actor walks through its waypoint list, turning on the spot whenever the bearing
//!   to the current waypoint is outside the angular tolerance.
//!
//! [`ActorParams::follow_mode`]: crate::params::ActorParams::follow_mode

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod follow_path;
mod follow_vel;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::Vector2;
use serde::Serialize;

pub use follow_path::rot_sign;
pub use state::*;

use crate::params::ParamsError;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Direction of rotation used when the heading error is exactly zero.
pub const ZERO_ERROR_ROT_SIGN: f64 = -1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A position and heading on the ground plane.
///
/// The heading is the yaw of the actor model, so it includes the default rotation offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose2 {
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// Units: radians
    pub heading_rad: f64,
}

/// Planar velocity estimate, expressed in the world frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Twist2 {
    /// Units: meters/second
    pub linear_ms: Vector2<f64>,

    /// Units: radians/second
    pub angular_rads: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MotionCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MotionCtrlError {
    #[error("The target state mutex is poisoned")]
    PoisonError,

    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),
}
