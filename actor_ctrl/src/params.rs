//! Parameters structure for the actor controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::time::Duration;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the actor controller.
///
/// Every field has a default, so a parameter file only needs to contain the values which differ
/// from those defaults. The unit-less names used by existing actor configuration files
/// (`linear_tolerance`, `angular_velocity` etc.) are accepted as aliases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActorParams {
    // ---- MODE ----

    /// Which command stream the actor follows for its whole lifetime.
    pub follow_mode: FollowMode,

    // ---- TOPICS ----

    /// Topic on which velocity (twist) commands are received.
    pub vel_topic: String,

    /// Topic on which path (waypoint list) commands are received.
    pub path_topic: String,

    /// Topic on which abort flags are received.
    pub abort_topic: String,

    /// Topic on which odometry is published. If not set `<actor name>/odom` is used.
    pub odom_topic: Option<String>,

    /// Frame in which the published odometry pose is expressed.
    pub odom_frame_id: String,

    // ---- PATH FOLLOWING ----

    /// Distance under which a waypoint is considered reached.
    ///
    /// Units: meters
    #[serde(alias = "linear_tolerance")]
    pub linear_tolerance_m: f64,

    /// Walking speed used while following a path.
    ///
    /// Units: meters/second
    #[serde(alias = "linear_velocity")]
    pub linear_velocity_ms: f64,

    /// Heading error above which the actor turns on the spot rather than walking.
    ///
    /// Units: radians
    #[serde(alias = "angular_tolerance")]
    pub angular_tolerance_rad: f64,

    /// Turn rate used when turning on the spot.
    ///
    /// Units: radians/second
    #[serde(alias = "angular_velocity")]
    pub angular_velocity_rads: f64,

    // ---- ANIMATION ----

    /// Animation time advanced per meter walked.
    ///
    /// Units: seconds/meter
    pub animation_factor: f64,

    /// Yaw offset between the actor model's forward axis and its logical heading.
    ///
    /// Units: radians
    #[serde(alias = "default_rotation")]
    pub default_rotation_rad: f64,

    // ---- WORKERS ----

    /// Maximum time a command queue worker blocks waiting for new commands before checking for
    /// shutdown.
    ///
    /// Units: seconds
    pub queue_timeout_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The two mutually exclusive following modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FollowMode {
    /// Integrate the latest velocity command.
    Velocity,

    /// Walk through the latest list of waypoints.
    Path,
}

/// Errors raised by parameter validation.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("Parameter `{0}` must be finite, found {1}")]
    NotFinite(&'static str, f64),

    #[error("Parameter `{0}` must not be negative, found {1}")]
    Negative(&'static str, f64),

    #[error("Parameter `queue_timeout_s` must be greater than zero, found {0}")]
    InvalidQueueTimeout(f64),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ActorParams {
    fn default() -> Self {
        Self {
            follow_mode: FollowMode::Velocity,
            vel_topic: String::from("/cmd_vel"),
            path_topic: String::from("/cmd_path"),
            abort_topic: String::from("/abort_goal"),
            odom_topic: None,
            odom_frame_id: String::from("map"),
            linear_tolerance_m: 0.1,
            linear_velocity_ms: 1.0,
            angular_tolerance_rad: 5f64.to_radians(),
            angular_velocity_rads: 10f64.to_radians(),
            animation_factor: 4.0,
            default_rotation_rad: 0.0,
            queue_timeout_s: 0.01,
        }
    }
}

impl Default for FollowMode {
    fn default() -> Self {
        FollowMode::Velocity
    }
}

impl ActorParams {
    /// Check the parameters are usable by the controller.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let all = [
            ("linear_tolerance_m", self.linear_tolerance_m),
            ("linear_velocity_ms", self.linear_velocity_ms),
            ("angular_tolerance_rad", self.angular_tolerance_rad),
            ("angular_velocity_rads", self.angular_velocity_rads),
            ("animation_factor", self.animation_factor),
            ("default_rotation_rad", self.default_rotation_rad),
            ("queue_timeout_s", self.queue_timeout_s),
        ];
        for (name, value) in all.iter() {
            if !value.is_finite() {
                return Err(ParamsError::NotFinite(*name, *value));
            }
        }

        let non_neg = [
            ("linear_tolerance_m", self.linear_tolerance_m),
            ("angular_tolerance_rad", self.angular_tolerance_rad),
            ("animation_factor", self.animation_factor),
        ];
        for (name, value) in non_neg.iter() {
            if *value < 0.0 {
                return Err(ParamsError::Negative(*name, *value));
            }
        }

        if self.queue_timeout_s <= 0.0 {
            return Err(ParamsError::InvalidQueueTimeout(self.queue_timeout_s));
        }

        Ok(())
    }

    /// The odometry topic for an actor with the given name.
    pub fn odom_topic_for(&self, actor_name: &str) -> String {
        match self.odom_topic {
            Some(ref t) => t.clone(),
            None => format!("{}/odom", actor_name),
        }
    }

    /// The queue worker wake period as a `Duration`.
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.queue_timeout_s)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
