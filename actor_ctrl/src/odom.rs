//! # Odometry
//!
//! One odometry message is published per tick, carrying the actor's new pose and the twist
//! estimate from motion control.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::{
    msg::{
        geometry::{Point, Pose, Quaternion, Twist, Vector3},
        nav::Odometry,
        std_msgs::Header,
    },
    net::Publisher,
};
use log::warn;
use util::maths::yaw_to_quat;

use crate::motion_ctrl::{Pose2, Twist2};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Publishes the actor's odometry.
pub struct OdomPublisher {
    publisher: Box<dyn Publisher<Odometry>>,
    frame_id: String,
    child_frame_id: String,
    default_rotation_rad: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl OdomPublisher {
    pub fn new(
        publisher: Box<dyn Publisher<Odometry>>,
        frame_id: &str,
        child_frame_id: &str,
        default_rotation_rad: f64,
    ) -> Self {
        Self {
            publisher,
            frame_id: String::from(frame_id),
            child_frame_id: String::from(child_frame_id),
            default_rotation_rad,
        }
    }

    /// Build and publish the odometry message for this tick.
    ///
    /// Delivery is best effort, failures are logged and otherwise ignored.
    pub fn publish(&self, pose: &Pose2, twist: &Twist2) {
        let msg = build_odometry(
            pose,
            twist,
            self.default_rotation_rad,
            &self.frame_id,
            &self.child_frame_id,
        );

        if let Err(e) = self.publisher.publish(&msg) {
            warn!("Could not publish odometry on {}: {}", self.publisher.topic(), e);
        }
    }

    pub fn topic(&self) -> &str {
        self.publisher.topic()
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a pose and twist into an odometry message.
///
/// The orientation is the yaw-only rotation `heading - default_rotation`, i.e. the direction the
/// actor is actually facing rather than the yaw of its model.
pub fn build_odometry(
    pose: &Pose2,
    twist: &Twist2,
    default_rotation_rad: f64,
    frame_id: &str,
    child_frame_id: &str,
) -> Odometry {
    let q = yaw_to_quat(pose.heading_rad - default_rotation_rad).into_inner().coords;

    Odometry {
        header: Header::now(frame_id),
        child_frame_id: String::from(child_frame_id),
        pose: Pose {
            position: Point::new(pose.position_m[0], pose.position_m[1], 0.0),
            orientation: Quaternion {
                x: q[0],
                y: q[1],
                z: q[2],
                w: q[3],
            },
        },
        twist: Twist {
            linear: Vector3::new(twist.linear_ms[0], twist.linear_ms[1], 0.0),
            angular: Vector3::new(0.0, 0.0, twist.angular_rads),
        },
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
