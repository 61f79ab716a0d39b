//! # Target state
//!
//! The target state is the only data shared between the command queue workers (which write it)
//! and the simulation tick (which reads it through the motion controller). It is held behind a
//! single mutex, so every command is applied to it in one critical section and the tick always
//! sees either all or none of a command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use comms_if::msg::{self, geometry::Twist, nav::Path, std_msgs::Bool};
use log::{debug, trace, warn};
use nalgebra::Vector2;
use serde::Serialize;
use util::maths;

use crate::params::FollowMode;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Maximum number of velocity samples waiting for a tick. The oldest are dropped beyond this.
pub const MAX_PENDING_VEL: usize = 8;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Target state shared between the command workers and the tick.
pub type SharedTarget = Arc<Mutex<TargetState>>;

/// A planar target the actor walks towards while following a path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Waypoint {
    /// Target position in the world frame.
    ///
    /// Units: meters
    pub position_m: Vector2<f64>,

    /// Yaw of the commanded pose.
    ///
    /// Units: radians
    pub yaw_rad: f64,
}

/// A velocity command sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VelSample {
    /// Speed along the actor's facing direction.
    ///
    /// Units: meters/second
    pub speed_ms: f64,

    /// Turn rate about the vertical axis.
    ///
    /// Units: radians/second
    pub rate_rads: f64,
}

/// Everything the controller is currently trying to achieve.
#[derive(Debug, Clone)]
pub struct TargetState {
    mode: FollowMode,

    waypoints: Vec<Waypoint>,
    index: usize,
    target: Waypoint,
    aborted: bool,

    requested_vel: VelSample,
    pending_vel: VecDeque<VelSample>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Waypoint {
    pub fn new(x_m: f64, y_m: f64, yaw_rad: f64) -> Self {
        Self {
            position_m: Vector2::new(x_m, y_m),
            yaw_rad,
        }
    }

    /// Extract a waypoint from a pose message.
    ///
    /// Only the yaw of the orientation is kept. Returns `None` if the position is not finite or
    /// the orientation is not a usable rotation (non-finite or zero norm). Orientations which are
    /// not unit length are normalised.
    pub fn from_pose_msg(pose: &msg::geometry::Pose) -> Option<Self> {
        let p = &pose.position;
        if !(p.x.is_finite() && p.y.is_finite()) {
            return None;
        }

        let q = &pose.orientation;
        let yaw = maths::quat_to_yaw(q.x, q.y, q.z, q.w)?;

        Some(Self::new(p.x, p.y, yaw))
    }
}

impl VelSample {
    /// Returns `true` if the sample commands no motion at all.
    pub fn is_zero(&self) -> bool {
        self.speed_ms == 0.0 && self.rate_rads == 0.0
    }
}

impl From<&Twist> for VelSample {
    fn from(twist: &Twist) -> Self {
        Self {
            speed_ms: twist.linear.x,
            rate_rads: twist.angular.z,
        }
    }
}

impl TargetState {
    /// Create the target state for a newly activated actor.
    ///
    /// The waypoint list starts out holding only `initial`, the actor's pose at activation, so a
    /// path-following actor stays where it is until it is given a path.
    pub fn new(mode: FollowMode, initial: Waypoint) -> Self {
        Self {
            mode,
            waypoints: vec![initial],
            index: 0,
            target: initial,
            aborted: false,
            requested_vel: VelSample::default(),
            pending_vel: VecDeque::new(),
        }
    }

    /// Create a new shared target state.
    pub fn new_shared(mode: FollowMode, initial: Waypoint) -> SharedTarget {
        Arc::new(Mutex::new(Self::new(mode, initial)))
    }

    /// Return to the activation state, targeting `initial`.
    pub fn reset(&mut self, initial: Waypoint) {
        *self = Self::new(self.mode, initial);
    }

    // ---- COMMAND HANDLERS ----

    /// Queue a velocity command to be consumed by a later tick.
    ///
    /// Velocity commands are ignored by path-following actors. If commands arrive faster than
    /// ticks consume them only the latest [`MAX_PENDING_VEL`] are kept.
    pub fn apply_vel_cmd(&mut self, twist: &Twist) {
        match self.mode {
            FollowMode::Velocity => {
                if self.pending_vel.len() >= MAX_PENDING_VEL {
                    self.pending_vel.pop_front();
                    trace!("Velocity backlog full, dropping oldest sample");
                }
                self.pending_vel.push_back(VelSample::from(twist));
            }
            FollowMode::Path => trace!("Ignoring velocity command in path mode"),
        }
    }

    /// Replace the waypoint list with the poses in `path`.
    ///
    /// Also resets the target index, clears the abort flag and targets the first waypoint.
    /// Returns the number of poses rejected because they were malformed.
    pub fn apply_path(&mut self, path: &Path) -> usize {
        let mut rejected = 0;

        self.waypoints.clear();
        for (i, ps) in path.poses.iter().enumerate() {
            match Waypoint::from_pose_msg(&ps.pose) {
                Some(w) => self.waypoints.push(w),
                None => {
                    warn!("Rejecting malformed waypoint {} of path: {:?}", i, ps.pose);
                    rejected += 1;
                }
            }
        }

        self.index = 0;
        self.aborted = false;
        if let Some(first) = self.waypoints.first() {
            self.target = *first;
        }

        debug!(
            "New path with {} waypoint(s) ({} rejected)",
            self.waypoints.len(),
            rejected
        );

        rejected
    }

    /// Set or clear the abort flag.
    pub fn apply_abort(&mut self, abort: &Bool) {
        if abort.data != self.aborted {
            debug!("Abort flag set to {}", abort.data);
        }
        self.aborted = abort.data;
    }

    // ---- CONTROLLER ACCESS ----

    /// Drop all waypoints and target the given position.
    pub(crate) fn hold(&mut self, position_m: Vector2<f64>) {
        self.waypoints.clear();
        self.target.position_m = position_m;
        self.index = 0;
    }

    /// Move on to the next waypoint, if there is one.
    ///
    /// Returns `false`, leaving the target unchanged, if the current target is the last
    /// waypoint.
    pub(crate) fn advance(&mut self) -> bool {
        if self.index + 1 < self.waypoints.len() {
            self.index += 1;
            self.target = self.waypoints[self.index];
            true
        } else {
            false
        }
    }

    /// Take at most one pending velocity sample, making it the requested velocity, and return the
    /// requested velocity.
    pub(crate) fn pop_vel(&mut self) -> VelSample {
        if let Some(s) = self.pending_vel.pop_front() {
            self.requested_vel = s;
        }
        self.requested_vel
    }

    // ---- GETTERS ----

    pub fn mode(&self) -> FollowMode {
        self.mode
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn target(&self) -> &Waypoint {
        &self.target
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn requested_vel(&self) -> VelSample {
        self.requested_vel
    }

    /// Number of velocity samples not yet consumed by the tick.
    pub fn num_pending_vel(&self) -> usize {
        self.pending_vel.len()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_abs_diff_eq;
    use comms_if::msg::{
        geometry::{Point, Pose, PoseStamped, Quaternion},
        std_msgs::Header,
    };
    use std::f64::consts::FRAC_PI_2;

    fn pose_stamped(x: f64, y: f64, q: Quaternion) -> PoseStamped {
        PoseStamped {
            header: Header::default(),
            pose: Pose {
                position: Point::new(x, y, 0.0),
                orientation: q,
            },
        }
    }

    fn yaw_quat(yaw: f64) -> Quaternion {
        Quaternion {
            x: 0.0,
            y: 0.0,
            z: (yaw / 2.0).sin(),
            w: (yaw / 2.0).cos(),
        }
    }

    fn path(poses: Vec<PoseStamped>) -> Path {
        Path {
            header: Header::default(),
            poses,
        }
    }

    #[test]
    fn test_initial_state() {
        let t = TargetState::new(FollowMode::Path, Waypoint::new(1.0, 2.0, 0.5));

        assert_eq!(t.waypoints().len(), 1);
        assert_eq!(t.index(), 0);
        assert_eq!(*t.target(), Waypoint::new(1.0, 2.0, 0.5));
        assert!(!t.is_aborted());
    }

    #[test]
    fn test_apply_path() {
        let mut t = TargetState::new(FollowMode::Path, Waypoint::new(0.0, 0.0, 0.0));
        t.apply_abort(&Bool { data: true });
        t.advance();

        let rejected = t.apply_path(&path(vec![
            pose_stamped(1.0, 0.0, yaw_quat(FRAC_PI_2)),
            pose_stamped(2.0, 3.0, yaw_quat(0.0)),
        ]));

        assert_eq!(rejected, 0);
        assert_eq!(t.waypoints().len(), 2);
        assert_eq!(t.index(), 0);
        assert!(!t.is_aborted());
        assert_abs_diff_eq!(t.target().position_m[0], 1.0);
        assert_abs_diff_eq!(t.target().yaw_rad, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_malformed_waypoints_rejected() {
        let mut t = TargetState::new(FollowMode::Path, Waypoint::new(0.0, 0.0, 0.0));

        let zero_q = Quaternion {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 0.0,
        };
        let nan_q = Quaternion {
            x: std::f64::NAN,
            ..Quaternion::default()
        };
        // Not unit length, but still a valid rotation once normalised
        let long_q = Quaternion {
            x: 0.0,
            y: 0.0,
            z: 2.0,
            w: 2.0,
        };

        let rejected = t.apply_path(&path(vec![
            pose_stamped(1.0, 0.0, zero_q),
            pose_stamped(std::f64::INFINITY, 0.0, Quaternion::default()),
            pose_stamped(2.0, 0.0, nan_q),
            pose_stamped(3.0, 0.0, long_q),
        ]));

        assert_eq!(rejected, 3);
        assert_eq!(t.waypoints().len(), 1);
        assert_abs_diff_eq!(t.target().position_m[0], 3.0);
        assert_abs_diff_eq!(t.target().yaw_rad, FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_advance_stops_at_last() {
        let mut t = TargetState::new(FollowMode::Path, Waypoint::new(0.0, 0.0, 0.0));
        t.apply_path(&path(vec![
            pose_stamped(1.0, 0.0, Quaternion::default()),
            pose_stamped(2.0, 0.0, Quaternion::default()),
        ]));

        assert!(t.advance());
        assert_eq!(t.index(), 1);
        assert!(!t.advance());
        assert_eq!(t.index(), 1);
        assert_abs_diff_eq!(t.target().position_m[0], 2.0);
    }

    #[test]
    fn test_hold() {
        let mut t = TargetState::new(FollowMode::Path, Waypoint::new(0.0, 0.0, 0.0));
        t.apply_path(&path(vec![
            pose_stamped(1.0, 0.0, Quaternion::default()),
            pose_stamped(2.0, 0.0, Quaternion::default()),
        ]));
        t.advance();

        t.hold(Vector2::new(0.5, 0.5));
        assert!(t.waypoints().is_empty());
        assert_eq!(t.index(), 0);
        assert_eq!(t.target().position_m, Vector2::new(0.5, 0.5));
    }

    #[test]
    fn test_vel_samples_one_per_pop() {
        let mut t = TargetState::new(FollowMode::Velocity, Waypoint::new(0.0, 0.0, 0.0));
        t.apply_vel_cmd(&Twist::planar(1.0, 0.1));
        t.apply_vel_cmd(&Twist::planar(2.0, 0.0));
        assert_eq!(t.num_pending_vel(), 2);

        assert_eq!(t.pop_vel().speed_ms, 1.0);
        assert_eq!(t.pop_vel().speed_ms, 2.0);

        // Last command holds once the queue is empty
        assert_eq!(t.pop_vel().speed_ms, 2.0);
        assert_eq!(t.num_pending_vel(), 0);
    }

    #[test]
    fn test_vel_backlog_keeps_latest() {
        let mut t = TargetState::new(FollowMode::Velocity, Waypoint::new(0.0, 0.0, 0.0));
        for i in 0..(MAX_PENDING_VEL + 5) {
            t.apply_vel_cmd(&Twist::planar(i as f64, 0.0));
        }
        // Final command is a stop
        t.apply_vel_cmd(&Twist::planar(0.0, 0.0));
        assert_eq!(t.num_pending_vel(), MAX_PENDING_VEL);

        // The oldest samples were dropped, the stop is reached after at most the cap
        assert_eq!(t.pop_vel().speed_ms, 6.0);
        for _ in 1..MAX_PENDING_VEL {
            t.pop_vel();
        }
        assert!(t.requested_vel().is_zero());
        assert_eq!(t.num_pending_vel(), 0);
    }

    #[test]
    fn test_vel_ignored_in_path_mode() {
        let mut t = TargetState::new(FollowMode::Path, Waypoint::new(0.0, 0.0, 0.0));
        t.apply_vel_cmd(&Twist::planar(1.0, 0.0));

        assert_eq!(t.num_pending_vel(), 0);
        assert!(t.pop_vel().is_zero());
    }

    #[test]
    fn test_reset() {
        let mut t = TargetState::new(FollowMode::Velocity, Waypoint::new(0.0, 0.0, 0.0));
        t.apply_vel_cmd(&Twist::planar(1.0, 0.0));
        t.pop_vel();
        t.apply_abort(&Bool { data: true });

        t.reset(Waypoint::new(4.0, 4.0, 0.0));
        assert_eq!(t.mode(), FollowMode::Velocity);
        assert!(t.requested_vel().is_zero());
        assert!(!t.is_aborted());
        assert_eq!(t.waypoints().len(), 1);
        assert_eq!(t.target().position_m, Vector2::new(4.0, 4.0));
    }
}
