//! Mock host actor used in tests

use crate::{
    anim::AnimClip,
    host::{ActorHost, Pose, TrajectoryInfo},
};

/// An actor which records everything the controller does to it.
#[derive(Debug, Clone)]
pub struct MockActor {
    pub name: String,
    pub pose: Pose,
    pub script_time_s: f64,
    pub animations: Vec<String>,
    pub trajectory: Option<TrajectoryInfo>,
    pub num_pose_sets: usize,
}

impl MockActor {
    /// A new actor at the origin, with both required animations.
    pub fn new(name: &str) -> Self {
        Self {
            name: String::from(name),
            pose: Pose::default(),
            script_time_s: 0.0,
            animations: vec![
                String::from("standing"),
                String::from("walking"),
                String::from("running"),
            ],
            trajectory: None,
            num_pose_sets: 0,
        }
    }
}

impl ActorHost for MockActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn world_pose(&self) -> Pose {
        self.pose
    }

    fn set_world_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.num_pose_sets += 1;
    }

    fn script_time(&self) -> f64 {
        self.script_time_s
    }

    fn set_script_time(&mut self, time_s: f64) {
        self.script_time_s = time_s;
    }

    fn skeleton_animations(&self) -> Vec<String> {
        self.animations.clone()
    }

    fn set_custom_trajectory(&mut self, trajectory: TrajectoryInfo) {
        self.trajectory = Some(trajectory);
    }

    fn set_trajectory_clip(&mut self, clip: AnimClip) {
        if let Some(ref mut t) = self.trajectory {
            t.clip = clip;
        }
    }
}
