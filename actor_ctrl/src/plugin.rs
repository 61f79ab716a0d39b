//! # Actor plugin
//!
//! The plugin ties the controller together for one actor:
//!
//! 1. On load the parameters are checked, the target state is seeded with the actor's current
//!    pose, the custom trajectory is installed, one [`QueueWorker`] is started per command topic
//!    and the odometry topic is advertised.
//! 2. On every simulation step the host calls [`ActorPlugin::on_update`], which runs motion
//!    control, publishes odometry, moves the actor and updates its animation.
//! 3. On shutdown (or drop) the subscriptions are removed and the workers are stopped and joined.
//!
//! Nothing in `on_update` can fail past the tick boundary. Errors are logged and the actor holds
//! its position for that step.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::{sync::Arc, time::Duration};

use comms_if::{
    msg::{geometry::Twist, nav::Path, std_msgs::Bool},
    net::{NetError, Subscription, Transport},
};
use log::{debug, error, info, trace, warn};
use serde::de::DeserializeOwned;
use util::{module::State, params::LoadError};

use crate::{
    anim::AnimCoordinator,
    cmd_queue::{CmdQueue, CmdQueueError, QueueWorker},
    host::{ActorHost, Pose, UpdateInfo},
    motion_ctrl::{self, MotionCtrl, MotionCtrlError, StatusReport},
    odom::OdomPublisher,
    params::{ActorParams, ParamsError},
    target::{SharedTarget, TargetState, Waypoint},
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Controller for a single actor.
pub struct ActorPlugin<H: ActorHost> {
    host: H,
    params: ActorParams,
    name: String,

    target: SharedTarget,
    motion_ctrl: MotionCtrl,
    anim: AnimCoordinator,
    odom: OdomPublisher,

    vel_worker: QueueWorker<Twist>,
    path_worker: QueueWorker<Path>,
    abort_worker: QueueWorker<Bool>,
    subscriptions: Vec<Subscription>,

    last_update_s: f64,
    last_output: Option<motion_ctrl::OutputData>,
    last_report: Option<StatusReport>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("The transport is not ready, the plugin cannot be loaded")]
    TransportNotReady,

    #[error("Could not load the parameter file: {0}")]
    ParamsLoadError(#[from] LoadError),

    #[error("Invalid parameters: {0}")]
    InvalidParams(#[from] ParamsError),

    #[error("Transport error: {0}")]
    NetError(#[from] NetError),

    #[error("Could not start a command worker: {0}")]
    WorkerError(#[from] CmdQueueError),

    #[error("Could not initialise motion control: {0}")]
    MotionCtrlError(#[from] MotionCtrlError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<H: ActorHost> ActorPlugin<H> {
    /// Load the plugin for the actor `host` with the parameters in the given file.
    ///
    /// The path is relative to `$ACTOR_CTRL_SW_ROOT/params`.
    pub fn load_from_file<T: Transport>(
        host: H,
        transport: &T,
        param_file_path: &str,
    ) -> Result<Self, PluginError> {
        let params: ActorParams = util::params::load(param_file_path)?;
        Self::load(host, transport, params)
    }

    /// Load the plugin for the actor `host`.
    ///
    /// Fails, leaving the actor untouched, if the parameters are invalid or the transport is not
    /// ready. A missing walking or standing animation is logged but does not stop the plugin
    /// loading.
    pub fn load<T: Transport>(
        mut host: H,
        transport: &T,
        params: ActorParams,
    ) -> Result<Self, PluginError> {
        params.validate()?;

        if !transport.is_ready() {
            error!(
                "Transport not ready, unable to load the controller for {}",
                host.name()
            );
            return Err(PluginError::TransportNotReady);
        }

        let name = String::from(host.name());
        info!("Loading controller for {} in {:?} mode", name, params.follow_mode);

        // The actor starts out targeting where it already is
        let target =
            TargetState::new_shared(params.follow_mode, initial_waypoint(&host.world_pose()));
        let motion_ctrl = MotionCtrl::init((params.clone(), target.clone()))?;

        let mut anim = AnimCoordinator::new(host.script_time());
        if let Err(e) = anim.install(&mut host) {
            error!("{}: {}, custom trajectory not installed", name, e);
        }

        // Start the workers before subscribing so no command is ever pushed into a queue nobody
        // drains
        let timeout = params.queue_timeout();
        let vel_worker = spawn_worker("vel", &target, timeout, |t, msg: Twist| {
            t.apply_vel_cmd(&msg)
        })?;
        let path_worker = spawn_worker("path", &target, timeout, |t, msg: Path| {
            let rejected = t.apply_path(&msg);
            if rejected > 0 {
                warn!("{} waypoint(s) rejected from new path", rejected);
            }
        })?;
        let abort_worker = spawn_worker("abort", &target, timeout, |t, msg: Bool| {
            t.apply_abort(&msg)
        })?;

        let subscriptions = vec![
            subscribe_queue(transport, &params.vel_topic, vel_worker.queue())?,
            subscribe_queue(transport, &params.path_topic, path_worker.queue())?,
            subscribe_queue(transport, &params.abort_topic, abort_worker.queue())?,
        ];

        let odom_topic = params.odom_topic_for(&name);
        let odom = OdomPublisher::new(
            transport.advertise(&odom_topic)?,
            &params.odom_frame_id,
            &name,
            params.default_rotation_rad,
        );

        info!(
            "{} listening on {}, {} and {}, publishing odometry on {}",
            name, params.vel_topic, params.path_topic, params.abort_topic, odom_topic
        );

        Ok(Self {
            host,
            params,
            name,
            target,
            motion_ctrl,
            anim,
            odom,
            vel_worker,
            path_worker,
            abort_worker,
            subscriptions,
            last_update_s: 0.0,
            last_output: None,
            last_report: None,
        })
    }

    /// Run one simulation step.
    pub fn on_update(&mut self, info: &UpdateInfo) {
        let mut dt_s = info.sim_time_s - self.last_update_s;
        if !(dt_s >= 0.0) {
            warn!(
                "{}: simulation time went from {} to {}, using a zero time step",
                self.name, self.last_update_s, info.sim_time_s
            );
            dt_s = 0.0;
        }

        let world_pose = self.host.world_pose();
        let input = motion_ctrl::InputData {
            pose: world_pose.planar(),
            dt_s,
        };

        match self.motion_ctrl.proc(&input) {
            Ok((output, report)) => {
                trace!("{} MotionCtrl status: {:?}", self.name, report);

                self.odom.publish(&output.pose, &output.twist);
                self.host.set_world_pose(world_pose.with_planar(&output.pose));

                self.anim.select(output.clip);
                self.anim
                    .advance(output.dist_travelled_m * self.params.animation_factor);
                self.anim.apply(&mut self.host);

                self.last_output = Some(output);
                self.last_report = Some(report);
            }
            Err(e) => warn!("{}: motion control failed, holding position: {}", self.name, e),
        }

        self.last_update_s = info.sim_time_s;
    }

    /// Return the controller to its state at load, targeting the actor's current pose.
    ///
    /// Commands that have been received but not yet applied are discarded.
    pub fn reset(&mut self) {
        info!("Resetting controller for {}", self.name);

        self.last_update_s = 0.0;
        self.last_output = None;
        self.last_report = None;

        self.vel_worker.queue().clear();
        self.path_worker.queue().clear();
        self.abort_worker.queue().clear();

        match self.target.lock() {
            Ok(mut t) => t.reset(initial_waypoint(&self.host.world_pose())),
            Err(_) => error!("{}: target state mutex poisoned, cannot reset", self.name),
        }

        self.anim = AnimCoordinator::new(self.host.script_time());
        if let Err(e) = self.anim.install(&mut self.host) {
            error!("{}: {}, custom trajectory not installed", self.name, e);
        }
    }

    /// Unsubscribe from the command topics, then stop and join the command workers.
    ///
    /// Commands published after this are dropped. Calling this more than once has no further
    /// effect, it is also called when the plugin is dropped.
    pub fn shutdown(&mut self) {
        if self.is_running() {
            debug!("Stopping command workers for {}", self.name);
        }

        self.subscriptions.clear();
        self.vel_worker.shutdown();
        self.path_worker.shutdown();
        self.abort_worker.shutdown();
    }

    /// Returns `true` while the command workers are running.
    pub fn is_running(&self) -> bool {
        self.vel_worker.is_running()
            || self.path_worker.is_running()
            || self.abort_worker.is_running()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn params(&self) -> &ActorParams {
        &self.params
    }

    /// The target state shared with the command workers.
    pub fn target(&self) -> &SharedTarget {
        &self.target
    }

    pub fn anim(&self) -> &AnimCoordinator {
        &self.anim
    }

    pub fn odom_topic(&self) -> &str {
        self.odom.topic()
    }

    /// Output of the latest successful step.
    pub fn last_output(&self) -> Option<&motion_ctrl::OutputData> {
        self.last_output.as_ref()
    }

    /// Status report of the latest successful step.
    pub fn last_report(&self) -> Option<&StatusReport> {
        self.last_report.as_ref()
    }
}

impl<H: ActorHost> Drop for ActorPlugin<H> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn initial_waypoint(pose: &Pose) -> Waypoint {
    Waypoint::new(pose.position_m[0], pose.position_m[1], pose.get_heading())
}

/// Start a worker applying each command from its queue to the target state.
fn spawn_worker<M, F>(
    name: &str,
    target: &SharedTarget,
    timeout: Duration,
    apply: F,
) -> Result<QueueWorker<M>, PluginError>
where
    M: Send + 'static,
    F: Fn(&mut TargetState, M) + Send + 'static,
{
    let target = target.clone();
    let worker_name = String::from(name);

    let worker = QueueWorker::spawn(name, Arc::new(CmdQueue::new()), timeout, move |msg| {
        match target.lock() {
            Ok(mut t) => apply(&mut *t, msg),
            Err(_) => error!("{} worker: target state mutex poisoned", worker_name),
        }
    })?;

    Ok(worker)
}

/// Subscribe to `topic`, pushing every message received into `queue`.
fn subscribe_queue<T, M>(
    transport: &T,
    topic: &str,
    queue: &Arc<CmdQueue<M>>,
) -> Result<Subscription, PluginError>
where
    T: Transport,
    M: DeserializeOwned + Send + 'static,
{
    let queue = queue.clone();
    let topic_name = String::from(topic);

    let sub = transport.subscribe(topic, move |msg: M| {
        if !queue.push(msg) {
            trace!("Command on {} dropped, queue disabled", topic_name);
        }
    })?;

    Ok(sub)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{anim::AnimClip, mock_host::MockActor, params::FollowMode};
    use approx::assert_abs_diff_eq;
    use comms_if::{
        msg::{
            geometry::{Point, Pose as PoseMsg, PoseStamped, Quaternion},
            nav::Odometry,
            std_msgs::Header,
        },
        net::LocalBus,
    };
    use nalgebra::Vector3;
    use std::{
        f64::consts::FRAC_PI_2,
        sync::Mutex,
        thread,
        time::Instant,
    };

    /// Poll `cond` until it's true, failing the test after a generous timeout.
    fn wait_until<F: FnMut() -> bool>(mut cond: F) {
        let start = Instant::now();
        while !cond() {
            assert!(
                start.elapsed() < Duration::from_secs(5),
                "Timed out waiting for condition"
            );
            thread::sleep(Duration::from_millis(1));
        }
    }

    fn path_msg(points: &[(f64, f64)]) -> Path {
        Path {
            header: Header::now("map"),
            poses: points
                .iter()
                .map(|&(x, y)| PoseStamped {
                    header: Header::now("map"),
                    pose: PoseMsg {
                        position: Point::new(x, y, 0.0),
                        orientation: Quaternion::default(),
                    },
                })
                .collect(),
        }
    }

    fn path_params() -> ActorParams {
        ActorParams {
            follow_mode: FollowMode::Path,
            angular_tolerance_rad: std::f64::consts::PI,
            ..ActorParams::default()
        }
    }

    #[test]
    fn test_load_not_ready() {
        let bus = LocalBus::new();
        bus.set_ready(false);

        let result = ActorPlugin::load(MockActor::new("actor1"), &bus, ActorParams::default());
        assert!(matches!(result, Err(PluginError::TransportNotReady)));
        assert_eq!(bus.num_subscribers("/cmd_vel"), 0);
    }

    #[test]
    fn test_load_invalid_params() {
        let bus = LocalBus::new();
        let params = ActorParams {
            queue_timeout_s: 0.0,
            ..ActorParams::default()
        };

        let result = ActorPlugin::load(MockActor::new("actor1"), &bus, params);
        assert!(matches!(result, Err(PluginError::InvalidParams(_))));
    }

    #[test]
    fn test_load() {
        let bus = LocalBus::new();
        let plugin = ActorPlugin::load(MockActor::new("actor1"), &bus, ActorParams::default())
            .unwrap();

        assert_eq!(plugin.odom_topic(), "actor1/odom");
        assert_eq!(bus.num_subscribers("/cmd_vel"), 1);
        assert_eq!(bus.num_subscribers("/cmd_path"), 1);
        assert_eq!(bus.num_subscribers("/abort_goal"), 1);
        assert!(plugin.anim().is_installed());
        assert!(plugin.is_running());
        assert_eq!(
            plugin.host().trajectory.map(|t| t.clip),
            Some(AnimClip::Standing)
        );
    }

    #[test]
    fn test_load_missing_animation() {
        let bus = LocalBus::new();
        let mut host = MockActor::new("actor1");
        host.animations = vec![String::from("standing")];

        let mut plugin = ActorPlugin::load(host, &bus, ActorParams::default()).unwrap();
        assert!(!plugin.anim().is_installed());
        assert!(plugin.host().trajectory.is_none());

        // The actor is still driven
        bus.publish("/cmd_vel", &Twist::planar(1.0, 0.0)).unwrap();
        wait_until(|| plugin.target().lock().unwrap().num_pending_vel() == 1);
        plugin.on_update(&UpdateInfo { sim_time_s: 1.0 });
        assert_abs_diff_eq!(plugin.host().pose.position_m[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_end_to_end() {
        let bus = LocalBus::new();
        let odoms = Arc::new(Mutex::new(Vec::new()));
        let rx = odoms.clone();
        let _sub = bus
            .subscribe("actor1/odom", move |o: Odometry| rx.lock().unwrap().push(o))
            .unwrap();

        let params = ActorParams {
            default_rotation_rad: FRAC_PI_2,
            ..ActorParams::default()
        };
        let mut host = MockActor::new("actor1");
        host.pose = Pose::from_parts(Vector3::new(0.0, 0.0, 1.0), FRAC_PI_2, 0.0, FRAC_PI_2);
        let mut plugin = ActorPlugin::load(host, &bus, params).unwrap();

        bus.publish("/cmd_vel", &Twist::planar(0.5, 0.0)).unwrap();
        wait_until(|| plugin.target().lock().unwrap().num_pending_vel() == 1);

        for i in 1..=4 {
            plugin.on_update(&UpdateInfo {
                sim_time_s: i as f64 * 0.5,
            });
        }

        // 2 s at 0.5 m/s along +X, the model's yaw offset cancels out
        let pose = plugin.host().pose;
        assert_abs_diff_eq!(pose.position_m[0], 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.position_m[1], 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(pose.position_m[2], 1.0);
        assert_abs_diff_eq!(pose.attitude_q.euler_angles().0, FRAC_PI_2, epsilon = 1e-9);

        // Animation clock advanced by distance times the animation factor
        assert_abs_diff_eq!(plugin.host().script_time_s, 4.0, epsilon = 1e-9);
        assert_eq!(
            plugin.host().trajectory.map(|t| t.clip),
            Some(AnimClip::Walking)
        );

        let odoms = odoms.lock().unwrap();
        assert_eq!(odoms.len(), 4);
        let last = &odoms[3];
        assert_eq!(last.header.frame_id, "map");
        assert_eq!(last.child_frame_id, "actor1");
        assert_abs_diff_eq!(last.pose.position.x, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(last.pose.orientation.z, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(last.twist.linear.x, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn test_path_end_to_end() {
        let bus = LocalBus::new();
        let mut plugin = ActorPlugin::load(MockActor::new("actor1"), &bus, path_params()).unwrap();

        bus.publish("/cmd_path", &path_msg(&[(2.0, 0.0), (2.0, 2.0)]))
            .unwrap();
        wait_until(|| plugin.target().lock().unwrap().waypoints().len() == 2);

        let mut t = 0.0;
        for _ in 0..60 {
            t += 0.1;
            plugin.on_update(&UpdateInfo { sim_time_s: t });
        }

        let pose = plugin.host().pose;
        assert!((pose.position_m[0] - 2.0).abs() < 0.1);
        assert!((pose.position_m[1] - 2.0).abs() < 0.1);
        assert!(plugin.last_report().unwrap().path_complete);
        assert_eq!(plugin.anim().clip(), AnimClip::Standing);
    }

    #[test]
    fn test_abort_end_to_end() {
        let bus = LocalBus::new();
        let mut plugin = ActorPlugin::load(MockActor::new("actor1"), &bus, path_params()).unwrap();

        bus.publish("/cmd_path", &path_msg(&[(5.0, 0.0)])).unwrap();
        wait_until(|| plugin.target().lock().unwrap().target().position_m[0] == 5.0);
        plugin.on_update(&UpdateInfo { sim_time_s: 0.5 });
        let held = plugin.host().pose.position_m;
        assert!(held[0] > 0.0);

        bus.publish("/abort_goal", &Bool { data: true }).unwrap();
        wait_until(|| plugin.target().lock().unwrap().is_aborted());

        for i in 2..10 {
            plugin.on_update(&UpdateInfo {
                sim_time_s: i as f64 * 0.5,
            });
            assert_eq!(plugin.host().pose.position_m, held);
            assert_eq!(plugin.anim().clip(), AnimClip::Standing);
        }
    }

    #[test]
    fn test_time_going_backwards() {
        let bus = LocalBus::new();
        let mut plugin =
            ActorPlugin::load(MockActor::new("actor1"), &bus, ActorParams::default()).unwrap();

        bus.publish("/cmd_vel", &Twist::planar(1.0, 0.0)).unwrap();
        wait_until(|| plugin.target().lock().unwrap().num_pending_vel() == 1);

        plugin.on_update(&UpdateInfo { sim_time_s: 2.0 });
        let x = plugin.host().pose.position_m[0];
        assert_abs_diff_eq!(x, 2.0, epsilon = 1e-12);

        plugin.on_update(&UpdateInfo { sim_time_s: 1.0 });
        assert_eq!(plugin.host().pose.position_m[0], x);

        // The clock restarts from the new time
        plugin.on_update(&UpdateInfo { sim_time_s: 1.5 });
        assert_abs_diff_eq!(plugin.host().pose.position_m[0], 2.5, epsilon = 1e-12);
    }

    #[test]
    fn test_reset() {
        let bus = LocalBus::new();
        let mut plugin = ActorPlugin::load(MockActor::new("actor1"), &bus, path_params()).unwrap();

        bus.publish("/cmd_path", &path_msg(&[(5.0, 0.0)])).unwrap();
        wait_until(|| plugin.target().lock().unwrap().target().position_m[0] == 5.0);
        plugin.on_update(&UpdateInfo { sim_time_s: 1.0 });

        plugin.host_mut().pose.position_m = Vector3::new(-1.0, -1.0, 0.0);
        plugin.reset();

        {
            let t = plugin.target().lock().unwrap();
            assert_eq!(t.waypoints().len(), 1);
            assert_abs_diff_eq!(t.target().position_m[0], -1.0);
        }
        assert!(plugin.last_report().is_none());

        plugin.on_update(&UpdateInfo { sim_time_s: 0.5 });
        assert_eq!(plugin.host().pose.position_m[0], -1.0);
        assert!(plugin.last_report().unwrap().path_complete);
    }

    #[test]
    fn test_shutdown() {
        let bus = LocalBus::new();
        let mut plugin =
            ActorPlugin::load(MockActor::new("actor1"), &bus, ActorParams::default()).unwrap();

        plugin.shutdown();
        assert!(!plugin.is_running());
        assert_eq!(bus.num_subscribers("/cmd_vel"), 0);
        assert_eq!(bus.num_subscribers("/cmd_path"), 0);
        assert_eq!(bus.num_subscribers("/abort_goal"), 0);
        plugin.shutdown();

        // Commands after shutdown never reach the target
        bus.publish("/cmd_vel", &Twist::planar(1.0, 0.0)).unwrap();
        assert_eq!(plugin.target().lock().unwrap().num_pending_vel(), 0);

        // Ticking still works
        plugin.on_update(&UpdateInfo { sim_time_s: 1.0 });
        assert_eq!(plugin.host().pose.position_m, Vector3::zeros());
    }

    #[test]
    fn test_reload_does_not_leak_subscriptions() {
        let bus = LocalBus::new();

        for _ in 0..3 {
            let plugin =
                ActorPlugin::load(MockActor::new("actor1"), &bus, ActorParams::default()).unwrap();
            assert_eq!(bus.num_subscribers("/cmd_vel"), 1);
            drop(plugin);
        }

        assert_eq!(bus.num_subscribers("/cmd_vel"), 0);
        assert_eq!(bus.num_subscribers("/cmd_path"), 0);
        assert_eq!(bus.num_subscribers("/abort_goal"), 0);
    }
}
