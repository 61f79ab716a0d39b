//! # Actor controller library.
//!
//! Per-tick motion control for a simulated animated actor. The actor follows either a stream of
//! velocity commands or a list of waypoints, plays a walking or standing animation to match and
//! publishes its own odometry.
//!
//! The host simulation engine is reached through [`host::ActorHost`] and messages through
//! [`comms_if::net::Transport`], [`plugin::ActorPlugin`] ties everything together.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Animation coordination - picks the clip to play and runs the animation clock
pub mod anim;

/// Command queues - decouple command delivery from the simulation tick
pub mod cmd_queue;

/// Host interface - what the controller needs from the simulation engine
pub mod host;

/// Motion control module - the per-tick state machine moving the actor
pub mod motion_ctrl;

/// Odometry - converts each tick's result into an odometry message
pub mod odom;

/// Actor controller parameters
pub mod params;

/// Plugin lifecycle - load, update, reset and shutdown of the controller for one actor
pub mod plugin;

/// Target state - what the actor is currently trying to do
pub mod target;

#[cfg(test)]
pub(crate) mod mock_host;
