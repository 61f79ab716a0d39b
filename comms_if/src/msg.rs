//! # Message Interface
//!
//! This module defines the messages exchanged between the actor controller and the messaging
//! layer. The layouts follow the common robotics conventions (twist, path, odometry) so that
//! bridges to other middlewares are a field-by-field copy.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod geometry;
pub mod nav;
pub mod std_msgs;
