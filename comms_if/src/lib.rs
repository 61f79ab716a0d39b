//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the actor controller.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions carried by the network layer
pub mod msg;

/// Network module
pub mod net;
