//! # Animation coordination
//!
//! Keeps the actor's skeleton animation consistent with how it is actually moving. The coordinator
//! owns the animation clock, which advances in proportion to the distance walked rather than with
//! simulated time, so the feet don't slide when the walking speed changes.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, warn};
use serde::Serialize;

use crate::host::{ActorHost, TrajectoryInfo};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Nominal duration of the custom trajectory installed on the actor.
pub const TRAJECTORY_DURATION_S: f64 = 1.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Selects the clip played and advances the animation clock.
#[derive(Debug, Clone)]
pub struct AnimCoordinator {
    clip: AnimClip,
    script_time_s: f64,
    installed: bool,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The two skeleton animations an actor must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnimClip {
    Walking,
    Standing,
}

#[derive(Debug, thiserror::Error)]
pub enum AnimError {
    #[error("Skeleton animation {0} not found")]
    MissingAnimation(&'static str),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl AnimClip {
    /// Name of the skeleton animation for this clip.
    pub fn name(&self) -> &'static str {
        match self {
            AnimClip::Walking => "walking",
            AnimClip::Standing => "standing",
        }
    }
}

impl Default for AnimClip {
    fn default() -> Self {
        AnimClip::Standing
    }
}

impl AnimCoordinator {
    /// Create a new coordinator with the clock starting at `script_time_s`.
    pub fn new(script_time_s: f64) -> Self {
        Self {
            clip: AnimClip::Standing,
            script_time_s,
            installed: false,
        }
    }

    /// Install the custom trajectory on the actor.
    ///
    /// If the actor is missing either animation nothing is installed, the actor is then left
    /// playing whatever animation the host gives it.
    pub fn install<H: ActorHost>(&mut self, host: &mut H) -> Result<(), AnimError> {
        self.clip = AnimClip::Standing;

        self.installed = false;
        check_animations(&host.skeleton_animations())?;

        host.set_custom_trajectory(TrajectoryInfo {
            clip: self.clip,
            duration_s: TRAJECTORY_DURATION_S,
        });
        self.installed = true;

        debug!("Custom trajectory installed on {}", host.name());

        Ok(())
    }

    /// Select the clip to play.
    pub fn select(&mut self, clip: AnimClip) {
        self.clip = clip;
    }

    /// Advance the animation clock by `delta_s`.
    ///
    /// The clock never runs backwards, negative and non-finite deltas are ignored.
    pub fn advance(&mut self, delta_s: f64) {
        if delta_s.is_finite() && delta_s >= 0.0 {
            self.script_time_s += delta_s;
        } else {
            warn!("Ignoring invalid animation clock step {}", delta_s);
        }
    }

    /// Push the selected clip and the clock to the actor.
    pub fn apply<H: ActorHost>(&self, host: &mut H) {
        if self.installed {
            host.set_trajectory_clip(self.clip);
        }
        host.set_script_time(self.script_time_s);
    }

    pub fn clip(&self) -> AnimClip {
        self.clip
    }

    pub fn script_time(&self) -> f64 {
        self.script_time_s
    }

    /// Returns `true` if the custom trajectory is installed.
    pub fn is_installed(&self) -> bool {
        self.installed
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Check that both required animations are in `available`.
pub fn check_animations(available: &[String]) -> Result<(), AnimError> {
    for clip in [AnimClip::Walking, AnimClip::Standing].iter() {
        if !available.iter().any(|a| a == clip.name()) {
            return Err(AnimError::MissingAnimation(clip.name()));
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
