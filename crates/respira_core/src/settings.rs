//! The externally-owned configuration surface.
//!
//! The settings owner (UI, persistence layer, menu wiring) mutates a
//! [`SharedSettings`] at any time; the cadence engine reads a [`Settings`]
//! snapshot at each tick and never caches it beyond that tick. Values here
//! are *requests*, not guarantees — the engine defensively clamps
//! degenerate numbers (negative durations, NaN jitter) rather than
//! rejecting them, so a half-edited settings form can never wedge the
//! overlay.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::phase::BreathPhase;

/// How elapsed-time fraction maps to visual progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationCurve {
    /// Progress tracks elapsed time directly.
    Linear,
    /// Progress follows a cubic-Bézier ease-in-out curve.
    Sinusoidal,
}

/// Error raised by the JSON helpers on [`Settings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("malformed settings document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The full configuration surface consumed by the cadence engine.
///
/// Durations and jitter half-widths are seconds. `drift` multiplies every
/// base duration by `drift^cycle_count`, so values above 1.0 slowly
/// lengthen the breath over a session and values below 1.0 shorten it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub inhale_duration: f64,
    pub post_inhale_hold_duration: f64,
    pub exhale_duration: f64,
    pub post_exhale_hold_duration: f64,

    /// Per-cycle multiplicative growth/shrink factor, `>= 0`.
    pub drift: f64,

    /// Uniform-noise half-widths applied to each phase's duration.
    pub randomized_timing_inhale: f64,
    pub randomized_timing_post_inhale_hold: f64,
    pub randomized_timing_exhale: f64,
    pub randomized_timing_post_exhale_hold: f64,

    pub animation_curve: AnimationCurve,

    /// The overlay is running its breathing animation.
    pub is_animating: bool,
    /// The overlay is visible but frozen (static tint mode).
    pub is_paused: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inhale_duration: 5.0,
            post_inhale_hold_duration: 0.0,
            exhale_duration: 10.0,
            post_exhale_hold_duration: 0.0,
            drift: 1.01,
            randomized_timing_inhale: 0.0,
            randomized_timing_post_inhale_hold: 0.0,
            randomized_timing_exhale: 0.0,
            randomized_timing_post_exhale_hold: 0.0,
            animation_curve: AnimationCurve::Sinusoidal,
            is_animating: false,
            is_paused: false,
        }
    }
}

impl Settings {
    /// Base duration configured for `phase`, before drift and jitter.
    pub fn base_duration(&self, phase: BreathPhase) -> f64 {
        match phase {
            BreathPhase::Inhale => self.inhale_duration,
            BreathPhase::HoldAfterInhale => self.post_inhale_hold_duration,
            BreathPhase::Exhale => self.exhale_duration,
            BreathPhase::HoldAfterExhale => self.post_exhale_hold_duration,
        }
    }

    /// Jitter half-width configured for `phase`.
    pub fn jitter(&self, phase: BreathPhase) -> f64 {
        match phase {
            BreathPhase::Inhale => self.randomized_timing_inhale,
            BreathPhase::HoldAfterInhale => self.randomized_timing_post_inhale_hold,
            BreathPhase::Exhale => self.randomized_timing_exhale,
            BreathPhase::HoldAfterExhale => self.randomized_timing_post_exhale_hold,
        }
    }

    /// Parse settings from a JSON document.
    ///
    /// Missing fields fall back to their defaults; unknown fields are
    /// ignored. The engine never calls this itself — it exists for the
    /// external settings owner.
    pub fn from_json(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize settings to a JSON document.
    pub fn to_json(&self) -> Result<String, SettingsError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Shared handle to live settings.
///
/// Cheap to clone; every clone refers to the same underlying settings.
/// Readers take a snapshot, writers mutate through a closure — the lock is
/// never held across a caller-visible boundary.
#[derive(Clone, Debug, Default)]
pub struct SharedSettings {
    inner: Arc<RwLock<Settings>>,
}

impl SharedSettings {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
        }
    }

    /// Copy of the current settings.
    pub fn snapshot(&self) -> Settings {
        *self.inner.read().unwrap()
    }

    /// Mutate the settings in place.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&mut Settings),
    {
        let mut guard = self.inner.write().unwrap();
        f(&mut guard);
        let updated = *guard;
        drop(guard);
        tracing::trace!(?updated, "settings updated");
    }

    /// Replace the settings wholesale.
    pub fn replace(&self, settings: Settings) {
        *self.inner.write().unwrap() = settings;
    }
}
