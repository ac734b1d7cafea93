//! Respira Core
//!
//! Foundational types for the Respira breathing pacer:
//!
//! - **Breathing Phases**: the four-state inhale/hold/exhale/hold cycle
//! - **Render State**: the `{phase, progress}` value a renderer draws from
//! - **Settings**: the externally-owned configuration surface, shared to
//!   the engine through a snapshot/update wrapper
//!
//! This crate is deliberately leaf-level: it knows nothing about timing,
//! scheduling, or rendering. The cadence engine lives in `respira_engine`;
//! windowing, compositing, and persistence are external collaborators.

pub mod phase;
pub mod settings;

pub use phase::{BreathPhase, BreathState};
pub use settings::{AnimationCurve, Settings, SettingsError, SharedSettings};
