//! Respira Cadence Engine
//!
//! The timing core of the breathing-pacer overlay:
//!
//! - **Phase Machine**: four-state inhale/hold/exhale/hold cycle with
//!   per-phase durations shaped by drift and randomized jitter
//! - **Easing Table**: one-time cubic-Bézier ease-in-out lookup table,
//!   built by Newton–Raphson inversion
//! - **Adaptive Redraw Scheduler**: decides per tick whether a redraw is
//!   warranted and when the next tick should land, with hysteresis
//!   between a fast and a slow draw cadence
//! - **Pacing Driver**: a self-rescheduling background thread that feeds
//!   the engine its own recommended delays
//!
//! The engine renders nothing. It reads the shared [`respira_core`]
//! settings, invokes a registered draw-request callback when a redraw is
//! warranted, and answers "what should be drawn right now" through
//! [`CadenceEngine::current_state`].

pub mod easing;
pub mod engine;

pub use easing::EasingTable;
pub use engine::{CadenceEngine, DrawCallback, Tick};
