//! The breathing cadence engine.
//!
//! Owns the four-phase state machine, per-phase duration computation
//! (base × drift^cycle ± jitter, floored), and the adaptive redraw
//! scheduler. All engine state lives behind one mutex; [`CadenceEngine::tick`]
//! and the state queries take the same lock, so a renderer never observes
//! a torn update.
//!
//! The engine is driven by [`CadenceEngine::tick`], which returns a
//! [`Tick`]: whether a redraw is warranted now, and how long the driver
//! should wait before ticking again. The built-in pacing thread simply
//! loops tick → callback → sleep; any other driver (a display-refresh
//! callback, a test with a synthetic clock) can call `tick` on its own
//! schedule and ignore or honor the recommended delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use respira_core::{BreathPhase, BreathState, Settings, SharedSettings};

use crate::easing::EasingTable;

/// Phases never run shorter than this, whatever the settings say.
/// Prevents zero-length phases (division by zero) and runaway cycling
/// from negative jitter or a misconfigured form.
const MIN_PHASE_DURATION: f64 = 0.1;

/// Cap at 24 fps during fast motion to bound CPU/GPU work while staying
/// visually smooth; drop to 14 fps when progress is barely moving.
const MAX_DRAW_INTERVAL_FAST: f64 = 1.0 / 24.0;
const MAX_DRAW_INTERVAL_SLOW: f64 = 1.0 / 14.0;

/// Hysteresis thresholds for the draw cadence. The gap between them keeps
/// the cadence from flapping when the progress delta sits near a single
/// boundary, which happens around the midpoint of an eased curve.
const ENTER_FAST_THRESHOLD: f32 = 0.006;
const EXIT_FAST_THRESHOLD: f32 = 0.0035;

/// Progress deltas below this are imperceptible; skip the draw entirely.
const MIN_PROGRESS_DELTA: f32 = 0.0025;

/// While paused the overlay is a static tint; redraw once a second so
/// live settings edits still show up.
const PAUSED_DRAW_INTERVAL: f64 = 1.0;

/// Recheck interval while neither animating nor paused.
const IDLE_BACKOFF: f64 = 1.0;

/// Callback invoked when a redraw is warranted.
///
/// Called synchronously from the tick path, which may be the pacing
/// thread. The receiver is responsible for marshaling onto whatever
/// thread owns the drawable surface.
pub type DrawCallback = Arc<dyn Fn() + Send + Sync>;

/// Outcome of one [`CadenceEngine::tick`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tick {
    /// A redraw is warranted now.
    pub draw: bool,
    /// Recommended wait before the next tick.
    pub next_delay: Duration,
}

impl Tick {
    fn draw_then_wait(delay: f64) -> Self {
        Self {
            draw: true,
            next_delay: to_duration(delay),
        }
    }

    fn wait(delay: f64) -> Self {
        Self {
            draw: false,
            next_delay: to_duration(delay),
        }
    }
}

fn to_duration(delay: f64) -> Duration {
    if delay.is_finite() {
        Duration::from_secs_f64(delay.max(0.0))
    } else {
        Duration::from_secs_f64(IDLE_BACKOFF)
    }
}

/// Engine-owned mutable state. Mutated only with the mutex held.
struct EngineInner {
    cycle_count: u64,
    phase: BreathPhase,
    /// Engine-clock reading at the current phase's entry.
    phase_start: f64,
    phase_duration: f64,

    /// Rendered-once latch for the current hold occurrence.
    did_render_this_hold: bool,

    last_draw_time: f64,
    last_drawn_phase: BreathPhase,
    /// −1 until the first draw after `start()`.
    last_drawn_progress: f32,
    fast_cadence: bool,

    /// Engine-clock reading at pause entry; state queries freeze here.
    paused_at: Option<f64>,
}

impl EngineInner {
    fn new() -> Self {
        Self {
            cycle_count: 0,
            phase: BreathPhase::Inhale,
            phase_start: 0.0,
            phase_duration: 1.0,
            did_render_this_hold: false,
            last_draw_time: f64::NEG_INFINITY,
            last_drawn_phase: BreathPhase::Inhale,
            last_drawn_progress: -1.0,
            fast_cadence: false,
            paused_at: None,
        }
    }
}

/// The breathing cadence engine.
///
/// Cheap to clone; every clone is a handle onto the same engine. One
/// clone typically lives with the settings/UI layer (for `start`/`stop`)
/// while another lives with the renderer (for `current_state`).
///
/// The pacing thread keeps its own handle, so it survives clones being
/// dropped; call `stop()` when the overlay goes away. `stop()` joins the
/// pacing thread and therefore must not be called from inside the draw
/// callback; doing so is detected and skips the join rather than
/// deadlocking.
#[derive(Clone)]
pub struct CadenceEngine {
    settings: SharedSettings,
    inner: Arc<Mutex<EngineInner>>,
    easing: Arc<EasingTable>,
    /// Monotonic origin of the engine clock; all public times are `f64`
    /// seconds from here.
    epoch: Instant,
    stop_flag: Arc<AtomicBool>,
    draw_callback: Arc<RwLock<Option<DrawCallback>>>,
    pacer: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl CadenceEngine {
    pub fn new(settings: SharedSettings) -> Self {
        Self {
            settings,
            inner: Arc::new(Mutex::new(EngineInner::new())),
            easing: Arc::new(EasingTable::ease_in_out()),
            epoch: Instant::now(),
            stop_flag: Arc::new(AtomicBool::new(false)),
            draw_callback: Arc::new(RwLock::new(None)),
            pacer: Arc::new(Mutex::new(None)),
        }
    }

    /// Register the draw-request callback.
    ///
    /// Replaces any previously registered callback.
    pub fn on_draw_requested<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.draw_callback.write().unwrap() = Some(Arc::new(callback));
    }

    /// Current engine-clock reading, in seconds since construction.
    pub fn now(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// (Re)start the engine from the top of an inhale.
    ///
    /// Resets the cycle count and all scheduler state, then starts the
    /// pacing thread. Idempotent under repeated calls — always restarts
    /// from Inhale. The first tick usually produces a draw request
    /// immediately.
    pub fn start(&self) {
        self.reset_at(self.now());
        self.stop();
        self.spawn_pacer();
        tracing::debug!("cadence engine started");
    }

    /// Halt the pacing thread. Engine state is retained but frozen; the
    /// engine is inert until `start()` is called again. Safe to call from
    /// any thread, and a no-op when already stopped.
    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        let handle = self.pacer.lock().unwrap().take();
        if let Some(handle) = handle {
            // Joining from the pacer thread itself (stop() inside the
            // draw callback) would deadlock; let the thread wind down on
            // its own instead.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
            tracing::debug!("cadence engine stopped");
        }
    }

    /// Start or stop according to the animating/paused flags: the engine
    /// runs whenever the overlay is animating or showing the paused tint.
    pub fn start_if_needed(&self) {
        let settings = self.settings.snapshot();
        if settings.is_animating || settings.is_paused {
            self.start();
        } else {
            self.stop();
        }
    }

    /// What should be drawn at engine-clock time `now`.
    pub fn state_at(&self, now: f64) -> BreathState {
        let settings = self.settings.snapshot();
        let inner = self.inner.lock().unwrap();
        self.compute_state(&inner, &settings, now)
    }

    /// What should be drawn right now. The renderer's pull query; not
    /// necessarily synchronized with the last tick.
    pub fn current_state(&self) -> BreathState {
        self.state_at(self.now())
    }

    /// Completed breathing cycles since the last `start()`.
    pub fn cycle_count(&self) -> u64 {
        self.inner.lock().unwrap().cycle_count
    }

    pub fn current_phase(&self) -> BreathPhase {
        self.inner.lock().unwrap().phase
    }

    /// Advance time to `now`: possibly advance the phase machine, decide
    /// whether a redraw is warranted, and recommend the delay until the
    /// next tick.
    ///
    /// The scheduling core. Decisions, in priority order: idle backoff
    /// when neither animating nor paused; once-a-second refresh while
    /// paused; draw-once-then-sleep-to-boundary during holds; and
    /// delta-gated, hysteresis-paced draws during motion. The recommended
    /// delay never overshoots the current phase boundary.
    pub fn tick(&self, now: f64) -> Tick {
        let settings = self.settings.snapshot();
        let mut inner = self.inner.lock().unwrap();

        if !settings.is_animating && !settings.is_paused {
            inner.fast_cadence = false;
            return Tick::wait(IDLE_BACKOFF);
        }

        // Pause mode: the tint is static, but redraw occasionally so
        // live settings edits still show up. The phase machine does not
        // advance; the first paused tick latches the freeze point.
        if settings.is_paused {
            if inner.paused_at.is_none() {
                inner.paused_at = Some(now);
                tracing::debug!(at = now, "paused; overlay frozen");
            }
            inner.fast_cadence = false;

            let since_last_draw = now - inner.last_draw_time;
            if since_last_draw < PAUSED_DRAW_INTERVAL {
                return Tick::wait(PAUSED_DRAW_INTERVAL - since_last_draw);
            }
            let state = self.compute_state(&inner, &settings, now);
            record_draw(&mut inner, state, now);
            return Tick::draw_then_wait(PAUSED_DRAW_INTERVAL);
        }

        // Leaving pause restarts the current phase from scratch with a
        // freshly computed duration (see DESIGN.md for the policy).
        if inner.paused_at.take().is_some() {
            inner.phase_start = now;
            inner.phase_duration = compute_phase_duration(&settings, inner.phase, inner.cycle_count);
            inner.did_render_this_hold = false;
            inner.fast_cadence = false;
            tracing::debug!(phase = %inner.phase, "unpaused; phase restarted");
        }

        let elapsed = now - inner.phase_start;

        if inner.phase.is_hold() {
            if elapsed >= inner.phase_duration {
                self.advance_phase(&mut inner, &settings, now);
                let state = self.compute_state(&inner, &settings, now);
                record_draw(&mut inner, state, now);
                return Tick::draw_then_wait(MAX_DRAW_INTERVAL_FAST);
            }

            // Holds are constant-valued: draw exactly once, then sleep
            // precisely to the phase boundary.
            let remaining = inner.phase_duration - elapsed;
            if inner.did_render_this_hold {
                return Tick::wait(remaining);
            }
            inner.did_render_this_hold = true;
            let state = self.compute_state(&inner, &settings, now);
            record_draw(&mut inner, state, now);
            return Tick::draw_then_wait(remaining);
        }

        if elapsed >= inner.phase_duration {
            self.advance_phase(&mut inner, &settings, now);
            let state = self.compute_state(&inner, &settings, now);
            record_draw(&mut inner, state, now);
            let remaining = inner.phase_duration;
            return Tick::draw_then_wait(MAX_DRAW_INTERVAL_FAST.min(remaining));
        }

        let state = self.compute_state(&inner, &settings, now);
        let remaining = inner.phase_duration - elapsed;

        // Phase changes and the first draw after start() always win.
        if state.phase != inner.last_drawn_phase || inner.last_drawn_progress < 0.0 {
            if now - inner.last_draw_time < MAX_DRAW_INTERVAL_FAST {
                return Tick::wait(MAX_DRAW_INTERVAL_FAST.min(remaining));
            }
            record_draw(&mut inner, state, now);
            return Tick::draw_then_wait(MAX_DRAW_INTERVAL_FAST.min(remaining));
        }

        let delta = (state.progress - inner.last_drawn_progress).abs();
        if delta < MIN_PROGRESS_DELTA {
            let interval = cadence_interval(inner.fast_cadence);
            return Tick::wait(interval.min(remaining));
        }

        if inner.fast_cadence {
            if delta < EXIT_FAST_THRESHOLD {
                inner.fast_cadence = false;
            }
        } else if delta > ENTER_FAST_THRESHOLD {
            inner.fast_cadence = true;
        }

        let interval = cadence_interval(inner.fast_cadence);
        if now - inner.last_draw_time < interval {
            return Tick::wait(interval.min(remaining));
        }
        record_draw(&mut inner, state, now);
        Tick::draw_then_wait(interval.min(remaining))
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Reset phase machine and scheduler state for a fresh run starting
    /// at engine-clock time `now`.
    fn reset_at(&self, now: f64) {
        let settings = self.settings.snapshot();
        let mut inner = self.inner.lock().unwrap();
        inner.cycle_count = 0;
        inner.phase = BreathPhase::Inhale;
        inner.phase_start = now;
        inner.phase_duration = compute_phase_duration(&settings, BreathPhase::Inhale, 0);
        inner.did_render_this_hold = false;
        inner.last_draw_time = f64::NEG_INFINITY;
        inner.last_drawn_phase = BreathPhase::Inhale;
        inner.last_drawn_progress = -1.0;
        inner.fast_cadence = false;
        inner.paused_at = None;
    }

    fn advance_phase(&self, inner: &mut EngineInner, settings: &Settings, now: f64) {
        if inner.phase.ends_cycle() {
            inner.cycle_count += 1;
        }
        inner.phase = inner.phase.next();
        inner.phase_start = now;
        inner.phase_duration = compute_phase_duration(settings, inner.phase, inner.cycle_count);
        inner.did_render_this_hold = false;
        inner.fast_cadence = false;
        tracing::trace!(
            phase = %inner.phase,
            cycle = inner.cycle_count,
            duration = inner.phase_duration,
            "phase advanced"
        );
    }

    fn compute_state(&self, inner: &EngineInner, settings: &Settings, now: f64) -> BreathState {
        // While paused, time stands still at the freeze point.
        let now = match inner.paused_at {
            Some(paused_at) => now.min(paused_at),
            None => now,
        };

        let raw_t = if inner.phase_duration > 0.0 {
            ((now - inner.phase_start) / inner.phase_duration).clamp(0.0, 1.0)
        } else {
            1.0
        };
        let eased = self.easing.ease(raw_t, settings.animation_curve);

        match inner.phase {
            BreathPhase::Inhale => BreathState::new(inner.phase, eased as f32),
            BreathPhase::HoldAfterInhale => BreathState::new(inner.phase, 1.0),
            BreathPhase::Exhale => BreathState::new(inner.phase, (1.0 - eased) as f32),
            BreathPhase::HoldAfterExhale => BreathState::new(inner.phase, 0.0),
        }
    }

    fn spawn_pacer(&self) {
        self.stop_flag.store(false, Ordering::Relaxed);
        let engine = self.clone();
        let handle = thread::spawn(move || {
            tracing::trace!("pacer thread running");
            while !engine.stop_flag.load(Ordering::Relaxed) {
                let tick = engine.tick(engine.now());
                if tick.draw {
                    let callback = engine.draw_callback.read().unwrap().clone();
                    if let Some(callback) = callback {
                        callback();
                    }
                }
                engine.sleep_until(Instant::now() + tick.next_delay);
            }
        });
        *self.pacer.lock().unwrap() = Some(handle);
    }

    /// Sleep toward `deadline` in short slices so `stop()` stays
    /// responsive even across long recommended delays (idle backoff, a
    /// minute-long hold).
    fn sleep_until(&self, deadline: Instant) {
        const MAX_SLICE: Duration = Duration::from_millis(50);
        loop {
            if self.stop_flag.load(Ordering::Relaxed) {
                return;
            }
            let now = Instant::now();
            if now >= deadline {
                return;
            }
            thread::sleep((deadline - now).min(MAX_SLICE));
        }
    }
}

fn cadence_interval(fast: bool) -> f64 {
    if fast {
        MAX_DRAW_INTERVAL_FAST
    } else {
        MAX_DRAW_INTERVAL_SLOW
    }
}

fn record_draw(inner: &mut EngineInner, state: BreathState, now: f64) {
    inner.last_draw_time = now;
    inner.last_drawn_phase = state.phase;
    inner.last_drawn_progress = state.progress;
}

/// Duration for entering `phase` at `cycle_count` completed cycles:
/// `max(0.1, base × drift^cycle + uniform(−jitter, +jitter))`.
///
/// Degenerate settings (negative bases, NaN drift or jitter) are clamped
/// here rather than rejected; the result is always finite and at least
/// [`MIN_PHASE_DURATION`].
fn compute_phase_duration(settings: &Settings, phase: BreathPhase, cycle_count: u64) -> f64 {
    let base = settings.base_duration(phase);
    let drift = settings.drift.max(0.0);
    let mut duration = base * drift.powf(cycle_count as f64);

    let jitter = settings.jitter(phase);
    if jitter > 0.0 && jitter.is_finite() {
        duration += fastrand::f64() * 2.0 * jitter - jitter;
    }

    if !duration.is_finite() {
        return MIN_PHASE_DURATION;
    }
    duration.max(MIN_PHASE_DURATION)
}
