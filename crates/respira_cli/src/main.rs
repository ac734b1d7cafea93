//! Terminal demonstrator for the Respira cadence engine.
//!
//! Runs the engine with the given pacing and renders every draw request
//! as a text gauge on one line. The gauge redraws exactly when the
//! engine's adaptive scheduler asks for a redraw, so watching the update
//! rate is also watching the scheduler work: fast during mid-phase
//! motion, slow near the eased ends, a single update per hold.

use std::io::{self, Write};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use respira_core::{AnimationCurve, Settings, SharedSettings};
use respira_engine::CadenceEngine;

const GAUGE_WIDTH: usize = 40;

#[derive(Parser, Debug)]
#[command(name = "respira", version, about = "Breathing pacer cadence engine demonstrator")]
struct Args {
    /// Inhale duration in seconds
    #[arg(long, default_value_t = 5.0)]
    inhale: f64,

    /// Hold after inhale, in seconds
    #[arg(long = "hold-in", default_value_t = 0.0)]
    hold_in: f64,

    /// Exhale duration in seconds
    #[arg(long, default_value_t = 10.0)]
    exhale: f64,

    /// Hold after exhale, in seconds
    #[arg(long = "hold-out", default_value_t = 0.0)]
    hold_out: f64,

    /// Per-cycle duration multiplier
    #[arg(long, default_value_t = 1.0)]
    drift: f64,

    /// Jitter half-width applied to every phase, in seconds
    #[arg(long, default_value_t = 0.0)]
    jitter: f64,

    /// Use linear progress instead of the eased curve
    #[arg(long)]
    linear: bool,

    /// How long to run before exiting, in seconds
    #[arg(long, default_value_t = 30.0)]
    seconds: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    tracing::debug!(?args, "starting demonstrator");

    let settings = SharedSettings::new(Settings {
        inhale_duration: args.inhale,
        post_inhale_hold_duration: args.hold_in,
        exhale_duration: args.exhale,
        post_exhale_hold_duration: args.hold_out,
        drift: args.drift,
        randomized_timing_inhale: args.jitter,
        randomized_timing_post_inhale_hold: args.jitter,
        randomized_timing_exhale: args.jitter,
        randomized_timing_post_exhale_hold: args.jitter,
        animation_curve: if args.linear {
            AnimationCurve::Linear
        } else {
            AnimationCurve::Sinusoidal
        },
        is_animating: true,
        ..Settings::default()
    });

    let engine = CadenceEngine::new(settings);
    let reader = engine.clone();
    engine.on_draw_requested(move || {
        let state = reader.current_state();
        let filled = (f64::from(state.progress.clamp(0.0, 1.0)) * GAUGE_WIDTH as f64).round() as usize;
        let mut out = io::stdout().lock();
        let _ = write!(
            out,
            "\r[{:<width$}] {:<18} cycle {}",
            "#".repeat(filled),
            state.phase.to_string(),
            reader.cycle_count(),
            width = GAUGE_WIDTH,
        );
        let _ = out.flush();
    });

    engine.start();
    thread::sleep(Duration::from_secs_f64(args.seconds.max(0.0)));
    engine.stop();
    println!();

    Ok(())
}
