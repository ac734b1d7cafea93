//! Cubic-Bézier easing lookup table.
//!
//! Converts a linear elapsed-time fraction into a perceptually smooth
//! progress fraction. The curve is parametrized by `t` rather than by
//! `x`, so each table entry inverts `x(t) = target` with a bounded
//! Newton–Raphson search and stores `y` at the solution. The table is
//! built once at engine construction; lookups are a clamp, an index, and
//! a linear interpolation.

use respira_core::AnimationCurve;

/// Samples in the default table.
const DEFAULT_SAMPLE_COUNT: usize = 1024;

/// Newton–Raphson bounds. Eight iterations are enough for standard
/// ease-in-out control points; the residual tolerance also guards the
/// derivative against near-zero division at the curve's ends.
const MAX_SOLVER_ITERATIONS: usize = 8;
const SOLVER_EPSILON: f64 = 1e-6;

/// Immutable, monotonically non-decreasing easing samples in `[0, 1]`.
#[derive(Clone, Debug)]
pub struct EasingTable {
    samples: Vec<f32>,
}

impl EasingTable {
    /// The standard CSS `ease-in-out` curve (0.42, 0.0, 0.58, 1.0) at the
    /// default resolution.
    pub fn ease_in_out() -> Self {
        Self::build(DEFAULT_SAMPLE_COUNT, 0.42, 0.0, 0.58, 1.0)
    }

    /// Build a table of `sample_count` entries for the cubic Bézier with
    /// control parameters `(x1, y1, x2, y2)`.
    ///
    /// A one-time O(N × 8) computation. The solver is unconditionally
    /// convergent for standard ease-in-out control points, so no error is
    /// signalled; pathological inputs degrade smoothness, nothing more.
    pub fn build(sample_count: usize, x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let sample_count = sample_count.max(2);
        let mut samples = Vec::with_capacity(sample_count);
        for i in 0..sample_count {
            let target = i as f64 / (sample_count - 1) as f64;
            samples.push(solve_curve(target, x1, y1, x2, y2) as f32);
        }
        Self { samples }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Map a linear fraction in `[0, 1]` to an eased fraction.
    ///
    /// `Linear` bypasses the table entirely. Otherwise the fraction is
    /// mapped to a fractional index and the two bracketing samples are
    /// linearly interpolated.
    pub fn ease(&self, raw_t: f64, curve: AnimationCurve) -> f64 {
        if curve == AnimationCurve::Linear {
            return raw_t;
        }

        let index = raw_t.clamp(0.0, 1.0) * (self.samples.len() - 1) as f64;
        let lower = (index as usize).min(self.samples.len() - 2);
        let fraction = (index - lower as f64) as f32;

        let a = self.samples[lower];
        let b = self.samples[lower + 1];
        f64::from(a + (b - a) * fraction)
    }
}

/// Solve `x(t) = target` for `t`, then evaluate `y` at the solution.
fn solve_curve(target: f64, x1: f64, y1: f64, x2: f64, y2: f64) -> f64 {
    let mut t = target;
    for _ in 0..MAX_SOLVER_ITERATIONS {
        let residual = cubic(t, x1, x2) - target;
        if residual.abs() < SOLVER_EPSILON {
            break;
        }
        let derivative = cubic_derivative(t, x1, x2);
        if derivative.abs() < SOLVER_EPSILON {
            break;
        }
        t = (t - residual / derivative).clamp(0.0, 1.0);
    }
    cubic(t, y1, y2)
}

/// One-dimensional cubic Bézier through (0, a1, a2, 1).
fn cubic(t: f64, a1: f64, a2: f64) -> f64 {
    let c = 3.0 * a1;
    let b = 3.0 * (a2 - a1) - c;
    let a = 1.0 - c - b;
    ((a * t + b) * t + c) * t
}

fn cubic_derivative(t: f64, a1: f64, a2: f64) -> f64 {
    let c = 3.0 * a1;
    let b = 3.0 * (a2 - a1) - c;
    let a = 1.0 - c - b;
    (3.0 * a * t + 2.0 * b) * t + c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_endpoints() {
        let table = EasingTable::ease_in_out();
        let first = f64::from(table.samples[0]);
        let last = f64::from(table.samples[table.len() - 1]);
        assert!(first.abs() < 1e-3, "T[0] = {first}");
        assert!((last - 1.0).abs() < 1e-3, "T[N-1] = {last}");
    }

    #[test]
    fn test_table_is_non_decreasing() {
        let table = EasingTable::ease_in_out();
        for pair in table.samples.windows(2) {
            assert!(pair[1] >= pair[0], "samples decreased: {pair:?}");
        }
    }

    #[test]
    fn test_linear_mode_bypasses_table() {
        let table = EasingTable::ease_in_out();
        for raw_t in [0.0, 0.125, 0.5, 0.9, 1.0] {
            assert_eq!(table.ease(raw_t, AnimationCurve::Linear), raw_t);
        }
    }

    #[test]
    fn test_ease_in_out_is_symmetric_about_midpoint() {
        let table = EasingTable::ease_in_out();
        let mid = table.ease(0.5, AnimationCurve::Sinusoidal);
        assert!((mid - 0.5).abs() < 1e-2, "ease(0.5) = {mid}");

        for raw_t in [0.1, 0.25, 0.4] {
            let lo = table.ease(raw_t, AnimationCurve::Sinusoidal);
            let hi = table.ease(1.0 - raw_t, AnimationCurve::Sinusoidal);
            assert!((lo + hi - 1.0).abs() < 1e-2, "asymmetric at {raw_t}");
        }
    }

    #[test]
    fn test_ease_clamps_out_of_range_input() {
        let table = EasingTable::ease_in_out();
        assert_eq!(table.ease(-0.5, AnimationCurve::Sinusoidal), f64::from(table.samples[0]));
        let end = table.ease(1.5, AnimationCurve::Sinusoidal);
        assert!((end - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_ease_is_monotonic_in_input() {
        let table = EasingTable::ease_in_out();
        let mut previous = 0.0;
        for i in 0..=200 {
            let eased = table.ease(i as f64 / 200.0, AnimationCurve::Sinusoidal);
            assert!(eased + 1e-6 >= previous, "regressed at step {i}");
            previous = eased;
        }
    }

    #[test]
    fn test_tiny_table_still_valid() {
        let table = EasingTable::build(1, 0.42, 0.0, 0.58, 1.0);
        assert_eq!(table.len(), 2);
        assert!(table.ease(0.5, AnimationCurve::Sinusoidal).is_finite());
    }
}
