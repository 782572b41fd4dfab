//! Contiguous value/adjoint storage addressed by offsets.
//!
//! All mutable per-iteration sampler state lives here as flat `Vec<f64>`s.
//! Variable nodes never own storage; they hold an [`OffsetPack`] into an
//! `Arena` they do not own.

use crate::math::sigmoid;

/// Offsets a compiled parameter carries into the various arena sub-arrays.
///
/// Mirrors the four-field `OffsetPack` of the original C++ source
/// (`uc_offset`, `c_offset`, `v_offset`, `tp_offset`), with `c_offset`
/// repurposed here to index the separate discrete-parameter arena (section
/// 4.1, step 2) rather than a second continuous "constrained" array, since
/// this port keeps constrained values in `tp_offset` instead. See DESIGN.md.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OffsetPack {
    /// Slot in the continuous unconstrained arena (`Arena::values`/`adjoints`).
    pub uc_offset: Option<usize>,
    /// Slot in the discrete-parameter arena.
    pub c_offset: Option<usize>,
    /// Slot in the per-iteration visited-flags array; shares indexing with
    /// whichever of `uc_offset`/`c_offset` is set.
    pub v_offset: Option<usize>,
    /// Slot in the transformed (constrained-value cache) arena; present only
    /// for parameters with a non-identity transform.
    pub tp_offset: Option<usize>,
}

/// Per-parameter unconstrained <-> constrained mapping.
///
/// - `Identity`: the arena value *is* the constrained value.
/// - `Logit{lo,hi}`: for a `Uniform(lo,hi)` prior; `x = lo + (hi-lo)*sigmoid(u)`.
/// - `Log`: for a positive-scale parameter (the "positivity from stddev"
///   rule); `x = exp(u)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformKind {
    Identity,
    Logit { lo: f64, hi: f64 },
    Log,
}

impl TransformKind {
    /// Maps an unconstrained value to its constrained counterpart.
    pub fn constrain(&self, u: f64) -> f64 {
        match *self {
            TransformKind::Identity => u,
            TransformKind::Logit { lo, hi } => lo + (hi - lo) * sigmoid(u),
            TransformKind::Log => u.exp(),
        }
    }

    /// Maps a constrained value back to the unconstrained scale. Used only
    /// at initialization, when a fresh value is drawn from the prior on the
    /// constrained scale and must be seeded into the arena.
    pub fn unconstrain(&self, x: f64) -> f64 {
        match *self {
            TransformKind::Identity => x,
            TransformKind::Logit { lo, hi } => crate::math::logit((x - lo) / (hi - lo)),
            TransformKind::Log => x.ln(),
        }
    }

    /// `log |dx/du|`, the Jacobian correction added to the log-joint
    /// whenever the unconstrained scale is in use.
    pub fn log_jacobian(&self, u: f64) -> f64 {
        match *self {
            TransformKind::Identity => 0.0,
            TransformKind::Logit { lo, hi } => {
                let s = sigmoid(u);
                (hi - lo).ln() + s.ln() + (1.0 - s).ln()
            }
            TransformKind::Log => u,
        }
    }
}

/// Flat storage for one sampler invocation's continuous parameter state.
///
/// `values`/`adjoints` are sized to the total unconstrained parameter count;
/// `transformed` caches constrained values for parameters with a
/// non-identity transform, sized to the transformed-parameter count;
/// `visited` is reset before each log-density traversal and used (in debug
/// builds) to catch a parameter being read before it was written this pass.
#[derive(Debug, Clone)]
pub struct Arena {
    pub values: Vec<f64>,
    pub adjoints: Vec<f64>,
    pub transformed: Vec<f64>,
    pub visited: Vec<bool>,
}

impl Arena {
    pub fn new(n_unconstrained: usize, n_transformed: usize) -> Self {
        Arena {
            values: vec![0.0; n_unconstrained],
            adjoints: vec![0.0; n_unconstrained],
            transformed: vec![0.0; n_transformed],
            visited: vec![false; n_unconstrained],
        }
    }

    /// Zero-sized arena used by distributions' direct `pdf`/`log_pdf`
    /// convenience methods, which never touch parameter storage.
    pub fn empty() -> Self {
        Arena::new(0, 0)
    }

    pub fn zero_adjoints(&mut self) {
        self.adjoints.iter_mut().for_each(|a| *a = 0.0);
    }

    pub fn reset_visits(&mut self) {
        self.visited.iter_mut().for_each(|v| *v = false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_transform_is_a_no_op() {
        let t = TransformKind::Identity;
        assert_eq!(t.constrain(3.5), 3.5);
        assert_eq!(t.unconstrain(3.5), 3.5);
        assert_eq!(t.log_jacobian(3.5), 0.0);
    }

    #[test]
    fn logit_transform_round_trips() {
        let t = TransformKind::Logit { lo: -1.0, hi: 1.0 };
        for x in [-0.9, -0.1, 0.0, 0.4, 0.99] {
            let u = t.unconstrain(x);
            let back = t.constrain(u);
            assert_relative_eq!(back, x, epsilon = 1e-12);
        }
    }

    #[test]
    fn log_transform_round_trips() {
        let t = TransformKind::Log;
        for x in [0.01, 0.5, 1.0, 10.0] {
            let u = t.unconstrain(x);
            assert_relative_eq!(t.constrain(u), x, epsilon = 1e-12);
        }
    }

    #[test]
    fn arena_zero_adjoints_clears_only_adjoints() {
        let mut arena = Arena::new(2, 1);
        arena.values[0] = 1.0;
        arena.adjoints[0] = 9.0;
        arena.zero_adjoints();
        assert_eq!(arena.adjoints, vec![0.0, 0.0]);
        assert_eq!(arena.values[0], 1.0);
    }
}
