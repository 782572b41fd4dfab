//! Sampler output (section 3's `MCMCResult`, section 6's external interface).
//!
//! Continuous and discrete parameters are reported as two separate
//! column-major matrices, as section 6 specifies (`result.cont_samples`,
//! `result.disc_samples`), rather than one combined matrix: a discrete
//! category index and a continuous unconstrained-scale value have no shared
//! unit, and `nuts` never populates `disc_samples` at all (section 4.5).

use std::time::Duration;

use ndarray::Array2;
use serde::Serialize;

/// The full output of one `mh`/`nuts` run.
#[derive(Debug, Clone, Serialize)]
pub struct MCMCResult {
    /// Which sampler produced this result (`"mh"` or `"nuts"`).
    pub name: String,
    /// `n_samples x n_cont_params`, constrained-scale values, column-major.
    pub cont_samples: Array2<f64>,
    /// `n_samples x n_disc_params`, category indices, column-major. Always
    /// zero columns for `nuts`.
    pub disc_samples: Array2<f64>,
    /// Log joint density at each retained iteration.
    pub log_joint: Vec<f64>,
    /// `nuts`-only: whether each iteration's trajectory diverged. Always
    /// all-`false` for `mh`.
    pub divergences: Vec<bool>,
    /// `nuts`-only: the tree depth reached at each iteration. Always all-`0`
    /// for `mh`.
    pub tree_depths: Vec<usize>,
    /// Whether each iteration's proposal was accepted (`mh`) or the
    /// trajectory produced a genuinely new sample (`nuts`, effectively
    /// always `true` outside of numerical divergence).
    pub accepted: Vec<bool>,
    pub warmup_time: Duration,
    pub sampling_time: Duration,
}

impl MCMCResult {
    /// Builds a result from two flat, column-major sample buffers
    /// (`n_iter * n_cont`/`n_iter * n_disc` entries, one full iteration's
    /// values contiguous per column).
    #[allow(clippy::too_many_arguments)]
    pub fn from_flat(
        name: &str,
        n_iter: usize,
        n_cont: usize,
        cont_flat: Vec<f64>,
        n_disc: usize,
        disc_flat: Vec<f64>,
        log_joint: Vec<f64>,
        divergences: Vec<bool>,
        tree_depths: Vec<usize>,
        accepted: Vec<bool>,
        warmup_time: Duration,
        sampling_time: Duration,
    ) -> Self {
        let cont_samples = Array2::from_shape_vec((n_iter, n_cont).f(), cont_flat)
            .expect("continuous sample buffer length must equal n_iter * n_cont");
        let disc_samples = Array2::from_shape_vec((n_iter, n_disc).f(), disc_flat)
            .expect("discrete sample buffer length must equal n_iter * n_disc");
        MCMCResult {
            name: name.to_string(),
            cont_samples,
            disc_samples,
            log_joint,
            divergences,
            tree_depths,
            accepted,
            warmup_time,
            sampling_time,
        }
    }

    pub fn n_iterations(&self) -> usize {
        self.cont_samples.nrows()
    }

    pub fn n_cont_params(&self) -> usize {
        self.cont_samples.ncols()
    }

    pub fn n_disc_params(&self) -> usize {
        self.disc_samples.ncols()
    }

    /// Fraction of iterations whose proposal was accepted — the diagnostic
    /// both `mh` and `nuts` report for step-size/proposal-scale tuning.
    pub fn acceptance_rate(&self) -> f64 {
        if self.accepted.is_empty() {
            return 0.0;
        }
        self.accepted.iter().filter(|&&a| a).count() as f64 / self.accepted.len() as f64
    }

    /// Fraction of iterations that diverged (`nuts` only).
    pub fn divergence_rate(&self) -> f64 {
        if self.divergences.is_empty() {
            return 0.0;
        }
        self.divergences.iter().filter(|&&d| d).count() as f64 / self.divergences.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_flat_is_column_major_and_splits_cont_from_disc() {
        // two continuous dims, one discrete dim, three iterations.
        let cont_flat = vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        let disc_flat = vec![0.0, 1.0, 0.0];
        let result = MCMCResult::from_flat(
            "mh",
            3,
            2,
            cont_flat,
            1,
            disc_flat,
            vec![0.0; 3],
            vec![false; 3],
            vec![0; 3],
            vec![true; 3],
            Duration::from_millis(1),
            Duration::from_millis(2),
        );
        assert_eq!(result.name, "mh");
        assert_eq!(result.cont_samples[[0, 0]], 1.0);
        assert_eq!(result.cont_samples[[2, 0]], 3.0);
        assert_eq!(result.cont_samples[[0, 1]], 10.0);
        assert_eq!(result.cont_samples[[2, 1]], 30.0);
        assert_eq!(result.disc_samples[[1, 0]], 1.0);
        assert_eq!(result.n_cont_params(), 2);
        assert_eq!(result.n_disc_params(), 1);
    }

    #[test]
    fn acceptance_and_divergence_rates() {
        let result = MCMCResult::from_flat(
            "nuts",
            4,
            1,
            vec![0.0; 4],
            0,
            vec![],
            vec![0.0; 4],
            vec![false, true, false, false],
            vec![0; 4],
            vec![true, false, true, true],
            Duration::default(),
            Duration::default(),
        );
        assert_eq!(result.acceptance_rate(), 0.75);
        assert_eq!(result.divergence_rate(), 0.25);
    }
}
