//! Small free-standing numeric helpers shared by the density kernels and the
//! NUTS tree builder. Kept separate and unit-tested individually rather than
//! inlined, since both the divergence check and the subtree-reweighting step
//! need the exact same definitions.

/// `sigmoid(u) = 1 / (1 + exp(-u))`, the logistic function used by the
/// logit-scale parameter transform.
#[inline]
pub fn sigmoid(u: f64) -> f64 {
    1.0 / (1.0 + (-u).exp())
}

/// `logit(p) = ln(p / (1 - p))`, the inverse of [`sigmoid`].
#[inline]
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Numerically stable `ln(e^x + e^y)`.
#[inline]
pub fn log_sum_exp(x: f64, y: f64) -> f64 {
    if x == f64::NEG_INFINITY && y == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    let m = x.max(y);
    m + ((x - m).exp() + (y - m).exp()).ln()
}

/// `H(theta, r) = potential(theta) + kinetic(r)`. Trivial, but named and
/// tested on its own because both the NUTS divergence check and the
/// multinomial reweighting of trajectory states need exactly this quantity.
#[inline]
pub fn hamiltonian(potential: f64, kinetic: f64) -> f64 {
    potential + kinetic
}

/// Draws one standard-normal variate via the Box-Muller transform, consuming
/// exactly two `f64` draws from `rng`. Used instead of a `rand_distr`
/// dependency so the exact sequence of RNG calls driving reproducibility is
/// visible and stable in this crate's own source.
pub fn standard_normal<R: rand::Rng + ?Sized>(rng: &mut R) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn sigmoid_and_logit_are_inverses() {
        for u in [-5.0, -1.0, 0.0, 0.3, 2.7] {
            let p = sigmoid(u);
            assert_relative_eq!(logit(p), u, epsilon = 1e-10);
        }
    }

    #[test]
    fn log_sum_exp_matches_naive_for_moderate_inputs() {
        let x = -2.0;
        let y = -3.0;
        let naive = (x.exp() + y.exp()).ln();
        assert_relative_eq!(log_sum_exp(x, y), naive, epsilon = 1e-12);
    }

    #[test]
    fn log_sum_exp_avoids_overflow() {
        let got = log_sum_exp(-1000.0, -1000.5);
        assert!(got.is_finite());
    }

    #[test]
    fn log_sum_exp_neg_infinity_identity() {
        assert_eq!(log_sum_exp(f64::NEG_INFINITY, f64::NEG_INFINITY), f64::NEG_INFINITY);
        assert_relative_eq!(log_sum_exp(f64::NEG_INFINITY, 0.0), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn hamiltonian_is_the_sum() {
        assert_eq!(hamiltonian(1.5, 2.5), 4.0);
    }

    #[test]
    fn standard_normal_is_roughly_standard_over_many_draws() {
        use crate::rng::SamplerRng;
        let mut rng = SamplerRng::seed_from_u64(123);
        let n = 20_000;
        let draws: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();
        let mean: f64 = draws.iter().sum::<f64>() / n as f64;
        let var: f64 = draws.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.05, "mean = {mean}");
        assert!((var - 1.0).abs() < 0.1, "var = {var}");
    }
}
