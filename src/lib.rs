//! Declarative Bayesian models over a runtime expression graph, sampled
//! with Metropolis-Hastings and NUTS.
//!
//! A model is built from `Param`/`Data`/`Constant` leaves and
//! distribution nodes (`Normal`, `Uniform`, `Bernoulli`, `Discrete`)
//! combined with `eq`/`seq` (or the `model!` macro) into a tree of
//! `target ~ dist` statements. `compile` walks that tree once, assigning
//! every bound parameter an arena offset and building the reverse-mode
//! AD tape the model will be replayed against on every sampling
//! iteration. `mh` and `nuts` both compile the model themselves and
//! return an `MCMCResult` with separate continuous/discrete sample
//! matrices.
//!
//! ```
//! use autoppl::{eq, mh, MHConfig, Normal, Param};
//!
//! let theta = Param::scalar();
//! let model = eq(theta, Normal::new(0.0, 1.0).unwrap());
//! let result = mh(model, MHConfig::default()).unwrap();
//! assert_eq!(result.n_cont_params(), 1);
//! ```

pub mod ad;
pub mod arena;
pub mod distribution;
pub mod error;
pub mod math;
pub mod mcmc;
pub mod model;
pub mod result;
pub mod rng;
pub mod variable;

pub use distribution::{Bernoulli, Discrete, DistExpr, Normal, Uniform};
pub use error::{ModelError, ModelResult, SamplerError, SamplerResult};
pub use mcmc::mh::{mh, MHConfig};
pub use mcmc::nuts::{nuts, NUTSConfig, StepConfig, VarConfig};
pub use model::{compile, eq, seq, CompiledModel, EqNode, GlueNode, ModelExpr};
pub use result::MCMCResult;
pub use variable::{Data, Expr, Param, Shape};

use std::rc::Rc;

use variable::IntoVarExpr;

/// Sugar for [`Normal::new`]: reads as a function call next to `uniform`,
/// `bernoulli`, `discrete` rather than mixing type-constructor and
/// function-call call sites in the same model definition.
pub fn normal(mean: impl IntoVarExpr, sd: impl IntoVarExpr) -> ModelResult<Rc<Normal>> {
    Normal::new(mean, sd)
}

/// Sugar for [`Uniform::new`].
pub fn uniform(lo: impl IntoVarExpr, hi: impl IntoVarExpr) -> ModelResult<Rc<Uniform>> {
    Uniform::new(lo, hi)
}

/// Sugar for [`Bernoulli::new`].
pub fn bernoulli(p: impl IntoVarExpr) -> ModelResult<Rc<Bernoulli>> {
    Bernoulli::new(p)
}

/// Sugar for [`Discrete::from_weights`].
pub fn discrete(weights: &[f64]) -> ModelResult<Rc<Discrete>> {
    Discrete::from_weights(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joint_chain_recovers_marginal_means_and_covariance() {
        // theta1 ~ Uniform(-1, 1); theta2 ~ Normal(theta1, 1).
        let theta1 = Param::scalar();
        let theta2 = Param::scalar();
        let model = model!(
            eq(theta1.clone(), uniform(-1.0, 1.0).unwrap()),
            eq(theta2.clone(), normal(theta1.clone().expr(), 1.0).unwrap())
        );
        let config = MHConfig {
            warmup: 2000,
            samples: 20000,
            seed: Some(1),
            ..Default::default()
        };
        let result = mh(model, config).unwrap();
        let c1 = result.cont_samples.column(0);
        let c2 = result.cont_samples.column(1);
        let mean1: f64 = c1.iter().sum::<f64>() / c1.len() as f64;
        let mean2: f64 = c2.iter().sum::<f64>() / c2.len() as f64;
        let cov: f64 = c1
            .iter()
            .zip(c2.iter())
            .map(|(a, b)| (a - mean1) * (b - mean2))
            .sum::<f64>()
            / c1.len() as f64;
        assert!(mean1.abs() < 0.1, "mean(theta1) = {mean1}");
        assert!(mean2.abs() < 0.1, "mean(theta2) = {mean2}");
        assert!(cov > 0.2 && cov < 0.45, "cov(theta1, theta2) = {cov}");
    }

    #[test]
    fn linear_regression_recovers_slope_and_intercept() {
        // w, b ~ Uniform(0, 2); y ~ Normal(w * x + b, 0.5).
        let w = Param::scalar();
        let b = Param::scalar();
        let xs = [0.0, 1.0, 2.0, 3.0, 4.0];
        let ys = [1.05, 2.02, 2.97, 4.01, 5.03];
        let mut stmts = seq(
            eq(w.clone(), uniform(0.0, 2.0).unwrap()),
            eq(b.clone(), uniform(0.0, 2.0).unwrap()),
        );
        for (&x, &y) in xs.iter().zip(ys.iter()) {
            let mean = w.clone().expr() * Expr::from(x) + b.clone().expr();
            let obs = Data::scalar(y);
            stmts = seq(stmts, eq(obs, normal(mean, 0.5).unwrap()));
        }
        let config = MHConfig {
            warmup: 3000,
            samples: 20000,
            seed: Some(2),
            ..Default::default()
        };
        let result = mh(stmts, config).unwrap();
        let w_col = result.cont_samples.column(0);
        let b_col = result.cont_samples.column(1);
        let w_mean: f64 = w_col.iter().sum::<f64>() / w_col.len() as f64;
        let b_mean: f64 = b_col.iter().sum::<f64>() / b_col.len() as f64;
        assert!(w_mean > 0.85 && w_mean < 1.15, "mean(w) = {w_mean}");
        assert!(b_mean > 0.85 && b_mean < 1.15, "mean(b) = {b_mean}");
    }

    #[test]
    fn free_function_sugar_matches_type_constructors() {
        assert!(normal(0.0, 1.0).is_ok());
        assert!(uniform(0.0, 1.0).is_ok());
        assert!(bernoulli(0.5).is_ok());
        assert!(discrete(&[0.2, 0.3, 0.5]).is_ok());
        assert!(uniform(1.0, 0.0).is_err());
    }
}
