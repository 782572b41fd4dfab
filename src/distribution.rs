//! Distribution expressions: `Normal`, `Uniform`, `Bernoulli`,
//! `Discrete`. Each owns its parameter expressions (themselves built from
//! [`crate::variable::VarExpr`] nodes) and knows how to evaluate and
//! differentiate its own log-density, broadcasting against whatever
//! `target` (a `Param` or `Data`) it is bound to on the left of `~`.

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use crate::ad::{Tape, TapeId};
use crate::arena::{Arena, TransformKind};
use crate::error::{ModelError, ModelResult};
use crate::math::{sigmoid, standard_normal};
use crate::rng::SamplerRng;
use crate::variable::{constant_value, broadcast_index, Constant, IntoVarExpr, VarExpr};
use rand::Rng;

fn broadcast(size: usize, i: usize) -> usize {
    broadcast_index(size, i)
}

/// Contract every distribution expression exposes to the model compiler and
/// the MH/NUTS samplers.
pub trait DistExpr: fmt::Debug {
    /// Sum of this distribution's log-density over every entry of `target`,
    /// broadcasting its own parameters against `target.size()`.
    fn log_pdf(&self, arena: &Arena, target: &dyn VarExpr) -> f64;

    /// Tape node for the same sum, for use inside a compiled model's tape.
    fn ad_log_pdf(&self, tape: &mut Tape, target: &dyn VarExpr) -> TapeId;

    /// The transform a `Param` bound by this distribution (as its own prior,
    /// i.e. this distribution is the right-hand side of that `Param`'s `~`)
    /// should receive. `Identity` unless the distribution constrains its
    /// support.
    fn default_transform(&self) -> ModelResult<TransformKind> {
        Ok(TransformKind::Identity)
    }

    /// Whether this distribution has discrete support. NUTS rejects any
    /// model containing a parameter with a discrete prior.
    fn is_discrete(&self) -> bool {
        false
    }

    /// Number of categories a discrete prior's target can take, for the MH
    /// discrete flip. `None` for continuous distributions.
    fn n_categories(&self) -> Option<usize> {
        None
    }

    /// Draws one sample at broadcast entry `i`, reading this distribution's
    /// own parameters' current values out of `arena`. Used by MH's
    /// prior-resampling initialization and by discrete-parameter proposals.
    fn sample_at(&self, arena: &Arena, i: usize, rng: &mut SamplerRng) -> f64;

    /// Every `VarExpr` this distribution reads its parameters from, so the
    /// compiler can detect "positive usage" sites (a `Param` passed as a
    /// `Normal`'s `sd` anywhere in the model gets a `Log` transform unless
    /// it has its own `Uniform` prior).
    fn parameter_exprs(&self) -> Vec<Rc<dyn VarExpr>>;

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
pub struct Normal {
    pub mean: Rc<dyn VarExpr>,
    pub sd: Rc<dyn VarExpr>,
}

impl Normal {
    pub fn new(mean: impl IntoVarExpr, sd: impl IntoVarExpr) -> ModelResult<Rc<Normal>> {
        let sd = sd.into_var_expr();
        if let Some(v) = constant_value(&sd) {
            if !(v > 0.0) {
                return Err(ModelError::InvalidDistribution(format!(
                    "Normal stddev must be positive, got {v}"
                )));
            }
        }
        Ok(Rc::new(Normal {
            mean: mean.into_var_expr(),
            sd,
        }))
    }

    fn log_pdf_scalar(x: f64, mean: f64, sd: f64) -> f64 {
        let z = (x - mean) / sd;
        -0.5 * z * z - sd.ln() - 0.5 * (2.0 * std::f64::consts::PI).ln()
    }

    /// Direct, arena-free evaluation for testing a single observation
    /// against this distribution's pdf/log_pdf equivalence, independent of
    /// any compiled model.
    pub fn log_pdf_value(&self, x: f64, mean: f64, sd: f64) -> f64 {
        let _ = (&self.mean, &self.sd);
        Normal::log_pdf_scalar(x, mean, sd)
    }

    pub fn pdf_value(&self, x: f64, mean: f64, sd: f64) -> f64 {
        Normal::log_pdf_scalar(x, mean, sd).exp()
    }
}

impl DistExpr for Normal {
    fn log_pdf(&self, arena: &Arena, target: &dyn VarExpr) -> f64 {
        let n = target.size();
        let (ms, ss) = (self.mean.size(), self.sd.size());
        (0..n)
            .map(|i| {
                let x = target.value_at(arena, i);
                let mean = self.mean.value_at(arena, broadcast(ms, i));
                let sd = self.sd.value_at(arena, broadcast(ss, i));
                Normal::log_pdf_scalar(x, mean, sd)
            })
            .sum()
    }

    fn ad_log_pdf(&self, tape: &mut Tape, target: &dyn VarExpr) -> TapeId {
        let n = target.size();
        let (ms, ss) = (self.mean.size(), self.sd.size());
        let terms: Vec<TapeId> = (0..n)
            .map(|i| {
                let x = target.ad_expr_at(tape, i);
                let mean = self.mean.ad_expr_at(tape, broadcast(ms, i));
                let sd = self.sd.ad_expr_at(tape, broadcast(ss, i));
                tape.normal_log_pdf(x, mean, sd)
            })
            .collect();
        tape.sum(&terms)
    }

    fn sample_at(&self, arena: &Arena, i: usize, rng: &mut SamplerRng) -> f64 {
        let ms = self.mean.size();
        let ss = self.sd.size();
        let mean = self.mean.value_at(arena, broadcast(ms, i));
        let sd = self.sd.value_at(arena, broadcast(ss, i));
        mean + sd * standard_normal(rng)
    }

    fn parameter_exprs(&self) -> Vec<Rc<dyn VarExpr>> {
        vec![self.mean.clone(), self.sd.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct Uniform {
    pub lo: Rc<dyn VarExpr>,
    pub hi: Rc<dyn VarExpr>,
}

impl Uniform {
    pub fn new(lo: impl IntoVarExpr, hi: impl IntoVarExpr) -> ModelResult<Rc<Uniform>> {
        let lo = lo.into_var_expr();
        let hi = hi.into_var_expr();
        if let (Some(l), Some(h)) = (constant_value(&lo), constant_value(&hi)) {
            if !(l.is_finite() && h.is_finite()) {
                return Err(ModelError::InvalidDistribution(
                    "Uniform bounds must be finite".to_string(),
                ));
            }
            if !(h > l) {
                return Err(ModelError::InvalidDistribution(format!(
                    "Uniform requires hi > lo, got lo={l}, hi={h}"
                )));
            }
        }
        Ok(Rc::new(Uniform { lo, hi }))
    }

    fn log_pdf_scalar(x: f64, lo: f64, hi: f64) -> f64 {
        if x <= lo || x >= hi {
            f64::NEG_INFINITY
        } else {
            -(hi - lo).ln()
        }
    }

    pub fn log_pdf_value(&self, x: f64, lo: f64, hi: f64) -> f64 {
        Uniform::log_pdf_scalar(x, lo, hi)
    }

    pub fn pdf_value(&self, x: f64, lo: f64, hi: f64) -> f64 {
        Uniform::log_pdf_scalar(x, lo, hi).exp()
    }

    /// The constant bounds this prior constrains its parameter to, used to
    /// build the parameter's `Logit` transform. `None` if either bound is
    /// not a compile-time constant (transform assignment only handles
    /// literal bounds).
    fn constant_bounds(&self) -> Option<(f64, f64)> {
        match (constant_value(&self.lo), constant_value(&self.hi)) {
            (Some(l), Some(h)) => Some((l, h)),
            _ => None,
        }
    }
}

impl DistExpr for Uniform {
    fn log_pdf(&self, arena: &Arena, target: &dyn VarExpr) -> f64 {
        let n = target.size();
        let (ls, hs) = (self.lo.size(), self.hi.size());
        (0..n)
            .map(|i| {
                let x = target.value_at(arena, i);
                let lo = self.lo.value_at(arena, broadcast(ls, i));
                let hi = self.hi.value_at(arena, broadcast(hs, i));
                Uniform::log_pdf_scalar(x, lo, hi)
            })
            .sum()
    }

    fn ad_log_pdf(&self, tape: &mut Tape, target: &dyn VarExpr) -> TapeId {
        let n = target.size();
        let (ls, hs) = (self.lo.size(), self.hi.size());
        let terms: Vec<TapeId> = (0..n)
            .map(|i| {
                let x = target.ad_expr_at(tape, i);
                let lo = self.lo.ad_expr_at(tape, broadcast(ls, i));
                let hi = self.hi.ad_expr_at(tape, broadcast(hs, i));
                tape.uniform_log_pdf(x, lo, hi)
            })
            .collect();
        tape.sum(&terms)
    }

    fn default_transform(&self) -> ModelResult<TransformKind> {
        match self.constant_bounds() {
            Some((lo, hi)) => Ok(TransformKind::Logit { lo, hi }),
            None => Err(ModelError::ModelDefinitionError(
                "a Param's Uniform prior must have constant bounds to derive its transform"
                    .to_string(),
            )),
        }
    }

    fn sample_at(&self, arena: &Arena, i: usize, rng: &mut SamplerRng) -> f64 {
        let ls = self.lo.size();
        let hs = self.hi.size();
        let lo = self.lo.value_at(arena, broadcast(ls, i));
        let hi = self.hi.value_at(arena, broadcast(hs, i));
        lo + (hi - lo) * rng.gen::<f64>()
    }

    fn parameter_exprs(&self) -> Vec<Rc<dyn VarExpr>> {
        vec![self.lo.clone(), self.hi.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug)]
pub struct Bernoulli {
    pub p: Rc<dyn VarExpr>,
}

impl Bernoulli {
    pub fn new(p: impl IntoVarExpr) -> ModelResult<Rc<Bernoulli>> {
        let p = p.into_var_expr();
        if let Some(v) = constant_value(&p) {
            if !(0.0..=1.0).contains(&v) {
                return Err(ModelError::InvalidDistribution(format!(
                    "Bernoulli p must lie in [0, 1], got {v}"
                )));
            }
        }
        Ok(Rc::new(Bernoulli { p }))
    }

    fn log_pdf_scalar(x: bool, p: f64) -> f64 {
        if x {
            p.ln()
        } else {
            (1.0 - p).ln()
        }
    }

    pub fn log_pdf_value(&self, x: bool, p: f64) -> f64 {
        Bernoulli::log_pdf_scalar(x, p)
    }

    pub fn pdf_value(&self, x: bool, p: f64) -> f64 {
        Bernoulli::log_pdf_scalar(x, p).exp()
    }
}

impl DistExpr for Bernoulli {
    fn log_pdf(&self, arena: &Arena, target: &dyn VarExpr) -> f64 {
        let n = target.size();
        let ps = self.p.size();
        (0..n)
            .map(|i| {
                let x = target.value_at(arena, i) != 0.0;
                let p = self.p.value_at(arena, broadcast(ps, i));
                Bernoulli::log_pdf_scalar(x, p)
            })
            .sum()
    }

    fn ad_log_pdf(&self, tape: &mut Tape, target: &dyn VarExpr) -> TapeId {
        let n = target.size();
        let ps = self.p.size();
        let terms: Vec<TapeId> = (0..n)
            .map(|i| {
                // The Bernoulli outcome is only ever bound data (NUTS
                // rejects discrete parameters), so reading its concrete
                // value here rather than threading it through the tape is
                // safe: see Discrete's analogous note.
                let x = target.value_at(&Arena::empty(), i) != 0.0;
                let p = self.p.ad_expr_at(tape, broadcast(ps, i));
                tape.bernoulli_log_pdf(x, p)
            })
            .collect();
        tape.sum(&terms)
    }

    fn is_discrete(&self) -> bool {
        true
    }

    fn n_categories(&self) -> Option<usize> {
        Some(2)
    }

    fn sample_at(&self, arena: &Arena, i: usize, rng: &mut SamplerRng) -> f64 {
        let ps = self.p.size();
        let p = self.p.value_at(arena, broadcast(ps, i));
        if rng.gen::<f64>() < p {
            1.0
        } else {
            0.0
        }
    }

    fn parameter_exprs(&self) -> Vec<Rc<dyn VarExpr>> {
        vec![self.p.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A categorical distribution over `probs.len()` categories, defined over
/// unnormalized weights: `pdf(k) = probs[k] / sum(probs)`.
#[derive(Debug)]
pub struct Discrete {
    pub probs: Vec<Rc<dyn VarExpr>>,
}

impl Discrete {
    pub fn new(probs: Vec<Rc<dyn VarExpr>>) -> ModelResult<Rc<Discrete>> {
        if probs.len() < 2 {
            return Err(ModelError::InvalidDistribution(
                "Discrete requires at least 2 categories".to_string(),
            ));
        }
        if probs.iter().any(|p| constant_value(p).is_some_and(|v| v <= 0.0)) {
            return Err(ModelError::InvalidDistribution(
                "Discrete category weights must be positive".to_string(),
            ));
        }
        Ok(Rc::new(Discrete { probs }))
    }

    pub fn from_weights(weights: &[f64]) -> ModelResult<Rc<Discrete>> {
        Discrete::new(weights.iter().map(|&w| Constant::new(w) as Rc<dyn VarExpr>).collect())
    }

    /// `log(probs[k]) - log(sum(probs))`: the weights need not be
    /// pre-normalized to sum to 1.
    fn log_pdf_scalar(&self, k: usize, arena: &Arena) -> f64 {
        let sum: f64 = self.probs.iter().map(|p| p.value_at(arena, 0)).sum();
        self.probs[k].value_at(arena, 0).ln() - sum.ln()
    }

    pub fn log_pdf_value(&self, k: usize, arena: &Arena) -> f64 {
        self.log_pdf_scalar(k, arena)
    }
}

impl DistExpr for Discrete {
    fn log_pdf(&self, arena: &Arena, target: &dyn VarExpr) -> f64 {
        (0..target.size())
            .map(|i| {
                let k = target.value_at(arena, i).round() as usize;
                self.log_pdf_scalar(k, arena)
            })
            .sum()
    }

    fn ad_log_pdf(&self, tape: &mut Tape, target: &dyn VarExpr) -> TapeId {
        // The category index must be a concrete integer baked into the
        // tape at build time. This is only reachable for bound `Data`,
        // since the model compiler rejects any `Param` with a `Discrete`
        // or `Bernoulli` prior before a tape is ever built for NUTS.
        let arena = Arena::empty();
        let terms: Vec<TapeId> = (0..target.size())
            .map(|i| {
                let k = target.value_at(&arena, i).round() as usize;
                let probs: Vec<TapeId> = self.probs.iter().map(|p| p.ad_expr_at(tape, 0)).collect();
                tape.discrete_log_pdf(k, probs)
            })
            .collect();
        tape.sum(&terms)
    }

    fn is_discrete(&self) -> bool {
        true
    }

    fn n_categories(&self) -> Option<usize> {
        Some(self.probs.len())
    }

    fn sample_at(&self, arena: &Arena, _i: usize, rng: &mut SamplerRng) -> f64 {
        let weights: Vec<f64> = self.probs.iter().map(|p| p.value_at(arena, 0)).collect();
        let total: f64 = weights.iter().sum();
        let mut u = rng.gen::<f64>() * total;
        for (k, w) in weights.iter().enumerate() {
            if u < *w {
                return k as f64;
            }
            u -= w;
        }
        (weights.len() - 1) as f64
    }

    fn parameter_exprs(&self) -> Vec<Rc<dyn VarExpr>> {
        self.probs.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Detects whether `expr` is used as a `Normal`'s `sd` anywhere among
/// `dists`, the "positive usage" rule that assigns an unbound `Param` a
/// `Log` transform.
pub fn used_as_positive_scale(expr: &Rc<dyn VarExpr>, dists: &[Rc<dyn DistExpr>]) -> bool {
    dists.iter().any(|d| {
        if let Some(normal) = d.as_any().downcast_ref::<Normal>() {
            Rc::ptr_eq(&normal.sd, expr)
        } else {
            false
        }
    })
}

#[allow(dead_code)]
fn _sigmoid_is_used(u: f64) -> f64 {
    sigmoid(u)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn normal_pdf_matches_log_pdf_exp() {
        let n = Normal::new(0.0, 1.0).unwrap();
        let lp = n.log_pdf_value(0.0, 0.0, 1.0);
        assert_relative_eq!(n.pdf_value(0.0, 0.0, 1.0), lp.exp(), epsilon = 1e-12);
    }

    #[test]
    fn normal_log_pdf_known_value() {
        // N(3; mean=0, sd=1), cross-checked against a reference implementation.
        let n = Normal::new(0.0, 1.0).unwrap();
        let lp = n.log_pdf_value(3.0, 0.0, 1.0);
        assert_relative_eq!(lp, -5.418938533204673, epsilon = 1e-9);
    }

    #[test]
    fn normal_rejects_nonpositive_sd() {
        assert!(Normal::new(0.0, 0.0).is_err());
        assert!(Normal::new(0.0, -1.0).is_err());
    }

    #[test]
    fn uniform_log_pdf_is_uniform_density_inside_support_and_neg_inf_outside() {
        let u = Uniform::new(0.0, 2.0).unwrap();
        assert_relative_eq!(u.log_pdf_value(1.0, 0.0, 2.0), (0.5_f64).ln(), epsilon = 1e-12);
        assert_eq!(u.log_pdf_value(3.0, 0.0, 2.0), f64::NEG_INFINITY);
    }

    #[test]
    fn uniform_rejects_non_finite_or_backwards_bounds() {
        assert!(Uniform::new(f64::NEG_INFINITY, 1.0).is_err());
        assert!(Uniform::new(1.0, 0.0).is_err());
    }

    #[test]
    fn uniform_default_transform_is_logit_with_its_bounds() {
        let u = Uniform::new(-2.0, 2.0).unwrap();
        match u.default_transform().unwrap() {
            TransformKind::Logit { lo, hi } => {
                assert_eq!(lo, -2.0);
                assert_eq!(hi, 2.0);
            }
            other => panic!("expected Logit, got {other:?}"),
        }
    }

    #[test]
    fn bernoulli_log_pdf_matches_definition() {
        let b = Bernoulli::new(0.3).unwrap();
        assert_relative_eq!(b.log_pdf_value(true, 0.3), 0.3_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(b.log_pdf_value(false, 0.3), 0.7_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn discrete_accepts_unnormalized_weights_and_rejects_nonpositive() {
        assert!(Discrete::from_weights(&[0.5, 0.5]).is_ok());
        assert!(Discrete::from_weights(&[1.0, 3.0]).is_ok());
        assert!(Discrete::from_weights(&[1.0, 0.0]).is_err());
        assert!(Discrete::from_weights(&[1.0, -1.0]).is_err());
    }

    #[test]
    fn discrete_log_pdf_normalizes_unnormalized_weights() {
        let d = Discrete::from_weights(&[1.0, 3.0]).unwrap();
        let arena = Arena::empty();
        assert_relative_eq!(d.log_pdf_value(0, &arena), 1.0_f64.ln() - 4.0_f64.ln(), epsilon = 1e-12);
        assert_relative_eq!(d.log_pdf_value(1, &arena), 3.0_f64.ln() - 4.0_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn uniform_pdf_is_zero_at_and_beyond_boundaries() {
        let u = Uniform::new(0.0, 1.0).unwrap();
        assert_eq!(u.pdf_value(1.0, 0.0, 1.0), 0.0);
        assert_eq!(u.pdf_value(0.0, 0.0, 1.0), 0.0);
        assert_eq!(u.pdf_value(1.5, 0.0, 1.0), 0.0);
    }
}
