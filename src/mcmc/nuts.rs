//! No-U-Turn Sampler: leapfrog integration, recursive tree-doubling with
//! no-U-turn and divergence termination, multinomial trajectory sampling,
//! dual-averaging step-size adaptation, and Welford diagonal mass-matrix
//! adaptation over a windowed warmup schedule.
//!
//! The recursive tree build and dual-averaging update follow the Hoffman &
//! Gelman NUTS paper's Algorithm 3/6.

use std::rc::Rc;
use std::time::Instant;

use log::{debug, warn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::arena::Arena;
use crate::error::{ModelError, SamplerError, SamplerResult};
use crate::math::{hamiltonian, log_sum_exp, standard_normal};
use crate::mcmc::{constrained_values, init_arena, param_dims, DEFAULT_INIT_ATTEMPTS};
use crate::model::{compile, CompiledModel, ModelExpr};
use crate::result::MCMCResult;
use crate::rng::{default_seed, SamplerRng};

/// Dual-averaging step-size adaptation parameters (section 4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StepConfig {
    pub delta: f64,
    pub gamma: f64,
    pub kappa: f64,
    pub t0: f64,
}

impl Default for StepConfig {
    fn default() -> Self {
        StepConfig {
            delta: 0.8,
            gamma: 0.05,
            kappa: 0.75,
            t0: 10.0,
        }
    }
}

/// Welford mass-matrix adaptation window schedule (section 4.5).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct VarConfig {
    pub init_buffer: usize,
    pub term_buffer: usize,
    pub window: usize,
}

impl Default for VarConfig {
    fn default() -> Self {
        VarConfig {
            init_buffer: 75,
            term_buffer: 50,
            window: 25,
        }
    }
}

/// Configuration for [`nuts`] (section 6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NUTSConfig {
    pub warmup: usize,
    pub n_samples: usize,
    pub seed: Option<u64>,
    pub max_depth: usize,
    pub step_config: StepConfig,
    pub var_config: VarConfig,
}

impl Default for NUTSConfig {
    fn default() -> Self {
        NUTSConfig {
            warmup: 1000,
            n_samples: 1000,
            seed: None,
            max_depth: 10,
            step_config: StepConfig::default(),
            var_config: VarConfig::default(),
        }
    }
}

/// Hamiltonian error beyond which a leapfrog trajectory is divergent
/// (section 4.5).
const DIVERGENCE_THRESHOLD: f64 = 1000.0;

/// One point on a leapfrog trajectory: position, momentum, and the gradient
/// of the log joint density at that position (cached so the next leapfrog
/// half-step doesn't re-evaluate it).
#[derive(Debug, Clone)]
struct LeapState {
    theta: Vec<f64>,
    r: Vec<f64>,
    grad: Vec<f64>,
    log_pi: f64,
}

/// Forward-evaluates `compiled`'s tape at `theta`, returning the log joint
/// density and its gradient. `scratch` is reused across calls; its values
/// are fully overwritten before every read.
fn eval(compiled: &CompiledModel, scratch: &mut Arena, theta: &[f64]) -> (f64, Vec<f64>) {
    scratch.values.copy_from_slice(theta);
    scratch.zero_adjoints();
    let log_pi = compiled.grad_log_joint(scratch);
    (log_pi, scratch.adjoints.clone())
}

fn kinetic(r: &[f64], inv_mass: &[f64]) -> f64 {
    0.5 * r.iter().zip(inv_mass).map(|(ri, im)| ri * ri * im).sum::<f64>()
}

fn sample_momentum(inv_mass: &[f64], rng: &mut SamplerRng) -> Vec<f64> {
    inv_mass
        .iter()
        .map(|&im| (1.0 / im).sqrt() * standard_normal(rng))
        .collect()
}

/// One leapfrog step from `state`, signed by `direction` (`+1`/`-1`),
/// section 4.5's "Leapfrog step".
fn leapfrog(
    compiled: &CompiledModel,
    scratch: &mut Arena,
    state: &LeapState,
    eps: f64,
    inv_mass: &[f64],
    direction: i8,
) -> LeapState {
    let signed_eps = direction as f64 * eps;
    let dim = state.theta.len();

    let mut r_half = vec![0.0; dim];
    for i in 0..dim {
        r_half[i] = state.r[i] + 0.5 * signed_eps * state.grad[i];
    }

    let mut theta_new = vec![0.0; dim];
    for i in 0..dim {
        theta_new[i] = state.theta[i] + signed_eps * inv_mass[i] * r_half[i];
    }

    let (log_pi_new, grad_new) = eval(compiled, scratch, &theta_new);

    let mut r_new = vec![0.0; dim];
    for i in 0..dim {
        r_new[i] = r_half[i] + 0.5 * signed_eps * grad_new[i];
    }

    LeapState {
        theta: theta_new,
        r: r_new,
        grad: grad_new,
        log_pi: log_pi_new,
    }
}

/// Hoffman & Gelman's Algorithm 4 (find a reasonable initial step size):
/// double/halve `eps` until a single leapfrog step's acceptance probability
/// crosses 0.5.
fn find_reasonable_epsilon(
    compiled: &CompiledModel,
    scratch: &mut Arena,
    theta0: &[f64],
    inv_mass: &[f64],
    rng: &mut SamplerRng,
) -> f64 {
    let (log_pi0, grad0) = eval(compiled, scratch, theta0);
    let r0 = sample_momentum(inv_mass, rng);
    let h0 = hamiltonian(-log_pi0, kinetic(&r0, inv_mass));
    let start = LeapState {
        theta: theta0.to_vec(),
        r: r0,
        grad: grad0,
        log_pi: log_pi0,
    };

    let mut eps = 1.0;
    let next = leapfrog(compiled, scratch, &start, eps, inv_mass, 1);
    let h1 = hamiltonian(-next.log_pi, kinetic(&next.r, inv_mass));
    let mut log_accept = h0 - h1;

    let a: f64 = if log_accept > (0.5_f64).ln() { 1.0 } else { -1.0 };

    let mut iters = 0;
    while a * log_accept > -a * (2.0_f64).ln() && iters < 100 {
        eps *= (2.0_f64).powf(a);
        let next = leapfrog(compiled, scratch, &start, eps, inv_mass, 1);
        let h1 = hamiltonian(-next.log_pi, kinetic(&next.r, inv_mass));
        log_accept = h0 - h1;
        iters += 1;
    }
    eps.max(1e-10)
}

/// Dual-averaging step-size adaptation state (section 4.5).
struct DualAverage {
    mu: f64,
    log_eps: f64,
    log_eps_bar: f64,
    h_bar: f64,
    m: u64,
    delta: f64,
    gamma: f64,
    kappa: f64,
    t0: f64,
}

impl DualAverage {
    fn new(eps0: f64, cfg: StepConfig) -> Self {
        DualAverage {
            mu: (10.0 * eps0).ln(),
            log_eps: eps0.ln(),
            log_eps_bar: 0.0,
            h_bar: 0.0,
            m: 0,
            delta: cfg.delta,
            gamma: cfg.gamma,
            kappa: cfg.kappa,
            t0: cfg.t0,
        }
    }

    fn reset(&mut self, eps0: f64) {
        self.mu = (10.0 * eps0).ln();
        self.log_eps = eps0.ln();
        self.log_eps_bar = 0.0;
        self.h_bar = 0.0;
        self.m = 0;
    }

    /// `H̄_m`/`log ε̄_m` update from an observed average acceptance
    /// probability over the just-completed trajectory.
    fn update(&mut self, accept_stat: f64) {
        self.m += 1;
        let m = self.m as f64;
        self.h_bar =
            (1.0 - 1.0 / (m + self.t0)) * self.h_bar + (self.delta - accept_stat) / (m + self.t0);
        self.log_eps = self.mu - (m.sqrt() / self.gamma) * self.h_bar;
        let eta = m.powf(-self.kappa);
        self.log_eps_bar = eta * self.log_eps + (1.0 - eta) * self.log_eps_bar;
    }

    fn current_eps(&self) -> f64 {
        self.log_eps.exp()
    }

    fn eps_bar(&self) -> f64 {
        self.log_eps_bar.exp()
    }
}

/// Per-dimension online mean/variance accumulator (section 4.5's "Welford
/// accumulator").
struct Welford {
    n: u64,
    mean: Vec<f64>,
    m2: Vec<f64>,
}

impl Welford {
    fn new(dim: usize) -> Self {
        Welford {
            n: 0,
            mean: vec![0.0; dim],
            m2: vec![0.0; dim],
        }
    }

    fn add(&mut self, x: &[f64]) {
        self.n += 1;
        let n = self.n as f64;
        for i in 0..x.len() {
            let delta = x[i] - self.mean[i];
            self.mean[i] += delta / n;
            let delta2 = x[i] - self.mean[i];
            self.m2[i] += delta * delta2;
        }
    }

    fn n(&self) -> u64 {
        self.n
    }

    /// Sample variance (Bessel-corrected); `0.0` per dimension if fewer than
    /// two observations have been accumulated.
    fn variance(&self) -> Vec<f64> {
        if self.n < 2 {
            return vec![0.0; self.mean.len()];
        }
        let denom = (self.n - 1) as f64;
        self.m2.iter().map(|&m2| m2 / denom).collect()
    }

    fn reset(&mut self) {
        self.n = 0;
        self.mean.iter_mut().for_each(|m| *m = 0.0);
        self.m2.iter_mut().for_each(|m| *m = 0.0);
    }
}

/// `(θ_plus - θ_minus)·r < 0` for either endpoint momentum: the no-U-turn
/// termination test (section 4.5).
fn is_uturn(theta_minus: &[f64], r_minus: &[f64], theta_plus: &[f64], r_plus: &[f64]) -> bool {
    let diff: Vec<f64> = theta_plus.iter().zip(theta_minus).map(|(p, m)| p - m).collect();
    let dot_minus: f64 = diff.iter().zip(r_minus).map(|(d, r)| d * r).sum();
    let dot_plus: f64 = diff.iter().zip(r_plus).map(|(d, r)| d * r).sum();
    dot_minus < 0.0 || dot_plus < 0.0
}

/// Outcome of building one (sub)tree at some recursion depth: the leftmost
/// and rightmost trajectory endpoints, a candidate sample drawn from within
/// the subtree, its accumulated log-weight, and validity/divergence/turning
/// flags (section 4.5, 4.6's subtree recursion state machine).
struct TreeResult {
    minus: LeapState,
    plus: LeapState,
    theta_prop: Vec<f64>,
    log_pi_prop: f64,
    log_weight: f64,
    valid: bool,
    diverged: bool,
    turning: bool,
    alpha_sum: f64,
    n_alpha: u64,
}

/// Recursive tree-doubling build (section 4.5's "Tree building").
#[allow(clippy::too_many_arguments)]
fn build_tree(
    compiled: &CompiledModel,
    scratch: &mut Arena,
    from: &LeapState,
    h0: f64,
    inv_mass: &[f64],
    direction: i8,
    depth: usize,
    eps: f64,
    rng: &mut SamplerRng,
) -> TreeResult {
    if depth == 0 {
        let next = leapfrog(compiled, scratch, from, eps, inv_mass, direction);
        let h_new = hamiltonian(-next.log_pi, kinetic(&next.r, inv_mass));
        let delta_h = h_new - h0;
        let diverged = !delta_h.is_finite() || delta_h > DIVERGENCE_THRESHOLD;
        let log_weight = if diverged { f64::NEG_INFINITY } else { -h_new };
        let alpha = (h0 - h_new).min(0.0).exp();
        return TreeResult {
            minus: next.clone(),
            plus: next.clone(),
            theta_prop: next.theta.clone(),
            log_pi_prop: next.log_pi,
            log_weight,
            valid: !diverged,
            diverged,
            turning: false,
            alpha_sum: alpha,
            n_alpha: 1,
        };
    }

    let first = build_tree(compiled, scratch, from, h0, inv_mass, direction, depth - 1, eps, rng);
    if !first.valid {
        return first;
    }

    let extend_from = if direction == 1 { &first.plus } else { &first.minus };
    let second = build_tree(compiled, scratch, extend_from, h0, inv_mass, direction, depth - 1, eps, rng);

    let (minus, plus) = if direction == 1 {
        (first.minus.clone(), second.plus.clone())
    } else {
        (second.minus.clone(), first.plus.clone())
    };

    let log_weight = log_sum_exp(first.log_weight, second.log_weight);
    let accept_prob = if log_weight.is_finite() {
        (second.log_weight - log_weight).exp()
    } else {
        0.0
    };
    let (theta_prop, log_pi_prop) = if rng.gen::<f64>() < accept_prob {
        (second.theta_prop, second.log_pi_prop)
    } else {
        (first.theta_prop, first.log_pi_prop)
    };

    let uturn_here = is_uturn(&minus.theta, &minus.r, &plus.theta, &plus.r);
    let turning = first.turning || second.turning || uturn_here;

    TreeResult {
        minus,
        plus,
        theta_prop,
        log_pi_prop,
        log_weight,
        valid: first.valid && second.valid && !turning,
        diverged: first.diverged || second.diverged,
        turning,
        alpha_sum: first.alpha_sum + second.alpha_sum,
        n_alpha: first.n_alpha + second.n_alpha,
    }
}

/// One full NUTS transition from `theta`: resamples momentum, doubles the
/// trajectory tree until termination or `max_depth`, and returns the new
/// position, its log joint density, whether any subtree diverged, the tree
/// depth reached, and the trajectory's mean acceptance statistic (for dual
/// averaging).
#[allow(clippy::too_many_arguments)]
fn nuts_transition(
    compiled: &CompiledModel,
    scratch: &mut Arena,
    theta: &[f64],
    inv_mass: &[f64],
    eps: f64,
    max_depth: usize,
    rng: &mut SamplerRng,
) -> (Vec<f64>, f64, bool, usize, f64) {
    let (log_pi0, grad0) = eval(compiled, scratch, theta);
    let r0 = sample_momentum(inv_mass, rng);
    let h0 = hamiltonian(-log_pi0, kinetic(&r0, inv_mass));
    let start = LeapState {
        theta: theta.to_vec(),
        r: r0,
        grad: grad0,
        log_pi: log_pi0,
    };

    let mut minus = start.clone();
    let mut plus = start.clone();
    let mut theta_sample = theta.to_vec();
    let mut log_pi_sample = log_pi0;
    let mut log_weight_total = -h0;
    let mut depth = 0usize;
    let mut diverged_any = false;
    let mut alpha_sum = 0.0;
    let mut n_alpha = 0u64;

    while depth < max_depth {
        let direction: i8 = if rng.gen::<bool>() { 1 } else { -1 };
        let extend_from = if direction == 1 { &plus } else { &minus };
        let subtree = build_tree(compiled, scratch, extend_from, h0, inv_mass, direction, depth, eps, rng);

        if direction == 1 {
            plus = subtree.plus.clone();
        } else {
            minus = subtree.minus.clone();
        }
        alpha_sum += subtree.alpha_sum;
        n_alpha += subtree.n_alpha;
        diverged_any |= subtree.diverged;

        if !subtree.valid {
            if subtree.diverged {
                debug!("nuts: divergence at depth {depth}");
            }
            break;
        }

        let new_total = log_sum_exp(log_weight_total, subtree.log_weight);
        let accept_prob = if new_total.is_finite() {
            (subtree.log_weight - new_total).exp()
        } else {
            0.0
        };
        if rng.gen::<f64>() < accept_prob {
            theta_sample = subtree.theta_prop;
            log_pi_sample = subtree.log_pi_prop;
        }
        log_weight_total = new_total;
        depth += 1;

        if is_uturn(&minus.theta, &minus.r, &plus.theta, &plus.r) {
            break;
        }
    }

    if depth == max_depth {
        warn!("nuts: max tree depth {max_depth} reached");
    }

    let alpha_mean = if n_alpha > 0 { alpha_sum / n_alpha as f64 } else { 1.0 };
    (theta_sample, log_pi_sample, diverged_any, depth, alpha_mean)
}

/// Partitions `warmup` iterations into the Welford mass-matrix adaptation
/// windows (section 4.5): an `init_buffer`-length prefix and
/// `term_buffer`-length suffix are step-size-only, with doubling-length
/// windows in between, the last of which absorbs any remainder. Returns an
/// empty schedule (step-size adaptation only, mass matrix stays identity)
/// if `warmup` is too short to fit the buffers.
fn build_windows(warmup: usize, init_buffer: usize, term_buffer: usize, window: usize) -> Vec<(usize, usize)> {
    if window == 0 || init_buffer + term_buffer >= warmup {
        return Vec::new();
    }
    let slow_end = warmup - term_buffer;
    let mut windows = Vec::new();
    let mut start = init_buffer;
    let mut size = window.min(slow_end - start).max(1);

    while start < slow_end {
        let mut end = (start + size).min(slow_end);
        if slow_end - end < size * 2 {
            end = slow_end;
        }
        windows.push((start, end));
        start = end;
        size *= 2;
    }
    windows
}

/// Draws `config.n_samples` post-warmup samples from `model`'s posterior via
/// the No-U-Turn Sampler (section 4.5).
pub fn nuts(model: Rc<dyn ModelExpr>, config: NUTSConfig) -> SamplerResult<MCMCResult> {
    let compiled = compile(model)?;
    if compiled.has_discrete_param() {
        return Err(SamplerError::Model(ModelError::ModelDefinitionError(
            "nuts does not support models with a discrete-prior parameter (section 4.5)".to_string(),
        )));
    }

    let seed = config.seed.unwrap_or_else(default_seed);
    let mut rng = SamplerRng::seed_from_u64(seed);
    let init = init_arena(&compiled, &mut rng, DEFAULT_INIT_ATTEMPTS)?;
    let dim = compiled.n_unconstrained;
    let mut theta = init.values;
    let mut scratch = compiled.new_arena();
    let mut arena = compiled.new_arena();

    let mut inv_mass = vec![1.0; dim];
    let mut welford = Welford::new(dim);

    let eps0 = find_reasonable_epsilon(&compiled, &mut scratch, &theta, &inv_mass, &mut rng);
    let mut da = DualAverage::new(eps0, config.step_config);

    let windows = build_windows(
        config.warmup,
        config.var_config.init_buffer,
        config.var_config.term_buffer,
        config.var_config.window,
    );
    let mut window_idx = 0usize;

    let (n_cont, n_disc) = param_dims(&compiled);
    debug_assert_eq!(n_disc, 0, "compile() must reject discrete-prior parameters before nuts() runs");
    let mut columns: Vec<Vec<f64>> = vec![Vec::with_capacity(config.n_samples); n_cont];
    let mut log_joint_trace = Vec::with_capacity(config.n_samples);
    let mut divergences = Vec::with_capacity(config.n_samples);
    let mut tree_depths = Vec::with_capacity(config.n_samples);
    let mut accepted = Vec::with_capacity(config.n_samples);

    let warmup_start = Instant::now();
    let mut warmup_time = std::time::Duration::default();
    let total_iters = config.warmup + config.n_samples;
    for iter in 0..total_iters {
        if iter == config.warmup {
            warmup_time = warmup_start.elapsed();
        }
        let in_warmup = iter < config.warmup;
        let step_size = if in_warmup { da.current_eps() } else { da.eps_bar() };

        let (new_theta, log_pi, diverged, depth, alpha) =
            nuts_transition(&compiled, &mut scratch, &theta, &inv_mass, step_size, config.max_depth, &mut rng);
        theta = new_theta;

        if in_warmup {
            da.update(alpha);
            if window_idx < windows.len() {
                let (start, end) = windows[window_idx];
                if iter >= start && iter < end {
                    welford.add(&theta);
                }
                if iter + 1 == end {
                    let var = welford.variance();
                    let n = welford.n() as f64;
                    for d in 0..dim {
                        inv_mass[d] = var[d] * n / (n + 5.0) + 1e-3 * 5.0 / (n + 5.0);
                    }
                    welford.reset();
                    window_idx += 1;
                    let eps_restart = find_reasonable_epsilon(&compiled, &mut scratch, &theta, &inv_mass, &mut rng);
                    da.reset(eps_restart);
                }
            }
        } else {
            arena.values.copy_from_slice(&theta);
            let (cont_row, _disc_row) = constrained_values(&compiled, &arena);
            for (d, v) in cont_row.into_iter().enumerate() {
                columns[d].push(v);
            }
            log_joint_trace.push(log_pi);
            divergences.push(diverged);
            tree_depths.push(depth);
            accepted.push(true);
        }
    }
    let sampling_time = warmup_start.elapsed() - warmup_time;

    let cont_flat: Vec<f64> = columns.into_iter().flatten().collect();
    Ok(MCMCResult::from_flat(
        "nuts",
        config.n_samples,
        n_cont,
        cont_flat,
        0,
        Vec::new(),
        log_joint_trace,
        divergences,
        tree_depths,
        accepted,
        warmup_time,
        sampling_time,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::{Bernoulli, Normal, Uniform};
    use crate::model::eq;
    use crate::variable::{Data, Param};

    #[test]
    fn build_windows_covers_the_whole_slow_region_without_gaps() {
        let windows = build_windows(1000, 75, 50, 25);
        assert_eq!(windows.first().unwrap().0, 75);
        assert_eq!(windows.last().unwrap().1, 1000 - 50);
        for pair in windows.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
        }
    }

    #[test]
    fn build_windows_falls_back_to_empty_when_warmup_too_short() {
        assert!(build_windows(50, 75, 50, 25).is_empty());
    }

    #[test]
    fn rejects_models_with_a_discrete_parameter() {
        let theta = Param::scalar();
        let model = eq(theta, Bernoulli::new(0.5).unwrap());
        let err = nuts(model, NUTSConfig::default()).unwrap_err();
        assert!(matches!(err, SamplerError::Model(ModelError::ModelDefinitionError(_))));
    }

    #[test]
    fn standard_normal_posterior_recovers_mean() {
        let theta = Param::scalar();
        let model = eq(theta, Normal::new(0.0, 1.0).unwrap());
        let config = NUTSConfig {
            warmup: 300,
            n_samples: 500,
            seed: Some(0),
            ..Default::default()
        };
        let result = nuts(model, config).unwrap();
        let col = result.cont_samples.column(0);
        let mean: f64 = col.iter().sum::<f64>() / col.len() as f64;
        assert!(mean.abs() < 0.3, "mean = {mean}");
    }

    #[test]
    fn identical_seed_gives_bit_identical_samples() {
        let make_model = || {
            let theta = Param::scalar();
            eq(theta, Normal::new(0.0, 1.0).unwrap())
        };
        let config = NUTSConfig {
            warmup: 50,
            n_samples: 50,
            seed: Some(11),
            ..Default::default()
        };
        let a = nuts(make_model(), config.clone()).unwrap();
        let b = nuts(make_model(), config).unwrap();
        assert_eq!(a.cont_samples, b.cont_samples);
        assert_eq!(a.disc_samples, b.disc_samples);
    }

    #[test]
    fn posterior_mean_stddev_example_stays_in_plausible_range() {
        // mu ~ N(0,3); sigma ~ Uniform(0,2); x ~ N(mu, sigma).
        let mu = Param::scalar();
        let sigma = Param::scalar();
        let x = Data::vector(vec![1.0, 1.5, 1.7, 1.2, 1.5]);
        let model = crate::model!(
            eq(mu.clone(), Normal::new(0.0, 3.0).unwrap()),
            eq(sigma.clone(), Uniform::new(0.0, 2.0).unwrap()),
            eq(x.clone(), Normal::new(mu.clone().expr(), sigma.clone().expr()).unwrap())
        );
        let config = NUTSConfig {
            warmup: 400,
            n_samples: 600,
            seed: Some(0),
            ..Default::default()
        };
        let result = nuts(model, config).unwrap();
        let mu_mean: f64 = result.cont_samples.column(0).iter().sum::<f64>() / result.n_iterations() as f64;
        let sigma_mean: f64 = result.cont_samples.column(1).iter().sum::<f64>() / result.n_iterations() as f64;
        assert!(mu_mean > 0.5 && mu_mean < 2.2, "mean(mu) = {mu_mean}");
        assert!(sigma_mean > 0.05 && sigma_mean < 0.8, "mean(sigma) = {sigma_mean}");
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = NUTSConfig {
            warmup: 200,
            n_samples: 400,
            seed: Some(9),
            max_depth: 8,
            step_config: StepConfig { delta: 0.9, ..Default::default() },
            var_config: VarConfig { window: 40, ..Default::default() },
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: NUTSConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.warmup, config.warmup);
        assert_eq!(back.n_samples, config.n_samples);
        assert_eq!(back.seed, config.seed);
        assert_eq!(back.max_depth, config.max_depth);
        assert_eq!(back.step_config.delta, config.step_config.delta);
        assert_eq!(back.var_config.window, config.var_config.window);
    }
}
