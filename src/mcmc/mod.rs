//! Shared sampler plumbing: initial point search and reading constrained
//! values back out of a compiled model's arena. `mh` and `nuts` each live in
//! their own submodule.

pub mod mh;
pub mod nuts;

use rand::Rng;

use crate::arena::Arena;
use crate::error::{SamplerError, SamplerResult};
use crate::model::CompiledModel;
use crate::rng::SamplerRng;
use crate::variable::VarExpr;

/// Default number of random restarts `init_arena` tries before giving up.
pub const DEFAULT_INIT_ATTEMPTS: usize = 100;

/// Draws an arena with a finite log joint density by repeatedly
/// initializing every unconstrained parameter uniformly on `[-2, 2]` (the
/// same unconstrained-init heuristic Stan-family samplers use, rather than
/// literal prior sampling, since not every prior the crate supports is easy
/// to draw from directly on the unconstrained scale) and retrying on
/// `NaN`/`-inf`.
pub fn init_arena(
    compiled: &CompiledModel,
    rng: &mut SamplerRng,
    max_attempts: usize,
) -> SamplerResult<Arena> {
    let mut arena = compiled.new_arena();
    for attempt in 1..=max_attempts {
        for v in arena.values.iter_mut() {
            *v = rng.gen_range(-2.0..2.0);
        }
        let lj = compiled.log_joint(&arena);
        if lj.is_finite() {
            return Ok(arena);
        }
        if attempt == max_attempts {
            return Err(SamplerError::InitializationFailed { attempts: max_attempts });
        }
    }
    unreachable!("max_attempts must be at least 1")
}

/// Draws an arena by sampling every bound parameter from its own prior (MH's
/// initialization heuristic), retrying up to `max_attempts` times on a
/// non-finite log joint density.
pub fn init_from_prior(
    compiled: &CompiledModel,
    rng: &mut SamplerRng,
    max_attempts: usize,
) -> SamplerResult<Arena> {
    let mut arena = compiled.new_arena();
    for attempt in 1..=max_attempts {
        compiled.sample_from_prior(&mut arena, rng);
        let lj = compiled.log_joint(&arena);
        if lj.is_finite() {
            return Ok(arena);
        }
        if attempt == max_attempts {
            return Err(SamplerError::InitializationFailed { attempts: max_attempts });
        }
    }
    unreachable!("max_attempts must be at least 1")
}

/// Reads every bound parameter's current constrained value out of `arena`,
/// in `compiled.params` order, splitting continuous entries from discrete
/// (category-index) entries per section 6's separate `cont_samples`/
/// `disc_samples` matrices, and pushes each value into any storage the
/// parameter was constructed `with_storage`.
pub fn constrained_values(compiled: &CompiledModel, arena: &Arena) -> (Vec<f64>, Vec<f64>) {
    let mut cont = Vec::new();
    let mut disc = Vec::new();
    for (p, categories) in compiled.params.iter().zip(compiled.param_categories.iter()) {
        for i in 0..p.size() {
            let v = p.value_at(arena, i);
            if categories.is_some() {
                disc.push(v);
            } else {
                cont.push(v);
            }
            if let Some(storage) = p.storage() {
                storage.borrow_mut().push(v);
            }
        }
    }
    (cont, disc)
}

/// Number of continuous and discrete scalar/vector entries across every
/// bound parameter, in `compiled.params` order.
pub fn param_dims(compiled: &CompiledModel) -> (usize, usize) {
    let mut n_cont = 0;
    let mut n_disc = 0;
    for (p, categories) in compiled.params.iter().zip(compiled.param_categories.iter()) {
        if categories.is_some() {
            n_disc += p.size();
        } else {
            n_cont += p.size();
        }
    }
    (n_cont, n_disc)
}
