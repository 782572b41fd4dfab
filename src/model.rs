//! Model composition and compilation (sections 3 & 4.1).
//!
//! `target ~ dist` is an [`EqNode`]; sequential composition of statements
//! (C++'s comma operator) is a [`GlueNode`]. `compile()` walks the
//! resulting tree once, in left-to-right statement order, assigning each
//! bound `Param` its arena offset and transform, then builds the AD tape
//! the whole model will be replayed against for every later sampling
//! iteration.

use std::fmt;
use std::rc::Rc;

use crate::ad::{Tape, TapeId};
use crate::arena::{Arena, OffsetPack, TransformKind};
use crate::distribution::{used_as_positive_scale, DistExpr};
use crate::error::{ModelError, ModelResult};
use crate::rng::SamplerRng;
use crate::variable::{collect_param_ids, Data, Param, ParamId, VarExpr};

/// A node in the model tree: either a single `target ~ dist` statement or a
/// `GlueNode` combining two such statements.
pub trait ModelExpr: fmt::Debug {
    /// Sum of every statement's log-density contribution, including the
    /// Jacobian correction for any bound parameter with a non-identity
    /// transform.
    fn log_joint(&self, arena: &Arena) -> f64;

    /// Tape node for the same sum. Called exactly once, while `compile`
    /// builds the model's tape.
    fn ad_log_joint(&self, tape: &mut Tape) -> TapeId;

    /// Appends every `EqNode` reachable from this node, in left-to-right
    /// statement order.
    fn collect_eq_nodes(&self, out: &mut Vec<Rc<EqNode>>);
}

/// `target ~ dist`.
#[derive(Debug)]
pub struct EqNode {
    pub target: Rc<dyn VarExpr>,
    pub dist: Rc<dyn DistExpr>,
}

impl EqNode {
    /// The target's offset pack and transform, if it is a bound `Param`
    /// (`None` for a `Data` target, which carries no transform).
    fn param_target(&self) -> Option<&Param> {
        self.target.as_any().downcast_ref::<Param>()
    }

    fn jacobian_sum(&self, arena: &Arena) -> f64 {
        match self.param_target() {
            None => 0.0,
            Some(p) => {
                let transform = p.transform();
                if transform == TransformKind::Identity {
                    return 0.0;
                }
                let offset = p
                    .offset_pack()
                    .uc_offset
                    .expect("compiled Param missing its uc_offset");
                (0..p.size())
                    .map(|i| transform.log_jacobian(arena.values[offset + i]))
                    .sum()
            }
        }
    }

    fn ad_jacobian_sum(&self, tape: &mut Tape) -> TapeId {
        match self.param_target() {
            None => tape.constant(0.0),
            Some(p) => {
                let transform = p.transform();
                let terms: Vec<TapeId> = (0..p.size())
                    .map(|i| {
                        let leaf = p.uc_leaf(tape, i);
                        match transform {
                            TransformKind::Identity => tape.constant(0.0),
                            TransformKind::Log => leaf,
                            TransformKind::Logit { lo, hi } => tape.logit_jacobian(leaf, lo, hi),
                        }
                    })
                    .collect();
                tape.sum(&terms)
            }
        }
    }
}

impl ModelExpr for EqNode {
    fn log_joint(&self, arena: &Arena) -> f64 {
        self.dist.log_pdf(arena, self.target.as_ref()) + self.jacobian_sum(arena)
    }

    fn ad_log_joint(&self, tape: &mut Tape) -> TapeId {
        let lp = self.dist.ad_log_pdf(tape, self.target.as_ref());
        let jac = self.ad_jacobian_sum(tape);
        tape.add(lp, jac)
    }

    fn collect_eq_nodes(&self, out: &mut Vec<Rc<EqNode>>) {
        // Pushed by the owning `Rc<EqNode>` at the call site (see `eq`),
        // not here: a bare `&EqNode` has no `Rc` to clone.
        let _ = out;
    }
}

/// Sequential composition of two model statements (the comma operator).
#[derive(Debug)]
pub struct GlueNode {
    pub lhs: Rc<dyn ModelExpr>,
    pub rhs: Rc<dyn ModelExpr>,
}

impl ModelExpr for GlueNode {
    fn log_joint(&self, arena: &Arena) -> f64 {
        self.lhs.log_joint(arena) + self.rhs.log_joint(arena)
    }

    fn ad_log_joint(&self, tape: &mut Tape) -> TapeId {
        let l = self.lhs.ad_log_joint(tape);
        let r = self.rhs.ad_log_joint(tape);
        tape.add(l, r)
    }

    fn collect_eq_nodes(&self, out: &mut Vec<Rc<EqNode>>) {
        self.lhs.collect_eq_nodes(out);
        self.rhs.collect_eq_nodes(out);
    }
}

/// A model tree whose root also remembers its own flattened `EqNode` list,
/// since `ModelExpr::collect_eq_nodes` needs an `Rc<EqNode>` at each leaf
/// and a bare `&dyn ModelExpr` cannot manufacture one for itself.
#[derive(Debug)]
struct Root {
    node: Rc<dyn ModelExpr>,
    eq_nodes: Vec<Rc<EqNode>>,
}

impl ModelExpr for Root {
    fn log_joint(&self, arena: &Arena) -> f64 {
        self.node.log_joint(arena)
    }

    fn ad_log_joint(&self, tape: &mut Tape) -> TapeId {
        self.node.ad_log_joint(tape)
    }

    fn collect_eq_nodes(&self, out: &mut Vec<Rc<EqNode>>) {
        out.extend(self.eq_nodes.iter().cloned());
    }
}

/// Builds a `target ~ dist` statement. `target` is typically a `Rc<Param>`
/// or `Rc<Data>`; the unsized coercion to `Rc<dyn VarExpr>` happens
/// implicitly since both implement `VarExpr`.
pub fn eq<T, D>(target: Rc<T>, dist: Rc<D>) -> Rc<dyn ModelExpr>
where
    T: VarExpr + 'static,
    D: DistExpr + 'static,
{
    let target: Rc<dyn VarExpr> = target;
    let eq_node = Rc::new(EqNode { target, dist });
    Rc::new(Root {
        node: eq_node.clone(),
        eq_nodes: vec![eq_node],
    })
}

/// Sequentially composes two statements, in left-to-right order.
pub fn seq(lhs: Rc<dyn ModelExpr>, rhs: Rc<dyn ModelExpr>) -> Rc<dyn ModelExpr> {
    let mut eq_nodes = Vec::new();
    lhs.collect_eq_nodes(&mut eq_nodes);
    rhs.collect_eq_nodes(&mut eq_nodes);
    Rc::new(Root {
        node: Rc::new(GlueNode { lhs, rhs }),
        eq_nodes,
    })
}

/// Glues any number of statements into one model, left to right:
/// `model!(a, b, c)` is `seq(seq(a, b), c)`.
#[macro_export]
macro_rules! model {
    ($first:expr $(, $rest:expr)+ $(,)?) => {{
        let mut m = $first;
        $( m = $crate::model::seq(m, $rest); )+
        m
    }};
    ($first:expr $(,)?) => {
        $first
    };
}

/// The outcome of `compile`: a model whose parameters all have their arena
/// offsets and transforms fixed, with the AD tape for `grad_log_joint`
/// already built.
#[derive(Debug)]
pub struct CompiledModel {
    root: Rc<dyn ModelExpr>,
    tape: std::cell::RefCell<Tape>,
    tape_root: TapeId,
    /// Bound parameters, in definition order, for prior-sampling and result
    /// labeling.
    pub params: Vec<Rc<Param>>,
    /// Each bound parameter's own prior, parallel to `params`, so a sampler
    /// can redraw `params[k]` from `param_priors[k]` without re-walking the
    /// model tree (used by MH's prior-resampling initialization).
    pub param_priors: Vec<Rc<dyn DistExpr>>,
    /// `Some(n)` for a parameter with a discrete prior over `n` categories,
    /// `None` for a continuous parameter, parallel to `params`.
    pub param_categories: Vec<Option<usize>>,
    pub n_unconstrained: usize,
    has_discrete_param: bool,
}

impl CompiledModel {
    pub fn log_joint(&self, arena: &Arena) -> f64 {
        self.root.log_joint(arena)
    }

    /// Draws every bound parameter from its own prior, in definition order,
    /// writing the unconstrained-scale value into `arena` (section 4.4's
    /// "sampling each parameter from its prior" initialization heuristic).
    /// Definition order guarantees that by the time parameter `k`'s prior is
    /// sampled, every earlier parameter it might reference already has a
    /// value in `arena`.
    pub fn sample_from_prior(&self, arena: &mut Arena, rng: &mut SamplerRng) {
        for (param, prior) in self.params.iter().zip(self.param_priors.iter()) {
            let offset = param
                .offset_pack()
                .uc_offset
                .expect("compiled Param missing its uc_offset");
            let transform = param.transform();
            for i in 0..param.size() {
                let x = prior.sample_at(arena, i, rng);
                arena.values[offset + i] = if prior.is_discrete() {
                    x
                } else {
                    transform.unconstrain(x)
                };
            }
        }
    }

    /// Replays the model's tape (built once, here, at compile time) against
    /// `arena`'s current parameter values, returning the log joint density
    /// and leaving the gradient in `arena.adjoints`. Callers must zero
    /// `arena.adjoints` first if they don't want contributions to
    /// accumulate across calls.
    pub fn grad_log_joint(&self, arena: &mut Arena) -> f64 {
        self.tape.borrow_mut().eval_grad(arena, self.tape_root)
    }

    pub fn new_arena(&self) -> Arena {
        Arena::new(self.n_unconstrained, 0)
    }

    pub fn has_discrete_param(&self) -> bool {
        self.has_discrete_param
    }
}

/// Assigns every bound `Param` its arena offset and transform, and builds
/// the model's AD tape. Section 4.1's two-pass algorithm:
///
/// 1. Left to right, validate and assign offsets: the left-hand side of
///    `~` must be a `Param` or `Data`; a `Param` must not already have an
///    offset (no duplicate priors) and every `Param` its distribution
///    parameters reference must already be bound (no forward references).
/// 2. A second pass resolves each `Param`'s final transform: the prior's
///    own `default_transform` (`Identity` for `Normal`, `Logit` for
///    `Uniform`), unless the parameter is never used as a `Uniform` itself
///    but is used somewhere as a `Normal`'s `sd`, in which case it gets
///    `Log` instead (section 4.1 step 3's "positivity from stddev" rule).
pub fn compile(root: Rc<dyn ModelExpr>) -> ModelResult<CompiledModel> {
    let mut eq_nodes = Vec::new();
    root.collect_eq_nodes(&mut eq_nodes);

    let mut bound: Vec<ParamId> = Vec::new();
    let mut params: Vec<Rc<Param>> = Vec::new();
    let mut param_priors: Vec<Rc<dyn DistExpr>> = Vec::new();
    let mut param_categories: Vec<Option<usize>> = Vec::new();
    let mut next_offset = 0usize;
    let mut has_discrete_param = false;

    for node in &eq_nodes {
        let is_param = node.target.as_any().downcast_ref::<Param>().is_some();
        let is_data = node.target.as_any().downcast_ref::<Data>().is_some();
        if !is_param && !is_data {
            return Err(ModelError::ModelDefinitionError(
                "the left-hand side of `~` must be a Param or Data node".to_string(),
            ));
        }

        let target_size = node.target.size();
        for expr in node.dist.parameter_exprs() {
            let sz = expr.size();
            if sz != 1 && sz != target_size {
                return Err(ModelError::DimensionMismatch {
                    expected: target_size,
                    found: sz,
                });
            }
        }

        let mut referenced = Vec::new();
        for expr in node.dist.parameter_exprs() {
            collect_param_ids(&expr, &mut referenced);
        }
        for id in &referenced {
            if !bound.contains(id) {
                return Err(ModelError::ModelDefinitionError(
                    "a distribution parameter references a Param before it is bound".to_string(),
                ));
            }
        }

        if let Some(p) = node.target.as_any().downcast_ref::<Param>() {
            if p.offset_pack().uc_offset.is_some() {
                return Err(ModelError::ModelDefinitionError(
                    "a Param cannot have more than one prior".to_string(),
                ));
            }
            let offset = next_offset;
            next_offset += p.size();
            p.set_offset_pack(OffsetPack {
                uc_offset: Some(offset),
                c_offset: None,
                v_offset: Some(offset),
                tp_offset: None,
            });
            p.set_transform(node.dist.default_transform()?);
            if node.dist.is_discrete() {
                has_discrete_param = true;
            }
            bound.push(p.id());
            let any_rc = node.target.clone().as_any_rc();
            let param_rc = any_rc
                .downcast::<Param>()
                .expect("target was just confirmed to be a Param");
            params.push(param_rc);
            param_priors.push(node.dist.clone());
            param_categories.push(node.dist.n_categories());
        }
    }

    let all_dists: Vec<Rc<dyn DistExpr>> = eq_nodes.iter().map(|n| n.dist.clone()).collect();
    for p in &params {
        if p.transform() == TransformKind::Identity {
            let expr: Rc<dyn VarExpr> = p.clone();
            if used_as_positive_scale(&expr, &all_dists) {
                p.set_transform(TransformKind::Log);
            }
        }
    }

    let mut tape = Tape::new();
    let tape_root = root.ad_log_joint(&mut tape);

    Ok(CompiledModel {
        root,
        tape: std::cell::RefCell::new(tape),
        tape_root,
        params,
        param_priors,
        param_categories,
        n_unconstrained: next_offset,
        has_discrete_param,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribution::Normal;
    use crate::variable::Data;

    #[test]
    fn compile_rejects_duplicate_priors() {
        let p = Param::scalar();
        let m = model!(
            eq(p.clone(), Normal::new(0.0, 1.0).unwrap()),
            eq(p.clone(), Normal::new(0.0, 1.0).unwrap())
        );
        assert!(compile(m).is_err());
    }

    #[test]
    fn compile_rejects_forward_reference() {
        let mu = Param::scalar();
        let x = Data::scalar(1.0);
        // mu's own prior references `x`'s sibling `sigma`, which is never bound.
        let sigma = Param::scalar();
        let m = model!(
            eq(mu.clone(), Normal::new(0.0, sigma.clone().expr()).unwrap()),
            eq(x.clone(), Normal::new(mu.clone().expr(), 1.0).unwrap())
        );
        assert!(compile(m).is_err());
    }

    #[test]
    fn compile_rejects_incompatible_vector_parameter_shape() {
        let x = Data::vector(vec![1.0, 2.0, 3.0]);
        let bad_mean = Data::vector(vec![0.0, 0.0]); // size 2, target size 3
        let m = eq(x.clone(), Normal::new(bad_mean.clone().expr(), 1.0).unwrap());
        match compile(m) {
            Err(ModelError::DimensionMismatch { expected, found }) => {
                assert_eq!(expected, 3);
                assert_eq!(found, 2);
            }
            other => panic!("expected DimensionMismatch, got {other:?}"),
        }
    }

    #[test]
    fn compile_assigns_sequential_offsets() {
        let mu = Param::scalar();
        let sigma = Param::scalar();
        let x = Data::vector(vec![1.0, 2.0, 3.0]);
        let m = model!(
            eq(mu.clone(), Normal::new(0.0, 1.0).unwrap()),
            eq(sigma.clone(), Normal::new(0.0, 1.0).unwrap()),
            eq(x.clone(), Normal::new(mu.clone().expr(), sigma.clone().expr()).unwrap())
        );
        let compiled = compile(m).unwrap();
        assert_eq!(compiled.n_unconstrained, 2);
        assert_eq!(mu.offset_pack().uc_offset, Some(0));
        assert_eq!(sigma.offset_pack().uc_offset, Some(1));
    }

    #[test]
    fn sigma_used_as_stddev_gets_log_transform() {
        let mu = Param::scalar();
        let sigma = Param::scalar();
        let x = Data::scalar(1.0);
        let m = model!(
            eq(mu.clone(), Normal::new(0.0, 1.0).unwrap()),
            eq(sigma.clone(), Normal::new(0.0, 1.0).unwrap()),
            eq(x.clone(), Normal::new(mu.clone().expr(), sigma.clone().expr()).unwrap())
        );
        compile(m).unwrap();
        assert_eq!(sigma.transform(), TransformKind::Log);
        assert_eq!(mu.transform(), TransformKind::Identity);
    }
}
