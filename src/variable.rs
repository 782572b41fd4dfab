//! Variable nodes and arithmetic viewer expressions (sections 3 & 4.1).
//!
//! `Param`, `Data`, and `Constant` are the three variable-node variants from
//! the data model; `SumViewer`/`ProductViewer`/`ScaleViewer` are the viewer
//! wrappers built by operator overloading over [`Expr`], letting a
//! distribution's parameters be expressions like `w*x + b`.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::ad::{Tape, TapeId};
use crate::arena::{Arena, OffsetPack, TransformKind};

/// Scalar vs. fixed-length vector shape of a variable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Scalar,
    Vector(usize),
}

impl Shape {
    pub fn size(&self) -> usize {
        match *self {
            Shape::Scalar => 1,
            Shape::Vector(n) => n,
        }
    }
}

/// Unique identity for a `Param`, assigned once at construction and stable
/// for the node's lifetime (section 3's "unique identity" invariant).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamId(u64);

static NEXT_PARAM_ID: AtomicU64 = AtomicU64::new(0);

fn next_param_id() -> ParamId {
    ParamId(NEXT_PARAM_ID.fetch_add(1, Ordering::Relaxed))
}

/// Contract every variable-expression exposes (section 4.1).
pub trait VarExpr: fmt::Debug {
    fn size(&self) -> usize;

    /// Reads this expression's value at entry `i` (broadcasting if `size() == 1`).
    fn value_at(&self, arena: &Arena, i: usize) -> f64;

    /// Builds the AD-tape node for entry `i`.
    fn ad_expr_at(&self, tape: &mut Tape, i: usize) -> TapeId;

    /// Sub-expressions, for the traversal that finds which parameters a
    /// distribution references (used by the compile pass and by parameter
    /// discovery). Leaf nodes (`Param`/`Data`/`Constant`) return `&[]`.
    fn children(&self) -> Vec<Rc<dyn VarExpr>> {
        Vec::new()
    }

    fn as_any(&self) -> &dyn Any;

    /// Owned-downcast hook: recovers a concrete `Rc<Param>`/`Rc<Data>` from
    /// an `Rc<dyn VarExpr>` handle, the way `compile` identifies which
    /// `EqNode` targets are parameters it must assign an offset to.
    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Broadcasts index `i` against an operand of size `size`: scalar operands
/// (`size == 1`) always read entry 0. Shared with `distribution`, whose
/// parameter expressions broadcast against their target the same way a
/// `SumViewer`/`ProductViewer` broadcasts its operands against each other.
#[inline]
pub fn broadcast_index(size: usize, i: usize) -> usize {
    if size == 1 {
        0
    } else {
        i
    }
}

#[inline]
fn broadcast(size: usize, i: usize) -> usize {
    broadcast_index(size, i)
}

/// Walks a variable-expression tree collecting the `ParamId` of every
/// `Param` reachable from it (used to validate definition-before-use order).
pub fn collect_param_ids(expr: &Rc<dyn VarExpr>, out: &mut Vec<ParamId>) {
    if let Some(p) = expr.as_any().downcast_ref::<Param>() {
        out.push(p.id());
    }
    for child in expr.children() {
        collect_param_ids(&child, out);
    }
}

/// An unknown scalar/vector quantity to be inferred. Holds no storage of its
/// own: it carries an [`OffsetPack`] into an `Arena` it does not own, plus
/// an optional handle to user-supplied sample storage for write-through.
pub struct Param {
    id: ParamId,
    shape: Shape,
    offsets: RefCell<OffsetPack>,
    transform: Cell<TransformKind>,
    storage: RefCell<Option<Rc<RefCell<Vec<f64>>>>>,
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("id", &self.id)
            .field("shape", &self.shape)
            .field("offsets", &self.offsets.borrow())
            .field("transform", &self.transform.get())
            .finish()
    }
}

impl Param {
    pub fn new(shape: Shape) -> Rc<Param> {
        Rc::new(Param {
            id: next_param_id(),
            shape,
            offsets: RefCell::new(OffsetPack::default()),
            transform: Cell::new(TransformKind::Identity),
            storage: RefCell::new(None),
        })
    }

    pub fn scalar() -> Rc<Param> {
        Param::new(Shape::Scalar)
    }

    pub fn vector(n: usize) -> Rc<Param> {
        Param::new(Shape::Vector(n))
    }

    /// Attaches user-supplied storage that accepted sample values are
    /// pushed into (one flat push per sampling iteration, `size()` values
    /// at a time). Returns `self` for chaining at the construction site.
    pub fn with_storage(self: Rc<Self>, storage: Rc<RefCell<Vec<f64>>>) -> Rc<Self> {
        *self.storage.borrow_mut() = Some(storage);
        self
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn offset_pack(&self) -> OffsetPack {
        *self.offsets.borrow()
    }

    pub(crate) fn set_offset_pack(&self, offsets: OffsetPack) {
        *self.offsets.borrow_mut() = offsets;
    }

    pub fn transform(&self) -> TransformKind {
        self.transform.get()
    }

    pub(crate) fn set_transform(&self, transform: TransformKind) {
        self.transform.set(transform);
    }

    pub fn storage(&self) -> Option<Rc<RefCell<Vec<f64>>>> {
        self.storage.borrow().clone()
    }

    /// Wraps this parameter as a composable [`Expr`].
    pub fn expr(self: &Rc<Self>) -> Expr {
        Expr(self.clone())
    }

    /// The raw unconstrained tape leaf at entry `i`, before any transform is
    /// applied. Used by the model compiler to add the Jacobian correction
    /// term once per bound parameter (section 4.3).
    pub(crate) fn uc_leaf(&self, tape: &mut Tape, i: usize) -> TapeId {
        let offset = self
            .offsets
            .borrow()
            .uc_offset
            .expect("uc_leaf called on a parameter with no unconstrained offset assigned");
        tape.leaf_param(offset + i)
    }
}

impl VarExpr for Param {
    fn size(&self) -> usize {
        self.shape.size()
    }

    fn value_at(&self, arena: &Arena, i: usize) -> f64 {
        let offset = self
            .offsets
            .borrow()
            .uc_offset
            .expect("Param::value_at called before the model was compiled");
        let u = arena.values[offset + i];
        self.transform.get().constrain(u)
    }

    fn ad_expr_at(&self, tape: &mut Tape, i: usize) -> TapeId {
        let leaf = self.uc_leaf(tape, i);
        match self.transform.get() {
            TransformKind::Identity => leaf,
            TransformKind::Logit { lo, hi } => tape.transform_logit(leaf, lo, hi),
            TransformKind::Log => tape.transform_log(leaf),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// An observed scalar/vector quantity with a fixed, user-supplied buffer.
#[derive(Debug)]
pub struct Data {
    values: Vec<f64>,
}

impl Data {
    pub fn scalar(value: f64) -> Rc<Data> {
        Rc::new(Data { values: vec![value] })
    }

    pub fn vector(values: Vec<f64>) -> Rc<Data> {
        Rc::new(Data { values })
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn expr(self: &Rc<Self>) -> Expr {
        Expr(self.clone())
    }
}

impl VarExpr for Data {
    fn size(&self) -> usize {
        self.values.len()
    }

    fn value_at(&self, _arena: &Arena, i: usize) -> f64 {
        self.values[i]
    }

    fn ad_expr_at(&self, tape: &mut Tape, i: usize) -> TapeId {
        tape.constant(self.values[i])
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// A literal value, e.g. the `0.0` and `1.0` in `Normal::new(0.0, 1.0)`.
#[derive(Debug, Clone, Copy)]
pub struct Constant {
    value: f64,
}

impl Constant {
    pub fn new(value: f64) -> Rc<Constant> {
        Rc::new(Constant { value })
    }

    pub fn value(&self) -> f64 {
        self.value
    }
}

impl VarExpr for Constant {
    fn size(&self) -> usize {
        1
    }

    fn value_at(&self, _arena: &Arena, _i: usize) -> f64 {
        self.value
    }

    fn ad_expr_at(&self, tape: &mut Tape, _i: usize) -> TapeId {
        tape.constant(self.value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// Returns `Some(literal)` if `expr` is (or trivially reduces to) a
/// `Constant`, used by distribution constructors to validate parameters
/// that happen to be known at construction time.
pub fn constant_value(expr: &Rc<dyn VarExpr>) -> Option<f64> {
    expr.as_any().downcast_ref::<Constant>().map(|c| c.value)
}

#[derive(Debug)]
struct SumViewer {
    lhs: Rc<dyn VarExpr>,
    rhs: Rc<dyn VarExpr>,
}

impl VarExpr for SumViewer {
    fn size(&self) -> usize {
        self.lhs.size().max(self.rhs.size())
    }

    fn value_at(&self, arena: &Arena, i: usize) -> f64 {
        let li = broadcast(self.lhs.size(), i);
        let ri = broadcast(self.rhs.size(), i);
        self.lhs.value_at(arena, li) + self.rhs.value_at(arena, ri)
    }

    fn ad_expr_at(&self, tape: &mut Tape, i: usize) -> TapeId {
        let li = broadcast(self.lhs.size(), i);
        let ri = broadcast(self.rhs.size(), i);
        let l = self.lhs.ad_expr_at(tape, li);
        let r = self.rhs.ad_expr_at(tape, ri);
        tape.add(l, r)
    }

    fn children(&self) -> Vec<Rc<dyn VarExpr>> {
        vec![self.lhs.clone(), self.rhs.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[derive(Debug)]
struct ProductViewer {
    lhs: Rc<dyn VarExpr>,
    rhs: Rc<dyn VarExpr>,
}

impl VarExpr for ProductViewer {
    fn size(&self) -> usize {
        self.lhs.size().max(self.rhs.size())
    }

    fn value_at(&self, arena: &Arena, i: usize) -> f64 {
        let li = broadcast(self.lhs.size(), i);
        let ri = broadcast(self.rhs.size(), i);
        self.lhs.value_at(arena, li) * self.rhs.value_at(arena, ri)
    }

    fn ad_expr_at(&self, tape: &mut Tape, i: usize) -> TapeId {
        let li = broadcast(self.lhs.size(), i);
        let ri = broadcast(self.rhs.size(), i);
        let l = self.lhs.ad_expr_at(tape, li);
        let r = self.rhs.ad_expr_at(tape, ri);
        tape.mul(l, r)
    }

    fn children(&self) -> Vec<Rc<dyn VarExpr>> {
        vec![self.lhs.clone(), self.rhs.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// `child * scale`, the scalar-multiplication viewer.
#[derive(Debug)]
struct ScaleViewer {
    child: Rc<dyn VarExpr>,
    scale: f64,
}

impl VarExpr for ScaleViewer {
    fn size(&self) -> usize {
        self.child.size()
    }

    fn value_at(&self, arena: &Arena, i: usize) -> f64 {
        self.child.value_at(arena, i) * self.scale
    }

    fn ad_expr_at(&self, tape: &mut Tape, i: usize) -> TapeId {
        let c = self.child.ad_expr_at(tape, i);
        tape.affine(c, self.scale, 0.0)
    }

    fn children(&self) -> Vec<Rc<dyn VarExpr>> {
        vec![self.child.clone()]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_rc(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// User-facing handle for a variable-expression, supporting `+`/`*` so that
/// distribution parameters can be written as e.g. `w.expr() * x.expr() +
/// b.expr()`. A thin wrapper is required (rather than implementing the
/// operator traits directly on `Rc<dyn VarExpr>`) because `Rc` is not a
/// fundamental type and Rust's orphan rules forbid implementing a foreign
/// trait (`Add`/`Mul`) for it.
#[derive(Debug, Clone)]
pub struct Expr(pub Rc<dyn VarExpr>);

impl Expr {
    pub fn size(&self) -> usize {
        self.0.size()
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Expr {
        Expr(Constant::new(value))
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr(Rc::new(SumViewer {
            lhs: self.0,
            rhs: rhs.0,
        }))
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr(Rc::new(ProductViewer {
            lhs: self.0,
            rhs: rhs.0,
        }))
    }
}

impl std::ops::Mul<f64> for Expr {
    type Output = Expr;
    fn mul(self, scale: f64) -> Expr {
        Expr(Rc::new(ScaleViewer {
            child: self.0,
            scale,
        }))
    }
}

/// Converts a user-facing value into the `Rc<dyn VarExpr>` distribution
/// constructors expect, so callers can pass a literal `f64`, a `Param`/`Data`
/// handle, or an [`Expr`] built from arithmetic interchangeably.
pub trait IntoVarExpr {
    fn into_var_expr(self) -> Rc<dyn VarExpr>;
}

impl IntoVarExpr for f64 {
    fn into_var_expr(self) -> Rc<dyn VarExpr> {
        Constant::new(self)
    }
}

impl IntoVarExpr for Expr {
    fn into_var_expr(self) -> Rc<dyn VarExpr> {
        self.0
    }
}

impl IntoVarExpr for Rc<Param> {
    fn into_var_expr(self) -> Rc<dyn VarExpr> {
        self
    }
}

impl IntoVarExpr for Rc<Data> {
    fn into_var_expr(self) -> Rc<dyn VarExpr> {
        self
    }
}

impl IntoVarExpr for Rc<dyn VarExpr> {
    fn into_var_expr(self) -> Rc<dyn VarExpr> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_broadcasts_to_any_index() {
        let c = Constant::new(2.0);
        let arena = Arena::empty();
        assert_eq!(c.value_at(&arena, 0), 2.0);
    }

    #[test]
    fn data_reads_its_own_buffer() {
        let d = Data::vector(vec![1.0, 2.0, 3.0]);
        let arena = Arena::empty();
        assert_eq!(d.size(), 3);
        assert_eq!(d.value_at(&arena, 2), 3.0);
    }

    #[test]
    fn param_round_trips_through_its_transform() {
        let p = Param::scalar();
        p.set_offset_pack(OffsetPack {
            uc_offset: Some(0),
            ..Default::default()
        });
        p.set_transform(TransformKind::Log);
        let mut arena = Arena::new(1, 1);
        arena.values[0] = TransformKind::Log.unconstrain(3.0);
        assert!((p.value_at(&arena, 0) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn sum_and_product_viewers_broadcast_scalars_against_vectors() {
        let w = Param::scalar();
        w.set_offset_pack(OffsetPack {
            uc_offset: Some(0),
            ..Default::default()
        });
        let b = Param::scalar();
        b.set_offset_pack(OffsetPack {
            uc_offset: Some(1),
            ..Default::default()
        });
        let x = Data::vector(vec![1.0, 2.0, 3.0]);

        let mean = w.expr() * x.expr() + b.expr();
        assert_eq!(mean.size(), 3);

        let mut arena = Arena::new(2, 0);
        arena.values[0] = 2.0; // w
        arena.values[1] = 0.5; // b
        assert_eq!(mean.0.value_at(&arena, 0), 2.0 * 1.0 + 0.5);
        assert_eq!(mean.0.value_at(&arena, 2), 2.0 * 3.0 + 0.5);
    }

    #[test]
    fn collect_param_ids_walks_through_viewers() {
        let w = Param::scalar();
        let b = Param::scalar();
        let x = Data::scalar(1.0);
        let expr: Expr = w.expr() * x.expr() + b.expr();
        let mut ids = Vec::new();
        collect_param_ids(&expr.0, &mut ids);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&w.id()));
        assert!(ids.contains(&b.id()));
    }
}
