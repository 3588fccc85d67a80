/*!

The user-facing operators. Each `ops::…` constructor resolves a hierarchy into a cached
plan (or arranges for inference to do so on first contact with real data) and returns a
small callable struct carrying the plan plus its runtime options.

| operator | entry points | options |
|:---------|:-------------|:--------|
| `isa` | `apply` | (none) |
| `map` | `apply`, `apply_multi`, `iter`, `iter_multi` | `check` |
| `visit` | `apply`, `apply_multi` | `check` |
| `flatten` | `apply`, `apply_multi`, `iter`, `iter_multi` | `check` |
| `lift` | `apply` | `fullcheck` |
| `transform` | `apply` | `check` |

The `*_inferred` constructors implement the "no hierarchy, just a depth" contract: the
shape is inferred from the first real argument at each call and looked up in the plan
cache, so repeated calls with the same observed shape reuse one plan. Constructing an
operator over a hierarchy that still contains placeholders defers the same way, with the
placeholders resolved against each call's example; `isa` and `lift` do not infer and
reject undetermined hierarchies outright.

`check = false` skips validation for speed. On mismatched input the traversal panics
rather than silently producing wrong output; it is a deliberate unsafe fast path.

*/

mod each;
mod isa;
mod lift;
mod transform;

#[cfg(test)]
mod battery;

use std::sync::Arc;

use crate::api::hierarchy::Hierarchy;
use crate::api::value::Value;
use crate::core::cache::{self, Operator};
use crate::core::infer;
use crate::core::plan::Plan;
use crate::core::shape_error::ShapeError;

pub use each::{FlattenOp, LeafGroups, Leaves, MapIter, MapMultiIter, MapOp, VisitOp};
pub use isa::IsaOp;
pub use lift::LiftOp;
pub use transform::{PermInput, TransformOp};

/// Where an operator's plan comes from: synthesized at construction, or per call via
/// shape inference.
pub(crate) enum PlanSource {
  Ready(Arc<Plan>),
  Deferred {
    op     : Operator,
    partial: Option<Hierarchy>,
    depth  : usize,
  },
}

impl PlanSource {
  fn for_hierarchy(op: Operator, hierarchy: &Hierarchy) -> Result<PlanSource, ShapeError> {
    if hierarchy.is_determined() {
      Ok(PlanSource::Ready(cache::traverse_plan(op, hierarchy)?))
    } else {
      Ok(PlanSource::Deferred {
        op,
        partial: Some(hierarchy.clone()),
        depth  : hierarchy.len(),
      })
    }
  }

  fn inferred(op: Operator, depth: usize) -> PlanSource {
    PlanSource::Deferred { op, partial: None, depth }
  }

  /// The plan for this call, inferring the shape from `example` when deferred.
  pub(crate) fn resolve(&self, example: &Value) -> Result<Arc<Plan>, ShapeError> {
    match self {
      PlanSource::Ready(plan) => Ok(plan.clone()),
      PlanSource::Deferred { op, partial, depth } => {
        let hierarchy = match partial {
          Some(partial) => infer::resolve(partial, example)?,
          None          => infer::from_depth(example, *depth)?,
        };
        cache::traverse_plan(*op, &hierarchy)
      }
    }
  }
}

/// Requires a fully determined hierarchy, for the operators that cannot infer.
fn require_determined(hierarchy: &Hierarchy) -> Result<(), ShapeError> {
  if hierarchy.is_determined() {
    Ok(())
  } else {
    Err(ShapeError::Unresolved {
      reason: format!("{} contains placeholder levels", hierarchy),
    })
  }
}

/// Membership test: does a value have exactly the declared shape?
pub fn isa(hierarchy: &Hierarchy) -> Result<IsaOp, ShapeError> {
  require_determined(hierarchy)?;
  IsaOp::new(cache::traverse_plan(Operator::Isa, hierarchy)?)
}

/// Element-wise application over the innermost elements.
pub fn map(hierarchy: &Hierarchy) -> Result<MapOp, ShapeError> {
  Ok(MapOp::new(PlanSource::for_hierarchy(Operator::Map, hierarchy)?))
}

/// `map` with the shape inferred from the first value argument of each call.
pub fn map_inferred(depth: usize) -> MapOp {
  MapOp::new(PlanSource::inferred(Operator::Map, depth))
}

/// Side-effecting traversal of the innermost elements.
pub fn visit(hierarchy: &Hierarchy) -> Result<VisitOp, ShapeError> {
  Ok(VisitOp::new(PlanSource::for_hierarchy(Operator::Visit, hierarchy)?))
}

/// `visit` with the shape inferred from the first value argument of each call.
pub fn visit_inferred(depth: usize) -> VisitOp {
  VisitOp::new(PlanSource::inferred(Operator::Visit, depth))
}

/// Flattens the declared levels into the flat sequence of innermost elements.
pub fn flatten(hierarchy: &Hierarchy) -> Result<FlattenOp, ShapeError> {
  Ok(FlattenOp::new(PlanSource::for_hierarchy(Operator::Flatten, hierarchy)?))
}

/// `flatten` with the shape inferred from the first value argument of each call.
pub fn flatten_inferred(depth: usize) -> FlattenOp {
  FlattenOp::new(PlanSource::inferred(Operator::Flatten, depth))
}

/// Wraps a value in the outer levels of the hierarchy it does not already have.
pub fn lift(hierarchy: &Hierarchy) -> Result<LiftOp, ShapeError> {
  require_determined(hierarchy)?;
  LiftOp::new(cache::traverse_plan(Operator::Lift, hierarchy)?)
}

/// Reorders the leading levels of a nested value according to a permutation.
pub fn transform<'p>(
  hierarchy: &Hierarchy,
  perm: impl Into<PermInput<'p>>,
) -> Result<TransformOp, ShapeError> {
  TransformOp::for_hierarchy(hierarchy, perm.into())
}

/// `transform` with the shape inferred, to the permutation's depth, from each call's
/// value argument.
pub fn transform_inferred<'p>(perm: impl Into<PermInput<'p>>) -> Result<TransformOp, ShapeError> {
  TransformOp::inferred(perm.into())
}
