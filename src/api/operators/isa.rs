/*!

`isa` compiles a hierarchy into a pure membership predicate: true iff the value's entire
tree satisfies the declared shape. Every level fails fast on its own membership check
before iterating, and every element at every level is visited: a structural mutation
anywhere in the tree must flip the answer, so a representative probe would not do.

*/

use std::sync::Arc;

use crate::api::value::Value;
use crate::core::plan::{LevelPlan, Plan};
use crate::core::shape_error::ShapeError;

pub struct IsaOp {
  plan: Arc<Plan>,
}

impl IsaOp {
  pub(crate) fn new(plan: Arc<Plan>) -> Result<IsaOp, ShapeError> {
    Ok(IsaOp { plan })
  }

  /// True iff `value` has exactly the declared shape.
  pub fn apply(&self, value: &Value) -> bool {
    isa_levels(&self.plan.levels, value)
  }
}

/// Whole-tree membership against a run of levels, outermost first.
pub(crate) fn isa_levels(levels: &[LevelPlan], value: &Value) -> bool {
  let Some((level, deeper)) = levels.split_first() else {
    return true;
  };
  if !level.ops.is_a(value) {
    return false;
  }
  if deeper.is_empty() {
    // The terminal level only checks membership; its elements are arbitrary leaves.
    return true;
  }
  level.ops.iterate(value).all(|element| isa_levels(deeper, element))
}
