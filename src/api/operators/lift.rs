/*!

`lift` wraps a value in the outer levels of a hierarchy it does not already have. The
procedure scans for the shortest missing prefix: it tries `i = 0, 1, …` until the value
satisfies the hierarchy *suffix* starting at level `i`, then wraps levels `i-1 … 0`
around the value, innermost first. The empty suffix always matches, so the scan always
terminates with a result: a value that fits nothing gets the whole hierarchy wrapped
around it, and an already-fully-shaped value comes back unchanged.

With `fullcheck` disabled the suffix test degrades to a representative-chain probe: check
the kind, accept outright on an empty container, otherwise descend through one picked
element. That trades correctness on partially malformed or empty-container input for
speed; it is a documented unsafe fast path, not a bug to fix.

Every level must support single-element construction, so a hierarchy containing a
dynamic-key or fixed-key-set dict level cannot be lifted through and is rejected at
construction.

*/

use std::sync::Arc;

use crate::api::operators::isa::isa_levels;
use crate::api::value::Value;
use crate::core::plan::{LevelPlan, Plan};
use crate::core::shape_error::ShapeError;

pub struct LiftOp {
  plan     : Arc<Plan>,
  fullcheck: bool,
}

impl LiftOp {
  pub(crate) fn new(plan: Arc<Plan>) -> Result<LiftOp, ShapeError> {
    // The wrap loop may need to construct any level, so all of them must define
    // single-element construction.
    for level in &plan.levels {
      if level.ops.new_single(Value::Atom(crate::Atom::Unit)).is_none() {
        return Err(ShapeError::MissingPrimitive {
          node     : level.node.clone(),
          primitive: "new_single",
        });
      }
    }
    Ok(LiftOp { plan, fullcheck: true })
  }

  /// Replaces the full suffix check with the representative-chain probe. Faster, and
  /// wrong on some empty or partially malformed inputs.
  pub fn with_fullcheck(mut self, fullcheck: bool) -> Self {
    self.fullcheck = fullcheck;
    self
  }

  /// Wraps `value` in whatever outer levels it is missing.
  pub fn apply(&self, value: &Value) -> Value {
    let levels = &self.plan.levels;
    for i in 0..=levels.len() {
      let suffix = &levels[i..];
      let matched = if self.fullcheck {
        isa_levels(suffix, value)
      } else {
        probe_levels(suffix, value)
      };
      if matched {
        let mut wrapped = value.clone();
        for level in levels[..i].iter().rev() {
          wrapped = match level.ops.new_single(wrapped) {
            Some(wrapped) => wrapped,
            // Checked at construction.
            None => unreachable!("lift level lost its new_single primitive"),
          };
        }
        return wrapped;
      }
    }
    unreachable!("the empty suffix always matches")
  }
}

/// Representative-chain probe of a run of levels: membership at each level, early
/// acceptance on an empty container, descent through one picked element.
fn probe_levels(levels: &[LevelPlan], value: &Value) -> bool {
  let mut current = value;
  for (i, level) in levels.iter().enumerate() {
    if !level.ops.is_a(current) {
      return false;
    }
    if i + 1 == levels.len() {
      break;
    }
    if level.ops.length(current) == 0 {
      // Nothing to descend into; accept what we cannot disprove.
      return true;
    }
    current = level.ops.pick(current);
  }
  true
}
