/*!

A `Plan` is a synthesized procedure skeleton: one resolved primitive table per hierarchy
level, assembled once per distinct (operator, hierarchy, options) and then invoked any
number of times. Synthesis walks the hierarchy outermost to innermost, resolves each
node's `LevelOps` (and, where the node carries a target reshaping, the target's table
used at rebuild time), and fails if any level is still a placeholder.

All per-call work (membership checks, fact capture, zipped iteration) happens in the
operator implementations against these pre-resolved tables; nothing on the call path
looks at declared metadata again.

*/

use tracing::debug;

use crate::abstractions::log::init_logger;
use crate::api::hierarchy::{Hierarchy, ShapeNode};
use crate::api::value::Value;
use crate::core::level_ops::LevelOps;
use crate::core::permutation::{find_cycles, Cycle};
use crate::core::shape_error::{MismatchKind, ShapeError};

/// One synthesized level: the shape node (kept for mismatch messages), its primitive
/// table, and the table substituted at rebuild time when the node carries a target.
pub(crate) struct LevelPlan {
  pub node       : ShapeNode,
  pub ops        : LevelOps,
  pub rebuild_ops: Option<LevelOps>,
}

impl LevelPlan {
  fn new(node: &ShapeNode) -> Result<LevelPlan, ShapeError> {
    let ops = LevelOps::for_node(node)?;
    let rebuild_ops = match node.target() {
      Some(target) => Some(LevelOps::for_node(target)?),
      None => None,
    };
    Ok(LevelPlan { node: node.clone(), ops, rebuild_ops })
  }

  /// The primitive table used when this level is rebuilt: the target's, if one is
  /// attached.
  #[inline(always)]
  pub fn rebuild_ops(&self) -> &LevelOps {
    self.rebuild_ops.as_ref().unwrap_or(&self.ops)
  }

  /// The mismatch error for a value failing this level.
  pub fn mismatch(&self, kind: MismatchKind, arg: usize, actual: &Value) -> ShapeError {
    ShapeError::Mismatch {
      kind,
      arg,
      expected: self.node.clone(),
      actual: actual.clone(),
    }
  }
}

/// The synthesized procedure skeleton for the traversal-family operators.
pub(crate) struct Plan {
  pub levels: Vec<LevelPlan>,
}

impl Plan {
  pub fn new(hierarchy: &Hierarchy) -> Result<Plan, ShapeError> {
    init_logger();
    let levels = hierarchy
        .nodes()
        .iter()
        .map(LevelPlan::new)
        .collect::<Result<Vec<LevelPlan>, ShapeError>>()?;
    debug!("synthesized traversal plan for {}", hierarchy);
    Ok(Plan { levels })
  }
}

/// The synthesized skeleton for `transform`: the levels covered by the permutation plus
/// its cycle decomposition. An identity permutation decomposes into no cycles at all,
/// which the operator short-circuits.
pub(crate) struct TransformPlan {
  pub levels: Vec<LevelPlan>,
  pub cycles: Vec<Cycle>,
}

impl TransformPlan {
  pub fn new(hierarchy: &Hierarchy, perm: &[usize]) -> Result<TransformPlan, ShapeError> {
    init_logger();
    if perm.len() > hierarchy.len() {
      return Err(ShapeError::MalformedPermutation {
        reason: format!(
          "permutation of length {} exceeds the hierarchy's {} levels",
          perm.len(),
          hierarchy.len()
        ),
      });
    }

    let (cycles, length) = find_cycles(perm, &hierarchy.nodes()[..perm.len()]);
    let levels = hierarchy.nodes()[..length]
        .iter()
        .map(LevelPlan::new)
        .collect::<Result<Vec<LevelPlan>, ShapeError>>()?;

    // Rebuilding through a target is only possible when the target can construct from
    // its own metadata; a dynamic-key target has no key order until runtime.
    for level in &levels {
      if let Some(rebuild) = &level.rebuild_ops {
        if rebuild.kind() == crate::api::box_kind::BoxKind::DictDynamic {
          return Err(ShapeError::MissingPrimitive {
            node     : level.node.clone(),
            primitive: "new_from_iter (target rebuild)",
          });
        }
      }
    }

    debug!(
      "synthesized transform plan for {} with {} cycle(s) over {} level(s)",
      hierarchy,
      cycles.len(),
      length
    );
    Ok(TransformPlan { levels, cycles })
  }
}
