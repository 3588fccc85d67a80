/*!

`transform` reorders the leading levels of a nested value according to an axis
permutation: an N-dimensional transpose over non-uniform containers. The permutation
may be given as explicit axes (`[2, 0, 1]`, or a partial form like `[3, 1]` that swaps
the mentioned axes) or as a letter equation (`"abc -> cab"`).

The synthesized plan decomposes the permutation into cycles (see `core::permutation`);
application then runs three phases:

1. **Representative capture.** Walk one representative chain of the value, checking
   membership per level (when `check`) and capturing each level's facts (length and
   index/key order) for the rebuild. When a level turns out empty, deeper levels
   substitute their canonical dummies: there is no data to learn from, and the eventual
   output is empty below that level anyway.
2. **Full validation** (when `check`). Re-walk the whole tree with the cheap fact-based
   re-checks: every container must match its level and hold the captured length, since a
   transpose is only defined on rectangular data.
3. **Rebuild.** Apply cycles outermost-in: a `Swap` zips the two levels' iterations and
   rebuilds each side as the other level's kind; a `Rebuild` block runs nested loops
   over the captured index sets in permuted order, reads the source element through the
   original index path, and wraps results back up with fact-based construction. A level
   with a `target` reshaping is rebuilt as the target's kind instead of its own. If a
   level was empty, the output is the permuted dummy chain built from the captured
   lengths.

An identity permutation (after trimming) synthesizes no cycles and short-circuits to a
structural copy.

*/

use std::sync::Arc;

use crate::api::hierarchy::Hierarchy;
use crate::api::value::Value;
use crate::core::cache;
use crate::core::facts::{get_item, Facts, IndexRef};
use crate::core::infer;
use crate::core::permutation::{parse_equation, parse_perm, Cycle, CycleKind};
use crate::core::plan::{LevelPlan, TransformPlan};
use crate::core::shape_error::{MismatchKind, ShapeError};

/// A permutation specification: explicit axes or a letter equation.
pub enum PermInput<'p> {
  Axes(&'p [usize]),
  Equation(&'p str),
}

impl<'p> PermInput<'p> {
  fn parse(&self) -> Result<Vec<usize>, ShapeError> {
    match self {
      PermInput::Axes(axes)         => parse_perm(axes),
      PermInput::Equation(equation) => parse_equation(equation),
    }
  }
}

impl<'p> From<&'p [usize]> for PermInput<'p> {
  fn from(axes: &'p [usize]) -> Self {
    PermInput::Axes(axes)
  }
}

impl<'p, const N: usize> From<&'p [usize; N]> for PermInput<'p> {
  fn from(axes: &'p [usize; N]) -> Self {
    PermInput::Axes(axes.as_slice())
  }
}

impl<'p> From<&'p str> for PermInput<'p> {
  fn from(equation: &'p str) -> Self {
    PermInput::Equation(equation)
  }
}

enum TransformSource {
  Ready(Arc<TransformPlan>),
  Deferred { partial: Option<Hierarchy>, perm: Vec<usize> },
}

pub struct TransformOp {
  source: TransformSource,
  check : bool,
}

impl TransformOp {
  pub(crate) fn for_hierarchy(
    hierarchy: &Hierarchy,
    perm: PermInput<'_>,
  ) -> Result<TransformOp, ShapeError> {
    let perm = perm.parse()?;
    let source = if hierarchy.is_determined() {
      TransformSource::Ready(cache::transform_plan(hierarchy, &perm)?)
    } else {
      if perm.len() > hierarchy.len() {
        return Err(ShapeError::MalformedPermutation {
          reason: format!(
            "permutation of length {} exceeds the hierarchy's {} levels",
            perm.len(),
            hierarchy.len()
          ),
        });
      }
      TransformSource::Deferred { partial: Some(hierarchy.clone()), perm }
    };
    Ok(TransformOp { source, check: true })
  }

  pub(crate) fn inferred(perm: PermInput<'_>) -> Result<TransformOp, ShapeError> {
    let perm = perm.parse()?;
    Ok(TransformOp {
      source: TransformSource::Deferred { partial: None, perm },
      check : true,
    })
  }

  /// Disables validation: faster, and panics (or silently truncates) on mismatched or
  /// ragged input.
  pub fn with_check(mut self, check: bool) -> Self {
    self.check = check;
    self
  }

  fn plan_for(&self, example: &Value) -> Result<Arc<TransformPlan>, ShapeError> {
    match &self.source {
      TransformSource::Ready(plan) => Ok(plan.clone()),
      TransformSource::Deferred { partial, perm } => {
        let hierarchy = match partial {
          Some(partial) => infer::resolve(partial, example)?,
          None          => infer::from_depth(example, perm.len())?,
        };
        cache::transform_plan(&hierarchy, perm)
      }
    }
  }

  /// The permuted restructuring of `value`.
  pub fn apply(&self, value: &Value) -> Result<Value, ShapeError> {
    let plan = self.plan_for(value)?;
    if plan.cycles.is_empty() {
      // Trivial permutation: the transform is the identity.
      return Ok(value.clone());
    }

    let (facts, emptied) = self.capture(&plan, value)?;

    if self.check {
      validate_full(&plan.levels, &facts, 0, value)?;
    }

    if emptied {
      return Ok(empty_rebuild(&plan, &facts));
    }

    Ok(apply_cycles(&plan, &facts, 0, value))
  }

  /// Phase 1: representative-chain walk. Captures per-level facts, substitutes dummies
  /// below an emptied level, and (when `check`) verifies membership along the chain.
  fn capture(
    &self,
    plan: &TransformPlan,
    value: &Value,
  ) -> Result<(Vec<Facts>, bool), ShapeError> {
    let levels = &plan.levels;
    let mut facts: Vec<Facts> = Vec::with_capacity(levels.len());
    let mut emptied = false;
    let mut representative: &Value = value;
    let mut dummy_slot: Option<Value> = None;

    for (i, level) in levels.iter().enumerate() {
      let current: &Value = if i == 0 {
        value
      } else if !emptied && facts[i - 1].len > 0 {
        representative = levels[i - 1].ops.pick(representative);
        representative
      } else {
        emptied = true;
        dummy_slot = Some(level.ops.dummy());
        match &dummy_slot {
          Some(dummy) => dummy,
          None => unreachable!(),
        }
      };

      if self.check && !level.ops.is_a(current) {
        return Err(level.mismatch(MismatchKind::Shape, 0, current));
      }
      facts.push(level.ops.capture_facts(current));
    }

    // The innermost level can be empty too; the rebuild must know.
    if let Some(last) = facts.last() {
      if last.len == 0 {
        emptied = true;
      }
    }

    Ok((facts, emptied))
  }
}

/// Phase 2: whole-tree re-validation against the captured facts. A transpose needs
/// rectangular data, so every container must hold the captured length, except where
/// the shape already implies it.
fn validate_full(
  levels: &[LevelPlan],
  facts: &[Facts],
  depth: usize,
  value: &Value,
) -> Result<(), ShapeError> {
  let level = &levels[depth];
  let level_facts = &facts[depth];
  if !level.ops.is_a2(value, level_facts) {
    return Err(level.mismatch(MismatchKind::Shape, 0, value));
  }
  if !level.ops.shape_implies_length() && level.ops.length2(value, level_facts) != level_facts.len {
    return Err(level.mismatch(MismatchKind::Length, 0, value));
  }
  if depth + 1 < levels.len() {
    for element in level.ops.iterate2(value, level_facts) {
      validate_full(levels, facts, depth + 1, element)?;
    }
  }
  Ok(())
}

/// The output for a value with an emptied level: the permuted dummy chain, built from
/// the captured lengths, innermost out.
fn empty_rebuild(plan: &TransformPlan, facts: &[Facts]) -> Value {
  let order: Vec<usize> = plan
      .cycles
      .iter()
      .flat_map(|cycle| cycle.perm.iter().copied())
      .collect();

  let mut positions = order.iter().rev();
  let deepest = match positions.next() {
    Some(deepest) => *deepest,
    None => unreachable!("no cycles implies the identity short circuit"),
  };
  let mut out = plan.levels[deepest].ops.dummy();
  for &position in positions {
    let level_facts = &facts[position];
    let items = vec![out; level_facts.len];
    out = plan.levels[position].rebuild_ops().new_from_iter2(items, level_facts);
  }
  out
}

/// Phase 3: applies the cycle list from `cycle_index` on, given `value` at the depth of
/// that cycle's first level. Past the last cycle lies the untouched suffix, carried over
/// by structural copy.
fn apply_cycles(
  plan: &TransformPlan,
  facts: &[Facts],
  cycle_index: usize,
  value: &Value,
) -> Value {
  let Some(cycle) = plan.cycles.get(cycle_index) else {
    return value.clone();
  };

  match cycle.kind {
    CycleKind::Swap => {
      let a = cycle.lo;
      let b = a + 1;
      let (level_a, level_b) = (&plan.levels[a], &plan.levels[b]);

      // Zip the two levels: collect the a-major grid, then rebuild b-major.
      let rows: Vec<Vec<&Value>> = level_a
          .ops
          .iterate2(value, &facts[a])
          .map(|row| level_b.ops.iterate2(row, &facts[b]).collect())
          .collect();
      let groups: Vec<Value> = (0..facts[b].len)
          .map(|j| {
            let items: Vec<Value> = rows
                .iter()
                .map(|row| apply_cycles(plan, facts, cycle_index + 1, row[j]))
                .collect();
            level_a.rebuild_ops().new_from_iter2(items, &facts[a])
          })
          .collect();
      level_b.rebuild_ops().new_from_iter2(groups, &facts[b])
    }

    CycleKind::Rebuild => {
      let mut chosen: Vec<Option<IndexRef<'_>>> = vec![None; cycle.perm.len()];
      rebuild_block(plan, facts, cycle_index, cycle, 0, &mut chosen, value)
    }
  }
}

/// Builds output level `out_position` of a rebuild block. Output level `k` of the block
/// takes its kind, indices, and length from input level `cycle.perm[k]`; at the bottom
/// of the block the accumulated index choices address one source element through the
/// *original* level order.
fn rebuild_block<'f>(
  plan: &TransformPlan,
  facts: &'f [Facts],
  cycle_index: usize,
  cycle: &Cycle,
  out_position: usize,
  chosen: &mut Vec<Option<IndexRef<'f>>>,
  root: &Value,
) -> Value {
  if out_position == cycle.perm.len() {
    let mut current = root;
    for local in 0..cycle.perm.len() {
      let index = match &chosen[local] {
        Some(index) => index,
        None => unreachable!("every block level chooses an index before the bottom"),
      };
      current = get_item(current, index);
    }
    return apply_cycles(plan, facts, cycle_index + 1, current);
  }

  let source_level = cycle.perm[out_position];
  let local = source_level - cycle.lo;
  let level_facts = &facts[source_level];
  let mut items = Vec::with_capacity(level_facts.len);
  for index in level_facts.index_iter() {
    chosen[local] = Some(index);
    items.push(rebuild_block(
      plan,
      facts,
      cycle_index,
      cycle,
      out_position + 1,
      chosen,
      root,
    ));
  }
  plan.levels[source_level].rebuild_ops().new_from_iter2(items, level_facts)
}

#[cfg(test)]
mod tests {
  use crate::{dict, list, tup};
  use crate::api::hierarchy::{Hierarchy, ShapeNode};
  use crate::api::operators as ops;
  use crate::core::shape_error::{MismatchKind, ShapeError};

  fn hier_ldt() -> Hierarchy {
    Hierarchy::builder().list().dict_key("foo").tuple().build().unwrap()
  }

  #[test]
  fn identity_is_a_no_op() {
    let v = list![dict!{ "foo" => tup![1, 2] }];
    let t = ops::transform(&hier_ldt(), &[0, 1, 2]).unwrap();
    assert_eq!(t.apply(&v).unwrap(), v);
  }

  #[test]
  fn three_cycle_restructures_like_a_transpose() {
    // Treating v as a 2 x 1 x 2 array, axes (2, 0, 1) give a 2 x 2 x 1 result.
    let v = list![
      dict!{ "foo" => tup![1, 2] },
      dict!{ "foo" => tup![3, 4] },
    ];
    let t = ops::transform(&hier_ldt(), &[2, 0, 1]).unwrap();
    let expected = tup![
      list![dict!{ "foo" => 1 }, dict!{ "foo" => 3 }],
      list![dict!{ "foo" => 2 }, dict!{ "foo" => 4 }],
    ];
    assert_eq!(t.apply(&v).unwrap(), expected);
  }

  #[test]
  fn adjacent_swap_zips_two_levels() {
    let hier = Hierarchy::builder().list().tuple().build().unwrap();
    let v = list![tup![1, 2, 3], tup![4, 5, 6]];
    let t = ops::transform(&hier, "ab -> ba").unwrap();
    let expected = tup![list![1, 4], list![2, 5], list![3, 6]];
    assert_eq!(t.apply(&v).unwrap(), expected);
  }

  #[test]
  fn transform_round_trips_through_the_inverse() {
    let hier = Hierarchy::builder()
        .list()
        .dict_keys(["a", "b"])
        .tuple()
        .build()
        .unwrap();
    let v = list![
      dict!{ "a" => tup![1, 2], "b" => tup![3, 4] },
      dict!{ "a" => tup![5, 6], "b" => tup![7, 8] },
    ];
    let forward = ops::transform(&hier, &[1, 2, 0]).unwrap().apply(&v).unwrap();

    let permuted_hier = Hierarchy::builder()
        .dict_keys(["a", "b"])
        .tuple()
        .list()
        .build()
        .unwrap();
    // The inverse of (1, 2, 0) is (2, 0, 1).
    let back = ops::transform(&permuted_hier, &[2, 0, 1])
        .unwrap()
        .apply(&forward)
        .unwrap();
    assert_eq!(back, v);
  }

  #[test]
  fn emptied_levels_produce_the_permuted_dummy_chain() {
    let hier = Hierarchy::builder().list().tuple().build().unwrap();
    let t = ops::transform(&hier, &[1, 0]).unwrap();
    // No elements means no lengths to transpose: the result collapses empty.
    assert_eq!(t.apply(&list![]).unwrap(), tup![]);

    let hier3 = Hierarchy::builder().list().tuple().list().build().unwrap();
    let t3 = ops::transform(&hier3, &[2, 1, 0]).unwrap();
    assert_eq!(t3.apply(&list![tup![], tup![]]).unwrap(), list![]);
  }

  #[test]
  fn emptied_fixed_dict_levels_keep_their_keys() {
    let hier = Hierarchy::builder().list().dict_keys(["a", "b"]).build().unwrap();
    let t = ops::transform(&hier, &[1, 0]).unwrap();
    assert_eq!(
      t.apply(&list![]).unwrap(),
      dict!{ "a" => list![], "b" => list![] }
    );
  }

  #[test]
  fn ragged_input_is_rejected_when_checked() {
    let hier = Hierarchy::builder().list().tuple().build().unwrap();
    let ragged = list![tup![1, 2], tup![3]];
    let t = ops::transform(&hier, &[1, 0]).unwrap();
    let error = t.apply(&ragged).unwrap_err();
    assert!(matches!(
      error,
      ShapeError::Mismatch { kind: MismatchKind::Length, .. }
    ));
  }

  #[test]
  fn target_reshapes_a_rebuilt_level() {
    let hier = Hierarchy::builder()
        .list()
        .dict_keys(["a", "b"])
        .target(ShapeNode::list())
        .build()
        .unwrap();
    // Identity axes, but the dict level carries a target, so it is rebuilt as a list
    // (values in normalized key order).
    let v = list![dict!{ "b" => 2, "a" => 1 }];
    let t = ops::transform(&hier, &[0, 1]).unwrap();
    assert_eq!(t.apply(&v).unwrap(), list![list![1, 2]]);
  }

  #[test]
  fn dynamic_dict_levels_transform_through_captured_keys() {
    let hier = Hierarchy::builder().dict().list().build().unwrap();
    let v = dict!{ "x" => list![1, 2], "y" => list![3, 4] };
    let t = ops::transform(&hier, &[1, 0]).unwrap();
    let expected = list![
      dict!{ "x" => 1, "y" => 3 },
      dict!{ "x" => 2, "y" => 4 },
    ];
    assert_eq!(t.apply(&v).unwrap(), expected);
  }

  #[test]
  fn malformed_permutations_are_rejected() {
    let hier = Hierarchy::builder().list().tuple().build().unwrap();
    assert!(matches!(
      ops::transform(&hier, &[0, 0]),
      Err(ShapeError::MalformedPermutation { .. })
    ));
    // Longer than the hierarchy.
    assert!(matches!(
      ops::transform(&hier, &[2, 1, 0]),
      Err(ShapeError::MalformedPermutation { .. })
    ));
  }

  #[test]
  fn inferred_transform_reads_the_shape_from_the_value() {
    let v = list![tup![1, 2], tup![3, 4]];
    let t = ops::transform_inferred("ab -> ba").unwrap();
    assert_eq!(
      t.apply(&v).unwrap(),
      tup![list![1, 3], list![2, 4]]
    );
  }
}
