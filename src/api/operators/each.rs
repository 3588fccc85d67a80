/*!

The traversal family: `map`, `visit`, and `flatten` share one walking machine that nests
an iteration per declared level and surfaces the innermost elements. `flatten` yields
them unchanged, `map` applies a caller function, `visit` calls one for its side effects.

The single-argument walk checks each container against its level (when `check`) and
iterates in canonical per-kind order. The multi-argument walk is where the proof pool
earns its keep: at every level, argument 0 is validated once and its structural facts
(length, key order) captured; each further argument is then re-checked against those
facts with the cheap `is_a2` form plus a length comparison (elided when the shape
already implies the length), and all arguments are iterated *in argument 0's key order*
so elements stay aligned without re-discovering structure.

Laziness means a restartable-once forward sequence, not concurrency: the lazy entry
points return iterators that validate containers as they are entered and surface a
mismatch as an `Err` item at the point of detection.

*/

use std::marker::PhantomData;
use std::sync::Arc;

use crate::api::operators::PlanSource;
use crate::api::value::Value;
use crate::core::level_ops::ElemIter;
use crate::core::plan::Plan;
use crate::core::shape_error::{MismatchKind, ShapeError};

// region Lazy walkers

/// Lazy flat iterator over the innermost elements of one value.
pub struct Leaves<'v> {
  plan  : Arc<Plan>,
  check : bool,
  root  : Option<&'v Value>,
  stack : Vec<ElemIter<'v>>,
  failed: bool,
}

impl<'v> Leaves<'v> {
  fn new(plan: Arc<Plan>, check: bool, value: &'v Value) -> Leaves<'v> {
    Leaves { plan, check, root: Some(value), stack: Vec::new(), failed: false }
  }

  /// Opens the container `value` at level `stack.len()`, checking membership first.
  fn enter(&mut self, value: &'v Value) -> Result<(), ShapeError> {
    let level = &self.plan.levels[self.stack.len()];
    if self.check && !level.ops.is_a(value) {
      return Err(level.mismatch(MismatchKind::Shape, 0, value));
    }
    self.stack.push(level.ops.iterate(value));
    Ok(())
  }
}

impl<'v> Iterator for Leaves<'v> {
  type Item = Result<&'v Value, ShapeError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }
    if let Some(root) = self.root.take() {
      if self.plan.levels.is_empty() {
        // A zero-level shape flattens to the value itself.
        return Some(Ok(root));
      }
      if let Err(error) = self.enter(root) {
        self.failed = true;
        return Some(Err(error));
      }
    }
    loop {
      let depth = self.stack.len();
      let advanced = self.stack.last_mut()?.next();
      match advanced {
        None => {
          self.stack.pop();
          if self.stack.is_empty() {
            return None;
          }
        }
        Some(element) => {
          if depth == self.plan.levels.len() {
            return Some(Ok(element));
          }
          if let Err(error) = self.enter(element) {
            self.failed = true;
            return Some(Err(error));
          }
        }
      }
    }
  }
}

/// Lazy flat iterator over aligned groups of innermost elements from several values.
pub struct LeafGroups<'v> {
  plan  : Arc<Plan>,
  check : bool,
  root  : Option<Vec<&'v Value>>,
  stack : Vec<Vec<ElemIter<'v>>>,
  failed: bool,
}

impl<'v> LeafGroups<'v> {
  fn new(plan: Arc<Plan>, check: bool, values: &[&'v Value]) -> LeafGroups<'v> {
    assert!(!values.is_empty(), "a multi-argument traversal needs at least one argument");
    LeafGroups {
      plan,
      check,
      root: Some(values.to_vec()),
      stack: Vec::new(),
      failed: false,
    }
  }

  /// Opens an aligned group of containers at level `stack.len()`: validates the
  /// reference element, captures its facts, re-checks the rest against them, and zips
  /// everyone's iteration in the captured order.
  fn enter(&mut self, group: Vec<&'v Value>) -> Result<(), ShapeError> {
    let level = &self.plan.levels[self.stack.len()];
    let reference = group[0];
    if self.check && !level.ops.is_a(reference) {
      return Err(level.mismatch(MismatchKind::Shape, 0, reference));
    }
    // A naive iterator needs no captured order to stay aligned, so with checking off
    // there is no fact worth capturing at this level.
    let facts = if self.check || !level.ops.naive_iterator() {
      Some(level.ops.capture_facts(reference))
    } else {
      None
    };
    if self.check {
      let facts = match &facts {
        Some(facts) => facts,
        None => unreachable!(),
      };
      for (i, &value) in group.iter().enumerate().skip(1) {
        if !level.ops.is_a2(value, facts) {
          return Err(level.mismatch(MismatchKind::Shape, i, value));
        }
        if !level.ops.shape_implies_length() && level.ops.length2(value, facts) != facts.len {
          return Err(level.mismatch(MismatchKind::LengthConflict, i, value));
        }
      }
    }
    let iters = match &facts {
      Some(facts) => group.iter().map(|value| level.ops.iterate2(value, facts)).collect(),
      None => group.iter().map(|value| level.ops.iterate(value)).collect(),
    };
    self.stack.push(iters);
    Ok(())
  }
}

impl<'v> Iterator for LeafGroups<'v> {
  type Item = Result<Vec<&'v Value>, ShapeError>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.failed {
      return None;
    }
    if let Some(root) = self.root.take() {
      if self.plan.levels.is_empty() {
        return Some(Ok(root));
      }
      if let Err(error) = self.enter(root) {
        self.failed = true;
        return Some(Err(error));
      }
    }
    loop {
      let depth = self.stack.len();
      let (group, width) = {
        let iters = self.stack.last_mut()?;
        let width = iters.len();
        let mut group = Vec::with_capacity(width);
        for iter in iters.iter_mut() {
          match iter.next() {
            Some(element) => group.push(element),
            None => break,
          }
        }
        (group, width)
      };
      if group.len() < width {
        // Some argument ran out at this level; aligned iteration is over here.
        self.stack.pop();
        if self.stack.is_empty() {
          return None;
        }
        continue;
      }
      if depth == self.plan.levels.len() {
        return Some(Ok(group));
      }
      if let Err(error) = self.enter(group) {
        self.failed = true;
        return Some(Err(error));
      }
    }
  }
}

// endregion

// region flatten

pub struct FlattenOp {
  source: PlanSource,
  check : bool,
}

impl FlattenOp {
  pub(crate) fn new(source: PlanSource) -> FlattenOp {
    FlattenOp { source, check: true }
  }

  /// Disables validation: faster, and panics on mismatched input.
  pub fn with_check(mut self, check: bool) -> Self {
    self.check = check;
    self
  }

  /// The innermost elements in traversal order.
  pub fn apply<'v>(&self, value: &'v Value) -> Result<Vec<&'v Value>, ShapeError> {
    self.iter(value)?.collect()
  }

  /// Lazy variant of [`apply`](FlattenOp::apply).
  pub fn iter<'v>(&self, value: &'v Value) -> Result<Leaves<'v>, ShapeError> {
    let plan = self.source.resolve(value)?;
    Ok(Leaves::new(plan, self.check, value))
  }

  /// Aligned groups of innermost elements, one per argument, zipped in argument 0's
  /// structure order.
  pub fn apply_multi<'v>(&self, values: &[&'v Value]) -> Result<Vec<Vec<&'v Value>>, ShapeError> {
    self.iter_multi(values)?.collect()
  }

  /// Lazy variant of [`apply_multi`](FlattenOp::apply_multi).
  pub fn iter_multi<'v>(&self, values: &[&'v Value]) -> Result<LeafGroups<'v>, ShapeError> {
    assert!(!values.is_empty(), "flatten needs at least one argument");
    let plan = self.source.resolve(values[0])?;
    Ok(LeafGroups::new(plan, self.check, values))
  }
}

// endregion

// region map

pub struct MapOp {
  source: PlanSource,
  check : bool,
}

impl MapOp {
  pub(crate) fn new(source: PlanSource) -> MapOp {
    MapOp { source, check: true }
  }

  /// Disables validation: faster, and panics on mismatched input.
  pub fn with_check(mut self, check: bool) -> Self {
    self.check = check;
    self
  }

  /// Applies `f` to each innermost element, returning the flat result sequence.
  pub fn apply<T>(
    &self,
    mut f: impl FnMut(&Value) -> T,
    value: &Value,
  ) -> Result<Vec<T>, ShapeError> {
    let plan = self.source.resolve(value)?;
    let mut out = Vec::new();
    for element in Leaves::new(plan, self.check, value) {
      out.push(f(element?));
    }
    Ok(out)
  }

  /// Applies `f` to each aligned group of innermost elements.
  pub fn apply_multi<T>(
    &self,
    mut f: impl FnMut(&[&Value]) -> T,
    values: &[&Value],
  ) -> Result<Vec<T>, ShapeError> {
    assert!(!values.is_empty(), "map needs at least one value argument");
    let plan = self.source.resolve(values[0])?;
    let mut out = Vec::new();
    for group in LeafGroups::new(plan, self.check, values) {
      out.push(f(&group?));
    }
    Ok(out)
  }

  /// Lazy variant of [`apply`](MapOp::apply).
  pub fn iter<'v, T, F>(&self, f: F, value: &'v Value) -> Result<MapIter<'v, F, T>, ShapeError>
  where
    F: FnMut(&'v Value) -> T,
  {
    let plan = self.source.resolve(value)?;
    Ok(MapIter {
      leaves : Leaves::new(plan, self.check, value),
      f,
      _marker: PhantomData,
    })
  }

  /// Lazy variant of [`apply_multi`](MapOp::apply_multi).
  pub fn iter_multi<'v, T, F>(
    &self,
    f: F,
    values: &[&'v Value],
  ) -> Result<MapMultiIter<'v, F, T>, ShapeError>
  where
    F: FnMut(&[&'v Value]) -> T,
  {
    assert!(!values.is_empty(), "map needs at least one value argument");
    let plan = self.source.resolve(values[0])?;
    Ok(MapMultiIter {
      groups : LeafGroups::new(plan, self.check, values),
      f,
      _marker: PhantomData,
    })
  }
}

pub struct MapIter<'v, F, T> {
  leaves : Leaves<'v>,
  f      : F,
  _marker: PhantomData<fn() -> T>,
}

impl<'v, F, T> Iterator for MapIter<'v, F, T>
where
  F: FnMut(&'v Value) -> T,
{
  type Item = Result<T, ShapeError>;

  fn next(&mut self) -> Option<Self::Item> {
    let element = self.leaves.next()?;
    Some(element.map(&mut self.f))
  }
}

pub struct MapMultiIter<'v, F, T> {
  groups : LeafGroups<'v>,
  f      : F,
  _marker: PhantomData<fn() -> T>,
}

impl<'v, F, T> Iterator for MapMultiIter<'v, F, T>
where
  F: FnMut(&[&'v Value]) -> T,
{
  type Item = Result<T, ShapeError>;

  fn next(&mut self) -> Option<Self::Item> {
    let group = self.groups.next()?;
    Some(group.map(|group| (self.f)(&group)))
  }
}

// endregion

// region visit

pub struct VisitOp {
  source: PlanSource,
  check : bool,
}

impl VisitOp {
  pub(crate) fn new(source: PlanSource) -> VisitOp {
    VisitOp { source, check: true }
  }

  /// Disables validation: faster, and panics on mismatched input.
  pub fn with_check(mut self, check: bool) -> Self {
    self.check = check;
    self
  }

  /// Calls `f` on each innermost element for its side effects.
  pub fn apply(&self, mut f: impl FnMut(&Value), value: &Value) -> Result<(), ShapeError> {
    let plan = self.source.resolve(value)?;
    for element in Leaves::new(plan, self.check, value) {
      f(element?);
    }
    Ok(())
  }

  /// Calls `f` on each aligned group of innermost elements.
  pub fn apply_multi(
    &self,
    mut f: impl FnMut(&[&Value]),
    values: &[&Value],
  ) -> Result<(), ShapeError> {
    assert!(!values.is_empty(), "visit needs at least one value argument");
    let plan = self.source.resolve(values[0])?;
    for group in LeafGroups::new(plan, self.check, values) {
      f(&group?);
    }
    Ok(())
  }
}

// endregion

#[cfg(test)]
mod tests {
  use crate::{dict, list, tup};
  use crate::api::hierarchy::Hierarchy;
  use crate::api::operators as ops;
  use crate::api::value::Value;
  use crate::core::shape_error::{MismatchKind, ShapeError};

  fn hier_ldt() -> Hierarchy {
    Hierarchy::builder().list().dict_key("foo").tuple().build().unwrap()
  }

  #[test]
  fn flatten_yields_innermost_elements_in_order() {
    let v = list![
      dict!{ "foo" => tup![1, 2] },
      dict!{ "foo" => tup![3] },
    ];
    let flat = ops::flatten(&hier_ldt()).unwrap();
    let elements = flat.apply(&v).unwrap();
    let expected = [Value::from(1), Value::from(2), Value::from(3)];
    assert_eq!(elements, expected.iter().collect::<Vec<_>>());
  }

  #[test]
  fn flatten_mismatch_is_detected_mid_stream() {
    let v = list![
      dict!{ "foo" => tup![1] },
      dict!{ "bar" => tup![2] },
    ];
    let flat = ops::flatten(&hier_ldt()).unwrap();
    let error = flat.apply(&v).unwrap_err();
    assert!(matches!(
      error,
      ShapeError::Mismatch { kind: MismatchKind::Shape, arg: 0, .. }
    ));
  }

  #[test]
  fn unchecked_flatten_skips_validation() {
    let v = list![dict!{ "foo" => tup![1] }];
    let flat = ops::flatten(&hier_ldt()).unwrap().with_check(false);
    assert_eq!(flat.apply(&v).unwrap().len(), 1);
  }

  #[test]
  fn map_applies_over_aligned_groups() {
    let a = list![dict!{ "foo" => tup![1, 2] }];
    let b = list![dict!{ "foo" => tup![10, 20] }];
    let map = ops::map(&hier_ldt()).unwrap();
    let sums = map
        .apply_multi(
          |group| {
            group
                .iter()
                .map(|v| match v {
                  Value::Atom(crate::Atom::Int(i)) => *i,
                  _ => panic!("expected integer leaves"),
                })
                .sum::<i64>()
          },
          &[&a, &b],
        )
        .unwrap();
    assert_eq!(sums, vec![11, 22]);
  }

  #[test]
  fn multi_arg_mismatch_names_the_argument() {
    let a = list![dict!{ "foo" => tup![1] }];
    let b = list![dict!{ "oops" => tup![1] }];
    let flat = ops::flatten(&hier_ldt()).unwrap();
    let error = flat.apply_multi(&[&a, &b]).unwrap_err();
    assert!(matches!(
      error,
      ShapeError::Mismatch { kind: MismatchKind::Shape, arg: 1, .. }
    ));
  }

  #[test]
  fn multi_arg_length_conflict_is_its_own_error() {
    let hier = Hierarchy::builder().list().build().unwrap();
    let a = list![1, 2, 3];
    let b = list![1, 2];
    let flat = ops::flatten(&hier).unwrap();
    let error = flat.apply_multi(&[&a, &b]).unwrap_err();
    assert!(matches!(
      error,
      ShapeError::Mismatch { kind: MismatchKind::LengthConflict, arg: 1, .. }
    ));
  }

  #[test]
  fn dynamic_dicts_align_by_the_reference_key_order() {
    let hier = Hierarchy::builder().dict().build().unwrap();
    let a = dict!{ "x" => 1, "y" => 2 };
    let b = dict!{ "y" => 20, "x" => 10, "z" => 30 }; // superset, different order
    let flat = ops::flatten(&hier).unwrap();
    let groups = flat.apply_multi(&[&a, &b]).unwrap();
    assert_eq!(groups.len(), 2);
    assert_eq!(groups[0], vec![&Value::from(1), &Value::from(10)]);
    assert_eq!(groups[1], vec![&Value::from(2), &Value::from(20)]);
  }

  #[test]
  fn visit_observes_each_leaf() {
    let v = list![dict!{ "foo" => tup![1, 2] }];
    let mut seen = Vec::new();
    ops::visit(&hier_ldt())
        .unwrap()
        .apply(|leaf| seen.push(leaf.clone()), &v)
        .unwrap();
    assert_eq!(seen, vec![Value::from(1), Value::from(2)]);
  }

  #[test]
  fn inferred_operators_derive_the_shape_from_the_first_argument() {
    let v = list![tup![1, 2], tup![3, 4]];
    let flat = ops::flatten_inferred(2);
    assert_eq!(flat.apply(&v).unwrap().len(), 4);

    // The inferred shape still validates further arguments.
    let w = list![tup![1, 2], list![3, 4]];
    assert!(flat.apply(&w).is_err());
  }

  #[test]
  fn lazy_iteration_is_forward_once() {
    let v = list![tup![1], tup![2]];
    let hier = Hierarchy::builder().list().tuple().build().unwrap();
    let flat = ops::flatten(&hier).unwrap();
    let mut iter = flat.iter(&v).unwrap();
    assert_eq!(iter.next().unwrap().unwrap(), &Value::from(1));
    assert_eq!(iter.next().unwrap().unwrap(), &Value::from(2));
    assert!(iter.next().is_none());
  }

  #[test]
  fn lazy_map_transforms_leaves() {
    let v = list![tup![1, 2]];
    let hier = Hierarchy::builder().list().tuple().build().unwrap();
    let map = ops::map(&hier).unwrap();
    let doubled: Result<Vec<i64>, _> = map
        .iter(
          |leaf| match leaf {
            Value::Atom(crate::Atom::Int(i)) => i * 2,
            _ => panic!("expected integer leaves"),
          },
          &v,
        )
        .unwrap()
        .collect();
    assert_eq!(doubled.unwrap(), vec![2, 4]);
  }
}
