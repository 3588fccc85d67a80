/*!

Property battery for the operator library, driven by the seeded fixture generator. The
reference implementations here are written directly against `Value` and the declared
node metadata, independent of the specialized plans they check.

*/

use crate::api::box_kind::{BoxKind, Metadata};
use crate::api::hierarchy::{Hierarchy, ShapeNode};
use crate::api::operators as ops;
use crate::api::value::{DictMap, Value};
use crate::core::shape_error::{MismatchKind, ShapeError};
use crate::testing::{Generator, Grid, MutationKind};

const SEEDS: std::ops::Range<u64> = 0..4;

fn candidates() -> Vec<Hierarchy> {
  let b = Hierarchy::builder;
  vec![
    b().tuple().build().unwrap(),
    b().list().build().unwrap(),
    b().dict().build().unwrap(),
    b().dict().list().build().unwrap(),
    b().tuple().list().build().unwrap(),
    b().dict_keys(["foo", "bar"]).build().unwrap(),
    b().list().dict().build().unwrap(),
    b().list().dict_key("foo").dict_key("bar").tuple().build().unwrap(),
    b().list().dict_key("foo").dict().dict_key("bar").tuple().build().unwrap(),
  ]
}

fn kind_of(node: &ShapeNode) -> BoxKind {
  node.kind().expect("battery hierarchies are determined")
}

/// Reference recursive flattening in canonical per-kind order.
fn reference_flatten<'v>(nodes: &[ShapeNode], value: &'v Value) -> Vec<&'v Value> {
  let Some((node, deeper)) = nodes.split_first() else {
    return vec![value];
  };
  let elements: Vec<&Value> = match (kind_of(node), value) {
    (BoxKind::List, Value::List(items)) | (BoxKind::Tuple, Value::Tuple(items)) => {
      items.iter().collect()
    }
    (BoxKind::DictSingle, Value::Dict(map)) => match node.metadata() {
      Metadata::Key(key) => vec![&map[key]],
      _ => unreachable!(),
    },
    (BoxKind::DictFixed, Value::Dict(map)) => match node.metadata() {
      Metadata::Keys(keys) => keys.keys().iter().map(|key| &map[key]).collect(),
      _ => unreachable!(),
    },
    (BoxKind::DictDynamic, Value::Dict(map)) => map.values().collect(),
    _ => panic!("reference value does not conform to {:?}", node),
  };
  elements
      .into_iter()
      .flat_map(|element| reference_flatten(deeper, element))
      .collect()
}

fn permutations(n: usize) -> Vec<Vec<usize>> {
  fn recurse(n: usize, current: &mut Vec<usize>, used: &mut Vec<bool>, out: &mut Vec<Vec<usize>>) {
    if current.len() == n {
      out.push(current.clone());
      return;
    }
    for axis in 0..n {
      if !used[axis] {
        used[axis] = true;
        current.push(axis);
        recurse(n, current, used, out);
        current.pop();
        used[axis] = false;
      }
    }
  }
  let mut out = Vec::new();
  recurse(n, &mut Vec::new(), &mut vec![false; n], &mut out);
  out
}

fn inverse(perm: &[usize]) -> Vec<usize> {
  let mut inv = vec![0; perm.len()];
  for (position, &axis) in perm.iter().enumerate() {
    inv[axis] = position;
  }
  inv
}

/// Reference transpose: read the leaves row-major, then rebuild with permuted levels.
/// A sequence level with nothing below it collapses empty; map levels keep their keys.
fn reference_transpose(nodes: &[ShapeNode], grid: &Grid, perm: &[usize], value: &Value) -> Value {
  let leaves: Vec<Value> = reference_flatten(nodes, value)
      .into_iter()
      .cloned()
      .collect();
  let n = nodes.len();
  let mut strides = vec![1usize; n];
  for level in (0..n.saturating_sub(1)).rev() {
    strides[level] = strides[level + 1] * grid.dims[level + 1];
  }

  fn build_out(
    nodes: &[ShapeNode],
    grid: &Grid,
    perm: &[usize],
    leaves: &[Value],
    strides: &[usize],
    out_level: usize,
    in_index: &mut Vec<usize>,
  ) -> Value {
    let n = nodes.len();
    if out_level == n {
      let flat: usize = (0..n).map(|level| in_index[level] * strides[level]).sum();
      return leaves[flat].clone();
    }
    let source = perm[out_level];
    let remaining: usize = (out_level..n).map(|k| grid.dims[perm[k]]).product();
    let child = |i: usize, in_index: &mut Vec<usize>| {
      in_index[source] = i;
      build_out(nodes, grid, perm, leaves, strides, out_level + 1, in_index)
    };
    match kind_of(&nodes[source]) {
      BoxKind::List => {
        let dim = if remaining == 0 { 0 } else { grid.dims[source] };
        Value::List((0..dim).map(|i| child(i, in_index)).collect())
      }
      BoxKind::Tuple => {
        let dim = if remaining == 0 { 0 } else { grid.dims[source] };
        Value::Tuple((0..dim).map(|i| child(i, in_index)).collect())
      }
      BoxKind::DictDynamic if remaining == 0 => Value::Dict(DictMap::default()),
      _ => {
        let keys = match &grid.keys[source] {
          Some(keys) => keys.clone(),
          None => unreachable!("map levels always record their keys"),
        };
        let mut map = DictMap::default();
        for (i, key) in keys.into_iter().enumerate() {
          let item = child(i, in_index);
          map.insert(key, item);
        }
        Value::Dict(map)
      }
    }
  }

  build_out(nodes, grid, perm, &leaves, &strides, 0, &mut vec![0usize; n])
}

#[test]
fn isa_accepts_generated_and_rejects_mutations() {
  for hierarchy in candidates() {
    let isa = ops::isa(&hierarchy).unwrap();
    for seed in SEEDS {
      let mut generator = Generator::new(seed);
      let value = generator.build(&hierarchy);
      assert!(isa.apply(&value), "{}: {} should conform", hierarchy, value);

      let mutated = generator
          .counterpart(&hierarchy, &value, MutationKind::Hierarchy.into())
          .unwrap();
      assert!(
        !isa.apply(&mutated),
        "{}: {} should not conform",
        hierarchy,
        mutated
      );
    }
  }
}

#[test]
fn flatten_matches_the_reference() {
  for hierarchy in candidates() {
    let flatten = ops::flatten(&hierarchy).unwrap();
    for seed in SEEDS {
      let mut generator = Generator::new(seed);
      let value = generator.build(&hierarchy);
      let flat = flatten.apply(&value).unwrap();
      let expected = reference_flatten(hierarchy.nodes(), &value);
      assert_eq!(flat, expected, "{}: {}", hierarchy, value);
    }
  }
}

#[test]
fn map_equals_flatten_with_the_function_applied() {
  for hierarchy in candidates() {
    let map = ops::map(&hierarchy).unwrap();
    let flatten = ops::flatten(&hierarchy).unwrap();
    for seed in SEEDS {
      let mut generator = Generator::new(seed);
      let value = generator.build(&hierarchy);
      let mapped = map.apply(|leaf| format!("<{}>", leaf), &value).unwrap();
      let expected: Vec<String> = flatten
          .apply(&value)
          .unwrap()
          .into_iter()
          .map(|leaf| format!("<{}>", leaf))
          .collect();
      assert_eq!(mapped, expected);
    }
  }
}

#[test]
fn visit_observes_what_flatten_yields() {
  for hierarchy in candidates() {
    let visit = ops::visit(&hierarchy).unwrap();
    let flatten = ops::flatten(&hierarchy).unwrap();
    for seed in SEEDS {
      let mut generator = Generator::new(seed);
      let value = generator.build(&hierarchy);
      let mut seen: Vec<Value> = Vec::new();
      visit.apply(|leaf| seen.push(leaf.clone()), &value).unwrap();
      let expected: Vec<Value> = flatten
          .apply(&value)
          .unwrap()
          .into_iter()
          .cloned()
          .collect();
      assert_eq!(seen, expected);
    }
  }
}

#[test]
fn multi_argument_traversal_zips_same_skeleton_values() {
  for hierarchy in candidates() {
    let flatten = ops::flatten(&hierarchy).unwrap();
    for seed in SEEDS {
      let mut generator = Generator::new(seed);
      let value = generator.build(&hierarchy);
      let sibling = generator.like(&hierarchy, &value);

      let groups = flatten.apply_multi(&[&value, &sibling]).unwrap();
      let left = reference_flatten(hierarchy.nodes(), &value);
      let right = reference_flatten(hierarchy.nodes(), &sibling);
      assert_eq!(groups.len(), left.len());
      for (group, (a, b)) in groups.iter().zip(left.iter().zip(right.iter())) {
        assert_eq!(group.as_slice(), &[*a, *b][..]);
      }
    }
  }
}

#[test]
fn multi_argument_shape_mismatch_names_the_argument() {
  for hierarchy in candidates() {
    let flatten = ops::flatten(&hierarchy).unwrap();
    for seed in SEEDS {
      let mut generator = Generator::new(seed);
      let value = generator.build(&hierarchy);
      let mutated = generator
          .counterpart(&hierarchy, &value, MutationKind::Hierarchy.into())
          .unwrap();
      let error = flatten.apply_multi(&[&value, &mutated]).unwrap_err();
      match error {
        ShapeError::Mismatch { kind: MismatchKind::Shape, arg: 1, .. } => {}
        other => panic!("{}: expected a shape mismatch for argument 1, got {}", hierarchy, other),
      }
    }
  }
}

#[test]
fn multi_argument_length_mismatch_is_detected() {
  for hierarchy in candidates() {
    let flatten = ops::flatten(&hierarchy).unwrap();
    for seed in SEEDS {
      let mut generator = Generator::new(seed);
      let value = generator.build(&hierarchy);
      let Some(shorter) = generator.counterpart(&hierarchy, &value, MutationKind::Length.into())
      else {
        continue; // no sequence level to mutate
      };
      let error = flatten.apply_multi(&[&value, &shorter]).unwrap_err();
      match error {
        ShapeError::Mismatch { kind: MismatchKind::LengthConflict, arg: 1, .. } => {}
        other => panic!("{}: expected a length conflict for argument 1, got {}", hierarchy, other),
      }
    }
  }
}

#[test]
fn transform_matches_the_reference_for_every_permutation() {
  for hierarchy in candidates() {
    if hierarchy.len() > 4 {
      continue;
    }
    let nodes = hierarchy.nodes();
    for perm in permutations(hierarchy.len()) {
      let zero_levels: Vec<Option<usize>> = std::iter::once(None)
          .chain(
            nodes
                .iter()
                .enumerate()
                .filter(|(_, node)| {
                  matches!(kind_of(node), BoxKind::List | BoxKind::Tuple)
                })
                .map(|(level, _)| Some(level)),
          )
          .collect();
      for zero_level in zero_levels {
        for seed in SEEDS {
          let mut generator = Generator::new(seed);
          let (value, grid) = generator.build_grid(&hierarchy, zero_level);
          let transform = ops::transform(&hierarchy, perm.as_slice()).unwrap();
          let out = transform.apply(&value).unwrap();
          let expected = reference_transpose(nodes, &grid, &perm, &value);
          assert_eq!(
            out, expected,
            "{}: perm {:?}, zero {:?}, value {}",
            hierarchy, perm, zero_level, value
          );
        }
      }
    }
  }
}

#[test]
fn transform_round_trips_through_the_inverse() {
  for hierarchy in candidates() {
    if hierarchy.len() > 4 {
      continue;
    }
    for perm in permutations(hierarchy.len()) {
      for seed in SEEDS {
        let mut generator = Generator::new(seed);
        let (value, _) = generator.build_grid(&hierarchy, None);
        let forward = ops::transform(&hierarchy, perm.as_slice())
            .unwrap()
            .apply(&value)
            .unwrap();

        let permuted_nodes: Vec<ShapeNode> =
            perm.iter().map(|&axis| hierarchy.nodes()[axis].clone()).collect();
        let permuted_hierarchy = Hierarchy::from_nodes(permuted_nodes);
        let back = ops::transform(&permuted_hierarchy, inverse(&perm).as_slice())
            .unwrap()
            .apply(&forward)
            .unwrap();
        assert_eq!(back, value, "{}: perm {:?}", hierarchy, perm);
      }
    }
  }
}

#[test]
fn unchecked_transform_still_restructures_conforming_input() {
  let hierarchy = Hierarchy::builder().list().tuple().build().unwrap();
  let mut generator = Generator::new(11);
  let (value, grid) = generator.build_grid(&hierarchy, None);
  let checked = ops::transform(&hierarchy, &[1, 0]).unwrap().apply(&value).unwrap();
  let unchecked = ops::transform(&hierarchy, &[1, 0])
      .unwrap()
      .with_check(false)
      .apply(&value)
      .unwrap();
  assert_eq!(checked, unchecked);
  assert_eq!(checked, reference_transpose(hierarchy.nodes(), &grid, &[1, 0], &value));
}
