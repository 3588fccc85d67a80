/*!

Shape inference derives a concrete hierarchy from a run-time example value, either to a
requested depth or by filling in the placeholder levels of a partially declared
hierarchy. Inference descends a representative chain: it classifies the current value's
container kind, then picks one element and continues.

A dict infers a *fixed* key set from its observed keys, so the inferred shape accepts
any sibling carrying at least those keys. The exception is an empty dict, which infers a
dynamic-key level, since a fixed key set must be non-empty. Inference cannot see past an
empty sequence; asking it to is a mismatch at that level.

*/

use tracing::trace;

use crate::api::atom::Atom;
use crate::api::hierarchy::{Hierarchy, ShapeNode};
use crate::api::value::Value;
use crate::core::shape_error::{MismatchKind, ShapeError};

/// Classifies one value into a shape node.
fn classify(value: &Value) -> Result<ShapeNode, ShapeError> {
  match value {
    Value::List(_)  => Ok(ShapeNode::list()),
    Value::Tuple(_) => Ok(ShapeNode::tuple()),
    Value::Dict(map) => {
      if map.is_empty() {
        Ok(ShapeNode::dict())
      } else {
        ShapeNode::dict_keys(map.keys().cloned().collect::<Vec<Atom>>())
      }
    }
    Value::Atom(_) => Err(ShapeError::Mismatch {
      kind    : MismatchKind::Shape,
      arg     : 0,
      expected: ShapeNode::placeholder(),
      actual  : value.clone(),
    }),
  }
}

/// One representative element, or an error naming the level if the container is empty.
fn descend<'v>(value: &'v Value, node: &ShapeNode) -> Result<&'v Value, ShapeError> {
  let element = match value {
    Value::List(items) | Value::Tuple(items) => items.first(),
    Value::Dict(map)                         => map.values().next(),
    Value::Atom(_)                           => None,
  };
  element.ok_or_else(|| ShapeError::Mismatch {
    kind    : MismatchKind::Shape,
    arg     : 0,
    expected: node.clone(),
    actual  : value.clone(),
  })
}

/// Infers a fully determined hierarchy of exactly `depth` levels from an example value.
pub(crate) fn from_depth(example: &Value, depth: usize) -> Result<Hierarchy, ShapeError> {
  let mut nodes = Vec::with_capacity(depth);
  let mut current = example;
  for level in 0..depth {
    let node = classify(current)?;
    if level + 1 < depth {
      current = descend(current, &node)?;
    }
    nodes.push(node);
  }
  let hierarchy = Hierarchy::from_nodes(nodes);
  trace!("inferred {} from example at depth {}", hierarchy, depth);
  Ok(hierarchy)
}

/// Resolves the placeholder levels of a partial hierarchy against an example value.
/// Concrete levels are kept as declared; only placeholders are classified.
pub(crate) fn resolve(partial: &Hierarchy, example: &Value) -> Result<Hierarchy, ShapeError> {
  let mut nodes = Vec::with_capacity(partial.len());
  let mut current = example;
  let last = partial.len().saturating_sub(1);
  for (level, declared) in partial.nodes().iter().enumerate() {
    let node = if declared.is_placeholder() {
      classify(current)?
    } else {
      declared.clone()
    };
    if level < last {
      current = descend(current, &node)?;
    }
    nodes.push(node);
  }
  let hierarchy = Hierarchy::from_nodes(nodes);
  trace!("resolved {} to {} from example", partial, hierarchy);
  Ok(hierarchy)
}

#[cfg(test)]
mod tests {
  use crate::{dict, list, tup};
  use crate::api::box_kind::BoxKind;
  use super::*;

  #[test]
  fn infers_kinds_down_a_representative_chain() {
    let v = list![dict!{ "foo" => tup![1, 2] }];
    let hier = from_depth(&v, 3).unwrap();
    assert_eq!(hier.to_string(), r#"List - Dict["foo"] - Tuple"#);
  }

  #[test]
  fn observed_dict_keys_become_a_fixed_key_set() {
    let v = dict!{ "b" => 1, "a" => 2 };
    let hier = from_depth(&v, 1).unwrap();
    assert_eq!(hier.nodes()[0].kind(), Some(BoxKind::DictFixed));
    assert_eq!(hier.to_string(), r#"Dict["a", "b"]"#);
  }

  #[test]
  fn empty_dict_infers_dynamic_keys() {
    let hier = from_depth(&dict!{}, 1).unwrap();
    assert_eq!(hier.nodes()[0].kind(), Some(BoxKind::DictDynamic));
  }

  #[test]
  fn inference_stops_at_atoms_and_empty_sequences() {
    assert!(from_depth(&Value::from(1), 1).is_err());
    assert!(from_depth(&list![], 2).is_err());
    // Depth 1 never descends, so an empty list is fine.
    assert!(from_depth(&list![], 1).is_ok());
  }

  #[test]
  fn resolve_fills_only_placeholders() {
    let partial = Hierarchy::builder().list().placeholder().build().unwrap();
    let resolved = resolve(&partial, &list![tup![1]]).unwrap();
    assert!(resolved.is_determined());
    assert_eq!(resolved.to_string(), "List - Tuple");

    // The declared outer level wins even if the example disagrees deeper down.
    let declared = Hierarchy::builder().list().tuple().build().unwrap();
    let resolved = resolve(&declared, &list![tup![1]]).unwrap();
    assert_eq!(resolved, declared);
  }
}
