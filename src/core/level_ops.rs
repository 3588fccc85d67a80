/*!

`LevelOps` is the resolved primitive-operation table for one hierarchy level: the box
kind fused with its normalized metadata, exposing exactly the primitives the operator
templates compose. Specialization resolves a `LevelOps` per level once, at synthesis
time; invocation dispatches by `match` on the variant, with no metadata normalization and
no kind lookup left on the hot path.

The `*2` primitives are the proof-consuming re-check/re-iterate/rebuild forms: they take
the `Facts` captured from the reference argument. A kind with no cheaper proof-based form
falls back to the plain primitive, which is the "undefined primitive" rule: only the
dynamic-key dict defines a distinct `is_a2` (superset of the captured keys) and a
distinct keyed iteration.

Primitives panic when handed a value of the wrong run-time kind. A checked operator can
never trigger that; the `check = false` fast path deliberately can, and crashes rather
than producing silently wrong output.

*/

use std::sync::Arc;

use crate::api::atom::Atom;
use crate::api::box_kind::{BoxKind, KeySet, Metadata};
use crate::api::hierarchy::ShapeNode;
use crate::api::value::{DictMap, Value};
use crate::core::facts::Facts;
use crate::core::shape_error::ShapeError;

#[derive(Clone)]
pub(crate) enum LevelOps {
  List,
  Tuple,
  DictSingle { key: Atom, key_tuple: Arc<[Atom]> },
  DictFixed { keys: KeySet },
  DictDynamic,
}

impl LevelOps {
  /// Resolves the primitive table for a concrete shape node.
  pub fn for_node(node: &ShapeNode) -> Result<LevelOps, ShapeError> {
    let kind = node.kind().ok_or_else(|| ShapeError::Unresolved {
      reason: format!("level {} must be resolved before specialization", node),
    })?;
    let ops = match (kind, node.metadata()) {
      (BoxKind::List, _)  => LevelOps::List,
      (BoxKind::Tuple, _) => LevelOps::Tuple,
      (BoxKind::DictSingle, Metadata::Key(key)) => LevelOps::DictSingle {
        key      : key.clone(),
        key_tuple: Arc::from(vec![key.clone()]),
      },
      (BoxKind::DictFixed, Metadata::Keys(keys)) => LevelOps::DictFixed { keys: keys.clone() },
      (BoxKind::DictDynamic, _) => LevelOps::DictDynamic,
      (kind, _) => panic!("shape node of kind {:?} carries inconsistent metadata", kind),
    };
    Ok(ops)
  }

  pub fn kind(&self) -> BoxKind {
    match self {
      LevelOps::List            => BoxKind::List,
      LevelOps::Tuple           => BoxKind::Tuple,
      LevelOps::DictSingle { .. } => BoxKind::DictSingle,
      LevelOps::DictFixed { .. }  => BoxKind::DictFixed,
      LevelOps::DictDynamic     => BoxKind::DictDynamic,
    }
  }

  #[inline(always)]
  pub fn naive_iterator(&self) -> bool {
    self.kind().naive_iterator()
  }

  #[inline(always)]
  pub fn shape_implies_length(&self) -> bool {
    self.kind().shape_implies_length()
  }

  // region Membership

  /// Does the value's run-time kind (and, for maps, key coverage) satisfy this level?
  pub fn is_a(&self, value: &Value) -> bool {
    match (self, value) {
      (LevelOps::List, Value::List(_))   => true,
      (LevelOps::Tuple, Value::Tuple(_)) => true,
      (LevelOps::DictSingle { key, .. }, Value::Dict(map)) => map.contains_key(key),
      (LevelOps::DictFixed { keys }, Value::Dict(map)) => {
        keys.keys().iter().all(|key| map.contains_key(key))
      }
      (LevelOps::DictDynamic, Value::Dict(_)) => true,
      _ => false,
    }
  }

  /// Cheaper membership re-check against captured facts. Falls back to `is_a` for kinds
  /// with no proof-based form.
  pub fn is_a2(&self, value: &Value, facts: &Facts) -> bool {
    match self {
      LevelOps::DictDynamic => match (value, &facts.keys) {
        (Value::Dict(map), Some(keys)) => keys.iter().all(|key| map.contains_key(key)),
        (Value::Dict(_), None)         => true,
        _ => false,
      },
      _ => self.is_a(value),
    }
  }

  // endregion

  // region Iteration

  /// The element values in canonical per-kind order.
  pub fn iterate<'v>(&self, value: &'v Value) -> ElemIter<'v> {
    match (self, value) {
      (LevelOps::List, Value::List(items)) | (LevelOps::Tuple, Value::Tuple(items)) => {
        ElemIter::Slice(items.iter())
      }
      (LevelOps::DictSingle { key, .. }, Value::Dict(map)) => {
        ElemIter::One(std::iter::once(expect_key(map, key, value)))
      }
      (LevelOps::DictFixed { keys }, Value::Dict(map)) => ElemIter::Keyed {
        map,
        keys: KeyCursor::new(keys.keys().clone()),
      },
      (LevelOps::DictDynamic, Value::Dict(map)) => ElemIter::Values(map.values()),
      _ => panic!("cannot iterate {} as {:?}", value, self.kind()),
    }
  }

  /// Iterate using the captured key order, so sibling arguments align with the
  /// reference argument without re-discovering keys.
  pub fn iterate2<'v>(&self, value: &'v Value, facts: &Facts) -> ElemIter<'v> {
    match self {
      LevelOps::DictDynamic => match (value, &facts.keys) {
        (Value::Dict(map), Some(keys)) => ElemIter::Keyed {
          map,
          keys: KeyCursor::new(keys.clone()),
        },
        _ => self.iterate(value),
      },
      _ => self.iterate(value),
    }
  }

  // endregion

  // region Construction

  /// Builds a new container of this kind from produced elements, where the kind's
  /// metadata alone determines the pairing. `None` for the dynamic-key dict, which
  /// needs captured keys.
  pub fn new_from_iter(&self, items: Vec<Value>) -> Option<Value> {
    match self {
      LevelOps::List  => Some(Value::List(items)),
      LevelOps::Tuple => Some(Value::Tuple(items)),
      LevelOps::DictSingle { key_tuple, .. } => Some(zip_into_dict(key_tuple, items)),
      LevelOps::DictFixed { keys }           => Some(zip_into_dict(keys.keys(), items)),
      LevelOps::DictDynamic => None,
    }
  }

  /// Builds a new container of this kind, pairing elements with the captured key order
  /// where the kind needs one.
  pub fn new_from_iter2(&self, items: Vec<Value>, facts: &Facts) -> Value {
    match self {
      LevelOps::DictDynamic => {
        let keys = facts
            .keys
            .as_ref()
            .unwrap_or_else(|| panic!("dynamic dict rebuild requires captured keys"));
        zip_into_dict(keys, items)
      }
      // Every other kind pairs from its own metadata.
      _ => match self.new_from_iter(items) {
        Some(value) => value,
        None => unreachable!(),
      },
    }
  }

  /// Wraps a single element in a container of this kind. `None` where undefined: a
  /// dynamic dict has no key to file the element under, and a fixed key set pins more
  /// than one slot.
  pub fn new_single(&self, item: Value) -> Option<Value> {
    match self {
      LevelOps::List  => Some(Value::List(vec![item])),
      LevelOps::Tuple => Some(Value::Tuple(vec![item])),
      LevelOps::DictSingle { key, .. } => {
        let mut map = DictMap::default();
        map.insert(key.clone(), item);
        Some(Value::Dict(map))
      }
      LevelOps::DictFixed { .. } | LevelOps::DictDynamic => None,
    }
  }

  /// A canonical empty/placeholder instance of this kind, used when an emptied level
  /// substitutes for real data. Map dummies carry `Unit` fillers that are never
  /// inspected.
  pub fn dummy(&self) -> Value {
    match self {
      LevelOps::List  => Value::List(Vec::new()),
      LevelOps::Tuple => Value::Tuple(Vec::new()),
      LevelOps::DictSingle { key, .. } => {
        let mut map = DictMap::default();
        map.insert(key.clone(), Value::Atom(Atom::Unit));
        Value::Dict(map)
      }
      LevelOps::DictFixed { keys } => {
        let mut map = DictMap::default();
        for key in keys.keys().iter() {
          map.insert(key.clone(), Value::Atom(Atom::Unit));
        }
        Value::Dict(map)
      }
      LevelOps::DictDynamic => Value::Dict(DictMap::default()),
    }
  }

  // endregion

  // region Access

  /// Cardinality at this level. Constant where the metadata implies it.
  pub fn length(&self, value: &Value) -> usize {
    match (self, value) {
      (LevelOps::List, Value::List(items)) | (LevelOps::Tuple, Value::Tuple(items)) => {
        items.len()
      }
      (LevelOps::DictSingle { .. }, Value::Dict(_)) => 1,
      (LevelOps::DictFixed { keys }, Value::Dict(_)) => keys.len(),
      (LevelOps::DictDynamic, Value::Dict(map)) => map.len(),
      _ => panic!("cannot take the length of {} as {:?}", value, self.kind()),
    }
  }

  /// Cardinality re-check against captured facts. No kind defines a cheaper
  /// proof-based form, so this is the fallback for all of them.
  #[inline(always)]
  pub fn length2(&self, value: &Value, _facts: &Facts) -> usize {
    self.length(value)
  }

  /// One representative element, used for shape inference and representative-chain
  /// probing. Panics on an empty container; callers test `length` first.
  pub fn pick<'v>(&self, value: &'v Value) -> &'v Value {
    match (self, value) {
      (LevelOps::List, Value::List(items)) | (LevelOps::Tuple, Value::Tuple(items)) => {
        &items[0]
      }
      (LevelOps::DictSingle { key, .. }, Value::Dict(map)) => expect_key(map, key, value),
      (LevelOps::DictFixed { keys }, Value::Dict(map)) => {
        expect_key(map, &keys.keys()[0], value)
      }
      (LevelOps::DictDynamic, Value::Dict(map)) => match map.values().next() {
        Some(item) => item,
        None => panic!("cannot pick a representative from an empty dict"),
      },
      _ => panic!("cannot pick from {} as {:?}", value, self.kind()),
    }
  }

  /// Captures this level's structural facts from the reference argument: the proof
  /// producer. The length and (for map kinds) the key order are each computed once here
  /// and reused by every `*2` primitive in the pass.
  pub fn capture_facts(&self, value: &Value) -> Facts {
    let keys = match (self, value) {
      (LevelOps::DictSingle { key_tuple, .. }, _) => Some(key_tuple.clone()),
      (LevelOps::DictFixed { keys }, _)           => Some(keys.keys().clone()),
      (LevelOps::DictDynamic, Value::Dict(map))   => {
        Some(map.keys().cloned().collect::<Vec<Atom>>().into())
      }
      _ => None,
    };
    Facts { len: self.length(value), keys }
  }

  // endregion
}

fn expect_key<'v>(map: &'v DictMap, key: &Atom, value: &Value) -> &'v Value {
  match map.get(key) {
    Some(item) => item,
    None => panic!("value {} does not hold required key {}", value, key),
  }
}

fn zip_into_dict(keys: &Arc<[Atom]>, items: Vec<Value>) -> Value {
  let mut map = DictMap::default();
  for (key, item) in keys.iter().zip(items) {
    map.insert(key.clone(), item);
  }
  Value::Dict(map)
}

/// Cursor over a shared key tuple, owned by the iterator so keyed iteration does not
/// borrow the metadata it came from.
pub(crate) struct KeyCursor {
  keys: Arc<[Atom]>,
  at  : usize,
}

impl KeyCursor {
  fn new(keys: Arc<[Atom]>) -> KeyCursor {
    KeyCursor { keys, at: 0 }
  }

  fn next(&mut self) -> Option<&Atom> {
    let key = self.keys.get(self.at)?;
    self.at += 1;
    Some(key)
  }
}

/// The element sequence of one container, in canonical per-kind order.
pub(crate) enum ElemIter<'a> {
  Slice(std::slice::Iter<'a, Value>),
  Values(indexmap::map::Values<'a, Atom, Value>),
  Keyed { map: &'a DictMap, keys: KeyCursor },
  One(std::iter::Once<&'a Value>),
}

impl<'a> Iterator for ElemIter<'a> {
  type Item = &'a Value;

  fn next(&mut self) -> Option<&'a Value> {
    match self {
      ElemIter::Slice(iter)  => iter.next(),
      ElemIter::Values(iter) => iter.next(),
      ElemIter::Keyed { map, keys } => {
        let key = keys.next()?;
        match map.get(key) {
          Some(item) => Some(item),
          None => panic!("container lost captured key {} during iteration", key),
        }
      }
      ElemIter::One(iter) => iter.next(),
    }
  }
}
