/*!

`Facts` is the proof record of the specialization engine: the structural facts about one
level of the *reference* argument, captured once per traversal pass and reused by every
later step that needs them. Re-checking a sibling argument, iterating it in the reference
key order, or rebuilding a container during a permutation all consume the same captured
record instead of re-discovering structure.

Two historical "proof kinds" are fungible exactly when they capture the same fact, so
the record stores each fact once: a length, and (for map levels) the key order. That is
the structural-equality form of proof deduplication.

*/

use std::sync::Arc;

use crate::api::atom::Atom;
use crate::api::value::Value;

/// Captured structural facts about one level of the reference argument.
#[derive(Clone)]
pub(crate) struct Facts {
  /// Cardinality at this level.
  pub len : usize,
  /// Key order for map levels; `None` for sequences, whose indices are positional.
  pub keys: Option<Arc<[Atom]>>,
}

impl Facts {
  /// Iterates this level's indices in canonical order: positions for sequences, keys in
  /// captured order for maps.
  pub fn index_iter(&self) -> FactIndexIter<'_> {
    match &self.keys {
      None       => FactIndexIter::Positions(0..self.len),
      Some(keys) => FactIndexIter::Keys(keys.iter()),
    }
  }
}

/// The ordered index/key set of one captured level.
pub(crate) enum FactIndexIter<'a> {
  Positions(std::ops::Range<usize>),
  Keys(std::slice::Iter<'a, Atom>),
}

impl<'a> Iterator for FactIndexIter<'a> {
  type Item = IndexRef<'a>;

  fn next(&mut self) -> Option<IndexRef<'a>> {
    match self {
      FactIndexIter::Positions(range) => range.next().map(IndexRef::Pos),
      FactIndexIter::Keys(keys)       => keys.next().map(IndexRef::Key),
    }
  }
}

/// A single captured index: a position into a sequence or a key into a map.
#[derive(Copy, Clone)]
pub(crate) enum IndexRef<'a> {
  Pos(usize),
  Key(&'a Atom),
}

/// Random access by captured index. Panics on a value that does not hold the index;
/// that only happens when validation was explicitly skipped.
pub(crate) fn get_item<'v>(value: &'v Value, index: &IndexRef<'_>) -> &'v Value {
  match (value, index) {
    (Value::List(items), IndexRef::Pos(i)) | (Value::Tuple(items), IndexRef::Pos(i)) => {
      &items[*i]
    }
    (Value::Dict(map), IndexRef::Key(key)) => match map.get(*key) {
      Some(item) => item,
      None => panic!("value {} does not hold captured key {}", value, key),
    },
    _ => panic!("captured index does not apply to value {}", value),
  }
}
