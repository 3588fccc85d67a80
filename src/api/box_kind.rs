/*!

Definitions related to box kinds. A box kind is a container variant a shape level can
declare. The caller-facing surface names three kinds (sequence-like `List` and `Tuple`
and map-like `Dict`), and a declared `Dict` specializes into one of three resolved
variants depending on the metadata it is given: a single fixed key, a fixed key set, or
dynamic (unknown) keys.

Each resolved kind carries two static heuristics that the specialization layer uses to
elide work:

 - `naive_iterator`: the container's own element order *is* the canonical iteration
   order, no key translation required (sequences).
 - `shape_implies_length`: once a value has passed this kind's membership check, its
   length is already pinned down, so length comparisons can be skipped. This holds for
   all dict variants: a single key means length 1, a fixed key set means the set's
   size, and a dynamic dict is only ever iterated through a captured key list.

*/

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::abstractions::HashSet;
use crate::api::atom::Atom;
use crate::core::shape_error::ShapeError;

/// The surface name a shape level is declared with, before metadata specialization.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum DeclaredKind {
  List,
  Tuple,
  Dict,
}

/// The resolved container variant of a concrete shape level.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum BoxKind {
  List,
  Tuple,
  DictSingle,
  DictFixed,
  DictDynamic,
}

impl BoxKind {
  pub fn declared(self) -> DeclaredKind {
    match self {
      BoxKind::List  => DeclaredKind::List,
      BoxKind::Tuple => DeclaredKind::Tuple,
      BoxKind::DictSingle | BoxKind::DictFixed | BoxKind::DictDynamic => DeclaredKind::Dict,
    }
  }

  /// The container itself already iterates its elements in canonical order.
  #[inline(always)]
  pub fn naive_iterator(self) -> bool {
    matches!(self, BoxKind::List | BoxKind::Tuple)
  }

  /// Membership implies length, so length mismatch checks are structurally impossible.
  #[inline(always)]
  pub fn shape_implies_length(self) -> bool {
    matches!(
      self,
      BoxKind::DictSingle | BoxKind::DictFixed | BoxKind::DictDynamic
    )
  }
}

/// Normalized metadata for a fixed-key-set dict level: the sorted, duplicate-free key
/// tuple, plus a set for superset membership checks. The two views always agree;
/// equality and hashing go through the tuple alone.
#[derive(Clone)]
pub struct KeySet {
  keys: Arc<[Atom]>,
  set : HashSet<Atom>,
}

impl KeySet {
  /// Normalizes a declared key collection: sorts it and rejects empty or duplicated
  /// key sets.
  pub fn new(mut keys: Vec<Atom>) -> Result<KeySet, ShapeError> {
    if keys.is_empty() {
      return Err(ShapeError::InvalidKeySet {
        reason: "a fixed key set must contain at least one key".to_string(),
      });
    }
    keys.sort();
    if keys.windows(2).any(|pair| pair[0] == pair[1]) {
      return Err(ShapeError::InvalidKeySet {
        reason: format!("duplicate key in fixed key set: {}", keys[0]),
      });
    }
    let set: HashSet<Atom> = keys.iter().cloned().collect();
    Ok(KeySet { keys: keys.into(), set })
  }

  #[inline(always)]
  pub fn keys(&self) -> &Arc<[Atom]> {
    &self.keys
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.keys.len()
  }

  #[inline(always)]
  pub fn contains(&self, key: &Atom) -> bool {
    self.set.contains(key)
  }
}

impl PartialEq for KeySet {
  fn eq(&self, other: &Self) -> bool {
    self.keys == other.keys
  }
}

impl Eq for KeySet {}

impl Hash for KeySet {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.keys.hash(state);
  }
}

/// Per-level metadata, normalized at declaration time so the specialization layer never
/// re-derives it.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Metadata {
  /// Sequences and dynamic-key dicts carry no metadata.
  None,
  /// A single-key dict's key.
  Key(Atom),
  /// A fixed-key-set dict's normalized key set.
  Keys(KeySet),
}
