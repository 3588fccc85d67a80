/*!

Seeded fixture generation for the operator test battery. A `Generator` builds values
that conform to a hierarchy (ragged ones for traversal tests, rectangular grids for
permutation tests) together with mutated counterparts: a *shape* mutation changes a
container kind somewhere in the tree, a *length* mutation changes one sequence's
cardinality. Property tests feed the conforming value to an operator and expect success,
then feed a counterpart and expect the matching rejection.

Everything is driven by an explicitly seeded generator, so a failing case reproduces
from its seed.

*/

use enumflags2::{bitflags, BitFlags};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::api::atom::Atom;
use crate::api::box_kind::{BoxKind, Metadata};
use crate::api::hierarchy::{Hierarchy, ShapeNode};
use crate::api::value::{DictMap, Value};

/// The ways a counterpart can differ from its reference value.
#[bitflags]
#[repr(u8)]
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MutationKind {
  /// A container kind differs somewhere.
  Hierarchy,
  /// A sequence length differs somewhere.
  Length,
}

pub type Mutations = BitFlags<MutationKind>;

/// A description of one rectangular fixture: the per-level cardinalities and, for map
/// levels, the key order the fixture was built with.
#[derive(Clone)]
pub struct Grid {
  pub dims: Vec<usize>,
  pub keys: Vec<Option<Vec<Atom>>>,
}

pub struct Generator {
  rng: StdRng,
}

impl Generator {
  pub fn new(seed: u64) -> Generator {
    Generator { rng: StdRng::seed_from_u64(seed) }
  }

  // region Atoms

  pub fn atom(&mut self) -> Atom {
    match self.rng.random_range(0..4u8) {
      0 => Atom::Int(self.rng.random_range(0i64..1 << 16)),
      1 => Atom::from(self.rng.random_range(0i64..1 << 16) as f64),
      2 => Atom::Str(crate::abstractions::IString::from(self.word().as_str())),
      _ => Atom::Bytes(self.word().into_bytes().into()),
    }
  }

  fn word(&mut self) -> String {
    (0..8)
        .map(|_| self.rng.random_range(b'a'..=b'z') as char)
        .collect()
  }

  fn key_set(&mut self) -> Vec<Atom> {
    let count = self.rng.random_range(1..=3usize);
    let mut keys = Vec::with_capacity(count);
    while keys.len() < count {
      let key = Atom::Str(crate::abstractions::IString::from(self.word().as_str()));
      if !keys.contains(&key) {
        keys.push(key);
      }
    }
    keys
  }

  // endregion

  // region Conforming values

  /// A conforming, possibly ragged value: each sequence picks its own length.
  pub fn build(&mut self, hierarchy: &Hierarchy) -> Value {
    self.build_levels(hierarchy.nodes())
  }

  fn build_levels(&mut self, nodes: &[ShapeNode]) -> Value {
    let Some((node, deeper)) = nodes.split_first() else {
      return Value::Atom(self.atom());
    };
    match required_kind(node) {
      BoxKind::List => {
        let len = self.rng.random_range(1..=3usize);
        Value::List((0..len).map(|_| self.build_levels(deeper)).collect())
      }
      BoxKind::Tuple => {
        let len = self.rng.random_range(1..=3usize);
        Value::Tuple((0..len).map(|_| self.build_levels(deeper)).collect())
      }
      BoxKind::DictSingle | BoxKind::DictFixed => {
        let mut map = DictMap::default();
        for key in declared_keys(node) {
          map.insert(key.clone(), self.build_levels(deeper));
        }
        Value::Dict(map)
      }
      BoxKind::DictDynamic => {
        let mut map = DictMap::default();
        for key in self.key_set() {
          map.insert(key, self.build_levels(deeper));
        }
        Value::Dict(map)
      }
    }
  }

  /// A fresh value with the same skeleton (lengths and keys everywhere) as `reference`
  /// but new leaves. Aligned multi-argument traversal accepts it alongside the
  /// reference.
  pub fn like(&mut self, hierarchy: &Hierarchy, reference: &Value) -> Value {
    self.like_levels(hierarchy.nodes(), reference)
  }

  fn like_levels(&mut self, nodes: &[ShapeNode], reference: &Value) -> Value {
    let Some((_, deeper)) = nodes.split_first() else {
      return Value::Atom(self.atom());
    };
    match reference {
      Value::List(items) => {
        Value::List(items.iter().map(|item| self.like_levels(deeper, item)).collect())
      }
      Value::Tuple(items) => {
        Value::Tuple(items.iter().map(|item| self.like_levels(deeper, item)).collect())
      }
      Value::Dict(map) => {
        let mut out = DictMap::default();
        for (key, item) in map.iter() {
          out.insert(key.clone(), self.like_levels(deeper, item));
        }
        Value::Dict(out)
      }
      Value::Atom(_) => Value::Atom(self.atom()),
    }
  }

  /// A conforming rectangular grid: one cardinality per level, shared by every
  /// container at that level, with `zero_level` (a sequence level) forced empty when
  /// given. Returns the value and its grid description.
  pub fn build_grid(&mut self, hierarchy: &Hierarchy, zero_level: Option<usize>) -> (Value, Grid) {
    let nodes = hierarchy.nodes();
    let mut dims = Vec::with_capacity(nodes.len());
    let mut keys: Vec<Option<Vec<Atom>>> = Vec::with_capacity(nodes.len());
    for (level, node) in nodes.iter().enumerate() {
      match required_kind(node) {
        BoxKind::List | BoxKind::Tuple => {
          let dim = if zero_level == Some(level) {
            0
          } else {
            self.rng.random_range(1..=3usize)
          };
          dims.push(dim);
          keys.push(None);
        }
        BoxKind::DictSingle | BoxKind::DictFixed => {
          let declared: Vec<Atom> = declared_keys(node).to_vec();
          dims.push(declared.len());
          keys.push(Some(declared));
        }
        BoxKind::DictDynamic => {
          let generated = self.key_set();
          dims.push(generated.len());
          keys.push(Some(generated));
        }
      }
    }
    let grid = Grid { dims, keys };
    let value = self.grid_levels(nodes, &grid, 0);
    (value, grid)
  }

  fn grid_levels(&mut self, nodes: &[ShapeNode], grid: &Grid, level: usize) -> Value {
    if level == nodes.len() {
      return Value::Atom(self.atom());
    }
    // A sequence with nothing below it collapses outright; map levels keep their keys
    // over collapsed children, and a dynamic dict collapses to no keys at all.
    let remaining: usize = grid.dims[level..].iter().product();
    match required_kind(&nodes[level]) {
      BoxKind::List => {
        let dim = if remaining == 0 { 0 } else { grid.dims[level] };
        Value::List((0..dim).map(|_| self.grid_levels(nodes, grid, level + 1)).collect())
      }
      BoxKind::Tuple => {
        let dim = if remaining == 0 { 0 } else { grid.dims[level] };
        Value::Tuple((0..dim).map(|_| self.grid_levels(nodes, grid, level + 1)).collect())
      }
      BoxKind::DictDynamic if remaining == 0 => Value::Dict(DictMap::default()),
      _ => {
        let mut map = DictMap::default();
        let keys = match &grid.keys[level] {
          Some(keys) => keys.clone(),
          None => unreachable!("map levels always record their keys"),
        };
        for key in keys {
          map.insert(key, self.grid_levels(nodes, grid, level + 1));
        }
        Value::Dict(map)
      }
    }
  }

  // endregion

  // region Counterparts

  /// A counterpart differing from `reference` in the requested ways, or `None` when the
  /// hierarchy offers no site for a requested mutation (e.g. a length mutation with no
  /// sequence level).
  pub fn counterpart(
    &mut self,
    hierarchy: &Hierarchy,
    reference: &Value,
    mutations: Mutations,
  ) -> Option<Value> {
    let mut out = self.like(hierarchy, reference);
    if mutations.contains(MutationKind::Length) {
      out = self.mutate_length(hierarchy, &out)?;
    }
    if mutations.contains(MutationKind::Hierarchy) {
      out = self.mutate_shape(hierarchy, &out);
    }
    Some(out)
  }

  /// Swaps the container kind at a random level, along the first-position path.
  pub fn mutate_shape(&mut self, hierarchy: &Hierarchy, reference: &Value) -> Value {
    let level = self.rng.random_range(0..hierarchy.len());
    mutate_first_path(reference, level, &mut |victim| wrong_kind(victim))
  }

  /// Drops one element from a sequence level, along the first-position path. `None`
  /// when every level's length is implied by its shape.
  pub fn mutate_length(&mut self, hierarchy: &Hierarchy, reference: &Value) -> Option<Value> {
    let candidates: Vec<usize> = hierarchy
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, node)| {
          matches!(required_kind(node), BoxKind::List | BoxKind::Tuple)
        })
        .map(|(level, _)| level)
        .collect();
    if candidates.is_empty() {
      return None;
    }
    let level = candidates[self.rng.random_range(0..candidates.len())];
    Some(mutate_first_path(reference, level, &mut |victim| match victim {
      Value::List(items) => Value::List(items[..items.len() - 1].to_vec()),
      Value::Tuple(items) => Value::Tuple(items[..items.len() - 1].to_vec()),
      other => other.clone(),
    }))
  }

  // endregion
}

fn required_kind(node: &ShapeNode) -> BoxKind {
  match node.kind() {
    Some(kind) => kind,
    None => panic!("fixture generation needs a determined hierarchy"),
  }
}

fn declared_keys(node: &ShapeNode) -> &[Atom] {
  match node.metadata() {
    Metadata::Key(key)   => std::slice::from_ref(key),
    Metadata::Keys(keys) => keys.keys(),
    Metadata::None       => &[],
  }
}

/// Rebuilds `value` with `mutate` applied to the container reached by descending
/// `level` first positions.
fn mutate_first_path(
  value: &Value,
  level: usize,
  mutate: &mut dyn FnMut(&Value) -> Value,
) -> Value {
  if level == 0 {
    return mutate(value);
  }
  match value {
    Value::List(items) => {
      let mut items = items.clone();
      items[0] = mutate_first_path(&items[0], level - 1, mutate);
      Value::List(items)
    }
    Value::Tuple(items) => {
      let mut items = items.clone();
      items[0] = mutate_first_path(&items[0], level - 1, mutate);
      Value::Tuple(items)
    }
    Value::Dict(map) => {
      let mut map = map.clone();
      if let Some((_, item)) = map.iter_mut().next() {
        *item = mutate_first_path(item, level - 1, mutate);
      }
      Value::Dict(map)
    }
    Value::Atom(_) => value.clone(),
  }
}

/// A container of a different kind holding nothing recognizable.
fn wrong_kind(value: &Value) -> Value {
  match value {
    Value::List(items)  => Value::Tuple(items.clone()),
    Value::Tuple(items) => Value::List(items.clone()),
    Value::Dict(_)      => Value::List(vec![]),
    Value::Atom(_)      => Value::List(vec![]),
  }
}
