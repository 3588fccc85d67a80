/*!

Permutation specs and their cycle decomposition.

A permutation can arrive three ways: a complete permutation of `{0, …, L-1}`; a partial
spec that lists, in order, the values placed at its sorted mentioned positions (so
`[3, 1]` swaps axes 1 and 3 of a depth-4 shape); or a letter equation like
`"abc -> bca"`. All three normalize to a complete permutation and are validated as a
bijection.

`find_cycles` translates a permutation into the minimal ordered work list `transform`
executes: trailing fixed points (with no target reshaping attached) are trimmed as a
trivial suffix; an adjacent transposition at the trimmed edge becomes a `Swap` cycle,
handled by zipping the two levels; everything else is covered by contiguous `Rebuild`
blocks found with the standard right-to-left cycle-closure scan. Two-cycles therefore
cost a pairwise zip while longer cycles pay for full reconstruction exactly once.

*/

use bit_set::BitSet;

use crate::api::hierarchy::ShapeNode;
use crate::core::shape_error::ShapeError;

/// How a cycle's levels get restructured.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum CycleKind {
  /// An adjacent transposition, realized by zipping the two levels.
  Swap,
  /// A longer (or degenerate single-level) cycle, realized by nested index loops.
  Rebuild,
}

/// One contiguous block of levels `[lo, hi)` that must be restructured together.
/// `perm[k]` is the absolute source level feeding output level `lo + k`.
#[derive(Clone, Debug)]
pub(crate) struct Cycle {
  pub kind: CycleKind,
  pub perm: Vec<usize>,
  pub lo  : usize,
  pub hi  : usize,
}

/// Normalizes a (possibly partial) explicit permutation and validates bijectivity.
pub(crate) fn parse_perm(spec: &[usize]) -> Result<Vec<usize>, ShapeError> {
  if spec.is_empty() {
    return Ok(Vec::new());
  }

  let depth = match spec.iter().max() {
    Some(max) => max + 1,
    None => 0,
  };

  // A partial spec mentions a subset of positions; the listed values land at the
  // mentioned (sorted) positions and everything else stays put.
  let mut positions: Vec<usize> = spec.to_vec();
  positions.sort_unstable();
  if positions.windows(2).any(|pair| pair[0] == pair[1]) {
    return Err(ShapeError::MalformedPermutation {
      reason: "an axis is mentioned more than once".to_string(),
    });
  }

  let mut perm: Vec<usize> = (0..depth).collect();
  for (value, position) in spec.iter().zip(positions.iter()) {
    perm[*position] = *value;
  }

  let mut seen = BitSet::with_capacity(depth);
  for &axis in &perm {
    if !seen.insert(axis) {
      return Err(ShapeError::MalformedPermutation {
        reason: format!("axis {} appears more than once", axis),
      });
    }
  }
  if seen.len() != depth {
    return Err(ShapeError::MalformedPermutation {
      reason: "the mentioned axes do not form a bijection".to_string(),
    });
  }

  Ok(perm)
}

/// Parses a letter equation like `"abc -> bca"` into a permutation: output axis `k` is
/// the input axis named by the `k`-th letter of the right-hand side.
pub(crate) fn parse_equation(equation: &str) -> Result<Vec<usize>, ShapeError> {
  let malformed = |reason: String| ShapeError::MalformedPermutation { reason };

  let (lhs, rhs) = equation
      .split_once("->")
      .ok_or_else(|| malformed(format!("missing \"->\" in {:?}", equation)))?;
  let lhs = lhs.trim();
  let rhs = rhs.trim();

  for side in [lhs, rhs] {
    if side.is_empty() || !side.chars().all(|c| c.is_ascii_lowercase()) {
      return Err(malformed(format!(
        "axis names must be lowercase ascii letters, got {:?}",
        equation
      )));
    }
  }
  if lhs.len() != rhs.len() {
    return Err(malformed(format!(
      "the sides of {:?} name different numbers of axes",
      equation
    )));
  }

  let mut axis_of = crate::abstractions::HashMap::new();
  for (i, c) in lhs.chars().enumerate() {
    if axis_of.insert(c, i).is_some() {
      return Err(malformed(format!("axis {:?} declared twice", c)));
    }
  }

  let mut perm = Vec::with_capacity(rhs.len());
  let mut seen = BitSet::with_capacity(lhs.len());
  for c in rhs.chars() {
    let axis = *axis_of
        .get(&c)
        .ok_or_else(|| malformed(format!("axis {:?} is not declared on the left", c)))?;
    if !seen.insert(axis) {
      return Err(malformed(format!("axis {:?} used twice on the right", c)));
    }
    perm.push(axis);
  }

  Ok(perm)
}

/// Decomposes `perm` into the ordered cycle list, outermost first, and returns it with
/// the effective length after trimming the trailing fixed suffix. A trailing fixed point
/// is only trimmable when its level has no target reshaping attached, since a target
/// means the level must be rebuilt even in place.
pub(crate) fn find_cycles(perm: &[usize], nodes: &[ShapeNode]) -> (Vec<Cycle>, usize) {
  let mut cycles: Vec<Cycle> = Vec::new();

  let append = |cycles: &mut Vec<Cycle>, kind: CycleKind, lo: usize, hi: usize| {
    cycles.push(Cycle { kind, perm: perm[lo..hi].to_vec(), lo, hi });
  };

  let mut ptr: isize = perm.len() as isize - 1;
  while ptr >= 0 && perm[ptr as usize] == ptr as usize && nodes[ptr as usize].target().is_none()
  {
    ptr -= 1;
  }
  let length = (ptr + 1) as usize;

  if ptr > 0 && perm[ptr as usize - 1] == ptr as usize && perm[ptr as usize] == ptr as usize - 1
  {
    append(&mut cycles, CycleKind::Swap, ptr as usize - 1, ptr as usize + 1);
    ptr -= 2;
  }

  while ptr >= 0 {
    let highest = ptr as usize;
    let mut lowest = perm[highest];
    if 0 < lowest && lowest < highest {
      // Cycle-closure scan: extend the block left until the running minimum reachable
      // axis equals the scan position.
      for p in (0..highest).rev() {
        let axis = perm[p];
        if axis < lowest {
          lowest = axis;
        }
        if p == lowest {
          break;
        }
      }
    }
    append(&mut cycles, CycleKind::Rebuild, lowest, highest + 1);
    ptr = lowest as isize - 1;
  }

  cycles.reverse();
  (cycles, length)
}
