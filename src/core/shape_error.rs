/*!

Every failure this crate can report goes through one structured error type. Errors are
raised synchronously at the point of detection and never retried internally: this is a
pure validation/transformation library, so recovery belongs to the caller.

Mismatch messages identify which positional argument offended, render the offending
value, and describe the expected shape at the failing level.

*/

use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

use crate::api::hierarchy::ShapeNode;
use crate::api::value::Value;

/// Which flavor of run-time mismatch was detected.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum MismatchKind {
  /// The value's container kind or key coverage does not satisfy the level.
  Shape,
  /// The value's length at this level is not the one the shape pinned down.
  Length,
  /// The value's length differs from the reference argument's captured length.
  LengthConflict,
}

pub enum ShapeError {
  /// A checked operator found an argument whose run-time structure does not satisfy the
  /// declared hierarchy at some level.
  Mismatch {
    kind    : MismatchKind,
    /// Positional index of the offending argument (0 for single-argument operators).
    arg     : usize,
    /// The level that the argument failed against, for a readable shape description.
    expected: ShapeNode,
    /// The offending (sub)value.
    actual  : Value,
  },

  /// A fully determined hierarchy was required but the supplied one still contains a
  /// placeholder, or inference could not resolve one.
  Unresolved {
    reason: String,
  },

  /// A permutation spec does not denote a valid bijection, or it is longer than the
  /// hierarchy being transformed.
  MalformedPermutation {
    reason: String,
  },

  /// A fixed key set violated the metadata invariant (empty or duplicated keys).
  InvalidKeySet {
    reason: String,
  },

  /// A target reshaping was attached where none is allowed.
  InvalidTarget {
    reason: String,
  },

  /// Synthesis needed a primitive the level's box kind does not define (and no slower
  /// fallback exists), e.g. single-element construction for a dynamic-key dict.
  MissingPrimitive {
    node     : ShapeNode,
    primitive: &'static str,
  },
}

impl Display for ShapeError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {

      ShapeError::Mismatch { kind, arg, expected, actual } => {
        let complaint = match kind {
          MismatchKind::Shape          => "has unexpected shape".to_string(),
          MismatchKind::Length         => "has unexpected length".to_string(),
          MismatchKind::LengthConflict => "has a different length than argument 0".to_string(),
        };
        write!(
          f,
          "argument {arg} {complaint}\nargument {arg}: {actual}\nexpected shape: {expected}",
        )
      } // end `ShapeError::Mismatch` branch

      ShapeError::Unresolved { reason } => {
        write!(f, "the hierarchy is not fully determined: {}", reason)
      }

      ShapeError::MalformedPermutation { reason } => {
        write!(f, "malformed permutation: {}", reason)
      }

      ShapeError::InvalidKeySet { reason } => {
        write!(f, "invalid key set: {}", reason)
      }

      ShapeError::InvalidTarget { reason } => {
        write!(f, "invalid target: {}", reason)
      }

      ShapeError::MissingPrimitive { node, primitive } => {
        write!(f, "the {} primitive is not defined for shape level {}", primitive, node)
      }

    } // end match on `ShapeError`

  }
}

impl Debug for ShapeError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

impl Error for ShapeError {}
