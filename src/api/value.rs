/*!

A `Value` is a dynamically typed nested data tree: the thing whose shape gets declared,
checked, traversed, and permuted. The container variants deliberately mirror the box
kinds of the shape layer (sequences with positional identity (`List`), sequences with
structural identity (`Tuple`), and key-indexed maps (`Dict`)), with `Atom` at the leaves.

Dicts preserve insertion order, which is the canonical iteration order for dynamic-key
map levels, but two dicts compare equal whenever they hold the same key/value pairs in
any order.

The `list!`, `tup!`, and `dict!` macros build values with minimal noise:

```
use nestbox::{list, tup, dict};

let v = list![
  dict!{ "foo" => tup![1, 2] },
  dict!{ "foo" => tup![3, 4] },
];
assert_ne!(v, list![]);
```

*/

use std::fmt::{Debug, Display, Formatter};

use crate::abstractions::IndexMap;
use crate::api::atom::Atom;
use crate::core::format::{FormatStyle, Formattable};

pub type DictMap = IndexMap<Atom, Value>;

#[derive(Clone, PartialEq)]
pub enum Value {
  List(Vec<Value>),
  Tuple(Vec<Value>),
  Dict(DictMap),
  Atom(Atom),
}

impl Value {
  /// An empty container of the same outer kind, or `None` for an atom.
  pub fn emptied(&self) -> Option<Value> {
    match self {
      Value::List(_)  => Some(Value::List(Vec::new())),
      Value::Tuple(_) => Some(Value::Tuple(Vec::new())),
      Value::Dict(_)  => Some(Value::Dict(DictMap::default())),
      Value::Atom(_)  => None,
    }
  }

  pub fn is_atom(&self) -> bool {
    matches!(self, Value::Atom(_))
  }
}

impl Display for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.repr(FormatStyle::Default))
  }
}

impl Debug for Value {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

// A blanket `impl<T: Into<Atom>> From<T> for Value` would collide with the reflexive
// `From<Value> for Value` that the macros below rely on, so each conversion is spelled out.
macro_rules! impl_value_from {
  ($($source:ty),* $(,)?) => {
    $(
      impl From<$source> for Value {
        fn from(atom: $source) -> Value {
          Value::Atom(Atom::from(atom))
        }
      }
    )*
  };
}

impl_value_from!(&str, String, i64, i32, u32, usize, f64, &[u8], Vec<u8>);

impl From<Atom> for Value {
  fn from(atom: Atom) -> Value {
    Value::Atom(atom)
  }
}

impl From<crate::abstractions::IString> for Value {
  fn from(s: crate::abstractions::IString) -> Value {
    Value::Atom(Atom::Str(s))
  }
}

/// Builds a `Value::List` from a comma-separated element list. Elements may be anything
/// convertible to a `Value`, including nested `list!`/`tup!`/`dict!` invocations.
#[macro_export]
macro_rules! list {
  [$($element:expr),* $(,)?] => {
    $crate::Value::List(vec![$($crate::Value::from($element)),*])
  };
}

/// Builds a `Value::Tuple` from a comma-separated element list.
#[macro_export]
macro_rules! tup {
  [$($element:expr),* $(,)?] => {
    $crate::Value::Tuple(vec![$($crate::Value::from($element)),*])
  };
}

/// Builds a `Value::Dict` from `key => value` pairs. Keys may be anything convertible to
/// an `Atom`. Later duplicates overwrite earlier ones, as with repeated inserts.
#[macro_export]
macro_rules! dict {
  {$($key:expr => $value:expr),* $(,)?} => {
    {
      #[allow(unused_mut)]
      let mut map = $crate::api::value::DictMap::default();
      $( map.insert($crate::Atom::from($key), $crate::Value::from($value)); )*
      $crate::Value::Dict(map)
    }
  };
}

#[cfg(test)]
mod tests {
  use crate::{dict, list, tup};
  use super::*;

  #[test]
  fn dict_equality_disregards_order() {
    let a = dict!{ "x" => 1, "y" => 2 };
    let b = dict!{ "y" => 2, "x" => 1 };
    assert_eq!(a, b);
  }

  #[test]
  fn list_and_tuple_are_distinct_kinds() {
    assert_ne!(list![1, 2], tup![1, 2]);
  }

  #[test]
  fn nested_macro_construction() {
    let v = list![dict!{ "foo" => tup![1, 2] }];
    if let Value::List(items) = &v {
      assert_eq!(items.len(), 1);
    } else {
      panic!("expected a list");
    }
    assert_eq!(v.to_string(), r#"[{"foo": (1, 2)}]"#);
  }

  #[test]
  fn emptied_preserves_kind() {
    assert_eq!(list![1].emptied(), Some(list![]));
    assert_eq!(tup![1].emptied(), Some(tup![]));
    assert_eq!(Value::from(1).emptied(), None);
  }
}
