/*!

There are different text representations possible for values, shape nodes, and
hierarchies, depending on the context: mismatch messages want something close to the
data's literal notation, while logs want the same thing a caller would paste back into
source. This module provides a unified API for formatting objects across the crate.

*/

use std::fmt::Write;

use crate::api::value::Value;

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum FormatStyle {
  #[default]
  Default, // Use the default, literal-like formatting
  Input,   // Format as a valid input expression (macro syntax), if possible.
}

pub trait Formattable {
  /// Writes a text representation of `self` according to the given `FormatStyle`.
  /// Use `format!` and friends to create a string.
  fn repr(&self, style: FormatStyle) -> String;
}

impl Formattable for Value {
  fn repr(&self, style: FormatStyle) -> String {
    let mut out = String::new();
    write_value(&mut out, self, style);
    out
  }
}

fn write_value(out: &mut String, value: &Value, style: FormatStyle) {
  match value {

    Value::List(items) => {
      if style == FormatStyle::Input {
        out.push_str("list!");
      }
      out.push('[');
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        write_value(out, item, style);
      }
      out.push(']');
    }

    Value::Tuple(items) => {
      if style == FormatStyle::Input {
        out.push_str("tup![");
      } else {
        out.push('(');
      }
      for (i, item) in items.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        write_value(out, item, style);
      }
      // A one-element tuple keeps the trailing comma so the rendering is unambiguous.
      if style == FormatStyle::Default && items.len() == 1 {
        out.push(',');
      }
      out.push(if style == FormatStyle::Input { ']' } else { ')' });
    }

    Value::Dict(map) => {
      if style == FormatStyle::Input {
        out.push_str("dict!");
      }
      out.push('{');
      for (i, (key, item)) in map.iter().enumerate() {
        if i > 0 {
          out.push_str(", ");
        }
        let _ = write!(out, "{}", key);
        out.push_str(if style == FormatStyle::Input { " => " } else { ": " });
        write_value(out, item, style);
      }
      out.push('}');
    }

    Value::Atom(atom) => {
      let _ = write!(out, "{}", atom);
    }

  }
}

#[cfg(test)]
mod tests {
  use crate::{dict, list, tup};
  use super::*;

  #[test]
  fn default_style_reads_like_a_literal() {
    let v = list![dict!{ "foo" => tup![1] }, tup![1, 2]];
    assert_eq!(v.repr(FormatStyle::Default), r#"[{"foo": (1,)}, (1, 2)]"#);
  }

  #[test]
  fn input_style_round_trips_macro_syntax() {
    let v = list![dict!{ "foo" => tup![1, 2] }];
    assert_eq!(
      v.repr(FormatStyle::Input),
      r#"list![dict!{"foo" => tup![1, 2]}]"#
    );
  }
}
