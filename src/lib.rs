/*!

Declare the nesting shape of deeply nested heterogeneous data once; get back specialized
procedures for membership testing, element-wise traversal, value lifting, and axis
permutation over that shape.

```
use nestbox::{dict, list, tup, ops, Hierarchy};

let hier = Hierarchy::builder().list().dict_key("foo").tuple().build().unwrap();

let v = list![
  dict!{ "foo" => tup![1, 2] },
  dict!{ "foo" => tup![3, 4] },
];

assert!(ops::isa(&hier).unwrap().apply(&v));
assert_eq!(ops::flatten(&hier).unwrap().apply(&v).unwrap().len(), 4);

let transposed = ops::transform(&hier, "abc -> cab").unwrap().apply(&v).unwrap();
assert_eq!(
  transposed,
  tup![
    list![dict!{ "foo" => 1 }, dict!{ "foo" => 3 }],
    list![dict!{ "foo" => 2 }, dict!{ "foo" => 4 }],
  ]
);
```

Because the shape is known ahead of time, each operator compiles it once into a flat
plan (per-level primitive tables with pre-normalized metadata) and memoizes the plan
by (operator, hierarchy, options). Multi-argument traversal validates its first argument
and captures that argument's structure as reusable facts, so every further argument is
checked and aligned without re-discovering anything.

*/

pub mod abstractions;
pub mod api;
mod core;

// We re-export the surface that most callers touch.
pub use abstractions::IString;
pub use api::atom::Atom;
pub use api::box_kind::{BoxKind, DeclaredKind};
pub use api::hierarchy::{Hierarchy, HierarchyBuilder, ShapeNode};
pub use api::operators as ops;
pub use api::value::Value;
pub use crate::core::format::{FormatStyle, Formattable};
pub use crate::core::shape_error::{MismatchKind, ShapeError};

pub mod testing;
