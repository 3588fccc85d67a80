/*!

A `Hierarchy` is the ordered declaration of a nesting shape, one `ShapeNode` per level,
outermost first. Hierarchies are immutable once built, compare structurally, and hash;
they are the cache key under which specialized procedures are memoized.

A node binds a box kind with its normalized metadata and optionally a `target`: an inner
reshaping applied to that level when the `transform` operator rebuilds it. A node whose
kind is not yet known is a *placeholder*, resolved later from an example value (see
`core::infer`); a hierarchy with no placeholders is *determined*. Placeholders cannot
carry targets.

Hierarchies are assembled with an explicit builder:

```
use nestbox::{Hierarchy, ShapeNode};

let hier = Hierarchy::builder()
    .list()
    .dict_key("foo")
    .tuple()
    .build()
    .unwrap();
assert_eq!(hier.len(), 3);
assert_eq!(hier.to_string(), r#"List - Dict["foo"] - Tuple"#);

let reshaped = Hierarchy::builder()
    .dict_keys(["a", "b"])
    .target(ShapeNode::list())
    .build()
    .unwrap();
assert_eq!(reshaped.to_string(), r#"Dict["a", "b"] / List"#);
```

*/

use std::fmt::{Debug, Display, Formatter};

use crate::api::atom::Atom;
use crate::api::box_kind::{BoxKind, DeclaredKind, KeySet, Metadata};
use crate::core::format::{FormatStyle, Formattable};
use crate::core::shape_error::ShapeError;

/// One level of a declared shape.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ShapeNode {
  declared: Option<DeclaredKind>,
  kind    : Option<BoxKind>,
  metadata: Metadata,
  target  : Option<Box<ShapeNode>>,
}

impl ShapeNode {
  pub fn list() -> ShapeNode {
    ShapeNode {
      declared: Some(DeclaredKind::List),
      kind    : Some(BoxKind::List),
      metadata: Metadata::None,
      target  : None,
    }
  }

  pub fn tuple() -> ShapeNode {
    ShapeNode {
      declared: Some(DeclaredKind::Tuple),
      kind    : Some(BoxKind::Tuple),
      metadata: Metadata::None,
      target  : None,
    }
  }

  /// A dict level with dynamic (unknown) keys.
  pub fn dict() -> ShapeNode {
    ShapeNode {
      declared: Some(DeclaredKind::Dict),
      kind    : Some(BoxKind::DictDynamic),
      metadata: Metadata::None,
      target  : None,
    }
  }

  /// A dict level with exactly one fixed key.
  pub fn dict_key(key: impl Into<Atom>) -> ShapeNode {
    ShapeNode {
      declared: Some(DeclaredKind::Dict),
      kind    : Some(BoxKind::DictSingle),
      metadata: Metadata::Key(key.into()),
      target  : None,
    }
  }

  /// A dict level with a fixed key set. The key set is normalized (sorted,
  /// duplicate-free, non-empty).
  pub fn dict_keys<I>(keys: I) -> Result<ShapeNode, ShapeError>
  where
    I: IntoIterator,
    I::Item: Into<Atom>,
  {
    let keys: Vec<Atom> = keys.into_iter().map(Into::into).collect();
    let key_set = KeySet::new(keys)?;
    Ok(ShapeNode {
      declared: Some(DeclaredKind::Dict),
      kind    : Some(BoxKind::DictFixed),
      metadata: Metadata::Keys(key_set),
      target  : None,
    })
  }

  /// A level whose concrete kind is unknown until an example value is seen.
  pub fn placeholder() -> ShapeNode {
    ShapeNode {
      declared: None,
      kind    : None,
      metadata: Metadata::None,
      target  : None,
    }
  }

  /// Attaches an inner reshaping to this node. A target may be set at most once and
  /// never on a placeholder.
  pub fn with_target(mut self, target: ShapeNode) -> Result<ShapeNode, ShapeError> {
    if self.is_placeholder() {
      return Err(ShapeError::InvalidTarget {
        reason: "a placeholder level cannot carry a target".to_string(),
      });
    }
    if self.target.is_some() {
      return Err(ShapeError::InvalidTarget {
        reason: "a level's target can be set at most once".to_string(),
      });
    }
    self.target = Some(Box::new(target));
    Ok(self)
  }

  #[inline(always)]
  pub fn is_placeholder(&self) -> bool {
    self.kind.is_none()
  }

  #[inline(always)]
  pub fn declared(&self) -> Option<DeclaredKind> {
    self.declared
  }

  #[inline(always)]
  pub fn kind(&self) -> Option<BoxKind> {
    self.kind
  }

  #[inline(always)]
  pub fn metadata(&self) -> &Metadata {
    &self.metadata
  }

  #[inline(always)]
  pub fn target(&self) -> Option<&ShapeNode> {
    self.target.as_deref()
  }
}

impl Formattable for ShapeNode {
  fn repr(&self, style: FormatStyle) -> String {
    let mut out = match (self.kind, &self.metadata) {
      (None, _)                                  => "...".to_string(),
      (Some(BoxKind::List), _)                   => "List".to_string(),
      (Some(BoxKind::Tuple), _)                  => "Tuple".to_string(),
      (Some(BoxKind::DictSingle), Metadata::Key(key)) => format!("Dict[{}]", key),
      (Some(BoxKind::DictFixed), Metadata::Keys(keys)) => {
        let inner =
          crate::abstractions::join_string(keys.keys().iter().map(|k| k.to_string()), ", ");
        format!("Dict[{}]", inner)
      }
      (Some(BoxKind::DictDynamic), _)            => "Dict".to_string(),
      // A concrete dict node always carries the metadata its variant demands.
      (Some(kind), _) => panic!("shape node {:?} has inconsistent metadata", kind),
    };
    if let Some(target) = &self.target {
      out.push_str(" / ");
      out.push_str(&target.repr(style));
    }
    out
  }
}

impl Display for ShapeNode {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.repr(FormatStyle::Default))
  }
}

impl Debug for ShapeNode {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

/// An ordered, finite sequence of shape nodes, outermost first.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Hierarchy {
  nodes: Vec<ShapeNode>,
}

impl Hierarchy {
  pub fn builder() -> HierarchyBuilder {
    HierarchyBuilder { nodes: Vec::new(), error: None }
  }

  pub fn from_nodes(nodes: impl IntoIterator<Item = ShapeNode>) -> Hierarchy {
    Hierarchy { nodes: nodes.into_iter().collect() }
  }

  #[inline(always)]
  pub fn len(&self) -> usize {
    self.nodes.len()
  }

  #[inline(always)]
  pub fn is_empty(&self) -> bool {
    self.nodes.is_empty()
  }

  #[inline(always)]
  pub fn nodes(&self) -> &[ShapeNode] {
    &self.nodes
  }

  /// A hierarchy is determined iff it contains no placeholder node.
  pub fn is_determined(&self) -> bool {
    self.nodes.iter().all(|node| !node.is_placeholder())
  }
}

impl Formattable for Hierarchy {
  fn repr(&self, style: FormatStyle) -> String {
    crate::abstractions::join_string(self.nodes.iter().map(|node| node.repr(style)), " - ")
  }
}

impl Display for Hierarchy {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.repr(FormatStyle::Default))
  }
}

impl Debug for Hierarchy {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    Display::fmt(self, f)
  }
}

/// Builds a hierarchy level by level, outermost first. The first declaration error is
/// remembered and reported by `build()`, so chains read without intermediate `?`.
pub struct HierarchyBuilder {
  nodes: Vec<ShapeNode>,
  error: Option<ShapeError>,
}

impl HierarchyBuilder {
  pub fn list(mut self) -> Self {
    self.nodes.push(ShapeNode::list());
    self
  }

  pub fn tuple(mut self) -> Self {
    self.nodes.push(ShapeNode::tuple());
    self
  }

  pub fn dict(mut self) -> Self {
    self.nodes.push(ShapeNode::dict());
    self
  }

  pub fn dict_key(mut self, key: impl Into<Atom>) -> Self {
    self.nodes.push(ShapeNode::dict_key(key));
    self
  }

  pub fn dict_keys<I>(mut self, keys: I) -> Self
  where
    I: IntoIterator,
    I::Item: Into<Atom>,
  {
    match ShapeNode::dict_keys(keys) {
      Ok(node) => self.nodes.push(node),
      Err(error) => {
        self.error.get_or_insert(error);
      }
    }
    self
  }

  pub fn placeholder(mut self) -> Self {
    self.nodes.push(ShapeNode::placeholder());
    self
  }

  /// Attaches a target reshaping to the most recently appended level.
  pub fn target(mut self, target: ShapeNode) -> Self {
    match self.nodes.pop() {
      None => {
        self.error.get_or_insert(ShapeError::InvalidTarget {
          reason: "no level to attach a target to".to_string(),
        });
      }
      Some(node) => match node.with_target(target) {
        Ok(node) => self.nodes.push(node),
        Err(error) => {
          self.error.get_or_insert(error);
        }
      },
    }
    self
  }

  pub fn build(self) -> Result<Hierarchy, ShapeError> {
    match self.error {
      Some(error) => Err(error),
      None => Ok(Hierarchy { nodes: self.nodes }),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_assembles_outer_to_inner() {
    let hier = Hierarchy::builder().list().dict_key("foo").tuple().build().unwrap();
    assert_eq!(hier.len(), 3);
    assert_eq!(hier.nodes()[0].kind(), Some(BoxKind::List));
    assert_eq!(hier.nodes()[1].kind(), Some(BoxKind::DictSingle));
    assert_eq!(hier.nodes()[2].kind(), Some(BoxKind::Tuple));
    assert!(hier.is_determined());
  }

  #[test]
  fn placeholders_make_a_hierarchy_undetermined() {
    let hier = Hierarchy::builder().list().placeholder().build().unwrap();
    assert!(!hier.is_determined());
    assert_eq!(hier.to_string(), "List - ...");
  }

  #[test]
  fn target_attaches_to_last_level_once() {
    let hier = Hierarchy::builder()
        .dict_keys(["a", "b"])
        .target(ShapeNode::list())
        .build()
        .unwrap();
    assert!(hier.nodes()[0].target().is_some());

    let twice = Hierarchy::builder()
        .list()
        .target(ShapeNode::tuple())
        .target(ShapeNode::tuple())
        .build();
    assert!(matches!(twice, Err(ShapeError::InvalidTarget { .. })));
  }

  #[test]
  fn target_rejected_on_placeholder() {
    let result = Hierarchy::builder().placeholder().target(ShapeNode::list()).build();
    assert!(matches!(result, Err(ShapeError::InvalidTarget { .. })));
  }

  #[test]
  fn structural_equality_and_display() {
    let a = Hierarchy::builder().list().dict_keys(["b", "a"]).build().unwrap();
    let b = Hierarchy::builder().list().dict_keys(["a", "b"]).build().unwrap();
    // Key sets normalize, so declaration order is irrelevant.
    assert_eq!(a, b);
    assert_eq!(a.to_string(), r#"List - Dict["a", "b"]"#);
  }
}
