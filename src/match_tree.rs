//! Successful-evaluation tree: the shape a PEG expression's match takes.

use std::fmt;

/// A zero-width successful match, produced by lookaheads, optionals and
/// empty repetitions.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LookaheadMatch {
  rule_name: Option<String>,
}

impl LookaheadMatch {
  pub fn new(rule_name: Option<String>) -> Self {
    LookaheadMatch { rule_name }
  }

  pub fn rule_name(&self) -> Option<&str> {
    self.rule_name.as_deref()
  }

  pub fn characters_count(&self) -> usize {
    0
  }
}

/// A leaf match carrying the literal characters consumed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchLeaf {
  rule_name: Option<String>,
  characters: String,
}

impl MatchLeaf {
  pub fn new(rule_name: Option<String>, characters: String) -> Self {
    MatchLeaf { rule_name, characters }
  }

  pub fn rule_name(&self) -> Option<&str> {
    self.rule_name.as_deref()
  }

  pub fn characters(&self) -> &str {
    &self.characters
  }

  pub fn characters_count(&self) -> usize {
    self.characters.chars().count()
  }
}

/// An interior match node whose character count is the sum of its children.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchTree {
  rule_name: Option<String>,
  children: Vec<Match>,
}

impl MatchTree {
  pub fn new(rule_name: Option<String>, children: Vec<Match>) -> Self {
    assert!(!children.is_empty(), "match tree must have at least one child");
    MatchTree { rule_name, children }
  }

  pub fn rule_name(&self) -> Option<&str> {
    self.rule_name.as_deref()
  }

  pub fn children(&self) -> &[Match] {
    &self.children
  }

  pub fn characters_count(&self) -> usize {
    self.children.iter().map(Match::characters_count).sum()
  }
}

/// Any successful-evaluation node: a lookahead, a leaf, or a tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Match {
  Lookahead(LookaheadMatch),
  Leaf(MatchLeaf),
  Tree(MatchTree),
}

impl Match {
  pub fn rule_name(&self) -> Option<&str> {
    match self {
      Match::Lookahead(m) => m.rule_name(),
      Match::Leaf(m) => m.rule_name(),
      Match::Tree(m) => m.rule_name(),
    }
  }

  pub fn characters_count(&self) -> usize {
    match self {
      Match::Lookahead(m) => m.characters_count(),
      Match::Leaf(m) => m.characters_count(),
      Match::Tree(m) => m.characters_count(),
    }
  }

  pub fn is_lookahead(&self) -> bool {
    matches!(self, Match::Lookahead(_))
  }
}

impl fmt::Display for Match {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Match::Lookahead(_) => Ok(()),
      Match::Leaf(m) => write!(f, "{}", m.characters()),
      Match::Tree(m) => {
        for child in m.children() {
          write!(f, "{}", child)?;
        }
        Ok(())
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tree_characters_count_sums_children() {
    let leaf_a = Match::Leaf(MatchLeaf::new(None, "a".to_owned()));
    let leaf_b = Match::Leaf(MatchLeaf::new(None, "bc".to_owned()));
    let tree = MatchTree::new(Some("S".to_owned()), vec![leaf_a, leaf_b]);
    assert_eq!(tree.characters_count(), 3);
  }

  #[test]
  fn lookahead_never_consumes() {
    let m = LookaheadMatch::new(Some("S".to_owned()));
    assert_eq!(m.characters_count(), 0);
  }
}
