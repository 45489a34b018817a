//! Flat, index-addressed intermediate representation used while a
//! grammar is under construction. Builders reference each other by
//! `usize` index instead of owning a sub-expression, so a rule that is
//! referenced before it is defined can still be staged.

use std::collections::HashSet;

use crate::character_containers::CharacterContainer;

pub type BuilderId = usize;
pub type RuleId = usize;

#[derive(Clone, Debug)]
pub enum ExpressionBuilder {
  AnyCharacter,
  CharacterClass(Vec<CharacterContainer>),
  ComplementedCharacterClass(Vec<CharacterContainer>),
  DoubleQuotedLiteral(String),
  SingleQuotedLiteral(String),
  Sequence(Vec<BuilderId>),
  PrioritizedChoice(Vec<BuilderId>),
  Optional(BuilderId),
  ZeroOrMore(BuilderId),
  OneOrMore(BuilderId),
  ExactRepetition(BuilderId, usize),
  PositiveOrMore(BuilderId, usize),
  PositiveRepetitionRange(BuilderId, usize, usize),
  ZeroRepetitionRange(BuilderId, usize),
  PositiveLookahead(BuilderId),
  NegativeLookahead(BuilderId),
  RuleReference(String, RuleId),
}

impl ExpressionBuilder {
  /// Shallow structural progression test: true unless the variant can,
  /// by its syntactic shape alone, succeed without consuming. This is
  /// what factory methods check immediately, before every rule in the
  /// grammar is necessarily resolved yet.
  pub fn is_shallow_progressing(&self) -> bool {
    !matches!(
      self,
      ExpressionBuilder::Optional(_)
        | ExpressionBuilder::ZeroOrMore(_)
        | ExpressionBuilder::ZeroRepetitionRange(_, _)
        | ExpressionBuilder::PositiveLookahead(_)
        | ExpressionBuilder::NegativeLookahead(_)
    )
  }

  pub fn is_bare_lookahead(&self) -> bool {
    matches!(self, ExpressionBuilder::PositiveLookahead(_) | ExpressionBuilder::NegativeLookahead(_))
  }

  /// Direct children, in evaluation order. Does *not* follow
  /// `RuleReference`s into their target rule's tree — that tree is
  /// already reachable as the target rule's own top builder.
  pub fn children(&self) -> Vec<BuilderId> {
    match self {
      ExpressionBuilder::Sequence(xs) | ExpressionBuilder::PrioritizedChoice(xs) => xs.clone(),
      ExpressionBuilder::Optional(x)
      | ExpressionBuilder::ZeroOrMore(x)
      | ExpressionBuilder::OneOrMore(x)
      | ExpressionBuilder::ExactRepetition(x, _)
      | ExpressionBuilder::PositiveOrMore(x, _)
      | ExpressionBuilder::PositiveRepetitionRange(x, _, _)
      | ExpressionBuilder::ZeroRepetitionRange(x, _)
      | ExpressionBuilder::PositiveLookahead(x)
      | ExpressionBuilder::NegativeLookahead(x) => vec![*x],
      ExpressionBuilder::AnyCharacter
      | ExpressionBuilder::CharacterClass(_)
      | ExpressionBuilder::ComplementedCharacterClass(_)
      | ExpressionBuilder::DoubleQuotedLiteral(_)
      | ExpressionBuilder::SingleQuotedLiteral(_)
      | ExpressionBuilder::RuleReference(_, _) => Vec::new(),
    }
  }
}

/// A read-only view over a grammar under construction: the builder
/// table plus the rule name -> top builder index map. Every predicate
/// here is only safe to call once every declared rule's builder index
/// has been filled in (`GrammarBuilder::build()` step a).
pub struct BuilderTable<'a> {
  pub builders: &'a [ExpressionBuilder],
  pub rule_builder: &'a [Option<BuilderId>],
}

impl<'a> BuilderTable<'a> {
  fn target(&self, rule_id: RuleId) -> BuilderId {
    self.rule_builder[rule_id].expect("rule must be defined before predicates run")
  }

  /// True iff some successful match of this expression consumes zero
  /// characters. An already-visited rule reference is treated as
  /// non-nullable (least fixed point).
  pub fn is_nullable(&self, id: BuilderId) -> bool {
    self.is_nullable_rec(id, &mut HashSet::new())
  }

  fn is_nullable_rec(&self, id: BuilderId, visited: &mut HashSet<RuleId>) -> bool {
    match &self.builders[id] {
      ExpressionBuilder::AnyCharacter
      | ExpressionBuilder::CharacterClass(_)
      | ExpressionBuilder::ComplementedCharacterClass(_)
      | ExpressionBuilder::DoubleQuotedLiteral(_)
      | ExpressionBuilder::SingleQuotedLiteral(_)
      | ExpressionBuilder::ExactRepetition(_, _)
      | ExpressionBuilder::PositiveOrMore(_, _)
      | ExpressionBuilder::PositiveRepetitionRange(_, _, _) => false,
      ExpressionBuilder::Sequence(elems) => elems.iter().all(|&e| self.is_nullable_rec(e, visited)),
      ExpressionBuilder::PrioritizedChoice(variants) => variants.iter().any(|&v| self.is_nullable_rec(v, visited)),
      ExpressionBuilder::Optional(_)
      | ExpressionBuilder::ZeroOrMore(_)
      | ExpressionBuilder::ZeroRepetitionRange(_, _)
      | ExpressionBuilder::PositiveLookahead(_)
      | ExpressionBuilder::NegativeLookahead(_) => true,
      ExpressionBuilder::OneOrMore(inner) => self.is_nullable_rec(*inner, visited),
      ExpressionBuilder::RuleReference(_, rule_id) => {
        if visited.contains(rule_id) {
          false
        } else {
          visited.insert(*rule_id);
          self.is_nullable_rec(self.target(*rule_id), visited)
        }
      }
    }
  }

  /// True iff no possible input causes this expression to fail. An
  /// already-visited rule reference is treated as always-matching
  /// (greatest fixed point).
  pub fn always_matches(&self, id: BuilderId) -> bool {
    self.always_matches_rec(id, &mut HashSet::new())
  }

  fn always_matches_rec(&self, id: BuilderId, visited: &mut HashSet<RuleId>) -> bool {
    match &self.builders[id] {
      ExpressionBuilder::AnyCharacter
      | ExpressionBuilder::CharacterClass(_)
      | ExpressionBuilder::ComplementedCharacterClass(_)
      | ExpressionBuilder::DoubleQuotedLiteral(_)
      | ExpressionBuilder::SingleQuotedLiteral(_) => false,
      ExpressionBuilder::Sequence(elems) => elems.iter().all(|&e| self.always_matches_rec(e, visited)),
      ExpressionBuilder::PrioritizedChoice(variants) => variants.iter().any(|&v| self.always_matches_rec(v, visited)),
      ExpressionBuilder::Optional(_) | ExpressionBuilder::ZeroOrMore(_) | ExpressionBuilder::ZeroRepetitionRange(_, _) => true,
      ExpressionBuilder::OneOrMore(inner)
      | ExpressionBuilder::ExactRepetition(inner, _)
      | ExpressionBuilder::PositiveOrMore(inner, _)
      | ExpressionBuilder::PositiveRepetitionRange(inner, _, _)
      | ExpressionBuilder::PositiveLookahead(inner)
      | ExpressionBuilder::NegativeLookahead(inner) => self.always_matches_rec(*inner, visited),
      ExpressionBuilder::RuleReference(_, rule_id) => {
        if visited.contains(rule_id) {
          true
        } else {
          visited.insert(*rule_id);
          self.always_matches_rec(self.target(*rule_id), visited)
        }
      }
    }
  }

  /// True iff evaluating this expression, in `origin`'s top position,
  /// may recurse back into `origin` before consuming a character.
  pub fn is_left_recursive(&self, id: BuilderId, origin: RuleId) -> bool {
    self.is_left_recursive_rec(id, origin, &mut HashSet::new())
  }

  fn is_left_recursive_rec(&self, id: BuilderId, origin: RuleId, visited: &mut HashSet<RuleId>) -> bool {
    match &self.builders[id] {
      ExpressionBuilder::RuleReference(_, rule_id) => {
        if *rule_id == origin {
          true
        } else if visited.contains(rule_id) {
          false
        } else {
          visited.insert(*rule_id);
          let result = self.is_left_recursive_rec(self.target(*rule_id), origin, visited);
          visited.remove(rule_id);
          result
        }
      }
      ExpressionBuilder::Sequence(elems) => {
        for &e in elems {
          if self.builders[e].is_bare_lookahead() {
            if self.is_left_recursive_rec(e, origin, visited) {
              return true;
            }
            continue;
          }
          return self.is_left_recursive_rec(e, origin, visited);
        }
        false
      }
      ExpressionBuilder::PrioritizedChoice(variants) => variants.iter().any(|&v| self.is_left_recursive_rec(v, origin, visited)),
      ExpressionBuilder::Optional(inner)
      | ExpressionBuilder::ZeroOrMore(inner)
      | ExpressionBuilder::OneOrMore(inner)
      | ExpressionBuilder::ExactRepetition(inner, _)
      | ExpressionBuilder::PositiveOrMore(inner, _)
      | ExpressionBuilder::PositiveRepetitionRange(inner, _, _)
      | ExpressionBuilder::ZeroRepetitionRange(inner, _)
      | ExpressionBuilder::PositiveLookahead(inner)
      | ExpressionBuilder::NegativeLookahead(inner) => self.is_left_recursive_rec(*inner, origin, visited),
      ExpressionBuilder::AnyCharacter
      | ExpressionBuilder::CharacterClass(_)
      | ExpressionBuilder::ComplementedCharacterClass(_)
      | ExpressionBuilder::DoubleQuotedLiteral(_)
      | ExpressionBuilder::SingleQuotedLiteral(_) => false,
    }
  }

  /// True iff the expression cannot, by itself, start an infinite
  /// evaluation chain. `is_leftmost` tracks whether this node occupies
  /// the leftmost position of its containing rule.
  pub fn is_terminating(&self, id: BuilderId, is_leftmost: bool) -> bool {
    self.is_terminating_rec(id, is_leftmost, &mut HashSet::new())
  }

  fn is_terminating_rec(&self, id: BuilderId, is_leftmost: bool, visited: &mut HashSet<RuleId>) -> bool {
    match &self.builders[id] {
      ExpressionBuilder::AnyCharacter
      | ExpressionBuilder::CharacterClass(_)
      | ExpressionBuilder::ComplementedCharacterClass(_)
      | ExpressionBuilder::DoubleQuotedLiteral(_)
      | ExpressionBuilder::SingleQuotedLiteral(_) => true,
      ExpressionBuilder::Sequence(elems) => elems.iter().enumerate().all(|(i, &e)| self.is_terminating_rec(e, is_leftmost && i == 0, visited)),
      ExpressionBuilder::PrioritizedChoice(variants) => variants.iter().any(|&v| self.is_terminating_rec(v, is_leftmost, visited)),
      ExpressionBuilder::Optional(inner) | ExpressionBuilder::ZeroOrMore(inner) | ExpressionBuilder::ZeroRepetitionRange(inner, _) => {
        if is_leftmost {
          self.is_terminating_rec(*inner, is_leftmost, visited)
        } else {
          true
        }
      }
      ExpressionBuilder::OneOrMore(inner)
      | ExpressionBuilder::ExactRepetition(inner, _)
      | ExpressionBuilder::PositiveOrMore(inner, _)
      | ExpressionBuilder::PositiveRepetitionRange(inner, _, _) => self.is_terminating_rec(*inner, is_leftmost, visited),
      ExpressionBuilder::PositiveLookahead(inner) | ExpressionBuilder::NegativeLookahead(inner) => self.is_terminating_rec(*inner, is_leftmost, visited),
      ExpressionBuilder::RuleReference(_, rule_id) => {
        if visited.contains(rule_id) {
          false
        } else {
          visited.insert(*rule_id);
          let result = self.is_terminating_rec(self.target(*rule_id), is_leftmost, visited);
          visited.remove(rule_id);
          result
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn table<'a>(builders: &'a [ExpressionBuilder], rule_builder: &'a [Option<BuilderId>]) -> BuilderTable<'a> {
    BuilderTable { builders, rule_builder }
  }

  #[test]
  fn literal_is_not_nullable() {
    let builders = vec![ExpressionBuilder::SingleQuotedLiteral("a".to_owned())];
    let t = table(&builders, &[]);
    assert!(!t.is_nullable(0));
    assert!(!t.always_matches(0));
  }

  #[test]
  fn optional_is_nullable_and_always_matches() {
    let builders = vec![ExpressionBuilder::SingleQuotedLiteral("a".to_owned()), ExpressionBuilder::Optional(0)];
    let t = table(&builders, &[]);
    assert!(t.is_nullable(1));
    assert!(t.always_matches(1));
  }

  #[test]
  fn bare_self_reference_is_left_recursive() {
    // S <- S
    let builders = vec![ExpressionBuilder::RuleReference("S".to_owned(), 0)];
    let rule_builder = vec![Some(0)];
    let t = table(&builders, &rule_builder);
    assert!(t.is_left_recursive(0, 0));
  }

  #[test]
  fn sequence_skips_lookahead_prefix_when_deciding_recursion() {
    // S <- &'x' S 'y'   (lookahead prefix, then self-reference)
    let builders = vec![
      ExpressionBuilder::SingleQuotedLiteral("x".to_owned()),
      ExpressionBuilder::PositiveLookahead(0),
      ExpressionBuilder::RuleReference("S".to_owned(), 0),
      ExpressionBuilder::SingleQuotedLiteral("y".to_owned()),
      ExpressionBuilder::Sequence(vec![1, 2, 3]),
    ];
    let rule_builder = vec![Some(4)];
    let t = table(&builders, &rule_builder);
    assert!(t.is_left_recursive(4, 0));
  }
}
