//! Named wrappers around an expression: the two rule kinds, and the
//! packrat memo scoped to a single `parse()` call.

use std::collections::HashMap;

use crate::expressions::{EvalResult, Expression};

/// Packrat memo: rule name -> starting index -> cached evaluation
/// result. Constructed fresh per `Grammar::parse()` call.
#[derive(Default)]
pub struct Cache {
  entries: HashMap<String, HashMap<usize, EvalResult>>,
}

impl Cache {
  pub fn new() -> Self {
    Cache { entries: HashMap::new() }
  }

  fn get(&self, name: &str, index: usize) -> Option<&EvalResult> {
    self.entries.get(name).and_then(|m| m.get(&index))
  }

  fn insert(&mut self, name: &str, index: usize, result: EvalResult) {
    self.entries.entry(name.to_owned()).or_default().insert(index, result);
  }
}

/// A named, immutable rule. Classification (left-recursive or not) is
/// decided once, by `GrammarBuilder::build()`, and baked into which
/// variant is constructed.
#[derive(Debug)]
pub enum Rule {
  NonLeftRecursive(NonLeftRecursiveRule),
  LeftRecursive(LeftRecursiveRule),
}

#[derive(Debug)]
pub struct NonLeftRecursiveRule {
  name: String,
  expression: Expression,
}

#[derive(Debug)]
pub struct LeftRecursiveRule {
  name: String,
  expression: Expression,
}

impl Rule {
  pub fn non_left_recursive(name: impl Into<String>, expression: Expression) -> Self {
    Rule::NonLeftRecursive(NonLeftRecursiveRule { name: name.into(), expression })
  }

  pub fn left_recursive(name: impl Into<String>, expression: Expression) -> Self {
    Rule::LeftRecursive(LeftRecursiveRule { name: name.into(), expression })
  }

  pub fn name(&self) -> &str {
    match self {
      Rule::NonLeftRecursive(r) => &r.name,
      Rule::LeftRecursive(r) => &r.name,
    }
  }

  pub fn expression(&self) -> &Expression {
    match self {
      Rule::NonLeftRecursive(r) => &r.expression,
      Rule::LeftRecursive(r) => &r.expression,
    }
  }

  pub fn is_left_recursive(&self) -> bool {
    matches!(self, Rule::LeftRecursive(_))
  }

  /// `effective_name` is what produced matches/mismatches get tagged
  /// with: the caller's label if given, else this rule's own name.
  pub fn parse_at(&self, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule]) -> EvalResult {
    match self {
      Rule::NonLeftRecursive(r) => r.parse(text, index, cache, rule_name, rules),
      Rule::LeftRecursive(r) => r.parse(text, index, cache, rule_name, rules),
    }
  }
}

impl NonLeftRecursiveRule {
  fn parse(&self, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule]) -> EvalResult {
    let effective_name = rule_name.unwrap_or(&self.name);
    if let Some(cached) = cache.get(effective_name, index) {
      tracing::trace!(rule = effective_name, index, "packrat cache hit");
      return cached.clone();
    }
    tracing::trace!(rule = effective_name, index, "packrat cache miss");
    let result = self.expression.evaluate(text, index, cache, Some(effective_name), rules);
    cache.insert(effective_name, index, result.clone());
    result
  }
}

impl LeftRecursiveRule {
  fn parse(&self, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule]) -> EvalResult {
    let effective_name = rule_name.unwrap_or(&self.name).to_owned();
    if let Some(cached) = cache.get(&effective_name, index) {
      tracing::trace!(rule = %effective_name, index, "packrat cache hit");
      return cached.clone();
    }
    tracing::trace!(rule = %effective_name, index, "seed-and-grow start");
    let seed = self
      .expression
      .to_seed_failure(Some(&effective_name))
      .expect("left-recursive rule's top expression must support seeding (enforced at build() time)");
    cache.insert(&effective_name, index, Err(seed));

    let mut last = self.expression.evaluate(text, index, cache, Some(&effective_name), rules);
    cache.insert(&effective_name, index, last.clone());
    if last.is_err() {
      return last;
    }

    loop {
      let next = self.expression.evaluate(text, index, cache, Some(&effective_name), rules);
      let grew = match (&next, &last) {
        (Ok(n), Ok(l)) => n.matched.characters_count() > l.matched.characters_count(),
        _ => false,
      };
      if !grew {
        break;
      }
      last = next;
      cache.insert(&effective_name, index, last.clone());
    }
    last
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expressions::Success;
  use crate::match_tree::{Match, MatchLeaf};

  fn text(s: &str) -> Vec<char> {
    s.chars().collect()
  }

  #[test]
  fn non_left_recursive_caches_result() {
    let rule = Rule::non_left_recursive("S", Expression::SingleQuotedLiteral("a".to_owned()));
    let rules = vec![];
    let mut cache = Cache::new();
    let first = rule.parse_at(&text("a"), 0, &mut cache, None, &rules);
    let second = rule.parse_at(&text("a"), 0, &mut cache, None, &rules);
    assert_eq!(first, second);
  }

  #[test]
  fn effective_name_prefers_caller_label() {
    let rule = Rule::non_left_recursive("S", Expression::SingleQuotedLiteral("a".to_owned()));
    let rules = vec![];
    let mut cache = Cache::new();
    let result = rule.parse_at(&text("a"), 0, &mut cache, Some("Parent"), &rules).unwrap();
    assert_eq!(result.matched.rule_name(), Some("Parent"));
  }

  #[test]
  fn match_leaf_rule_name_roundtrips() {
    let m = Match::Leaf(MatchLeaf::new(Some("S".to_owned()), "a".to_owned()));
    let success = Success::new(m, None);
    assert_eq!(success.matched.rule_name(), Some("S"));
  }
}
