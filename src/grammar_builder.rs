//! Mutable staging area for a grammar under construction: validates
//! references, redefinitions, termination and reachability, then emits
//! a [`Grammar`] with each rule correctly classified.

use std::collections::HashMap;

use thiserror::Error;

use crate::character_containers::{merge_consecutive_character_sets, CharacterContainer};
use crate::expression_builders::{BuilderId, BuilderTable, ExpressionBuilder, RuleId};
use crate::expressions::Expression;
use crate::grammar::Grammar;
use crate::rule::Rule;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum GrammarBuildError {
  #[error("rule '{name}' is referenced but never defined")]
  UnknownRuleReference { name: String },
  #[error("rule '{name}' is defined more than once")]
  RuleRedefinition { name: String },
  #[error("reference cycle among bare rule references: {}", names.join(" <- "))]
  ReferenceCycle { names: Vec<String> },
  #[error("non-progressing operand where progression is required: {context}")]
  NonProgressingOperand { context: String },
  #[error("rule '{rule}' has a nullable sequence (every element can match zero characters)")]
  NullableSequence { rule: String },
  #[error("in a prioritized choice, only the last variant may always match (variant {variant_index} always matches)")]
  NonLastAlwaysMatches { rule: String, variant_index: usize },
  #[error("invalid repetition bound: {detail}")]
  InvalidRepetitionBound { detail: String },
  #[error("rule '{name}' is not terminating: it can recurse into itself without consuming input")]
  NonTerminatingRule { name: String },
  #[error("builder index {index} is unreachable from every rule")]
  UnreachableBuilder { index: usize },
  #[error("character class must have at least one element")]
  EmptyCharacterClass,
  #[error("literal must be non-empty")]
  EmptyLiteral,
  #[error("rule '{name}' may not have a bare lookahead as its entire body")]
  BareLookaheadRule { name: String },
  #[error("left-recursive rule '{name}' has a top expression that cannot be seeded")]
  SeedFailureForbidden { name: String },
  #[error("invalid builder index {index}")]
  InvalidIndex { index: usize },
  #[error("no rules were defined")]
  EmptyGrammar,
}

pub struct GrammarBuilder {
  builders: Vec<ExpressionBuilder>,
  rule_names: Vec<String>,
  rule_builder: Vec<Option<BuilderId>>,
  name_to_rule: HashMap<String, RuleId>,
}

impl Default for GrammarBuilder {
  fn default() -> Self {
    Self::new()
  }
}

impl GrammarBuilder {
  pub fn new() -> Self {
    GrammarBuilder { builders: Vec::new(), rule_names: Vec::new(), rule_builder: Vec::new(), name_to_rule: HashMap::new() }
  }

  fn push(&mut self, builder: ExpressionBuilder) -> BuilderId {
    self.builders.push(builder);
    self.builders.len() - 1
  }

  fn declare_rule(&mut self, name: &str) -> RuleId {
    if let Some(&id) = self.name_to_rule.get(name) {
      return id;
    }
    let id = self.rule_names.len();
    self.rule_names.push(name.to_owned());
    self.rule_builder.push(None);
    self.name_to_rule.insert(name.to_owned(), id);
    id
  }

  fn check(&self, id: BuilderId) -> Result<(), GrammarBuildError> {
    if id >= self.builders.len() {
      Err(GrammarBuildError::InvalidIndex { index: id })
    } else {
      Ok(())
    }
  }

  fn require_progressing(&self, id: BuilderId, context: &str) -> Result<(), GrammarBuildError> {
    self.check(id)?;
    if self.builders[id].is_shallow_progressing() {
      Ok(())
    } else {
      Err(GrammarBuildError::NonProgressingOperand { context: context.to_owned() })
    }
  }

  // -- Factory methods: one per §4.3 expression variant --------------

  pub fn any_character(&mut self) -> BuilderId {
    self.push(ExpressionBuilder::AnyCharacter)
  }

  pub fn character_class(&mut self, elements: Vec<CharacterContainer>) -> Result<BuilderId, GrammarBuildError> {
    if elements.is_empty() {
      return Err(GrammarBuildError::EmptyCharacterClass);
    }
    Ok(self.push(ExpressionBuilder::CharacterClass(merge_consecutive_character_sets(elements))))
  }

  pub fn complemented_character_class(&mut self, elements: Vec<CharacterContainer>) -> Result<BuilderId, GrammarBuildError> {
    if elements.is_empty() {
      return Err(GrammarBuildError::EmptyCharacterClass);
    }
    Ok(self.push(ExpressionBuilder::ComplementedCharacterClass(merge_consecutive_character_sets(elements))))
  }

  pub fn double_quoted_literal(&mut self, value: impl Into<String>) -> Result<BuilderId, GrammarBuildError> {
    let value = value.into();
    if value.is_empty() {
      return Err(GrammarBuildError::EmptyLiteral);
    }
    Ok(self.push(ExpressionBuilder::DoubleQuotedLiteral(value)))
  }

  pub fn single_quoted_literal(&mut self, value: impl Into<String>) -> Result<BuilderId, GrammarBuildError> {
    let value = value.into();
    if value.is_empty() {
      return Err(GrammarBuildError::EmptyLiteral);
    }
    Ok(self.push(ExpressionBuilder::SingleQuotedLiteral(value)))
  }

  pub fn sequence(&mut self, elements: Vec<BuilderId>) -> Result<BuilderId, GrammarBuildError> {
    if elements.len() < 2 {
      return Err(GrammarBuildError::NonProgressingOperand { context: "sequence needs at least two elements".to_owned() });
    }
    for &e in &elements {
      self.check(e)?;
    }
    if !elements.iter().any(|&e| self.builders[e].is_shallow_progressing()) {
      return Err(GrammarBuildError::NonProgressingOperand { context: "sequence of only lookaheads/optionals has no progressing element".to_owned() });
    }
    Ok(self.push(ExpressionBuilder::Sequence(elements)))
  }

  pub fn prioritized_choice(&mut self, variants: Vec<BuilderId>) -> Result<BuilderId, GrammarBuildError> {
    if variants.len() < 2 {
      return Err(GrammarBuildError::NonProgressingOperand { context: "prioritized choice needs at least two variants".to_owned() });
    }
    for &v in &variants {
      self.check(v)?;
    }
    Ok(self.push(ExpressionBuilder::PrioritizedChoice(variants)))
  }

  pub fn optional(&mut self, inner: BuilderId) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "optional")?;
    Ok(self.push(ExpressionBuilder::Optional(inner)))
  }

  pub fn zero_or_more(&mut self, inner: BuilderId) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "zero-or-more")?;
    Ok(self.push(ExpressionBuilder::ZeroOrMore(inner)))
  }

  pub fn one_or_more(&mut self, inner: BuilderId) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "one-or-more")?;
    Ok(self.push(ExpressionBuilder::OneOrMore(inner)))
  }

  pub fn exact_repetition(&mut self, inner: BuilderId, count: usize) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "exact repetition")?;
    if count < 2 {
      return Err(GrammarBuildError::InvalidRepetitionBound { detail: format!("exact repetition count must be >= 2, got {count}") });
    }
    Ok(self.push(ExpressionBuilder::ExactRepetition(inner, count)))
  }

  pub fn positive_or_more(&mut self, inner: BuilderId, start: usize) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "positive-or-more repetition")?;
    if start < 2 {
      return Err(GrammarBuildError::InvalidRepetitionBound { detail: format!("positive-or-more start must be >= 2, got {start}") });
    }
    Ok(self.push(ExpressionBuilder::PositiveOrMore(inner, start)))
  }

  pub fn positive_repetition_range(&mut self, inner: BuilderId, start: usize, end: usize) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "positive repetition range")?;
    if start < 1 || end <= start {
      return Err(GrammarBuildError::InvalidRepetitionBound { detail: format!("repetition range needs 1 <= start < end, got {start}..{end}") });
    }
    Ok(self.push(ExpressionBuilder::PositiveRepetitionRange(inner, start, end)))
  }

  pub fn zero_repetition_range(&mut self, inner: BuilderId, end: usize) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "zero repetition range")?;
    if end < 2 {
      return Err(GrammarBuildError::InvalidRepetitionBound { detail: format!("zero repetition range end must be >= 2, got {end}") });
    }
    Ok(self.push(ExpressionBuilder::ZeroRepetitionRange(inner, end)))
  }

  pub fn positive_lookahead(&mut self, inner: BuilderId) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "positive lookahead")?;
    Ok(self.push(ExpressionBuilder::PositiveLookahead(inner)))
  }

  pub fn negative_lookahead(&mut self, inner: BuilderId) -> Result<BuilderId, GrammarBuildError> {
    self.require_progressing(inner, "negative lookahead")?;
    Ok(self.push(ExpressionBuilder::NegativeLookahead(inner)))
  }

  pub fn rule_reference(&mut self, name: impl Into<String>) -> BuilderId {
    let name = name.into();
    let rule_id = self.declare_rule(&name);
    self.push(ExpressionBuilder::RuleReference(name, rule_id))
  }

  /// Associates `name` with the expression built at `builder_index`. A
  /// rule that was only forward-referenced so far (declared but unset)
  /// gets filled in; redefining an already-set rule is an error.
  pub fn add_rule(&mut self, name: impl Into<String>, builder_index: BuilderId) -> Result<(), GrammarBuildError> {
    let name = name.into();
    self.check(builder_index)?;
    let rule_id = self.declare_rule(&name);
    match self.rule_builder[rule_id] {
      Some(_) => Err(GrammarBuildError::RuleRedefinition { name }),
      None => {
        self.rule_builder[rule_id] = Some(builder_index);
        Ok(())
      }
    }
  }

  pub fn build(self) -> Result<Grammar, GrammarBuildError> {
    self.build_instrumented()
  }

  #[tracing::instrument(skip(self))]
  fn build_instrumented(self) -> Result<Grammar, GrammarBuildError> {
    if self.rule_names.is_empty() {
      return Err(GrammarBuildError::EmptyGrammar);
    }

    // a) every declared rule must be defined.
    for (id, slot) in self.rule_builder.iter().enumerate() {
      if slot.is_none() {
        return Err(GrammarBuildError::UnknownRuleReference { name: self.rule_names[id].clone() });
      }
    }

    // e) cycles among pure RuleReference -> RuleReference chains.
    for id in 0..self.rule_names.len() {
      self.check_reference_chain(id)?;
    }

    let table = BuilderTable { builders: &self.builders, rule_builder: &self.rule_builder };

    // bare-lookahead-as-entire-body is rejected up front, matching the
    // "sequence of only lookaheads is an error" rule extended to a rule
    // body that is nothing but a lookahead with no enclosing sequence.
    for id in 0..self.rule_names.len() {
      let top = self.rule_builder[id].unwrap();
      if self.builders[top].is_bare_lookahead() {
        return Err(GrammarBuildError::BareLookaheadRule { name: self.rule_names[id].clone() });
      }
    }

    // b) classify left-recursion.
    let mut left_recursive = vec![false; self.rule_names.len()];
    for id in 0..self.rule_names.len() {
      let top = self.rule_builder[id].unwrap();
      let is_lr = table.is_left_recursive(top, id);
      tracing::debug!(rule = %self.rule_names[id], left_recursive = is_lr, "classified rule");
      left_recursive[id] = is_lr;
    }

    // c) termination.
    for id in 0..self.rule_names.len() {
      let top = self.rule_builder[id].unwrap();
      if !table.is_terminating(top, true) {
        return Err(GrammarBuildError::NonTerminatingRule { name: self.rule_names[id].clone() });
      }
    }

    // d) reachability.
    let mut reachable = vec![false; self.builders.len()];
    let mut stack: Vec<BuilderId> = self.rule_builder.iter().map(|s| s.unwrap()).collect();
    while let Some(id) = stack.pop() {
      if reachable[id] {
        continue;
      }
      reachable[id] = true;
      stack.extend(self.builders[id].children());
    }
    if let Some(index) = reachable.iter().position(|&r| !r) {
      return Err(GrammarBuildError::UnreachableBuilder { index });
    }

    // f) realize each rule's expression, checking deep semantic rules
    // that need every rule resolved (nullable sequences, non-last
    // always-matches choices), and the seed-failure precondition for
    // left-recursive rules.
    let mut rules = Vec::with_capacity(self.rule_names.len());
    for id in 0..self.rule_names.len() {
      let top = self.rule_builder[id].unwrap();
      let expression = realize(top, &self.builders, &self.rule_names, &table, &self.rule_names[id])?;
      if left_recursive[id] && expression.to_seed_failure(Some(&self.rule_names[id])).is_none() {
        return Err(GrammarBuildError::SeedFailureForbidden { name: self.rule_names[id].clone() });
      }
      let rule = if left_recursive[id] { Rule::left_recursive(self.rule_names[id].clone(), expression) } else { Rule::non_left_recursive(self.rule_names[id].clone(), expression) };
      rules.push(rule);
    }

    Ok(Grammar::new(rules))
  }

  fn check_reference_chain(&self, start: RuleId) -> Result<(), GrammarBuildError> {
    let mut chain = vec![start];
    let mut current = start;
    loop {
      let top = self.rule_builder[current].unwrap();
      match &self.builders[top] {
        ExpressionBuilder::RuleReference(_, next) => {
          if chain.contains(next) {
            let names = chain.iter().map(|&id| self.rule_names[id].clone()).collect();
            return Err(GrammarBuildError::ReferenceCycle { names });
          }
          chain.push(*next);
          current = *next;
        }
        _ => return Ok(()),
      }
    }
  }
}

fn realize(id: BuilderId, builders: &[ExpressionBuilder], rule_names: &[String], table: &BuilderTable, rule_context: &str) -> Result<Expression, GrammarBuildError> {
  let expression = match &builders[id] {
    ExpressionBuilder::AnyCharacter => Expression::AnyCharacter,
    ExpressionBuilder::CharacterClass(elements) => Expression::CharacterClass(elements.clone()),
    ExpressionBuilder::ComplementedCharacterClass(elements) => Expression::ComplementedCharacterClass(elements.clone()),
    ExpressionBuilder::DoubleQuotedLiteral(s) => Expression::DoubleQuotedLiteral(s.clone()),
    ExpressionBuilder::SingleQuotedLiteral(s) => Expression::SingleQuotedLiteral(s.clone()),
    ExpressionBuilder::Sequence(elements) => {
      if elements.iter().all(|&e| table.is_nullable(e)) {
        return Err(GrammarBuildError::NullableSequence { rule: rule_context.to_owned() });
      }
      let children = elements.iter().map(|&e| realize(e, builders, rule_names, table, rule_context)).collect::<Result<Vec<_>, _>>()?;
      Expression::Sequence(children)
    }
    ExpressionBuilder::PrioritizedChoice(variants) => {
      for (i, &v) in variants.iter().enumerate() {
        if i + 1 < variants.len() && table.always_matches(v) {
          return Err(GrammarBuildError::NonLastAlwaysMatches { rule: rule_context.to_owned(), variant_index: i });
        }
      }
      let children = variants.iter().map(|&v| realize(v, builders, rule_names, table, rule_context)).collect::<Result<Vec<_>, _>>()?;
      Expression::PrioritizedChoice(children)
    }
    ExpressionBuilder::Optional(inner) => Expression::Optional(Box::new(realize(*inner, builders, rule_names, table, rule_context)?)),
    ExpressionBuilder::ZeroOrMore(inner) => Expression::ZeroOrMore(Box::new(realize(*inner, builders, rule_names, table, rule_context)?)),
    ExpressionBuilder::OneOrMore(inner) => Expression::OneOrMore(Box::new(realize(*inner, builders, rule_names, table, rule_context)?)),
    ExpressionBuilder::ExactRepetition(inner, count) => Expression::ExactRepetition(Box::new(realize(*inner, builders, rule_names, table, rule_context)?), *count),
    ExpressionBuilder::PositiveOrMore(inner, start) => Expression::PositiveOrMore(Box::new(realize(*inner, builders, rule_names, table, rule_context)?), *start),
    ExpressionBuilder::PositiveRepetitionRange(inner, start, end) => Expression::PositiveRepetitionRange(Box::new(realize(*inner, builders, rule_names, table, rule_context)?), *start, *end),
    ExpressionBuilder::ZeroRepetitionRange(inner, end) => Expression::ZeroRepetitionRange(Box::new(realize(*inner, builders, rule_names, table, rule_context)?), *end),
    ExpressionBuilder::PositiveLookahead(inner) => Expression::PositiveLookahead(Box::new(realize(*inner, builders, rule_names, table, rule_context)?)),
    ExpressionBuilder::NegativeLookahead(inner) => Expression::NegativeLookahead(Box::new(realize(*inner, builders, rule_names, table, rule_context)?)),
    ExpressionBuilder::RuleReference(name, rule_id) => Expression::RuleReference(name.clone(), *rule_id),
  };
  Ok(expression)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bare_self_reference_is_a_cycle() {
    let mut gb = GrammarBuilder::new();
    let r = gb.rule_reference("S");
    gb.add_rule("S", r).unwrap();
    assert!(matches!(gb.build(), Err(GrammarBuildError::ReferenceCycle { .. })));
  }

  #[test]
  fn redefining_a_rule_errors() {
    let mut gb = GrammarBuilder::new();
    let lit1 = gb.single_quoted_literal("a").unwrap();
    gb.add_rule("S", lit1).unwrap();
    let lit2 = gb.single_quoted_literal("b").unwrap();
    assert!(matches!(gb.add_rule("S", lit2), Err(GrammarBuildError::RuleRedefinition { .. })));
  }

  #[test]
  fn non_progressing_inside_optional_errors() {
    let mut gb = GrammarBuilder::new();
    let lit = gb.single_quoted_literal("a").unwrap();
    let opt = gb.optional(lit).unwrap();
    let result = gb.optional(opt);
    assert!(matches!(result, Err(GrammarBuildError::NonProgressingOperand { .. })));
  }

  #[test]
  fn bare_lookahead_rule_errors() {
    let mut gb = GrammarBuilder::new();
    let lit = gb.single_quoted_literal("x").unwrap();
    let look = gb.positive_lookahead(lit).unwrap();
    gb.add_rule("S", look).unwrap();
    assert!(matches!(gb.build(), Err(GrammarBuildError::BareLookaheadRule { .. })));
  }

  #[test]
  fn choice_with_non_last_always_matches_errors() {
    let mut gb = GrammarBuilder::new();
    let lit = gb.single_quoted_literal("a").unwrap();
    let opt = gb.optional(lit).unwrap();
    let lit2 = gb.single_quoted_literal("b").unwrap();
    let choice = gb.prioritized_choice(vec![opt, lit2]).unwrap();
    gb.add_rule("S", choice).unwrap();
    assert!(matches!(gb.build(), Err(GrammarBuildError::NonLastAlwaysMatches { .. })));
  }

  #[test]
  fn simple_literal_sequence_builds() {
    let mut gb = GrammarBuilder::new();
    let a = gb.single_quoted_literal("a").unwrap();
    let b = gb.single_quoted_literal("b").unwrap();
    let seq = gb.sequence(vec![a, b]).unwrap();
    gb.add_rule("S", seq).unwrap();
    let grammar = gb.build().unwrap();
    assert!(grammar.rule("S").is_some());
  }
}
