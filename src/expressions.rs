//! The PEG expression algebra: a single tagged union covering all fifteen
//! variants, their evaluation, and their textual rendering.

use std::fmt;

use crate::match_tree::{LookaheadMatch, Match, MatchLeaf, MatchTree};
use crate::mismatch::{Mismatch, MismatchLeaf, MismatchTree};
use crate::rule::{Cache, Rule};

/// Precedence, loosest-binding first, used to decide when `Display`
/// needs to wrap a child expression in parentheses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
  PrioritizedChoice,
  Sequence,
  Repetition,
  Lookahead,
  Term,
}

/// A successful evaluation: the match itself, plus an optional trailing
/// mismatch retained purely as diagnostic context for a later failure
/// (e.g. what a `*` loop's final, unsuccessful iteration expected).
#[derive(Clone, Debug, PartialEq)]
pub struct Success {
  pub matched: Match,
  pub trailing_mismatch: Option<Mismatch>,
}

impl Success {
  pub fn new(matched: Match, trailing_mismatch: Option<Mismatch>) -> Self {
    Success { matched, trailing_mismatch }
  }
}

pub type EvalResult = Result<Success, Mismatch>;

/// The fifteen PEG expression variants.
#[derive(Clone, Debug, PartialEq)]
pub enum Expression {
  AnyCharacter,
  CharacterClass(Vec<crate::character_containers::CharacterContainer>),
  ComplementedCharacterClass(Vec<crate::character_containers::CharacterContainer>),
  DoubleQuotedLiteral(String),
  SingleQuotedLiteral(String),
  Sequence(Vec<Expression>),
  PrioritizedChoice(Vec<Expression>),
  Optional(Box<Expression>),
  ZeroOrMore(Box<Expression>),
  OneOrMore(Box<Expression>),
  ExactRepetition(Box<Expression>, usize),
  PositiveOrMore(Box<Expression>, usize),
  PositiveRepetitionRange(Box<Expression>, usize, usize),
  ZeroRepetitionRange(Box<Expression>, usize),
  PositiveLookahead(Box<Expression>),
  NegativeLookahead(Box<Expression>),
  RuleReference(String, usize),
}

impl Expression {
  pub fn precedence(&self) -> Precedence {
    match self {
      Expression::PrioritizedChoice(_) => Precedence::PrioritizedChoice,
      Expression::Sequence(_) => Precedence::Sequence,
      Expression::Optional(_)
      | Expression::ZeroOrMore(_)
      | Expression::OneOrMore(_)
      | Expression::ExactRepetition(_, _)
      | Expression::PositiveOrMore(_, _)
      | Expression::PositiveRepetitionRange(_, _, _)
      | Expression::ZeroRepetitionRange(_, _) => Precedence::Repetition,
      Expression::PositiveLookahead(_) | Expression::NegativeLookahead(_) => Precedence::Lookahead,
      Expression::AnyCharacter
      | Expression::CharacterClass(_)
      | Expression::ComplementedCharacterClass(_)
      | Expression::DoubleQuotedLiteral(_)
      | Expression::SingleQuotedLiteral(_)
      | Expression::RuleReference(_, _) => Precedence::Term,
    }
  }

  /// True if no successful match of this expression ever consumes a
  /// character (used by sequence-construction and by the quantifier/
  /// lookahead constructors that forbid wrapping a non-progressing
  /// expression).
  pub fn is_progressing(&self) -> bool {
    !matches!(
      self,
      Expression::Optional(_)
        | Expression::ZeroOrMore(_)
        | Expression::ZeroRepetitionRange(_, _)
        | Expression::PositiveLookahead(_)
        | Expression::NegativeLookahead(_)
    )
  }

  pub fn to_expected_message(&self) -> String {
    match self {
      Expression::AnyCharacter => "any character".to_owned(),
      Expression::CharacterClass(_) | Expression::ComplementedCharacterClass(_) => format!("a character from {}", self),
      Expression::DoubleQuotedLiteral(s) => python_repr(s),
      Expression::SingleQuotedLiteral(s) => python_repr(s),
      Expression::Sequence(elements) => elements.iter().map(Expression::to_expected_message).collect::<Vec<_>>().join(" followed by "),
      Expression::PrioritizedChoice(variants) => variants.iter().map(Expression::to_expected_message).collect::<Vec<_>>().join(" or "),
      Expression::Optional(inner) => format!("{} repeated at most once", inner.to_expected_message()),
      Expression::ZeroOrMore(inner) => format!("{} repeated any amount of times or none at all", inner.to_expected_message()),
      Expression::OneOrMore(inner) => format!("{} repeated at least once", inner.to_expected_message()),
      Expression::ExactRepetition(inner, count) => format!("{} repeated {} times", inner.to_expected_message(), count),
      Expression::PositiveOrMore(inner, start) => format!("{} repeated at least {} times", inner.to_expected_message(), start),
      Expression::PositiveRepetitionRange(inner, start, end) => format!("{} repeated from {} to {} times", inner.to_expected_message(), start, end),
      Expression::ZeroRepetitionRange(inner, end) => format!("{} repeated at most {} times", inner.to_expected_message(), end),
      Expression::PositiveLookahead(inner) => inner.to_expected_message(),
      Expression::NegativeLookahead(inner) => format!("not {}", inner.to_expected_message()),
      Expression::RuleReference(name, _) => name.clone(),
    }
  }

  /// The seed failure used to enter a left-recursive rule's memo slot
  /// before its first evaluation. Returns `None` for variants that must
  /// never occupy a left-recursive rule's top position (Optional,
  /// ZeroRepetitionRange) — callers rely on grammar construction to have
  /// already rejected that combination (see `GrammarBuildError::SeedFailureForbidden`).
  pub fn to_seed_failure(&self, rule_name: Option<&str>) -> Option<Mismatch> {
    let origin = || rule_name.map(str::to_owned).unwrap_or_else(|| self.to_string());
    match self {
      Expression::Optional(_) | Expression::ZeroRepetitionRange(_, _) => None,
      Expression::Sequence(elements) => Some(Mismatch::Tree(MismatchTree::new(origin(), vec![Mismatch::Leaf(MismatchLeaf::new(elements[0].to_string(), "", 0, 1))]))),
      Expression::PrioritizedChoice(variants) => Some(Mismatch::Tree(MismatchTree::new(origin(), vec![Mismatch::Leaf(MismatchLeaf::new(variants[0].to_string(), "", 0, 1))]))),
      Expression::OneOrMore(inner) | Expression::ExactRepetition(inner, _) | Expression::PositiveOrMore(inner, _) | Expression::PositiveRepetitionRange(inner, _, _) | Expression::ZeroOrMore(inner) => {
        Some(Mismatch::Tree(MismatchTree::new(origin(), vec![Mismatch::Leaf(MismatchLeaf::new(inner.to_string(), "", 0, 1))])))
      }
      _ => Some(Mismatch::Leaf(MismatchLeaf::new(origin(), "", 0, 1))),
    }
  }

  /// Evaluates this expression against `text` (indexed by code point,
  /// not byte) starting at `index`. `rule_name` is the effective name to
  /// tag produced matches/mismatches with; most recursive calls pass
  /// `None` so inner nodes stay anonymous.
  pub fn evaluate(&self, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule]) -> EvalResult {
    match self {
      Expression::AnyCharacter => {
        if index < text.len() {
          Ok(Success::new(Match::Leaf(MatchLeaf::new(rule_name.map(str::to_owned), text[index].to_string())), None))
        } else {
          Err(Mismatch::Leaf(MismatchLeaf::new(origin_or_repr(rule_name, self), self.to_expected_message(), index, index)))
        }
      }
      Expression::CharacterClass(elements) => eval_character_class(elements, text, index, rule_name, self, false),
      Expression::ComplementedCharacterClass(elements) => eval_character_class(elements, text, index, rule_name, self, true),
      Expression::DoubleQuotedLiteral(literal) | Expression::SingleQuotedLiteral(literal) => {
        let chars: Vec<char> = literal.chars().collect();
        if text.len() >= index + chars.len() && text[index..index + chars.len()] == chars[..] {
          Ok(Success::new(Match::Leaf(MatchLeaf::new(rule_name.map(str::to_owned), literal.clone())), None))
        } else {
          Err(Mismatch::Leaf(MismatchLeaf::new(origin_or_repr(rule_name, self), self.to_expected_message(), index, index + 1)))
        }
      }
      Expression::Sequence(elements) => eval_sequence(elements, text, index, cache, rule_name, rules, self),
      Expression::PrioritizedChoice(variants) => eval_prioritized_choice(variants, text, index, cache, rule_name, rules, self),
      Expression::Optional(inner) => {
        match inner.evaluate(text, index, cache, rule_name, rules) {
          Ok(success) => Ok(success),
          Err(mismatch) => Ok(Success::new(Match::Lookahead(LookaheadMatch::new(rule_name.map(str::to_owned))), Some(mismatch))),
        }
      }
      Expression::ZeroOrMore(inner) => Ok(eval_zero_or_more(inner, text, index, cache, rule_name, rules, self)),
      Expression::OneOrMore(inner) => eval_one_or_more(inner, text, index, cache, rule_name, rules, self),
      Expression::ExactRepetition(inner, count) => eval_exact_repetition(inner, *count, text, index, cache, rule_name, rules, self),
      Expression::PositiveOrMore(inner, start) => eval_positive_or_more(inner, *start, text, index, cache, rule_name, rules, self),
      Expression::PositiveRepetitionRange(inner, start, end) => eval_positive_repetition_range(inner, *start, *end, text, index, cache, rule_name, rules, self),
      Expression::ZeroRepetitionRange(inner, end) => Ok(eval_zero_repetition_range(inner, *end, text, index, cache, rule_name, rules, self)),
      Expression::PositiveLookahead(inner) => eval_positive_lookahead(inner, text, index, cache, rule_name, rules, self),
      Expression::NegativeLookahead(inner) => eval_negative_lookahead(inner, text, index, cache, rule_name, rules, self),
      Expression::RuleReference(name, rule_id) => rules[*rule_id].parse_at(text, index, cache, Some(name), rules),
    }
  }
}

fn origin_or_repr(rule_name: Option<&str>, expression: &Expression) -> String {
  rule_name.map(str::to_owned).unwrap_or_else(|| expression.to_string())
}

/// Renders `s` the way Python's `repr()` renders a `str`: single-quoted,
/// with `\'` and `\\` escaped.
fn python_repr(s: &str) -> String {
  let mut result = String::from("'");
  for c in s.chars() {
    result.push_str(&crate::character_containers::escape_single_quoted_literal_char(c));
  }
  result.push('\'');
  result
}

fn eval_character_class(elements: &[crate::character_containers::CharacterContainer], text: &[char], index: usize, rule_name: Option<&str>, expression: &Expression, complemented: bool) -> EvalResult {
  if index >= text.len() {
    return Err(Mismatch::Leaf(MismatchLeaf::new(origin_or_repr(rule_name, expression), expression.to_expected_message(), index, index)));
  }
  let c = text[index];
  let in_class = elements.iter().any(|e| e.contains(c));
  let matched = if complemented { !in_class } else { in_class };
  if matched {
    Ok(Success::new(Match::Leaf(MatchLeaf::new(rule_name.map(str::to_owned), c.to_string())), None))
  } else {
    Err(Mismatch::Leaf(MismatchLeaf::new(origin_or_repr(rule_name, expression), expression.to_expected_message(), index, index + 1)))
  }
}

fn eval_sequence(elements: &[Expression], text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  let mut successes: Vec<Success> = Vec::with_capacity(elements.len());
  let mut position = index;
  for element in elements {
    match element.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        if !success.matched.is_lookahead() {
          position += success.matched.characters_count();
        }
        successes.push(success);
      }
      Err(mismatch) => {
        let mut children: Vec<Mismatch> = successes
          .iter()
          .filter_map(|s| s.trailing_mismatch.as_ref())
          .filter(|prior| prior.stop_index() == mismatch.stop_index())
          .cloned()
          .collect();
        children.push(mismatch);
        return Err(Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), children)));
      }
    }
  }
  let children: Vec<Match> = successes.into_iter().filter(|s| !s.matched.is_lookahead()).map(|s| s.matched).collect();
  Ok(Success::new(Match::Tree(MatchTree::new(rule_name.map(str::to_owned), children)), None))
}

fn eval_prioritized_choice(variants: &[Expression], text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  let mut mismatches = Vec::with_capacity(variants.len());
  for variant in variants {
    match variant.evaluate(text, index, cache, rule_name, rules) {
      Ok(success) => return Ok(success),
      Err(mismatch) => mismatches.push(mismatch),
    }
  }
  Err(Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), mismatches)))
}

fn eval_zero_or_more(inner: &Expression, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> Success {
  let mut matches = Vec::new();
  let mut position = index;
  let last_mismatch;
  loop {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => {
        last_mismatch = mismatch;
        break;
      }
    }
  }
  let matched = if matches.is_empty() {
    Match::Lookahead(LookaheadMatch::new(rule_name.map(str::to_owned)))
  } else {
    Match::Tree(MatchTree::new(rule_name.map(str::to_owned), matches))
  };
  let trailing = Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![last_mismatch]));
  Success::new(matched, Some(trailing))
}

fn eval_one_or_more(inner: &Expression, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  let mut position = index;
  let first = inner.evaluate(text, position, cache, None, rules);
  let mut matches = match first {
    Ok(success) => {
      position += success.matched.characters_count();
      vec![success.matched]
    }
    Err(mismatch) => return Err(Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![mismatch]))),
  };
  let last_mismatch;
  loop {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => {
        last_mismatch = mismatch;
        break;
      }
    }
  }
  let trailing = Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![last_mismatch]));
  Ok(Success::new(Match::Tree(MatchTree::new(rule_name.map(str::to_owned), matches)), Some(trailing)))
}

fn eval_exact_repetition(inner: &Expression, count: usize, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  let mut position = index;
  let mut matches = Vec::with_capacity(count);
  for _ in 0..count {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => return Err(Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![mismatch]))),
    }
  }
  Ok(Success::new(Match::Tree(MatchTree::new(rule_name.map(str::to_owned), matches)), None))
}

fn eval_positive_or_more(inner: &Expression, start: usize, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  let mut position = index;
  let mut matches = Vec::new();
  for _ in 0..start {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => return Err(Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![mismatch]))),
    }
  }
  let trailing = loop {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => break Some(mismatch),
    }
  };
  Ok(Success::new(Match::Tree(MatchTree::new(rule_name.map(str::to_owned), matches)), trailing))
}

fn eval_positive_repetition_range(inner: &Expression, start: usize, end: usize, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  let mut position = index;
  let mut matches = Vec::new();
  for _ in 0..start {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => return Err(Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![mismatch]))),
    }
  }
  let mut final_mismatch = None;
  for _ in start..end {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => {
        final_mismatch = Some(mismatch);
        break;
      }
    }
  }
  let trailing = final_mismatch.map(|m| Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![m])));
  Ok(Success::new(Match::Tree(MatchTree::new(rule_name.map(str::to_owned), matches)), trailing))
}

fn eval_zero_repetition_range(inner: &Expression, end: usize, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> Success {
  let mut position = index;
  let mut matches = Vec::new();
  let mut final_mismatch = None;
  for _ in 0..end {
    match inner.evaluate(text, position, cache, None, rules) {
      Ok(success) => {
        position += success.matched.characters_count();
        matches.push(success.matched);
      }
      Err(mismatch) => {
        final_mismatch = Some(mismatch);
        break;
      }
    }
  }
  let matched = if matches.is_empty() {
    Match::Lookahead(LookaheadMatch::new(rule_name.map(str::to_owned)))
  } else {
    Match::Tree(MatchTree::new(rule_name.map(str::to_owned), matches.clone()))
  };
  let trailing = match final_mismatch {
    None => None,
    Some(m) if matches.is_empty() => Some(m),
    Some(m) => Some(Mismatch::Tree(MismatchTree::new(origin_or_repr(rule_name, expression), vec![m]))),
  };
  Success::new(matched, trailing)
}

fn eval_positive_lookahead(inner: &Expression, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  match inner.evaluate(text, index, cache, None, rules) {
    Ok(_) => Ok(Success::new(Match::Lookahead(LookaheadMatch::new(rule_name.map(str::to_owned))), None)),
    Err(mismatch) => Err(Mismatch::Leaf(MismatchLeaf::new(origin_or_repr(rule_name, expression), expression.to_expected_message(), index, mismatch.stop_index()))),
  }
}

fn eval_negative_lookahead(inner: &Expression, text: &[char], index: usize, cache: &mut Cache, rule_name: Option<&str>, rules: &[Rule], expression: &Expression) -> EvalResult {
  match inner.evaluate(text, index, cache, None, rules) {
    Ok(success) => Err(Mismatch::Leaf(MismatchLeaf::new(origin_or_repr(rule_name, expression), expression.to_expected_message(), index, index + success.matched.characters_count().max(1)))),
    Err(mismatch) => Ok(Success::new(Match::Lookahead(LookaheadMatch::new(rule_name.map(str::to_owned))), Some(mismatch))),
  }
}

impl fmt::Display for Expression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Expression::AnyCharacter => write!(f, "."),
      Expression::CharacterClass(elements) => {
        write!(f, "[")?;
        for e in elements {
          write!(f, "{}", e)?;
        }
        write!(f, "]")
      }
      Expression::ComplementedCharacterClass(elements) => {
        write!(f, "[^")?;
        for e in elements {
          write!(f, "{}", e)?;
        }
        write!(f, "]")
      }
      Expression::DoubleQuotedLiteral(s) => {
        write!(f, "\"")?;
        for c in s.chars() {
          write!(f, "{}", crate::character_containers::escape_double_quoted_literal_char(c))?;
        }
        write!(f, "\"")
      }
      Expression::SingleQuotedLiteral(s) => {
        write!(f, "'")?;
        for c in s.chars() {
          write!(f, "{}", crate::character_containers::escape_single_quoted_literal_char(c))?;
        }
        write!(f, "'")
      }
      Expression::Sequence(elements) => {
        let parent = self.precedence();
        write!(f, "{}", elements.iter().map(|e| nested(e, parent)).collect::<Vec<_>>().join(" "))
      }
      Expression::PrioritizedChoice(variants) => {
        let parent = self.precedence();
        write!(f, "{}", variants.iter().map(|e| nested(e, parent)).collect::<Vec<_>>().join(" / "))
      }
      Expression::Optional(inner) => write!(f, "{}?", nested(inner, self.precedence())),
      Expression::ZeroOrMore(inner) => write!(f, "{}*", nested(inner, self.precedence())),
      Expression::OneOrMore(inner) => write!(f, "{}+", nested(inner, self.precedence())),
      Expression::ExactRepetition(inner, count) => write!(f, "{}{{{}}}", nested(inner, self.precedence()), count),
      Expression::PositiveOrMore(inner, start) => write!(f, "{}{{{},}}", nested(inner, self.precedence()), start),
      Expression::PositiveRepetitionRange(inner, start, end) => write!(f, "{}{{{},{}}}", nested(inner, self.precedence()), start, end),
      Expression::ZeroRepetitionRange(inner, end) => write!(f, "{}{{,{}}}", nested(inner, self.precedence()), end),
      Expression::PositiveLookahead(inner) => write!(f, "&{}", nested(inner, self.precedence())),
      Expression::NegativeLookahead(inner) => write!(f, "!{}", nested(inner, self.precedence())),
      Expression::RuleReference(name, _) => write!(f, "{}", name),
    }
  }
}

fn nested(expression: &Expression, parent_precedence: Precedence) -> String {
  if parent_precedence >= expression.precedence() {
    format!("({})", expression)
  } else {
    expression.to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::character_containers::{CharacterContainer, CharacterRange};

  fn text(s: &str) -> Vec<char> {
    s.chars().collect()
  }

  #[test]
  fn any_character_matches_when_input_remains() {
    let expr = Expression::AnyCharacter;
    let mut cache = Cache::new();
    let result = expr.evaluate(&text("a"), 0, &mut cache, None, &[]).unwrap();
    assert_eq!(result.matched.characters_count(), 1);
  }

  #[test]
  fn character_class_rejects_outside_range() {
    let expr = Expression::CharacterClass(vec![CharacterContainer::Range(CharacterRange::new('a', 'z'))]);
    let mut cache = Cache::new();
    assert!(expr.evaluate(&text("A"), 0, &mut cache, None, &[]).is_err());
  }

  #[test]
  fn display_matches_expected_surface_forms() {
    let literal = Expression::SingleQuotedLiteral("ab".to_owned());
    assert_eq!(literal.to_string(), "'ab'");
    let seq = Expression::Sequence(vec![literal.clone(), literal.clone()]);
    assert_eq!(seq.to_string(), "'ab' 'ab'");
    let choice = Expression::PrioritizedChoice(vec![seq.clone(), literal.clone()]);
    assert_eq!(choice.to_string(), "'ab' 'ab' / 'ab'");
  }

  #[test]
  fn literal_expected_message_is_single_quoted() {
    assert_eq!(Expression::SingleQuotedLiteral("b".to_owned()).to_expected_message(), "'b'");
    assert_eq!(Expression::DoubleQuotedLiteral("b".to_owned()).to_expected_message(), "'b'");
  }

  #[test]
  fn any_character_mismatch_at_end_of_input_has_zero_width_span() {
    let expr = Expression::AnyCharacter;
    let mut cache = Cache::new();
    let mismatch = expr.evaluate(&text("a"), 1, &mut cache, None, &[]).unwrap_err();
    assert_eq!(mismatch.start_index(), 1);
    assert_eq!(mismatch.stop_index(), 1);
  }

  #[test]
  fn character_class_mismatch_at_end_of_input_has_zero_width_span() {
    let expr = Expression::CharacterClass(vec![CharacterContainer::Range(CharacterRange::new('a', 'z'))]);
    let mut cache = Cache::new();
    let mismatch = expr.evaluate(&text("a"), 1, &mut cache, None, &[]).unwrap_err();
    assert_eq!(mismatch.start_index(), 1);
    assert_eq!(mismatch.stop_index(), 1);
  }
}
