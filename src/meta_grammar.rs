//! The bootstrapping meta-grammar: a PEG describing PEG surface syntax,
//! built through [`GrammarBuilder`]'s own public factory API, plus a
//! tree-walking lifter that replays builder calls to reconstruct the
//! grammar a piece of grammar source text describes.

use std::sync::OnceLock;

use regex::Captures;
use thiserror::Error;

use crate::character_containers::{CharacterContainer, CharacterRange, CharacterSet};
use crate::expression_builders::BuilderId;
use crate::grammar::{Grammar, ParseError};
use crate::grammar_builder::{GrammarBuildError, GrammarBuilder};
use crate::match_tree::Match;

lazy_static! {
  static ref ESCAPE_PATTERN: regex::Regex = regex::Regex::new(r"\\.").expect("fixed escape pattern is valid");
}

fn decode_escapes(raw: &str) -> String {
  ESCAPE_PATTERN
    .replace_all(raw, |caps: &Captures| {
      let escaped = caps[0].chars().nth(1).expect("an escape sequence always has a character after the backslash");
      match escaped {
        'f' => "\u{000C}".to_owned(),
        'n' => "\n".to_owned(),
        'r' => "\r".to_owned(),
        't' => "\t".to_owned(),
        'v' => "\u{000B}".to_owned(),
        other => other.to_string(),
      }
    })
    .into_owned()
}

/// What a matched node's rule name means to the lifter. Parsed once from
/// the string so dispatch is a match over a closed set of variants; the
/// original name is kept only where a diagnostic might need it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RuleKind {
  Filler,
  Gap,
  Identifier,
  Dot,
  Group,
  CharacterClass,
  DoubleQuotedLiteral,
  SingleQuotedLiteral,
  ExactRepetition,
  RangeRepetition,
  Range,
  Other,
}

impl RuleKind {
  fn of(m: &Match) -> Self {
    match m.rule_name() {
      Some("Filler") => RuleKind::Filler,
      Some("Gap") => RuleKind::Gap,
      Some("Identifier") => RuleKind::Identifier,
      Some("Dot") => RuleKind::Dot,
      Some("Group") => RuleKind::Group,
      Some("CharacterClass") => RuleKind::CharacterClass,
      Some("DoubleQuotedLiteral") => RuleKind::DoubleQuotedLiteral,
      Some("SingleQuotedLiteral") => RuleKind::SingleQuotedLiteral,
      Some("ExactRepetition") => RuleKind::ExactRepetition,
      Some("RangeRepetition") => RuleKind::RangeRepetition,
      Some("Range") => RuleKind::Range,
      _ => RuleKind::Other,
    }
  }
}

/// Everything that can go wrong turning grammar source text into a
/// built [`Grammar`]: either the text doesn't parse against the
/// meta-grammar, or it parses but describes an invalid grammar.
#[derive(Debug, Error)]
pub enum LiftError {
  #[error("grammar source does not match the expected syntax:\n{0}")]
  Syntax(#[from] ParseError),
  #[error("described grammar is invalid: {0}")]
  Build(#[from] GrammarBuildError),
}

/// Drops every child tagged `Filler` (insignificant whitespace/comments)
/// so the remaining children sit at stable, predictable positions.
fn skip_filler(children: &[Match]) -> Vec<&Match> {
  children.iter().filter(|m| !matches!(RuleKind::of(m), RuleKind::Filler | RuleKind::Gap)).collect()
}

fn as_tree_children(m: &Match) -> &[Match] {
  match m {
    Match::Tree(t) => t.children(),
    other => panic!("expected a tree match, got {other:?}"),
  }
}

fn leaf_text(m: &Match) -> String {
  m.to_string()
}

// -- Building the meta-grammar itself --------------------------------

fn char_set(chars: &str) -> CharacterContainer {
  CharacterContainer::Set(CharacterSet::new(chars.to_owned()))
}

fn char_range(start: char, end: char) -> CharacterContainer {
  CharacterContainer::Range(CharacterRange::new(start, end))
}

fn build_meta_grammar() -> Grammar {
  let mut gb = GrammarBuilder::new();
  let err = "meta-grammar construction is fixed and known-valid";

  // Comment <- '#' [^\n]*
  let hash = gb.single_quoted_literal("#").expect(err);
  let non_newline = gb.complemented_character_class(vec![char_set("\n")]).expect(err);
  let comment_body = gb.zero_or_more(non_newline).expect(err);
  let comment_seq = gb.sequence(vec![hash, comment_body]).expect(err);
  gb.add_rule("Comment", comment_seq).expect(err);

  // Filler <- ( [ \t] / Comment )*  -- stays within a single line, so a
  // rule's expression never reaches across the newline into whatever
  // identifier starts the next rule definition.
  let inline_ws = gb.character_class(vec![char_set(" \t")]).expect(err);
  let comment_ref_inline = gb.rule_reference("Comment");
  let filler_item = gb.prioritized_choice(vec![inline_ws, comment_ref_inline]).expect(err);
  let filler_star = gb.zero_or_more(filler_item).expect(err);
  gb.add_rule("Filler", filler_star).expect(err);

  // Gap <- ( [ \t\r\n] / Comment )*  -- used only between rule definitions.
  let full_ws = gb.character_class(vec![char_set(" \t\r\n")]).expect(err);
  let comment_ref_gap = gb.rule_reference("Comment");
  let gap_item = gb.prioritized_choice(vec![full_ws, comment_ref_gap]).expect(err);
  let gap_star = gb.zero_or_more(gap_item).expect(err);
  gb.add_rule("Gap", gap_star).expect(err);

  // Identifier <- [A-Za-z_][A-Za-z0-9_]*
  let id_head = gb.character_class(vec![char_range('a', 'z'), char_range('A', 'Z'), char_set("_")]).expect(err);
  let id_tail = gb.character_class(vec![char_range('a', 'z'), char_range('A', 'Z'), char_range('0', '9'), char_set("_")]).expect(err);
  let id_tail_star = gb.zero_or_more(id_tail).expect(err);
  let id_seq = gb.sequence(vec![id_head, id_tail_star]).expect(err);
  gb.add_rule("Identifier", id_seq).expect(err);

  // Digits <- [0-9]+
  let digit = gb.character_class(vec![char_range('0', '9')]).expect(err);
  let digits = gb.one_or_more(digit).expect(err);
  gb.add_rule("Digits", digits).expect(err);

  // Dot <- '.'
  let dot = gb.single_quoted_literal(".").expect(err);
  gb.add_rule("Dot", dot).expect(err);

  // ExactRepetition <- '{' Digits '}'
  let digits_ref = gb.rule_reference("Digits");
  let open_brace = gb.single_quoted_literal("{").expect(err);
  let close_brace = gb.single_quoted_literal("}").expect(err);
  let exact_seq = gb.sequence(vec![open_brace, digits_ref, close_brace]).expect(err);
  gb.add_rule("ExactRepetition", exact_seq).expect(err);

  // RangeRepetition <- '{' Digits? ',' Digits? '}'
  let open_brace2 = gb.single_quoted_literal("{").expect(err);
  let digits_ref2 = gb.rule_reference("Digits");
  let start_opt = gb.optional(digits_ref2).expect(err);
  let comma = gb.single_quoted_literal(",").expect(err);
  let digits_ref3 = gb.rule_reference("Digits");
  let end_opt = gb.optional(digits_ref3).expect(err);
  let close_brace2 = gb.single_quoted_literal("}").expect(err);
  let range_rep_seq = gb.sequence(vec![open_brace2, start_opt, comma, end_opt, close_brace2]).expect(err);
  gb.add_rule("RangeRepetition", range_rep_seq).expect(err);

  // escaped-character helper: '\' . , used inside literals and classes
  let escape_seq = |gb: &mut GrammarBuilder| -> BuilderId {
    let backslash = gb.single_quoted_literal("\\").expect(err);
    let any = gb.any_character();
    gb.sequence(vec![backslash, any]).expect(err)
  };

  // DoubleQuotedLiteral <- '"' ( escape / [^"\\] )+ '"'
  let dq_escape = escape_seq(&mut gb);
  let dq_plain = gb.complemented_character_class(vec![char_set("\"\\")]).expect(err);
  let dq_char = gb.prioritized_choice(vec![dq_escape, dq_plain]).expect(err);
  let dq_body = gb.one_or_more(dq_char).expect(err);
  let dquote1 = gb.single_quoted_literal("\"").expect(err);
  let dquote2 = gb.single_quoted_literal("\"").expect(err);
  let dq_seq = gb.sequence(vec![dquote1, dq_body, dquote2]).expect(err);
  gb.add_rule("DoubleQuotedLiteral", dq_seq).expect(err);

  // SingleQuotedLiteral <- ''' ( escape / [^'\\] )+ '''
  let sq_escape = escape_seq(&mut gb);
  let sq_plain = gb.complemented_character_class(vec![char_set("'\\")]).expect(err);
  let sq_char = gb.prioritized_choice(vec![sq_escape, sq_plain]).expect(err);
  let sq_body = gb.one_or_more(sq_char).expect(err);
  let squote1 = gb.single_quoted_literal("'").expect(err);
  let squote2 = gb.single_quoted_literal("'").expect(err);
  let sq_seq = gb.sequence(vec![squote1, sq_body, squote2]).expect(err);
  gb.add_rule("SingleQuotedLiteral", sq_seq).expect(err);

  // Range <- ClassChar '-' ClassChar ; class char = escape / [^\]\\]
  let class_char = |gb: &mut GrammarBuilder| -> BuilderId {
    let esc = escape_seq(gb);
    let plain = gb.complemented_character_class(vec![char_set("]\\")]).expect(err);
    gb.prioritized_choice(vec![esc, plain]).expect(err)
  };
  let range_left = class_char(&mut gb);
  let dash = gb.single_quoted_literal("-").expect(err);
  let range_right = class_char(&mut gb);
  let range_seq = gb.sequence(vec![range_left, dash, range_right]).expect(err);
  gb.add_rule("Range", range_seq).expect(err);

  // CharacterClass <- '[' '^'? ( Range / ClassChar )+ ']'
  let range_ref = gb.rule_reference("Range");
  let lone_char = class_char(&mut gb);
  let class_element = gb.prioritized_choice(vec![range_ref, lone_char]).expect(err);
  let class_body = gb.one_or_more(class_element).expect(err);
  let open_bracket = gb.single_quoted_literal("[").expect(err);
  let caret = gb.single_quoted_literal("^").expect(err);
  let caret_opt = gb.optional(caret).expect(err);
  let close_bracket = gb.single_quoted_literal("]").expect(err);
  let class_seq = gb.sequence(vec![open_bracket, caret_opt, class_body, close_bracket]).expect(err);
  gb.add_rule("CharacterClass", class_seq).expect(err);

  // Expression <- Sequence ( Filler '/' Filler Sequence )*
  let seq_ref_for_expr = gb.rule_reference("Sequence");
  let filler_a = gb.rule_reference("Filler");
  let slash = gb.single_quoted_literal("/").expect(err);
  let filler_b = gb.rule_reference("Filler");
  let seq_ref_variant = gb.rule_reference("Sequence");
  let variant_seq = gb.sequence(vec![filler_a, slash, filler_b, seq_ref_variant]).expect(err);
  let variants_star = gb.zero_or_more(variant_seq).expect(err);
  let expr_seq = gb.sequence(vec![seq_ref_for_expr, variants_star]).expect(err);
  gb.add_rule("Expression", expr_seq).expect(err);

  // Sequence <- Element ( Filler Element )*
  let elem_ref_first = gb.rule_reference("Element");
  let filler_c = gb.rule_reference("Filler");
  let elem_ref_rest = gb.rule_reference("Element");
  let rest_seq = gb.sequence(vec![filler_c, elem_ref_rest]).expect(err);
  let rest_star = gb.zero_or_more(rest_seq).expect(err);
  let sequence_seq = gb.sequence(vec![elem_ref_first, rest_star]).expect(err);
  gb.add_rule("Sequence", sequence_seq).expect(err);

  // Group <- '(' Filler Expression Filler ')'
  let open_paren = gb.single_quoted_literal("(").expect(err);
  let filler_d = gb.rule_reference("Filler");
  let expr_ref = gb.rule_reference("Expression");
  let filler_e = gb.rule_reference("Filler");
  let close_paren = gb.single_quoted_literal(")").expect(err);
  let group_seq = gb.sequence(vec![open_paren, filler_d, expr_ref, filler_e, close_paren]).expect(err);
  gb.add_rule("Group", group_seq).expect(err);

  // Element <- ( '&' / '!' )? Primary Quantifier?
  // Primary <- Group / CharacterClass / DoubleQuotedLiteral / SingleQuotedLiteral / Dot / Identifier
  let group_ref = gb.rule_reference("Group");
  let class_ref = gb.rule_reference("CharacterClass");
  let dq_ref = gb.rule_reference("DoubleQuotedLiteral");
  let sq_ref = gb.rule_reference("SingleQuotedLiteral");
  let dot_ref = gb.rule_reference("Dot");
  let ident_ref = gb.rule_reference("Identifier");
  let primary = gb.prioritized_choice(vec![group_ref, class_ref, dq_ref, sq_ref, dot_ref, ident_ref]).expect(err);

  let amp = gb.single_quoted_literal("&").expect(err);
  let bang = gb.single_quoted_literal("!").expect(err);
  let lookahead_marker = gb.prioritized_choice(vec![amp, bang]).expect(err);
  let lookahead_opt = gb.optional(lookahead_marker).expect(err);

  let exact_ref = gb.rule_reference("ExactRepetition");
  let range_rep_ref = gb.rule_reference("RangeRepetition");
  let q_mark = gb.single_quoted_literal("?").expect(err);
  let star = gb.single_quoted_literal("*").expect(err);
  let plus = gb.single_quoted_literal("+").expect(err);
  let quantifier = gb.prioritized_choice(vec![exact_ref, range_rep_ref, q_mark, star, plus]).expect(err);
  let quantifier_opt = gb.optional(quantifier).expect(err);

  let element_seq = gb.sequence(vec![lookahead_opt, primary, quantifier_opt]).expect(err);
  gb.add_rule("Element", element_seq).expect(err);

  // RuleDef <- Identifier Filler '<-' Filler Expression
  let ident_ref2 = gb.rule_reference("Identifier");
  let filler_f = gb.rule_reference("Filler");
  let arrow = gb.single_quoted_literal("<-").expect(err);
  let filler_g = gb.rule_reference("Filler");
  let expr_ref2 = gb.rule_reference("Expression");
  let rule_def_seq = gb.sequence(vec![ident_ref2, filler_f, arrow, filler_g, expr_ref2]).expect(err);
  gb.add_rule("RuleDef", rule_def_seq).expect(err);

  // Grammar <- Gap (RuleDef Gap)+ !.
  let gap_leading = gb.rule_reference("Gap");
  let rule_def_ref = gb.rule_reference("RuleDef");
  let gap_after_rule_def = gb.rule_reference("Gap");
  let rule_def_with_trailing_gap = gb.sequence(vec![rule_def_ref, gap_after_rule_def]).expect(err);
  let rule_defs = gb.one_or_more(rule_def_with_trailing_gap).expect(err);
  let any_at_end = gb.any_character();
  let end_lookahead = gb.negative_lookahead(any_at_end).expect(err);
  let grammar_seq = gb.sequence(vec![gap_leading, rule_defs, end_lookahead]).expect(err);
  gb.add_rule("Grammar", grammar_seq).expect(err);

  gb.build().expect(err)
}

fn meta_grammar() -> &'static Grammar {
  static META_GRAMMAR: OnceLock<Grammar> = OnceLock::new();
  META_GRAMMAR.get_or_init(build_meta_grammar)
}

// -- Lifting a matched tree back into a grammar -----------------------

/// Parses `source` against the bootstrapped meta-grammar and replays it
/// into a fresh [`GrammarBuilder`], returning the grammar it describes.
pub fn parse_grammar(source: &str) -> Result<Grammar, LiftError> {
  let top = meta_grammar().parse(source, "Grammar")?;
  let mut gb = GrammarBuilder::new();
  let top_children = skip_filler(as_tree_children(&top));
  let rule_def_matches = as_tree_children(top_children[0]);
  for item in rule_def_matches {
    let item_children = skip_filler(as_tree_children(item));
    lift_rule_def(&mut gb, item_children[0])?;
  }
  Ok(gb.build()?)
}

fn lift_rule_def(gb: &mut GrammarBuilder, m: &Match) -> Result<(), GrammarBuildError> {
  let children = skip_filler(as_tree_children(m));
  let name = leaf_text(children[0]);
  let builder = lift_expression(gb, children[2])?;
  gb.add_rule(name, builder)
}

fn lift_expression(gb: &mut GrammarBuilder, m: &Match) -> Result<BuilderId, GrammarBuildError> {
  let children = as_tree_children(m);
  let mut variants = vec![lift_sequence(gb, &children[0])?];
  if let Some(Match::Tree(rest)) = children.get(1) {
    for item in rest.children() {
      let item_children = skip_filler(as_tree_children(item));
      // item_children == [Leaf("/"), SequenceMatch]
      variants.push(lift_sequence(gb, item_children[1])?);
    }
  }
  if variants.len() == 1 {
    Ok(variants[0])
  } else {
    gb.prioritized_choice(variants)
  }
}

fn lift_sequence(gb: &mut GrammarBuilder, m: &Match) -> Result<BuilderId, GrammarBuildError> {
  let children = as_tree_children(m);
  let mut elements = vec![lift_element(gb, &children[0])?];
  if let Some(Match::Tree(rest)) = children.get(1) {
    for item in rest.children() {
      let item_children = skip_filler(as_tree_children(item));
      // item_children == [ElementMatch]
      elements.push(lift_element(gb, item_children[0])?);
    }
  }
  if elements.len() == 1 {
    Ok(elements[0])
  } else {
    gb.sequence(elements)
  }
}

const PRIMARY_KINDS: [RuleKind; 6] =
  [RuleKind::Group, RuleKind::CharacterClass, RuleKind::DoubleQuotedLiteral, RuleKind::SingleQuotedLiteral, RuleKind::Dot, RuleKind::Identifier];

fn lift_element(gb: &mut GrammarBuilder, m: &Match) -> Result<BuilderId, GrammarBuildError> {
  let children = as_tree_children(m);
  let mut idx = 0;
  let lookahead = if !PRIMARY_KINDS.contains(&RuleKind::of(&children[idx])) {
    let marker = leaf_text(&children[idx]);
    idx += 1;
    Some(marker)
  } else {
    None
  };
  let primary_match = &children[idx];
  idx += 1;
  let mut builder = lift_primary(gb, primary_match)?;
  if let Some(quantifier_match) = children.get(idx) {
    builder = apply_quantifier(gb, builder, quantifier_match)?;
  }
  match lookahead.as_deref() {
    Some("&") => gb.positive_lookahead(builder),
    Some("!") => gb.negative_lookahead(builder),
    Some(other) => unreachable!("lookahead marker is always '&' or '!', got {other:?}"),
    None => Ok(builder),
  }
}

fn lift_primary(gb: &mut GrammarBuilder, m: &Match) -> Result<BuilderId, GrammarBuildError> {
  match RuleKind::of(m) {
    RuleKind::Group => {
      let children = skip_filler(as_tree_children(m));
      // children == [Leaf("("), ExpressionMatch, Leaf(")")]
      lift_expression(gb, children[1])
    }
    RuleKind::CharacterClass => lift_character_class(gb, m),
    RuleKind::DoubleQuotedLiteral => {
      let children = as_tree_children(m);
      gb.double_quoted_literal(decode_escapes(&leaf_text(&children[1])))
    }
    RuleKind::SingleQuotedLiteral => {
      let children = as_tree_children(m);
      gb.single_quoted_literal(decode_escapes(&leaf_text(&children[1])))
    }
    RuleKind::Dot => Ok(gb.any_character()),
    RuleKind::Identifier => Ok(gb.rule_reference(leaf_text(m))),
    other => unreachable!("Primary resolved to an unexpected rule kind {other:?}"),
  }
}

fn lift_character_class(gb: &mut GrammarBuilder, m: &Match) -> Result<BuilderId, GrammarBuildError> {
  let children = as_tree_children(m);
  let (complement, body) = if children.len() == 4 { (true, &children[2]) } else { (false, &children[1]) };
  let elements = as_tree_children(body).iter().map(lift_class_element).collect();
  if complement {
    gb.complemented_character_class(elements)
  } else {
    gb.character_class(elements)
  }
}

fn lift_class_element(m: &Match) -> CharacterContainer {
  match RuleKind::of(m) {
    RuleKind::Range => {
      let children = as_tree_children(m);
      let start = decode_escapes(&leaf_text(&children[0])).chars().next().expect("range bound is a single character");
      let end = decode_escapes(&leaf_text(&children[2])).chars().next().expect("range bound is a single character");
      CharacterContainer::Range(CharacterRange::new(start, end))
    }
    _ => {
      let decoded = decode_escapes(&leaf_text(m));
      CharacterContainer::Set(CharacterSet::new(decoded))
    }
  }
}

fn apply_quantifier(gb: &mut GrammarBuilder, inner: BuilderId, m: &Match) -> Result<BuilderId, GrammarBuildError> {
  match RuleKind::of(m) {
    RuleKind::ExactRepetition => {
      let children = as_tree_children(m);
      let count: usize = leaf_text(&children[1]).parse().expect("Digits always matches only digit characters");
      gb.exact_repetition(inner, count)
    }
    RuleKind::RangeRepetition => {
      let children = as_tree_children(m);
      let comma_idx = children.iter().position(|c| leaf_text(c) == ",").expect("range repetition always has a comma");
      let parse_digits = |c: &Match| -> usize { leaf_text(c).parse().expect("Digits always matches only digit characters") };
      let start_value = children[..comma_idx].iter().find(|c| c.rule_name() == Some("Digits")).map(parse_digits);
      let end_value = children[comma_idx + 1..].iter().find(|c| c.rule_name() == Some("Digits")).map(parse_digits);
      match (start_value, end_value) {
        (Some(s), Some(e)) => gb.positive_repetition_range(inner, s, e),
        (Some(s), None) => gb.positive_or_more(inner, s),
        (None, Some(e)) => gb.zero_repetition_range(inner, e),
        (None, None) => panic!("range repetition requires at least one bound"),
      }
    }
    RuleKind::Other => match leaf_text(m).as_str() {
      "?" => gb.optional(inner),
      "*" => gb.zero_or_more(inner),
      "+" => gb.one_or_more(inner),
      other => unreachable!("quantifier literal is always '?', '*' or '+', got {other:?}"),
    },
    other => unreachable!("quantifier resolved to an unexpected rule kind {other:?}"),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn lifts_a_simple_sequence_rule() {
    let grammar = parse_grammar("S <- 'a' 'b'\n").unwrap();
    let result = grammar.parse("ab", "S").unwrap();
    assert_eq!(result.characters_count(), 2);
  }

  #[test]
  fn lifts_prioritized_choice_and_left_recursion() {
    let grammar = parse_grammar("E <- E '+' N / N\nN <- [0-9]+\n").unwrap();
    let result = grammar.parse("1+2+3", "E").unwrap();
    assert_eq!(result.characters_count(), 5);
  }

  #[test]
  fn lifts_character_class_with_range_and_set() {
    let grammar = parse_grammar("S <- [A-Za-z_][A-Za-z0-9_]*\n").unwrap();
    assert_eq!(grammar.parse("x_1", "S").unwrap().characters_count(), 3);
    assert!(grammar.parse("1x", "S").is_err());
  }

  #[test]
  fn lifts_quantifiers_and_escapes() {
    let grammar = parse_grammar("S <- \"a\\nb\"?\n").unwrap();
    assert_eq!(grammar.parse("a\nb", "S").unwrap().characters_count(), 3);
    assert_eq!(grammar.parse("", "S").unwrap().characters_count(), 0);
  }

  #[test]
  fn lifts_comments_and_lookaheads() {
    let grammar = parse_grammar("# leading comment\nS <- &'a' 'ab'\n").unwrap();
    assert_eq!(grammar.parse("ab", "S").unwrap().characters_count(), 2);
    assert!(grammar.parse("xb", "S").is_err());
  }

  #[test]
  fn invalid_syntax_is_reported() {
    assert!(parse_grammar("S <-\n").is_err());
  }
}
