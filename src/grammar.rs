//! The compiled, immutable grammar: rule lookup, packrat-cached parsing
//! and structured parse-error reporting.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::match_tree::Match;
use crate::mismatch::Mismatch;
use crate::rule::{Cache, Rule};

/// A 1-based `line:column` position in the original source text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TextPosition {
  line_number: usize,
  column_number: usize,
}

impl TextPosition {
  pub fn new(line_number: usize, column_number: usize) -> Self {
    assert!(line_number > 0, "line number must be 1-based: {line_number}");
    assert!(column_number > 0, "column number must be 1-based: {column_number}");
    TextPosition { line_number, column_number }
  }

  pub fn line_number(&self) -> usize {
    self.line_number
  }

  pub fn column_number(&self) -> usize {
    self.column_number
  }
}

impl fmt::Display for TextPosition {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.line_number, self.column_number)
  }
}

/// Every leaf mismatch that failed at the same `[start, stop)` span,
/// with the rule-name path from root down to the leaf that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MismatchGroup {
  start: TextPosition,
  stop: TextPosition,
  entries: Vec<(Vec<String>, String)>,
  lines: Vec<String>,
}

impl MismatchGroup {
  fn render(&self) -> String {
    let mut out = format!("at {}-{}\n", self.start, self.stop);
    let from = self.start.line_number - 1;
    let to = self.stop.line_number;
    let failed_lines = &self.lines[from..to];
    if failed_lines.len() == 1 {
      out.push_str(&failed_lines[0]);
      out.push('\n');
      out.push_str(&" ".repeat(self.start.column_number - 1));
      out.push_str(&"^".repeat(self.stop.column_number - self.start.column_number));
      out.push('\n');
    } else {
      out.push_str(&failed_lines[0]);
      out.push('\n');
      out.push_str(&" ".repeat(self.start.column_number));
      out.push_str(&"^".repeat(failed_lines[0].chars().count().saturating_sub(self.start.column_number)));
      out.push('\n');
      for line in &failed_lines[1..failed_lines.len() - 1] {
        out.push_str(line);
        out.push('\n');
        out.push_str(&"^".repeat(line.chars().count() + 1));
        out.push('\n');
      }
      out.push_str(&failed_lines[failed_lines.len() - 1]);
      out.push('\n');
      out.push_str(&"^".repeat(self.stop.column_number - 1));
      out.push('\n');
    }
    if self.stop.column_number > 2 {
      out.push_str(&" ".repeat(self.stop.column_number - 2));
      out.push_str("|\n");
      out.push('+');
      out.push_str(&"-".repeat(self.stop.column_number - 3));
      out.push_str("+\n");
    }
    let rendered: Vec<String> = self.entries.iter().map(|(path, msg)| format_expected_message(msg, path)).collect();
    out.push_str(&rendered.join("\n"));
    out
  }
}

fn format_expected_message(expected_message: &str, origin_path: &[String]) -> String {
  const MAX_LINE_LENGTH: usize = 79;
  const SEPARATOR: &str = " <- ";
  const SUFFIX: &str = ")";

  let prefix = format!("+- expected {expected_message} (from ");
  let last = origin_path.last().expect("origin path must have at least one element");
  let mut characters_left = MAX_LINE_LENGTH as isize - (prefix.chars().count() + SUFFIX.len() + last.chars().count()) as isize;
  let mut fitting = vec![last.clone()];
  for candidate in origin_path[..origin_path.len() - 1].iter().rev() {
    let candidate_len = SEPARATOR.len() + candidate.chars().count();
    if characters_left >= candidate_len as isize {
      characters_left -= candidate_len as isize;
      fitting.push(candidate.clone());
    } else {
      if characters_left <= (SEPARATOR.len() + 3) as isize || fitting.len() == 1 {
        fitting.push("...".to_owned());
      } else {
        let last_idx = fitting.len() - 1;
        fitting[last_idx] = "...".to_owned();
      }
      break;
    }
  }
  format!("|\n{prefix}{}{SUFFIX}", fitting.join(SEPARATOR))
}

/// Everything that can go wrong in [`Grammar::parse`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
  #[error("Failed to parse the input starting with rule '{starting_rule}'.\n\n{rendered}")]
  Mismatch { starting_rule: String, rendered: String, groups: Vec<MismatchGroup> },
  #[error("{remaining} character(s) starting at offset {consumed} were not consumed by rule '{starting_rule}'")]
  IncompleteParse { starting_rule: String, consumed: usize, remaining: usize },
  #[error("no such rule: '{name}'")]
  UnknownStartingRule { name: String },
}

impl ParseError {
  pub fn groups(&self) -> &[MismatchGroup] {
    match self {
      ParseError::Mismatch { groups, .. } => groups,
      _ => &[],
    }
  }
}

fn rpartition<'a>(haystack: &'a [char], sep: &[char]) -> (&'a [char], bool, &'a [char]) {
  if sep.is_empty() || haystack.len() < sep.len() {
    return (&[], false, haystack);
  }
  let mut i = haystack.len() - sep.len() + 1;
  while i > 0 {
    i -= 1;
    if &haystack[i..i + sep.len()] == sep {
      return (&haystack[..i], true, &haystack[i + sep.len()..]);
    }
  }
  (&[], false, haystack)
}

fn count_occurrences(haystack: &[char], sep: &[char]) -> usize {
  if sep.is_empty() {
    return 0;
  }
  let mut count = 0;
  let mut i = 0;
  while i + sep.len() <= haystack.len() {
    if &haystack[i..i + sep.len()] == sep {
      count += 1;
      i += sep.len();
    } else {
      i += 1;
    }
  }
  count
}

/// Resolves a single mismatch leaf/tree into `(start, stop, origin_path,
/// expected_message)` tuples, one per leaf, with positions derived from
/// `line_separator` (or treated as a single line when `None`).
fn unpack_mismatches(text: &[char], value: &Mismatch, line_separator: Option<&[char]>) -> Vec<(TextPosition, TextPosition, Vec<String>, String)> {
  match value {
    Mismatch::Tree(tree) => tree
      .children()
      .iter()
      .flat_map(|child| unpack_mismatches(text, child, line_separator))
      .map(|(start, stop, mut path, msg)| {
        path.insert(0, tree.origin_name().to_owned());
        (start, stop, path, msg)
      })
      .collect(),
    Mismatch::Leaf(leaf) => {
      let (start_position, stop_position) = match line_separator {
        None => (TextPosition::new(1, leaf.start_index() + 1), TextPosition::new(1, leaf.stop_index() + 1)),
        Some(sep) => {
          let processed_segment = &text[..leaf.stop_index().min(text.len())];
          let (rest_segment, found, stop_line_segment) = rpartition(processed_segment, sep);
          if !found {
            (TextPosition::new(1, leaf.start_index() + 1), TextPosition::new(1, leaf.stop_index() + 1))
          } else {
            let stop_position = TextPosition::new(count_occurrences(rest_segment, sep) + 2, stop_line_segment.len() + 1);
            let start_position = if leaf.start_index() > rest_segment.len() {
              TextPosition::new(stop_position.line_number(), leaf.start_index() - rest_segment.len() - sep.len() + 1)
            } else {
              let prefix = &rest_segment[..leaf.start_index()];
              let (rest2, found2, start_line_segment) = rpartition(prefix, sep);
              TextPosition::new(count_occurrences(rest2, sep) + usize::from(found2) + 1, start_line_segment.len() + 1)
            };
            (start_position, stop_position)
          }
        }
      };
      vec![(start_position, stop_position, vec![leaf.origin_name().to_owned()], leaf.expected_message().to_owned())]
    }
  }
}

fn group_mismatches(text: &[char], mismatch: &Mismatch, line_separator: Option<&str>, source_lines: &[String]) -> Vec<MismatchGroup> {
  let separator_chars: Option<Vec<char>> = line_separator.map(|s| s.chars().collect());
  let mut unpacked = unpack_mismatches(text, mismatch, separator_chars.as_deref());
  unpacked.sort_by(|a, b| (a.0, a.1, &a.2, &a.3).cmp(&(b.0, b.1, &b.2, &b.3)));

  let mut groups: Vec<MismatchGroup> = Vec::new();
  for (start, stop, origin_path, expected_message) in unpacked {
    match groups.last_mut() {
      Some(group) if group.start == start && group.stop == stop => {
        group.entries.push((origin_path, expected_message));
      }
      _ => groups.push(MismatchGroup { start, stop, entries: vec![(origin_path, expected_message)], lines: source_lines.to_vec() }),
    }
  }
  groups
}

/// A compiled, parse-ready grammar: an arena of [`Rule`]s reachable by
/// name, plus the line separator used to turn character offsets into
/// `line:column` positions in error reports.
#[derive(Debug)]
pub struct Grammar {
  rules: Vec<Rule>,
  name_to_index: HashMap<String, usize>,
  line_separator: Option<String>,
}

impl Grammar {
  /// Builds a grammar from already-classified rules, defaulting the
  /// line separator used for error positions to `"\n"`.
  pub fn new(rules: Vec<Rule>) -> Self {
    Self::with_line_separator(rules, Some("\n"))
  }

  pub fn with_line_separator(rules: Vec<Rule>, line_separator: Option<&str>) -> Self {
    assert!(!rules.is_empty(), "a grammar needs at least one rule");
    let name_to_index = rules.iter().enumerate().map(|(i, r)| (r.name().to_owned(), i)).collect();
    Grammar { rules, name_to_index, line_separator: line_separator.map(str::to_owned) }
  }

  pub fn rule_names(&self) -> impl Iterator<Item = &str> {
    self.rules.iter().map(Rule::name)
  }

  pub fn rule(&self, name: &str) -> Option<&Rule> {
    self.name_to_index.get(name).map(|&i| &self.rules[i])
  }

  /// Parses `text` from the start using `starting_rule_name`. On success
  /// the starting rule must consume the entire input; on failure, every
  /// leaf mismatch along the path that got furthest is grouped by span
  /// and reported as a [`ParseError::Mismatch`].
  #[tracing::instrument(skip(self, text))]
  pub fn parse(&self, text: &str, starting_rule_name: &str) -> Result<Match, ParseError> {
    let Some(&start) = self.name_to_index.get(starting_rule_name) else {
      return Err(ParseError::UnknownStartingRule { name: starting_rule_name.to_owned() });
    };
    let characters: Vec<char> = text.chars().collect();
    let mut cache = Cache::new();
    tracing::debug!(rule = starting_rule_name, "parse starting");
    match self.rules[start].parse_at(&characters, 0, &mut cache, None, &self.rules) {
      Ok(success) => {
        let consumed = success.matched.characters_count();
        if consumed < characters.len() {
          return Err(ParseError::IncompleteParse { starting_rule: starting_rule_name.to_owned(), consumed, remaining: characters.len() - consumed });
        }
        Ok(success.matched)
      }
      Err(mismatch) => {
        let source_lines: Vec<String> = text.split('\n').map(str::to_owned).collect();
        let groups = group_mismatches(&characters, &mismatch, self.line_separator.as_deref(), &source_lines);
        let rendered = groups.iter().map(MismatchGroup::render).collect::<Vec<_>>().join("\n\n");
        Err(ParseError::Mismatch { starting_rule: starting_rule_name.to_owned(), rendered, groups })
      }
    }
  }
}

impl fmt::Display for Grammar {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for (i, rule) in self.rules.iter().enumerate() {
      if i > 0 {
        writeln!(f)?;
      }
      writeln!(f, "{} <- {}", rule.name(), rule.expression())?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::expressions::Expression;

  fn literal_grammar(name: &str, literal: &str) -> Grammar {
    Grammar::new(vec![Rule::non_left_recursive(name, Expression::SingleQuotedLiteral(literal.to_owned()))])
  }

  #[test]
  fn parses_matching_literal() {
    let grammar = literal_grammar("S", "abc");
    let result = grammar.parse("abc", "S").unwrap();
    assert_eq!(result.characters_count(), 3);
  }

  #[test]
  fn reports_incomplete_parse() {
    let grammar = literal_grammar("S", "ab");
    let err = grammar.parse("abc", "S").unwrap_err();
    assert!(matches!(err, ParseError::IncompleteParse { consumed: 2, remaining: 1, .. }));
  }

  #[test]
  fn reports_mismatch_with_position() {
    let grammar = literal_grammar("S", "ab");
    let err = grammar.parse("xy", "S").unwrap_err();
    match &err {
      ParseError::Mismatch { groups, .. } => {
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].start, TextPosition::new(1, 1));
      }
      other => panic!("expected a mismatch error, got {other:?}"),
    }
  }

  #[test]
  fn unknown_starting_rule_is_reported() {
    let grammar = literal_grammar("S", "a");
    assert!(matches!(grammar.parse("a", "Nope"), Err(ParseError::UnknownStartingRule { .. })));
  }

  #[test]
  fn mismatch_at_end_of_input_does_not_panic_rendering_the_error() {
    let grammar = Grammar::new(vec![Rule::non_left_recursive(
      "S",
      Expression::Sequence(vec![Expression::SingleQuotedLiteral("x".to_owned()), Expression::SingleQuotedLiteral("y".to_owned())]),
    )]);
    let err = grammar.parse("x", "S").unwrap_err();
    assert!(err.to_string().starts_with("Failed to parse the input starting with rule 'S'."));
  }
}
