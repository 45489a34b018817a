//! A parsing expression grammar engine: packrat-memoized recursive
//! descent with support for left-recursive rules via seed-and-grow.
//!
//! Grammars are assembled with [`grammar_builder::GrammarBuilder`] and
//! compiled into an immutable [`grammar::Grammar`], or parsed directly
//! from PEG surface syntax with [`meta_grammar::parse_grammar`].

#[macro_use]
extern crate lazy_static;

pub mod character_containers;
pub mod expression_builders;
pub mod expressions;
pub mod grammar;
pub mod grammar_builder;
pub mod match_tree;
pub mod meta_grammar;
pub mod mismatch;
pub mod rule;

pub use grammar::{Grammar, ParseError, TextPosition};
pub use grammar_builder::{GrammarBuildError, GrammarBuilder};
pub use match_tree::Match;
pub use meta_grammar::parse_grammar;
pub use mismatch::Mismatch;
