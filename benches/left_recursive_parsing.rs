use criterion::{black_box, criterion_group, criterion_main, Criterion};

use pagen::meta_grammar::parse_grammar;

const GRAMMAR_SRC: &str = "E <- E '+' N / N\nN <- [0-9]+\n";

fn deep_sum(terms: usize) -> String {
  (0..terms).map(|n| n.to_string()).collect::<Vec<_>>().join("+")
}

fn criterion_benchmark(c: &mut Criterion) {
  let grammar = parse_grammar(GRAMMAR_SRC).unwrap();
  let shallow = deep_sum(8);
  let deep = deep_sum(400);

  c.bench_function("parse shallow left-recursive sum", |b| b.iter(|| grammar.parse(black_box(&shallow), black_box("E")).unwrap()));

  c.bench_function("parse deep left-recursive sum", |b| b.iter(|| grammar.parse(black_box(&deep), black_box("E")).unwrap()));
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
