//! 合成文法を用いた構文解析のベンチマーク
//!
//! 全組み合わせが結合する高曖昧性の文法を使用して、通常の結合と
//! キューブ枝刈りでの解析速度を計測します。

use std::time::Duration;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use cadenza::grammar::{Grammar, GrammarBuilder};
use cadenza::sentence::{LexCandidate, Sentence};
use cadenza::Parser;

const NUM_WORDS: usize = 12;
const CANDIDATES_PER_WORD: usize = 3;

fn synthetic_grammar() -> Grammar {
    let categories = "A,\nB,\nC,\n";
    let mut rules = String::new();
    for left in ["A", "B", "C"] {
        for right in ["A", "B", "C"] {
            rules.push_str(&format!("binary,{left},{right},A,l,0\n"));
        }
    }
    GrammarBuilder::new()
        .from_readers(
            categories.as_bytes(),
            rules.as_bytes(),
            "".as_bytes(),
            "".as_bytes(),
        )
        .unwrap()
}

fn synthetic_sentence(grammar: &Grammar) -> Sentence {
    let cats = ["A", "B", "C"];
    let mut sentence = Sentence::new();
    for i in 0..NUM_WORDS {
        let candidates = (0..CANDIDATES_PER_WORD)
            .map(|j| LexCandidate {
                cat: grammar.cat_id(cats[(i + j) % cats.len()]).unwrap(),
                log_p: -0.1 * (i + j + 1) as f64,
            })
            .collect();
        sentence.push_word(format!("w{i}"), "NN", candidates);
    }
    sentence
}

fn benchmark_parsing(c: &mut Criterion) {
    let grammar = synthetic_grammar();
    let sentence = synthetic_sentence(&grammar);
    let parser = Parser::new(grammar).beam_size(16).beta(1e-6).unwrap();

    let mut group = c.benchmark_group("Parsing Speed (synthetic)");
    group.warm_up_time(Duration::from_secs(3));
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(20);

    group.bench_function(BenchmarkId::new("Plain", "12 words"), |b| {
        b.iter_with_setup(
            || {
                let mut worker = parser.new_worker();
                worker.reset_sentence(sentence.clone());
                worker
            },
            |mut worker| {
                worker.parse();
            },
        );
    });

    let cube_parser = parser.clone().cube_pruning(true);
    group.bench_function(BenchmarkId::new("CubePruning", "12 words"), |b| {
        b.iter_with_setup(
            || {
                let mut worker = cube_parser.new_worker();
                worker.reset_sentence(sentence.clone());
                worker
            },
            |mut worker| {
                worker.parse();
            },
        );
    });

    group.finish();
}

criterion_group!(benches, benchmark_parsing);
criterion_main!(benches);
