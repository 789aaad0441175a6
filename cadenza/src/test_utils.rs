//! テスト用ユーティリティ
//!
//! テストコードで使用する文法とセンテンスの組み立てヘルパーを提供します。

use crate::grammar::{Grammar, GrammarBuilder};
use crate::sentence::{LexCandidate, Sentence};

/// インラインCSVから文法モデルを構築します。
#[track_caller]
pub(crate) fn build_grammar(categories: &str, rules: &str, features: &str, weights: &str) -> Grammar {
    GrammarBuilder::new()
        .from_readers(
            categories.as_bytes(),
            rules.as_bytes(),
            features.as_bytes(),
            weights.as_bytes(),
        )
        .unwrap()
}

/// 単語と範疇候補の組の列から文を組み立てます。
///
/// 範疇は文法モデルの表記で指定します。
#[track_caller]
pub(crate) fn make_sentence(grammar: &Grammar, words: &[(&str, &str, &[(&str, f64)])]) -> Sentence {
    let mut sentence = Sentence::new();
    for &(word, postag, candidates) in words {
        let candidates = candidates
            .iter()
            .map(|&(cat, log_p)| LexCandidate {
                cat: grammar.cat_id(cat).unwrap_or_else(|| {
                    panic!("unknown category in test sentence: {cat}");
                }),
                log_p,
            })
            .collect();
        sentence.push_word(word, postag, candidates);
    }
    sentence
}
