use crate::parser::{ParseOutcome, Parser};
use crate::test_utils::{build_grammar, make_sentence};

const CATEGORIES: &str = "L1,\nL2,\nL3,\nR1,\nR2,\nR3,\nX,\n";

fn all_pairs_rules() -> String {
    let mut rules = String::new();
    for left in ["L1", "L2", "L3"] {
        for right in ["R1", "R2", "R3"] {
            rules.push_str(&format!("binary,{left},{right},X,l,0\n"));
        }
    }
    rules
}

fn two_word_sentence_scores(cube_pruning: bool, beam_size: usize) -> Vec<f64> {
    let grammar = build_grammar(CATEGORIES, &all_pairs_rules(), "", "");
    let words: &[(&str, &str, &[(&str, f64)])] = &[
        (
            "alpha",
            "NN",
            &[("L1", -0.11), ("L2", -0.47), ("L3", -0.93)],
        ),
        (
            "beta",
            "NN",
            &[("R1", -0.05), ("R2", -0.42), ("R3", -0.77)],
        ),
    ];
    let sentence = make_sentence(&grammar, words);

    let parser = Parser::new(grammar)
        .cube_pruning(cube_pruning)
        .beam_size(beam_size)
        .beta(1e-9)
        .unwrap();
    let mut worker = parser.new_worker();
    worker.reset_sentence(sentence);
    assert_eq!(worker.parse(), ParseOutcome::Parsed);

    worker
        .chart()
        .cell(0, 2)
        .ids()
        .iter()
        .map(|&id| worker.chart().super_category(id).score)
        .collect()
}

#[test]
fn test_cube_matches_full_enumeration() {
    // 9 combinations with distinct scores, beam smaller than the product
    let full = two_word_sentence_scores(false, 4);
    let cube = two_word_sentence_scores(true, 4);
    assert_eq!(full.len(), 4);
    assert_eq!(cube.len(), 4);
    for (a, b) in full.iter().zip(&cube) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }
    // descending order after the beam
    for pair in cube.windows(2) {
        assert!(pair[0] >= pair[1]);
    }
}

#[test]
fn test_cube_small_product_falls_back_to_full() {
    let full = two_word_sentence_scores(false, 16);
    let cube = two_word_sentence_scores(true, 16);
    assert_eq!(full.len(), 9);
    assert_eq!(cube.len(), 9);
    for (a, b) in full.iter().zip(&cube) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }
}

#[test]
fn test_cube_with_sparse_rules() {
    // only the weakest pair combines; the frontier has to walk past
    // sentinel entries to reach it
    let grammar = build_grammar(CATEGORIES, "binary,L3,R3,X,l,0\n", "", "");
    let words: &[(&str, &str, &[(&str, f64)])] = &[
        (
            "alpha",
            "NN",
            &[("L1", -0.11), ("L2", -0.47), ("L3", -0.93)],
        ),
        (
            "beta",
            "NN",
            &[("R1", -0.05), ("R2", -0.42), ("R3", -0.77)],
        ),
    ];
    let sentence = make_sentence(&grammar, words);

    let parser = Parser::new(grammar)
        .cube_pruning(true)
        .beam_size(4)
        .beta(1e-9)
        .unwrap();
    let mut worker = parser.new_worker();
    worker.reset_sentence(sentence);

    assert_eq!(worker.parse(), ParseOutcome::Parsed);
    let cell = worker.chart().cell(0, 2);
    assert_eq!(cell.len(), 1);
    let score = worker.chart().super_category(cell.ids()[0]).score;
    assert!((score - (-0.93 - 0.77)).abs() < 1e-9);
}

#[test]
fn test_cube_no_rules_leaves_root_empty() {
    let grammar = build_grammar(CATEGORIES, "", "", "");
    let words: &[(&str, &str, &[(&str, f64)])] = &[
        ("alpha", "NN", &[("L1", -0.11), ("L2", -0.47)]),
        ("beta", "NN", &[("R1", -0.05), ("R2", -0.42)]),
    ];
    let sentence = make_sentence(&grammar, words);

    let parser = Parser::new(grammar)
        .cube_pruning(true)
        .beam_size(2)
        .beta(1e-9)
        .unwrap();
    let mut worker = parser.new_worker();
    worker.reset_sentence(sentence);

    assert_eq!(worker.parse(), ParseOutcome::Exhausted);
    assert!(worker.chart().root().is_empty());
}

#[test]
fn test_cube_repeat_parse_is_deterministic() {
    let first = two_word_sentence_scores(true, 4);
    let second = two_word_sentence_scores(true, 4);
    let first_bits: Vec<u64> = first.iter().map(|s| s.to_bits()).collect();
    let second_bits: Vec<u64> = second.iter().map(|s| s.to_bits()).collect();
    assert_eq!(first_bits, second_bits);
}
