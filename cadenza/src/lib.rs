//! # Cadenza
//!
//! Cadenzaは、語彙化範疇文法のためのビームサーチに基づく統計的チャートパーサの実装です。
//!
//! ## 概要
//!
//! このライブラリは、スーパータグ付けされた文を解析するための高速なチャートパーサを
//! 提供します。CKYアルゴリズムによるボトムアップのチャート充填、型変更・型繰り上げの
//! 単項規則展開、セルごとのビーム枝刈り、および直積を実体化しないキューブ枝刈りに
//! よる上位k件の結合をサポートします。
//!
//! ## 主な機能
//!
//! - **ビームサーチ解析**: セルごとのβ枝刈りとビーム上限による効率的な探索
//! - **キューブ枝刈り**: ソート済みセルの直積の上位k件の近似列挙
//! - **線形素性モデル**: 葉・単項・二項・ルートの素性による導出スコアリング
//! - **依存関係ニューラルスコア**: 外部モデルによる依存関係確率の混合（任意）
//! - **スキマー**: 完全な導出が得られない場合の最良被覆デコード
//!
//! ## 使用例
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use cadenza::grammar::GrammarBuilder;
//! use cadenza::sentence::{LexCandidate, Sentence};
//! use cadenza::{ParseOutcome, Parser};
//!
//! let categories = "NP,\nS\\NP,nsubj\nS,";
//! let rules = "binary,NP,S\\NP,S,r,1";
//! let features = "binary,S,NP,S\\NP";
//! let weights = "0.5";
//!
//! let grammar = GrammarBuilder::new().from_readers(
//!     categories.as_bytes(),
//!     rules.as_bytes(),
//!     features.as_bytes(),
//!     weights.as_bytes(),
//! )?;
//!
//! let np = grammar.cat_id("NP").unwrap();
//! let iv = grammar.cat_id("S\\NP").unwrap();
//!
//! let parser = Parser::new(grammar).beam_size(4).beta(1e-4)?;
//! let mut worker = parser.new_worker();
//!
//! let mut sentence = Sentence::new();
//! sentence.push_word("birds", "NNS", vec![LexCandidate { cat: np, log_p: -0.1 }]);
//! sentence.push_word("sing", "VBP", vec![LexCandidate { cat: iv, log_p: -0.2 }]);
//! worker.reset_sentence(sentence);
//!
//! assert_eq!(worker.parse(), ParseOutcome::Parsed);
//! let deps = worker.best_deps().unwrap();
//! assert_eq!(deps.len(), 1);
//! # Ok(())
//! # }
//! ```

#[cfg(not(any(target_pointer_width = "32", target_pointer_width = "64")))]
compile_error!("`target_pointer_width` must be 32 or 64");

/// 依存関係の値型
pub mod dependency;

/// エラー型の定義
pub mod errors;

/// 文法モデルのデータ構造とビルダー
pub mod grammar;

/// チャートパーサの実装
pub mod parser;

/// 入力文の内部表現
pub mod sentence;

/// 内部ユーティリティ関数
pub mod utils;

#[cfg(test)]
mod test_utils;
#[cfg(test)]
mod tests;

// Re-exports
pub use grammar::Grammar;
pub use parser::{ParseOutcome, Parser, SkipReason};

/// このライブラリのバージョン番号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
