//! 入力文の内部表現を提供するモジュール
//!
//! このモジュールは、構文解析のために入力文を効率的に処理するための
//! 内部データ構造を提供します。スーパータガーが付与した語彙範疇の候補列を
//! 単語・品詞とともに保持し、語彙集合によるID解決の結果をキャッシュします。

use crate::grammar::{CatId, Lexicon};

/// 1単語に対する語彙範疇の候補
///
/// スーパータガーが出力した範疇と、その対数確率を保持します。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LexCandidate {
    /// 候補の範疇ID
    pub cat: CatId,
    /// スーパータガーによる対数確率
    pub log_p: f64,
}

/// 入力文の内部表現を保持する構造体
///
/// この構造体は、構文解析のために入力文を処理し、以下の情報を保持します:
/// - 単語列と品詞列
/// - 単語ごとの語彙範疇候補のリスト
/// - 語彙集合によって解決された単語IDと品詞ID
///
/// # フィールド
///
/// * `words` - 単語の表層形の列
/// * `postags` - 品詞タグの列
/// * `candidates` - 単語ごとの語彙範疇候補のリスト
/// * `word_ids` - 解決済みの単語ID（[`compile`]後に有効）
/// * `postag_ids` - 解決済みの品詞ID（[`compile`]後に有効）
///
/// [`compile`]: Self::compile
#[derive(Default, Clone, Debug)]
pub struct Sentence {
    words: Vec<String>,
    postags: Vec<String>,
    candidates: Vec<Vec<LexCandidate>>,
    word_ids: Vec<u32>,
    postag_ids: Vec<u32>,
}

impl Sentence {
    /// 新しい空の `Sentence` インスタンスを生成します
    ///
    /// # 戻り値
    ///
    /// 空の `Sentence` インスタンス
    pub fn new() -> Self {
        Self::default()
    }

    /// 内部状態をクリアします
    ///
    /// すべての内部フィールド（単語列、品詞列、候補リスト、ID列）を
    /// 空の状態にリセットします。
    #[inline(always)]
    pub fn clear(&mut self) {
        self.words.clear();
        self.postags.clear();
        self.candidates.clear();
        self.word_ids.clear();
        self.postag_ids.clear();
    }

    /// 文末に1単語を追加します
    ///
    /// この時点ではID解決は行われません。解決を行うには [`compile`] を
    /// 呼び出す必要があります。
    ///
    /// # 引数
    ///
    /// * `word` - 単語の表層形
    /// * `postag` - 品詞タグ
    /// * `candidates` - スーパータガーが付与した語彙範疇候補
    ///
    /// [`compile`]: Self::compile
    pub fn push_word<S, P>(&mut self, word: S, postag: P, candidates: Vec<LexCandidate>)
    where
        S: Into<String>,
        P: Into<String>,
    {
        self.words.push(word.into());
        self.postags.push(postag.into());
        self.candidates.push(candidates);
    }

    /// 語彙集合を用いて単語IDと品詞IDを解決します
    ///
    /// 語彙集合に存在しない単語・品詞は未知語ID（0）に解決されます。
    /// 再呼び出しすると解決結果は上書きされます。
    ///
    /// # 引数
    ///
    /// * `lexicon` - ID解決に使用する語彙集合への参照
    pub fn compile(&mut self, lexicon: &Lexicon) {
        self.word_ids.clear();
        self.postag_ids.clear();
        self.word_ids.reserve(self.words.len());
        self.postag_ids.reserve(self.postags.len());
        for w in &self.words {
            self.word_ids.push(lexicon.word_id(w));
        }
        for p in &self.postags {
            self.postag_ids.push(lexicon.postag_id(p));
        }
    }

    /// 文の単語数を返します
    ///
    /// # 戻り値
    ///
    /// 単語数
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// 文が空かどうかを返します
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// 指定された位置の単語の表層形を返します
    ///
    /// # 引数
    ///
    /// * `i` - 単語位置（0始まり）
    #[inline(always)]
    pub fn word(&self, i: usize) -> &str {
        &self.words[i]
    }

    /// 指定された位置の品詞タグを返します
    ///
    /// # 引数
    ///
    /// * `i` - 単語位置（0始まり）
    #[inline(always)]
    pub fn postag(&self, i: usize) -> &str {
        &self.postags[i]
    }

    /// 指定された位置の解決済み単語IDを返します
    ///
    /// [`compile`]を呼び出す前の結果は未定義です。
    ///
    /// # 引数
    ///
    /// * `i` - 単語位置（0始まり）
    ///
    /// [`compile`]: Self::compile
    #[inline(always)]
    pub fn word_id(&self, i: usize) -> u32 {
        self.word_ids[i]
    }

    /// 指定された位置の解決済み品詞IDを返します
    ///
    /// # 引数
    ///
    /// * `i` - 単語位置（0始まり）
    #[inline(always)]
    pub fn postag_id(&self, i: usize) -> u32 {
        self.postag_ids[i]
    }

    /// 指定された位置の語彙範疇候補を返します
    ///
    /// # 引数
    ///
    /// * `i` - 単語位置（0始まり）
    #[inline(always)]
    pub fn candidates(&self, i: usize) -> &[LexCandidate] {
        &self.candidates[i]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::grammar::CatId;

    #[test]
    fn test_sentence() {
        let mut sent = Sentence::new();
        sent.push_word(
            "ate",
            "VBD",
            vec![LexCandidate {
                cat: CatId(3),
                log_p: -0.5,
            }],
        );
        assert_eq!(sent.len(), 1);
        assert_eq!(sent.word(0), "ate");
        assert_eq!(sent.postag(0), "VBD");
        assert_eq!(sent.candidates(0).len(), 1);

        sent.clear();
        assert!(sent.is_empty());
    }
}
