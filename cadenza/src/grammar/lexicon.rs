//! 単語と品詞の語彙集合
//!
//! このモジュールは、素性抽出と依存関係スコアリングで使用される
//! 単語IDと品詞IDの対応表を提供します。ID 0 は未知語として予約されます。

use hashbrown::HashMap;

use crate::utils::FromU32;

/// 単語と品詞の語彙集合
///
/// 表層形とIDの双方向対応を保持します。モデルに存在しない表層形は
/// すべて未知語ID（0）に解決されます。
#[derive(Debug, Clone)]
pub struct Lexicon {
    words: Vec<String>,
    word_ids: HashMap<String, u32>,
    postags: Vec<String>,
    postag_ids: HashMap<String, u32>,
}

impl Default for Lexicon {
    fn default() -> Self {
        Self::new()
    }
}

impl Lexicon {
    /// 新しい語彙集合を生成します
    ///
    /// 単語・品詞のどちらの表でも、ID 0 は未知語として予約されます。
    pub fn new() -> Self {
        Self {
            words: vec![String::new()],
            word_ids: HashMap::new(),
            postags: vec![String::new()],
            postag_ids: HashMap::new(),
        }
    }

    /// 保存された表層形の列から語彙集合を再構築します
    ///
    /// # 引数
    ///
    /// * `words` - 単語表（添字0は未知語）
    /// * `postags` - 品詞表（添字0は未知語）
    pub(crate) fn from_parts(words: Vec<String>, postags: Vec<String>) -> Self {
        let mut word_ids = HashMap::with_capacity(words.len());
        for (i, w) in words.iter().enumerate().skip(1) {
            word_ids.insert(w.clone(), i as u32);
        }
        let mut postag_ids = HashMap::with_capacity(postags.len());
        for (i, p) in postags.iter().enumerate().skip(1) {
            postag_ids.insert(p.clone(), i as u32);
        }
        Self {
            words,
            word_ids,
            postags,
            postag_ids,
        }
    }

    /// 単語をIDに対応付けます
    ///
    /// 既に登録済みの場合は既存のIDを返します。
    ///
    /// # 引数
    ///
    /// * `word` - 単語の表層形
    pub fn intern_word(&mut self, word: &str) -> u32 {
        if let Some(&id) = self.word_ids.get(word) {
            return id;
        }
        let id = self.words.len() as u32;
        self.words.push(word.to_string());
        self.word_ids.insert(word.to_string(), id);
        id
    }

    /// 品詞をIDに対応付けます
    ///
    /// 既に登録済みの場合は既存のIDを返します。
    ///
    /// # 引数
    ///
    /// * `postag` - 品詞タグ
    pub fn intern_postag(&mut self, postag: &str) -> u32 {
        if let Some(&id) = self.postag_ids.get(postag) {
            return id;
        }
        let id = self.postags.len() as u32;
        self.postags.push(postag.to_string());
        self.postag_ids.insert(postag.to_string(), id);
        id
    }

    /// 単語のIDを検索します
    ///
    /// # 引数
    ///
    /// * `word` - 単語の表層形
    ///
    /// # 戻り値
    ///
    /// 登録済みの場合はそのID、未登録の場合は未知語ID（0）
    #[inline(always)]
    pub fn word_id(&self, word: &str) -> u32 {
        self.word_ids.get(word).copied().unwrap_or(0)
    }

    /// 品詞のIDを検索します
    ///
    /// # 引数
    ///
    /// * `postag` - 品詞タグ
    ///
    /// # 戻り値
    ///
    /// 登録済みの場合はそのID、未登録の場合は未知語ID（0）
    #[inline(always)]
    pub fn postag_id(&self, postag: &str) -> u32 {
        self.postag_ids.get(postag).copied().unwrap_or(0)
    }

    /// IDから単語の表層形を取得します
    #[inline(always)]
    pub fn word(&self, id: u32) -> &str {
        &self.words[usize::from_u32(id)]
    }

    /// IDから品詞タグを取得します
    #[inline(always)]
    pub fn postag(&self, id: u32) -> &str {
        &self.postags[usize::from_u32(id)]
    }

    /// 登録されている単語数を返します（未知語ID 0 を含む）
    #[inline(always)]
    pub fn num_words(&self) -> usize {
        self.words.len()
    }

    /// 登録されている品詞数を返します（未知語ID 0 を含む）
    #[inline(always)]
    pub fn num_postags(&self) -> usize {
        self.postags.len()
    }

    /// 保存用の正準形を取り出します
    pub(crate) fn to_parts(&self) -> (Vec<String>, Vec<String>) {
        (self.words.clone(), self.postags.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicon_unknown_is_zero() {
        let mut lexicon = Lexicon::new();
        let cat = lexicon.intern_word("cat");
        assert_eq!(cat, 1);
        assert_eq!(lexicon.word_id("cat"), 1);
        assert_eq!(lexicon.word_id("dog"), 0);
        assert_eq!(lexicon.word(cat), "cat");
    }

    #[test]
    fn test_lexicon_roundtrip() {
        let mut lexicon = Lexicon::new();
        lexicon.intern_word("the");
        lexicon.intern_postag("DT");
        let (words, postags) = lexicon.to_parts();
        let restored = Lexicon::from_parts(words, postags);
        assert_eq!(restored.word_id("the"), 1);
        assert_eq!(restored.postag_id("DT"), 1);
        assert_eq!(restored.postag_id("NN"), 0);
    }
}
