//! 文法モデルのデータ構造とビルダー
//!
//! このモジュールは、構文解析に必要なすべての静的データを集約する
//! [`Grammar`]を提供します。文法モデルは以下のコンポーネントから構成されます:
//!
//! - [`Lexicon`]: 単語と品詞のID対応表
//! - [`CatSet`] / [`RelSet`]: 範疇と依存関係ラベルのレジストリ
//! - [`RuleSet`]: 二項・単項の結合規則表
//! - [`FeatureSet`] / [`Weights`]: 素性テンプレートと重みベクトル
//!
//! モデルはテキスト形式の定義ファイルから[`GrammarBuilder`]で構築するか、
//! コンパイル済みのバイナリモデルファイルから[`Grammar::read`]で読み込みます。

pub(crate) mod builder;
pub(crate) mod category;
pub(crate) mod features;
pub(crate) mod lexicon;
pub(crate) mod rules;
pub(crate) mod weights;

use std::io::{Read, Write};

use bincode::{Decode, Encode};

use crate::errors::{CadenzaError, Result};
use crate::parser::chart::{NodeId, SuperCategory};
use crate::sentence::Sentence;

pub use builder::GrammarBuilder;
pub use category::{CatId, CatSet, CategoryRow, RelSet};
pub use features::{FeatureRow, FeatureSet};
pub use lexicon::Lexicon;
pub use rules::{BinaryRule, HeadSide, RuleRow, RuleSet, UnaryRule};
pub use weights::Weights;

/// コンパイル済みモデルファイルのマジックバイトプレフィックス
///
/// モデルファイルの先頭に書き込まれ、読み込み時にフォーマットの
/// 互換性を識別するために使用されます。
pub const MODEL_MAGIC: &[u8] = b"cadenza-grammar-01\n";

/// bincodeのエンコード・デコード設定
fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard()
}

/// モデルファイルに保存される正準形
///
/// 検索表を含まない行データのみを保持し、読み込み時に
/// [`Grammar::from_data`]で索引が再構築されます。
#[derive(Debug, Encode, Decode)]
struct GrammarData {
    words: Vec<String>,
    postags: Vec<String>,
    categories: Vec<CategoryRow>,
    relations: Vec<String>,
    rules: Vec<RuleRow>,
    features: Vec<FeatureRow>,
    weights: Vec<f64>,
    dep_nn: f64,
}

/// 構文解析に必要な静的データの集約
///
/// 一度構築された後は読み取り専用であり、複数のパーサ間で共有できます。
pub struct Grammar {
    lexicon: Lexicon,
    categories: CatSet,
    relations: RelSet,
    rules: RuleSet,
    features: FeatureSet,
    weights: Weights,
}

impl Grammar {
    /// コンポーネントから文法モデルを組み立てます
    pub(crate) fn from_parts(
        lexicon: Lexicon,
        categories: CatSet,
        relations: RelSet,
        rules: RuleSet,
        features: FeatureSet,
        weights: Weights,
    ) -> Self {
        Self {
            lexicon,
            categories,
            relations,
            rules,
            features,
            weights,
        }
    }

    /// 語彙集合への参照を返します
    #[inline(always)]
    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    /// 範疇集合への参照を返します
    #[inline(always)]
    pub fn categories(&self) -> &CatSet {
        &self.categories
    }

    /// 関係集合への参照を返します
    #[inline(always)]
    pub fn relations(&self) -> &RelSet {
        &self.relations
    }

    /// 規則表への参照を返します
    #[inline(always)]
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// 素性集合への参照を返します
    #[inline(always)]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// 重みテーブルへの参照を返します
    #[inline(always)]
    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    /// 重みテーブルへの可変参照を返します
    ///
    /// 学習器が解析の合間に重みを更新するために使用します。
    #[inline(always)]
    pub fn weights_mut(&mut self) -> &mut Weights {
        &mut self.weights
    }

    /// 表記から範疇IDを検索します
    ///
    /// # 引数
    ///
    /// * `name` - 範疇の表記
    #[inline(always)]
    pub fn cat_id(&self, name: &str) -> Option<CatId> {
        self.categories.cat_id(name)
    }

    /// 2つの構成素に二項規則を適用します
    ///
    /// 適用可能なすべての規則について結果のスーパーカテゴリを生成し、
    /// 呼び出し側のコレクタに追加します。適用可能な規則がない場合は
    /// 何も追加しません。
    ///
    /// # 引数
    ///
    /// * `left` - 左の構成素（ノードIDと実体の組）
    /// * `right` - 右の構成素（ノードIDと実体の組）
    /// * `sentence` - 解析中の文
    /// * `results` - 結果の追加先
    pub fn combine(
        &self,
        left: (NodeId, &SuperCategory),
        right: (NodeId, &SuperCategory),
        sentence: &Sentence,
        results: &mut Vec<SuperCategory>,
    ) {
        let _ = sentence;
        for rule in self.rules.binary(left.1.cat, right.1.cat) {
            results.push(SuperCategory::binary(
                rule.result,
                self.categories.rel(rule.result),
                rule.head,
                rule.fills,
                left,
                right,
            ));
        }
    }

    /// 構成素の列に型変更規則を適用します
    ///
    /// # 引数
    ///
    /// * `source` - 元になる構成素の列
    /// * `results` - 結果の追加先
    pub fn type_change<'a, I>(&self, source: I, results: &mut Vec<SuperCategory>)
    where
        I: IntoIterator<Item = (NodeId, &'a SuperCategory)>,
    {
        for (id, sc) in source {
            for rule in self.rules.type_change(sc.cat) {
                results.push(SuperCategory::unary(
                    rule.result,
                    self.categories.rel(rule.result),
                    rule.rule_id,
                    (id, sc),
                ));
            }
        }
    }

    /// 構成素の列に型繰り上げ規則を適用します
    ///
    /// # 引数
    ///
    /// * `source` - 元になる構成素の列
    /// * `results` - 結果の追加先
    pub fn type_raise<'a, I>(&self, source: I, results: &mut Vec<SuperCategory>)
    where
        I: IntoIterator<Item = (NodeId, &'a SuperCategory)>,
    {
        for (id, sc) in source {
            for rule in self.rules.type_raise(sc.cat) {
                results.push(SuperCategory::unary(
                    rule.result,
                    self.categories.rel(rule.result),
                    rule.rule_id,
                    (id, sc),
                ));
            }
        }
    }

    /// モデルをライターに書き出します
    ///
    /// ファイルの先頭に[`MODEL_MAGIC`]を書き込み、続いて行データを
    /// bincodeでエンコードします。
    ///
    /// # 引数
    ///
    /// * `wtr` - 書き込み先のライター
    ///
    /// # エラー
    ///
    /// I/Oエラーまたはエンコードエラーが発生した場合、エラーを返します。
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        wtr.write_all(MODEL_MAGIC)?;
        let data = self.to_data();
        bincode::encode_into_std_write(&data, &mut wtr, bincode_config())?;
        Ok(())
    }

    /// リーダーからモデルを読み込みます
    ///
    /// # 引数
    ///
    /// * `rdr` - 読み込み元のリーダー
    ///
    /// # エラー
    ///
    /// マジックバイトが一致しない場合、I/Oエラーまたはデコードエラーが
    /// 発生した場合、エラーを返します。
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut magic = vec![0u8; MODEL_MAGIC.len()];
        rdr.read_exact(&mut magic)?;
        if magic != MODEL_MAGIC {
            return Err(CadenzaError::invalid_format(
                "model",
                "unrecognized model file: magic bytes mismatch",
            ));
        }
        let data: GrammarData = bincode::decode_from_std_read(&mut rdr, bincode_config())?;
        Ok(Self::from_data(data))
    }

    fn to_data(&self) -> GrammarData {
        let (words, postags) = self.lexicon.to_parts();
        let (weights, dep_nn) = self.weights.to_parts();
        GrammarData {
            words,
            postags,
            categories: self.categories.to_rows(),
            relations: self.relations.to_names(),
            rules: self.rules.to_rows(),
            features: self.features.to_rows(),
            weights,
            dep_nn,
        }
    }

    fn from_data(data: GrammarData) -> Self {
        Self {
            lexicon: Lexicon::from_parts(data.words, data.postags),
            categories: CatSet::from_rows(data.categories),
            relations: RelSet::from_names(data.relations),
            rules: RuleSet::from_rows(data.rules),
            features: FeatureSet::from_rows(data.features),
            weights: Weights::new(data.weights, data.dep_nn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_grammar() -> Grammar {
        GrammarBuilder::new()
            .from_readers(
                "NP,\nS\\NP,nsubj\nS,\n".as_bytes(),
                "binary,NP,S\\NP,S,r,1\ntc,NP,S\n".as_bytes(),
                "binary,S,NP,S\\NP\nroot,S\n".as_bytes(),
                "0.5\n-0.5\n".as_bytes(),
            )
            .unwrap()
    }

    #[test]
    fn test_model_roundtrip() {
        let grammar = small_grammar();
        let mut buf = vec![];
        grammar.write(&mut buf).unwrap();
        let restored = Grammar::read(buf.as_slice()).unwrap();

        let np = restored.cat_id("NP").unwrap();
        let iv = restored.cat_id("S\\NP").unwrap();
        assert_eq!(restored.rules().binary(np, iv).len(), 1);
        assert_eq!(restored.weights().len(), 2);
        assert_eq!(restored.weights().get(0), 0.5);
        assert_eq!(
            restored.relations().name(restored.categories().rel(iv)),
            "nsubj"
        );
    }

    #[test]
    fn test_bad_magic_rejected() {
        let buf = b"not a model file at all".to_vec();
        assert!(Grammar::read(buf.as_slice()).is_err());
    }
}
