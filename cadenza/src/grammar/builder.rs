//! 文法モデル構築のためのビルダー
//!
//! このモジュールは、テキスト形式の定義ファイル（範疇、規則、素性、重み）から
//! [`Grammar`]を構築するためのビルダーを提供します。
//!
//! すべての定義ファイルはCSV行の列で、空行と`#`で始まる前書き行は
//! 読み飛ばされます。

use std::io::Read;

use crate::errors::{CadenzaError, Result};
use crate::grammar::category::{CatId, CatSet, RelSet};
use crate::grammar::features::{FeatureSet, KIND_BINARY, KIND_LEAF, KIND_ROOT, KIND_UNARY};
use crate::grammar::lexicon::Lexicon;
use crate::grammar::rules::{HeadSide, RuleRow, RuleSet};
use crate::grammar::weights::Weights;
use crate::grammar::Grammar;
use crate::utils::read_csv_source;

/// テキスト形式の定義ファイルから[`Grammar`]を構築するビルダー
///
/// # 例
///
/// ```
/// # use cadenza::grammar::GrammarBuilder;
/// let categories = "NP,\nS\\NP,nsubj\nS,";
/// let rules = "binary,NP,S\\NP,S,r,1";
/// let features = "binary,S,NP,S\\NP";
/// let weights = "0.5";
///
/// let grammar = GrammarBuilder::new()
///     .from_readers(
///         categories.as_bytes(),
///         rules.as_bytes(),
///         features.as_bytes(),
///         weights.as_bytes(),
///     )
///     .unwrap();
/// assert!(grammar.cat_id("S").is_some());
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct GrammarBuilder {
    alt_markedup: bool,
    eisner_normal_form: bool,
}

impl GrammarBuilder {
    /// 新しいビルダーを生成します
    pub fn new() -> Self {
        Self::default()
    }

    /// 代替マークアップ行を使用するかどうかを設定します
    ///
    /// 有効にすると、`alt:`で始まる範疇行が同名の基本行の関係定義を
    /// 上書きします。無効の場合、`alt:`行は読み飛ばされます。
    ///
    /// # 引数
    ///
    /// * `yes` - `true`の場合、代替マークアップ行を適用します
    pub const fn alt_markedup(mut self, yes: bool) -> Self {
        self.alt_markedup = yes;
        self
    }

    /// 正規形制約を適用するかどうかを設定します
    ///
    /// 有効にすると、`nf`フラグの付いた二項規則行（冗長な導出を生む
    /// 規則）が読み飛ばされます。
    ///
    /// # 引数
    ///
    /// * `yes` - `true`の場合、`nf`フラグ付きの規則を除外します
    pub const fn eisner_normal_form(mut self, yes: bool) -> Self {
        self.eisner_normal_form = yes;
        self
    }

    /// 定義ファイルのリーダーから[`Grammar`]を構築します
    ///
    /// # 引数
    ///
    ///  - `categories_rdr`: 範疇定義ファイルのリーダー
    ///  - `rules_rdr`: 規則定義ファイルのリーダー
    ///  - `features_rdr`: 素性定義ファイルのリーダー
    ///  - `weights_rdr`: 重みファイルのリーダー
    ///
    /// # エラー
    ///
    /// 入力フォーマットが不正な場合、未定義の範疇が参照された場合、
    /// または重みの数が素性の数と一致しない場合に[`CadenzaError`]を
    /// 返します。
    pub fn from_readers<C, R, F, W>(
        self,
        categories_rdr: C,
        rules_rdr: R,
        features_rdr: F,
        weights_rdr: W,
    ) -> Result<Grammar>
    where
        C: Read,
        R: Read,
        F: Read,
        W: Read,
    {
        let mut lexicon = Lexicon::new();
        let mut relations = RelSet::new();

        let categories = self.read_categories(categories_rdr, &mut relations)?;
        let rules = self.read_rules(rules_rdr, &categories)?;
        let features = Self::read_features(features_rdr, &categories, &mut lexicon)?;
        let weights = Self::read_weights(weights_rdr, &features)?;

        Ok(Grammar::from_parts(
            lexicon, categories, relations, rules, features, weights,
        ))
    }

    fn read_categories<C: Read>(&self, rdr: C, relations: &mut RelSet) -> Result<CatSet> {
        let mut categories = CatSet::new();
        for fields in read_csv_source(rdr)? {
            let name = fields[0].as_str();
            let rel_name = fields.get(1).map(String::as_str).unwrap_or("");
            let rel = if rel_name.is_empty() {
                0
            } else {
                relations.intern(rel_name)?
            };

            if let Some(base) = name.strip_prefix("alt:") {
                if !self.alt_markedup {
                    continue;
                }
                match categories.cat_id(base) {
                    Some(id) => categories.set_rel(id, rel),
                    None => {
                        categories.push(base, rel)?;
                    }
                }
            } else {
                categories.push(name, rel)?;
            }
        }
        Ok(categories)
    }

    fn read_rules<R: Read>(&self, rdr: R, categories: &CatSet) -> Result<RuleSet> {
        let mut rules = RuleSet::new();
        let mut next_unary_id: u16 = 1;

        for fields in read_csv_source(rdr)? {
            match fields[0].as_str() {
                "binary" => {
                    if fields.len() < 6 {
                        return Err(CadenzaError::invalid_format(
                            "rules",
                            format!("binary rule needs 6 fields: {}", fields.join(",")),
                        ));
                    }
                    if self.eisner_normal_form && fields.get(6).map(String::as_str) == Some("nf") {
                        continue;
                    }
                    let left = resolve_cat(categories, &fields[1], "rules")?;
                    let right = resolve_cat(categories, &fields[2], "rules")?;
                    let result = resolve_cat(categories, &fields[3], "rules")?;
                    let head = match fields[4].as_str() {
                        "l" => HeadSide::Left,
                        "r" => HeadSide::Right,
                        "b" => HeadSide::Both,
                        other => {
                            return Err(CadenzaError::invalid_format(
                                "rules",
                                format!("unknown head side: {other}"),
                            ))
                        }
                    };
                    let fills = match fields[5].as_str() {
                        "0" => false,
                        "1" => true,
                        other => {
                            return Err(CadenzaError::invalid_format(
                                "rules",
                                format!("fills must be 0 or 1: {other}"),
                            ))
                        }
                    };
                    rules.push(RuleRow::Binary {
                        left,
                        right,
                        result,
                        head,
                        fills,
                    });
                }
                kind @ ("tc" | "tr") => {
                    if fields.len() < 3 {
                        return Err(CadenzaError::invalid_format(
                            "rules",
                            format!("unary rule needs 3 fields: {}", fields.join(",")),
                        ));
                    }
                    let source = resolve_cat(categories, &fields[1], "rules")?;
                    let result = resolve_cat(categories, &fields[2], "rules")?;
                    let rule_id = next_unary_id;
                    next_unary_id = next_unary_id.checked_add(1).ok_or_else(|| {
                        CadenzaError::invalid_format("rules", "too many unary rules")
                    })?;
                    if kind == "tc" {
                        rules.push(RuleRow::TypeChange {
                            source,
                            result,
                            rule_id,
                        });
                    } else {
                        rules.push(RuleRow::TypeRaise {
                            source,
                            result,
                            rule_id,
                        });
                    }
                }
                other => {
                    return Err(CadenzaError::invalid_format(
                        "rules",
                        format!("unknown rule kind: {other}"),
                    ))
                }
            }
        }
        Ok(rules)
    }

    fn read_features<F: Read>(
        rdr: F,
        categories: &CatSet,
        lexicon: &mut Lexicon,
    ) -> Result<FeatureSet> {
        let mut features = FeatureSet::new();
        for fields in read_csv_source(rdr)? {
            match fields[0].as_str() {
                "leaf" => {
                    if fields.len() < 4 {
                        return Err(CadenzaError::invalid_format(
                            "features",
                            format!("leaf feature needs 4 fields: {}", fields.join(",")),
                        ));
                    }
                    let cat = resolve_cat(categories, &fields[1], "features")?;
                    let word = intern_or_zero(&fields[2], |w| lexicon.intern_word(w));
                    let postag = intern_or_zero(&fields[3], |p| lexicon.intern_postag(p));
                    features.push(KIND_LEAF, u32::from(cat.0), word, postag)?;
                }
                "unary" => {
                    if fields.len() < 3 {
                        return Err(CadenzaError::invalid_format(
                            "features",
                            format!("unary feature needs 3 fields: {}", fields.join(",")),
                        ));
                    }
                    let result = resolve_cat(categories, &fields[1], "features")?;
                    let child = resolve_cat(categories, &fields[2], "features")?;
                    features.push(KIND_UNARY, u32::from(result.0), u32::from(child.0), 0)?;
                }
                "binary" => {
                    if fields.len() < 4 {
                        return Err(CadenzaError::invalid_format(
                            "features",
                            format!("binary feature needs 4 fields: {}", fields.join(",")),
                        ));
                    }
                    let result = resolve_cat(categories, &fields[1], "features")?;
                    let left = resolve_cat(categories, &fields[2], "features")?;
                    let right = resolve_cat(categories, &fields[3], "features")?;
                    features.push(
                        KIND_BINARY,
                        u32::from(result.0),
                        u32::from(left.0),
                        u32::from(right.0),
                    )?;
                }
                "root" => {
                    if fields.len() < 2 {
                        return Err(CadenzaError::invalid_format(
                            "features",
                            format!("root feature needs a category: {}", fields.join(",")),
                        ));
                    }
                    let cat = resolve_cat(categories, &fields[1], "features")?;
                    let word = fields
                        .get(2)
                        .map(|w| intern_or_zero(w, |w| lexicon.intern_word(w)))
                        .unwrap_or(0);
                    features.push(KIND_ROOT, u32::from(cat.0), word, 0)?;
                }
                other => {
                    return Err(CadenzaError::invalid_format(
                        "features",
                        format!("unknown feature kind: {other}"),
                    ))
                }
            }
        }
        Ok(features)
    }

    fn read_weights<W: Read>(rdr: W, features: &FeatureSet) -> Result<Weights> {
        let mut values = Vec::with_capacity(features.len());
        let mut dep_nn = 1.0;
        for fields in read_csv_source(rdr)? {
            if fields[0] == "depnn" {
                if fields.len() < 2 {
                    return Err(CadenzaError::invalid_format(
                        "weights",
                        "depnn row needs a value",
                    ));
                }
                dep_nn = fields[1].parse()?;
            } else {
                values.push(fields[0].parse()?);
            }
        }
        if values.len() != features.len() {
            return Err(CadenzaError::invalid_argument(
                "weights_rdr",
                format!(
                    "number of weights != number of features ({} != {})",
                    values.len(),
                    features.len()
                ),
            ));
        }
        Ok(Weights::new(values, dep_nn))
    }
}

fn resolve_cat(categories: &CatSet, name: &str, arg: &'static str) -> Result<CatId> {
    categories
        .cat_id(name)
        .ok_or_else(|| CadenzaError::invalid_format(arg, format!("undefined category: {name}")))
}

fn intern_or_zero<F>(field: &str, intern: F) -> u32
where
    F: FnOnce(&str) -> u32,
{
    if field.is_empty() {
        0
    } else {
        intern(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATEGORIES: &str = "\
# test categories
NP,
S\\NP,nsubj
S,
alt:S\\NP,dobj
";

    const RULES: &str = "\
binary,NP,S\\NP,S,r,1
tc,NP,S
binary,S,S,S,l,0,nf
";

    const FEATURES: &str = "\
leaf,NP,cat,
leaf,NP,,NN
binary,S,NP,S\\NP
root,S
";

    const WEIGHTS: &str = "\
# preface
0.5
-0.25
1.0
2.0
depnn,0.5
";

    #[test]
    fn test_from_readers() {
        let grammar = GrammarBuilder::new()
            .from_readers(
                CATEGORIES.as_bytes(),
                RULES.as_bytes(),
                FEATURES.as_bytes(),
                WEIGHTS.as_bytes(),
            )
            .unwrap();

        let np = grammar.cat_id("NP").unwrap();
        let iv = grammar.cat_id("S\\NP").unwrap();
        assert_eq!(grammar.rules().binary(np, iv).len(), 1);
        assert_eq!(grammar.rules().type_change(np).len(), 1);
        // the nf row is kept because the normal-form restriction is off
        let s = grammar.cat_id("S").unwrap();
        assert_eq!(grammar.rules().binary(s, s).len(), 1);
        assert_eq!(grammar.weights().len(), 4);
        assert_eq!(grammar.weights().dep_nn(), 0.5);
        // the alt row is skipped without alt_markedup
        assert_eq!(grammar.relations().name(grammar.categories().rel(iv)), "nsubj");
    }

    #[test]
    fn test_alt_markedup_overrides() {
        let grammar = GrammarBuilder::new()
            .alt_markedup(true)
            .from_readers(
                CATEGORIES.as_bytes(),
                RULES.as_bytes(),
                FEATURES.as_bytes(),
                WEIGHTS.as_bytes(),
            )
            .unwrap();
        let iv = grammar.cat_id("S\\NP").unwrap();
        assert_eq!(grammar.relations().name(grammar.categories().rel(iv)), "dobj");
    }

    #[test]
    fn test_eisner_normal_form_drops_flagged() {
        let grammar = GrammarBuilder::new()
            .eisner_normal_form(true)
            .from_readers(
                CATEGORIES.as_bytes(),
                RULES.as_bytes(),
                FEATURES.as_bytes(),
                WEIGHTS.as_bytes(),
            )
            .unwrap();
        let s = grammar.cat_id("S").unwrap();
        assert!(grammar.rules().binary(s, s).is_empty());
    }

    #[test]
    fn test_weights_arity_checked() {
        let result = GrammarBuilder::new().from_readers(
            CATEGORIES.as_bytes(),
            RULES.as_bytes(),
            FEATURES.as_bytes(),
            "0.5\n".as_bytes(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_bare_root_feature_rejected() {
        let result = GrammarBuilder::new().from_readers(
            "S,\n".as_bytes(),
            "".as_bytes(),
            "root\n".as_bytes(),
            "".as_bytes(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_undefined_category_rejected() {
        let result = GrammarBuilder::new().from_readers(
            "NP,\n".as_bytes(),
            "binary,NP,VP,S,l,0\n".as_bytes(),
            "".as_bytes(),
            "".as_bytes(),
        );
        assert!(result.is_err());
    }
}
