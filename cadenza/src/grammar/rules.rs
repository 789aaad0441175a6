//! 結合規則のテーブル
//!
//! このモジュールは、規則エンジンの中核となる3つの規則表を提供します。
//!
//! - 二項規則表: 範疇の組 `(左, 右)` をキーとして結果範疇を引きます。
//! - 型変更（type-change）規則表: 単一の範疇をキーとします。
//! - 型繰り上げ（type-raise）規則表: 単一の範疇をキーとします。
//!
//! いずれの表も、該当する規則が存在しない場合は空のスライスを返すだけで、
//! エラーにはなりません。

use bincode::{Decode, Encode};
use hashbrown::HashMap;

use crate::grammar::category::CatId;

/// 二項規則における主辞の位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Encode, Decode)]
pub enum HeadSide {
    /// 左の構成素が主辞（順方向の関数適用など）
    Left,
    /// 右の構成素が主辞（逆方向の関数適用など）
    Right,
    /// 両方が主辞（並列構造）
    Both,
}

/// 二項規則の適用結果
#[derive(Debug, Clone, Copy)]
pub struct BinaryRule {
    /// 結果範疇
    pub result: CatId,
    /// 主辞の位置
    pub head: HeadSide,
    /// 主辞側の未充足依存関係を非主辞側の主辞で充足するかどうか
    pub fills: bool,
}

/// 単項規則の適用結果
#[derive(Debug, Clone, Copy)]
pub struct UnaryRule {
    /// 結果範疇
    pub result: CatId,
    /// 規則ID（依存関係に刻印されます）
    pub rule_id: u16,
}

/// 規則定義の1行
///
/// モデルファイルに保存される正準形です。
#[derive(Debug, Clone, Encode, Decode)]
pub enum RuleRow {
    /// 二項結合規則
    Binary {
        left: CatId,
        right: CatId,
        result: CatId,
        head: HeadSide,
        fills: bool,
    },
    /// 型変更規則
    TypeChange {
        source: CatId,
        result: CatId,
        rule_id: u16,
    },
    /// 型繰り上げ規則
    TypeRaise {
        source: CatId,
        result: CatId,
        rule_id: u16,
    },
}

/// 規則エンジンの規則表
///
/// 規則行の正準列と、そこから導出された検索表を保持します。
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rows: Vec<RuleRow>,
    binary: HashMap<(CatId, CatId), Vec<BinaryRule>>,
    type_change: HashMap<CatId, Vec<UnaryRule>>,
    type_raise: HashMap<CatId, Vec<UnaryRule>>,
}

impl RuleSet {
    /// 新しい空の規則表を生成します
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存された行から規則表を再構築します
    pub(crate) fn from_rows(rows: Vec<RuleRow>) -> Self {
        let mut set = Self {
            rows: Vec::with_capacity(rows.len()),
            ..Self::default()
        };
        for row in rows {
            set.index(&row);
            set.rows.push(row);
        }
        set
    }

    fn index(&mut self, row: &RuleRow) {
        match *row {
            RuleRow::Binary {
                left,
                right,
                result,
                head,
                fills,
            } => {
                self.binary
                    .entry((left, right))
                    .or_default()
                    .push(BinaryRule {
                        result,
                        head,
                        fills,
                    });
            }
            RuleRow::TypeChange {
                source,
                result,
                rule_id,
            } => {
                self.type_change
                    .entry(source)
                    .or_default()
                    .push(UnaryRule { result, rule_id });
            }
            RuleRow::TypeRaise {
                source,
                result,
                rule_id,
            } => {
                self.type_raise
                    .entry(source)
                    .or_default()
                    .push(UnaryRule { result, rule_id });
            }
        }
    }

    /// 規則行を追加します
    ///
    /// # 引数
    ///
    /// * `row` - 追加する規則行
    pub fn push(&mut self, row: RuleRow) {
        self.index(&row);
        self.rows.push(row);
    }

    /// 範疇の組に適用可能な二項規則を返します
    ///
    /// # 引数
    ///
    /// * `left` - 左の構成素の範疇
    /// * `right` - 右の構成素の範疇
    ///
    /// # 戻り値
    ///
    /// 適用可能な規則のスライス。該当がなければ空のスライス。
    #[inline(always)]
    pub fn binary(&self, left: CatId, right: CatId) -> &[BinaryRule] {
        self.binary
            .get(&(left, right))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 範疇に適用可能な型変更規則を返します
    ///
    /// # 引数
    ///
    /// * `source` - 元の範疇
    #[inline(always)]
    pub fn type_change(&self, source: CatId) -> &[UnaryRule] {
        self.type_change
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 範疇に適用可能な型繰り上げ規則を返します
    ///
    /// # 引数
    ///
    /// * `source` - 元の範疇
    #[inline(always)]
    pub fn type_raise(&self, source: CatId) -> &[UnaryRule] {
        self.type_raise
            .get(&source)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// 登録されている規則の数を返します
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 規則表が空かどうかを返します
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 保存用の正準形を取り出します
    pub(crate) fn to_rows(&self) -> Vec<RuleRow> {
        self.rows.clone()
    }
}
