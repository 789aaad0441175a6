//! 文法範疇と依存関係ラベルの集合
//!
//! このモジュールは、文法モデル内で範疇名と関係名をIDに対応付ける
//! 2つのレジストリを提供します。範疇は語彙範疇（スーパータグ）と
//! 規則適用の結果範疇の両方を含みます。

use bincode::{Decode, Encode};
use hashbrown::HashMap;

use crate::errors::{CadenzaError, Result};
use crate::utils::FromU32;

/// 文法範疇の識別子
///
/// 範疇集合への添字として機能する軽量な値型です。
#[derive(Clone, Copy, Default, Eq, PartialEq, Debug, Hash, PartialOrd, Ord, Encode, Decode)]
#[repr(transparent)]
pub struct CatId(pub u16);

/// 範疇定義の1行
///
/// モデルファイルに保存される正準形です。
#[derive(Debug, Clone, Encode, Decode)]
pub struct CategoryRow {
    /// 範疇の表記
    pub name: String,
    /// この範疇の引数スロットが充足する関係ID（0は関係なし）
    pub rel: u16,
}

/// 範疇集合
///
/// 範疇の表記とIDの双方向対応を保持します。各範疇は、その引数スロットが
/// 充足する依存関係のIDを1つ持つことができます。
#[derive(Debug, Clone, Default)]
pub struct CatSet {
    rows: Vec<CategoryRow>,
    ids: HashMap<String, CatId>,
}

impl CatSet {
    /// 新しい空の範疇集合を生成します
    pub fn new() -> Self {
        Self::default()
    }

    /// 保存された行から範疇集合を再構築します
    ///
    /// # 引数
    ///
    /// * `rows` - モデルファイルから読み込まれた範疇行
    pub(crate) fn from_rows(rows: Vec<CategoryRow>) -> Self {
        let mut ids = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            ids.insert(row.name.clone(), CatId(i as u16));
        }
        Self { rows, ids }
    }

    /// 範疇を追加します
    ///
    /// # 引数
    ///
    /// * `name` - 範疇の表記
    /// * `rel` - 引数スロットが充足する関係ID（0は関係なし）
    ///
    /// # 戻り値
    ///
    /// 新しく割り当てられた範疇ID
    ///
    /// # エラー
    ///
    /// 同名の範疇が既に存在する場合、または範疇数が上限を超えた場合、
    /// エラーを返します。
    pub fn push(&mut self, name: &str, rel: u16) -> Result<CatId> {
        if self.ids.contains_key(name) {
            return Err(CadenzaError::invalid_format(
                "categories",
                format!("duplicate category: {name}"),
            ));
        }
        let id = u16::try_from(self.rows.len()).map_err(|_| {
            CadenzaError::invalid_format("categories", "too many categories (max 65536)")
        })?;
        self.rows.push(CategoryRow {
            name: name.to_string(),
            rel,
        });
        self.ids.insert(name.to_string(), CatId(id));
        Ok(CatId(id))
    }

    /// 既存の範疇の関係IDを差し替えます
    ///
    /// 代替マークアップ行の適用に使用されます。
    ///
    /// # 引数
    ///
    /// * `id` - 対象の範疇ID
    /// * `rel` - 新しい関係ID
    pub fn set_rel(&mut self, id: CatId, rel: u16) {
        self.rows[usize::from(id.0)].rel = rel;
    }

    /// 表記から範疇IDを検索します
    ///
    /// # 引数
    ///
    /// * `name` - 範疇の表記
    ///
    /// # 戻り値
    ///
    /// 存在する場合は`Some(CatId)`、存在しない場合は`None`
    #[inline(always)]
    pub fn cat_id(&self, name: &str) -> Option<CatId> {
        self.ids.get(name).copied()
    }

    /// 範疇IDから表記を取得します
    ///
    /// # 引数
    ///
    /// * `id` - 範疇ID
    #[inline(always)]
    pub fn name(&self, id: CatId) -> &str {
        &self.rows[usize::from(id.0)].name
    }

    /// 範疇IDから関係IDを取得します
    ///
    /// # 引数
    ///
    /// * `id` - 範疇ID
    ///
    /// # 戻り値
    ///
    /// この範疇の引数スロットが充足する関係ID（0は関係なし）
    #[inline(always)]
    pub fn rel(&self, id: CatId) -> u16 {
        self.rows[usize::from(id.0)].rel
    }

    /// 登録されている範疇の数を返します
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// 範疇集合が空かどうかを返します
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 保存用の正準形を取り出します
    pub(crate) fn to_rows(&self) -> Vec<CategoryRow> {
        self.rows.clone()
    }
}

/// 依存関係ラベルの集合
///
/// 関係名とIDの双方向対応を保持します。ID 0 は「関係なし」として
/// 予約されています。
#[derive(Debug, Clone)]
pub struct RelSet {
    names: Vec<String>,
    ids: HashMap<String, u16>,
}

impl Default for RelSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RelSet {
    /// 新しい関係集合を生成します
    ///
    /// ID 0 は「関係なし」として予約されます。
    pub fn new() -> Self {
        Self {
            names: vec![String::new()],
            ids: HashMap::new(),
        }
    }

    /// 保存された名前列から関係集合を再構築します
    pub(crate) fn from_names(names: Vec<String>) -> Self {
        let mut ids = HashMap::with_capacity(names.len());
        for (i, name) in names.iter().enumerate().skip(1) {
            ids.insert(name.clone(), i as u16);
        }
        Self { names, ids }
    }

    /// 関係名をIDに対応付けます
    ///
    /// 既に登録済みの場合は既存のIDを返します。
    ///
    /// # 引数
    ///
    /// * `name` - 関係名
    ///
    /// # エラー
    ///
    /// 関係数が上限を超えた場合、エラーを返します。
    pub fn intern(&mut self, name: &str) -> Result<u16> {
        if let Some(&id) = self.ids.get(name) {
            return Ok(id);
        }
        let id = u16::try_from(self.names.len()).map_err(|_| {
            CadenzaError::invalid_format("relations", "too many relations (max 65536)")
        })?;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        Ok(id)
    }

    /// 関係IDから名前を取得します
    ///
    /// # 引数
    ///
    /// * `id` - 関係ID
    #[inline(always)]
    pub fn name(&self, id: u16) -> &str {
        &self.names[usize::from_u32(u32::from(id))]
    }

    /// 登録されている関係の数を返します（予約ID 0 を含む）
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// 関係集合が空かどうかを返します
    ///
    /// 予約ID 0 のみの場合も空ではないとみなされます。
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// 保存用の正準形を取り出します
    pub(crate) fn to_names(&self) -> Vec<String> {
        self.names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catset_push_and_lookup() {
        let mut cats = CatSet::new();
        let np = cats.push("NP", 0).unwrap();
        let iv = cats.push("S\\NP", 1).unwrap();
        assert_eq!(cats.cat_id("NP"), Some(np));
        assert_eq!(cats.cat_id("S\\NP"), Some(iv));
        assert_eq!(cats.cat_id("S"), None);
        assert_eq!(cats.name(iv), "S\\NP");
        assert_eq!(cats.rel(iv), 1);
        assert_eq!(cats.rel(np), 0);
    }

    #[test]
    fn test_catset_duplicate() {
        let mut cats = CatSet::new();
        cats.push("NP", 0).unwrap();
        assert!(cats.push("NP", 0).is_err());
    }

    #[test]
    fn test_catset_roundtrip() {
        let mut cats = CatSet::new();
        cats.push("NP", 0).unwrap();
        cats.push("S", 2).unwrap();
        let restored = CatSet::from_rows(cats.to_rows());
        assert_eq!(restored.cat_id("S"), Some(CatId(1)));
        assert_eq!(restored.rel(CatId(1)), 2);
    }

    #[test]
    fn test_relset_reserves_zero() {
        let mut rels = RelSet::new();
        let subj = rels.intern("nsubj").unwrap();
        assert_eq!(subj, 1);
        assert_eq!(rels.intern("nsubj").unwrap(), 1);
        assert_eq!(rels.name(subj), "nsubj");
        assert_eq!(rels.name(0), "");
    }
}
