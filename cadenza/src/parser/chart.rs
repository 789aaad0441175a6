//! チャート（三角表）構造の実装モジュール。
//!
//! このモジュールは、CKYアルゴリズムによる構文解析のための
//! チャート構造を提供します。チャートはセルとスーパーカテゴリから構成され、
//! 最良の導出を見つけるために使用されます。
//!
//! スーパーカテゴリの実体はチャートが所有する単一のアリーナに確保され、
//! 親子関係は[`NodeId`]による添字リンクで表現されます。子ノードは常に
//! 親より先に確保されるため、循環は構造上存在しません。`clear()`で
//! アリーナ全体が一括で無効化されます。

use crate::dependency::{Dependency, FilledDependency};
use crate::grammar::{CatId, CatSet, HeadSide};
use crate::sentence::Sentence;
use crate::utils::FromU32;

/// アリーナ内のスーパーカテゴリを指す添字
///
/// チャートの`clear()`が呼ばれるまで有効です。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct NodeId(u32);

impl NodeId {
    #[inline(always)]
    pub(crate) const fn new(x: u32) -> Self {
        Self(x)
    }

    #[inline(always)]
    pub(crate) fn index(self) -> usize {
        usize::from_u32(self.0)
    }
}

/// 導出森のノード。
///
/// 各ノードは1つの範疇の適用結果を表し、位置情報、主辞、依存関係、
/// 累積スコアなどを保持します。
#[derive(Debug, Clone)]
pub struct SuperCategory {
    /// このノードの範疇
    pub cat: CatId,
    /// この構成素の主辞の単語位置（1始まり）
    pub heads: Vec<u16>,
    /// 充足語が未決定の依存関係
    pub unfilled: Vec<Dependency>,
    /// このノードで生成された充足済み依存関係
    pub filled: Vec<FilledDependency>,
    /// 左の子（葉ならNone）
    pub left: Option<NodeId>,
    /// 右の子（単項ならNone）
    pub right: Option<NodeId>,
    /// 構成素の開始位置（0始まり）
    pub position: u16,
    /// 構成素のスパン幅
    pub span: u16,
    /// 累積スコア
    pub score: f64,
    /// 葉の初期スコア（スーパータガーの対数確率）
    pub log_p_score: f64,
    /// 依存関係ニューラルスコアの対数和
    pub log_dep_nn_score: f64,
}

impl SuperCategory {
    /// 葉ノードを生成します。
    ///
    /// スコアはスーパータガーの対数確率で初期化されます。語彙素性の
    /// 寄与は後段のスコア計算で加算されます。
    ///
    /// # 引数
    ///
    /// * `cat` - 語彙範疇
    /// * `rel` - 範疇の引数スロットが充足する関係ID（0は関係なし）
    /// * `position` - 単語位置（0始まり）
    /// * `log_p` - スーパータガーの対数確率
    pub fn leaf(cat: CatId, rel: u16, position: u16, log_p: f64) -> Self {
        let head = position + 1;
        let unfilled = if rel != 0 {
            vec![Dependency::new(rel, head, 1, 0)]
        } else {
            vec![]
        };
        Self {
            cat,
            heads: vec![head],
            unfilled,
            filled: vec![],
            left: None,
            right: None,
            position,
            span: 1,
            score: log_p,
            log_p_score: log_p,
            log_dep_nn_score: 0.0,
        }
    }

    /// 単項規則の適用結果を生成します。
    ///
    /// 主辞は子からそのまま引き継がれます。結果範疇が関係を持つ場合は
    /// 主辞ごとに新しい未充足依存関係を生成し、持たない場合は子の
    /// 未充足依存関係を規則IDを付け替えて引き継ぎます。
    ///
    /// # 引数
    ///
    /// * `cat` - 結果範疇
    /// * `rel` - 結果範疇の関係ID
    /// * `rule_id` - 適用された単項規則のID
    /// * `child` - 子の構成素（ノードIDと実体の組）
    pub fn unary(cat: CatId, rel: u16, rule_id: u16, child: (NodeId, &SuperCategory)) -> Self {
        let (child_id, child_sc) = child;
        let unfilled = if rel != 0 {
            child_sc
                .heads
                .iter()
                .map(|&h| Dependency::new(rel, h, 1, rule_id))
                .collect()
        } else {
            child_sc
                .unfilled
                .iter()
                .map(|d| Dependency::retagged(d, 1, rule_id))
                .collect()
        };
        Self {
            cat,
            heads: child_sc.heads.clone(),
            unfilled,
            filled: vec![],
            left: Some(child_id),
            right: None,
            position: child_sc.position,
            span: child_sc.span,
            score: 0.0,
            log_p_score: 0.0,
            log_dep_nn_score: 0.0,
        }
    }

    /// 二項規則の適用結果を生成します。
    ///
    /// `fills`が真の場合、主辞側の未充足依存関係が非主辞側のすべての
    /// 主辞によって充足されます。充足候補が複数ある場合（並列構造）、
    /// 生成される依存関係の並列係数は候補数になります。
    ///
    /// # 引数
    ///
    /// * `cat` - 結果範疇
    /// * `rel` - 結果範疇の関係ID
    /// * `head` - 主辞の位置
    /// * `fills` - 依存関係を充足するかどうか
    /// * `left` - 左の構成素（ノードIDと実体の組）
    /// * `right` - 右の構成素（ノードIDと実体の組）
    pub fn binary(
        cat: CatId,
        rel: u16,
        head: HeadSide,
        fills: bool,
        left: (NodeId, &SuperCategory),
        right: (NodeId, &SuperCategory),
    ) -> Self {
        let (left_id, left_sc) = left;
        let (right_id, right_sc) = right;

        let heads: Vec<u16> = match head {
            HeadSide::Left => left_sc.heads.clone(),
            HeadSide::Right => right_sc.heads.clone(),
            HeadSide::Both => {
                let mut h = left_sc.heads.clone();
                h.extend_from_slice(&right_sc.heads);
                h
            }
        };

        let mut filled = vec![];
        let slot = match head {
            HeadSide::Left => Some((left_sc, right_sc)),
            HeadSide::Right => Some((right_sc, left_sc)),
            // Coordination merges heads instead of consuming a slot.
            HeadSide::Both => None,
        };
        if fills {
            if let Some((head_sc, dep_sc)) = slot {
                let conj_factor = dep_sc.heads.len() as u16;
                for dep in &head_sc.unfilled {
                    for &filler in &dep_sc.heads {
                        filled.push(FilledDependency::fill(dep, filler, conj_factor));
                    }
                }
            }
        }

        let unfilled = if rel != 0 {
            heads
                .iter()
                .map(|&h| Dependency::new(rel, h, 1, 0))
                .collect()
        } else {
            vec![]
        };

        Self {
            cat,
            heads,
            unfilled,
            filled,
            left: Some(left_id),
            right: Some(right_id),
            position: left_sc.position,
            span: left_sc.span + right_sc.span,
            score: 0.0,
            log_p_score: 0.0,
            log_dep_nn_score: 0.0,
        }
    }

    /// このノードが葉かどうかを判定します。
    #[inline(always)]
    pub fn is_leaf(&self) -> bool {
        self.left.is_none()
    }
}

/// チャートの1セル。
///
/// 1つの(位置, スパン)の組に対するスーパーカテゴリの集まりを保持します。
/// `pre_super_categories`はキューブ枝刈りの分割点ごとのステージング領域で、
/// すべての分割点の処理後に`combine_pre_super_categories`で確定リストに
/// 統合されます。
#[derive(Debug, Default, Clone)]
pub struct Cell {
    super_categories: Vec<NodeId>,
    pre_super_categories: Vec<Vec<NodeId>>,
}

impl Cell {
    /// 確定済みのスーパーカテゴリのID列を返します。
    #[inline(always)]
    pub fn ids(&self) -> &[NodeId] {
        &self.super_categories
    }

    /// セルが空かどうかを判定します。
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.super_categories.is_empty()
    }

    /// 確定済みのスーパーカテゴリの数を返します。
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.super_categories.len()
    }

    fn clear(&mut self) {
        self.super_categories.clear();
        self.pre_super_categories.clear();
    }
}

/// (位置, スパン)で添字付けされた三角形のチャート。
///
/// すべてのスーパーカテゴリの実体を所有し、セルはアリーナへの添字のみを
/// 保持します。
#[derive(Default)]
pub struct Chart {
    cells: Vec<Cell>,
    arena: Vec<SuperCategory>,
    num_words: usize,
}

impl Chart {
    /// 新しい空のチャートを生成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// チャートをリセットし、新しい文の処理を準備します。
    ///
    /// セルのバッファは再利用され、アリーナは空になります。以前の
    /// [`NodeId`]はすべて無効になります。
    ///
    /// # 引数
    ///
    /// * `num_words` - 新しい文の単語数
    pub fn clear(&mut self, num_words: usize) {
        for cell in self.cells.iter_mut() {
            cell.clear();
        }
        let new_len = num_words * (num_words + 1) / 2;
        let cur_len = self.cells.len();
        if cur_len < new_len {
            self.cells.reserve(new_len - cur_len);
            for _ in cur_len..new_len {
                self.cells.push(Cell::default());
            }
        }
        self.arena.clear();
        self.num_words = num_words;
    }

    /// 設定された文の単語数を返します。
    #[inline(always)]
    pub const fn num_words(&self) -> usize {
        self.num_words
    }

    /// これまでに生成されたスーパーカテゴリの総数を返します。
    ///
    /// セルに確定済みかどうかによらず、アリーナに確保されたすべての
    /// ノードを数えます。
    #[inline(always)]
    pub fn num_super_categories(&self) -> usize {
        self.arena.len()
    }

    #[inline(always)]
    fn cell_index(&self, position: usize, span: usize) -> usize {
        debug_assert!(span >= 1);
        debug_assert!(position + span <= self.num_words);
        let n = self.num_words;
        // Cells are laid out span-major: all width-1 cells first, then width-2...
        (span - 1) * (n + 1) - span * (span - 1) / 2 + position
    }

    /// 指定された位置とスパンのセルへの参照を返します。
    ///
    /// # 引数
    ///
    /// * `position` - 構成素の開始位置（0始まり）
    /// * `span` - 構成素のスパン幅
    #[inline(always)]
    pub fn cell(&self, position: usize, span: usize) -> &Cell {
        &self.cells[self.cell_index(position, span)]
    }

    #[inline(always)]
    fn cell_mut(&mut self, position: usize, span: usize) -> &mut Cell {
        let idx = self.cell_index(position, span);
        &mut self.cells[idx]
    }

    /// 文全体をカバーするルートセルへの参照を返します。
    #[inline(always)]
    pub fn root(&self) -> &Cell {
        self.cell(0, self.num_words)
    }

    /// IDからスーパーカテゴリへの参照を取得します。
    #[inline(always)]
    pub fn super_category(&self, id: NodeId) -> &SuperCategory {
        &self.arena[id.index()]
    }

    /// IDからスーパーカテゴリへの可変参照を取得します。
    #[inline(always)]
    pub(crate) fn super_category_mut(&mut self, id: NodeId) -> &mut SuperCategory {
        &mut self.arena[id.index()]
    }

    /// IDと実体の組を取得します。
    #[inline(always)]
    pub fn entry(&self, id: NodeId) -> (NodeId, &SuperCategory) {
        (id, self.super_category(id))
    }

    /// セル内の確定済みスーパーカテゴリをIDと実体の組で列挙します。
    ///
    /// # 引数
    ///
    /// * `position` - 構成素の開始位置（0始まり）
    /// * `span` - 構成素のスパン幅
    pub fn cell_entries(
        &self,
        position: usize,
        span: usize,
    ) -> impl Iterator<Item = (NodeId, &SuperCategory)> + '_ {
        self.cell(position, span)
            .ids()
            .iter()
            .map(|&id| (id, &self.arena[id.index()]))
    }

    /// すべてのセルを格納順に列挙します。
    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> + '_ {
        let n = self.num_words * (self.num_words + 1) / 2;
        self.cells[..n].iter()
    }

    /// スーパーカテゴリをアリーナに確保します。
    ///
    /// # 戻り値
    ///
    /// 確保されたノードのID
    pub(crate) fn alloc(&mut self, super_cat: SuperCategory) -> NodeId {
        let id = NodeId::new(self.arena.len() as u32);
        self.arena.push(super_cat);
        id
    }

    /// 幅1のセルに語彙範疇を読み込みます。
    ///
    /// 単語ごとに候補の最大対数確率を求め、`max + ln β`を下回る候補を
    /// 除外してから葉ノードを生成します。
    ///
    /// # 引数
    ///
    /// * `sentence` - 解析する文
    /// * `beta` - 語彙候補の枝刈りに使用するβ値（線形、(0, 1]）
    /// * `categories` - 範疇の関係定義の解決に使用する範疇集合
    pub fn load(&mut self, sentence: &Sentence, beta: f64, categories: &CatSet) {
        debug_assert_eq!(self.num_words, sentence.len());
        let log_beta = beta.ln();
        for i in 0..sentence.len() {
            let candidates = sentence.candidates(i);
            if candidates.is_empty() {
                continue;
            }
            let max_log_p = candidates
                .iter()
                .map(|c| c.log_p)
                .fold(f64::NEG_INFINITY, f64::max);
            let cutoff = max_log_p + log_beta;
            for cand in candidates {
                if cand.log_p < cutoff {
                    continue;
                }
                let rel = categories.rel(cand.cat);
                let id = self.alloc(SuperCategory::leaf(cand.cat, rel, i as u16, cand.log_p));
                self.cell_mut(i, 1).super_categories.push(id);
            }
        }
    }

    /// 結果をアリーナに確保し、重複検査なしでセルに追加します。
    ///
    /// 重複の排除は後段のビーム適用に委ねられます。
    ///
    /// # 引数
    ///
    /// * `position` - 対象セルの開始位置
    /// * `span` - 対象セルのスパン幅
    /// * `results` - 追加するスーパーカテゴリ（呼び出し後は空になります）
    ///
    /// # 戻り値
    ///
    /// 確保されたノードIDの範囲
    pub(crate) fn add_no_dp(
        &mut self,
        position: usize,
        span: usize,
        results: &mut Vec<SuperCategory>,
    ) -> std::ops::Range<u32> {
        let start = self.arena.len() as u32;
        for super_cat in results.drain(..) {
            let id = self.alloc(super_cat);
            self.cell_mut(position, span).super_categories.push(id);
        }
        start..self.arena.len() as u32
    }

    /// 結果をアリーナにのみ確保します。
    ///
    /// セルには追加されません。キューブ枝刈りのステージング経路で
    /// 使用されます。
    ///
    /// # 引数
    ///
    /// * `results` - 確保するスーパーカテゴリ（呼び出し後は空になります）
    ///
    /// # 戻り値
    ///
    /// 確保されたノードIDの範囲
    pub(crate) fn alloc_all(&mut self, results: &mut Vec<SuperCategory>) -> std::ops::Range<u32> {
        let start = self.arena.len() as u32;
        for super_cat in results.drain(..) {
            self.arena.push(super_cat);
        }
        start..self.arena.len() as u32
    }

    /// キューブ枝刈りの結果をステージング領域に積みます。
    ///
    /// # 引数
    ///
    /// * `position` - 対象セルの開始位置
    /// * `span` - 対象セルのスパン幅
    /// * `kbest` - スコア降順に整列済みのノードID列
    pub(crate) fn stage_pre_super_categories(
        &mut self,
        position: usize,
        span: usize,
        kbest: Vec<NodeId>,
    ) {
        self.cell_mut(position, span).pre_super_categories.push(kbest);
    }

    /// 分割点ごとのステージング領域を1つに統合します。
    ///
    /// 各ステージング列はスコア降順に整列済みであることが前提です。
    /// 統合結果はスコア降順で上位`k`件に制限され、セルの確定リストに
    /// 追加されます。
    ///
    /// # 引数
    ///
    /// * `position` - 対象セルの開始位置
    /// * `span` - 対象セルのスパン幅
    /// * `k` - 統合後に保持する最大数（0は無制限）
    pub(crate) fn combine_pre_super_categories(&mut self, position: usize, span: usize, k: usize) {
        let idx = self.cell_index(position, span);
        let Self { cells, arena, .. } = self;
        let cell = &mut cells[idx];

        let mut merged: Vec<NodeId> = cell.pre_super_categories.drain(..).flatten().collect();
        merged.sort_by(|&a, &b| {
            arena[b.index()]
                .score
                .total_cmp(&arena[a.index()].score)
        });
        if k > 0 {
            merged.truncate(k);
        }
        cell.super_categories.extend(merged);
    }

    /// セルにβ枝刈りとビーム上限を適用します。
    ///
    /// セルの内容はスコア降順に整列され、`max + ln β`を下回るスコアの
    /// スーパーカテゴリが取り除かれます。`max_count`が正の場合、残りは
    /// 先頭から`max_count`件に制限されます。
    ///
    /// 同点のスコアの順序は挿入順で固定されます。
    ///
    /// # 引数
    ///
    /// * `position` - 対象セルの開始位置
    /// * `span` - 対象セルのスパン幅
    /// * `max_count` - ビーム上限（0は上限なし）
    /// * `beta` - β値（線形、(0, 1]）
    pub fn apply_beam(&mut self, position: usize, span: usize, max_count: usize, beta: f64) {
        let idx = self.cell_index(position, span);
        let Self { cells, arena, .. } = self;
        let cell = &mut cells[idx];
        if cell.super_categories.is_empty() {
            return;
        }

        let max_score = cell
            .super_categories
            .iter()
            .map(|&id| arena[id.index()].score)
            .fold(f64::NEG_INFINITY, f64::max);
        let cutoff = max_score + beta.ln();

        // Stable sort keeps the insertion order among equal scores.
        cell.super_categories.sort_by(|&a, &b| {
            arena[b.index()]
                .score
                .total_cmp(&arena[a.index()].score)
        });
        cell.super_categories
            .retain(|&id| arena[id.index()].score >= cutoff);
        if max_count > 0 {
            cell.super_categories.truncate(max_count);
        }
    }

    /// 結合処理に先立ってセルの容量を確保します。
    ///
    /// 初期容量は結合操作の数（スパン−1）と2つのセルからの組み合わせ数
    /// （ビーム幅の2乗）の積で、型変更・型繰り上げによる追加分として
    /// さらに2倍します。
    ///
    /// # 引数
    ///
    /// * `position` - 対象セルの開始位置
    /// * `span` - 対象セルのスパン幅
    /// * `beam_size` - ビーム幅
    pub(crate) fn reserve_cell(&mut self, position: usize, span: usize, beam_size: usize) {
        let min_capacity = (span - 1) * beam_size * beam_size * 2;
        self.cell_mut(position, span)
            .super_categories
            .reserve(min_capacity);
    }
}

impl std::fmt::Debug for Chart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Chart {{ num_words: {}, cells: [", self.num_words)?;
        for span in 1..=self.num_words {
            for position in 0..=(self.num_words - span) {
                let cell = self.cell(position, span);
                if !cell.is_empty() {
                    writeln!(f, "({position},{span}) => {:?}", cell.super_categories)?;
                }
            }
        }
        writeln!(f, "]}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::sentence::LexCandidate;

    fn leaf_at(chart: &mut Chart, position: usize, cat: CatId, score: f64) -> NodeId {
        let id = chart.alloc(SuperCategory::leaf(cat, 0, position as u16, score));
        chart.cell_mut(position, 1).super_categories.push(id);
        id
    }

    #[test]
    fn test_cell_index_is_triangular() {
        let mut chart = Chart::new();
        chart.clear(3);
        // 3 words: spans 1..=3, cells 3 + 2 + 1
        assert_eq!(chart.cell_index(0, 1), 0);
        assert_eq!(chart.cell_index(2, 1), 2);
        assert_eq!(chart.cell_index(0, 2), 3);
        assert_eq!(chart.cell_index(1, 2), 4);
        assert_eq!(chart.cell_index(0, 3), 5);
    }

    #[test]
    fn test_clear_invalidates_arena() {
        let mut chart = Chart::new();
        chart.clear(2);
        leaf_at(&mut chart, 0, CatId(0), -1.0);
        assert_eq!(chart.num_super_categories(), 1);
        chart.clear(2);
        assert_eq!(chart.num_super_categories(), 0);
        assert!(chart.cell(0, 1).is_empty());
    }

    #[test]
    fn test_load_filters_by_beta() {
        let mut sent = Sentence::new();
        sent.push_word(
            "run",
            "VB",
            vec![
                LexCandidate {
                    cat: CatId(0),
                    log_p: -1.0,
                },
                LexCandidate {
                    cat: CatId(1),
                    log_p: -3.0,
                },
            ],
        );
        let mut cats = CatSet::new();
        cats.push("S", 0).unwrap();
        cats.push("NP", 0).unwrap();

        let mut chart = Chart::new();
        chart.clear(1);
        // ln beta = -1, so only the candidate within 1.0 of the best survives
        chart.load(&sent, (-1.0f64).exp(), &cats);
        assert_eq!(chart.cell(0, 1).len(), 1);
        let id = chart.cell(0, 1).ids()[0];
        assert_eq!(chart.super_category(id).cat, CatId(0));
    }

    #[test]
    fn test_apply_beam_orders_and_caps() {
        let mut chart = Chart::new();
        chart.clear(4);
        // four leaves in one cell with unordered scores
        let a = chart.alloc(SuperCategory::leaf(CatId(0), 0, 0, -2.0));
        let b = chart.alloc(SuperCategory::leaf(CatId(1), 0, 0, -0.5));
        let c = chart.alloc(SuperCategory::leaf(CatId(2), 0, 0, -1.0));
        let d = chart.alloc(SuperCategory::leaf(CatId(3), 0, 0, -3.0));
        for id in [a, b, c, d] {
            chart.cell_mut(0, 1).super_categories.push(id);
        }

        // beta keeps scores within 1.2 of the max (-0.5), the cap keeps 2
        chart.apply_beam(0, 1, 2, (-1.2f64).exp());
        let kept = chart.cell(0, 1).ids();
        assert_eq!(kept, &[b, c]);
    }

    #[test]
    fn test_apply_beam_beta_one_keeps_ties_only() {
        let mut chart = Chart::new();
        chart.clear(2);
        let a = chart.alloc(SuperCategory::leaf(CatId(0), 0, 0, -1.0));
        let b = chart.alloc(SuperCategory::leaf(CatId(1), 0, 0, -1.0));
        let c = chart.alloc(SuperCategory::leaf(CatId(2), 0, 0, -2.0));
        for id in [a, b, c] {
            chart.cell_mut(0, 1).super_categories.push(id);
        }
        chart.apply_beam(0, 1, 0, 1.0);
        // ties with the max survive in insertion order
        assert_eq!(chart.cell(0, 1).ids(), &[a, b]);
    }

    #[test]
    fn test_combine_pre_super_categories_merges_and_caps() {
        let mut chart = Chart::new();
        chart.clear(2);
        let a = chart.alloc(SuperCategory::leaf(CatId(0), 0, 0, -0.5));
        let b = chart.alloc(SuperCategory::leaf(CatId(1), 0, 0, -1.5));
        let c = chart.alloc(SuperCategory::leaf(CatId(2), 0, 0, -1.0));
        chart.stage_pre_super_categories(0, 2, vec![a, b]);
        chart.stage_pre_super_categories(0, 2, vec![c]);
        chart.combine_pre_super_categories(0, 2, 2);
        assert_eq!(chart.cell(0, 2).ids(), &[a, c]);
    }
}
