//! 解析処理のためのルーチンを提供するモジュール。
//!
//! このモジュールは、チャート解析のための主要なワーカー構造体を提供します。
//! ワーカーはチャートと作業バッファを保持し、再利用することで不要な
//! メモリアロケーションを避けます。

use crate::dependency::FilledDependency;
use crate::grammar::CatId;
use crate::parser::chart::{Chart, NodeId, SuperCategory};
use crate::parser::{DefaultHooks, DepAttrs, ParseHooks, ParseOutcome, Parser, SkipReason};
use crate::sentence::Sentence;

/// 導出木の1ノードの文脈情報
///
/// 診断用のダンプ出力に使用されます。
#[derive(Debug, Clone)]
pub struct DerivationContext {
    /// ノードの範疇
    pub cat: CatId,
    /// 左の子の範疇（葉ならNone）
    pub left: Option<CatId>,
    /// 右の子の範疇（単項または葉ならNone）
    pub right: Option<CatId>,
    /// 主辞の単語ID列
    pub head_words: Vec<u32>,
    /// 主辞の品詞ID列
    pub head_postags: Vec<u32>,
}

/// 解析処理のためのルーチンを提供する構造体。
///
/// 解析に使用される内部データ構造を保持し、それらを再利用することで
/// 不要なメモリ再割り当てを回避します。作業バッファ（`results`と
/// `feature_ids`）はセル間で再利用され、呼び出しの外に漏れません。
///
/// # 例
///
/// ```ignore
/// let mut worker = parser.new_worker();
/// worker.reset_sentence(sentence);
/// match worker.parse() {
///     ParseOutcome::Parsed => println!("{} deps", worker.best_deps().unwrap().len()),
///     ParseOutcome::Exhausted => println!("{} deps (skimmed)", worker.skim_deps().len()),
///     ParseOutcome::Skipped(reason) => eprintln!("skipped: {reason:?}"),
/// }
/// ```
pub struct Worker {
    pub(crate) parser: Parser,
    pub(crate) sent: Sentence,
    pub(crate) chart: Chart,
    pub(crate) results: Vec<SuperCategory>,
    pub(crate) feature_ids: Vec<u32>,
    pub(crate) outcome: ParseOutcome,
}

impl Worker {
    /// 新しいインスタンスを作成します。
    ///
    /// # 引数
    ///
    /// * `parser` - 使用するパーサ
    pub(crate) fn new(parser: Parser) -> Self {
        Self {
            parser,
            sent: Sentence::new(),
            chart: Chart::new(),
            results: vec![],
            feature_ids: vec![],
            outcome: ParseOutcome::Exhausted,
        }
    }

    /// 解析する入力文をリセットします。
    ///
    /// 新しい文を設定し、文法モデルの語彙集合で単語・品詞IDを解決します。
    ///
    /// # 引数
    ///
    /// * `sentence` - 解析する文
    pub fn reset_sentence(&mut self, sentence: Sentence) {
        self.sent = sentence;
        self.sent.compile(self.parser.grammar.lexicon());
        self.outcome = ParseOutcome::Exhausted;
    }

    /// 設定された入力文を解析します。
    ///
    /// 解析結果は内部状態に保存され、[`best_root`]や[`best_deps`]などの
    /// メソッドでアクセスできます。空の文が設定されている場合は
    /// [`ParseOutcome::Exhausted`]を返します。
    ///
    /// [`best_root`]: Self::best_root
    /// [`best_deps`]: Self::best_deps
    pub fn parse(&mut self) -> ParseOutcome {
        self.parse_with_hooks(&mut DefaultHooks)
    }

    /// フックを挟みながら入力文を解析します。
    ///
    /// フックの`pre_parse`は語彙範疇の読み込み直後に、`post_parse`は
    /// 各セルの処理完了後に呼び出されます。
    ///
    /// # 引数
    ///
    /// * `hooks` - 解析の前後に呼び出されるフック
    ///
    /// # パニック
    ///
    /// キューブ枝刈りが有効でビーム幅が0の場合、パニックします。
    pub fn parse_with_hooks<H: ParseHooks>(&mut self, hooks: &mut H) -> ParseOutcome {
        let outcome = self.run(hooks);
        self.outcome = outcome;
        outcome
    }

    fn run<H: ParseHooks>(&mut self, hooks: &mut H) -> ParseOutcome {
        let num_words = self.sent.len();
        let beam_size = self.parser.beam_size;
        let beta = self.parser.beta;
        assert!(
            !self.parser.cube_pruning || beam_size > 0,
            "cube pruning requires a positive beam size"
        );

        if num_words == 0 {
            self.chart.clear(0);
            return ParseOutcome::Exhausted;
        }
        if num_words > self.parser.max_words {
            self.chart.clear(0);
            return ParseOutcome::Skipped(SkipReason::MaxWords);
        }

        self.chart.clear(num_words);
        {
            let Self {
                parser,
                sent,
                chart,
                ..
            } = self;
            chart.load(sent, beta, parser.grammar.categories());
        }

        if !hooks.pre_parse(&mut self.chart, &self.sent) {
            return ParseOutcome::Exhausted;
        }

        // Unary rules apply to the lexical categories; type-change needs to
        // come before type-raise since some results of type-change can be
        // type-raised (but not vice versa).
        for i in 0..num_words {
            for idx in 0..self.chart.cell(i, 1).len() {
                let id = self.chart.cell(i, 1).ids()[idx];
                self.calc_score(id, false);
            }

            self.type_change(i, 1);
            self.type_raise(i, 1);

            // Only the beta cutoff applies to the leaves; sorting alone can
            // still reorder equal scores, which propagates upwards because
            // there is no further tiebreaker after comparing scores.
            self.chart.apply_beam(i, 1, 0, beta);

            hooks.post_parse(&self.chart, i, 1, num_words);
        }

        let mut max_exceeded = false;
        'fill: for span in 2..=num_words {
            for position in 0..=(num_words - span) {
                self.chart.reserve_cell(position, span, beam_size);

                for split in 1..span {
                    if self.chart.num_super_categories() > self.parser.max_super_categories {
                        max_exceeded = true;
                        break 'fill;
                    }

                    let at_root = span == num_words;
                    if self.parser.cube_pruning {
                        self.combine_cube(position, split, span, at_root);
                    } else {
                        self.combine(position, split, span, at_root);
                    }
                }

                if self.parser.cube_pruning {
                    self.chart
                        .combine_pre_super_categories(position, span, beam_size);
                }

                if span < num_words {
                    self.type_change(position, span);
                    self.type_raise(position, span);
                }

                self.chart.apply_beam(position, span, beam_size, beta);

                hooks.post_parse(&self.chart, position, span, num_words);
            }
        }

        if max_exceeded {
            ParseOutcome::Skipped(SkipReason::MaxSuperCategories)
        } else if !self.chart.root().is_empty() {
            ParseOutcome::Parsed
        } else {
            ParseOutcome::Exhausted
        }
    }

    /// 2つのセルの直積全体に二項規則を適用します。
    fn combine(&mut self, position: usize, split: usize, span: usize, at_root: bool) {
        self.results.clear();
        {
            let Self {
                parser,
                sent,
                chart,
                results,
                ..
            } = self;
            let grammar = parser.grammar.as_ref();
            let left_cell = chart.cell(position, split);
            let right_cell = chart.cell(position + split, span - split);
            for &left in left_cell.ids() {
                for &right in right_cell.ids() {
                    grammar.combine(chart.entry(left), chart.entry(right), sent, results);
                }
            }
        }

        let range = {
            let Self { chart, results, .. } = self;
            chart.add_no_dp(position, span, results)
        };
        for raw in range {
            self.calc_score(NodeId::new(raw), at_root);
        }
    }

    /// セルに型変更規則を適用します。
    fn type_change(&mut self, position: usize, span: usize) {
        self.results.clear();
        {
            let Self {
                parser,
                chart,
                results,
                ..
            } = self;
            parser
                .grammar
                .type_change(chart.cell_entries(position, span), results);
        }
        let range = {
            let Self { chart, results, .. } = self;
            chart.add_no_dp(position, span, results)
        };
        for raw in range {
            self.calc_score(NodeId::new(raw), false);
        }
    }

    /// セルに型繰り上げ規則を適用します。
    fn type_raise(&mut self, position: usize, span: usize) {
        self.results.clear();
        {
            let Self {
                parser,
                chart,
                results,
                ..
            } = self;
            parser
                .grammar
                .type_raise(chart.cell_entries(position, span), results);
        }
        let range = {
            let Self { chart, results, .. } = self;
            chart.add_no_dp(position, span, results)
        };
        for raw in range {
            self.calc_score(NodeId::new(raw), false);
        }
    }

    /// スーパーカテゴリのスコアを計算します。
    ///
    /// 子のスコアは計算済みであることを前提とします。葉の場合、スコアは
    /// 文の読み込み時に設定された初期スコアのみを持つことを前提とし、
    /// 葉ごとに一度だけ呼び出されなければなりません。
    ///
    /// # 引数
    ///
    /// * `id` - スコアを計算するノード
    /// * `at_root` - ルートスパンでの結合かどうか
    pub(crate) fn calc_score(&mut self, id: NodeId, at_root: bool) {
        let Self {
            parser,
            sent,
            chart,
            feature_ids,
            ..
        } = self;
        let grammar = parser.grammar.as_ref();
        let features = grammar.features();
        let weights = grammar.weights();

        let (left, right) = {
            let sc = chart.super_category(id);
            (sc.left, sc.right)
        };

        let score = match (left, right) {
            (Some(left), Some(right)) => {
                let left_sc = chart.super_category(left);
                let right_sc = chart.super_category(right);
                let sc = chart.super_category(id);
                let mut score = left_sc.score + right_sc.score;

                feature_ids.clear();
                features.collect_binary(sc.cat, left_sc.cat, right_sc.cat, feature_ids);
                for &fid in feature_ids.iter() {
                    score += weights.get(fid);
                }

                if at_root {
                    feature_ids.clear();
                    let head_words: Vec<u32> = sc
                        .heads
                        .iter()
                        .map(|&h| sent.word_id(usize::from(h) - 1))
                        .collect();
                    features.collect_root(sc.cat, &head_words, feature_ids);
                    for &fid in feature_ids.iter() {
                        score += weights.get(fid);
                    }
                }
                score
            }
            (Some(left), None) => {
                // assumes no unary rules applied at the root
                let child_sc = chart.super_category(left);
                let sc = chart.super_category(id);
                let mut score = child_sc.score;

                feature_ids.clear();
                features.collect_unary(sc.cat, child_sc.cat, feature_ids);
                for &fid in feature_ids.iter() {
                    score += weights.get(fid);
                }
                score
            }
            (None, None) => {
                let sc = chart.super_category(id);
                let position = usize::from(sc.position);
                let mut score = sc.score;

                feature_ids.clear();
                features.collect_leaf(
                    sc.cat,
                    sent.word_id(position),
                    sent.postag_id(position),
                    feature_ids,
                );
                for &fid in feature_ids.iter() {
                    score += weights.get(fid);
                }
                score
            }
            (None, Some(_)) => unreachable!("a node cannot have only a right child"),
        };
        chart.super_category_mut(id).score = score;

        if let Some(scorer) = parser.dep_scorer.as_deref() {
            let log_dep_nn = {
                let sc = chart.super_category(id);
                let mut sum = 0.0;
                for dep in &sc.filled {
                    if let Some(filter) = parser.dep_filter.as_deref() {
                        if filter.ignore(dep, sent) {
                            continue;
                        }
                    }
                    let head = usize::from(dep.head_index) - 1;
                    let filler = usize::from(dep.filler) - 1;
                    let attrs = DepAttrs {
                        head: sent.word(head),
                        dependent: sent.word(filler),
                        relation: grammar.relations().name(dep.rel),
                        head_pos: sent.postag(head),
                        dependent_pos: sent.postag(filler),
                        distance: dep.head_index.abs_diff(dep.filler),
                        unary_rule_id: dep.unary_rule_id,
                    };
                    sum += scorer.predict_soft(&attrs).ln();
                }
                sum
            };
            let sc = chart.super_category_mut(id);
            sc.log_dep_nn_score = log_dep_nn;
            sc.score += weights.dep_nn() * log_dep_nn;
        }
    }

    /// 部分木の葉の初期スコアの総和を計算します。
    ///
    /// # 引数
    ///
    /// * `id` - 部分木のルート
    pub fn sum_leaf_initial_score(&self, id: NodeId) -> f64 {
        let sc = self.chart.super_category(id);
        if let Some(left) = sc.left {
            let mut sum = self.sum_leaf_initial_score(left);
            if let Some(right) = sc.right {
                sum += self.sum_leaf_initial_score(right);
            }
            sum
        } else {
            sc.log_p_score
        }
    }

    /// 部分木の依存関係ニューラルスコアの総和とノード数を計算します。
    ///
    /// # 引数
    ///
    /// * `id` - 部分木のルート
    ///
    /// # 戻り値
    ///
    /// スコアの総和とノード数のタプル
    pub fn sum_dep_nn(&self, id: NodeId) -> (f64, usize) {
        let sc = self.chart.super_category(id);
        let mut sum = sc.log_dep_nn_score;
        let mut count = 1;
        if let Some(left) = sc.left {
            let (left_sum, left_count) = self.sum_dep_nn(left);
            sum += left_sum;
            count += left_count;
            if let Some(right) = sc.right {
                let (right_sum, right_count) = self.sum_dep_nn(right);
                sum += right_sum;
                count += right_count;
            }
        }
        (sum, count)
    }

    /// 部分木の依存関係ニューラルスコアのノードあたり平均を計算します。
    ///
    /// # 引数
    ///
    /// * `id` - 部分木のルート
    pub fn average_sum_dep_nn(&self, id: NodeId) -> f64 {
        let (sum, count) = self.sum_dep_nn(id);
        sum / count as f64
    }

    /// ルートセルの最良のスーパーカテゴリを返します。
    ///
    /// # 戻り値
    ///
    /// ルートセルが空でなければ最高スコアのノード、空なら`None`
    pub fn best_root(&self) -> Option<NodeId> {
        let num_words = self.chart.num_words();
        if num_words == 0 {
            return None;
        }
        let mut best = None;
        let mut max_score = f64::NEG_INFINITY;
        for (id, sc) in self.chart.cell_entries(0, num_words) {
            if sc.score > max_score {
                max_score = sc.score;
                best = Some(id);
            }
        }
        best
    }

    /// 導出木の充足済み依存関係を収集します。
    ///
    /// ノード自身の依存関係、左の部分木、右の部分木の順に追加されます。
    ///
    /// # 引数
    ///
    /// * `id` - 導出木のルート
    /// * `out` - 依存関係の追加先
    pub fn derivation_deps(&self, id: NodeId, out: &mut Vec<FilledDependency>) {
        let sc = self.chart.super_category(id);
        out.extend_from_slice(&sc.filled);
        if let Some(left) = sc.left {
            self.derivation_deps(left, out);
            if let Some(right) = sc.right {
                self.derivation_deps(right, out);
            }
        }
    }

    /// 最良のルート導出の充足済み依存関係を返します。
    ///
    /// # 戻り値
    ///
    /// ルートセルが空でなければ依存関係の列、空なら`None`
    pub fn best_deps(&self) -> Option<Vec<FilledDependency>> {
        self.best_root().map(|id| {
            let mut deps = vec![];
            self.derivation_deps(id, &mut deps);
            deps
        })
    }

    /// 導出木の葉に選ばれた語彙範疇を左から順に収集します。
    ///
    /// # 引数
    ///
    /// * `id` - 導出木のルート
    /// * `out` - (単語位置, 範疇)の組の追加先
    pub fn derivation_supertags(&self, id: NodeId, out: &mut Vec<(usize, CatId)>) {
        let sc = self.chart.super_category(id);
        if let Some(left) = sc.left {
            self.derivation_supertags(left, out);
            if let Some(right) = sc.right {
                self.derivation_supertags(right, out);
            }
        } else {
            out.push((usize::from(sc.position), sc.cat));
        }
    }

    /// チャート全体の充足済み依存関係を格納順に収集します。
    ///
    /// 診断用の出力であり、ビームを生き残ったすべてのスーパーカテゴリの
    /// 依存関係を含みます。
    pub fn chart_deps(&self) -> Vec<FilledDependency> {
        let mut deps = vec![];
        for cell in self.chart.all_cells() {
            for &id in cell.ids() {
                deps.extend_from_slice(&self.chart.super_category(id).filled);
            }
        }
        deps
    }

    /// 導出木の各ノードの文脈情報を行きがけ順に収集します。
    ///
    /// 高コストな診断出力であり、通常の解析経路では使用されません。
    ///
    /// # 引数
    ///
    /// * `id` - 導出木のルート
    pub fn derivation_contexts(&self, id: NodeId) -> Vec<DerivationContext> {
        let mut contexts = vec![];
        self.collect_contexts(id, &mut contexts);
        contexts
    }

    fn collect_contexts(&self, id: NodeId, out: &mut Vec<DerivationContext>) {
        let sc = self.chart.super_category(id);
        out.push(DerivationContext {
            cat: sc.cat,
            left: sc.left.map(|l| self.chart.super_category(l).cat),
            right: sc.right.map(|r| self.chart.super_category(r).cat),
            head_words: sc
                .heads
                .iter()
                .map(|&h| self.sent.word_id(usize::from(h) - 1))
                .collect(),
            head_postags: sc
                .heads
                .iter()
                .map(|&h| self.sent.postag_id(usize::from(h) - 1))
                .collect(),
        });
        if let Some(left) = sc.left {
            self.collect_contexts(left, out);
            if let Some(right) = sc.right {
                self.collect_contexts(right, out);
            }
        }
    }

    /// 最良被覆の部分導出から依存関係を取り出します。
    ///
    /// ルートセルが空のときの代替デコーダです。空でないセルのうち最も
    /// 広いスパンを持つものを貪欲に選び、その中で最高スコアの導出の
    /// 依存関係を出力します。未被覆の前後の領域には再帰的に同じ手続きを
    /// 適用し、結果を左から右の順に連結します。
    ///
    /// # 戻り値
    ///
    /// 選ばれた部分導出の充足済み依存関係を左から右の順に連結した列
    pub fn skim_deps(&self) -> Vec<FilledDependency> {
        let mut deps = vec![];
        if !self.sent.is_empty() && self.chart.num_words() == self.sent.len() {
            self.skim_region(0, self.sent.len(), &mut deps);
        }
        deps
    }

    /// 領域内の最良被覆を選び、依存関係を収集します。
    ///
    /// # パニック
    ///
    /// 領域内に1つもスーパーカテゴリが存在しない場合、パニックします。
    /// 葉のセルはβ枝刈り後も必ず1つ以上の候補を保持するため、この状況は
    /// 発生しません。
    fn skim_region(&self, position: usize, span: usize, out: &mut Vec<FilledDependency>) {
        let mut max_position = 0;
        let mut max_span = 0;
        let mut max_score = f64::NEG_INFINITY;
        let mut best = None;

        'widths: for j in (1..=span).rev() {
            for i in position..=(position + span - j) {
                for (id, sc) in self.chart.cell_entries(i, j) {
                    if sc.score > max_score {
                        max_score = sc.score;
                        best = Some(id);
                        max_position = i;
                        max_span = j;
                    }
                }
            }

            if best.is_some() {
                break 'widths;
            }
        }

        let best = best.expect("every leaf cell keeps at least one supercategory");

        // left
        if max_position > position {
            self.skim_region(position, max_position - position, out);
        }

        // centre
        self.derivation_deps(best, out);

        // right
        if position + span > max_position + max_span {
            self.skim_region(
                max_position + max_span,
                position + span - max_position - max_span,
                out,
            );
        }
    }

    /// 最後の解析結果の区分を返します。
    #[inline(always)]
    pub fn outcome(&self) -> ParseOutcome {
        self.outcome
    }

    /// 文法モデルへの参照を返します。
    #[inline(always)]
    pub fn grammar(&self) -> &crate::grammar::Grammar {
        self.parser.grammar()
    }

    /// チャートへの参照を返します。
    #[inline(always)]
    pub fn chart(&self) -> &Chart {
        &self.chart
    }

    /// 解析中の文への参照を返します。
    #[inline(always)]
    pub fn sentence(&self) -> &Sentence {
        &self.sent
    }

    /// 最後の解析で生成されたスーパーカテゴリの総数を返します。
    #[inline(always)]
    pub fn num_super_categories(&self) -> usize {
        self.chart.num_super_categories()
    }
}
