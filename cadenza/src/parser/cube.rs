//! キューブ枝刈りによる上位k件の結合モジュール。
//!
//! このモジュールは、2つのセルの直積を実体化せずに、規則適用結果の
//! 上位k件を近似的に列挙する機能を提供します。両方の入力セルがスコア
//! 降順に整列済みであること（それぞれの構築直後に適用されたビームが
//! 保証します）を前提とします。
//!
//! 列挙は(0, 0)から始まる単調なフロンティアの展開として進みます。
//! 結果が取り出されるたびに、その位置の右と下の隣接ペアが展開候補に
//! 追加されます。規則の寄与が子のスコア和に対して単調であれば、
//! この列挙は直積全体の上位k件と一致します。

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};

use crate::parser::chart::NodeId;
use crate::parser::worker::Worker;

// Queue entries carry the frontier coordinates of the pair that produced
// them. A pair whose rules yield nothing still enters the queue as a
// sentinel (item == None) so that its neighbours get explored.

/// 優先度付きキュー内の候補
#[derive(Debug)]
struct CubeEntry {
    /// 生成されたノード。規則が結果を生まなかった場合はNone。
    item: Option<NodeId>,
    /// ノードのスコア（番兵は負の無限大）
    score: f64,
    /// 挿入順の通し番号。同点の順序を固定するために使用されます。
    seq: u32,
    /// 左セル内の添字
    left: usize,
    /// 右セル内の添字
    right: usize,
}

impl PartialEq for CubeEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for CubeEntry {}

impl PartialOrd for CubeEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CubeEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Sentinels sort below every real entry so that real categories
        // surface first; earlier insertion wins among equal scores.
        match (self.item.is_some(), other.item.is_some()) {
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            _ => self
                .score
                .total_cmp(&other.score)
                .then_with(|| other.seq.cmp(&self.seq)),
        }
    }
}

impl Worker {
    /// キューブ枝刈りで2つのセルを結合し、結果をステージングします。
    ///
    /// 直積の大きさがビーム幅以下の場合は全列挙にフォールバックします。
    /// それ以外の場合、スコア上位のペアから順にフロンティアを展開し、
    /// 上位k件（k = ビーム幅）が集まった時点で打ち切ります。
    ///
    /// 結果はスコア降順に整列され、対象セルのステージング領域に
    /// 積まれます。すべての分割点の処理後に統合されます。
    ///
    /// # 引数
    ///
    /// * `position` - 対象セルの開始位置
    /// * `split` - 分割点（左の構成素のスパン幅）
    /// * `span` - 対象セルのスパン幅
    /// * `at_root` - ルートスパンでの結合かどうか
    pub(crate) fn combine_cube(
        &mut self,
        position: usize,
        split: usize,
        span: usize,
        at_root: bool,
    ) {
        let left_len = self.chart.cell(position, split).len();
        let right_len = self.chart.cell(position + split, span - split).len();
        if left_len == 0 || right_len == 0 {
            return;
        }

        let beam_size = self.parser.beam_size;
        let left_ids: Vec<NodeId> = self.chart.cell(position, split).ids().to_vec();
        let right_ids: Vec<NodeId> = self.chart.cell(position + split, span - split).ids().to_vec();

        let mut kbest: Vec<NodeId> = vec![];

        if left_len * right_len <= beam_size {
            // The whole product fits in the beam; enumerate it in full.
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
                for &left in &left_ids {
                    for &right in &right_ids {
                        grammar.combine(chart.entry(left), chart.entry(right), sent, results);
                    }
                }
            }
            let range = {
                let Self { chart, results, .. } = self;
                chart.alloc_all(results)
            };
            for raw in range {
                let id = NodeId::new(raw);
                self.calc_score(id, at_root);
                kbest.push(id);
            }
        } else {
            let mut pairs: VecDeque<(usize, usize)> = VecDeque::new();
            let mut queue: BinaryHeap<CubeEntry> = BinaryHeap::with_capacity(beam_size);
            let mut track = vec![vec![false; right_len]; left_len];
            let mut seq: u32 = 0;

            pairs.push_back((0, 0));
            track[0][0] = true;

            while kbest.len() < beam_size {
                while let Some((left_index, right_index)) = pairs.pop_front() {
                    self.results.clear();
                    {
                        let Self {
                            parser,
                            sent,
                            chart,
                            results,
                            ..
                        } = self;
                        parser.grammar.combine(
                            chart.entry(left_ids[left_index]),
                            chart.entry(right_ids[right_index]),
                            sent,
                            results,
                        );
                    }

                    if self.results.is_empty() {
                        queue.push(CubeEntry {
                            item: None,
                            score: f64::NEG_INFINITY,
                            seq,
                            left: left_index,
                            right: right_index,
                        });
                        seq += 1;
                    } else {
                        let range = {
                            let Self { chart, results, .. } = self;
                            chart.alloc_all(results)
                        };
                        for raw in range {
                            let id = NodeId::new(raw);
                            self.calc_score(id, at_root);
                            queue.push(CubeEntry {
                                item: Some(id),
                                score: self.chart.super_category(id).score,
                                seq,
                                left: left_index,
                                right: right_index,
                            });
                            seq += 1;
                        }
                    }
                }

                let Some(top) = queue.pop() else {
                    break;
                };
                if let Some(id) = top.item {
                    kbest.push(id);
                }

                if top.left + 1 < left_len && !track[top.left + 1][top.right] {
                    pairs.push_back((top.left + 1, top.right));
                    track[top.left + 1][top.right] = true;
                }
                if top.right + 1 < right_len && !track[top.left][top.right + 1] {
                    pairs.push_back((top.left, top.right + 1));
                    track[top.left][top.right + 1] = true;
                }
            }
        }

        kbest.sort_by(|&a, &b| {
            self.chart
                .super_category(b)
                .score
                .total_cmp(&self.chart.super_category(a).score)
        });
        self.chart.stage_pre_super_categories(position, span, kbest);
    }
}
