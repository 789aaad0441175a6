//! ビームサーチに基づくチャートパーサ。
//!
//! このモジュールは、語彙化範疇文法のためのメインパーサを提供します。
//! CKYアルゴリズムを使用して、スーパータグ付けされた入力文のすべての
//! 文法的な結合を探索し、線形素性モデルのもとで最良の導出を見つけます。
//!
//! # 主要な構造体
//!
//! - [`Parser`]: 解析の設定と共有データを保持するメイン構造体
//! - [`Worker`]: パーサのワーカー。実際の解析処理を行う
//!
//! # 例
//!
//! ```no_run
//! use std::fs::File;
//! use cadenza::{Grammar, Parser};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let grammar = Grammar::read(File::open("path/to/model")?)?;
//! let parser = Parser::new(grammar).beam_size(16).beta(1e-4)?;
//! let mut worker = parser.new_worker();
//! # Ok(())
//! # }
//! ```

pub mod chart;
mod cube;
pub mod worker;

use std::sync::Arc;

use crate::dependency::FilledDependency;
use crate::errors::{CadenzaError, Result};
use crate::grammar::Grammar;
use crate::parser::chart::Chart;
use crate::parser::worker::Worker;
use crate::sentence::Sentence;

/// 単語数の既定の上限
pub const DEFAULT_MAX_WORDS: usize = 250;
/// スーパーカテゴリ総数の既定の上限
pub const DEFAULT_MAX_SUPER_CATEGORIES: usize = 300_000;
/// 既定のビーム幅
pub const DEFAULT_BEAM_SIZE: usize = 32;
/// 既定のβ値
pub const DEFAULT_BETA: f64 = 1e-4;

/// 1文の解析結果の区分
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    /// ルートセルに少なくとも1つの導出が得られた
    Parsed,
    /// 資源上限により解析が中断された
    Skipped(SkipReason),
    /// チャートは埋まったがルートセルが空だった
    Exhausted,
}

/// 解析が中断された理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// 文の単語数が上限を超えた
    MaxWords,
    /// スーパーカテゴリの総数が上限を超えた
    MaxSuperCategories,
}

/// 依存関係ニューラルスコアラーに渡される属性の組
///
/// 充足済み依存関係の語彙・品詞・関係の文脈を表します。
#[derive(Debug, Clone, Copy)]
pub struct DepAttrs<'a> {
    /// 主辞の表層形
    pub head: &'a str,
    /// 充足語の表層形
    pub dependent: &'a str,
    /// 関係名
    pub relation: &'a str,
    /// 主辞の品詞
    pub head_pos: &'a str,
    /// 充足語の品詞
    pub dependent_pos: &'a str,
    /// 主辞と充足語の距離（単語数）
    pub distance: u16,
    /// 依存関係を生成した単項規則のID
    pub unary_rule_id: u16,
}

/// 依存関係ニューラルスコアラーのインタフェース
///
/// 実装は属性の組に対して(0, 1]の確率を返します。パーサはその対数を
/// 線形モデルのスコアに混合します。
pub trait DepScore {
    /// 依存関係の確からしさを予測します
    ///
    /// # 引数
    ///
    /// * `attrs` - 依存関係の属性
    ///
    /// # 戻り値
    ///
    /// (0, 1]の範囲の確率
    fn predict_soft(&self, attrs: &DepAttrs) -> f64;
}

/// スコアリングから除外する依存関係を決めるフィルタ
///
/// 除外された依存関係は素性にもニューラルスコアにも寄与しません。
pub trait DependencyFilter {
    /// 依存関係を無視するかどうかを判定します
    ///
    /// # 引数
    ///
    /// * `dep` - 判定対象の依存関係
    /// * `sentence` - 解析中の文
    fn ignore(&self, dep: &FilledDependency, sentence: &Sentence) -> bool;
}

/// 解析の前後に呼び出されるフック
///
/// 既定の実装は何も行いません。学習器などの拡張は、このトレイトを
/// 実装して[`Worker::parse_with_hooks`]に渡します。
pub trait ParseHooks {
    /// 語彙範疇の読み込み直後に呼び出されます
    ///
    /// # 戻り値
    ///
    /// `false`を返すと解析が中断されます
    fn pre_parse(&mut self, chart: &mut Chart, sentence: &Sentence) -> bool {
        let _ = (chart, sentence);
        true
    }

    /// 各セルの処理完了後に呼び出されます
    ///
    /// # 引数
    ///
    /// * `chart` - 処理中のチャート
    /// * `position` - 処理が完了したセルの開始位置
    /// * `span` - 処理が完了したセルのスパン幅
    /// * `num_words` - 文の単語数
    fn post_parse(&mut self, chart: &Chart, position: usize, span: usize, num_words: usize) {
        let _ = (chart, position, span, num_words);
    }
}

/// 何も行わない既定のフック
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl ParseHooks for DefaultHooks {}

/// ビームサーチを行うチャートパーサ。
///
/// `Parser`は文法モデルと解析の設定を保持し、複数の[`Worker`]インスタンスを
/// 生成して並列処理を行うことができます。文法モデルは読み取り専用であり、
/// 複数のパーサ間で共有できます。
#[derive(Clone)]
pub struct Parser {
    pub(crate) grammar: Arc<Grammar>,
    pub(crate) dep_scorer: Option<Arc<dyn DepScore + Send + Sync>>,
    pub(crate) dep_filter: Option<Arc<dyn DependencyFilter + Send + Sync>>,
    pub(crate) cube_pruning: bool,
    pub(crate) beam_size: usize,
    pub(crate) beta: f64,
    pub(crate) max_words: usize,
    pub(crate) max_super_categories: usize,
}

impl Parser {
    /// 新しいパーサを作成します。
    ///
    /// 文法モデルはパーサに所有権が移動します。複数のパーサ間でモデルを
    /// 共有する必要がある場合は、[`Parser::from_shared_grammar`]を
    /// 使用してください。
    ///
    /// # 引数
    ///
    /// * `grammar` - 解析に使用する文法モデル
    pub fn new(grammar: Grammar) -> Self {
        Self::from_shared_grammar(Arc::new(grammar))
    }

    /// 共有された文法モデルから新しいパーサを作成します。
    ///
    /// これは、複数のパーサインスタンスがモデルを再読み込みすることなく
    /// 同じモデルを共有する必要があるマルチスレッドシナリオで便利です。
    ///
    /// # 引数
    ///
    /// * `grammar` - 共有される文法モデルへの`Arc`参照
    pub fn from_shared_grammar(grammar: Arc<Grammar>) -> Self {
        Self {
            grammar,
            dep_scorer: None,
            dep_filter: None,
            cube_pruning: false,
            beam_size: DEFAULT_BEAM_SIZE,
            beta: DEFAULT_BETA,
            max_words: DEFAULT_MAX_WORDS,
            max_super_categories: DEFAULT_MAX_SUPER_CATEGORIES,
        }
    }

    /// キューブ枝刈りを使用するかどうかを設定します。
    ///
    /// 有効にすると、セルの結合が上位k件の近似列挙に置き換えられます。
    /// 両方の入力セルがスコア降順に整列済みであることを利用して、
    /// 直積を実体化せずに上位の組み合わせのみを展開します。
    ///
    /// # 引数
    ///
    /// * `yes` - `true`の場合、キューブ枝刈りを使用します
    pub const fn cube_pruning(mut self, yes: bool) -> Self {
        self.cube_pruning = yes;
        self
    }

    /// セルごとのビーム幅を設定します。
    ///
    /// # 引数
    ///
    /// * `beam_size` - 各セルに保持するスーパーカテゴリの最大数。
    ///   0を指定すると上限が無効になり、β枝刈りのみが適用されます。
    pub const fn beam_size(mut self, beam_size: usize) -> Self {
        self.beam_size = beam_size;
        self
    }

    /// β値を設定します。
    ///
    /// βは線形の値として渡され、内部で対数空間のオフセット`ln β`として
    /// 適用されます。セルの最大スコアから`ln β`以上離れたスーパーカテゴリは
    /// 枝刈りされます。β = 1 は最大スコアと同点のもののみを保持します。
    ///
    /// # 引数
    ///
    /// * `beta` - (0, 1]の範囲のβ値
    ///
    /// # エラー
    ///
    /// βが範囲外の場合、[`CadenzaError`]が返されます。
    pub fn beta(mut self, beta: f64) -> Result<Self> {
        if !(beta > 0.0 && beta <= 1.0) {
            return Err(CadenzaError::invalid_argument(
                "beta",
                format!("beta must be in (0, 1]: {beta}"),
            ));
        }
        self.beta = beta;
        Ok(self)
    }

    /// 単語数の上限を設定します。
    ///
    /// 上限を超える文は解析されず、[`ParseOutcome::Skipped`]が返されます。
    ///
    /// # 引数
    ///
    /// * `max_words` - 単語数の上限
    pub const fn max_words(mut self, max_words: usize) -> Self {
        self.max_words = max_words;
        self
    }

    /// スーパーカテゴリ総数の上限を設定します。
    ///
    /// チャートの充填中に上限を超えると解析が中断され、
    /// [`ParseOutcome::Skipped`]が返されます。
    ///
    /// # 引数
    ///
    /// * `max_super_categories` - スーパーカテゴリ総数の上限
    pub const fn max_super_categories(mut self, max_super_categories: usize) -> Self {
        self.max_super_categories = max_super_categories;
        self
    }

    /// 依存関係ニューラルスコアラーを接続します。
    ///
    /// 既にスコアラーが接続されているかどうかによらず、常に新しい
    /// スコアラーで置き換えます。
    ///
    /// # 引数
    ///
    /// * `scorer` - 接続するスコアラー
    pub fn dep_scorer(mut self, scorer: Arc<dyn DepScore + Send + Sync>) -> Self {
        self.dep_scorer = Some(scorer);
        self
    }

    /// 依存関係フィルタを接続します。
    ///
    /// # 引数
    ///
    /// * `filter` - 接続するフィルタ
    pub fn dependency_filter(mut self, filter: Arc<dyn DependencyFilter + Send + Sync>) -> Self {
        self.dep_filter = Some(filter);
        self
    }

    /// 文法モデルへの参照を取得します。
    #[inline(always)]
    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    /// 新しいワーカーを作成します。
    ///
    /// ワーカーは実際の解析処理を実行するために使用されます。
    /// 各ワーカーは独立したチャートと作業バッファを保持するため、
    /// 複数のワーカーを並列に使用して同時に複数の文を解析できます。
    ///
    /// # 戻り値
    ///
    /// 新しい[`Worker`]インスタンス
    pub fn new_worker(&self) -> Worker {
        Worker::new(self.clone())
    }
}
