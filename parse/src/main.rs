//! 構文解析を実行するユーティリティ
//!
//! このバイナリは、標準入力から読み込んだスーパータグ付きの文を解析し、
//! 指定された出力形式（deps、tags、detail）で結果を出力します。
//!
//! 入力はCSV行の列で、1行が1単語（`単語,品詞,範疇1,対数確率1,...`）に
//! 対応します。空行が文の区切りです。

use std::error::Error;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use cadenza::grammar::Grammar;
use cadenza::sentence::{LexCandidate, Sentence};
use cadenza::utils::parse_csv_row;
use cadenza::{ParseOutcome, Parser, SkipReason};

use clap::Parser as ClapParser;

/// 出力モード
#[derive(Clone, Debug)]
enum OutputMode {
    Deps,
    Tags,
    Detail,
}

/// `OutputMode` の `FromStr` 実装
impl FromStr for OutputMode {
    type Err = &'static str;

    /// 文字列から出力モードをパースする
    ///
    /// # 引数
    ///
    /// * `mode` - パース対象の文字列（"deps"、"tags"、"detail"のいずれか）
    ///
    /// # 戻り値
    ///
    /// パースに成功した場合は対応する `OutputMode`、失敗した場合はエラーメッセージ
    fn from_str(mode: &str) -> Result<Self, Self::Err> {
        match mode {
            "deps" => Ok(Self::Deps),
            "tags" => Ok(Self::Tags),
            "detail" => Ok(Self::Detail),
            _ => Err("Could not parse a mode"),
        }
    }
}

/// コマンドライン引数
#[derive(ClapParser, Debug)]
#[clap(name = "parse", about = "Parses supertagged sentences")]
struct Args {
    /// Compiled grammar model.
    #[clap(short = 'i', long)]
    model: PathBuf,

    /// Output mode. Choices are deps, tags, and detail.
    #[clap(short = 'O', long, default_value = "deps")]
    output_mode: OutputMode,

    /// Enables cube pruning for cell combination.
    #[clap(short = 'c', long)]
    cube_pruning: bool,

    /// Beam size per cell. 0 disables the cap.
    #[clap(short = 'b', long, default_value = "32")]
    beam_size: usize,

    /// Beta cutoff in (0, 1].
    #[clap(short = 'B', long, default_value = "1e-4")]
    beta: f64,

    /// Maximum number of words per sentence.
    #[clap(long, default_value = "250")]
    max_words: usize,

    /// Maximum number of supercategories per chart.
    #[clap(long, default_value = "300000")]
    max_super_categories: usize,

    /// Decodes a best cover with the skimmer when no full parse exists.
    #[clap(short = 's', long)]
    skim: bool,

    /// Dumps per-node derivation contexts (expensive, for debugging).
    #[clap(long)]
    dump_contexts: bool,
}

/// メイン関数
///
/// 文法モデルをロードし、標準入力から読み込んだ文を解析して、
/// 指定された形式で結果を標準出力に出力します。
///
/// # 戻り値
///
/// 実行が成功した場合は `Ok(())`、エラーが発生した場合はエラー情報
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    eprintln!("Loading the grammar model...");
    let grammar = Grammar::read(BufReader::new(File::open(&args.model)?))?;

    let parser = Parser::new(grammar)
        .cube_pruning(args.cube_pruning)
        .beam_size(args.beam_size)
        .beta(args.beta)?
        .max_words(args.max_words)
        .max_super_categories(args.max_super_categories);
    let mut worker = parser.new_worker();

    eprintln!("Ready to parse");

    let is_tty = atty::is(atty::Stream::Stdout);

    let out = std::io::stdout();
    let mut out = BufWriter::new(out.lock());

    let mut sentence = Sentence::new();
    let lines = std::io::stdin().lock().lines();
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            if !sentence.is_empty() {
                let finished = std::mem::take(&mut sentence);
                process_sentence(&mut worker, finished, &args, &mut out)?;
                if is_tty {
                    out.flush()?;
                }
            }
            continue;
        }
        push_word_row(worker.grammar(), &mut sentence, &line)?;
    }
    if !sentence.is_empty() {
        process_sentence(&mut worker, sentence, &args, &mut out)?;
    }

    Ok(())
}

/// CSV行を1単語として文に追加する
///
/// # 引数
///
/// * `grammar` - 範疇名の解決に使用する文法モデル
/// * `sentence` - 追加先の文
/// * `line` - `単語,品詞,範疇1,対数確率1,...` 形式の行
fn push_word_row(
    grammar: &Grammar,
    sentence: &mut Sentence,
    line: &str,
) -> Result<(), Box<dyn Error>> {
    let fields = parse_csv_row(line);
    if fields.len() < 4 || fields.len() % 2 != 0 {
        return Err(format!("malformed word row: {line}").into());
    }
    let mut candidates = vec![];
    for pair in fields[2..].chunks(2) {
        let cat = grammar
            .cat_id(&pair[0])
            .ok_or_else(|| format!("unknown category: {}", pair[0]))?;
        let log_p: f64 = pair[1].parse()?;
        candidates.push(LexCandidate { cat, log_p });
    }
    sentence.push_word(fields[0].as_str(), fields[1].as_str(), candidates);
    Ok(())
}

/// 1文を解析して結果を出力する
fn process_sentence<W: Write>(
    worker: &mut cadenza::parser::worker::Worker,
    sentence: Sentence,
    args: &Args,
    out: &mut W,
) -> Result<(), Box<dyn Error>> {
    worker.reset_sentence(sentence);
    let outcome = worker.parse();

    if let ParseOutcome::Skipped(reason) = outcome {
        match reason {
            SkipReason::MaxWords => eprintln!(
                "Sentence has {} words; the limit is exceeded.",
                worker.sentence().len()
            ),
            SkipReason::MaxSuperCategories => eprintln!(
                "The supercategory limit is exceeded. ({} nodes)",
                worker.num_super_categories()
            ),
        }
        out.write_all(b"\n")?;
        return Ok(());
    }

    match args.output_mode {
        OutputMode::Deps => {
            let deps = collect_deps(worker, outcome, args.skim);
            for dep in &deps {
                let line = dep.format_line(worker.grammar(), worker.sentence());
                out.write_all(line.as_bytes())?;
                out.write_all(b"\n")?;
            }
            out.write_all(b"\n")?;
        }
        OutputMode::Tags => {
            if let Some(root) = worker.best_root() {
                let mut tags = vec![];
                worker.derivation_supertags(root, &mut tags);
                for (i, (position, cat)) in tags.iter().enumerate() {
                    if i != 0 {
                        out.write_all(b" ")?;
                    }
                    write!(
                        out,
                        "{}|{}",
                        worker.sentence().word(*position),
                        worker.grammar().categories().name(*cat),
                    )?;
                }
            }
            out.write_all(b"\n")?;
        }
        OutputMode::Detail => {
            writeln!(
                out,
                "outcome={outcome:?}\tsupercats={}",
                worker.num_super_categories()
            )?;
            if let Some(root) = worker.best_root() {
                let score = worker.chart().super_category(root).score;
                writeln!(out, "score={score}")?;
                if args.dump_contexts {
                    for context in worker.derivation_contexts(root) {
                        writeln!(
                            out,
                            "cat={}\tleft={:?}\tright={:?}\theads={:?}",
                            worker.grammar().categories().name(context.cat),
                            context.left,
                            context.right,
                            context.head_words,
                        )?;
                    }
                }
            }
            let deps = collect_deps(worker, outcome, args.skim);
            for dep in &deps {
                writeln!(
                    out,
                    "{}\trule={}\tconj={}",
                    dep.format_line(worker.grammar(), worker.sentence()),
                    dep.unary_rule_id,
                    dep.conj_factor,
                )?;
            }
            out.write_all(b"EOS\n")?;
        }
    }
    Ok(())
}

/// 解析結果から依存関係を取り出す
///
/// 完全な導出が得られなかった場合、`skim`が有効ならスキマーで
/// 部分導出の依存関係を集めます。
fn collect_deps(
    worker: &cadenza::parser::worker::Worker,
    outcome: ParseOutcome,
    skim: bool,
) -> Vec<cadenza::dependency::FilledDependency> {
    match outcome {
        ParseOutcome::Parsed => worker.best_deps().unwrap_or_default(),
        ParseOutcome::Exhausted if skim => worker.skim_deps(),
        _ => vec![],
    }
}
