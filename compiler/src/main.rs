//! 文法モデルのビルドユーティリティ
//!
//! このバイナリは、テキスト形式の文法ソースファイル（categories.csv、
//! rules.csv、features.csv、weights.csv）からバイナリ形式の文法モデルを
//! 構築します。

use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use cadenza::grammar::GrammarBuilder;

use clap::Parser;

/// コマンドライン引数
///
/// 文法モデルをビルドするために必要な入力ファイルと出力先を指定します。
#[derive(Parser, Debug)]
#[clap(
    name = "compiler",
    about = "A program to compile the grammar model."
)]
struct Args {
    /// Category definition file (categories.csv).
    #[clap(short = 'c', long)]
    categories_in: PathBuf,

    /// Rule definition file (rules.csv).
    #[clap(short = 'r', long)]
    rules_in: PathBuf,

    /// Feature definition file (features.csv).
    #[clap(short = 'f', long)]
    features_in: PathBuf,

    /// Feature weight file (weights.csv).
    #[clap(short = 'w', long)]
    weights_in: PathBuf,

    /// File to which the binary model is output.
    #[clap(short = 'o', long)]
    model_out: PathBuf,

    /// Applies alternate markup rows in the category definition.
    #[clap(long)]
    alt_markedup: bool,

    /// Drops binary rules flagged as violating the normal form.
    #[clap(long)]
    eisner_normal_form: bool,
}

/// メイン関数
///
/// 文法ソースを読み込んでモデルを構築し、バイナリ形式で出力します。
///
/// # 戻り値
///
/// 実行が成功した場合は `Ok(())`、エラーが発生した場合はエラー情報
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    eprintln!("Compiling the grammar model...");
    let grammar = GrammarBuilder::new()
        .alt_markedup(args.alt_markedup)
        .eisner_normal_form(args.eisner_normal_form)
        .from_readers(
            BufReader::new(File::open(&args.categories_in)?),
            BufReader::new(File::open(&args.rules_in)?),
            BufReader::new(File::open(&args.features_in)?),
            BufReader::new(File::open(&args.weights_in)?),
        )?;

    eprintln!(
        "Compiled: {} categories, {} rules, {} features",
        grammar.categories().len(),
        grammar.rules().len(),
        grammar.features().len(),
    );

    let mut wtr = BufWriter::new(File::create(&args.model_out)?);
    grammar.write(&mut wtr)?;
    eprintln!("Wrote the model to {:?}", args.model_out);

    Ok(())
}
