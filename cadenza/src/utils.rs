//! ユーティリティ関数と型変換トレイトを提供するモジュール
//!
//! このモジュールには、文法ソースの読み込み、CSV処理、型変換の
//! ヘルパー関数が含まれています。主に以下の機能を提供します：
//!
//! - `FromU32`: u32からの型変換トレイト
//! - 前書き行を読み飛ばす文法ソースのリーダー
//! - CSV行の解析と引用符処理

use std::io::{BufRead, BufReader, Read};

use csv_core::ReadFieldResult;

use crate::errors::Result;

/// u32から他の型への変換を提供するトレイト
///
/// このトレイトは、u32値を実装型に変換する機能を定義します。
/// 標準ライブラリのFromトレイトとは異なり、特定の最適化や
/// プラットフォーム固有の仮定を行うことができます。
pub trait FromU32 {
    /// u32値から実装型を生成する
    ///
    /// # 引数
    ///
    /// * `src` - 変換元のu32値
    ///
    /// # 戻り値
    ///
    /// 変換された実装型の値
    fn from_u32(src: u32) -> Self;
}

#[cfg(any(target_pointer_width = "32", target_pointer_width = "64"))]
impl FromU32 for usize {
    /// u32値をusizeに変換する
    ///
    /// ポインタ幅が32ビットまたは64ビットであることが保証されているため、
    /// この変換は常に成功します。
    ///
    /// # 引数
    ///
    /// * `src` - 変換元のu32値
    ///
    /// # 戻り値
    ///
    /// 変換されたusize値
    #[inline(always)]
    fn from_u32(src: u32) -> Self {
        // Since the pointer width is guaranteed to be 32 or 64,
        // the following process always succeeds.
        unsafe { Self::try_from(src).unwrap_unchecked() }
    }
}

/// 文法ソースのリーダーからCSV行の列を読み込む
///
/// 文法の定義ファイル（範疇、規則、素性、重み）に共通の前書き規約を
/// 適用します。空行と`#`で始まる前書き行は読み飛ばされ、残りの各行が
/// [`parse_csv_row`]でフィールドに分割されます。
///
/// # 引数
///
/// * `rdr` - 読み込み元のリーダー
///
/// # 戻り値
///
/// 行ごとのフィールド列
///
/// # エラー
///
/// 読み込み中にI/Oエラーが発生した場合、エラーを返します。
///
/// # 例
///
/// ```
/// # use cadenza::utils::read_csv_source;
/// let source = "# categories\nNP,\nS\\NP,nsubj\n";
/// let rows = read_csv_source(source.as_bytes()).unwrap();
/// assert_eq!(rows.len(), 2);
/// assert_eq!(rows[1], vec!["S\\NP", "nsubj"]);
/// ```
pub fn read_csv_source<R: Read>(rdr: R) -> Result<Vec<Vec<String>>> {
    let mut rows = vec![];
    for line in BufReader::new(rdr).lines() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        rows.push(parse_csv_row(line));
    }
    Ok(rows)
}

/// CSV形式の行を解析してフィールドのベクターに分割する
///
/// この関数は、CSV形式の文字列を解析し、各フィールドを個別の文字列として抽出します。
/// ダブルクォートで囲まれたフィールドや、フィールド内のカンマも正しく処理します。
/// 出力バッファより長いフィールドはバッファを拡張して読み進めます。
///
/// # 引数
///
/// * `row` - 解析するCSV形式の文字列
///
/// # 戻り値
///
/// 解析されたフィールドを格納する文字列のベクター
///
/// # 例
///
/// ```
/// # use cadenza::utils::parse_csv_row;
/// let fields = parse_csv_row("binary,NP,S\\NP,S");
/// assert_eq!(fields, vec!["binary", "NP", "S\\NP", "S"]);
///
/// let fields_with_quote = parse_csv_row("leaf,\"N,conj\",and");
/// assert_eq!(fields_with_quote, vec!["leaf", "N,conj", "and"]);
/// ```
pub fn parse_csv_row(row: &str) -> Vec<String> {
    let mut fields = vec![];
    let mut rdr = csv_core::Reader::new();
    let mut input = row.as_bytes();
    let mut field = vec![0; 1024];
    let mut written = 0;
    loop {
        let (result, nin, nout) = rdr.read_field(input, &mut field[written..]);
        input = &input[nin..];
        written += nout;
        match result {
            ReadFieldResult::OutputFull => {
                field.resize(field.len() * 2, 0);
            }
            ReadFieldResult::Field { .. } => {
                fields.push(finish_field(&field[..written]));
                written = 0;
            }
            ReadFieldResult::InputEmpty | ReadFieldResult::End => {
                fields.push(finish_field(&field[..written]));
                return fields;
            }
        }
    }
}

/// 読み取ったフィールドのバイト列を文字列化する
///
/// 入力行がUTF-8であり、CSVの解析は引用符の除去しか行わないため、
/// この変換は常に成功します。
fn finish_field(bytes: &[u8]) -> String {
    std::str::from_utf8(bytes)
        .expect("a field of a UTF-8 row is valid UTF-8")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv_row() {
        assert_eq!(
            &["tc", "N", "NP"],
            parse_csv_row("tc,N,NP").as_slice()
        );
    }

    #[test]
    fn test_parse_csv_row_with_quote() {
        assert_eq!(
            &["leaf", "N,conj", "and"],
            parse_csv_row("leaf,\"N,conj\",and").as_slice()
        );
    }

    #[test]
    fn test_parse_csv_row_grows_past_buffer() {
        let long = "x".repeat(3000);
        let row = format!("short,{long}");
        assert_eq!(&["short", long.as_str()], parse_csv_row(&row).as_slice());
    }

    #[test]
    fn test_read_csv_source_skips_preface() {
        let source = "# preface\n\nbinary,NP,S\\NP,S,r,1\ntc,N,NP\n";
        let rows = read_csv_source(source.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0], "binary");
        assert_eq!(rows[1], vec!["tc", "N", "NP"]);
    }
}
