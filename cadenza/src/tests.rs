//! Cadenzaのテストモジュール群
//!
//! 各コンポーネント(チャート、パーサ、キューブ枝刈り等)の
//! 動作を検証するテストを含みます。

mod cube;
