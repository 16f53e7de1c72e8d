//! 置換表モジュール
//!
//! 探索結果をキャッシュする置換表（Transposition Table）。
//!
//! - `TTEntry`: エントリ（10バイト、16bit検証タグ）
//! - `Cluster`: エントリのグループ（32バイト）
//! - `TranspositionTable`: テーブル本体
//! - 世代管理
//!
//! クラスターインデックスは64bitキーの上位ビットで決定し、
//! クラスター内マッチングに下位16bitを使用する。
//! 10バイトエントリ × 3 + 2パディング = 32バイト/クラスター。
//!
//! 各フィールドは個別のアトミック変数で、ロックなしで複数スレッドから読み書きする。
//! 書き込みが競合すると異なる書き込みのフィールドが混ざることがあるが、
//! 検証タグと呼び出し側の指し手合法性チェック・境界チェックで吸収する。

mod entry;
mod table;

pub use entry::{TTData, TTEntry};
pub use table::TranspositionTable;

/// クラスターサイズ（エントリ数）
pub const CLUSTER_SIZE: usize = 3;

/// Generation関連の定数（下位2bitはBound）
pub const GENERATION_BITS: u32 = 2;
pub const GENERATION_DELTA: u8 = 1 << GENERATION_BITS; // 4
pub const GENERATION_CYCLE: u16 = 255 + GENERATION_DELTA as u16;
pub const GENERATION_MASK: u16 = 0xFC; // (0xFF << GENERATION_BITS) as u8

/// depth8 = depth - DEPTH_ENTRY_OFFSET。0は空きエントリ
pub const DEPTH_ENTRY_OFFSET: i32 = -7;
