//! rchess-core の計測・解析ツール群
//!
//! - `config`: TOML 設定ファイルの読み込み
//! - `suite`: ベンチマーク局面集

pub mod config;
pub mod suite;
