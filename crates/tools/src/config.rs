//! ツール共通の設定ファイル
//!
//! ```toml
//! [engine]
//! hash_mb = 64
//! threads = 4
//!
//! [engine.time]
//! move_overhead = 50
//!
//! [bench]
//! depth = 10
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use rchess_core::EngineOptions;
use serde::Deserialize;

/// ベンチマークの既定値
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BenchConfig {
    /// 各局面の探索深さ
    pub depth: i32,
    /// 局面集ファイル（1行1FEN）。なければ組み込みの局面集
    pub positions: Option<String>,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self { depth: 9, positions: None }
    }
}

/// 設定ファイル全体
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolConfig {
    pub engine: EngineOptions,
    pub bench: BenchConfig,
}

impl ToolConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).context("failed to parse config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("in {}", path.display()))
    }

    /// パスが与えられれば読み込み、なければ既定値
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let cfg = ToolConfig::from_toml_str(
            r#"
            [engine]
            threads = 3

            [engine.time]
            move_overhead = 70
            "#,
        )
        .unwrap();
        assert_eq!(cfg.engine.threads, 3);
        assert_eq!(cfg.engine.hash_mb, EngineOptions::default().hash_mb);
        assert_eq!(cfg.engine.time.move_overhead, 70);
        assert_eq!(cfg.engine.time.slow_mover, 100);
        assert_eq!(cfg.bench, BenchConfig::default());
    }

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(ToolConfig::from_toml_str("").unwrap(), ToolConfig::default());
    }

    #[test]
    fn test_unknown_type_is_error() {
        assert!(ToolConfig::from_toml_str("[engine]\nthreads = \"many\"").is_err());
    }
}
