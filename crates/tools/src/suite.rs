//! ベンチマーク局面集

use std::path::Path;

use anyhow::{Context, Result, bail};
use rchess_core::ChessBoard;

/// 組み込みの局面集（序盤・中盤・終盤を混ぜる）
pub const DEFAULT_POSITIONS: &[&str] = &[
    "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1",
    "r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 10",
    "8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 11",
    "r3k2r/Pppp1ppp/1b3nbN/nP6/BBP1P3/q4N2/Pp1P2PP/R2Q1RK1 w kq - 0 1",
    "rnbq1k1r/pp1Pbppp/2p5/8/2B5/8/PPP1NnPP/RNBQK2R w KQ - 1 8",
    "r4rk1/1pp1qppp/p1np1n2/2b1p1B1/2B1P1b1/P1NP1N2/1PP1QPPP/R4RK1 w - - 0 10",
    "2r3k1/pp3ppp/4p3/3pP3/3P1P2/1P1Q2P1/P6P/6K1 b - - 0 28",
    "6k1/5ppp/8/8/8/8/5PPP/3R2K1 w - - 0 1",
    "8/8/4k3/8/2K5/8/3P4/8 w - - 0 1",
    "r1bq1rk1/ppp2ppp/2np1n2/2b1p3/2B1P3/2NP1N2/PPP2PPP/R1BQ1RK1 w - - 0 7",
];

/// 局面集の1局面
#[derive(Clone, Debug)]
pub struct SuitePosition {
    pub fen: String,
    pub board: ChessBoard,
}

/// FEN の並びから局面集を作る。空行と `#` で始まる行は飛ばす
pub fn parse_suite<'a>(lines: impl IntoIterator<Item = &'a str>) -> Result<Vec<SuitePosition>> {
    let mut out = Vec::new();
    for (i, line) in lines.into_iter().enumerate() {
        let fen = line.trim();
        if fen.is_empty() || fen.starts_with('#') {
            continue;
        }
        let board = ChessBoard::from_fen(fen).with_context(|| format!("line {}", i + 1))?;
        out.push(SuitePosition { fen: fen.to_string(), board });
    }
    if out.is_empty() {
        bail!("no positions in suite");
    }
    Ok(out)
}

/// ファイルから読み込む。`None` なら組み込みの局面集
pub fn load_suite(path: Option<&Path>) -> Result<Vec<SuitePosition>> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p)
                .with_context(|| format!("failed to read {}", p.display()))?;
            parse_suite(text.lines()).with_context(|| format!("in {}", p.display()))
        }
        None => parse_suite(DEFAULT_POSITIONS.iter().copied()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_suite_parses() {
        let suite = load_suite(None).unwrap();
        assert_eq!(suite.len(), DEFAULT_POSITIONS.len());
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let text = "# opening\n\nrnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1\n";
        let suite = parse_suite(text.lines()).unwrap();
        assert_eq!(suite.len(), 1);
    }

    #[test]
    fn test_bad_fen_reports_line() {
        let err = parse_suite(["8/8/8/8/8/8/8/8 w - - 0 1", "not a fen"]).unwrap_err();
        assert!(format!("{err:#}").contains("line"));
    }

    #[test]
    fn test_empty_suite_is_error() {
        assert!(parse_suite(["", "# nothing"]).is_err());
    }
}
