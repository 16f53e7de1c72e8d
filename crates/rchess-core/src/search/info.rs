//! 探索の進捗報告
//!
//! 探索スレッドからコールバック経由で呼び出し側へ渡す。`Display` でUCI形式の行になる。

use crate::types::{Move, Value};
use std::fmt;
use std::sync::Arc;

/// 進捗報告を受け取るコールバック
pub type InfoCallback = Arc<dyn Fn(&SearchInfo) + Send + Sync>;

/// 評価値の表示形式
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Score {
    /// センチポーン
    Cp(i32),
    /// N手で詰む（負なら詰まされる）
    Mate(i32),
}

impl Score {
    pub fn from_value(v: Value) -> Score {
        if v.is_mate_score() { Score::Mate(v.mate_in_moves()) } else { Score::Cp(v.raw()) }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Cp(v) => write!(f, "cp {v}"),
            Score::Mate(n) => write!(f, "mate {n}"),
        }
    }
}

/// アスピレーション探索の途中結果であることを示す
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScoreBound {
    Exact,
    /// fail high（実際の値はこれ以上）
    Lower,
    /// fail low（実際の値はこれ以下）
    Upper,
}

impl ScoreBound {
    pub fn from_window(v: Value, alpha: Value, beta: Value) -> ScoreBound {
        if v >= beta {
            ScoreBound::Lower
        } else if v <= alpha {
            ScoreBound::Upper
        } else {
            ScoreBound::Exact
        }
    }
}

/// 探索から報告される情報
#[derive(Clone, Debug, PartialEq)]
pub enum SearchInfo {
    /// 読み筋1本分
    Iteration {
        depth: i32,
        seldepth: i32,
        multipv: usize,
        score: Score,
        bound: ScoreBound,
        nodes: u64,
        nps: u64,
        time_ms: u64,
        /// 置換表使用率（1000分率）
        hashfull: i32,
        pv: Vec<Move>,
    },
    /// ルートで探索中の手
    CurrentMove { depth: i32, mv: Move, number: usize },
    /// 最終結果。合法手がなければ best は None
    BestMove { best: Option<Move>, ponder: Option<Move> },
}

impl fmt::Display for SearchInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchInfo::Iteration {
                depth,
                seldepth,
                multipv,
                score,
                bound,
                nodes,
                nps,
                time_ms,
                hashfull,
                pv,
            } => {
                write!(f, "info depth {depth} seldepth {seldepth} multipv {multipv} score {score}")?;
                match bound {
                    ScoreBound::Lower => write!(f, " lowerbound")?,
                    ScoreBound::Upper => write!(f, " upperbound")?,
                    ScoreBound::Exact => {}
                }
                write!(f, " nodes {nodes} nps {nps} hashfull {hashfull} time {time_ms} pv")?;
                for mv in pv {
                    write!(f, " {mv}")?;
                }
                Ok(())
            }
            SearchInfo::CurrentMove { depth, mv, number } => {
                write!(f, "info depth {depth} currmove {mv} currmovenumber {number}")
            }
            SearchInfo::BestMove { best, ponder } => {
                match best {
                    Some(mv) => write!(f, "bestmove {mv}")?,
                    None => write!(f, "bestmove (none)")?,
                }
                if let Some(p) = ponder {
                    write!(f, " ponder {p}")?;
                }
                Ok(())
            }
        }
    }
}
