//! 探索制限（LimitsType）
//!
//! UCI `go` コマンドのパラメータを表現する。

use crate::types::{Color, Move};
use std::time::Instant;

// =============================================================================
// TimePoint
// =============================================================================

/// 時間（ミリ秒）
pub type TimePoint = i64;

// =============================================================================
// LimitsType
// =============================================================================

/// 探索制限条件
#[derive(Clone, Debug)]
pub struct LimitsType {
    /// 両者の残り時間（ミリ秒）
    pub time: [TimePoint; Color::NUM],

    /// 1手ごとの時間増加（ミリ秒）
    pub inc: [TimePoint; Color::NUM],

    /// 次の時間切れまでの手数（0なら切れ負け）
    pub movestogo: i32,

    /// 探索深さ固定（0以外なら有効）
    pub depth: i32,

    /// 探索ノード数制限（0以外なら有効）
    pub nodes: u64,

    /// 思考時間固定（ミリ秒、0以外なら有効）
    pub movetime: TimePoint,

    /// 詰み探索の手数（0以外なら有効）。N手詰めは 2N-1 ply 以内の詰みで停止する
    pub mate: i32,

    /// 思考時間無制限フラグ
    pub infinite: bool,

    /// ponder有効フラグ
    pub ponder: bool,

    /// MultiPV の数（1以上）
    pub multi_pv: usize,

    /// 探索対象の手のリスト。空なら全合法手を探索
    pub search_moves: Vec<Move>,

    /// 探索開始時刻
    pub start_time: Option<Instant>,
}

impl Default for LimitsType {
    fn default() -> Self {
        Self {
            time: [0; Color::NUM],
            inc: [0; Color::NUM],
            movestogo: 0,
            depth: 0,
            nodes: 0,
            movetime: 0,
            mate: 0,
            infinite: false,
            ponder: false,
            multi_pv: 1,
            search_moves: Vec::new(),
            start_time: None,
        }
    }
}

impl LimitsType {
    pub fn new() -> Self {
        Self::default()
    }

    /// 深さ固定の探索
    pub fn depth(depth: i32) -> Self {
        Self { depth, ..Self::default() }
    }

    /// 思考時間固定の探索
    pub fn movetime(ms: TimePoint) -> Self {
        Self { movetime: ms, ..Self::default() }
    }

    /// 時間制御を行うべきかの判定
    ///
    /// mate / movetime / depth / nodes / infinite のいずれかが指定されていれば行わない。
    #[inline]
    pub fn use_time_management(&self) -> bool {
        self.mate == 0
            && self.movetime == 0
            && self.depth == 0
            && self.nodes == 0
            && !self.infinite
    }

    /// 探索開始時刻を設定
    pub fn set_start_time(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// 指定した色の残り時間
    #[inline]
    pub fn time_left(&self, color: Color) -> TimePoint {
        self.time[color.index()]
    }

    /// 指定した色のインクリメント
    #[inline]
    pub fn increment(&self, color: Color) -> TimePoint {
        self.inc[color.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_use_time_management() {
        let mut limits = LimitsType::new();
        limits.time = [60_000, 60_000];
        assert!(limits.use_time_management());

        assert!(!LimitsType::depth(5).use_time_management());
        assert!(!LimitsType::movetime(100).use_time_management());

        let infinite = LimitsType { infinite: true, ..LimitsType::default() };
        assert!(!infinite.use_time_management());
    }
}
