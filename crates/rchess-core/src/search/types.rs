//! 探索用の型定義
//!
//! - `NodeType`: ノードの種類（実行時に分岐する）
//! - `Stack`: 1 ply 分の探索スタック
//! - `RootMove` / `RootMoves`: ルートの指し手と読み筋

use super::split_point::SplitPoint;
use crate::types::{Depth, Move, Value};
use std::sync::Arc;

// =============================================================================
// NodeType
// =============================================================================

/// ノードの種類
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeType {
    Root,
    PV,
    NonPV,
    /// 分岐点で他スレッドが続きを探索するルート
    SplitPointRoot,
    SplitPointPV,
    SplitPointNonPV,
}

impl NodeType {
    #[inline]
    pub const fn is_pv(self) -> bool {
        matches!(
            self,
            NodeType::Root | NodeType::PV | NodeType::SplitPointRoot | NodeType::SplitPointPV
        )
    }

    #[inline]
    pub const fn is_root(self) -> bool {
        matches!(self, NodeType::Root | NodeType::SplitPointRoot)
    }

    #[inline]
    pub const fn is_split_point(self) -> bool {
        matches!(
            self,
            NodeType::SplitPointRoot | NodeType::SplitPointPV | NodeType::SplitPointNonPV
        )
    }

    /// 分岐点で続きを探索するときのノード種別
    #[inline]
    pub const fn to_split_point(self) -> NodeType {
        match self {
            NodeType::Root | NodeType::SplitPointRoot => NodeType::SplitPointRoot,
            NodeType::PV | NodeType::SplitPointPV => NodeType::SplitPointPV,
            NodeType::NonPV | NodeType::SplitPointNonPV => NodeType::SplitPointNonPV,
        }
    }
}

/// 除外手つき探索で使う局面キーの補正
///
/// 除外手があるノードの結果を通常のノードと置換表上で区別する。
pub const EXCLUSION_KEY: u64 = 0x9c5b_3f1a_6e27_d84d;

// =============================================================================
// Stack
// =============================================================================

/// 探索スタック（1 ply 分）
pub struct Stack<P, E> {
    /// このノードで探索中の指し手
    pub current_move: Move,
    /// シンギュラー延長の検証で除外する手
    pub excluded_move: Move,
    pub killers: [Move; 2],
    /// 静的評価値（王手中は `Value::NONE`）
    pub static_eval: Value,
    /// このノードの指し手に適用したLMRの削減量
    pub reduction: Depth,
    /// null move を試さない
    pub skip_null_move: bool,
    /// このノード以下の読み筋
    pub pv: Vec<Move>,
    /// このノードが分岐点なら、その分岐点
    pub split_point: Option<Arc<SplitPoint<P, E>>>,
}

impl<P, E> Default for Stack<P, E> {
    fn default() -> Self {
        Self {
            current_move: Move::NONE,
            excluded_move: Move::NONE,
            killers: [Move::NONE; 2],
            static_eval: Value::NONE,
            reduction: 0,
            skip_null_move: false,
            pv: Vec::new(),
            split_point: None,
        }
    }
}

impl<P, E> Stack<P, E> {
    /// 反復ごとの初期化（PVバッファの容量は残す）
    pub fn reset(&mut self) {
        self.current_move = Move::NONE;
        self.excluded_move = Move::NONE;
        self.killers = [Move::NONE; 2];
        self.static_eval = Value::NONE;
        self.reduction = 0;
        self.skip_null_move = false;
        self.pv.clear();
        self.split_point = None;
    }

    /// キラー手を更新する（既に先頭なら何もしない）
    #[inline]
    pub fn update_killers(&mut self, mv: Move) {
        if self.killers[0] != mv {
            self.killers[1] = self.killers[0];
            self.killers[0] = mv;
        }
    }
}

/// 探索スタックの先頭に置く番兵の数（`ply - 2` まで参照する）
pub const STACK_OFFSET: usize = 2;

/// 探索スタックの長さ
pub const STACK_SIZE: usize = crate::types::MAX_PLY as usize + STACK_OFFSET + 2;

/// 探索スタックを確保する
pub fn new_stack<P, E>() -> Vec<Stack<P, E>> {
    (0..STACK_SIZE).map(|_| Stack::default()).collect()
}

// =============================================================================
// RootMove
// =============================================================================

/// ルートの指し手1つ分の情報
#[derive(Clone, Debug)]
pub struct RootMove {
    /// 読み筋（先頭がこの指し手）
    pub pv: Vec<Move>,
    pub score: Value,
    /// 前回の反復のスコア
    pub previous_score: Value,
    pub sel_depth: i32,
}

impl RootMove {
    pub fn new(mv: Move) -> Self {
        Self { pv: vec![mv], score: -Value::INFINITE, previous_score: -Value::INFINITE, sel_depth: 0 }
    }

    #[inline]
    pub fn mv(&self) -> Move {
        self.pv[0]
    }

    /// 指し手と子ノードの読み筋から読み筋を作り直す
    pub fn set_pv(&mut self, mv: Move, child_pv: &[Move]) {
        self.pv.clear();
        self.pv.push(mv);
        self.pv.extend_from_slice(child_pv);
    }
}

/// ルートの指し手リスト
#[derive(Clone, Debug, Default)]
pub struct RootMoves {
    moves: Vec<RootMove>,
}

impl RootMoves {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_moves(moves: impl IntoIterator<Item = Move>) -> Self {
        Self { moves: moves.into_iter().map(RootMove::new).collect() }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.moves.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RootMove> {
        self.moves.iter()
    }

    /// `from` 以降に `mv` が含まれるか（MultiPVで確定済みの手を除く）
    pub fn contains_from(&self, from: usize, mv: Move) -> bool {
        self.moves.get(from..).is_some_and(|s| s.iter().any(|rm| rm.mv() == mv))
    }

    pub fn find_mut(&mut self, mv: Move) -> Option<&mut RootMove> {
        self.moves.iter_mut().find(|rm| rm.mv() == mv)
    }

    /// [start, end) をスコアの降順に安定ソートする
    pub fn stable_sort_range(&mut self, start: usize, end: usize) {
        let end = end.min(self.moves.len());
        if start < end {
            self.moves[start..end].sort_by(|a, b| b.score.cmp(&a.score));
        }
    }

    /// 今回のスコアを前回のスコアとして保存する
    pub fn save_previous_scores(&mut self) {
        for rm in &mut self.moves {
            rm.previous_score = rm.score;
        }
    }
}

impl std::ops::Index<usize> for RootMoves {
    type Output = RootMove;

    fn index(&self, idx: usize) -> &RootMove {
        &self.moves[idx]
    }
}

impl std::ops::IndexMut<usize> for RootMoves {
    fn index_mut(&mut self, idx: usize) -> &mut RootMove {
        &mut self.moves[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> Move {
        Move::from_uci(s).unwrap()
    }

    #[test]
    fn test_node_type_queries() {
        assert!(NodeType::Root.is_pv());
        assert!(NodeType::Root.is_root());
        assert!(!NodeType::NonPV.is_pv());
        assert!(NodeType::SplitPointNonPV.is_split_point());
        assert!(!NodeType::SplitPointNonPV.is_pv());
        assert_eq!(NodeType::Root.to_split_point(), NodeType::SplitPointRoot);
        assert_eq!(NodeType::PV.to_split_point(), NodeType::SplitPointPV);
    }

    #[test]
    fn test_root_moves_stable_sort_keeps_tie_order() {
        let mut rms = RootMoves::from_moves([mv("a2a3"), mv("b2b3"), mv("c2c3"), mv("d2d3")]);
        rms[0].score = Value::new(10);
        rms[1].score = Value::new(50);
        rms[2].score = Value::new(10);
        rms[3].score = Value::new(50);
        rms.stable_sort_range(0, 4);
        let order: Vec<Move> = rms.iter().map(|rm| rm.mv()).collect();
        assert_eq!(order, vec![mv("b2b3"), mv("d2d3"), mv("a2a3"), mv("c2c3")]);
    }

    #[test]
    fn test_root_moves_contains_from() {
        let rms = RootMoves::from_moves([mv("a2a3"), mv("b2b3")]);
        assert!(rms.contains_from(0, mv("a2a3")));
        assert!(!rms.contains_from(1, mv("a2a3")));
        assert!(!rms.contains_from(5, mv("b2b3")));
    }

    #[test]
    fn test_killer_update() {
        let mut ss: Stack<(), ()> = Stack::default();
        ss.update_killers(mv("a2a3"));
        ss.update_killers(mv("b2b3"));
        ss.update_killers(mv("b2b3"));
        assert_eq!(ss.killers, [mv("b2b3"), mv("a2a3")]);
    }
}
