//! 分岐点（SplitPoint）
//!
//! 探索ノードの残りの指し手を複数スレッドで分担するための共有レコード。
//! 不変な探索パラメータはフィールドに、変化する値（alpha, 最善手, 指し手カーソル）は
//! 1つのロックの内側に置く。
//!
//! 分岐点はマスタースレッドのノードが探索している間だけ存在し、
//! 参加スレッドがすべて抜けたらマスターが結果を読み出して破棄する。

use super::context::SearchContext;
use super::movepicker::MovePicker;
use super::types::{NodeType, RootMoves};
use crate::types::{Depth, Move, Value};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// 1スレッドが同時に持てる分岐点の数
pub const MAX_SPLITPOINTS_PER_THREAD: usize = 8;

/// ロックで保護される分岐点の可変部分
pub struct SplitPointState {
    /// 共有の指し手カーソル
    pub picker: MovePicker,
    pub alpha: Value,
    pub best_value: Value,
    pub best_move: Move,
    pub move_count: i32,
    /// 最善手以下の読み筋（PVノードのみ）
    pub pv: Vec<Move>,
    /// ルートで分岐したときのルート指し手リスト
    pub root_moves: Option<RootMoves>,
}

/// 分岐点
pub struct SplitPoint<P, E> {
    pub ctx: Arc<SearchContext<P, E>>,
    /// 分岐したノードの局面
    pub pos: P,
    /// 分岐点の親（マスターが別の分岐点を手伝っている最中に分岐した場合）
    pub parent: Option<Arc<SplitPoint<P, E>>>,
    pub master: usize,
    pub node_type: NodeType,
    pub ply: i32,
    pub depth: Depth,
    pub beta: Value,
    pub static_eval: Value,
    pub tt_move: Move,
    pub threat_move: Move,
    pub killers: [Move; 2],
    pub counter_moves: [Move; 2],
    /// ルートで MultiPV の何本目を探索中か
    pub pv_idx: usize,
    /// 探索に参加しているスレッドのビット集合
    pub slaves_mask: AtomicU64,
    /// beta カットが起きた
    pub cutoff: AtomicBool,
    pub state: Mutex<SplitPointState>,
}

impl<P, E> SplitPoint<P, E> {
    /// この分岐点か祖先の分岐点で beta カットが起きているか
    pub fn cutoff_occurred(&self) -> bool {
        if self.cutoff.load(Ordering::Acquire) {
            return true;
        }
        let mut sp = self.parent.as_deref();
        while let Some(p) = sp {
            if p.cutoff.load(Ordering::Acquire) {
                return true;
            }
            sp = p.parent.as_deref();
        }
        false
    }

    #[inline]
    pub fn has_slave(&self, idx: usize) -> bool {
        self.slaves_mask.load(Ordering::Acquire) & (1u64 << idx) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::MaterialEvaluator;
    use crate::position::ChessBoard;
    use crate::search::{EngineOptions, LimitsType, TimeManager, TimeOptions};
    use crate::tt::TranspositionTable;
    use crate::types::Color;

    type Sp = SplitPoint<ChessBoard, MaterialEvaluator>;

    fn make_sp(parent: Option<Arc<Sp>>) -> Arc<Sp> {
        let limits = LimitsType::depth(4);
        let time = TimeManager::new(&limits, &TimeOptions::default(), Color::White, Value::ZERO);
        let ctx = Arc::new(SearchContext::new(
            1,
            ChessBoard::startpos(),
            Arc::new(TranspositionTable::new(1)),
            Arc::new(MaterialEvaluator::new()),
            limits,
            time,
            EngineOptions::default(),
            None,
        ));
        Arc::new(SplitPoint {
            ctx,
            pos: ChessBoard::startpos(),
            parent,
            master: 0,
            node_type: NodeType::NonPV,
            ply: 3,
            depth: 6,
            beta: Value::new(10),
            static_eval: Value::ZERO,
            tt_move: Move::NONE,
            threat_move: Move::NONE,
            killers: [Move::NONE; 2],
            counter_moves: [Move::NONE; 2],
            pv_idx: 0,
            slaves_mask: AtomicU64::new(0b11),
            cutoff: AtomicBool::new(false),
            state: Mutex::new(SplitPointState {
                picker: MovePicker::default(),
                alpha: Value::new(9),
                best_value: -Value::INFINITE,
                best_move: Move::NONE,
                move_count: 0,
                pv: Vec::new(),
                root_moves: None,
            }),
        })
    }

    #[test]
    fn test_cutoff_walks_parent_chain() {
        let parent = make_sp(None);
        let child = make_sp(Some(Arc::clone(&parent)));
        assert!(!child.cutoff_occurred());
        parent.cutoff.store(true, Ordering::Release);
        assert!(child.cutoff_occurred());
        assert!(!make_sp(None).cutoff_occurred());
    }

    #[test]
    fn test_slave_mask() {
        let sp = make_sp(None);
        assert!(sp.has_slave(0));
        assert!(sp.has_slave(1));
        assert!(!sp.has_slave(2));
        sp.slaves_mask.fetch_and(!1, Ordering::AcqRel);
        assert!(!sp.has_slave(0));
    }
}
