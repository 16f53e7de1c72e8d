//! search モジュールのテスト
//!
//! 探索関数を直接呼ぶテスト用に、1スレッドのプールと探索コンテキストを組み立てる。


use std::sync::{Arc, Mutex};

use super::alpha_beta::SearchState;
use super::context::SearchContext;
use super::info::{InfoCallback, SearchInfo};
use super::thread::ThreadPool;
use super::{EngineOptions, LimitsType, TimeManager, TimeOptions};
use crate::eval::MaterialEvaluator;
use crate::position::{ChessBoard, Position};
use crate::tt::TranspositionTable;
use crate::types::{Color, Move};

pub(super) type Ctx = SearchContext<ChessBoard, MaterialEvaluator>;

/// 探索関数を直接呼ぶための一式
pub(super) struct Harness {
    // ワーカーのノード数カウンタを使うためにプールを生かしておく
    _pool: ThreadPool<ChessBoard, MaterialEvaluator>,
    pub st: SearchState<ChessBoard, MaterialEvaluator>,
    pub ctx: Arc<Ctx>,
    pub infos: Arc<Mutex<Vec<SearchInfo>>>,
}

pub(super) fn harness(fen: &str, limits: LimitsType, options: EngineOptions) -> Harness {
    let pos = ChessBoard::from_fen(fen).unwrap();
    let mut limits = limits;
    limits.set_start_time();
    let material = pos.non_pawn_material(Color::White) + pos.non_pawn_material(Color::Black);
    let time = TimeManager::new(&limits, &TimeOptions::default(), pos.side_to_move(), material);

    let infos = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&infos);
    let callback: InfoCallback = Arc::new(move |info: &SearchInfo| {
        sink.lock().unwrap().push(info.clone());
    });

    let pool = ThreadPool::new(1).unwrap();
    let st = SearchState::new(0, Arc::clone(pool.shared()));
    let ctx = Arc::new(SearchContext::new(
        1,
        pos,
        Arc::new(TranspositionTable::new(4)),
        Arc::new(MaterialEvaluator::new()),
        limits,
        time,
        options,
        Some(callback),
    ));
    Harness { _pool: pool, st, ctx, infos }
}

pub(super) fn mv(s: &str) -> Move {
    Move::from_uci(s).unwrap()
}

pub(super) const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
/// 白の Ra8# で詰む
pub(super) const MATE_IN_ONE: &str = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1";
