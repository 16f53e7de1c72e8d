//! 反復深化とルートの制御
//!
//! メインスレッドが実行する。深さを1ずつ増やしながらルートを探索し、
//! 各深さで MultiPV の本数だけアスピレーション探索を繰り返す。
//! 反復の合間に時間配分を見直し、終了時に最善手と ponder 手を報告する。

use super::alpha_beta::{SearchState, search, ss};
use super::context::{SearchContext, SearchResult};
use super::info::{Score, ScoreBound, SearchInfo};
use super::types::{NodeType, RootMoves};
use crate::eval::Evaluator;
use crate::position::{GenType, MoveList, Position};
use crate::types::{Bound, DEPTH_NONE, Depth, MAX_PLY, Move, Value};
use std::sync::Arc;
use std::sync::atomic::Ordering;

/// easy move の判定を始める深さ
const EASY_MOVE_DEPTH: Depth = 12;

// =============================================================================
// AspirationWindow
// =============================================================================

/// アスピレーション窓
///
/// 前回の反復のスコアを中心に狭い窓で探索し、外れたら外れた側だけを広げる。
/// 窓は広がる一方で、受理されるスコアは常に窓の内側にある。
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AspirationWindow {
    alpha: Value,
    beta: Value,
    delta: Value,
}

impl AspirationWindow {
    /// 初期幅
    pub const INITIAL_DELTA: i32 = 16;
    /// 狭い窓を使い始める深さ
    pub const MIN_DEPTH: Depth = 5;

    pub fn new(previous_score: Value, depth: Depth) -> Self {
        let delta = Value::new(Self::INITIAL_DELTA);
        if depth >= Self::MIN_DEPTH && previous_score.abs() < Value::KNOWN_WIN {
            Self {
                alpha: (previous_score - delta).max(-Value::INFINITE),
                beta: (previous_score + delta).min(Value::INFINITE),
                delta,
            }
        } else {
            Self { alpha: -Value::INFINITE, beta: Value::INFINITE, delta }
        }
    }

    #[inline]
    pub fn alpha(&self) -> Value {
        self.alpha
    }

    #[inline]
    pub fn beta(&self) -> Value {
        self.beta
    }

    /// スコアが窓の内側にあるか
    #[inline]
    pub fn accepts(&self, v: Value) -> bool {
        v > self.alpha && v < self.beta
    }

    /// 外れた側を広げる。勝敗が見えるスコアなら全幅にする
    pub fn widen(&mut self, v: Value) {
        if v.abs() >= Value::KNOWN_WIN {
            self.alpha = -Value::INFINITE;
            self.beta = Value::INFINITE;
        } else if v >= self.beta {
            self.beta = (self.beta + self.delta).min(Value::INFINITE);
        } else {
            self.alpha = (self.alpha - self.delta).max(-Value::INFINITE);
        }
        self.delta = self.delta + self.delta / 2;
    }
}

/// ルートで1回探索したときの窓と結果
#[cfg(test)]
#[derive(Clone, Copy, Debug)]
pub(crate) struct WindowPass {
    pub depth: Depth,
    pub alpha: Value,
    pub beta: Value,
    pub value: Value,
}

// =============================================================================
// think
// =============================================================================

/// 1回の探索を最後まで実行し、結果を報告して返す
pub(crate) fn think<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
) -> SearchResult {
    st.prepare_for_search(ctx.id);
    ctx.tt.new_search();
    let mut pos = ctx.root_pos.clone();

    st.root_moves = RootMoves::from_moves(root_moves(&pos, &ctx.limits.search_moves));

    if st.root_moves.is_empty() {
        let score = if pos.in_check() { Value::mated_in(0) } else { Value::DRAW };
        ctx.report(SearchInfo::Iteration {
            depth: 0,
            seldepth: 0,
            multipv: 1,
            score: Score::from_value(score),
            bound: ScoreBound::Exact,
            nodes: 0,
            nps: 0,
            time_ms: ctx.time.elapsed().max(0) as u64,
            hashfull: ctx.tt.hashfull(),
            pv: Vec::new(),
        });
        wait_until_released(ctx);
        ctx.report(SearchInfo::BestMove { best: None, ponder: None });
        log::info!("no legal moves at root, score {}", Score::from_value(score));
        return SearchResult {
            best_move: None,
            ponder_move: None,
            score,
            depth: 0,
            nodes: 0,
            pv: Vec::new(),
        };
    }

    let completed_depth = id_loop(st, ctx, &mut pos);

    wait_until_released(ctx);
    ctx.stop();

    let best = &st.root_moves[0];
    let best_move = best.mv();
    let ponder_move = best.pv.get(1).copied().or_else(|| ponder_from_tt(ctx, &mut pos, best_move));
    let nodes = st.pool.nodes_searched();

    ctx.report(SearchInfo::BestMove { best: Some(best_move), ponder: ponder_move });
    log::info!(
        "search finished: depth {} score {} nodes {} time {}ms bestmove {}",
        completed_depth,
        Score::from_value(best.score),
        nodes,
        ctx.time.elapsed(),
        best_move
    );
    #[cfg(feature = "search-stats")]
    log::info!("{}", st.stats.format_report());

    SearchResult {
        best_move: Some(best_move),
        ponder_move,
        score: best.score,
        depth: completed_depth,
        nodes,
        pv: best.pv.clone(),
    }
}

/// ルートで探索する合法手
fn root_moves<P: Position>(pos: &P, search_moves: &[Move]) -> Vec<Move> {
    let mut list = MoveList::new();
    pos.generate(GenType::All, &mut list);
    list.iter()
        .map(|em| em.mv)
        .filter(|&mv| pos.is_legal(mv))
        .filter(|mv| search_moves.is_empty() || search_moves.contains(mv))
        .collect()
}

/// infinite / ponder では、探索を終えても stop か ponderhit まで結果を出さない
fn wait_until_released<P, E>(ctx: &SearchContext<P, E>) {
    if !ctx.signals.stopped()
        && (ctx.limits.infinite || ctx.signals.pondering.load(Ordering::Acquire))
    {
        ctx.signals.stop_on_ponderhit.store(true, Ordering::Release);
        ctx.wait_for_stop_or_ponderhit();
    }
}

// =============================================================================
// 反復深化
// =============================================================================

/// 反復深化ループ。完了した深さを返す
fn id_loop<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
    pos: &mut P,
) -> Depth {
    let multi_pv = ctx.limits.multi_pv.clamp(1, st.root_moves.len());
    let max_depth =
        if ctx.limits.depth > 0 { ctx.limits.depth.min(MAX_PLY - 2) } else { MAX_PLY - 2 };
    let mut completed_depth = 0;

    for depth in 1..=max_depth {
        if ctx.signals.stopped() {
            break;
        }

        let prev_best_move_changes = ctx.best_move_changes.swap(0, Ordering::Relaxed);
        st.root_moves.save_previous_scores();
        st.sel_depth = 0;

        for pv_idx in 0..multi_pv {
            st.pv_idx = pv_idx;
            let mut window = AspirationWindow::new(st.root_moves[pv_idx].previous_score, depth);

            loop {
                let (alpha, beta) = (window.alpha(), window.beta());
                let best_value = search(st, ctx, pos, NodeType::Root, 0, alpha, beta, depth);
                #[cfg(test)]
                st.windows.push(WindowPass { depth, alpha, beta, value: best_value });

                // 確定した手を残して、今回の手をスコア順に並べる
                st.root_moves.stable_sort_range(pv_idx, st.root_moves.len());
                for i in 0..=pv_idx {
                    insert_pv_in_tt(ctx, pos, &st.root_moves[i].pv);
                }

                if ctx.signals.stopped() || window.accepts(best_value) {
                    break;
                }

                if ctx.time.elapsed() >= ctx.options.bound_report_ms {
                    report_lines(st, ctx, depth, multi_pv, alpha, beta);
                }

                if best_value >= beta {
                    log::debug!("depth {depth}: fail high {best_value:?} >= {beta:?}");
                } else {
                    log::debug!("depth {depth}: fail low {best_value:?} <= {alpha:?}");
                    ctx.signals.failed_low_at_root.store(true, Ordering::Relaxed);
                    ctx.signals.stop_on_ponderhit.store(false, Ordering::Relaxed);
                }
                window.widen(best_value);
            }

            st.root_moves.stable_sort_range(0, pv_idx + 1);

            if pv_idx + 1 == multi_pv || ctx.time.elapsed() >= ctx.options.bound_report_ms {
                report_lines(st, ctx, depth, multi_pv, -Value::INFINITE, Value::INFINITE);
            }
            if ctx.signals.stopped() {
                break;
            }
        }

        if ctx.signals.stopped() {
            break;
        }
        completed_depth = depth;

        let best_value = st.root_moves[0].score;

        // 指定手数以内の詰みを見つけた
        if ctx.limits.mate > 0
            && best_value >= Value::MATE_IN_MAX_PLY
            && (Value::MATE - best_value).raw() <= 2 * ctx.limits.mate
        {
            ctx.stop();
            break;
        }

        if ctx.limits.use_time_management()
            && !ctx.signals.stopped()
            && !ctx.signals.stop_on_ponderhit.load(Ordering::Relaxed)
        {
            let best_move_changes = ctx.best_move_changes.load(Ordering::Relaxed);
            if should_stop(st, ctx, pos, depth, multi_pv, best_move_changes, prev_best_move_changes) {
                if ctx.signals.pondering.load(Ordering::Acquire) {
                    ctx.signals.stop_on_ponderhit.store(true, Ordering::Release);
                } else {
                    ctx.stop();
                }
            }
        }
    }

    completed_depth
}

/// 反復を終えたところで、次の反復に進まず止めるか
#[allow(clippy::too_many_arguments)]
fn should_stop<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
    pos: &mut P,
    depth: Depth,
    multi_pv: usize,
    best_move_changes: u32,
    prev_best_move_changes: u32,
) -> bool {
    // 最善手が揺れているなら時間を延ばす
    if depth > 4 && depth < 50 && multi_pv == 1 {
        ctx.time.pv_instability(best_move_changes, prev_best_move_changes);
    }

    let elapsed = ctx.time.elapsed();
    let available = ctx.time.available_time();

    // 次の反復を終える見込みがない
    if elapsed > available * 62 / 100 {
        return true;
    }

    // 最善手以外がはっきり悪ければ残りの時間を使わない
    if depth >= EASY_MOVE_DEPTH
        && multi_pv == 1
        && (st.root_moves.len() == 1 || elapsed > available * 20 / 100)
    {
        return is_easy_move(st, ctx, pos, depth);
    }

    false
}

/// 最善手を除いた浅い探索で、ほかの手がどれも2ポーン以上悪いか
///
/// 除外探索もルートで探索する手（searchmoves）の中だけを読む。
pub(super) fn is_easy_move<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
    pos: &mut P,
    depth: Depth,
) -> bool {
    let best_value = st.root_moves[0].score;
    if best_value.abs() >= Value::KNOWN_WIN {
        return false;
    }
    let rbeta = best_value - 2 * Value::PAWN.raw();
    let root = ss(0);
    st.stack[root].excluded_move = st.root_moves[0].mv();
    st.stack[root].skip_null_move = true;
    let v = search(st, ctx, pos, NodeType::NonPV, 0, rbeta - 1, rbeta, depth - 3);
    st.stack[root].skip_null_move = false;
    st.stack[root].excluded_move = Move::NONE;
    if !ctx.signals.stopped() && v < rbeta {
        log::debug!("easy move {} at depth {depth}", st.root_moves[0].mv());
        return true;
    }
    false
}

// =============================================================================
// 報告・置換表
// =============================================================================

/// MultiPV の各行を報告する
///
/// 今回の反復でまだ探索していない行は前回の深さとスコアで報告する。
fn report_lines<P, E>(
    st: &SearchState<P, E>,
    ctx: &SearchContext<P, E>,
    depth: Depth,
    multi_pv: usize,
    alpha: Value,
    beta: Value,
) {
    let elapsed = ctx.time.elapsed().max(0) as u64;
    let nodes = st.pool.nodes_searched();
    let nps = nodes * 1000 / elapsed.max(1);
    let hashfull = ctx.tt.hashfull();

    for i in 0..multi_pv.min(st.root_moves.len()) {
        let updated = i <= st.pv_idx;
        if depth == 1 && !updated {
            continue;
        }
        let rm = &st.root_moves[i];
        let (d, v) = if updated { (depth, rm.score) } else { (depth - 1, rm.previous_score) };
        if v == -Value::INFINITE {
            continue;
        }
        let bound =
            if i == st.pv_idx { ScoreBound::from_window(v, alpha, beta) } else { ScoreBound::Exact };
        ctx.report(SearchInfo::Iteration {
            depth: d,
            seldepth: st.sel_depth.max(rm.sel_depth),
            multipv: i + 1,
            score: Score::from_value(v),
            bound,
            nodes,
            nps,
            time_ms: elapsed,
            hashfull,
            pv: rm.pv.clone(),
        });
    }
}

/// 読み筋を置換表に書き戻す（上書きされて失われた手を次の反復で使う）
fn insert_pv_in_tt<P: Position, E>(ctx: &SearchContext<P, E>, pos: &mut P, pv: &[Move]) {
    let mut played = Vec::with_capacity(pv.len());
    for &mv in pv {
        if !pos.pseudo_legal(mv) || !pos.is_legal(mv) {
            break;
        }
        let key = pos.key();
        if ctx.tt.probe(key).is_none_or(|t| t.mv != mv) {
            ctx.tt.store(key, Value::NONE, Bound::None, DEPTH_NONE, mv, Value::NONE);
        }
        pos.do_move(mv);
        played.push(mv);
    }
    for &mv in played.iter().rev() {
        pos.undo_move(mv);
    }
}

/// 読み筋が1手しかないとき、最善手を指した局面の置換表から ponder 手を取り出す
fn ponder_from_tt<P: Position, E>(
    ctx: &SearchContext<P, E>,
    pos: &mut P,
    best_move: Move,
) -> Option<Move> {
    pos.do_move(best_move);
    let ponder = ctx
        .tt
        .probe(pos.key())
        .map(|t| t.mv)
        .filter(|&mv| mv.is_some() && pos.pseudo_legal(mv) && pos.is_legal(mv));
    pos.undo_move(best_move);
    ponder
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_window_full_at_shallow_depth() {
        let w = AspirationWindow::new(Value::new(30), 4);
        assert_eq!(w.alpha(), -Value::INFINITE);
        assert_eq!(w.beta(), Value::INFINITE);
    }

    #[test]
    fn test_window_narrow_then_widens_one_side() {
        let mut w = AspirationWindow::new(Value::new(30), 6);
        assert_eq!((w.alpha(), w.beta()), (Value::new(14), Value::new(46)));
        assert!(w.accepts(Value::new(30)));
        assert!(!w.accepts(Value::new(46)));

        w.widen(Value::new(50));
        assert_eq!((w.alpha(), w.beta()), (Value::new(14), Value::new(62)));
        w.widen(Value::new(0));
        assert_eq!((w.alpha(), w.beta()), (Value::new(-10), Value::new(62)));
    }

    #[test]
    fn test_window_opens_fully_on_decisive_score() {
        let mut w = AspirationWindow::new(Value::new(-20), 8);
        w.widen(Value::mate_in(5));
        assert_eq!((w.alpha(), w.beta()), (-Value::INFINITE, Value::INFINITE));
    }

    #[test]
    fn test_window_decisive_previous_score_is_full() {
        let w = AspirationWindow::new(Value::mated_in(4), 10);
        assert_eq!(w.alpha(), -Value::INFINITE);
        let w = AspirationWindow::new(-Value::INFINITE, 10);
        assert_eq!(w.beta(), Value::INFINITE);
    }

    proptest! {
        #[test]
        fn prop_window_widens_until_score_is_accepted(
            prev in -3000i32..3000,
            depth in 1i32..40,
            score in -32000i32..32000,
        ) {
            let score = Value::new(score);
            let mut w = AspirationWindow::new(Value::new(prev), depth);
            let mut rounds = 0;
            while !w.accepts(score) {
                let (alpha, beta) = (w.alpha(), w.beta());
                w.widen(score);
                prop_assert!(w.alpha() <= alpha && w.beta() >= beta);
                prop_assert!(w.alpha() < alpha || w.beta() > beta);
                rounds += 1;
                prop_assert!(rounds < 64);
            }
        }
    }
}
