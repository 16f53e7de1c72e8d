//! 通常探索（alpha-beta / PVS）
//!
//! ノードの種類は `NodeType` で実行時に切り替える。
//! 分岐点（SplitPoint*）のノードは置換表・枝刈りの前処理を飛ばし、
//! 分岐点の指し手カーソルから手を取り出す指し手ループだけを実行する。

use super::context::SearchContext;
use super::history::{HistoryTables, stat_bonus};
use super::info::SearchInfo;
use super::movepicker::MovePicker;
use super::pruning::{
    FUTILITY_DEPTH, MOVE_COUNT_PRUNING_DEPTH, RAZOR_DEPTH, SEE_PRUNING_DEPTH, allows,
    futility_margin, futility_move_count, move_futility_margin, razor_margin, reduction, refutes,
};
use super::qsearch::qsearch;
use super::split_point::{MAX_SPLITPOINTS_PER_THREAD, SplitPoint};
use super::stats::{inc_stat, inc_stat_by_depth};
use super::thread::{PoolShared, SplitParams, split};
use super::types::{EXCLUSION_KEY, NodeType, RootMoves, STACK_OFFSET, Stack, new_stack};
use crate::eval::Evaluator;
use crate::position::Position;
use crate::tt::TTData;
use crate::types::{
    Bound, DEPTH_NONE, Depth, MAX_PLY, Move, PieceType, Value, value_from_tt, value_to_tt,
};
use smallvec::SmallVec;
use std::sync::Arc;
use std::sync::atomic::Ordering;

#[cfg(feature = "search-stats")]
use super::stats::SearchStats;

/// null move の結果を検証探索で確かめる深さ（以上）
const NULL_VERIFICATION_DEPTH: Depth = 12;

/// ProbCut を行う深さ（以上）
const PROBCUT_DEPTH: Depth = 5;

/// 読み中の手を報告し始める経過時間（ミリ秒）
const CURRMOVE_REPORT_MS: i64 = 3000;

// =============================================================================
// SearchState
// =============================================================================

/// ワーカーごとの探索状態
///
/// スレッドごとに1つ持ち、探索関数へ `&mut` で渡す。
pub(crate) struct SearchState<P, E> {
    pub idx: usize,
    pub pool: Arc<PoolShared<P, E>>,
    pub stack: Vec<Stack<P, E>>,
    /// 分岐点の探索で使う予備のスタック
    spare_stacks: Vec<Vec<Stack<P, E>>>,
    pub history: HistoryTables,
    /// PVノードで到達した最大の ply
    pub sel_depth: i32,
    pub root_moves: RootMoves,
    /// MultiPV で何本目を探索中か
    pub pv_idx: usize,
    /// 履歴を初期化した探索の ID
    pub search_id: u64,
    #[cfg(feature = "search-stats")]
    pub stats: SearchStats,
    /// ルートの探索ごとの窓
    #[cfg(test)]
    pub(crate) windows: Vec<super::driver::WindowPass>,
}

impl<P, E> SearchState<P, E> {
    pub fn new(idx: usize, pool: Arc<PoolShared<P, E>>) -> Self {
        Self {
            idx,
            pool,
            stack: new_stack(),
            spare_stacks: Vec::new(),
            history: HistoryTables::new(),
            sel_depth: 0,
            root_moves: RootMoves::new(),
            pv_idx: 0,
            search_id: 0,
            #[cfg(feature = "search-stats")]
            stats: SearchStats::default(),
            #[cfg(test)]
            windows: Vec::new(),
        }
    }

    /// 新しい探索のために履歴とスタックを初期化する
    pub fn prepare_for_search(&mut self, search_id: u64) {
        self.history.clear();
        for ss in &mut self.stack {
            ss.reset();
        }
        self.sel_depth = 0;
        self.pv_idx = 0;
        self.search_id = search_id;
        #[cfg(feature = "search-stats")]
        self.stats.reset();
        #[cfg(test)]
        self.windows.clear();
    }

    pub fn take_spare_stack(&mut self) -> Vec<Stack<P, E>> {
        self.spare_stacks.pop().unwrap_or_else(new_stack)
    }

    pub fn return_spare_stack(&mut self, stack: Vec<Stack<P, E>>) {
        self.spare_stacks.push(stack);
    }

    #[inline]
    pub(super) fn count_node(&self) {
        self.pool.slots[self.idx].nodes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(super) fn cutoff_occurred(&self) -> bool {
        self.pool.slots[self.idx].cutoff_occurred()
    }
}

/// ply に対応するスタックの位置
#[inline]
pub(super) fn ss(ply: i32) -> usize {
    ply as usize + STACK_OFFSET
}

/// 指し手と子ノードの読み筋から、このノードの読み筋を作る
#[inline]
pub(super) fn update_pv<P, E>(stack: &mut [Stack<P, E>], cur: usize, mv: Move) {
    let (head, tail) = stack.split_at_mut(cur + 1);
    let pv = &mut head[cur].pv;
    pv.clear();
    pv.push(mv);
    pv.extend_from_slice(&tail[0].pv);
}

/// 置換表の値でそのまま返してよいか（PVノードは正確な値のみ）
#[inline]
pub(super) fn tt_cutoff_allowed(pv_node: bool, bound: Bound, tt_value: Value, beta: Value) -> bool {
    if pv_node {
        bound == Bound::Exact
    } else if tt_value >= beta {
        bound.is_lower_or_exact()
    } else {
        bound.is_upper_or_exact()
    }
}

/// ルート局面で searchmoves の指定外の手か（easy move の除外探索もここで絞る）
#[inline]
fn outside_search_moves<P, E>(ctx: &SearchContext<P, E>, ply: i32, m: Move) -> bool {
    ply == 0 && !ctx.limits.search_moves.is_empty() && !ctx.limits.search_moves.contains(&m)
}

#[inline]
fn is_castling<P: Position>(pos: &P, mv: Move) -> bool {
    pos.moved_piece(mv).piece_type() == Some(PieceType::King)
        && (i32::from(mv.from().file()) - i32::from(mv.to().file())).abs() == 2
}

// =============================================================================
// ノードの情報
// =============================================================================

/// 指し手ループが参照するノードの情報
struct NodeInfo {
    nt: NodeType,
    ply: i32,
    depth: Depth,
    beta: Value,
    in_check: bool,
    key: u64,
    excluded: Move,
    tt_move: Move,
    tt_value: Value,
    singular_node: bool,
    threat_move: Move,
    static_eval: Value,
    prev_move: Move,
    counter_moves: [Move; 2],
}

// =============================================================================
// search
// =============================================================================

/// 通常探索
///
/// `ply` はルートからの手数、`depth` は残り深さ（1以上）。
#[allow(clippy::too_many_arguments)]
pub(crate) fn search<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
    pos: &mut P,
    nt: NodeType,
    ply: i32,
    mut alpha: Value,
    mut beta: Value,
    depth: Depth,
) -> Value {
    debug_assert!(alpha >= -Value::INFINITE && alpha < beta && beta <= Value::INFINITE);
    debug_assert!(depth > 0);

    let pv_node = nt.is_pv();
    let root_node = nt.is_root();
    let in_check = pos.in_check();
    let cur = ss(ply);

    if nt.is_split_point() {
        let Some(sp) = st.stack[cur].split_point.clone() else {
            return alpha;
        };
        let node = NodeInfo {
            nt,
            ply,
            depth,
            beta,
            in_check,
            key: pos.key(),
            excluded: Move::NONE,
            tt_move: sp.tt_move,
            tt_value: Value::NONE,
            singular_node: false,
            threat_move: sp.threat_move,
            static_eval: sp.static_eval,
            prev_move: Move::NONE,
            counter_moves: sp.counter_moves,
        };
        let mut picker = MovePicker::default();
        return move_loop(st, ctx, pos, &node, alpha, &mut picker, Some(&sp));
    }

    // Step 1. ノードの初期化
    st.count_node();
    inc_stat!(st, nodes_searched);
    inc_stat_by_depth!(st, nodes_by_depth, depth);
    if pv_node && st.sel_depth < ply + 1 {
        st.sel_depth = ply + 1;
    }
    {
        let ss = &mut st.stack[cur];
        ss.current_move = Move::NONE;
        ss.pv.clear();
    }
    st.stack[cur + 1].excluded_move = Move::NONE;
    st.stack[cur + 1].skip_null_move = false;
    st.stack[cur + 2].killers = [Move::NONE; 2];
    let excluded = st.stack[cur].excluded_move;
    let prev_move = st.stack[cur - 1].current_move;
    let us = pos.side_to_move();
    let selective = !ctx.options.full_width;

    if !root_node {
        // Step 2. 停止・引き分け・最大手数
        if ctx.signals.stopped() || pos.is_draw() || ply >= MAX_PLY - 1 {
            return Value::DRAW;
        }

        // Step 3. Mate distance pruning
        alpha = alpha.max(Value::mated_in(ply));
        beta = beta.min(Value::mate_in(ply + 1));
        if alpha >= beta {
            return alpha;
        }
    }

    // Step 4. 置換表
    let key = if excluded.is_some() { pos.key() ^ EXCLUSION_KEY } else { pos.key() };
    let mut tte: Option<TTData> = ctx.tt.probe(key);
    let mut tt_value = tte.map_or(Value::NONE, |t| value_from_tt(t.value, ply));
    let mut tt_move =
        if root_node { st.root_moves[st.pv_idx].mv() } else { tte.map_or(Move::NONE, |t| t.mv) };

    if !root_node
        && let Some(t) = tte
        && t.depth >= depth
        && tt_value != Value::NONE
        && tt_cutoff_allowed(pv_node, t.bound, tt_value, beta)
    {
        st.stack[cur].current_move = t.mv;
        if tt_value >= beta
            && t.mv.is_some()
            && !in_check
            && !pos.is_capture_or_promotion(t.mv)
        {
            st.stack[cur].update_killers(t.mv);
        }
        inc_stat!(st, tt_cutoff);
        return tt_value;
    }

    // Step 5. 静的評価
    let mut eval = Value::NONE;
    if !in_check {
        let static_eval = match tte {
            Some(t) if t.eval != Value::NONE => t.eval,
            Some(_) => ctx.evaluator.evaluate(pos),
            None => {
                let e = ctx.evaluator.evaluate(pos);
                ctx.tt.store(key, Value::NONE, Bound::None, DEPTH_NONE, Move::NONE, e);
                e
            }
        };
        eval = static_eval;
        // 置換表の値で評価を補正する
        if let Some(t) = tte
            && tt_value != Value::NONE
            && t.bound.includes(if tt_value > eval { Bound::Lower } else { Bound::Upper })
        {
            eval = tt_value;
        }
        st.stack[cur].static_eval = static_eval;
    } else {
        st.stack[cur].static_eval = Value::NONE;
    }
    let static_eval = st.stack[cur].static_eval;

    // 直前の静かな手による評価の変化を記録する
    let prev_eval = st.stack[cur - 1].static_eval;
    if prev_move.is_ok()
        && !prev_move.is_promotion()
        && prev_eval != Value::NONE
        && static_eval != Value::NONE
        && pos.captured_piece_type().is_none()
    {
        let to = prev_move.to();
        st.history.gains.update(pos.piece_on(to), to, -prev_eval - static_eval);
    }

    let mut threat_move = Move::NONE;

    if selective && !pv_node && !in_check {
        // Step 6. Razoring
        if depth < RAZOR_DEPTH
            && eval + razor_margin(depth) < beta
            && tt_move.is_none()
            && beta.abs() < Value::MATE_IN_MAX_PLY
            && !pos.has_pawn_on_7th(us)
        {
            let rbeta = beta - razor_margin(depth);
            let v = qsearch(st, ctx, pos, NodeType::NonPV, ply, rbeta - 1, rbeta, 0);
            if v < rbeta {
                inc_stat!(st, razoring_applied);
                return v;
            }
        }

        // Step 7. 静的評価による枝刈り
        if !st.stack[cur].skip_null_move
            && depth < FUTILITY_DEPTH
            && eval - futility_margin(depth) >= beta
            && beta.abs() < Value::MATE_IN_MAX_PLY
            && eval.abs() < Value::KNOWN_WIN
            && pos.non_pawn_material(us) > Value::ZERO
        {
            inc_stat!(st, futility_pruned);
            return eval - futility_margin(depth);
        }

        // Step 8. Null move
        if !st.stack[cur].skip_null_move
            && depth > 1
            && eval >= beta
            && beta.abs() < Value::MATE_IN_MAX_PLY
            && pos.non_pawn_material(us) > Value::ZERO
        {
            inc_stat!(st, nmp_attempted);
            st.stack[cur].current_move = Move::NULL;
            let mut r = 3 + depth / 4;
            if eval - Value::PAWN > beta {
                r += 1;
            }

            pos.do_null_move();
            st.stack[cur + 1].skip_null_move = true;
            let null_value = if depth - r < 1 {
                -qsearch(st, ctx, pos, NodeType::NonPV, ply + 1, -beta, -alpha, 0)
            } else {
                -search(st, ctx, pos, NodeType::NonPV, ply + 1, -beta, -alpha, depth - r)
            };
            st.stack[cur + 1].skip_null_move = false;
            pos.undo_null_move();

            if null_value >= beta {
                // 詰みのスコアは証明されていないので返さない
                let null_value = if null_value >= Value::MATE_IN_MAX_PLY { beta } else { null_value };
                if depth < NULL_VERIFICATION_DEPTH {
                    inc_stat!(st, nmp_cutoff);
                    return null_value;
                }

                inc_stat!(st, nmp_verification);
                st.stack[cur].skip_null_move = true;
                let v = search(st, ctx, pos, NodeType::NonPV, ply, alpha, beta, depth - r);
                st.stack[cur].skip_null_move = false;
                if v >= beta {
                    inc_stat!(st, nmp_cutoff);
                    return null_value;
                }
            } else {
                // 脅威手を記録し、直前の削減が原因なら読み直させる
                threat_move = st.stack[cur + 1].current_move;
                if depth < 5
                    && st.stack[cur - 1].reduction != 0
                    && threat_move.is_some()
                    && allows(prev_move, threat_move)
                {
                    return beta - 1;
                }
            }
        }

        // Step 9. ProbCut
        if depth >= PROBCUT_DEPTH
            && !st.stack[cur].skip_null_move
            && excluded.is_none()
            && beta.abs() < Value::MATE_IN_MAX_PLY
        {
            inc_stat!(st, probcut_attempted);
            let rbeta = (beta + 200).min(Value::INFINITE);
            let rdepth = depth - 4;
            let threshold = crate::types::piece_type_value(pos.captured_piece_type());
            let mut mp = MovePicker::new_probcut(pos, tt_move, threshold);
            while let Some(mv) = mp.next_move(pos, &st.history) {
                if !pos.is_legal(mv) {
                    continue;
                }
                st.stack[cur].current_move = mv;
                pos.do_move(mv);
                let value = -search(st, ctx, pos, NodeType::NonPV, ply + 1, -rbeta, -rbeta + 1, rdepth);
                pos.undo_move(mv);
                if value >= rbeta {
                    inc_stat!(st, probcut_cutoff);
                    return value;
                }
            }
        }
    }

    // Step 10. 多重反復深化（置換表に手がないとき）
    if tt_move.is_none()
        && depth >= if pv_node { 5 } else { 8 }
        && (pv_node || (!in_check && static_eval + 256 >= beta))
    {
        inc_stat!(st, iid_applied);
        let d = if pv_node { depth - 2 } else { depth / 2 };
        st.stack[cur].skip_null_move = true;
        search(st, ctx, pos, nt, ply, alpha, beta, d);
        st.stack[cur].skip_null_move = false;

        tte = ctx.tt.probe(key);
        tt_move = tte.map_or(Move::NONE, |t| t.mv);
        tt_value = tte.map_or(Value::NONE, |t| value_from_tt(t.value, ply));
    }

    let singular_node = !root_node
        && depth >= if pv_node { 6 } else { 8 }
        && tt_move.is_some()
        && excluded.is_none()
        && tte.is_some_and(|t| t.bound.is_lower_or_exact() && t.depth >= depth - 3);

    let counter_moves = if prev_move.is_ok() {
        let to = prev_move.to();
        st.history.counter_moves.get(pos.piece_on(to), to)
    } else {
        [Move::NONE; 2]
    };

    let node = NodeInfo {
        nt,
        ply,
        depth,
        beta,
        in_check,
        key,
        excluded,
        tt_move,
        tt_value,
        singular_node,
        threat_move,
        static_eval,
        prev_move,
        counter_moves,
    };
    let mut picker =
        MovePicker::new(pos, tt_move, excluded, depth, st.stack[cur].killers, counter_moves);
    move_loop(st, ctx, pos, &node, alpha, &mut picker, None)
}

// =============================================================================
// 指し手ループ
// =============================================================================

/// 指し手ループ（Step 11〜20）
///
/// `sp` が Some のときは分岐点の共有カーソルから手を取り出し、結果を分岐点へ書き戻す。
#[allow(clippy::too_many_arguments)]
fn move_loop<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
    pos: &mut P,
    node: &NodeInfo,
    mut alpha: Value,
    picker: &mut MovePicker,
    sp: Option<&Arc<SplitPoint<P, E>>>,
) -> Value {
    let NodeInfo { nt, ply, depth, beta, in_check, .. } = *node;
    let pv_node = nt.is_pv();
    let root_node = nt.is_root();
    let cur = ss(ply);
    let selective = !ctx.options.full_width;

    let (mut best_value, mut best_move, mut move_count) = match sp {
        Some(sp) => {
            let s = sp.state.lock();
            (s.best_value, s.best_move, s.move_count)
        }
        None => (-Value::INFINITE, Move::NONE, 0),
    };
    let mut quiets_searched: SmallVec<[Move; 64]> = SmallVec::new();

    // Step 11. 指し手ごとのループ
    loop {
        if ctx.signals.stopped() || st.cutoff_occurred() {
            break;
        }

        let mv = match sp {
            Some(sp) => {
                let mut s = sp.state.lock();
                let next = loop {
                    let Some(m) = s.picker.next_move(pos, &st.history) else {
                        break None;
                    };
                    if root_node
                        && !s.root_moves.as_ref().is_some_and(|rms| rms.contains_from(sp.pv_idx, m))
                    {
                        continue;
                    }
                    if outside_search_moves(ctx, ply, m) {
                        continue;
                    }
                    if !pos.is_legal(m) {
                        continue;
                    }
                    s.move_count += 1;
                    break Some((m, s.move_count));
                };
                let Some((m, count)) = next else {
                    break;
                };
                move_count = count;
                m
            }
            None => {
                let Some(m) = picker.next_move(pos, &st.history) else {
                    break;
                };
                if m == node.excluded {
                    continue;
                }
                if root_node && !st.root_moves.contains_from(st.pv_idx, m) {
                    continue;
                }
                if outside_search_moves(ctx, ply, m) {
                    continue;
                }
                if !root_node && !pos.is_legal(m) {
                    continue;
                }
                move_count += 1;
                m
            }
        };

        if root_node {
            ctx.signals.first_root_move.store(move_count == 1, Ordering::Relaxed);
            if st.idx == 0 && ctx.time.elapsed() > CURRMOVE_REPORT_MS {
                ctx.report(SearchInfo::CurrentMove {
                    depth,
                    mv,
                    number: move_count as usize + st.pv_idx,
                });
            }
        }

        let capture_or_promotion = pos.is_capture_or_promotion(mv);
        let gives_check = pos.gives_check(mv);
        let dangerous = gives_check || pos.is_passed_pawn_push(mv) || is_castling(pos, mv);

        // Step 12. 延長
        let mut ext: Depth = 0;
        if gives_check && pos.see_ge(mv, Value::ZERO) {
            ext = 1;
            inc_stat!(st, check_extension);
        }

        // シンギュラー延長: 置換表の手だけが beta を超えるなら1手延長する
        if node.singular_node
            && mv == node.tt_move
            && ext == 0
            && node.tt_value != Value::NONE
            && node.tt_value.abs() < Value::KNOWN_WIN
        {
            let rbeta = node.tt_value - 2 * depth;
            st.stack[cur].excluded_move = mv;
            st.stack[cur].skip_null_move = true;
            let value = search(st, ctx, pos, NodeType::NonPV, ply, rbeta - 1, rbeta, depth / 2);
            st.stack[cur].skip_null_move = false;
            st.stack[cur].excluded_move = Move::NONE;
            if value < rbeta {
                ext = 1;
                inc_stat!(st, singular_extension);
            }
        }

        let new_depth = depth - 1 + ext;

        // Step 13. 浅い深さでの枝刈り
        if selective
            && !pv_node
            && !in_check
            && !capture_or_promotion
            && !dangerous
            && mv != node.tt_move
            && best_value > Value::MATED_IN_MAX_PLY
        {
            // Move count pruning
            if depth < MOVE_COUNT_PRUNING_DEPTH
                && move_count >= futility_move_count(depth)
                && !refutes(pos, mv, node.threat_move)
            {
                inc_stat!(st, move_loop_pruned);
                continue;
            }

            let predicted_depth = new_depth - reduction(pv_node, depth, move_count);

            // Futility pruning
            if predicted_depth < FUTILITY_DEPTH {
                let futility_value = node.static_eval
                    + move_futility_margin(predicted_depth, move_count)
                    + st.history.gains.value(pos.moved_piece(mv), mv.to());
                if futility_value < beta {
                    // 読まなかった手も見積もりの値までは取れるものとして fail-soft の値に反映する
                    best_value = best_value.max(futility_value);
                    if let Some(sp) = sp {
                        let mut s = sp.state.lock();
                        if best_value > s.best_value {
                            s.best_value = best_value;
                        }
                    }
                    inc_stat!(st, move_loop_pruned);
                    continue;
                }
            }

            // SEE が負の手
            if predicted_depth < SEE_PRUNING_DEPTH && !pos.see_ge(mv, Value::ZERO) {
                inc_stat!(st, move_loop_pruned);
                continue;
            }
        }

        let pv_move = pv_node && move_count == 1;
        st.stack[cur].current_move = mv;
        if sp.is_none() && !capture_or_promotion && quiets_searched.len() < 64 {
            quiets_searched.push(mv);
        }

        // Step 14. 指し手を進める
        pos.do_move(mv);

        let mut value = -Value::INFINITE;
        let full_depth_search;

        // Step 15. Late move reduction
        let killers = st.stack[cur].killers;
        if selective
            && depth > 3
            && !pv_move
            && !capture_or_promotion
            && !dangerous
            && mv != node.tt_move
            && mv != killers[0]
            && mv != killers[1]
        {
            let mut r = reduction(pv_node, depth, move_count);
            if node.counter_moves.contains(&mv) {
                r = (r - 1).max(0);
            }
            st.stack[cur].reduction = r;
            if r != 0 {
                inc_stat!(st, lmr_applied);
            }
            let d = (new_depth - r).max(1);
            if let Some(sp) = sp {
                alpha = sp.state.lock().alpha;
            }
            value = -search(st, ctx, pos, NodeType::NonPV, ply + 1, -(alpha + 1), -alpha, d);
            full_depth_search = value > alpha && r != 0;
            if full_depth_search {
                inc_stat!(st, lmr_research);
            }
            st.stack[cur].reduction = 0;
        } else {
            full_depth_search = !pv_move;
        }

        // Step 16. 削減なしの null window 探索
        if full_depth_search {
            if let Some(sp) = sp {
                alpha = sp.state.lock().alpha;
            }
            value = if new_depth < 1 {
                -qsearch(st, ctx, pos, NodeType::NonPV, ply + 1, -(alpha + 1), -alpha, 0)
            } else {
                -search(st, ctx, pos, NodeType::NonPV, ply + 1, -(alpha + 1), -alpha, new_depth)
            };
        }

        // PVノードでは最初の手と alpha を更新した手を全幅の窓で読み直す
        if pv_node {
            if let Some(sp) = sp {
                alpha = sp.state.lock().alpha;
            }
            if pv_move || (value > alpha && (root_node || value < beta)) {
                value = if new_depth < 1 {
                    -qsearch(st, ctx, pos, NodeType::PV, ply + 1, -beta, -alpha, 0)
                } else {
                    -search(st, ctx, pos, NodeType::PV, ply + 1, -beta, -alpha, new_depth)
                };
            }
        }

        // Step 17. 指し手を戻す
        pos.undo_move(mv);

        // Step 18. 最善手の更新
        let mut sp_state = sp.map(|sp| sp.state.lock());
        if let Some(s) = &sp_state {
            best_value = s.best_value;
            alpha = s.alpha;
        }

        // 停止後の値は信用できない
        if ctx.signals.stopped() || st.cutoff_occurred() {
            return value;
        }

        if root_node {
            let child_pv = st.stack[cur + 1].pv.clone();
            let sel_depth = st.sel_depth;
            let rms = match sp_state.as_mut() {
                Some(s) => s.root_moves.as_mut(),
                None => Some(&mut st.root_moves),
            };
            if let Some(rm) = rms.and_then(|rms| rms.find_mut(mv)) {
                if pv_move || value > alpha {
                    rm.score = value;
                    rm.sel_depth = sel_depth;
                    rm.set_pv(mv, &child_pv);
                    // 2手目以降が PV になったら最善手が変わった
                    if !pv_move && ctx.limits.multi_pv <= 1 {
                        ctx.best_move_changes.fetch_add(1, Ordering::Relaxed);
                    }
                } else {
                    // PV 以外の手のスコアは信用できないので最下位に送る
                    rm.score = -Value::INFINITE;
                }
            }
        }

        if value > best_value {
            best_value = value;
            if let Some(s) = sp_state.as_mut() {
                s.best_value = value;
            }

            if value > alpha {
                best_move = mv;
                if let Some(s) = sp_state.as_mut() {
                    s.best_move = mv;
                }

                if pv_node && value < beta {
                    alpha = value;
                    match sp_state.as_mut() {
                        Some(s) => {
                            s.alpha = value;
                            s.pv.clear();
                            s.pv.push(mv);
                            s.pv.extend_from_slice(&st.stack[cur + 1].pv);
                        }
                        None => update_pv(&mut st.stack, cur, mv),
                    }
                } else {
                    // fail high
                    if let Some(sp) = sp {
                        sp.cutoff.store(true, Ordering::Release);
                    }
                    inc_stat_by_depth!(st, cutoff_by_depth, depth);
                    if move_count == 1 {
                        inc_stat_by_depth!(st, first_move_cutoff_by_depth, depth);
                    }
                    break;
                }
            }
        }
        drop(sp_state);

        // Step 19. 分岐（残りの手を他のスレッドと分担する）
        if sp.is_none()
            && depth >= ctx.options.min_split_depth
            && best_value < beta
            && node.excluded.is_none()
            && st.pool.size() > 1
            && !ctx.signals.stopped()
            && !st.cutoff_occurred()
            && st.pool.slots[st.idx].split_point_count() < MAX_SPLITPOINTS_PER_THREAD
            && st.pool.available_slave_exists(st.idx)
        {
            let params = SplitParams {
                node_type: nt,
                ply,
                depth,
                alpha,
                beta,
                best_value,
                best_move,
                move_count,
                static_eval: node.static_eval,
                tt_move: node.tt_move,
                threat_move: node.threat_move,
                killers: st.stack[cur].killers,
                counter_moves: node.counter_moves,
            };
            if let Some(outcome) = split(st, ctx, pos, params, picker) {
                best_value = outcome.best_value;
                best_move = outcome.best_move;
                move_count = outcome.move_count;
                if pv_node && !outcome.pv.is_empty() {
                    st.stack[cur].pv = outcome.pv;
                }
                break;
            }
        }
    }

    if sp.is_some() {
        return best_value;
    }

    // Step 20. 詰み・ステイルメイトの判定と置換表への保存
    if move_count == 0 {
        if node.excluded.is_some() {
            return alpha;
        }
        let v = if in_check { Value::mated_in(ply) } else { Value::DRAW };
        ctx.tt.store(
            node.key,
            value_to_tt(v, ply),
            Bound::Exact,
            depth,
            Move::NONE,
            node.static_eval,
        );
        return v;
    }

    // すべての手が枝刈りされた
    if best_value == -Value::INFINITE {
        best_value = alpha;
    }

    if ctx.signals.stopped() || st.cutoff_occurred() {
        return best_value;
    }

    let bound = if best_value >= beta {
        Bound::Lower
    } else if pv_node && best_move.is_some() {
        Bound::Exact
    } else {
        Bound::Upper
    };
    ctx.tt.store(
        node.key,
        value_to_tt(best_value, ply),
        bound,
        depth,
        best_move,
        node.static_eval,
    );

    // 静かな手で beta カットしたら、キラー・履歴・カウンター手を更新する
    if best_value >= beta && !in_check && !pos.is_capture_or_promotion(best_move) {
        st.stack[cur].update_killers(best_move);
        let bonus = stat_bonus(depth);
        st.history.main.update(pos.moved_piece(best_move), best_move.to(), bonus);
        for &q in quiets_searched.iter().filter(|&&q| q != best_move) {
            st.history.main.update(pos.moved_piece(q), q.to(), -bonus);
        }
        if node.prev_move.is_ok() {
            let to = node.prev_move.to();
            st.history.counter_moves.update(pos.piece_on(to), to, best_move);
        }
    }

    best_value
}
