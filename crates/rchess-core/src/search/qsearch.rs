//! 静止探索
//!
//! 駒取り（深さ0では王手も）だけを読んで局面を落ち着かせる。
//! 王手されている局面ではすべての回避手を読む。

use super::alpha_beta::{SearchState, ss, tt_cutoff_allowed, update_pv};
use super::context::SearchContext;
use super::movepicker::MovePicker;
use super::stats::inc_stat;
use super::types::NodeType;
use crate::eval::Evaluator;
use crate::position::Position;
use crate::types::{
    Bound, DEPTH_NONE, DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS, Depth, MAX_PLY, Move, PieceType,
    Square, Value, piece_type_value, value_from_tt, value_to_tt,
};
use std::sync::Arc;

/// 静止探索の futility マージン
const QS_FUTILITY_MARGIN: i32 = 128;

/// 静止探索
///
/// `depth` は 0 以下。0 では王手になる静かな手も読む。
#[allow(clippy::too_many_arguments)]
pub(crate) fn qsearch<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
    pos: &mut P,
    nt: NodeType,
    ply: i32,
    mut alpha: Value,
    beta: Value,
    depth: Depth,
) -> Value {
    debug_assert!(alpha >= -Value::INFINITE && alpha < beta && beta <= Value::INFINITE);
    debug_assert!(depth <= 0);

    let pv_node = nt.is_pv();
    let in_check = pos.in_check();
    let cur = ss(ply);
    let old_alpha = alpha;

    st.count_node();
    inc_stat!(st, qs_nodes);
    st.stack[cur].current_move = Move::NONE;
    if pv_node {
        st.stack[cur].pv.clear();
        if st.sel_depth < ply + 1 {
            st.sel_depth = ply + 1;
        }
    }

    if pos.is_draw() || ply >= MAX_PLY {
        return Value::DRAW;
    }

    // 置換表の深さは王手を読むかどうかの2段階
    let tt_depth =
        if in_check || depth >= DEPTH_QS_CHECKS { DEPTH_QS_CHECKS } else { DEPTH_QS_NO_CHECKS };
    let key = pos.key();
    let tte = ctx.tt.probe(key);
    let tt_move = tte.map_or(Move::NONE, |t| t.mv);
    let tt_value = tte.map_or(Value::NONE, |t| value_from_tt(t.value, ply));

    if let Some(t) = tte
        && t.depth >= tt_depth
        && tt_value != Value::NONE
        && tt_cutoff_allowed(pv_node, t.bound, tt_value, beta)
    {
        st.stack[cur].current_move = t.mv;
        return tt_value;
    }

    // Stand pat
    let us = pos.side_to_move();
    let mut best_value;
    let futility_base;
    let enough_material;
    if in_check {
        st.stack[cur].static_eval = Value::NONE;
        best_value = -Value::INFINITE;
        futility_base = -Value::INFINITE;
        enough_material = false;
    } else {
        let static_eval = match tte {
            Some(t) if t.eval != Value::NONE => t.eval,
            _ => ctx.evaluator.evaluate(pos),
        };
        st.stack[cur].static_eval = static_eval;
        best_value = static_eval;

        if best_value >= beta {
            if tte.is_none() {
                ctx.tt.store(
                    key,
                    value_to_tt(best_value, ply),
                    Bound::Lower,
                    DEPTH_NONE,
                    Move::NONE,
                    static_eval,
                );
            }
            return best_value;
        }
        if pv_node && best_value > alpha {
            alpha = best_value;
        }
        futility_base = best_value + QS_FUTILITY_MARGIN;
        enough_material = pos.non_pawn_material(us) > PieceType::Rook.value();
    }
    let static_eval = st.stack[cur].static_eval;
    let selective = !ctx.options.full_width;

    // 深い静止探索では直前の移動先への取り返しだけを読む
    let prev_move = st.stack[cur - 1].current_move;
    let recapture_sq = if prev_move.is_ok() { prev_move.to() } else { Square::A1 };
    let mut picker = MovePicker::new_qsearch(pos, tt_move, depth, recapture_sq);
    let mut best_move = Move::NONE;

    while let Some(mv) = picker.next_move(pos, &st.history) {
        let gives_check = pos.gives_check(mv);

        // Futility pruning（取る駒の価値を足しても alpha に届かない）
        if selective
            && !pv_node
            && !in_check
            && !gives_check
            && mv != tt_move
            && enough_material
            && !mv.is_promotion()
            && !pos.is_passed_pawn_push(mv)
        {
            let futility_value = futility_base + piece_type_value(pos.captured_by(mv));
            if futility_value < beta {
                best_value = best_value.max(futility_value);
                continue;
            }
            // 駒得にならない取り合いは読まない
            if futility_base < beta && depth < DEPTH_QS_CHECKS && !pos.see_ge(mv, Value::new(1)) {
                best_value = best_value.max(futility_base);
                continue;
            }
        }

        // 回避手のうち、駒を取らず詰みも見えていない静かな手は SEE で絞る
        let evasion_prunable = in_check
            && best_value > Value::MATED_IN_MAX_PLY
            && !pos.is_capture(mv)
            && !pos.can_castle(us);

        // SEE が負の手
        if selective
            && !pv_node
            && (!in_check || evasion_prunable)
            && mv != tt_move
            && !mv.is_promotion()
            && !pos.see_ge(mv, Value::ZERO)
        {
            continue;
        }

        if !pos.is_legal(mv) {
            continue;
        }

        st.stack[cur].current_move = mv;
        pos.do_move(mv);
        let value = -qsearch(st, ctx, pos, nt, ply + 1, -beta, -alpha, depth - 1);
        pos.undo_move(mv);

        if value > best_value {
            best_value = value;
            if value > alpha {
                if pv_node && value < beta {
                    alpha = value;
                    best_move = mv;
                    update_pv(&mut st.stack, cur, mv);
                } else {
                    ctx.tt.store(
                        key,
                        value_to_tt(value, ply),
                        Bound::Lower,
                        tt_depth,
                        mv,
                        static_eval,
                    );
                    return value;
                }
            }
        }
    }

    // 王手されていて指せる手がない
    if in_check && best_value == -Value::INFINITE {
        return Value::mated_in(ply);
    }

    let bound = if pv_node && best_value > old_alpha { Bound::Exact } else { Bound::Upper };
    ctx.tt.store(key, value_to_tt(best_value, ply), bound, tt_depth, best_move, static_eval);

    best_value
}
