//! 枝刈りヘルパー群
//!
//! - Razoring / Futility のマージン
//! - Move count pruning の手数
//! - LMR の削減量
//! - null move の脅威手との関係判定

use crate::position::Position;
use crate::types::{Depth, Move, Square, Value};
use std::sync::LazyLock;

// =============================================================================
// Razoring / Futility
// =============================================================================

/// Razoring を行う最大深さ（未満）
pub(super) const RAZOR_DEPTH: Depth = 4;

/// Futility pruning を行う最大深さ（未満）
pub(super) const FUTILITY_DEPTH: Depth = 7;

/// Move count pruning を行う最大深さ（未満）
pub(super) const MOVE_COUNT_PRUNING_DEPTH: Depth = 16;

/// SEE による枝刈りを行う予測深さ（未満）
pub(super) const SEE_PRUNING_DEPTH: Depth = 4;

#[inline]
pub(super) fn razor_margin(depth: Depth) -> Value {
    Value::new(250 + 16 * depth)
}

/// 静的評価による枝刈りのマージン
#[inline]
pub(super) fn futility_margin(depth: Depth) -> Value {
    Value::new(80 * depth.max(1))
}

/// 指し手ごとの futility マージン（後の手ほど小さい）
#[inline]
pub(super) fn move_futility_margin(depth: Depth, move_count: i32) -> Value {
    Value::new(80 * depth.max(1) - 4 * move_count.min(63) + 45)
}

/// この手数を超えた静かな手は読まない
#[inline]
pub(super) fn futility_move_count(depth: Depth) -> i32 {
    3 + depth * depth
}

// =============================================================================
// LMR
// =============================================================================

/// Reduction テーブル [pv][depth][move_count]
static REDUCTIONS: LazyLock<[[[u8; 64]; 64]; 2]> = LazyLock::new(|| {
    let mut table = [[[0u8; 64]; 64]; 2];
    for d in 1..64 {
        for mc in 1..64 {
            let lr = (d as f64).ln() * (mc as f64).ln();
            let non_pv = 0.33 + lr / 2.25;
            let pv = lr / 3.0;
            table[0][d][mc] = if non_pv >= 1.0 { non_pv.floor() as u8 } else { 0 };
            table[1][d][mc] = if pv >= 1.0 { pv.floor() as u8 } else { 0 };
        }
    }
    table
});

/// LMR の削減量（ply）
#[inline]
pub(super) fn reduction(pv_node: bool, depth: Depth, move_count: i32) -> Depth {
    if depth <= 0 || move_count <= 0 {
        return 0;
    }
    let d = depth.min(63) as usize;
    let mc = move_count.min(63) as usize;
    Depth::from(REDUCTIONS[pv_node as usize][d][mc])
}

// =============================================================================
// 脅威手との関係
// =============================================================================

/// `sq` が `a` と `b` の間（両端を含まない）にあるか
fn between(a: Square, b: Square, sq: Square) -> bool {
    let (af, ar) = (i32::from(a.file()), i32::from(a.rank()));
    let (bf, br) = (i32::from(b.file()), i32::from(b.rank()));
    let (df, dr) = (bf - af, br - ar);
    if (df == 0 && dr == 0) || (df != 0 && dr != 0 && df.abs() != dr.abs()) {
        return false;
    }
    let steps = df.abs().max(dr.abs());
    let (sf, sr) = (df.signum(), dr.signum());
    (1..steps).any(|i| Square::from_file_rank((af + sf * i) as u8, (ar + sr * i) as u8) == sq)
}

/// 直前の手 `first` が脅威手 `second` を可能にしたか
///
/// null move が fail low したときに、削減された直前の手と脅威が関係していれば
/// その手を読み直させるために使う。
pub(super) fn allows(first: Move, second: Move) -> bool {
    if !first.is_ok() || !second.is_ok() {
        return false;
    }
    // 同じ駒が続けて動く、または first が空けたマスに入る
    if first.to() == second.from() || second.to() == first.from() {
        return true;
    }
    // first が空けたマスを通り抜ける
    between(second.from(), second.to(), first.from())
}

/// 指し手 `mv` が脅威手 `threat` への対応になっているか
///
/// 狙われている駒を動かす手と、脅威の経路を安全に塞ぐ手は move count pruning しない。
pub(super) fn refutes<P: Position>(pos: &P, mv: Move, threat: Move) -> bool {
    if !threat.is_ok() {
        return false;
    }
    if mv.from() == threat.to() {
        return true;
    }
    between(threat.from(), threat.to(), mv.to()) && pos.see_ge(mv, Value::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> Move {
        Move::from_uci(s).unwrap()
    }

    #[test]
    fn test_reduction_monotonic() {
        assert_eq!(reduction(false, 1, 1), 0);
        assert_eq!(reduction(true, 0, 10), 0);
        assert!(reduction(false, 10, 20) >= reduction(true, 10, 20));
        assert!(reduction(false, 12, 30) >= reduction(false, 6, 30));
        assert!(reduction(false, 12, 30) > 0);
        assert!(reduction(false, 200, 200) < 64);
    }

    #[test]
    fn test_margins() {
        assert!(razor_margin(3) > razor_margin(1));
        assert_eq!(futility_margin(0), futility_margin(1));
        assert!(move_futility_margin(3, 1) > move_futility_margin(3, 20));
        assert_eq!(futility_move_count(2), 7);
    }

    #[test]
    fn test_between() {
        let sq = |s: &str| Square::parse(s).unwrap();
        assert!(between(sq("a1"), sq("a8"), sq("a4")));
        assert!(!between(sq("a1"), sq("a8"), sq("a8")));
        assert!(between(sq("a1"), sq("h8"), sq("d4")));
        assert!(!between(sq("a1"), sq("b3"), sq("a2")));
        assert!(!between(sq("c3"), sq("c3"), sq("c3")));
    }

    #[test]
    fn test_allows() {
        // 同じ駒が続けて動く
        assert!(allows(mv("g1f3"), mv("f3e5")));
        // 空いたマスを通る
        assert!(allows(mv("d2d4"), mv("d1d3")));
        assert!(!allows(mv("a2a3"), mv("h7h6")));
        assert!(!allows(Move::NULL, mv("h7h6")));
    }
}
