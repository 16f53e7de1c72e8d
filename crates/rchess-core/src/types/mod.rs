//! 基本型
//!
//! 評価値・指し手・駒・マスなど、探索全体で使う小さな値型。

mod bound;
mod moves;
mod piece;
mod square;
mod value;

pub use bound::Bound;
pub use moves::{ExtMove, Move};
pub use piece::{piece_type_value, Color, Piece, PieceType};
pub use square::Square;
pub use value::Value;

/// 探索深さ（plyと同単位）
pub type Depth = i32;

/// 静止探索で王手も生成する深さ
pub const DEPTH_QS_CHECKS: Depth = 0;
/// 静止探索で駒取りのみ生成する深さ
pub const DEPTH_QS_NO_CHECKS: Depth = -1;
/// 静止探索で取り返しのみ生成する深さ
pub const DEPTH_QS_RECAPTURES: Depth = -5;
/// 深さなし（評価値のみの置換表エントリ）
pub const DEPTH_NONE: Depth = -6;

/// 最大探索深さ
pub const MAX_PLY: i32 = 128;
/// 1局面の最大指し手数
pub const MAX_MOVES: usize = 256;

/// 置換表に格納する値へ変換（詰みスコアを「この局面からの手数」に直す）
#[inline]
pub fn value_to_tt(v: Value, ply: i32) -> Value {
    debug_assert!(v != Value::NONE);
    if v >= Value::MATE_IN_MAX_PLY {
        v + ply
    } else if v <= Value::MATED_IN_MAX_PLY {
        v - ply
    } else {
        v
    }
}

/// 置換表の値から探索用の値へ変換（`value_to_tt` の逆変換）
#[inline]
pub fn value_from_tt(v: Value, ply: i32) -> Value {
    if v == Value::NONE {
        Value::NONE
    } else if v >= Value::MATE_IN_MAX_PLY {
        v - ply
    } else if v <= Value::MATED_IN_MAX_PLY {
        v + ply
    } else {
        v
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_tt_roundtrip_mate() {
        let v = Value::mate_in(7);
        let stored = value_to_tt(v, 3);
        assert_eq!(stored, Value::mate_in(4));
        assert_eq!(value_from_tt(stored, 3), v);

        let v = Value::mated_in(6);
        assert_eq!(value_from_tt(value_to_tt(v, 2), 2), v);
    }

    #[test]
    fn test_value_tt_plain() {
        let v = Value::new(123);
        assert_eq!(value_to_tt(v, 10), v);
        assert_eq!(value_from_tt(Value::NONE, 10), Value::NONE);
    }
}
