//! 駒割り + 駒位置テーブルによる評価

use super::Evaluator;
use crate::position::ChessBoard;
use crate::types::{PieceType, Value};
use chess::{Color, Piece};

/// 手番ボーナス
const TEMPO: i32 = 10;

/// 駒割り + 駒位置テーブル
#[derive(Debug, Clone, Copy, Default)]
pub struct MaterialEvaluator;

impl MaterialEvaluator {
    pub fn new() -> Self {
        Self
    }
}

// 白から見たテーブル（a8..h8 が先頭行）。黒は上下反転して引く。
#[rustfmt::skip]
const PAWN_PST: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
    50, 50, 50, 50, 50, 50, 50, 50,
    10, 10, 20, 30, 30, 20, 10, 10,
     5,  5, 10, 25, 25, 10,  5,  5,
     0,  0,  0, 20, 20,  0,  0,  0,
     5, -5,-10,  0,  0,-10, -5,  5,
     5, 10, 10,-20,-20, 10, 10,  5,
     0,  0,  0,  0,  0,  0,  0,  0,
];

#[rustfmt::skip]
const KNIGHT_PST: [i32; 64] = [
   -50,-40,-30,-30,-30,-30,-40,-50,
   -40,-20,  0,  0,  0,  0,-20,-40,
   -30,  0, 10, 15, 15, 10,  0,-30,
   -30,  5, 15, 20, 20, 15,  5,-30,
   -30,  0, 15, 20, 20, 15,  0,-30,
   -30,  5, 10, 15, 15, 10,  5,-30,
   -40,-20,  0,  5,  5,  0,-20,-40,
   -50,-40,-30,-30,-30,-30,-40,-50,
];

#[rustfmt::skip]
const BISHOP_PST: [i32; 64] = [
   -20,-10,-10,-10,-10,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5, 10, 10,  5,  0,-10,
   -10,  5,  5, 10, 10,  5,  5,-10,
   -10,  0, 10, 10, 10, 10,  0,-10,
   -10, 10, 10, 10, 10, 10, 10,-10,
   -10,  5,  0,  0,  0,  0,  5,-10,
   -20,-10,-10,-10,-10,-10,-10,-20,
];

#[rustfmt::skip]
const ROOK_PST: [i32; 64] = [
     0,  0,  0,  0,  0,  0,  0,  0,
     5, 10, 10, 10, 10, 10, 10,  5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
    -5,  0,  0,  0,  0,  0,  0, -5,
     0,  0,  0,  5,  5,  0,  0,  0,
];

#[rustfmt::skip]
const QUEEN_PST: [i32; 64] = [
   -20,-10,-10, -5, -5,-10,-10,-20,
   -10,  0,  0,  0,  0,  0,  0,-10,
   -10,  0,  5,  5,  5,  5,  0,-10,
    -5,  0,  5,  5,  5,  5,  0, -5,
     0,  0,  5,  5,  5,  5,  0, -5,
   -10,  5,  5,  5,  5,  5,  0,-10,
   -10,  0,  5,  0,  0,  0,  0,-10,
   -20,-10,-10, -5, -5,-10,-10,-20,
];

#[rustfmt::skip]
const KING_PST: [i32; 64] = [
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -30,-40,-40,-50,-50,-40,-40,-30,
   -20,-30,-30,-40,-40,-30,-30,-20,
   -10,-20,-20,-20,-20,-20,-20,-10,
    20, 20,  0,  0,  0,  0, 20, 20,
    20, 30, 10,  0,  0, 10, 30, 20,
];

fn table(piece: Piece) -> &'static [i32; 64] {
    match piece {
        Piece::Pawn => &PAWN_PST,
        Piece::Knight => &KNIGHT_PST,
        Piece::Bishop => &BISHOP_PST,
        Piece::Rook => &ROOK_PST,
        Piece::Queen => &QUEEN_PST,
        Piece::King => &KING_PST,
    }
}

fn piece_value(piece: Piece) -> i32 {
    match piece {
        Piece::Pawn => PieceType::Pawn.value().raw(),
        Piece::Knight => PieceType::Knight.value().raw(),
        Piece::Bishop => PieceType::Bishop.value().raw(),
        Piece::Rook => PieceType::Rook.value().raw(),
        Piece::Queen => PieceType::Queen.value().raw(),
        Piece::King => 0,
    }
}

/// テーブルの添字。白は a1=0 を a1 行（最終行）に、黒は上下反転
#[inline]
fn pst_index(sq: chess::Square, color: Color) -> usize {
    let idx = sq.to_index();
    match color {
        Color::White => idx ^ 56,
        Color::Black => idx,
    }
}

impl Evaluator<ChessBoard> for MaterialEvaluator {
    fn evaluate(&self, pos: &ChessBoard) -> Value {
        let board = pos.board();
        let mut score = 0;
        for color in [Color::White, Color::Black] {
            let sign = if color == Color::White { 1 } else { -1 };
            let ours = *board.color_combined(color);
            for piece in chess::ALL_PIECES {
                let pst = table(piece);
                for sq in *board.pieces(piece) & ours {
                    score += sign * (piece_value(piece) + pst[pst_index(sq, color)]);
                }
            }
        }
        let score = if board.side_to_move() == Color::White { score } else { -score };
        Value::new(score + TEMPO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_startpos_is_tempo_only() {
        let pos = ChessBoard::startpos();
        assert_eq!(MaterialEvaluator.evaluate(&pos), Value::new(TEMPO));
    }

    #[test]
    fn test_color_flip_symmetry() {
        let white = ChessBoard::from_fen("4k3/8/8/8/3P4/8/8/R3K3 w - - 0 1").unwrap();
        let black = ChessBoard::from_fen("r3k3/8/8/3p4/8/8/8/4K3 b - - 0 1").unwrap();
        assert_eq!(MaterialEvaluator.evaluate(&white), MaterialEvaluator.evaluate(&black));
    }

    #[test]
    fn test_material_advantage() {
        let pos = ChessBoard::from_fen("4k3/8/8/8/8/8/8/Q3K3 w - - 0 1").unwrap();
        assert!(MaterialEvaluator.evaluate(&pos) > Value::new(800));
        let pos = ChessBoard::from_fen("4k3/8/8/8/8/8/8/Q3K3 b - - 0 1").unwrap();
        assert!(MaterialEvaluator.evaluate(&pos) < Value::new(-800));
    }
}
