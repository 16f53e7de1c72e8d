//! `chess` クレートによる `Position` 実装
//!
//! 盤面は `chess::Board` のコピーメイク方式で、取り消し用に直前の盤面を状態スタックに積む。
//! 50手ルール・千日手・直前の取った駒は `chess::Board` が持たないので、ここで管理する。

use super::{GenType, MoveList, Position};
use crate::types::{Color, ExtMove, Move, Piece, PieceType, Square, Value};
use chess::{BitBoard, Board, CastleRights, ChessMove, EMPTY, MoveGen, Rank};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 局面構築時のエラー
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PositionError {
    #[error("invalid FEN: {0}")]
    InvalidFen(String),
    #[error("invalid move notation: {0}")]
    InvalidMove(String),
    #[error("illegal move in this position: {0}")]
    IllegalMove(String),
}

/// 1手分の取り消し情報
#[derive(Clone)]
struct StateInfo {
    board: Board,
    rule50: i32,
    plies_from_null: i32,
    captured: Option<PieceType>,
}

/// `chess::Board` を包んだ局面
#[derive(Clone)]
pub struct ChessBoard {
    board: Board,
    rule50: i32,
    plies_from_null: i32,
    captured: Option<PieceType>,
    states: Vec<StateInfo>,
}

impl ChessBoard {
    /// 平手初期局面
    pub fn startpos() -> Self {
        Self::from_board(Board::default(), 0)
    }

    /// FENから生成
    pub fn from_fen(fen: &str) -> Result<Self, PositionError> {
        let board =
            Board::from_str(fen).map_err(|_| PositionError::InvalidFen(fen.to_string()))?;
        let fields: Vec<&str> = fen.split_whitespace().collect();
        let rule50 = match fields.get(4) {
            Some(s) => s.parse::<i32>().map_err(|_| PositionError::InvalidFen(fen.to_string()))?,
            None => 0,
        };
        Ok(Self::from_board(board, rule50))
    }

    fn from_board(board: Board, rule50: i32) -> Self {
        Self {
            board,
            rule50,
            plies_from_null: 0,
            captured: None,
            states: Vec::with_capacity(256),
        }
    }

    /// 対局の指し手を座標表記で進める（千日手検出のため履歴に残る）
    pub fn push_uci(&mut self, s: &str) -> Result<(), PositionError> {
        let mv = Move::from_uci(s).ok_or_else(|| PositionError::InvalidMove(s.to_string()))?;
        if !self.is_legal(mv) {
            return Err(PositionError::IllegalMove(s.to_string()));
        }
        self.do_move(mv);
        Ok(())
    }

    /// 内部の `chess::Board`
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// 全合法手
    pub fn legal_moves(&self) -> Vec<Move> {
        MoveGen::new_legal(&self.board).map(from_chess_move).collect()
    }

    /// 駒取り、またはクイーンへの昇格
    fn is_tactical(&self, mv: Move) -> bool {
        mv.promotion() == Some(PieceType::Queen) || self.is_capture(mv)
    }

    fn is_en_passant(&self, mv: Move) -> bool {
        let from = to_chess_square(mv.from());
        let to = to_chess_square(mv.to());
        self.board.piece_on(from) == Some(chess::Piece::Pawn)
            && from.get_file() != to.get_file()
            && self.board.piece_on(to).is_none()
    }

    /// マスに利いている駒（両手番）
    fn attackers_to(&self, sq: chess::Square, occupied: BitBoard) -> BitBoard {
        let b = &self.board;
        let white = *b.color_combined(chess::Color::White);
        let black = *b.color_combined(chess::Color::Black);
        let pawns = *b.pieces(chess::Piece::Pawn);
        let queens = *b.pieces(chess::Piece::Queen);
        let diagonal = *b.pieces(chess::Piece::Bishop) | queens;
        let straight = *b.pieces(chess::Piece::Rook) | queens;

        chess::get_pawn_attacks(sq, chess::Color::Black, pawns & white)
            | chess::get_pawn_attacks(sq, chess::Color::White, pawns & black)
            | (chess::get_knight_moves(sq) & *b.pieces(chess::Piece::Knight))
            | (chess::get_king_moves(sq) & *b.pieces(chess::Piece::King))
            | (chess::get_bishop_moves(sq, occupied) & diagonal)
            | (chess::get_rook_moves(sq, occupied) & straight)
    }

    /// 最も価値の低い駒を選ぶ
    fn least_valuable(&self, candidates: BitBoard) -> Option<(PieceType, chess::Square)> {
        for pt in PieceType::ALL {
            let bb = candidates & *self.board.pieces(to_chess_piece(pt));
            if bb != EMPTY {
                return Some((pt, bb.to_square()));
            }
        }
        None
    }
}

impl Default for ChessBoard {
    fn default() -> Self {
        Self::startpos()
    }
}

impl fmt::Display for ChessBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.board)
    }
}

impl fmt::Debug for ChessBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChessBoard({})", self.board)
    }
}

impl Position for ChessBoard {
    #[inline]
    fn key(&self) -> u64 {
        self.board.get_hash()
    }

    #[inline]
    fn side_to_move(&self) -> Color {
        from_chess_color(self.board.side_to_move())
    }

    #[inline]
    fn in_check(&self) -> bool {
        *self.board.checkers() != EMPTY
    }

    fn piece_on(&self, sq: Square) -> Piece {
        let csq = to_chess_square(sq);
        match (self.board.piece_on(csq), self.board.color_on(csq)) {
            (Some(p), Some(c)) => Piece::new(from_chess_color(c), from_chess_piece(p)),
            _ => Piece::NONE,
        }
    }

    #[inline]
    fn captured_piece_type(&self) -> Option<PieceType> {
        self.captured
    }

    fn generate(&self, gen_type: GenType, list: &mut MoveList) {
        let moves = MoveGen::new_legal(&self.board).map(from_chess_move);
        match gen_type {
            GenType::Captures => {
                list.extend(moves.filter(|&m| self.is_tactical(m)).map(|m| ExtMove::new(m, 0)));
            }
            GenType::Quiets => {
                list.extend(moves.filter(|&m| !self.is_tactical(m)).map(|m| ExtMove::new(m, 0)));
            }
            GenType::QuietChecks => {
                list.extend(
                    moves
                        .filter(|&m| !self.is_tactical(m) && self.gives_check(m))
                        .map(|m| ExtMove::new(m, 0)),
                );
            }
            GenType::Evasions | GenType::All => {
                list.extend(moves.map(|m| ExtMove::new(m, 0)));
            }
        }
    }

    fn pseudo_legal(&self, mv: Move) -> bool {
        if !mv.is_ok() {
            return false;
        }
        let pc = self.piece_on(mv.from());
        if pc.is_none() || pc.color() != self.side_to_move() {
            return false;
        }
        let last_rank = mv.to().relative_rank(self.side_to_move()) == 7;
        let is_pawn = pc.piece_type() == Some(PieceType::Pawn);
        match mv.promotion() {
            Some(PieceType::Pawn | PieceType::King) => return false,
            Some(_) if !(is_pawn && last_rank) => return false,
            None if is_pawn && last_rank => return false,
            _ => {}
        }
        self.board.legal(to_chess_move(mv))
    }

    #[inline]
    fn is_legal(&self, mv: Move) -> bool {
        self.pseudo_legal(mv)
    }

    fn is_capture(&self, mv: Move) -> bool {
        let to = to_chess_square(mv.to());
        match self.board.color_on(to) {
            Some(c) => c != self.board.side_to_move(),
            None => self.is_en_passant(mv),
        }
    }

    fn captured_by(&self, mv: Move) -> Option<PieceType> {
        let to = to_chess_square(mv.to());
        match self.board.piece_on(to) {
            Some(p) => Some(from_chess_piece(p)),
            None if self.is_en_passant(mv) => Some(PieceType::Pawn),
            None => None,
        }
    }

    fn gives_check(&self, mv: Move) -> bool {
        *self.board.make_move_new(to_chess_move(mv)).checkers() != EMPTY
    }

    fn is_passed_pawn_push(&self, mv: Move) -> bool {
        if self.moved_piece(mv).piece_type() != Some(PieceType::Pawn) {
            return false;
        }
        let us = self.side_to_move();
        let to = mv.to();
        let them = to_chess_color(!us);
        let enemy_pawns = *self.board.pieces(chess::Piece::Pawn) & *self.board.color_combined(them);
        !enemy_pawns.into_iter().any(|csq| {
            let sq = Square::new(csq.to_index() as u8);
            sq.relative_rank(us) > to.relative_rank(us) && sq.file().abs_diff(to.file()) <= 1
        })
    }

    fn has_pawn_on_7th(&self, c: Color) -> bool {
        let rank = match c {
            Color::White => Rank::Seventh,
            Color::Black => Rank::Second,
        };
        let pawns =
            *self.board.pieces(chess::Piece::Pawn) & *self.board.color_combined(to_chess_color(c));
        pawns & chess::get_rank(rank) != EMPTY
    }

    fn can_castle(&self, c: Color) -> bool {
        self.board.castle_rights(to_chess_color(c)) != CastleRights::NoRights
    }

    fn see(&self, mv: Move) -> Value {
        let from = to_chess_square(mv.from());
        let to = to_chess_square(mv.to());
        let Some(mover) = self.board.piece_on(from) else {
            return Value::ZERO;
        };
        // キャスリングは駒交換にならない
        if mover == chess::Piece::King
            && (from.get_file().to_index() as i32 - to.get_file().to_index() as i32).abs() == 2
        {
            return Value::ZERO;
        }

        let mut occupied = *self.board.combined();
        let mut gain = [0i32; 32];
        gain[0] = match self.board.piece_on(to) {
            Some(p) => from_chess_piece(p).value().raw(),
            None => 0,
        };
        if self.is_en_passant(mv) {
            let captured_sq = chess::Square::make_square(from.get_rank(), to.get_file());
            occupied ^= BitBoard::from_square(captured_sq);
            gain[0] = PieceType::Pawn.value().raw();
        }
        let mut on_square = from_chess_piece(mover).value().raw();
        if let Some(promo) = mv.promotion() {
            gain[0] += promo.value().raw() - PieceType::Pawn.value().raw();
            on_square = promo.value().raw();
        }

        let mut from_bb = BitBoard::from_square(from);
        let mut side = self.board.side_to_move();
        let mut d = 0usize;
        loop {
            d += 1;
            gain[d] = on_square - gain[d - 1];
            if (-gain[d - 1]).max(gain[d]) < 0 || d == gain.len() - 1 {
                break;
            }
            occupied ^= from_bb;
            side = !side;
            let attackers = self.attackers_to(to, occupied) & occupied;
            let Some((pt, sq)) = self.least_valuable(attackers & *self.board.color_combined(side))
            else {
                break;
            };
            if pt == PieceType::King && attackers & *self.board.color_combined(!side) != EMPTY {
                break;
            }
            on_square = pt.value().raw();
            from_bb = BitBoard::from_square(sq);
        }
        while d > 1 {
            d -= 1;
            gain[d - 1] = -(-gain[d - 1]).max(gain[d]);
        }
        Value::new(gain[0])
    }

    fn non_pawn_material(&self, c: Color) -> Value {
        let ours = *self.board.color_combined(to_chess_color(c));
        let total: i32 = [PieceType::Knight, PieceType::Bishop, PieceType::Rook, PieceType::Queen]
            .iter()
            .map(|&pt| {
                let n = (*self.board.pieces(to_chess_piece(pt)) & ours).popcnt() as i32;
                n * pt.value().raw()
            })
            .sum();
        Value::new(total)
    }

    fn do_move(&mut self, mv: Move) {
        debug_assert!(mv.is_ok());
        let captured = self.captured_by(mv);
        let is_pawn = self.moved_piece(mv).piece_type() == Some(PieceType::Pawn);
        let next = self.board.make_move_new(to_chess_move(mv));
        self.states.push(StateInfo {
            board: self.board,
            rule50: self.rule50,
            plies_from_null: self.plies_from_null,
            captured: self.captured,
        });
        self.board = next;
        self.rule50 = if captured.is_some() || is_pawn { 0 } else { self.rule50 + 1 };
        self.plies_from_null += 1;
        self.captured = captured;
    }

    fn undo_move(&mut self, _mv: Move) {
        if let Some(st) = self.states.pop() {
            self.board = st.board;
            self.rule50 = st.rule50;
            self.plies_from_null = st.plies_from_null;
            self.captured = st.captured;
        }
    }

    fn do_null_move(&mut self) {
        debug_assert!(!self.in_check());
        let next = match self.board.null_move() {
            Some(b) => b,
            None => {
                log::warn!("null move requested while in check: {}", self.board);
                self.board
            }
        };
        self.states.push(StateInfo {
            board: self.board,
            rule50: self.rule50,
            plies_from_null: self.plies_from_null,
            captured: self.captured,
        });
        self.board = next;
        self.rule50 += 1;
        self.plies_from_null = 0;
        self.captured = None;
    }

    fn undo_null_move(&mut self) {
        self.undo_move(Move::NULL);
    }

    fn is_draw(&self) -> bool {
        if self.rule50 >= 100 && (!self.in_check() || MoveGen::new_legal(&self.board).len() > 0) {
            return true;
        }

        // 同一局面は手番が同じ2手おきにしか現れない
        let key = self.key();
        let end = self.rule50.min(self.plies_from_null) as usize;
        let mut i = 4;
        while i <= end && i <= self.states.len() {
            if self.states[self.states.len() - i].board.get_hash() == key {
                return true;
            }
            i += 2;
        }

        let pawns = *self.board.pieces(chess::Piece::Pawn);
        pawns == EMPTY
            && self.non_pawn_material(Color::White) + self.non_pawn_material(Color::Black)
                <= PieceType::Bishop.value()
    }
}

// ============================================================================
// 型変換
// ============================================================================

#[inline]
fn to_chess_square(sq: Square) -> chess::Square {
    chess::ALL_SQUARES[sq.index()]
}

#[inline]
fn from_chess_color(c: chess::Color) -> Color {
    match c {
        chess::Color::White => Color::White,
        chess::Color::Black => Color::Black,
    }
}

#[inline]
fn to_chess_color(c: Color) -> chess::Color {
    match c {
        Color::White => chess::Color::White,
        Color::Black => chess::Color::Black,
    }
}

#[inline]
fn from_chess_piece(p: chess::Piece) -> PieceType {
    match p {
        chess::Piece::Pawn => PieceType::Pawn,
        chess::Piece::Knight => PieceType::Knight,
        chess::Piece::Bishop => PieceType::Bishop,
        chess::Piece::Rook => PieceType::Rook,
        chess::Piece::Queen => PieceType::Queen,
        chess::Piece::King => PieceType::King,
    }
}

#[inline]
fn to_chess_piece(pt: PieceType) -> chess::Piece {
    match pt {
        PieceType::Pawn => chess::Piece::Pawn,
        PieceType::Knight => chess::Piece::Knight,
        PieceType::Bishop => chess::Piece::Bishop,
        PieceType::Rook => chess::Piece::Rook,
        PieceType::Queen => chess::Piece::Queen,
        PieceType::King => chess::Piece::King,
    }
}

#[inline]
fn to_chess_move(mv: Move) -> ChessMove {
    ChessMove::new(
        to_chess_square(mv.from()),
        to_chess_square(mv.to()),
        mv.promotion().map(to_chess_piece),
    )
}

#[inline]
fn from_chess_move(cm: ChessMove) -> Move {
    let from = Square::new(cm.get_source().to_index() as u8);
    let to = Square::new(cm.get_dest().to_index() as u8);
    match cm.get_promotion() {
        Some(p) => Move::new_promotion(from, to, from_chess_piece(p)),
        None => Move::new(from, to),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mv(s: &str) -> Move {
        Move::from_uci(s).unwrap()
    }

    #[test]
    fn test_startpos_moves() {
        let pos = ChessBoard::startpos();
        let mut list = MoveList::new();
        pos.generate(GenType::All, &mut list);
        assert_eq!(list.len(), 20);

        let mut captures = MoveList::new();
        pos.generate(GenType::Captures, &mut captures);
        assert!(captures.is_empty());
    }

    #[test]
    fn test_fen_errors() {
        assert!(matches!(ChessBoard::from_fen("not a fen"), Err(PositionError::InvalidFen(_))));
        let mut pos = ChessBoard::startpos();
        assert!(matches!(pos.push_uci("e2e5"), Err(PositionError::IllegalMove(_))));
        assert!(matches!(pos.push_uci("zz"), Err(PositionError::InvalidMove(_))));
    }

    #[test]
    fn test_do_undo_restores_key() {
        let mut pos = ChessBoard::startpos();
        let key = pos.key();
        pos.do_move(mv("e2e4"));
        assert_ne!(pos.key(), key);
        assert_eq!(pos.side_to_move(), Color::Black);
        pos.undo_move(mv("e2e4"));
        assert_eq!(pos.key(), key);
    }

    #[test]
    fn test_pseudo_legal_rejects_garbage() {
        let pos = ChessBoard::startpos();
        assert!(pos.pseudo_legal(mv("g1f3")));
        assert!(!pos.pseudo_legal(mv("g1g3")));
        assert!(!pos.pseudo_legal(mv("e7e5")));
        assert!(!pos.pseudo_legal(Move::NONE));
        assert!(!pos.pseudo_legal(Move::NULL));
        assert!(!pos.pseudo_legal(mv("e2e4q")));
        for raw in [0x7FFFu16, 0x1234, 0xFFFF, 0x3000] {
            let _ = pos.pseudo_legal(Move::from_u16(raw));
        }
    }

    #[test]
    fn test_see_values() {
        // 守られていないポーンをナイトで取る
        let pos = ChessBoard::from_fen("4k3/8/8/3p4/8/4N3/8/4K3 w - - 0 1").unwrap();
        assert_eq!(pos.see(mv("e3d5")), PieceType::Pawn.value());

        // ポーンに守られたポーンをクイーンで取ると損
        let pos = ChessBoard::from_fen("4k3/8/2p5/3p4/8/8/3Q4/4K3 w - - 0 1").unwrap();
        assert_eq!(
            pos.see(mv("d2d5")),
            PieceType::Pawn.value() - PieceType::Queen.value()
        );
        assert!(!pos.see_ge(mv("d2d5"), Value::ZERO));

        // X線: ルーク2枚で守られたポーンへの取り合い
        let pos = ChessBoard::from_fen("3rk3/3r4/8/3p4/8/8/3R4/3RK3 w - - 0 1").unwrap();
        assert_eq!(pos.see(mv("d2d5")), PieceType::Pawn.value() - PieceType::Rook.value());
    }

    #[test]
    fn test_en_passant_is_capture() {
        let pos =
            ChessBoard::from_fen("4k3/8/8/3pP3/8/8/8/4K3 w - d6 0 2").unwrap();
        let ep = mv("e5d6");
        assert!(pos.is_legal(ep));
        assert!(pos.is_capture(ep));
        assert_eq!(pos.captured_by(ep), Some(PieceType::Pawn));
        assert_eq!(pos.see(ep), PieceType::Pawn.value());
    }

    #[test]
    fn test_draw_rules() {
        // 駒不足
        let pos = ChessBoard::from_fen("4k3/8/8/8/8/8/8/4KB2 w - - 0 1").unwrap();
        assert!(pos.is_draw());

        // 50手ルール
        let pos = ChessBoard::from_fen("4k3/8/8/8/8/8/8/R3K3 w - - 100 80").unwrap();
        assert!(pos.is_draw());

        // 千日手
        let mut pos = ChessBoard::startpos();
        assert!(!pos.is_draw());
        for m in ["g1f3", "g8f6", "f3g1", "f6g8"] {
            pos.push_uci(m).unwrap();
        }
        assert!(pos.is_draw());
    }

    #[test]
    fn test_passed_pawn_and_seventh() {
        let pos = ChessBoard::from_fen("4k3/1P6/8/8/8/8/6p1/4K3 w - - 0 1").unwrap();
        assert!(pos.has_pawn_on_7th(Color::White));
        assert!(pos.has_pawn_on_7th(Color::Black));
        assert!(pos.is_passed_pawn_push(mv("b7b8q")));

        let pos = ChessBoard::from_fen("4k3/2p5/8/8/8/8/1P6/4K3 w - - 0 1").unwrap();
        assert!(!pos.is_passed_pawn_push(mv("b2b4")));
    }

    #[test]
    fn test_null_move() {
        let mut pos = ChessBoard::startpos();
        let key = pos.key();
        pos.do_null_move();
        assert_eq!(pos.side_to_move(), Color::Black);
        assert_eq!(pos.captured_piece_type(), None);
        pos.undo_null_move();
        assert_eq!(pos.key(), key);
    }

    #[test]
    fn test_material() {
        let pos = ChessBoard::startpos();
        let npm = 2 * 320 + 2 * 330 + 2 * 500 + 900;
        assert_eq!(pos.non_pawn_material(Color::White), Value::new(npm));
        assert_eq!(pos.non_pawn_material(Color::Black), Value::new(npm));
    }
}
