//! 探索が合法手以外を指さないことの確認
//!
//! ランダムに進めた局面を、`do_move` で合法性を検査する盤面越しに探索する。

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::IndexedRandom;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rchess_core::position::GenType;
use rchess_core::types::{Piece, PieceType, Square};
use rchess_core::{
    ChessBoard, Color, Engine, EngineOptions, Evaluator, LimitsType, MaterialEvaluator, Move,
    MoveList, Position, Value,
};

static ILLEGAL_MOVES: AtomicUsize = AtomicUsize::new(0);

/// `do_move` に渡された手の合法性を検査する盤面
#[derive(Clone)]
struct CheckedBoard(ChessBoard);

impl Position for CheckedBoard {
    fn key(&self) -> u64 {
        self.0.key()
    }
    fn side_to_move(&self) -> Color {
        self.0.side_to_move()
    }
    fn in_check(&self) -> bool {
        self.0.in_check()
    }
    fn piece_on(&self, sq: Square) -> Piece {
        self.0.piece_on(sq)
    }
    fn captured_piece_type(&self) -> Option<PieceType> {
        self.0.captured_piece_type()
    }
    fn generate(&self, gen_type: GenType, list: &mut MoveList) {
        self.0.generate(gen_type, list)
    }
    fn pseudo_legal(&self, mv: Move) -> bool {
        self.0.pseudo_legal(mv)
    }
    fn is_legal(&self, mv: Move) -> bool {
        self.0.is_legal(mv)
    }
    fn is_capture(&self, mv: Move) -> bool {
        self.0.is_capture(mv)
    }
    fn captured_by(&self, mv: Move) -> Option<PieceType> {
        self.0.captured_by(mv)
    }
    fn gives_check(&self, mv: Move) -> bool {
        self.0.gives_check(mv)
    }
    fn is_passed_pawn_push(&self, mv: Move) -> bool {
        self.0.is_passed_pawn_push(mv)
    }
    fn has_pawn_on_7th(&self, c: Color) -> bool {
        self.0.has_pawn_on_7th(c)
    }
    fn can_castle(&self, c: Color) -> bool {
        self.0.can_castle(c)
    }
    fn see(&self, mv: Move) -> Value {
        self.0.see(mv)
    }
    fn non_pawn_material(&self, c: Color) -> Value {
        self.0.non_pawn_material(c)
    }
    fn do_move(&mut self, mv: Move) {
        if !self.0.legal_moves().contains(&mv) {
            ILLEGAL_MOVES.fetch_add(1, Ordering::Relaxed);
        }
        self.0.do_move(mv)
    }
    fn undo_move(&mut self, mv: Move) {
        self.0.undo_move(mv)
    }
    fn do_null_move(&mut self) {
        self.0.do_null_move()
    }
    fn undo_null_move(&mut self) {
        self.0.undo_null_move()
    }
    fn is_draw(&self) -> bool {
        self.0.is_draw()
    }
}

struct CheckedEval(MaterialEvaluator);

impl Evaluator<CheckedBoard> for CheckedEval {
    fn evaluate(&self, pos: &CheckedBoard) -> Value {
        self.0.evaluate(&pos.0)
    }
}

#[test]
fn test_search_only_plays_legal_moves() {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(20_24);
    let options = EngineOptions { threads: 2, hash_mb: 4, ..EngineOptions::default() };
    let mut engine = Engine::new(options, CheckedEval(MaterialEvaluator::new())).unwrap();

    for _ in 0..12 {
        let mut board = ChessBoard::startpos();
        for _ in 0..24 {
            let moves = board.legal_moves();
            let Some(&m) = moves.choose(&mut rng) else {
                break;
            };
            board.do_move(m);
        }
        if board.legal_moves().is_empty() {
            continue;
        }

        let pos = CheckedBoard(board.clone());
        let result = engine.search(&pos, LimitsType::depth(5), None);
        let best = result.best_move.expect("position has legal moves");
        assert!(board.legal_moves().contains(&best));
        if let Some(ponder) = result.ponder_move {
            let mut after = board.clone();
            after.do_move(best);
            assert!(after.legal_moves().contains(&ponder));
        }
    }

    assert_eq!(ILLEGAL_MOVES.load(Ordering::Relaxed), 0);
}
