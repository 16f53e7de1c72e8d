//! 局面インターフェース
//!
//! 探索コアが局面に要求する最小限の契約（`Position` トレイト）と、
//! `chess` クレートの盤面を包んだ実装（`ChessBoard`）。
//!
//! 探索は合法手生成・指し手の適用/取り消し・王手判定・SEE・引き分け判定を
//! すべてこのトレイト経由で行い、盤面表現には依存しない。

mod chess_board;

pub use chess_board::{ChessBoard, PositionError};

use crate::types::{Color, ExtMove, MAX_MOVES, Move, Piece, PieceType, Square, Value};
use smallvec::SmallVec;

/// 指し手リスト
pub type MoveList = SmallVec<[ExtMove; MAX_MOVES]>;

/// 指し手生成の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenType {
    /// 駒取りとクイーンへの昇格
    Captures,
    /// 駒取り以外（クイーン以外への昇格を含む）
    Quiets,
    /// 王手回避（王手されているときのみ）
    Evasions,
    /// 駒取りでない王手
    QuietChecks,
    /// 全合法手
    All,
}

/// 探索が利用する局面の契約
///
/// `generate` が返す手、`pseudo_legal` を通過した手は `is_legal` で最終確認してから
/// `do_move` に渡される。`pseudo_legal`/`is_legal` は任意の16bit値（置換表の破損値など）を
/// 受け取っても安全でなければならない。
pub trait Position: Clone + Send + Sync + 'static {
    /// 局面のハッシュキー
    fn key(&self) -> u64;

    /// 手番
    fn side_to_move(&self) -> Color;

    /// 手番側が王手されているか
    fn in_check(&self) -> bool;

    /// マス上の駒
    fn piece_on(&self, sq: Square) -> Piece;

    /// 指し手で動く駒
    fn moved_piece(&self, mv: Move) -> Piece {
        self.piece_on(mv.from())
    }

    /// 直前の指し手で取られた駒種
    fn captured_piece_type(&self) -> Option<PieceType>;

    /// 指し手生成
    fn generate(&self, gen_type: GenType, list: &mut MoveList);

    /// 指し手が現局面で成立しうるか（置換表・キラー手の検証用）
    fn pseudo_legal(&self, mv: Move) -> bool;

    /// 指し手が合法か
    fn is_legal(&self, mv: Move) -> bool;

    /// 駒取りか（アンパッサンを含む）
    fn is_capture(&self, mv: Move) -> bool;

    /// 駒取りまたは昇格か
    fn is_capture_or_promotion(&self, mv: Move) -> bool {
        mv.is_promotion() || self.is_capture(mv)
    }

    /// 指し手で取られる駒種
    fn captured_by(&self, mv: Move) -> Option<PieceType>;

    /// 王手になるか
    fn gives_check(&self, mv: Move) -> bool;

    /// パスポーンを進める手か
    fn is_passed_pawn_push(&self, mv: Move) -> bool;

    /// 7段目（相対）にポーンがあるか
    fn has_pawn_on_7th(&self, c: Color) -> bool;

    /// キャスリング権が残っているか
    fn can_castle(&self, c: Color) -> bool;

    /// 静的交換評価（移動先マスでの駒の取り合いの損得）
    fn see(&self, mv: Move) -> Value;

    /// `see(mv) >= threshold` か
    fn see_ge(&self, mv: Move, threshold: Value) -> bool {
        self.see(mv) >= threshold
    }

    /// ポーン以外の駒の価値合計
    fn non_pawn_material(&self, c: Color) -> Value;

    /// 指し手を適用
    fn do_move(&mut self, mv: Move);

    /// 指し手を取り消す
    fn undo_move(&mut self, mv: Move);

    /// 手番だけを渡す
    fn do_null_move(&mut self);

    /// `do_null_move` を取り消す
    fn undo_null_move(&mut self);

    /// 千日手・50手ルール・駒不足による引き分けか
    fn is_draw(&self) -> bool;
}
