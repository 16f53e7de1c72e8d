//! 駒の色（Color）・駒種（PieceType）・駒（Piece）

use super::Value;

/// 駒の色。手番も表す
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Color {
    White = 0,
    Black = 1,
}

impl Color {
    pub const NUM: usize = 2;
    pub const ALL: [Color; Color::NUM] = [Color::White, Color::Black];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl std::ops::Not for Color {
    type Output = Color;

    #[inline]
    fn not(self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }
}

/// 駒種
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PieceType {
    Pawn = 1,
    Knight = 2,
    Bishop = 3,
    Rook = 4,
    Queen = 5,
    King = 6,
}

impl PieceType {
    /// 駒種の配列サイズ（0は未使用）
    pub const NUM: usize = 7;

    pub const ALL: [PieceType; 6] = [
        PieceType::Pawn,
        PieceType::Knight,
        PieceType::Bishop,
        PieceType::Rook,
        PieceType::Queen,
        PieceType::King,
    ];

    #[inline]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// 値から生成（範囲外は None）
    #[inline]
    pub const fn from_u8(v: u8) -> Option<PieceType> {
        match v {
            1 => Some(PieceType::Pawn),
            2 => Some(PieceType::Knight),
            3 => Some(PieceType::Bishop),
            4 => Some(PieceType::Rook),
            5 => Some(PieceType::Queen),
            6 => Some(PieceType::King),
            _ => None,
        }
    }

    /// 駒の価値（SEE・MVV-LVA・futility共通）
    #[inline]
    pub const fn value(self) -> Value {
        Value::new(PIECE_VALUES[self as usize])
    }

    /// 成り駒の表記文字
    #[inline]
    pub const fn to_char(self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Rook => 'r',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }
}

/// 駒種ごとの価値。キングは交換で取られない前提の大きな値
const PIECE_VALUES: [i32; PieceType::NUM] = [0, 100, 320, 330, 500, 900, 20000];

/// 駒種の価値（None は 0）
#[inline]
pub fn piece_type_value(pt: Option<PieceType>) -> Value {
    pt.map_or(Value::ZERO, PieceType::value)
}

/// 手番付きの駒
///
/// `color * 8 + piece_type` で表現する。0 は駒なし。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Piece(u8);

impl Piece {
    /// 駒なし
    pub const NONE: Piece = Piece(0);
    /// 履歴テーブル等の配列サイズ
    pub const NUM: usize = 16;

    #[inline]
    pub const fn new(color: Color, pt: PieceType) -> Piece {
        Piece((color as u8) << 3 | pt as u8)
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn color(self) -> Color {
        if self.0 >> 3 == 0 { Color::White } else { Color::Black }
    }

    #[inline]
    pub const fn piece_type(self) -> Option<PieceType> {
        PieceType::from_u8(self.0 & 7)
    }
}
