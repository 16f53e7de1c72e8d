//! 指し手（Move）
//!
//! 16bitに詰めた固定長の値型。
//! - bit 0-5: 移動元
//! - bit 6-11: 移動先
//! - bit 12-14: 成り駒種（0 は成りなし）

use super::{PieceType, Square};
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Move(u16);

impl Move {
    /// 指し手なし
    pub const NONE: Move = Move(0);
    /// パス（null move）。from == to == b1
    pub const NULL: Move = Move(65);

    #[inline]
    pub const fn new(from: Square, to: Square) -> Move {
        Move(from.index() as u16 | (to.index() as u16) << 6)
    }

    #[inline]
    pub const fn new_promotion(from: Square, to: Square, promo: PieceType) -> Move {
        Move(from.index() as u16 | (to.index() as u16) << 6 | (promo as u16) << 12)
    }

    /// 生の16bit値から復元（置換表用）
    #[inline]
    pub const fn from_u16(v: u16) -> Move {
        Move(v)
    }

    #[inline]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from(self) -> Square {
        Square::new((self.0 & 0x3F) as u8)
    }

    #[inline]
    pub const fn to(self) -> Square {
        Square::new(((self.0 >> 6) & 0x3F) as u8)
    }

    #[inline]
    pub const fn promotion(self) -> Option<PieceType> {
        PieceType::from_u8(((self.0 >> 12) & 7) as u8)
    }

    #[inline]
    pub const fn is_promotion(self) -> bool {
        (self.0 >> 12) & 7 != 0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == Self::NONE.0
    }

    #[inline]
    pub const fn is_some(self) -> bool {
        !self.is_none()
    }

    /// NONE でも NULL でもない通常の指し手か
    #[inline]
    pub const fn is_ok(self) -> bool {
        self.from().index() != self.to().index()
    }

    /// 座標表記（"e2e4", "e7e8q"）から変換
    pub fn from_uci(s: &str) -> Option<Move> {
        if s == "0000" {
            return Some(Move::NULL);
        }
        if s.len() != 4 && s.len() != 5 {
            return None;
        }
        let from = Square::parse(s.get(0..2)?)?;
        let to = Square::parse(s.get(2..4)?)?;
        match s.as_bytes().get(4) {
            None => Some(Move::new(from, to)),
            Some(c) => {
                let promo = match c {
                    b'n' => PieceType::Knight,
                    b'b' => PieceType::Bishop,
                    b'r' => PieceType::Rook,
                    b'q' => PieceType::Queen,
                    _ => return None,
                };
                Some(Move::new_promotion(from, to, promo))
            }
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "(none)");
        }
        if *self == Move::NULL {
            return write!(f, "0000");
        }
        write!(f, "{}{}", self.from(), self.to())?;
        if let Some(pt) = self.promotion() {
            write!(f, "{}", pt.to_char())?;
        }
        Ok(())
    }
}

impl fmt::Debug for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Move({self})")
    }
}

/// スコア付き指し手（指し手オーダリング用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtMove {
    pub mv: Move,
    pub value: i32,
}

impl ExtMove {
    #[inline]
    pub const fn new(mv: Move, value: i32) -> Self {
        Self { mv, value }
    }
}
