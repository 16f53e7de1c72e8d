//! マス（Square）
//!
//! a1 = 0, b1 = 1, ..., h8 = 63。

use super::Color;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Square(u8);

impl Square {
    pub const NUM: usize = 64;

    pub const A1: Square = Square(0);
    pub const H8: Square = Square(63);

    /// インデックスから生成（0..64）
    #[inline]
    pub const fn new(index: u8) -> Square {
        debug_assert!(index < 64);
        Square(index & 63)
    }

    #[inline]
    pub const fn from_file_rank(file: u8, rank: u8) -> Square {
        Square::new(rank * 8 + file)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn file(self) -> u8 {
        self.0 & 7
    }

    #[inline]
    pub const fn rank(self) -> u8 {
        self.0 >> 3
    }

    /// 手番から見た段（白は1段目が0、黒は8段目が0）
    #[inline]
    pub const fn relative_rank(self, c: Color) -> u8 {
        match c {
            Color::White => self.rank(),
            Color::Black => 7 - self.rank(),
        }
    }

    /// "e4" 形式から変換
    pub fn parse(s: &str) -> Option<Square> {
        let bytes = s.as_bytes();
        if bytes.len() != 2 {
            return None;
        }
        let file = bytes[0].checked_sub(b'a')?;
        let rank = bytes[1].checked_sub(b'1')?;
        if file > 7 || rank > 7 {
            return None;
        }
        Some(Square::from_file_rank(file, rank))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'a' + self.file()) as char, (b'1' + self.rank()) as char)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_square_parse_display() {
        let sq = Square::parse("e4").unwrap();
        assert_eq!(sq.file(), 4);
        assert_eq!(sq.rank(), 3);
        assert_eq!(sq.to_string(), "e4");
        assert_eq!(Square::parse("i1"), None);
        assert_eq!(Square::parse("a9"), None);
    }

    #[test]
    fn test_relative_rank() {
        let sq = Square::parse("b7").unwrap();
        assert_eq!(sq.relative_rank(Color::White), 6);
        assert_eq!(sq.relative_rank(Color::Black), 1);
    }
}
