//! 評価値の境界（Bound）

/// 置換表に保存する値の種類
///
/// `Upper`/`Lower` はビットフラグで、`Exact` は両方を含む。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Bound {
    #[default]
    None = 0,
    /// 上界（fail low）
    Upper = 1,
    /// 下界（fail high）
    Lower = 2,
    /// 正確な値
    Exact = 3,
}

impl Bound {
    #[inline]
    pub const fn from_u8(v: u8) -> Bound {
        match v & 3 {
            1 => Bound::Upper,
            2 => Bound::Lower,
            3 => Bound::Exact,
            _ => Bound::None,
        }
    }

    /// 下界として使えるか
    #[inline]
    pub const fn is_lower_or_exact(self) -> bool {
        (self as u8) & (Bound::Lower as u8) != 0
    }

    /// 上界として使えるか
    #[inline]
    pub const fn is_upper_or_exact(self) -> bool {
        (self as u8) & (Bound::Upper as u8) != 0
    }

    /// `other` のビットを含むか
    #[inline]
    pub const fn includes(self, other: Bound) -> bool {
        (self as u8) & (other as u8) != 0
    }
}
