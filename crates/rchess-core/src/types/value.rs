//! 評価値（Value）
//!
//! 値のスケールはセンチポーン（歩 = 100）で、`Value::MATE` 付近を詰みスコアとして予約している。
//! 通常の評価値は [-MATE_IN_MAX_PLY, MATE_IN_MAX_PLY] の範囲で用いる。

use super::MAX_PLY;

/// 評価値
///
/// 通常の局面評価と、詰み表現（`mate_in` / `mated_in` 系）を同一の整数スケールで扱う。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct Value(i32);

impl Value {
    /// ゼロ
    pub const ZERO: Value = Value(0);
    /// 引き分け
    pub const DRAW: Value = Value(0);
    /// 勝勢（詰みではないが明確に勝ち）
    pub const KNOWN_WIN: Value = Value(10000);
    /// 詰み（勝ち側の最大スコア）
    pub const MATE: Value = Value(32000);
    /// 無限大
    pub const INFINITE: Value = Value(32001);
    /// 無効値
    ///
    /// 置換表の16bitフィールドに収まる必要がある。
    pub const NONE: Value = Value(32002);

    /// 最大探索深度内での詰みスコア
    pub const MATE_IN_MAX_PLY: Value = Value(Self::MATE.0 - MAX_PLY);
    /// 最大探索深度内での詰まされスコア
    pub const MATED_IN_MAX_PLY: Value = Value(-Self::MATE_IN_MAX_PLY.0);

    /// 歩の評価値
    pub const PAWN: Value = Value(100);

    /// 値から生成
    #[inline]
    pub const fn new(v: i32) -> Value {
        Value(v)
    }

    /// ply手で詰ますスコア
    #[inline]
    pub const fn mate_in(ply: i32) -> Value {
        Value(Self::MATE.0 - ply)
    }

    /// ply手で詰まされるスコア
    #[inline]
    pub const fn mated_in(ply: i32) -> Value {
        Value(-Self::MATE.0 + ply)
    }

    /// 勝ちスコアかどうか
    #[inline]
    pub const fn is_win(self) -> bool {
        self.0 >= Self::MATE_IN_MAX_PLY.0 && self.0 <= Self::MATE.0
    }

    /// 負けスコアかどうか
    #[inline]
    pub const fn is_loss(self) -> bool {
        self.0 <= Self::MATED_IN_MAX_PLY.0 && self.0 >= -Self::MATE.0
    }

    /// 詰みスコア（勝ちまたは負け）かどうか
    #[inline]
    pub const fn is_mate_score(self) -> bool {
        self.is_win() || self.is_loss()
    }

    /// 生の値を取得
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// 詰みまでの手数（ply）。詰みスコアでなければ0
    #[inline]
    pub const fn mate_ply(self) -> i32 {
        if self.is_win() {
            Self::MATE.0 - self.0
        } else if self.is_loss() {
            self.0 + Self::MATE.0
        } else {
            0
        }
    }

    /// "mate N" 表記の手数（自分の指し手の数）。負けなら負数
    #[inline]
    pub const fn mate_in_moves(self) -> i32 {
        if self.is_win() {
            (self.mate_ply() + 1) / 2
        } else if self.is_loss() {
            -(self.mate_ply() / 2)
        } else {
            0
        }
    }

    #[inline]
    pub fn abs(self) -> Value {
        Value(self.0.abs())
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::ZERO
    }
}

impl std::ops::Neg for Value {
    type Output = Value;

    #[inline]
    fn neg(self) -> Value {
        Value(-self.0)
    }
}

impl std::ops::Add for Value {
    type Output = Value;

    #[inline]
    fn add(self, rhs: Value) -> Value {
        Value(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Value {
    type Output = Value;

    #[inline]
    fn sub(self, rhs: Value) -> Value {
        Value(self.0 - rhs.0)
    }
}

impl std::ops::Add<i32> for Value {
    type Output = Value;

    #[inline]
    fn add(self, rhs: i32) -> Value {
        Value(self.0 + rhs)
    }
}

impl std::ops::Sub<i32> for Value {
    type Output = Value;

    #[inline]
    fn sub(self, rhs: i32) -> Value {
        Value(self.0 - rhs)
    }
}

impl std::ops::AddAssign for Value {
    #[inline]
    fn add_assign(&mut self, rhs: Value) {
        self.0 += rhs.0;
    }
}

impl std::ops::SubAssign for Value {
    #[inline]
    fn sub_assign(&mut self, rhs: Value) {
        self.0 -= rhs.0;
    }
}

impl std::ops::Mul<i32> for Value {
    type Output = Value;

    #[inline]
    fn mul(self, rhs: i32) -> Value {
        Value(self.0 * rhs)
    }
}

impl std::ops::Div<i32> for Value {
    type Output = Value;

    #[inline]
    fn div(self, rhs: i32) -> Value {
        Value(self.0 / rhs)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Value {
        Value(v)
    }
}

impl From<Value> for i32 {
    fn from(v: Value) -> i32 {
        v.0
    }
}
