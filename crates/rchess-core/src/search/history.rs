//! History統計
//!
//! 探索中の手の成功/失敗を記録し、手の順序付けと枝刈りに利用する。
//!
//! - `StatsEntry`: 範囲制限付き履歴エントリ
//! - `PieceToHistory`: [piece][to] -> score
//! - `GainsHistory`: [piece][to] -> 静的評価の最大改善量
//! - `CounterMoveHistory`: [piece][to] -> 直前の手への応手（2枠）
//! - `HistoryTables`: ワーカーごとの上記テーブル一式

use crate::types::{Move, Piece, Square, Value};

// =============================================================================
// 定数
// =============================================================================

/// History値の上限
pub const HISTORY_MAX: i32 = 2000;

/// 深さに応じた更新量
#[inline]
pub fn stat_bonus(depth: i32) -> i32 {
    depth * depth
}

// =============================================================================
// StatsEntry
// =============================================================================

/// 履歴統計の1エントリ
///
/// 値の範囲を [-D, D] に制限しながら更新できる。
#[derive(Clone, Copy, Default)]
pub struct StatsEntry<const D: i32> {
    value: i16,
}

impl<const D: i32> StatsEntry<D> {
    /// 値を取得
    #[inline]
    pub fn get(&self) -> i32 {
        self.value as i32
    }

    /// ボーナス値を加算（範囲制限付き）
    ///
    /// 更新式: entry += clamp(bonus, -D, D) - entry * |clamp(bonus, -D, D)| / D
    #[inline]
    pub fn update(&mut self, bonus: i32) {
        let clamped = bonus.clamp(-D, D);
        let delta = clamped - self.get() * clamped.abs() / D;
        self.value = (self.get() + delta) as i16;
        debug_assert!(self.get().abs() <= D);
    }
}

// =============================================================================
// [piece][to] テーブル
// =============================================================================

/// 駒と移動先で引くテーブル
#[derive(Clone)]
pub struct PieceToTable<T> {
    table: Box<[[T; Square::NUM]; Piece::NUM]>,
}

impl<T: Copy + Default> PieceToTable<T> {
    pub fn new() -> Self {
        Self {
            table: Box::new([[T::default(); Square::NUM]; Piece::NUM]),
        }
    }

    #[inline]
    pub fn get(&self, pc: Piece, to: Square) -> T {
        self.table[pc.index()][to.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, pc: Piece, to: Square) -> &mut T {
        &mut self.table[pc.index()][to.index()]
    }

    pub fn clear(&mut self) {
        for row in self.table.iter_mut() {
            row.fill(T::default());
        }
    }
}

impl<T: Copy + Default> Default for PieceToTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// 静かな手の履歴
pub type PieceToHistory = PieceToTable<StatsEntry<HISTORY_MAX>>;

impl PieceToHistory {
    #[inline]
    pub fn value(&self, pc: Piece, to: Square) -> i32 {
        self.get(pc, to).get()
    }

    #[inline]
    pub fn update(&mut self, pc: Piece, to: Square, bonus: i32) {
        self.get_mut(pc, to).update(bonus);
    }
}

/// 静かな手による静的評価の改善量（最大値を保持し、更新ごとに1ずつ減衰）
#[derive(Clone, Default)]
pub struct GainsHistory {
    table: PieceToTable<i16>,
}

impl GainsHistory {
    #[inline]
    pub fn value(&self, pc: Piece, to: Square) -> Value {
        Value::new(self.table.get(pc, to) as i32)
    }

    #[inline]
    pub fn update(&mut self, pc: Piece, to: Square, gain: Value) {
        let entry = self.table.get_mut(pc, to);
        let g = gain.raw().clamp(i16::MIN as i32, i16::MAX as i32);
        *entry = g.max(*entry as i32 - 1) as i16;
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

/// 相手の直前の手に対する応手（最近のものが先頭）
#[derive(Clone, Default)]
pub struct CounterMoveHistory {
    table: PieceToTable<[Move; 2]>,
}

impl CounterMoveHistory {
    #[inline]
    pub fn get(&self, pc: Piece, to: Square) -> [Move; 2] {
        self.table.get(pc, to)
    }

    #[inline]
    pub fn update(&mut self, pc: Piece, to: Square, mv: Move) {
        let slots = self.table.get_mut(pc, to);
        if slots[0] != mv {
            slots[1] = slots[0];
            slots[0] = mv;
        }
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }
}

/// ワーカーが持つ履歴テーブル一式
#[derive(Clone, Default)]
pub struct HistoryTables {
    pub main: PieceToHistory,
    pub gains: GainsHistory,
    pub counter_moves: CounterMoveHistory,
}

impl HistoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.main.clear();
        self.gains.clear();
        self.counter_moves.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, PieceType};
    use proptest::prelude::*;

    fn knight() -> Piece {
        Piece::new(Color::White, PieceType::Knight)
    }

    #[test]
    fn test_stats_entry_converges() {
        let mut e = StatsEntry::<HISTORY_MAX>::default();
        for _ in 0..1000 {
            e.update(HISTORY_MAX);
        }
        assert_eq!(e.get(), HISTORY_MAX);
        e.update(-stat_bonus(10));
        assert!(e.get() < HISTORY_MAX);
    }

    #[test]
    fn test_gains_decay() {
        let mut g = GainsHistory::default();
        let sq = Square::parse("f3").unwrap();
        g.update(knight(), sq, Value::new(50));
        assert_eq!(g.value(knight(), sq), Value::new(50));
        g.update(knight(), sq, Value::new(-10));
        assert_eq!(g.value(knight(), sq), Value::new(49));
        g.update(knight(), sq, Value::new(80));
        assert_eq!(g.value(knight(), sq), Value::new(80));
    }

    #[test]
    fn test_counter_moves_two_slots() {
        let mut cm = CounterMoveHistory::default();
        let sq = Square::parse("e5").unwrap();
        let a = Move::from_uci("g1f3").unwrap();
        let b = Move::from_uci("d2d4").unwrap();
        cm.update(knight(), sq, a);
        cm.update(knight(), sq, a);
        assert_eq!(cm.get(knight(), sq), [a, Move::NONE]);
        cm.update(knight(), sq, b);
        assert_eq!(cm.get(knight(), sq), [b, a]);
    }

    #[test]
    fn test_history_tables_clear() {
        let mut h = HistoryTables::new();
        let sq = Square::parse("c3").unwrap();
        h.main.update(knight(), sq, 100);
        assert!(h.main.value(knight(), sq) > 0);
        h.clear();
        assert_eq!(h.main.value(knight(), sq), 0);
    }

    proptest! {
        #[test]
        fn prop_history_stays_bounded(bonuses in proptest::collection::vec(-5000i32..5000, 1..200)) {
            let mut e = StatsEntry::<HISTORY_MAX>::default();
            for b in bonuses {
                e.update(b);
                prop_assert!(e.get().abs() <= HISTORY_MAX);
            }
        }
    }
}
