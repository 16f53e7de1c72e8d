//! 時間管理（TimeManager）
//!
//! 残り時間・加算時間・次の時間切れまでの手数・局面の進行度から
//! 最適思考時間と最大思考時間を計算する。
//!
//! 最適思考時間は反復深化の各反復後に、最大思考時間はタイマーの毎tickに参照される。
//! 最善手が不安定な間は最適思考時間に追加時間を加える。

use super::{LimitsType, TimeOptions, TimePoint};
use crate::types::{Color, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

// =============================================================================
// 定数
// =============================================================================

/// 時間管理を行わないときの思考時間
const UNLIMITED: TimePoint = TimePoint::MAX / 4;

/// 残り手数を指定されたときの上限
const MOVE_HORIZON: i32 = 50;

/// 最大思考時間は最適思考時間のこの倍数まで
const MAX_RATIO: TimePoint = 5;

/// 最大思考時間は残り時間のこの割合（百分率）まで
const MAX_SHARE_PERCENT: TimePoint = 80;

// =============================================================================
// GamePhase
// =============================================================================

/// 局面の進行度（双方の大駒・小駒の総量から判定）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GamePhase {
    Opening,
    MiddleGame,
    EndGame,
}

impl GamePhase {
    /// この値以上なら序盤（初期配置の大駒・小駒は片側3100）
    const OPENING_MATERIAL: i32 = 5600;
    /// この値以下なら終盤
    const ENDGAME_MATERIAL: i32 = 2600;

    /// 双方の non-pawn material の合計から判定する
    pub fn from_material(non_pawn_material: Value) -> GamePhase {
        let npm = non_pawn_material.raw();
        if npm >= Self::OPENING_MATERIAL {
            GamePhase::Opening
        } else if npm <= Self::ENDGAME_MATERIAL {
            GamePhase::EndGame
        } else {
            GamePhase::MiddleGame
        }
    }
}

/// movestogo が与えられないときに想定する残り手数
pub fn estimate_moves_remaining_by_phase(phase: GamePhase) -> i32 {
    match phase {
        GamePhase::Opening => 40,
        GamePhase::MiddleGame => 30,
        GamePhase::EndGame => 20,
    }
}

// =============================================================================
// TimeManager
// =============================================================================

/// 時間管理
///
/// 探索スレッドとタイマースレッドから共有されるため、可変な値はアトミックに持つ。
pub struct TimeManager {
    start_time: Instant,
    optimum_time: AtomicI64,
    maximum_time: AtomicI64,
    /// 最善手の変化による追加時間
    unstable_pv_extra_time: AtomicI64,
}

impl TimeManager {
    /// 今回の思考時間を決定する
    ///
    /// # Arguments
    /// * `limits` - 探索制限
    /// * `options` - 時間管理オプション
    /// * `us` - 自分の手番
    /// * `non_pawn_material` - 双方の大駒・小駒の合計
    pub fn new(
        limits: &LimitsType,
        options: &TimeOptions,
        us: Color,
        non_pawn_material: Value,
    ) -> Self {
        let start_time = limits.start_time.unwrap_or_else(Instant::now);
        let (optimum, maximum) = if limits.movetime > 0 {
            (limits.movetime, limits.movetime)
        } else if !limits.use_time_management() {
            (UNLIMITED, UNLIMITED)
        } else {
            let phase = GamePhase::from_material(non_pawn_material);
            allocate(limits, options, us, phase)
        };

        log::debug!("time: optimum={optimum}ms maximum={maximum}ms");
        Self {
            start_time,
            optimum_time: AtomicI64::new(optimum),
            maximum_time: AtomicI64::new(maximum),
            unstable_pv_extra_time: AtomicI64::new(0),
        }
    }

    /// 最善手の変化回数から追加時間を決める
    ///
    /// `cur_changes` は今回の反復、`prev_changes` は前回の反復での変化回数。
    pub fn pv_instability(&self, cur_changes: u32, prev_changes: u32) {
        let optimum = self.optimum_time();
        let extra = TimePoint::from(cur_changes) * (optimum / 2)
            + TimePoint::from(prev_changes) * (optimum / 3);
        self.unstable_pv_extra_time.store(extra, Ordering::Relaxed);
    }

    /// 今回使ってよい時間（最適思考時間 + 追加時間）
    #[inline]
    pub fn available_time(&self) -> TimePoint {
        self.optimum_time()
            .saturating_add(self.unstable_pv_extra_time.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn optimum_time(&self) -> TimePoint {
        self.optimum_time.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn maximum_time(&self) -> TimePoint {
        self.maximum_time.load(Ordering::Relaxed)
    }

    /// 探索開始からの経過時間（ミリ秒）
    #[inline]
    pub fn elapsed(&self) -> TimePoint {
        self.start_time.elapsed().as_millis() as TimePoint
    }
}

/// 残り時間から (optimum, maximum) を計算する
fn allocate(
    limits: &LimitsType,
    options: &TimeOptions,
    us: Color,
    phase: GamePhase,
) -> (TimePoint, TimePoint) {
    let moves_to_go = if limits.movestogo > 0 {
        limits.movestogo.min(MOVE_HORIZON)
    } else {
        estimate_moves_remaining_by_phase(phase)
    };
    let mtg = TimePoint::from(moves_to_go);

    let time_left = (limits.time_left(us) - options.move_overhead).max(0);
    let inc = limits.increment(us).max(0);

    // 残り手数ぶんの加算時間も含めて均等に配分する
    let pool = time_left + inc * (mtg - 1);
    let mut optimum = pool / mtg * TimePoint::from(options.slow_mover) / 100;
    // ponder 中は相手の手番でも考えられるので少し多めに使う
    if options.ponder {
        optimum += optimum / 4;
    }

    let hard_cap = time_left * MAX_SHARE_PERCENT / 100;
    let maximum = (optimum * MAX_RATIO).min(hard_cap).max(options.minimum_thinking_time);
    let optimum = optimum.max(options.minimum_thinking_time).min(maximum);
    (optimum, maximum)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits_with_time(time: TimePoint, inc: TimePoint) -> LimitsType {
        let mut limits = LimitsType::new();
        limits.time = [time, time];
        limits.inc = [inc, inc];
        limits
    }

    #[test]
    fn test_game_phase_from_material() {
        assert_eq!(GamePhase::from_material(Value::new(6200)), GamePhase::Opening);
        assert_eq!(GamePhase::from_material(Value::new(4000)), GamePhase::MiddleGame);
        assert_eq!(GamePhase::from_material(Value::new(1000)), GamePhase::EndGame);
    }

    #[test]
    fn test_movetime_fixes_both() {
        let limits = LimitsType::movetime(250);
        let tm = TimeManager::new(&limits, &TimeOptions::default(), Color::White, Value::ZERO);
        assert_eq!(tm.optimum_time(), 250);
        assert_eq!(tm.maximum_time(), 250);
    }

    #[test]
    fn test_depth_limit_is_unlimited() {
        let limits = LimitsType::depth(8);
        let tm = TimeManager::new(&limits, &TimeOptions::default(), Color::White, Value::ZERO);
        assert_eq!(tm.maximum_time(), UNLIMITED);
    }

    #[test]
    fn test_allocation_within_remaining_time() {
        let limits = limits_with_time(60_000, 0);
        let tm =
            TimeManager::new(&limits, &TimeOptions::default(), Color::White, Value::new(6200));
        assert!(tm.optimum_time() > 0);
        assert!(tm.optimum_time() <= tm.maximum_time());
        assert!(tm.maximum_time() < 60_000);
        // 序盤は 40 手分に配分
        assert_eq!(tm.optimum_time(), (60_000 - 30) / 40);
    }

    #[test]
    fn test_endgame_spends_more_per_move() {
        let limits = limits_with_time(60_000, 1000);
        let opts = TimeOptions::default();
        let opening = TimeManager::new(&limits, &opts, Color::Black, Value::new(6200));
        let endgame = TimeManager::new(&limits, &opts, Color::Black, Value::new(1000));
        assert!(endgame.optimum_time() > opening.optimum_time());
    }

    #[test]
    fn test_ponder_adds_a_quarter() {
        let limits = limits_with_time(60_000, 0);
        let plain =
            TimeManager::new(&limits, &TimeOptions::default(), Color::White, Value::new(6200));
        let opts = TimeOptions { ponder: true, ..TimeOptions::default() };
        let ponder = TimeManager::new(&limits, &opts, Color::White, Value::new(6200));
        let base = plain.optimum_time();
        assert_eq!(ponder.optimum_time(), base + base / 4);
        assert!(ponder.optimum_time() <= ponder.maximum_time());
    }

    #[test]
    fn test_low_time_respects_minimum() {
        let limits = limits_with_time(10, 0);
        let tm = TimeManager::new(&limits, &TimeOptions::default(), Color::White, Value::ZERO);
        assert_eq!(tm.optimum_time(), 20);
        assert_eq!(tm.maximum_time(), 20);
    }

    #[test]
    fn test_pv_instability_extends_available_time() {
        let limits = limits_with_time(60_000, 0);
        let tm =
            TimeManager::new(&limits, &TimeOptions::default(), Color::White, Value::new(6200));
        let base = tm.available_time();
        tm.pv_instability(2, 1);
        let opt = tm.optimum_time();
        assert_eq!(tm.available_time(), base + 2 * (opt / 2) + opt / 3);
        tm.pv_instability(0, 0);
        assert_eq!(tm.available_time(), base);
    }
}
