//! 探索コンテキスト
//!
//! 1回の探索（`go` 1回分）で全スレッドが共有する状態。
//! 置換表・評価関数・停止シグナル・探索制限・時間管理をまとめて保持し、
//! 探索関数へ参照で渡す。

use super::info::{InfoCallback, SearchInfo};
use super::{EngineOptions, LimitsType, TimeManager};
use crate::tt::TranspositionTable;
use crate::types::{Move, Value};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

// =============================================================================
// Signals
// =============================================================================

/// 探索制御シグナル
///
/// 探索スレッドからは読み取りのみ。書き込むのは呼び出し側・タイマー・メインスレッド。
#[derive(Default)]
pub struct Signals {
    /// 探索停止
    pub stop: AtomicBool,
    /// ponderhit を受けたら停止する
    pub stop_on_ponderhit: AtomicBool,
    /// ponder 中（時間による停止を行わない）
    pub pondering: AtomicBool,
    /// ルートで最初の手を探索中
    pub first_root_move: AtomicBool,
    /// ルートで fail low した（探索の終わりまで下ろさない）
    pub failed_low_at_root: AtomicBool,
}

impl Signals {
    #[inline]
    pub fn stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

// =============================================================================
// SearchResult
// =============================================================================

/// 探索結果
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchResult {
    /// 合法手がなければ None
    pub best_move: Option<Move>,
    pub ponder_move: Option<Move>,
    pub score: Value,
    /// 完了した反復の深さ
    pub depth: i32,
    pub nodes: u64,
    pub pv: Vec<Move>,
}

// =============================================================================
// SearchContext
// =============================================================================

/// 1回の探索で共有する状態
pub struct SearchContext<P, E> {
    pub(crate) id: u64,
    pub(crate) root_pos: P,
    pub(crate) tt: Arc<TranspositionTable>,
    pub(crate) evaluator: Arc<E>,
    pub(crate) signals: Signals,
    pub(crate) limits: LimitsType,
    pub(crate) time: TimeManager,
    pub(crate) options: EngineOptions,
    info: Option<InfoCallback>,
    /// 今回の反復で最善手が変わった回数
    pub(crate) best_move_changes: AtomicU32,
    /// 停止待ち（infinite / ponder で最大深さに達したとき）
    park_lock: Mutex<()>,
    park_cond: Condvar,
    result: Mutex<Option<SearchResult>>,
    result_cond: Condvar,
}

impl<P, E> SearchContext<P, E> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: u64,
        root_pos: P,
        tt: Arc<TranspositionTable>,
        evaluator: Arc<E>,
        limits: LimitsType,
        time: TimeManager,
        options: EngineOptions,
        info: Option<InfoCallback>,
    ) -> Self {
        let signals = Signals::default();
        signals.pondering.store(limits.ponder, Ordering::Relaxed);
        Self {
            id,
            root_pos,
            tt,
            evaluator,
            signals,
            limits,
            time,
            options,
            info,
            best_move_changes: AtomicU32::new(0),
            park_lock: Mutex::new(()),
            park_cond: Condvar::new(),
            result: Mutex::new(None),
            result_cond: Condvar::new(),
        }
    }

    /// 進捗を報告する
    pub(crate) fn report(&self, info: SearchInfo) {
        log::trace!("{info}");
        if let Some(cb) = &self.info {
            cb(&info);
        }
    }

    /// 探索を止める
    pub(crate) fn stop(&self) {
        self.signals.stop.store(true, Ordering::Release);
        let _guard = self.park_lock.lock();
        self.park_cond.notify_all();
    }

    /// ponderhit: ponder 中の探索を通常の探索に切り替える
    pub(crate) fn ponder_hit(&self) {
        self.signals.pondering.store(false, Ordering::Release);
        if self.signals.stop_on_ponderhit.load(Ordering::Acquire) {
            self.stop();
        } else {
            let _guard = self.park_lock.lock();
            self.park_cond.notify_all();
        }
    }

    /// infinite / ponder 中は stop() か ponderhit まで待つ
    pub(crate) fn wait_for_stop_or_ponderhit(&self) {
        let mut guard = self.park_lock.lock();
        while !self.signals.stopped()
            && (self.limits.infinite || self.signals.pondering.load(Ordering::Acquire))
        {
            self.park_cond.wait(&mut guard);
        }
    }

    /// 結果を書き込み、待っているスレッドを起こす
    pub(crate) fn publish_result(&self, result: SearchResult) {
        *self.result.lock() = Some(result);
        self.result_cond.notify_all();
    }

    /// 探索の完了を待って結果を返す
    pub(crate) fn wait_result(&self) -> SearchResult {
        let mut guard = self.result.lock();
        loop {
            if let Some(result) = guard.as_ref() {
                return result.clone();
            }
            self.result_cond.wait(&mut guard);
        }
    }

    /// 探索が完了しているか
    pub(crate) fn is_finished(&self) -> bool {
        self.result.lock().is_some()
    }
}
