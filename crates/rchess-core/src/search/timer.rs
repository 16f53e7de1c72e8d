//! タイマースレッド
//!
//! 探索中は一定間隔で経過時間とノード数を調べ、制限を超えたら停止シグナルを立てる。
//! 探索していない間と、探索が止まった後は条件変数で待機し、CPUを使わない。

use super::context::SearchContext;
use super::thread::PoolShared;
use super::TimePoint;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::JoinHandle;
use std::time::Duration;

/// tick の間隔（ミリ秒）
pub const TIMER_RESOLUTION: TimePoint = 5;

struct TimerState<P, E> {
    job: Option<Arc<SearchContext<P, E>>>,
    exit: bool,
}

struct TimerShared<P, E> {
    state: Mutex<TimerState<P, E>>,
    cond: Condvar,
}

/// タイマースレッドのハンドル
pub struct Timer<P, E> {
    shared: Arc<TimerShared<P, E>>,
    handle: Option<JoinHandle<()>>,
}

impl<P, E> Timer<P, E>
where
    P: Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// タイマースレッドを起動する
    pub fn spawn(pool: Arc<PoolShared<P, E>>) -> std::io::Result<Self> {
        let shared = Arc::new(TimerShared {
            state: Mutex::new(TimerState { job: None, exit: false }),
            cond: Condvar::new(),
        });
        let thread_shared = Arc::clone(&shared);
        let handle = std::thread::Builder::new()
            .name("rchess-timer".to_string())
            .spawn(move || timer_loop(&thread_shared, &pool))?;
        Ok(Self { shared, handle: Some(handle) })
    }

    /// 探索の監視を始める
    pub fn start(&self, ctx: Arc<SearchContext<P, E>>) {
        self.shared.state.lock().job = Some(ctx);
        self.shared.cond.notify_all();
    }

    /// 監視をやめて待機状態に戻す
    pub fn stop(&self) {
        self.shared.state.lock().job = None;
        self.shared.cond.notify_all();
    }

    /// 探索を見張っているか
    #[cfg(test)]
    pub(crate) fn is_watching(&self) -> bool {
        self.shared.state.lock().job.is_some()
    }
}

impl<P, E> Drop for Timer<P, E> {
    fn drop(&mut self) {
        self.shared.state.lock().exit = true;
        self.shared.cond.notify_all();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn timer_loop<P, E>(shared: &TimerShared<P, E>, pool: &PoolShared<P, E>) {
    let tick = Duration::from_millis(TIMER_RESOLUTION as u64);
    let mut state = shared.state.lock();
    loop {
        if state.exit {
            return;
        }
        match state.job.clone() {
            None => shared.cond.wait(&mut state),
            Some(ctx) => {
                shared.cond.wait_for(&mut state, tick);
                if !state.job.as_ref().is_some_and(|job| Arc::ptr_eq(job, &ctx)) {
                    continue;
                }
                // 止まった探索はもう見張らない（次の start まで眠る）
                if ctx.signals.stopped() {
                    state.job = None;
                    continue;
                }
                check_time(&ctx, pool.nodes_searched());
            }
        }
    }
}

/// 時間・ノード数の制限を調べ、超えていれば停止シグナルを立てる
pub(crate) fn check_time<P, E>(ctx: &SearchContext<P, E>, nodes: u64) {
    let limits = &ctx.limits;
    let signals = &ctx.signals;
    if signals.stopped() {
        return;
    }

    let elapsed = ctx.time.elapsed();

    // 最初の手を読んでいる間に予定時間を過ぎたら、fail low していなければ打ち切る
    let still_at_first_move = signals.first_root_move.load(Ordering::Relaxed)
        && !signals.failed_low_at_root.load(Ordering::Relaxed)
        && elapsed > ctx.time.available_time();

    let no_more_time =
        elapsed > ctx.time.maximum_time() - 2 * TIMER_RESOLUTION || still_at_first_move;

    let pondering = signals.pondering.load(Ordering::Relaxed);
    let stop = (limits.use_time_management() && no_more_time && !pondering)
        || (limits.movetime != 0 && elapsed >= limits.movetime - TIMER_RESOLUTION)
        || (limits.nodes != 0 && nodes >= limits.nodes);

    if stop {
        log::debug!("timer: stop at {elapsed}ms, {nodes} nodes");
        ctx.stop();
    }
}
