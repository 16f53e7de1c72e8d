//! スレッドプールと分岐点による並列探索（YBWC）
//!
//! ## 構成
//!
//! - スレッド0（メインスレッド）は探索要求を待ち、反復深化を実行する。
//! - 他のスレッドは待機ループで眠り、分岐点に呼ばれたときだけ起きて探索する。
//!
//! ## 分岐
//!
//! 十分な残り深さがあり最初の手を読み終えたノードで、マスターは分岐点を作り、
//! 空いているスレッドを集める。各スレッドは分岐点の指し手カーソルから
//! ロックの下で1手ずつ取り出して探索し、結果をロックの下で書き戻す。
//! マスター自身も同じ方法で探索に参加し、全員が抜けるまで待機ループで待つ。
//!
//! ## Helpful master
//!
//! 自分の分岐点を持つスレッドが待機している間は、その分岐点を手伝っている
//! スレッドが作った分岐点にだけ参加できる。

use super::alpha_beta::{SearchState, search};
use super::context::SearchContext;
use super::driver::think;
use super::movepicker::MovePicker;
use super::split_point::{MAX_SPLITPOINTS_PER_THREAD, SplitPoint, SplitPointState};
use super::stats::inc_stat;
use super::types::{NodeType, STACK_OFFSET};
use crate::eval::Evaluator;
use crate::position::Position;
use crate::types::{Depth, Move, Value};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

/// スレッド数の上限（参加スレッドを u64 のビット集合で管理する）
pub const MAX_THREADS: usize = 64;

// =============================================================================
// ThreadSlot
// =============================================================================

/// スレッドごとの共有状態
pub struct ThreadSlot<P, E> {
    pub idx: usize,
    /// 探索中（分岐点の探索を含む）
    pub searching: AtomicBool,
    /// 今回の探索でのノード数
    pub nodes: AtomicU64,
    /// 現在参加している分岐点
    active_split_point: Mutex<Option<Arc<SplitPoint<P, E>>>>,
    /// このスレッドがマスターの分岐点（入れ子順）
    split_points: Mutex<Vec<Arc<SplitPoint<P, E>>>>,
    sleep_lock: Mutex<()>,
    sleep_cond: Condvar,
}

impl<P, E> ThreadSlot<P, E> {
    fn new(idx: usize) -> Self {
        Self {
            idx,
            searching: AtomicBool::new(false),
            nodes: AtomicU64::new(0),
            active_split_point: Mutex::new(None),
            split_points: Mutex::new(Vec::new()),
            sleep_lock: Mutex::new(()),
            sleep_cond: Condvar::new(),
        }
    }

    /// 待機中のスレッドを起こす
    fn notify(&self) {
        let _guard = self.sleep_lock.lock();
        self.sleep_cond.notify_one();
    }

    /// 今いる分岐点か、その祖先で beta カットが起きているか
    pub fn cutoff_occurred(&self) -> bool {
        self.active_split_point.lock().as_ref().is_some_and(|sp| sp.cutoff_occurred())
    }

    /// 自分がマスターの分岐点の数
    pub fn split_point_count(&self) -> usize {
        self.split_points.lock().len()
    }
}

// =============================================================================
// PoolShared
// =============================================================================

/// スレッド間で共有するプールの状態
pub struct PoolShared<P, E> {
    pub slots: Vec<ThreadSlot<P, E>>,
    /// 分岐点の作成と参加スレッドの募集を直列化する
    split_lock: Mutex<()>,
    /// メインスレッドへの探索要求
    job: Mutex<Option<Arc<SearchContext<P, E>>>>,
    job_cond: Condvar,
    exit: AtomicBool,
}

impl<P, E> PoolShared<P, E> {
    fn new(threads: usize) -> Self {
        Self {
            slots: (0..threads).map(ThreadSlot::new).collect(),
            split_lock: Mutex::new(()),
            job: Mutex::new(None),
            job_cond: Condvar::new(),
            exit: AtomicBool::new(false),
        }
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// 全スレッドのノード数の合計
    pub fn nodes_searched(&self) -> u64 {
        self.slots.iter().map(|s| s.nodes.load(Ordering::Relaxed)).sum()
    }

    /// `slave` が `master` の分岐点に参加できるか
    ///
    /// 自分の分岐点を持つスレッドは、最後の分岐点を `master` が手伝っている場合だけ参加できる。
    fn available_to(&self, slave: &ThreadSlot<P, E>, master: usize) -> bool {
        if slave.searching.load(Ordering::Acquire) {
            return false;
        }
        match slave.split_points.lock().last() {
            None => true,
            Some(sp) => sp.has_slave(master),
        }
    }

    /// `master` に参加できるスレッドがいるか
    pub fn available_slave_exists(&self, master: usize) -> bool {
        self.slots.iter().any(|s| s.idx != master && self.available_to(s, master))
    }
}

// =============================================================================
// ThreadPool
// =============================================================================

/// スレッドプール
pub struct ThreadPool<P, E> {
    shared: Arc<PoolShared<P, E>>,
    handles: Vec<JoinHandle<()>>,
}

impl<P: Position, E: Evaluator<P>> ThreadPool<P, E> {
    /// `threads` 本のスレッドを起動する
    pub fn new(threads: usize) -> std::io::Result<Self> {
        let threads = threads.clamp(1, MAX_THREADS);
        let shared = Arc::new(PoolShared::new(threads));
        let mut handles = Vec::with_capacity(threads);
        for idx in 0..threads {
            let pool = Arc::clone(&shared);
            let handle = std::thread::Builder::new()
                .name(format!("rchess-worker-{idx}"))
                .spawn(move || worker_main(pool, idx))?;
            handles.push(handle);
        }
        log::debug!("thread pool started with {threads} threads");
        Ok(Self { shared, handles })
    }

    pub fn shared(&self) -> &Arc<PoolShared<P, E>> {
        &self.shared
    }

    pub fn size(&self) -> usize {
        self.shared.size()
    }

    /// メインスレッドに探索を開始させる
    pub fn start_thinking(&self, ctx: Arc<SearchContext<P, E>>) {
        for slot in &self.shared.slots {
            slot.nodes.store(0, Ordering::Relaxed);
        }
        *self.shared.job.lock() = Some(ctx);
        self.shared.job_cond.notify_all();
    }
}

impl<P, E> Drop for ThreadPool<P, E> {
    fn drop(&mut self) {
        self.shared.exit.store(true, Ordering::Release);
        {
            let _guard = self.shared.job.lock();
            self.shared.job_cond.notify_all();
        }
        for slot in &self.shared.slots {
            slot.notify();
        }
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}

// =============================================================================
// スレッドのループ
// =============================================================================

fn worker_main<P: Position, E: Evaluator<P>>(pool: Arc<PoolShared<P, E>>, idx: usize) {
    let mut st = SearchState::new(idx, Arc::clone(&pool));
    if idx == 0 {
        main_loop(&mut st);
    } else {
        idle_loop(&mut st, None);
    }
}

/// メインスレッド: 探索要求を待って反復深化を実行する
fn main_loop<P: Position, E: Evaluator<P>>(st: &mut SearchState<P, E>) {
    let pool = Arc::clone(&st.pool);
    loop {
        let ctx = {
            let mut job = pool.job.lock();
            loop {
                if pool.exit.load(Ordering::Acquire) {
                    return;
                }
                if let Some(ctx) = job.take() {
                    break ctx;
                }
                pool.job_cond.wait(&mut job);
            }
        };

        let slot = &pool.slots[st.idx];
        slot.searching.store(true, Ordering::Release);
        let result = think(st, &ctx);
        slot.searching.store(false, Ordering::Release);
        ctx.publish_result(result);
    }
}

/// 待機ループ
///
/// `this_sp` が Some のときはマスターとして自分の分岐点の完了を待ち、
/// その間は自分を手伝っているスレッドの分岐点にだけ参加する。
pub(crate) fn idle_loop<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    this_sp: Option<&Arc<SplitPoint<P, E>>>,
) {
    let pool = Arc::clone(&st.pool);
    let slot = &pool.slots[st.idx];

    loop {
        if let Some(sp) = this_sp {
            if sp.slaves_mask.load(Ordering::Acquire) == 0 {
                return;
            }
        } else if pool.exit.load(Ordering::Acquire) {
            return;
        }

        if slot.searching.load(Ordering::Acquire) {
            let sp = slot.active_split_point.lock().clone();
            if let Some(sp) = &sp {
                search_split_point(st, sp);
            }

            // searching を下ろすまでは他のスレッドが active_split_point に触れない
            *slot.active_split_point.lock() = this_sp.cloned();
            slot.searching.store(false, Ordering::Release);

            if let Some(sp) = sp {
                sp.slaves_mask.fetch_and(!(1u64 << st.idx), Ordering::AcqRel);
                if sp.master != st.idx {
                    pool.slots[sp.master].notify();
                }
            }
            continue;
        }

        let mut guard = slot.sleep_lock.lock();
        let wake = slot.searching.load(Ordering::Acquire)
            || pool.exit.load(Ordering::Acquire)
            || this_sp.is_some_and(|sp| sp.slaves_mask.load(Ordering::Acquire) == 0);
        if !wake {
            slot.sleep_cond.wait(&mut guard);
        }
    }
}

/// 分岐点の続きを探索する
fn search_split_point<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    sp: &Arc<SplitPoint<P, E>>,
) {
    let ctx = Arc::clone(&sp.ctx);
    if st.search_id != ctx.id {
        st.prepare_for_search(ctx.id);
    }

    // 分岐点ごとに別のスタックを使う（待機中のマスターのスタックを壊さない）
    let spare = st.take_spare_stack();
    let saved = std::mem::replace(&mut st.stack, spare);

    let ply = sp.ply;
    let idx = ply as usize + STACK_OFFSET;
    for ss in &mut st.stack[idx - 1..=idx + 1] {
        ss.reset();
    }
    {
        let ss = &mut st.stack[idx];
        ss.static_eval = sp.static_eval;
        ss.killers = sp.killers;
        ss.split_point = Some(Arc::clone(sp));
    }
    let saved_pv_idx = st.pv_idx;
    st.pv_idx = sp.pv_idx;

    let alpha = sp.state.lock().alpha;
    let mut pos = sp.pos.clone();
    search(st, &ctx, &mut pos, sp.node_type.to_split_point(), ply, alpha, sp.beta, sp.depth);

    st.pv_idx = saved_pv_idx;
    let used = std::mem::replace(&mut st.stack, saved);
    st.return_spare_stack(used);
}

// =============================================================================
// split
// =============================================================================

/// 分岐に渡すノードの情報
pub(crate) struct SplitParams {
    pub node_type: NodeType,
    pub ply: i32,
    pub depth: Depth,
    pub alpha: Value,
    pub beta: Value,
    pub best_value: Value,
    pub best_move: Move,
    pub move_count: i32,
    pub static_eval: Value,
    pub tt_move: Move,
    pub threat_move: Move,
    pub killers: [Move; 2],
    pub counter_moves: [Move; 2],
}

/// 分岐の結果
pub(crate) struct SplitOutcome {
    pub best_value: Value,
    pub best_move: Move,
    pub move_count: i32,
    pub pv: Vec<Move>,
}

/// 残りの指し手を他スレッドと分担して探索する
///
/// 参加できるスレッドがいなければ何もせず None を返し、`picker` はそのまま残る。
/// 分岐した場合は `picker` を使い切り、全スレッドが抜けた後の結果を返す。
pub(crate) fn split<P: Position, E: Evaluator<P>>(
    st: &mut SearchState<P, E>,
    ctx: &Arc<SearchContext<P, E>>,
    pos: &P,
    params: SplitParams,
    picker: &mut MovePicker,
) -> Option<SplitOutcome> {
    let pool = Arc::clone(&st.pool);
    let master = st.idx;
    let slot = &pool.slots[master];
    let max_threads = ctx.options.max_threads_per_split_point;

    let root_moves = params.node_type.is_root().then(|| std::mem::take(&mut st.root_moves));
    let sp = Arc::new(SplitPoint {
        ctx: Arc::clone(ctx),
        pos: pos.clone(),
        parent: slot.active_split_point.lock().clone(),
        master,
        node_type: params.node_type,
        ply: params.ply,
        depth: params.depth,
        beta: params.beta,
        static_eval: params.static_eval,
        tt_move: params.tt_move,
        threat_move: params.threat_move,
        killers: params.killers,
        counter_moves: params.counter_moves,
        pv_idx: st.pv_idx,
        slaves_mask: AtomicU64::new(1u64 << master),
        cutoff: AtomicBool::new(false),
        state: Mutex::new(SplitPointState {
            picker: std::mem::take(picker),
            alpha: params.alpha,
            best_value: params.best_value,
            best_move: params.best_move,
            move_count: params.move_count,
            pv: Vec::new(),
            root_moves,
        }),
    });

    let recruited = {
        let _guard = pool.split_lock.lock();
        let mut recruited = 0usize;
        if slot.split_point_count() < MAX_SPLITPOINTS_PER_THREAD {
            for other in &pool.slots {
                if recruited + 1 >= max_threads {
                    break;
                }
                if other.idx != master && pool.available_to(other, master) {
                    *other.active_split_point.lock() = Some(Arc::clone(&sp));
                    sp.slaves_mask.fetch_or(1u64 << other.idx, Ordering::AcqRel);
                    other.searching.store(true, Ordering::Release);
                    recruited += 1;
                }
            }
        }
        if recruited > 0 {
            slot.split_points.lock().push(Arc::clone(&sp));
            *slot.active_split_point.lock() = Some(Arc::clone(&sp));
        }
        recruited
    };

    if recruited == 0 {
        let mut state = sp.state.lock();
        *picker = std::mem::take(&mut state.picker);
        if let Some(rms) = state.root_moves.take() {
            st.root_moves = rms;
        }
        return None;
    }

    inc_stat!(st, splits);
    log::trace!(
        "split at ply {} depth {} with {} helpers (worker {master})",
        params.ply,
        params.depth,
        recruited
    );
    for other in &pool.slots {
        if other.idx != master && sp.has_slave(other.idx) {
            other.notify();
        }
    }

    // マスター自身も待機ループから分岐点の探索に参加する
    idle_loop(st, Some(&sp));

    {
        let _guard = pool.split_lock.lock();
        slot.split_points.lock().pop();
        *slot.active_split_point.lock() = sp.parent.clone();
        slot.searching.store(true, Ordering::Release);
    }

    let mut state = sp.state.lock();
    if let Some(rms) = state.root_moves.take() {
        st.root_moves = rms;
    }
    Some(SplitOutcome {
        best_value: state.best_value,
        best_move: state.best_move,
        move_count: state.move_count,
        pv: std::mem::take(&mut state.pv),
    })
}
