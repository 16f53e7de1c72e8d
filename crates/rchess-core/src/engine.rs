//! 探索エンジン
//!
//! 置換表・スレッドプール・タイマーを所有し、探索の開始/停止/ponderhit を受け付ける。
//! 探索は専用スレッドで非同期に進み、`wait` で結果を受け取る。

use crate::eval::Evaluator;
use crate::position::Position;
use crate::search::{
    EngineOptions, InfoCallback, LimitsType, SearchContext, SearchResult, ThreadPool, TimeManager,
    Timer,
};
use crate::tt::TranspositionTable;
use crate::types::Color;
use std::sync::Arc;
use thiserror::Error;

/// エンジンのエラー
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to spawn search thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// 探索エンジン
pub struct Engine<P, E> {
    options: EngineOptions,
    evaluator: Arc<E>,
    tt: Arc<TranspositionTable>,
    pool: ThreadPool<P, E>,
    timer: Timer<P, E>,
    /// 実行中（または結果を受け取っていない）探索
    current: Option<Arc<SearchContext<P, E>>>,
    next_id: u64,
}

impl<P: Position, E: Evaluator<P>> Engine<P, E> {
    pub fn new(options: EngineOptions, evaluator: E) -> Result<Self, EngineError> {
        let options = options.sanitized();
        let tt = Arc::new(TranspositionTable::new(options.hash_mb));
        let pool = ThreadPool::new(options.threads)?;
        let timer = Timer::spawn(Arc::clone(pool.shared()))?;
        log::info!(
            "engine ready: hash {}MB, {} threads, min split depth {}",
            options.hash_mb,
            options.threads,
            options.min_split_depth
        );
        Ok(Self {
            options,
            evaluator: Arc::new(evaluator),
            tt,
            pool,
            timer,
            current: None,
            next_id: 1,
        })
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// 探索を開始する（結果を待たない）
    ///
    /// 前の探索が残っていれば止めてから始める。
    pub fn start_search(&mut self, pos: &P, limits: LimitsType, info: Option<InfoCallback>) {
        self.launch(pos, limits, info);
    }

    /// 探索して結果を返す
    ///
    /// `infinite` / `ponder` の探索は `stop` か `ponder_hit` を受けるまで返らない。
    pub fn search(&mut self, pos: &P, limits: LimitsType, info: Option<InfoCallback>) -> SearchResult {
        let ctx = self.launch(pos, limits, info);
        self.finish(&ctx)
    }

    /// 探索の終了を待って結果を返す。探索していなければ None
    pub fn wait(&mut self) -> Option<SearchResult> {
        let ctx = self.current.clone()?;
        Some(self.finish(&ctx))
    }

    /// 探索を止める（結果は `wait` で受け取る）
    pub fn stop(&self) {
        if let Some(ctx) = &self.current {
            ctx.stop();
        }
    }

    /// ponder していた手が指された
    pub fn ponder_hit(&self) {
        if let Some(ctx) = &self.current {
            ctx.ponder_hit();
        }
    }

    /// 探索中か
    pub fn is_searching(&self) -> bool {
        self.current.as_ref().is_some_and(|ctx| !ctx.is_finished())
    }

    /// 置換表を消去する（新しい対局の開始時）
    pub fn clear(&mut self) {
        self.abort();
        self.tt.clear();
    }

    /// 置換表の大きさを変える（内容は失われる）
    pub fn set_hash_size(&mut self, mb: usize) {
        self.abort();
        self.options.hash_mb = mb.clamp(1, 1 << 16);
        self.tt = Arc::new(TranspositionTable::new(self.options.hash_mb));
    }

    /// 探索スレッド数を変える
    pub fn set_threads(&mut self, threads: usize) -> Result<(), EngineError> {
        self.abort();
        let options = EngineOptions { threads, ..self.options.clone() }.sanitized();
        if options.threads != self.pool.size() {
            self.pool = ThreadPool::new(options.threads)?;
            self.timer = Timer::spawn(Arc::clone(self.pool.shared()))?;
        }
        self.options = options;
        Ok(())
    }

    /// 設定をまとめて反映する
    pub fn set_options(&mut self, options: EngineOptions) -> Result<(), EngineError> {
        let options = options.sanitized();
        if options.hash_mb != self.options.hash_mb {
            self.set_hash_size(options.hash_mb);
        }
        self.set_threads(options.threads)?;
        self.options = options;
        Ok(())
    }

    /// 置換表の使用率（1000分率）
    pub fn hashfull(&self) -> i32 {
        self.tt.hashfull()
    }

    fn launch(
        &mut self,
        pos: &P,
        mut limits: LimitsType,
        info: Option<InfoCallback>,
    ) -> Arc<SearchContext<P, E>> {
        self.abort();

        if limits.start_time.is_none() {
            limits.set_start_time();
        }
        let material =
            pos.non_pawn_material(Color::White) + pos.non_pawn_material(Color::Black);
        let time = TimeManager::new(&limits, &self.options.time, pos.side_to_move(), material);

        let id = self.next_id;
        self.next_id += 1;
        log::debug!("start search #{id}: {limits:?}");

        let ctx = Arc::new(SearchContext::new(
            id,
            pos.clone(),
            Arc::clone(&self.tt),
            Arc::clone(&self.evaluator),
            limits,
            time,
            self.options.clone(),
            info,
        ));
        self.pool.start_thinking(Arc::clone(&ctx));
        self.timer.start(Arc::clone(&ctx));
        self.current = Some(Arc::clone(&ctx));
        ctx
    }

    fn finish(&mut self, ctx: &Arc<SearchContext<P, E>>) -> SearchResult {
        let result = ctx.wait_result();
        self.timer.stop();
        if self.current.as_ref().is_some_and(|cur| Arc::ptr_eq(cur, ctx)) {
            self.current = None;
        }
        result
    }

    /// 実行中の探索を止めて終わるのを待つ
    fn abort(&mut self) {
        if let Some(ctx) = self.current.take() {
            ctx.stop();
            ctx.wait_result();
            self.timer.stop();
        }
    }
}

impl<P, E> Drop for Engine<P, E> {
    fn drop(&mut self) {
        if let Some(ctx) = self.current.take() {
            ctx.stop();
            ctx.wait_result();
        }
    }
}
