//! 探索モジュール
//!
//! - `alpha_beta`: 通常探索（PVS + 各種枝刈り・延長）
//! - `qsearch`: 静止探索
//! - `movepicker`: 段階的な指し手生成
//! - `driver`: 反復深化・アスピレーション・MultiPV
//! - `thread` / `split_point`: YBWC による並列探索
//! - `time_manager` / `timer`: 時間配分と停止判定

mod alpha_beta;
mod context;
mod driver;
mod history;
mod info;
mod limits;
mod movepicker;
mod pruning;
mod qsearch;
mod split_point;
mod stats;
mod thread;
mod time_manager;
mod time_options;
mod timer;
mod types;

#[cfg(test)]
mod tests;

pub use context::{SearchResult, Signals};
pub use driver::AspirationWindow;
pub use history::{CounterMoveHistory, GainsHistory, HistoryTables, PieceToHistory, stat_bonus};
pub use info::{InfoCallback, Score, ScoreBound, SearchInfo};
pub use limits::{LimitsType, TimePoint};
pub use movepicker::{MovePicker, Stage};
pub use split_point::MAX_SPLITPOINTS_PER_THREAD;
pub use thread::MAX_THREADS;
pub use time_manager::{GamePhase, TimeManager, estimate_moves_remaining_by_phase};
pub use time_options::{EngineOptions, TimeOptions};
pub use timer::TIMER_RESOLUTION;
pub use types::{NodeType, RootMove, RootMoves};

#[cfg(feature = "search-stats")]
pub use stats::SearchStats;

pub(crate) use context::SearchContext;
pub(crate) use thread::ThreadPool;
pub(crate) use timer::Timer;
