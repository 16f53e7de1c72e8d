//! rchess-core: チェスエンジンの探索コア
//!
//! 反復深化 PVS・置換表・段階的な指し手生成・YBWC による並列探索を提供する。
//! 盤面は `Position` トレイト、評価は `Evaluator` トレイト越しに扱う。
//!
//! ```no_run
//! use rchess_core::{ChessBoard, Engine, EngineOptions, LimitsType, MaterialEvaluator};
//!
//! let mut engine = Engine::new(EngineOptions::default(), MaterialEvaluator::new())?;
//! let result = engine.search(&ChessBoard::startpos(), LimitsType::depth(8), None);
//! println!("bestmove {:?}", result.best_move);
//! # Ok::<(), rchess_core::EngineError>(())
//! ```

pub mod engine;
pub mod eval;
pub mod position;
pub mod search;
pub mod tt;
pub mod types;

pub use engine::{Engine, EngineError};
pub use eval::{Evaluator, MaterialEvaluator};
pub use position::{ChessBoard, GenType, MoveList, Position, PositionError};
pub use search::{
    EngineOptions, InfoCallback, LimitsType, Score, ScoreBound, SearchInfo, SearchResult,
    TimeOptions,
};
pub use tt::TranspositionTable;
pub use types::{Color, Move, Value};
