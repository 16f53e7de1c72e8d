//! 評価関数
//!
//! 探索コアは `Evaluator` トレイト経由でのみ局面評価を呼び出す。
//! 既定の実装は駒割り + 駒位置テーブル（`MaterialEvaluator`）。

mod material;

pub use material::MaterialEvaluator;

use crate::position::Position;
use crate::types::Value;
use std::sync::Arc;

/// 局面評価のインターフェース
///
/// 手番側から見た評価値を返す。副作用を持たず、同じ局面には常に同じ値を返すこと。
/// 手番を入れ替えた局面では符号が反転する。
pub trait Evaluator<P: Position>: Send + Sync + 'static {
    fn evaluate(&self, pos: &P) -> Value;
}

impl<P: Position, E: Evaluator<P> + ?Sized> Evaluator<P> for Arc<E> {
    #[inline]
    fn evaluate(&self, pos: &P) -> Value {
        (**self).evaluate(pos)
    }
}
