//! 時間管理オプションとエンジン設定
use super::TimePoint;
use serde::Deserialize;

/// 時間管理に関するオプション（UCI setoption相当）
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeOptions {
    /// 通信遅延などで失う時間（ミリ秒）
    pub move_overhead: TimePoint,
    pub minimum_thinking_time: TimePoint,
    /// 思考時間の配分（百分率）
    pub slow_mover: i32,
    /// ponder を使う対局か（最適思考時間を 1/4 増やす）
    pub ponder: bool,
}

impl Default for TimeOptions {
    fn default() -> Self {
        Self { move_overhead: 30, minimum_thinking_time: 20, slow_mover: 100, ponder: false }
    }
}

/// エンジン全体の設定
///
/// TOMLから読み込めるよう `Deserialize` を実装し、省略した項目は既定値になる。
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineOptions {
    /// 置換表サイズ（MB）
    pub hash_mb: usize,
    /// 探索スレッド数
    pub threads: usize,
    /// 分岐点を作る最小の残り深さ
    pub min_split_depth: i32,
    /// 1つの分岐点に参加できる最大スレッド数（マスターを含む）
    pub max_threads_per_split_point: usize,
    /// すべての選択的枝刈りと削減を無効化する
    pub full_width: bool,
    /// この経過時間（ミリ秒）を過ぎたら、窓を外れた探索も lowerbound / upperbound として報告する
    pub bound_report_ms: TimePoint,
    pub time: TimeOptions,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            hash_mb: 16,
            threads: 1,
            min_split_depth: 4,
            max_threads_per_split_point: 5,
            full_width: false,
            bound_report_ms: 3000,
            time: TimeOptions::default(),
        }
    }
}

impl EngineOptions {
    /// 値を有効範囲に収める
    pub fn sanitized(mut self) -> Self {
        self.hash_mb = self.hash_mb.clamp(1, 1 << 16);
        self.threads = self.threads.clamp(1, super::thread::MAX_THREADS);
        self.min_split_depth = self.min_split_depth.max(2);
        self.max_threads_per_split_point = self.max_threads_per_split_point.max(2);
        self.bound_report_ms = self.bound_report_ms.max(0);
        self.time.move_overhead = self.time.move_overhead.max(0);
        self.time.minimum_thinking_time = self.time.minimum_thinking_time.max(0);
        self.time.slow_mover = self.time.slow_mover.clamp(10, 1000);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps_ranges() {
        let opts = EngineOptions {
            hash_mb: 0,
            threads: 0,
            min_split_depth: 0,
            time: TimeOptions { slow_mover: 0, ..TimeOptions::default() },
            ..EngineOptions::default()
        }
        .sanitized();
        assert_eq!(opts.hash_mb, 1);
        assert_eq!(opts.threads, 1);
        assert_eq!(opts.min_split_depth, 2);
        assert_eq!(opts.time.slow_mover, 10);
    }
}
