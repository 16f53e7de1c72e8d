//! 探索統計（`search-stats` feature）
//!
//! 探索中の各種枝刈りの発生回数をスレッドごとに記録し、探索終了時にログへ出す。

/// 深度別統計の最大深度
#[cfg(feature = "search-stats")]
pub(super) const STATS_MAX_DEPTH: usize = 32;

/// 探索統計カウンタ
#[cfg(feature = "search-stats")]
#[derive(Debug, Clone)]
pub struct SearchStats {
    /// 探索関数の呼び出し回数（静止探索を除く）
    pub nodes_searched: u64,
    /// 静止探索の呼び出し回数
    pub qs_nodes: u64,
    /// TT（置換表）カットオフ回数
    pub tt_cutoff: u64,
    pub razoring_applied: u64,
    pub futility_pruned: u64,
    /// NMP試行回数
    pub nmp_attempted: u64,
    /// NMPによる枝刈り成功回数
    pub nmp_cutoff: u64,
    /// NMPの検証探索回数
    pub nmp_verification: u64,
    pub probcut_attempted: u64,
    pub probcut_cutoff: u64,
    /// IIDの実行回数
    pub iid_applied: u64,
    pub singular_extension: u64,
    pub check_extension: u64,
    /// Move Loop内の枝刈り回数（move count, futility, SEE）
    pub move_loop_pruned: u64,
    pub lmr_applied: u64,
    /// LMRによる再探索回数
    pub lmr_research: u64,
    /// 分岐点を作った回数
    pub splits: u64,
    /// 深度別ノード数
    pub nodes_by_depth: [u64; STATS_MAX_DEPTH],
    /// 深度別カットオフ回数
    pub cutoff_by_depth: [u64; STATS_MAX_DEPTH],
    /// 深度別の最初の手でのカットオフ回数
    pub first_move_cutoff_by_depth: [u64; STATS_MAX_DEPTH],
}

#[cfg(feature = "search-stats")]
impl Default for SearchStats {
    fn default() -> Self {
        let zero = [0; STATS_MAX_DEPTH];
        Self {
            nodes_searched: 0,
            qs_nodes: 0,
            tt_cutoff: 0,
            razoring_applied: 0,
            futility_pruned: 0,
            nmp_attempted: 0,
            nmp_cutoff: 0,
            nmp_verification: 0,
            probcut_attempted: 0,
            probcut_cutoff: 0,
            iid_applied: 0,
            singular_extension: 0,
            check_extension: 0,
            move_loop_pruned: 0,
            lmr_applied: 0,
            lmr_research: 0,
            splits: 0,
            nodes_by_depth: zero,
            cutoff_by_depth: zero,
            first_move_cutoff_by_depth: zero,
        }
    }
}

#[cfg(feature = "search-stats")]
impl SearchStats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// 見出しごとのカウンタ一覧
    fn sections(&self) -> [(&'static str, Vec<(&'static str, u64)>); 4] {
        [
            (
                "nodes",
                vec![
                    ("search", self.nodes_searched),
                    ("qsearch", self.qs_nodes),
                    ("tt cutoff", self.tt_cutoff),
                ],
            ),
            (
                "before move loop",
                vec![
                    ("razoring", self.razoring_applied),
                    ("static futility", self.futility_pruned),
                    ("null move tried", self.nmp_attempted),
                    ("null move cut", self.nmp_cutoff),
                    ("null move verified", self.nmp_verification),
                    ("probcut tried", self.probcut_attempted),
                    ("probcut cut", self.probcut_cutoff),
                    ("iid", self.iid_applied),
                ],
            ),
            (
                "move loop",
                vec![
                    ("pruned", self.move_loop_pruned),
                    ("lmr", self.lmr_applied),
                    ("lmr re-search", self.lmr_research),
                    ("singular ext", self.singular_extension),
                    ("check ext", self.check_extension),
                ],
            ),
            ("parallel", vec![("splits", self.splits)]),
        ]
    }

    /// ログ用の複数行レポート
    ///
    /// 末尾に深さごとの「最初の手でカットした割合」（手の並びの良さ）を付ける。
    pub fn format_report(&self) -> String {
        use std::fmt::Write;

        let mut out = String::from("search stats\n");
        for (title, rows) in self.sections() {
            let _ = writeln!(out, "[{title}]");
            for (label, n) in rows {
                let _ = writeln!(out, "  {label:<20}{n:>12}");
            }
        }
        let _ = writeln!(out, "[first-move cutoff rate]");
        let rows = self.cutoff_by_depth.iter().zip(&self.first_move_cutoff_by_depth);
        for (d, (&cuts, &first)) in rows.enumerate().filter(|(_, (c, _))| **c > 0) {
            let pct = 100.0 * first as f64 / cuts as f64;
            let _ = writeln!(
                out,
                "  depth {d:>2}  nodes {:>9}  {first:>7}/{cuts:<7} {pct:>5.1}%",
                self.nodes_by_depth[d]
            );
        }
        out
    }
}

// =============================================================================
// 統計マクロ
// =============================================================================

/// カウンタを1増やす（feature 無効時は何もしない）
#[cfg(feature = "search-stats")]
macro_rules! inc_stat {
    ($st:expr, $field:ident) => {
        $st.stats.$field += 1;
    };
}

#[cfg(not(feature = "search-stats"))]
macro_rules! inc_stat {
    ($st:expr, $field:ident) => {};
}

/// 深さ別のカウンタを1増やす。深さは表の範囲に丸める
#[cfg(feature = "search-stats")]
macro_rules! inc_stat_by_depth {
    ($st:expr, $field:ident, $depth:expr) => {
        let d = (($depth).max(0) as usize).min($crate::search::stats::STATS_MAX_DEPTH - 1);
        $st.stats.$field[d] += 1;
    };
}

#[cfg(not(feature = "search-stats"))]
macro_rules! inc_stat_by_depth {
    ($st:expr, $field:ident, $depth:expr) => {};
}

pub(super) use inc_stat;
pub(super) use inc_stat_by_depth;

#[cfg(all(test, feature = "search-stats"))]
mod tests {
    use super::*;

    #[test]
    fn test_report_lists_depth_rows() {
        let mut stats = SearchStats::default();
        stats.nodes_by_depth[3] = 10;
        stats.cutoff_by_depth[3] = 4;
        stats.first_move_cutoff_by_depth[3] = 3;
        let report = stats.format_report();
        assert!(report.contains("depth  3"));
        assert!(report.contains(" 75.0%"));
        assert!(!report.contains("depth  4"));
        stats.reset();
        assert_eq!(stats.cutoff_by_depth[3], 0);
    }
}
