//! TranspositionTable本体
//!
//! - Cluster: エントリのグループ
//! - TranspositionTable: テーブル本体
//! - probe/store操作

use super::entry::{TTData, TTEntry};
use super::{CLUSTER_SIZE, GENERATION_DELTA};
use crate::types::{Bound, Depth, Move, Value};
use std::sync::atomic::{AtomicU8, Ordering};

/// クラスター構造
/// 同じハッシュインデックスに対して複数のエントリを持つ
#[repr(C, align(32))]
pub struct Cluster {
    entries: [TTEntry; CLUSTER_SIZE],
    _padding: [u8; 2], // 10 * 3 + 2 = 32 bytes
}

impl Cluster {
    const fn new() -> Self {
        const EMPTY: TTEntry = TTEntry::new();
        Self {
            entries: [EMPTY; CLUSTER_SIZE],
            _padding: [0; 2],
        }
    }
}

impl Default for Cluster {
    fn default() -> Self {
        Self::new()
    }
}

// クラスターは32バイト（キャッシュライン1本に2クラスター）
const _: () = assert!(std::mem::size_of::<Cluster>() == 32);

/// 置換表
pub struct TranspositionTable {
    /// クラスターの配列
    table: Box<[Cluster]>,
    /// 世代カウンター（下位2bitは使用しない）
    generation8: AtomicU8,
}

impl TranspositionTable {
    /// 新しい置換表を作成（サイズはMB単位）
    pub fn new(mb_size: usize) -> Self {
        let cluster_count = Self::cluster_count_for(mb_size);
        let table = (0..cluster_count).map(|_| Cluster::new()).collect::<Vec<_>>();
        log::debug!("transposition table: {mb_size} MB, {cluster_count} clusters");
        Self {
            table: table.into_boxed_slice(),
            generation8: AtomicU8::new(0),
        }
    }

    fn cluster_count_for(mb_size: usize) -> usize {
        let count = mb_size.max(1) * 1024 * 1024 / std::mem::size_of::<Cluster>();
        count.max(2)
    }

    /// クラスター数
    pub fn cluster_count(&self) -> usize {
        self.table.len()
    }

    /// クリア
    pub fn clear(&self) {
        self.generation8.store(0, Ordering::Relaxed);
        for cluster in self.table.iter() {
            for entry in &cluster.entries {
                entry.clear();
            }
        }
    }

    /// 新しい探索を開始（世代を進める）
    pub fn new_search(&self) {
        self.generation8.fetch_add(GENERATION_DELTA, Ordering::Relaxed);
    }

    /// 現在の世代を取得
    #[inline]
    pub fn generation(&self) -> u8 {
        self.generation8.load(Ordering::Relaxed)
    }

    /// 置換表を検索
    ///
    /// 検証タグが一致したエントリを返す。ヒットしたエントリは現世代に更新する。
    pub fn probe(&self, key: u64) -> Option<TTData> {
        let cluster = self.cluster(key);
        let key16 = key as u16;
        cluster
            .entries
            .iter()
            .find(|e| e.key16() == key16 && e.is_occupied())
            .map(|e| {
                e.refresh(self.generation());
                e.read()
            })
    }

    /// 置換表に書き込む
    ///
    /// 同じキーのエントリか空きエントリがあればそこへ、なければクラスター内で
    /// 最も価値の低いエントリを上書きする。指し手なしで同じ局面を書く場合は既存の指し手を残す。
    pub fn store(
        &self,
        key: u64,
        value: Value,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
    ) {
        let cluster = self.cluster(key);
        let key16 = key as u16;
        let gen8 = self.generation();
        let mut mv = mv;

        let mut replace = &cluster.entries[0];
        for entry in &cluster.entries {
            if !entry.is_occupied() || entry.key16() == key16 {
                if mv.is_none() && entry.is_occupied() {
                    mv = entry.read().mv;
                }
                replace = entry;
                break;
            }
            if retention(entry, gen8) < retention(replace, gen8) {
                replace = entry;
            }
        }
        replace.save(key16, value, bound, depth, mv, eval, gen8);
    }

    /// 置換表の使用率を1000分率で返す（現世代のエントリのみ数える）
    pub fn hashfull(&self) -> i32 {
        let gen8 = self.generation();
        let sample_count = 1000.min(self.table.len());
        let count = self
            .table
            .iter()
            .take(sample_count)
            .flat_map(|c| c.entries.iter())
            .filter(|e| e.is_occupied() && e.relative_age(gen8) == 0)
            .count();
        (count * 1000 / (sample_count * CLUSTER_SIZE)) as i32
    }

    /// クラスターインデックスを計算
    #[inline]
    fn cluster_index(&self, key: u64) -> usize {
        // key * cluster_count / 2^64 でインデックスを計算
        ((key as u128 * self.table.len() as u128) >> 64) as usize
    }

    #[inline]
    fn cluster(&self, key: u64) -> &Cluster {
        &self.table[self.cluster_index(key)]
    }
}

/// 残す価値。現世代 → Exact → 深さ の順に比較し、最小のものを追い出す
#[inline]
fn retention(entry: &TTEntry, gen8: u8) -> (bool, bool, u8) {
    (
        entry.relative_age(gen8) == 0,
        entry.bound() == Bound::Exact,
        entry.depth8(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEPTH_NONE;
    use proptest::prelude::*;

    /// 同じクラスターに入る別のキーを作る
    fn same_cluster_keys(tt: &TranspositionTable, n: usize) -> Vec<u64> {
        let base = tt.cluster_index(0x1234_5678_9ABC_DEF0);
        let mut keys = Vec::new();
        let mut k: u64 = 0x1234_5678_9ABC_DEF0;
        while keys.len() < n {
            if tt.cluster_index(k) == base && keys.iter().all(|&x: &u64| x as u16 != k as u16) {
                keys.push(k);
            }
            k = k.wrapping_add(0x1_0001);
        }
        keys
    }

    #[test]
    fn test_tt_new() {
        let tt = TranspositionTable::new(1); // 1MB
        assert_eq!(tt.cluster_count(), 1024 * 1024 / 32);
        assert_eq!(tt.generation(), 0);
    }

    #[test]
    fn test_tt_new_search() {
        let tt = TranspositionTable::new(1);
        tt.new_search();
        assert_eq!(tt.generation(), GENERATION_DELTA);
        tt.new_search();
        assert_eq!(tt.generation(), GENERATION_DELTA * 2);
        for _ in 0..300 {
            tt.new_search();
        }
        assert_eq!(tt.generation() % GENERATION_DELTA, 0);
    }

    #[test]
    fn test_tt_probe_empty() {
        let tt = TranspositionTable::new(1);
        assert!(tt.probe(12345).is_none());
    }

    #[test]
    fn test_tt_store_and_probe() {
        let tt = TranspositionTable::new(1);
        let key = 0xDEAD_BEEF_0000_1111;
        let mv = Move::from_uci("g1f3").unwrap();
        tt.store(key, Value::new(50), Bound::Exact, 10, mv, Value::new(7));

        let data = tt.probe(key).expect("entry must be found");
        assert_eq!(data.value, Value::new(50));
        assert_eq!(data.bound, Bound::Exact);
        assert_eq!(data.depth, 10);
        assert_eq!(data.mv, mv);
        assert_eq!(data.eval, Value::new(7));
    }

    #[test]
    fn test_tt_keeps_move_on_moveless_store() {
        let tt = TranspositionTable::new(1);
        let key = 42u64 << 40 | 7;
        let mv = Move::from_uci("e2e4").unwrap();
        tt.store(key, Value::new(1), Bound::Lower, 5, mv, Value::ZERO);
        tt.store(key, Value::new(2), Bound::Upper, 6, Move::NONE, Value::ZERO);
        let data = tt.probe(key).unwrap();
        assert_eq!(data.mv, mv);
        assert_eq!(data.value, Value::new(2));
    }

    #[test]
    fn test_tt_clear() {
        let tt = TranspositionTable::new(1);
        tt.store(99, Value::new(1), Bound::Exact, 3, Move::NONE, Value::ZERO);
        assert!(tt.probe(99).is_some());
        tt.clear();
        assert!(tt.probe(99).is_none());
    }

    #[test]
    fn test_tt_replacement_prefers_current_generation() {
        let tt = TranspositionTable::new(1);
        let keys = same_cluster_keys(&tt, CLUSTER_SIZE + 1);

        // 古い世代の深いエントリ
        tt.store(keys[0], Value::ZERO, Bound::Exact, 30, Move::NONE, Value::ZERO);
        tt.new_search();
        // 現世代の浅いエントリ
        tt.store(keys[1], Value::ZERO, Bound::Upper, 2, Move::NONE, Value::ZERO);
        tt.store(keys[2], Value::ZERO, Bound::Upper, 3, Move::NONE, Value::ZERO);

        tt.store(keys[3], Value::ZERO, Bound::Upper, 1, Move::NONE, Value::ZERO);
        assert!(tt.probe(keys[0]).is_none());
        assert!(tt.probe(keys[1]).is_some());
        assert!(tt.probe(keys[2]).is_some());
        assert!(tt.probe(keys[3]).is_some());
    }

    #[test]
    fn test_tt_replacement_prefers_exact_then_depth() {
        let tt = TranspositionTable::new(1);
        let keys = same_cluster_keys(&tt, CLUSTER_SIZE + 2);

        tt.store(keys[0], Value::ZERO, Bound::Exact, 2, Move::NONE, Value::ZERO);
        tt.store(keys[1], Value::ZERO, Bound::Lower, 20, Move::NONE, Value::ZERO);
        tt.store(keys[2], Value::ZERO, Bound::Lower, 8, Move::NONE, Value::ZERO);

        // 浅い非Exactが追い出される
        tt.store(keys[3], Value::ZERO, Bound::Upper, 1, Move::NONE, Value::ZERO);
        assert!(tt.probe(keys[0]).is_some());
        assert!(tt.probe(keys[1]).is_some());
        assert!(tt.probe(keys[2]).is_none());

        // 次は keys[3]（深さ1の非Exact）
        tt.store(keys[4], Value::ZERO, Bound::Upper, 1, Move::NONE, Value::ZERO);
        assert!(tt.probe(keys[3]).is_none());
        assert!(tt.probe(keys[0]).is_some());
    }

    #[test]
    fn test_tt_hashfull() {
        let tt = TranspositionTable::new(1);
        assert_eq!(tt.hashfull(), 0);
        for i in 0..(tt.cluster_count() as u64) {
            let key = ((i as u128) << 64).div_ceil(tt.cluster_count() as u128) as u64;
            tt.store(key, Value::ZERO, Bound::Exact, 1, Move::NONE, Value::ZERO);
        }
        let full = tt.hashfull();
        assert!(full > 300 && full <= 334, "hashfull = {full}");
        tt.new_search();
        assert_eq!(tt.hashfull(), 0);
    }

    #[test]
    fn test_tt_eval_only_entry() {
        let tt = TranspositionTable::new(1);
        tt.store(5, Value::NONE, Bound::None, DEPTH_NONE, Move::NONE, Value::new(33));
        let data = tt.probe(5).unwrap();
        assert_eq!(data.bound, Bound::None);
        assert_eq!(data.eval, Value::new(33));
        assert_eq!(data.value, Value::NONE);
    }

    proptest! {
        #[test]
        fn prop_store_then_probe_is_compatible(
            key in any::<u64>(),
            value in -30000i32..30000,
            depth in -1i32..100,
            bound_bits in 1u8..4,
        ) {
            let tt = TranspositionTable::new(1);
            let bound = Bound::from_u8(bound_bits);
            tt.store(key, Value::new(value), bound, depth, Move::NONE, Value::ZERO);
            let data = tt.probe(key).unwrap();
            prop_assert!(data.depth >= depth);
            prop_assert_eq!(data.bound, bound);
            prop_assert_eq!(data.value, Value::new(value));
        }
    }
}
