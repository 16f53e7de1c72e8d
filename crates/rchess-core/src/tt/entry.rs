//! 置換表エントリ

use super::{DEPTH_ENTRY_OFFSET, GENERATION_CYCLE, GENERATION_DELTA, GENERATION_MASK};
use crate::types::{Bound, Depth, Move, Value};
use std::sync::atomic::{AtomicI16, AtomicU8, AtomicU16, Ordering};

/// 置換表エントリから読み出したデータ
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TTData {
    pub mv: Move,
    pub value: Value,
    pub eval: Value,
    pub depth: Depth,
    pub bound: Bound,
}

/// 置換表エントリ（10バイト）
///
/// | フィールド | ビット幅 |
/// |-----------|---------|
/// | key16     | 16 |
/// | move16    | 16 |
/// | value16   | 16 |
/// | eval16    | 16 |
/// | depth8    | 8  |
/// | genbound8 | 6 (generation) + 2 (bound) |
#[repr(C)]
pub struct TTEntry {
    key16: AtomicU16,
    move16: AtomicU16,
    value16: AtomicI16,
    eval16: AtomicI16,
    depth8: AtomicU8,
    genbound8: AtomicU8,
}

const _: () = assert!(std::mem::size_of::<TTEntry>() == 10);

impl TTEntry {
    pub const fn new() -> Self {
        Self {
            key16: AtomicU16::new(0),
            move16: AtomicU16::new(0),
            value16: AtomicI16::new(0),
            eval16: AtomicI16::new(0),
            depth8: AtomicU8::new(0),
            genbound8: AtomicU8::new(0),
        }
    }

    #[inline]
    pub fn key16(&self) -> u16 {
        self.key16.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn depth8(&self) -> u8 {
        self.depth8.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_occupied(&self) -> bool {
        self.depth8() != 0
    }

    #[inline]
    pub fn bound(&self) -> Bound {
        Bound::from_u8(self.genbound8.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn generation8(&self) -> u8 {
        self.genbound8.load(Ordering::Relaxed) & GENERATION_MASK as u8
    }

    /// 現在の世代からの経過（GENERATION_DELTA単位）
    #[inline]
    pub fn relative_age(&self, generation8: u8) -> u8 {
        let gb = self.genbound8.load(Ordering::Relaxed) as u16;
        ((GENERATION_CYCLE + generation8 as u16 - gb) & GENERATION_MASK) as u8
    }

    /// 世代だけを更新（probeヒット時）
    #[inline]
    pub fn refresh(&self, generation8: u8) {
        let gb = self.genbound8.load(Ordering::Relaxed);
        self.genbound8
            .store(generation8 | (gb & (GENERATION_DELTA - 1)), Ordering::Relaxed);
    }

    /// データを読み出す
    #[inline]
    pub fn read(&self) -> TTData {
        TTData {
            mv: Move::from_u16(self.move16.load(Ordering::Relaxed)),
            value: Value::new(self.value16.load(Ordering::Relaxed) as i32),
            eval: Value::new(self.eval16.load(Ordering::Relaxed) as i32),
            depth: self.depth8() as i32 + DEPTH_ENTRY_OFFSET,
            bound: self.bound(),
        }
    }

    /// データを書き込む
    #[allow(clippy::too_many_arguments)]
    pub fn save(
        &self,
        key16: u16,
        value: Value,
        bound: Bound,
        depth: Depth,
        mv: Move,
        eval: Value,
        generation8: u8,
    ) {
        debug_assert!(depth > DEPTH_ENTRY_OFFSET);
        debug_assert!(depth - DEPTH_ENTRY_OFFSET < 256);
        self.move16.store(mv.to_u16(), Ordering::Relaxed);
        self.value16.store(value.raw() as i16, Ordering::Relaxed);
        self.eval16.store(eval.raw() as i16, Ordering::Relaxed);
        self.depth8.store((depth - DEPTH_ENTRY_OFFSET) as u8, Ordering::Relaxed);
        self.genbound8.store(generation8 | bound as u8, Ordering::Relaxed);
        self.key16.store(key16, Ordering::Release);
    }

    /// 空にする
    pub fn clear(&self) {
        self.key16.store(0, Ordering::Relaxed);
        self.move16.store(0, Ordering::Relaxed);
        self.value16.store(0, Ordering::Relaxed);
        self.eval16.store(0, Ordering::Relaxed);
        self.depth8.store(0, Ordering::Relaxed);
        self.genbound8.store(0, Ordering::Relaxed);
    }
}

impl Default for TTEntry {
    fn default() -> Self {
        Self::new()
    }
}
