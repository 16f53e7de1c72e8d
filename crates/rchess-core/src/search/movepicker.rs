//! MovePicker（指し手オーダリング）
//!
//! 探索中に指し手を段階的に生成し、カットオフを起こしやすい手から返す。
//!
//! ## Lazy Generation
//!
//! 各段階の指し手はその段階に入ったときに初めて生成・スコアリングする。
//! 置換表の手やキラー手でカットオフすれば、以降の生成は行われない。
//!
//! ## History参照を保持しない設計
//!
//! MovePickerはHistory参照をフィールドとして保持しない。`next_move()` で
//! 呼び出し側のHistoryTablesを受け取る。これにより分岐点（split point）に
//! MovePickerを移して、複数スレッドが自分の履歴テーブルで続きを引ける。
//!
//! ## Stage
//!
//! ### 通常探索（王手なし）
//! 1. MainTT - 置換表の指し手
//! 2. CaptureInit / GoodCapture - 駒取り（MVV-LVA順、SEE >= 0）
//! 3. Refutation - キラー手2つとカウンター手2つ
//! 4. QuietInit / Quiet - 静かな手（History順）
//! 5. BadCapture - 後回しにした損な駒取り
//!
//! ### 王手回避
//! EvasionTT → EvasionInit → Evasion
//!
//! ### 静止探索
//! QSearchTT → QCaptureInit → QCapture → (深さ0のみ) QCheckInit → QCheck。
//! 深い静止探索では RecaptureInit → Recapture（直前の移動先への取り返しのみ）。
//!
//! ### ProbCut
//! ProbCutTT → ProbCutInit → ProbCut（SEEがしきい値を超える駒取りのみ）

use super::history::HistoryTables;
use crate::position::{GenType, MoveList, Position};
use crate::types::{
    DEPTH_QS_CHECKS, DEPTH_QS_NO_CHECKS, DEPTH_QS_RECAPTURES, Depth, ExtMove, Move, PieceType,
    Square, Value, piece_type_value,
};
use smallvec::SmallVec;

// =============================================================================
// Stage（指し手生成の段階）
// =============================================================================

/// 指し手生成の段階
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Stage {
    // 通常探索（王手なし）
    MainTT,
    CaptureInit,
    GoodCapture,
    Refutation,
    QuietInit,
    Quiet,
    BadCapture,

    // 王手回避
    EvasionTT,
    EvasionInit,
    Evasion,

    // ProbCut
    ProbCutTT,
    ProbCutInit,
    ProbCut,

    // 静止探索
    QSearchTT,
    QCaptureInit,
    QCapture,
    QCheckInit,
    QCheck,
    RecaptureInit,
    Recapture,

    /// 終端
    Done,
}

// =============================================================================
// MovePicker
// =============================================================================

/// 段階的に指し手を返すカーソル
pub struct MovePicker {
    stage: Stage,
    tt_move: Move,
    excluded: Move,
    /// killer1, killer2, counter1, counter2
    refutations: [Move; 4],
    moves: MoveList,
    cur: usize,
    bad_captures: SmallVec<[Move; 32]>,
    depth: Depth,
    recapture_sq: Square,
    threshold: Value,
}

impl Default for MovePicker {
    fn default() -> Self {
        Self {
            stage: Stage::Done,
            tt_move: Move::NONE,
            excluded: Move::NONE,
            refutations: [Move::NONE; 4],
            moves: MoveList::new(),
            cur: 0,
            bad_captures: SmallVec::new(),
            depth: 0,
            recapture_sq: Square::A1,
            threshold: Value::ZERO,
        }
    }
}

impl MovePicker {
    /// 通常探索用
    ///
    /// 王手されていれば回避手の段階から始める。`excluded` は一度も返さない。
    pub fn new<P: Position>(
        pos: &P,
        tt_move: Move,
        excluded: Move,
        depth: Depth,
        killers: [Move; 2],
        counter_moves: [Move; 2],
    ) -> Self {
        debug_assert!(depth > 0);
        let stage = if pos.in_check() { Stage::EvasionTT } else { Stage::MainTT };
        let mut mp = Self {
            stage,
            excluded,
            refutations: [killers[0], killers[1], counter_moves[0], counter_moves[1]],
            depth,
            ..Self::default()
        };
        mp.tt_move = mp.validate_tt_move(pos, tt_move);
        mp
    }

    /// 静止探索用
    ///
    /// `recapture_sq` は深い静止探索で取り返しのみを生成するときの対象マス。
    pub fn new_qsearch<P: Position>(
        pos: &P,
        tt_move: Move,
        depth: Depth,
        recapture_sq: Square,
    ) -> Self {
        debug_assert!(depth <= 0);
        let mut mp = Self { depth, recapture_sq, ..Self::default() };
        if pos.in_check() {
            mp.stage = Stage::EvasionTT;
            mp.tt_move = mp.validate_tt_move(pos, tt_move);
        } else if depth > DEPTH_QS_RECAPTURES {
            mp.stage = Stage::QSearchTT;
            let tt_move = mp.validate_tt_move(pos, tt_move);
            // 王手を生成しない深さでは置換表の手も駒取りに限る
            mp.tt_move = if depth > DEPTH_QS_NO_CHECKS || pos.is_capture_or_promotion(tt_move) {
                tt_move
            } else {
                Move::NONE
            };
        } else {
            mp.stage = Stage::RecaptureInit;
        }
        mp
    }

    /// ProbCut用（SEEが `threshold` を超える駒取りのみ）
    pub fn new_probcut<P: Position>(pos: &P, tt_move: Move, threshold: Value) -> Self {
        debug_assert!(!pos.in_check());
        let mut mp = Self { stage: Stage::ProbCutTT, threshold, ..Self::default() };
        let tt_move = mp.validate_tt_move(pos, tt_move);
        mp.tt_move = if tt_move.is_some()
            && pos.is_capture(tt_move)
            && pos.see_ge(tt_move, threshold + 1)
        {
            tt_move
        } else {
            Move::NONE
        };
        mp
    }

    fn validate_tt_move<P: Position>(&self, pos: &P, tt_move: Move) -> Move {
        if tt_move.is_some() && tt_move != self.excluded && pos.pseudo_legal(tt_move) {
            tt_move
        } else {
            Move::NONE
        }
    }

    /// 現在の段階
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// 置換表の手（検証済み）
    pub fn tt_move(&self) -> Move {
        self.tt_move
    }

    /// 次の指し手を返す。尽きたら None
    pub fn next_move<P: Position>(&mut self, pos: &P, history: &HistoryTables) -> Option<Move> {
        loop {
            match self.stage {
                // ==============================
                // TT手を返す
                // ==============================
                Stage::MainTT | Stage::EvasionTT | Stage::QSearchTT | Stage::ProbCutTT => {
                    self.stage = match self.stage {
                        Stage::MainTT => Stage::CaptureInit,
                        Stage::EvasionTT => Stage::EvasionInit,
                        Stage::QSearchTT => Stage::QCaptureInit,
                        _ => Stage::ProbCutInit,
                    };
                    if self.tt_move.is_some() {
                        return Some(self.tt_move);
                    }
                }

                // ==============================
                // 駒取りの生成
                // ==============================
                Stage::CaptureInit | Stage::QCaptureInit | Stage::ProbCutInit => {
                    self.generate(pos, GenType::Captures);
                    self.score_captures(pos);
                    self.stage = match self.stage {
                        Stage::CaptureInit => Stage::GoodCapture,
                        Stage::QCaptureInit => Stage::QCapture,
                        _ => Stage::ProbCut,
                    };
                }

                // ==============================
                // 良い駒取り（損な駒取りは後回し）
                // ==============================
                Stage::GoodCapture => {
                    while let Some(m) = self.pick_best() {
                        if pos.see_ge(m, Value::ZERO) {
                            return Some(m);
                        }
                        self.bad_captures.push(m);
                    }
                    self.cur = 0;
                    self.stage = Stage::Refutation;
                }

                // ==============================
                // キラー手・カウンター手
                // ==============================
                Stage::Refutation => {
                    while self.cur < self.refutations.len() {
                        let i = self.cur;
                        self.cur += 1;
                        let m = self.refutations[i];
                        if m.is_some()
                            && !self.refutations[..i].contains(&m)
                            && self.is_candidate(m)
                            && !pos.is_capture_or_promotion(m)
                            && pos.pseudo_legal(m)
                        {
                            return Some(m);
                        }
                    }
                    self.stage = Stage::QuietInit;
                }

                // ==============================
                // 静かな手の生成
                // ==============================
                Stage::QuietInit => {
                    self.generate(pos, GenType::Quiets);
                    self.score_quiets(pos, history);
                    insertion_sort(&mut self.moves);
                    self.stage = Stage::Quiet;
                }

                Stage::Quiet => {
                    while self.cur < self.moves.len() {
                        let m = self.moves[self.cur].mv;
                        self.cur += 1;
                        if self.is_candidate(m) && !self.refutations.contains(&m) {
                            return Some(m);
                        }
                    }
                    self.cur = 0;
                    self.stage = Stage::BadCapture;
                }

                // ==============================
                // 悪い駒取り
                // ==============================
                // GoodCapture で MVV-LVA 順に積んであるので、積んだ順に返す
                Stage::BadCapture => {
                    if self.cur < self.bad_captures.len() {
                        let m = self.bad_captures[self.cur];
                        self.cur += 1;
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }

                // ==============================
                // 回避手
                // ==============================
                Stage::EvasionInit => {
                    self.generate(pos, GenType::Evasions);
                    self.score_evasions(pos, history);
                    self.stage = Stage::Evasion;
                }

                Stage::Evasion | Stage::QCapture => {
                    if let Some(m) = self.pick_best() {
                        return Some(m);
                    }
                    self.stage = if self.stage == Stage::QCapture && self.depth >= DEPTH_QS_CHECKS {
                        Stage::QCheckInit
                    } else {
                        Stage::Done
                    };
                }

                // ==============================
                // ProbCut
                // ==============================
                Stage::ProbCut => {
                    while let Some(m) = self.pick_best() {
                        if pos.is_capture(m) && pos.see_ge(m, self.threshold + 1) {
                            return Some(m);
                        }
                    }
                    self.stage = Stage::Done;
                }

                // ==============================
                // 静止探索の王手
                // ==============================
                Stage::QCheckInit => {
                    self.generate(pos, GenType::QuietChecks);
                    self.stage = Stage::QCheck;
                }

                Stage::QCheck => {
                    while self.cur < self.moves.len() {
                        let m = self.moves[self.cur].mv;
                        self.cur += 1;
                        if self.is_candidate(m) {
                            return Some(m);
                        }
                    }
                    self.stage = Stage::Done;
                }

                // ==============================
                // 取り返し
                // ==============================
                Stage::RecaptureInit => {
                    self.generate(pos, GenType::Captures);
                    let sq = self.recapture_sq;
                    self.moves.retain(|e| e.mv.to() == sq);
                    self.score_captures(pos);
                    self.stage = Stage::Recapture;
                }

                Stage::Recapture => {
                    if let Some(m) = self.pick_best() {
                        return Some(m);
                    }
                    self.stage = Stage::Done;
                }

                Stage::Done => return None,
            }
        }
    }

    /// テスト・デバッグ用に残りの手をイテレータとして取り出す
    pub fn iter<'a, P: Position>(
        &'a mut self,
        pos: &'a P,
        history: &'a HistoryTables,
    ) -> impl Iterator<Item = Move> + 'a {
        std::iter::from_fn(move || self.next_move(pos, history))
    }

    // =========================================================================
    // 生成とスコアリング
    // =========================================================================

    fn generate<P: Position>(&mut self, pos: &P, gen_type: GenType) {
        self.moves.clear();
        self.cur = 0;
        pos.generate(gen_type, &mut self.moves);
    }

    /// MVV-LVA: 取られる駒の価値 - 動かす駒の価値（昇格は差分を加える）
    fn score_captures<P: Position>(&mut self, pos: &P) {
        for ext in self.moves.iter_mut() {
            ext.value = mvv_lva(pos, ext.mv);
        }
    }

    fn score_quiets<P: Position>(&mut self, pos: &P, history: &HistoryTables) {
        for ext in self.moves.iter_mut() {
            ext.value = history.main.value(pos.moved_piece(ext.mv), ext.mv.to());
        }
    }

    /// 駒取りは得なら最優先、損なら最後。静かな手はHistory順
    fn score_evasions<P: Position>(&mut self, pos: &P, history: &HistoryTables) {
        const CAPTURE_BONUS: i32 = 1 << 16;
        for ext in self.moves.iter_mut() {
            let m = ext.mv;
            ext.value = if pos.is_capture(m) {
                let see = pos.see(m).raw();
                if see < 0 { see - CAPTURE_BONUS } else { mvv_lva(pos, m) + CAPTURE_BONUS }
            } else {
                history.main.value(pos.moved_piece(m), m.to())
            };
        }
    }

    /// [cur, len) の最大スコアの手を cur に持ってきて返す。返してよい手がなければ None
    fn pick_best(&mut self) -> Option<Move> {
        while self.cur < self.moves.len() {
            let best = (self.cur..self.moves.len())
                .max_by_key(|&i| (self.moves[i].value, std::cmp::Reverse(i)))
                .unwrap_or(self.cur);
            self.moves.swap(self.cur, best);
            let m = self.moves[self.cur].mv;
            self.cur += 1;
            if self.is_candidate(m) {
                return Some(m);
            }
        }
        None
    }

    /// 置換表の手（既に返した）と除外手は返さない
    #[inline]
    fn is_candidate(&self, m: Move) -> bool {
        m != self.tt_move && m != self.excluded
    }
}

/// MVV-LVA スコア
fn mvv_lva<P: Position>(pos: &P, m: Move) -> i32 {
    let captured = piece_type_value(pos.captured_by(m)).raw();
    let mover = piece_type_value(pos.moved_piece(m).piece_type()).raw();
    let promo = m
        .promotion()
        .map_or(0, |pt| pt.value().raw() - PieceType::Pawn.value().raw());
    captured - mover + promo
}

/// 降順の安定な挿入ソート
fn insertion_sort(moves: &mut [ExtMove]) {
    for p in 1..moves.len() {
        let tmp = moves[p];
        let mut q = p;
        while q > 0 && moves[q - 1].value < tmp.value {
            moves[q] = moves[q - 1];
            q -= 1;
        }
        moves[q] = tmp;
    }
}

// =============================================================================
// テスト
// =============================================================================
