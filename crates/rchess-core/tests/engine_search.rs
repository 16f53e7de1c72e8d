//! Engine を通した探索の結合テスト

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rchess_core::search::TimeOptions;
use rchess_core::{
    ChessBoard, Color, Engine, EngineOptions, InfoCallback, LimitsType, MaterialEvaluator, Move,
    Score, SearchInfo, Value,
};
use serial_test::serial;

const STARTPOS: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
const MATE_IN_ONE: &str = "6k1/5ppp/8/8/8/8/8/R5K1 w - - 0 1";
const STALEMATE: &str = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";

fn mv(s: &str) -> Move {
    Move::from_uci(s).unwrap()
}

fn engine(threads: usize) -> Engine<ChessBoard, MaterialEvaluator> {
    let options = EngineOptions { threads, hash_mb: 8, ..EngineOptions::default() };
    Engine::new(options, MaterialEvaluator::new()).unwrap()
}

fn collector() -> (InfoCallback, Arc<Mutex<Vec<SearchInfo>>>) {
    let infos = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&infos);
    let cb: InfoCallback = Arc::new(move |info: &SearchInfo| sink.lock().unwrap().push(info.clone()));
    (cb, infos)
}

#[test]
fn test_mate_in_one() {
    let mut e = engine(1);
    let pos = ChessBoard::from_fen(MATE_IN_ONE).unwrap();
    let result = e.search(&pos, LimitsType::depth(4), None);
    assert_eq!(result.best_move, Some(mv("a1a8")));
    assert_eq!(result.score, Value::mate_in(1));
}

#[test]
fn test_stalemate_root() {
    let mut e = engine(1);
    let pos = ChessBoard::from_fen(STALEMATE).unwrap();
    let (cb, infos) = collector();
    let result = e.search(&pos, LimitsType::depth(4), Some(cb));
    assert_eq!(result.best_move, None);
    assert_eq!(result.score, Value::DRAW);
    let infos = infos.lock().unwrap();
    assert!(matches!(infos.last(), Some(SearchInfo::BestMove { best: None, .. })));
}

#[test]
fn test_repeated_searches_reuse_engine() {
    let mut e = engine(1);
    let pos = ChessBoard::startpos();
    let first = e.search(&pos, LimitsType::depth(5), None);
    assert!(e.hashfull() >= 0);
    e.clear();
    let second = e.search(&pos, LimitsType::depth(5), None);
    // 置換表を消せば同じ探索になる
    assert_eq!(first.best_move, second.best_move);
    assert_eq!(first.score, second.score);
    assert_eq!(first.nodes, second.nodes);
}

#[test]
#[serial]
fn test_movetime_is_respected() {
    let mut e = engine(1);
    let pos = ChessBoard::startpos();
    let start = Instant::now();
    let result = e.search(&pos, LimitsType::movetime(200), None);
    let elapsed = start.elapsed();
    assert!(result.best_move.is_some());
    assert!(elapsed < Duration::from_millis(200 + 150), "took {elapsed:?}");
}

#[test]
#[serial]
fn test_clock_time_is_respected() {
    let mut e = engine(1);
    let pos = ChessBoard::startpos();
    let mut limits = LimitsType::new();
    limits.time[Color::White.index()] = 1000;
    limits.time[Color::Black.index()] = 1000;
    let start = Instant::now();
    let result = e.search(&pos, limits, None);
    assert!(result.best_move.is_some());
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[test]
#[serial]
fn test_stop_infinite_search() {
    let mut e = engine(2);
    let pos = ChessBoard::startpos();
    let limits = LimitsType { infinite: true, ..LimitsType::default() };
    let (cb, infos) = collector();
    e.start_search(&pos, limits, Some(cb));
    std::thread::sleep(Duration::from_millis(150));
    assert!(e.is_searching());
    e.stop();
    let result = e.wait().expect("search was running");
    assert!(result.best_move.is_some());
    assert!(!e.is_searching());

    let infos = infos.lock().unwrap();
    let best_moves = infos.iter().filter(|i| matches!(i, SearchInfo::BestMove { .. })).count();
    assert_eq!(best_moves, 1);
}

#[test]
#[serial]
fn test_ponderhit_switches_to_timed_search() {
    let mut e = engine(1);
    let pos = ChessBoard::startpos();
    let mut limits = LimitsType { ponder: true, ..LimitsType::default() };
    limits.time = [300, 300];
    e.start_search(&pos, limits, None);

    // ponder 中は時間切れで止まらない
    std::thread::sleep(Duration::from_millis(400));
    assert!(e.is_searching());

    e.ponder_hit();
    let start = Instant::now();
    let result = e.wait().expect("search was running");
    assert!(result.best_move.is_some());
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[test]
fn test_node_limit_stops_search() {
    let mut e = engine(1);
    let pos = ChessBoard::startpos();
    let limits = LimitsType { nodes: 20_000, ..LimitsType::default() };
    let result = e.search(&pos, limits, None);
    assert!(result.best_move.is_some());
    assert!(result.depth < 64);
}

#[test]
fn test_multi_thread_finds_mate() {
    let mut e = engine(4);
    let pos = ChessBoard::from_fen(MATE_IN_ONE).unwrap();
    let result = e.search(&pos, LimitsType::depth(8), None);
    assert_eq!(result.best_move, Some(mv("a1a8")));
    assert_eq!(result.score, Value::mate_in(1));
}

#[test]
fn test_multi_thread_search_is_sound() {
    let mut e = engine(4);
    let pos = ChessBoard::startpos();
    let (cb, infos) = collector();
    let result = e.search(&pos, LimitsType::depth(9), Some(cb));
    let best = result.best_move.unwrap();
    assert!(pos.legal_moves().contains(&best));
    assert!(result.score.abs() < Value::KNOWN_WIN);
    assert_eq!(result.depth, 9);

    let infos = infos.lock().unwrap();
    for info in infos.iter() {
        if let SearchInfo::Iteration { score: Score::Cp(cp), .. } = info {
            assert!(cp.abs() < 2000, "unexpected score {cp}");
        }
    }
}

#[test]
fn test_set_threads_and_hash_between_searches() {
    let mut e = engine(1);
    let pos = ChessBoard::from_fen(MATE_IN_ONE).unwrap();
    e.set_threads(3).unwrap();
    e.set_hash_size(2);
    assert_eq!(e.options().threads, 3);
    assert_eq!(e.options().hash_mb, 2);
    let result = e.search(&pos, LimitsType::depth(5), None);
    assert_eq!(result.best_move, Some(mv("a1a8")));

    let options = EngineOptions {
        threads: 1,
        time: TimeOptions { move_overhead: 50, ..TimeOptions::default() },
        ..e.options().clone()
    };
    e.set_options(options).unwrap();
    assert_eq!(e.options().threads, 1);
    assert_eq!(e.options().time.move_overhead, 50);
}

/// 勝ち・負け・引き分けが確定しているか。確定していれば符号を返す
fn verdict(v: Value) -> Option<i32> {
    if v.is_mate_score() {
        Some(v.raw().signum())
    } else if v == Value::DRAW {
        Some(0)
    } else {
        None
    }
}

#[test]
fn test_full_width_keeps_decisive_verdicts() {
    let suite = [
        MATE_IN_ONE,
        // 2つのルークで2手詰め
        "7k/8/8/8/8/8/R7/1R4K1 w - - 0 1",
        // 詰まされる側の手番
        "k7/8/1K6/8/8/8/8/7R b - - 0 1",
        // 駒不足の引き分け
        "8/8/4k3/8/8/3K4/8/8 w - - 0 1",
    ];
    let mut selective = engine(1);
    let options = EngineOptions { full_width: true, hash_mb: 8, ..EngineOptions::default() };
    let mut full = Engine::new(options, MaterialEvaluator::new()).unwrap();

    for fen in suite {
        let pos = ChessBoard::from_fen(fen).unwrap();
        selective.clear();
        full.clear();
        let a = selective.search(&pos, LimitsType::depth(5), None);
        let b = full.search(&pos, LimitsType::depth(5), None);
        let Some(expected) = verdict(a.score) else {
            continue;
        };
        assert_eq!(verdict(b.score), Some(expected), "{fen}: {:?} vs {:?}", a.score, b.score);
    }

    let pos = ChessBoard::from_fen(MATE_IN_ONE).unwrap();
    let result = full.search(&pos, LimitsType::depth(4), None);
    assert_eq!(result.best_move, Some(mv("a1a8")));
    assert_eq!(result.score, Value::mate_in(1));
}
