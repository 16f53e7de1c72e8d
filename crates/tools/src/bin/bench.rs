use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use rchess_core::{Engine, LimitsType, MaterialEvaluator, SearchResult};
use serde::Serialize;
use tools::config::ToolConfig;
use tools::suite::load_suite;

/// 固定深さ（または固定時間）で局面集を探索し、ノード数と NPS を測る。
///
/// # よく使うコマンド例
///
/// - 組み込み局面集を深さ10、4スレッドで:
///   `cargo run --release -p tools --bin bench -- --depth 10 --threads 4`
///
/// - 設定ファイルと局面集を指定し、結果を JSON Lines で保存:
///   `cargo run --release -p tools --bin bench -- --config bench.toml --positions suite.fen --json out.jsonl`
///
/// 同じ設定・1スレッドならノード数は毎回一致する。
#[derive(Parser, Debug)]
#[command(author, version, about = "Fixed-depth search benchmark for rchess-core")]
struct Cli {
    /// TOML config file ([engine] / [bench] sections)
    #[arg(long)]
    config: Option<PathBuf>,

    /// FEN file (one position per line); overrides [bench].positions
    #[arg(long)]
    positions: Option<PathBuf>,

    /// Search depth; overrides [bench].depth
    #[arg(long)]
    depth: Option<i32>,

    /// Fixed time per position in milliseconds (instead of a fixed depth)
    #[arg(long, conflicts_with = "depth")]
    movetime: Option<i64>,

    /// Search threads; overrides [engine].threads
    #[arg(long)]
    threads: Option<usize>,

    /// Hash size in MiB; overrides [engine].hash_mb
    #[arg(long)]
    hash_mb: Option<usize>,

    /// Disable all selective pruning and reductions
    #[arg(long, default_value_t = false)]
    full_width: bool,

    /// Write one JSON record per position to this file
    #[arg(long)]
    json: Option<PathBuf>,
}

/// 1局面分の結果
#[derive(Debug, Serialize)]
struct BenchRecord {
    fen: String,
    depth: i32,
    best_move: Option<String>,
    ponder_move: Option<String>,
    score: i32,
    nodes: u64,
    time_ms: u64,
}

impl BenchRecord {
    fn new(fen: &str, result: &SearchResult, time_ms: u64) -> Self {
        Self {
            fen: fen.to_string(),
            depth: result.depth,
            best_move: result.best_move.map(|m| m.to_string()),
            ponder_move: result.ponder_move.map(|m| m.to_string()),
            score: result.score.raw(),
            nodes: result.nodes,
            time_ms,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let mut cfg = ToolConfig::load_or_default(cli.config.as_deref())?;
    if let Some(t) = cli.threads {
        cfg.engine.threads = t;
    }
    if let Some(h) = cli.hash_mb {
        cfg.engine.hash_mb = h;
    }
    if cli.full_width {
        cfg.engine.full_width = true;
    }
    let depth = cli.depth.unwrap_or(cfg.bench.depth);
    let positions_path = cli.positions.or_else(|| cfg.bench.positions.as_ref().map(PathBuf::from));
    let suite = load_suite(positions_path.as_deref())?;

    let mut engine = Engine::new(cfg.engine.clone(), MaterialEvaluator::new())?;
    log::info!("bench: {} positions, depth {depth}, {:?}", suite.len(), engine.options());
    let limits = match cli.movetime {
        Some(ms) => LimitsType::movetime(ms),
        None => LimitsType::depth(depth),
    };

    let mut records = Vec::with_capacity(suite.len());
    let total_start = Instant::now();
    for (i, p) in suite.iter().enumerate() {
        engine.clear();
        let start = Instant::now();
        let result = engine.search(&p.board, limits.clone(), None);
        let time_ms = start.elapsed().as_millis() as u64;
        println!(
            "[{:>2}/{}] nodes {:>10} time {:>6}ms bestmove {} ({})",
            i + 1,
            suite.len(),
            result.nodes,
            time_ms,
            result.best_move.map_or_else(|| "(none)".to_string(), |m| m.to_string()),
            p.fen
        );
        records.push(BenchRecord::new(&p.fen, &result, time_ms));
    }
    let total_ms = (total_start.elapsed().as_millis() as u64).max(1);
    let total_nodes: u64 = records.iter().map(|r| r.nodes).sum();

    println!("===========================");
    println!("Total time (ms) : {total_ms}");
    println!("Nodes searched  : {total_nodes}");
    println!("Nodes/second    : {}", total_nodes * 1000 / total_ms);

    if let Some(path) = cli.json {
        let mut out = String::new();
        for r in &records {
            out.push_str(&serde_json::to_string(r)?);
            out.push('\n');
        }
        std::fs::write(&path, out).with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("wrote {}", path.display());
    }
    Ok(())
}
