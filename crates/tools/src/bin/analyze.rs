use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use rchess_core::{ChessBoard, Engine, InfoCallback, LimitsType, MaterialEvaluator, Move, SearchInfo};
use tools::config::ToolConfig;

/// 1局面を解析し、UCI 形式の info 行を標準出力に流す。
///
/// # よく使うコマンド例
///
/// - 初期局面から数手進めて5秒読む:
///   `cargo run --release -p tools --bin analyze -- --moves e2e4 e7e5 --movetime 5000`
///
/// - FEN を MultiPV 3 で深さ12まで:
///   `cargo run --release -p tools --bin analyze -- --fen "<FEN>" --depth 12 --multipv 3`
#[derive(Parser, Debug)]
#[command(author, version, about = "Analyse a single position with rchess-core")]
struct Cli {
    /// TOML config file ([engine] section)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Start position (default: standard start position)
    #[arg(long)]
    fen: Option<String>,

    /// Moves played from the start position, in coordinate notation
    #[arg(long, num_args = 1..)]
    moves: Vec<String>,

    /// Maximum depth
    #[arg(long)]
    depth: Option<i32>,

    /// Time per move in milliseconds
    #[arg(long)]
    movetime: Option<i64>,

    /// Node limit
    #[arg(long)]
    nodes: Option<u64>,

    /// Stop once a mate in this many moves is found
    #[arg(long)]
    mate: Option<i32>,

    /// Number of principal variations
    #[arg(long, default_value_t = 1)]
    multipv: usize,

    /// Restrict the root to these moves
    #[arg(long, num_args = 1..)]
    searchmoves: Vec<String>,

    /// Search threads; overrides [engine].threads
    #[arg(long)]
    threads: Option<usize>,

    /// Print currmove lines as well
    #[arg(long, default_value_t = false)]
    verbose: bool,
}

fn parse_move(s: &str) -> Result<Move> {
    Move::from_uci(s).with_context(|| format!("invalid move: {s}"))
}

fn build_limits(cli: &Cli) -> Result<LimitsType> {
    let mut limits = LimitsType::new();
    if let Some(d) = cli.depth {
        limits.depth = d;
    }
    if let Some(t) = cli.movetime {
        limits.movetime = t;
    }
    if let Some(n) = cli.nodes {
        limits.nodes = n;
    }
    if let Some(m) = cli.mate {
        limits.mate = m;
    }
    limits.multi_pv = cli.multipv;
    limits.search_moves = cli.searchmoves.iter().map(|s| parse_move(s)).collect::<Result<_>>()?;
    if limits.depth == 0 && limits.movetime == 0 && limits.nodes == 0 && limits.mate == 0 {
        bail!("give at least one of --depth, --movetime, --nodes or --mate");
    }
    Ok(limits)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let mut cfg = ToolConfig::load_or_default(cli.config.as_deref())?;
    if let Some(t) = cli.threads {
        cfg.engine.threads = t;
    }

    let mut board = match &cli.fen {
        Some(fen) => ChessBoard::from_fen(fen)?,
        None => ChessBoard::startpos(),
    };
    for m in &cli.moves {
        board.push_uci(m)?;
    }
    let limits = build_limits(&cli)?;

    let verbose = cli.verbose;
    let callback: InfoCallback = Arc::new(move |info: &SearchInfo| {
        if verbose || !matches!(info, SearchInfo::CurrentMove { .. }) {
            println!("{info}");
        }
    });

    let mut engine = Engine::new(cfg.engine, MaterialEvaluator::new())?;
    let result = engine.search(&board, limits, Some(callback));
    log::info!("depth {} nodes {} score {:?}", result.depth, result.nodes, result.score);
    Ok(())
}
