use grid_2048::engine::{Board, GameConfig};
use grid_2048::policy::Policy;
use grid_2048::trace::{self, Recorder, Run};
use anyhow::Context;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = GameConfig {
        width: args.width,
        height: args.height,
        win_value: args.win_value,
        four_probability: args.four_probability,
    };
    config.validate().context("invalid board configuration")?;
    if let Some(dir) = &args.out_dir {
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    }

    let base_seed = args.seed.unwrap_or_else(trace::now_unix_seconds);
    info!(games = args.games, base_seed, policy = ?args.policy, "starting batch");

    let pb = if !args.quiet {
        let pb = ProgressBar::new(args.games);
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} [{bar:30}] {pos}/{len} games | {msg}")?
                .progress_chars("=> ")
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    } else {
        None
    };

    let start = Instant::now();
    let results: Vec<GameResult> = (0..args.games)
        .into_par_iter()
        .map(|i| {
            let seed = base_seed.wrapping_add(i);
            let run = play_game(config, args.policy.into(), seed, args.max_steps);
            if let Some(dir) = &args.out_dir {
                let path = run_path(dir, i, seed);
                if let Err(e) = trace::write_run_to_path(&path, &run) {
                    warn!(path = %path.display(), "failed to write trace: {e}");
                }
            }
            if let Some(pb) = &pb {
                pb.inc(1);
                pb.set_message(format!("last: {} pts", run.meta.final_points));
            }
            GameResult::from(&run)
        })
        .collect();
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let summary = Summary::from_results(&results, start.elapsed().as_secs_f64());
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "Games: {} | wins: {} | mean points: {:.1} | best points: {} | best tile: {} | games/sec: {:.1}",
            summary.games,
            summary.wins,
            summary.mean_points,
            summary.best_points,
            summary.best_tile,
            summary.games as f64 / summary.elapsed_s.max(1e-6)
        );
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(name = "batch", about = "Play many 2048 games in parallel and summarize them")]
struct Args {
    /// Number of games to play
    #[arg(long, default_value_t = 100)]
    games: u64,

    /// Board width
    #[arg(long, default_value_t = 4)]
    width: usize,

    /// Board height
    #[arg(long, default_value_t = 4)]
    height: usize,

    /// Tile value that counts as a win
    #[arg(long, default_value_t = 2048)]
    win_value: u32,

    /// Chance that a spawned tile is a 4
    #[arg(long, default_value_t = 0.2)]
    four_probability: f64,

    /// Base RNG seed; game i uses seed + i (defaults to the current time)
    #[arg(long)]
    seed: Option<u64>,

    /// Move policy
    #[arg(long, value_enum, default_value_t = PolicyArg::Greedy)]
    policy: PolicyArg,

    /// Stop each game after this many moves
    #[arg(long)]
    max_steps: Option<u64>,

    /// Write a binary trace of every game into this directory
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// Suppress the progress bar
    #[arg(long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PolicyArg {
    Greedy,
    Random,
}

impl From<PolicyArg> for Policy {
    fn from(p: PolicyArg) -> Self {
        match p {
            PolicyArg::Greedy => Policy::Greedy,
            PolicyArg::Random => Policy::Random,
        }
    }
}

fn play_game(config: GameConfig, policy: Policy, seed: u64, max_steps: Option<u64>) -> Run {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut board = Board::new_game(config, &mut rng);
    let mut recorder = Recorder::new(&board);
    let mut move_count: u64 = 0;
    while !board.is_over() {
        let Some(direction) = policy.next_move(&board, &mut rng) else { break };
        let outcome = board.make_move(direction, &mut rng);
        recorder.record(&outcome, &board);
        board.complete_move();
        move_count += 1;
        if max_steps.is_some_and(|limit| move_count >= limit) {
            break;
        }
    }
    let policy_name = match policy {
        Policy::Greedy => "greedy",
        Policy::Random => "random",
    };
    recorder.finish(&board, Some(seed), Some(policy_name.to_string()))
}

fn run_path(dir: &Path, index: u64, seed: u64) -> PathBuf {
    dir.join(format!("run-{:06}-{}.g2run", index, seed))
}

#[derive(Debug, Clone, Copy)]
struct GameResult {
    points: u64,
    highest_tile: u32,
    won: bool,
    steps: u32,
}

impl From<&Run> for GameResult {
    fn from(run: &Run) -> Self {
        Self {
            points: run.meta.final_points,
            highest_tile: run.meta.highest_tile,
            won: run.meta.won,
            steps: run.meta.steps,
        }
    }
}

#[derive(Debug, Serialize)]
struct Summary {
    games: u64,
    wins: u64,
    mean_points: f64,
    best_points: u64,
    best_tile: u32,
    mean_steps: f64,
    elapsed_s: f64,
}

impl Summary {
    fn from_results(results: &[GameResult], elapsed_s: f64) -> Self {
        let games = results.len() as u64;
        let denom = games.max(1) as f64;
        Self {
            games,
            wins: results.iter().filter(|r| r.won).count() as u64,
            mean_points: results.iter().map(|r| r.points as f64).sum::<f64>() / denom,
            best_points: results.iter().map(|r| r.points).max().unwrap_or(0),
            best_tile: results.iter().map(|r| r.highest_tile).max().unwrap_or(0),
            mean_steps: results.iter().map(|r| r.steps as f64).sum::<f64>() / denom,
            elapsed_s,
        }
    }
}
