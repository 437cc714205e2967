mod simulation;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use std::time::Instant;

use serpentine_game::{
    BoardDifficulty, PrizeKind, PrizeWeights, SessionConfig, draw_prize, generate,
};
use simulation::{SimulationConfig, run_batch};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl From<Difficulty> for BoardDifficulty {
    fn from(value: Difficulty) -> Self {
        match value {
            Difficulty::Easy => Self::Easy,
            Difficulty::Medium => Self::Medium,
            Difficulty::Hard => Self::Hard,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "serpentine-tester", version)]
#[command(about = "Headless QA harness for the Serpentine engine")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Auto-play full sessions and report aggregate statistics
    Simulate {
        /// Number of sessions to play
        #[arg(long, default_value_t = 100)]
        games: u32,

        /// Base seed; each game derives its own sub-seed
        #[arg(long, default_value_t = 1337)]
        seed: u64,

        /// Board size (multiple of 10) for generated boards
        #[arg(long, default_value_t = 100)]
        board_size: u16,

        /// Generate boards at this difficulty instead of the classic layout
        #[arg(long, value_enum)]
        difficulty: Option<Difficulty>,
    },
    /// Generate boards in bulk and report placement quality
    BoardStats {
        #[arg(long, default_value_t = 200)]
        boards: u32,

        #[arg(long, default_value_t = 100)]
        board_size: u16,

        #[arg(long, value_enum, default_value_t = Difficulty::Medium)]
        difficulty: Difficulty,

        #[arg(long, default_value_t = 1337)]
        seed: u64,
    },
    /// Draw the prize wheel repeatedly and compare against the sliders
    PrizeCheck {
        #[arg(long, default_value_t = 100_000)]
        draws: u32,

        #[arg(long, default_value_t = 33)]
        full: u8,

        #[arg(long, default_value_t = 33)]
        partial: u8,

        #[arg(long, default_value_t = 34)]
        denied: u8,

        #[arg(long, default_value_t = 1337)]
        seed: u64,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let start = Instant::now();

    match args.command {
        Command::Simulate {
            games,
            seed,
            board_size,
            difficulty,
        } => run_simulate(games, seed, board_size, difficulty)?,
        Command::BoardStats {
            boards,
            board_size,
            difficulty,
            seed,
        } => run_board_stats(boards, board_size, difficulty, seed),
        Command::PrizeCheck {
            draws,
            full,
            partial,
            denied,
            seed,
        } => run_prize_check(draws, full, partial, denied, seed)?,
    }

    println!(
        "\n{} in {:.2}s",
        "done".green().bold(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}

fn run_simulate(
    games: u32,
    seed: u64,
    board_size: u16,
    difficulty: Option<Difficulty>,
) -> Result<()> {
    println!("{}", "Serpentine batch simulation".bold());
    let mut config = SimulationConfig::new(seed, games);
    if let Some(difficulty) = difficulty {
        config = config.with_generated_board(board_size, difficulty.into());
        println!("  board: generated {board_size} squares, {difficulty:?}");
    } else {
        println!("  board: classic 100 squares");
    }

    let batch = run_batch(&config)?;
    println!("  games finished : {}/{}", batch.finished, batch.games);
    println!("  avg turns      : {:.1}", batch.avg_turns());
    println!(
        "  hazards hit    : {} snakes, {} ladders",
        batch.snakes_hit, batch.ladders_hit
    );
    println!("  side events    : {}", batch.side_events);
    println!(
        "  fallback rate  : {:.2}% of {} tasks",
        batch.fallback_rate(),
        batch.tasks_shown
    );
    println!(
        "  prizes         : {} full / {} partial / {} denied",
        batch.prizes[0], batch.prizes[1], batch.prizes[2]
    );

    if batch.finished < batch.games {
        println!("{}", "warning: some sessions hit the turn cap".yellow());
    }
    Ok(())
}

fn run_board_stats(boards: u32, board_size: u16, difficulty: Difficulty, seed: u64) {
    println!("{}", "Board generation sweep".bold());
    let preset = BoardDifficulty::from(difficulty).preset();
    let mut rng = SmallRng::seed_from_u64(seed);

    let mut met_targets = 0u32;
    let mut snakes_placed = 0u64;
    let mut snakes_target = 0u64;
    let mut ladders_placed = 0u64;
    let mut ladders_target = 0u64;
    for _ in 0..boards {
        let (_, report) = generate(board_size, preset, &mut rng);
        met_targets += u32::from(report.met_targets());
        snakes_placed += report.snakes_placed as u64;
        snakes_target += report.snakes_target as u64;
        ladders_placed += report.ladders_placed as u64;
        ladders_target += report.ladders_target as u64;
    }

    println!("  boards         : {boards} x {board_size} squares ({difficulty:?})");
    println!(
        "  full placement : {met_targets}/{boards} ({:.1}%)",
        f64::from(met_targets) * 100.0 / f64::from(boards)
    );
    println!("  snakes placed  : {snakes_placed}/{snakes_target}");
    println!("  ladders placed : {ladders_placed}/{ladders_target}");
}

fn run_prize_check(draws: u32, full: u8, partial: u8, denied: u8, seed: u64) -> Result<()> {
    println!("{}", "Prize slider convergence".bold());
    let config = SessionConfig {
        prize: PrizeWeights {
            full,
            partial,
            denied,
        },
        ..SessionConfig::default()
    };
    anyhow::ensure!(
        config.prize.total() == 100,
        "sliders must sum to 100 (got {})",
        config.prize.total()
    );

    let mut rng = SmallRng::seed_from_u64(seed);
    let mut counts = [0u32; 3];
    for _ in 0..draws {
        match draw_prize(&config, &mut rng) {
            PrizeKind::Full => counts[0] += 1,
            PrizeKind::Partial => counts[1] += 1,
            PrizeKind::Denied => counts[2] += 1,
        }
    }

    for (label, (count, target)) in ["full", "partial", "denied"]
        .iter()
        .zip(counts.iter().zip([full, partial, denied]))
    {
        let observed = f64::from(*count) * 100.0 / f64::from(draws);
        let delta = observed - f64::from(target);
        let line = format!("  {label:<7}: {observed:6.2}% (target {target}%, delta {delta:+.2})");
        if delta.abs() < 1.0 {
            println!("{}", line.green());
        } else {
            println!("{}", line.yellow());
        }
    }
    Ok(())
}
