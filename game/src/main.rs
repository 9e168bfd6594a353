mod human;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use human::HumanPlayer;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tictactoe_rl::board::{GameStatus, Mark};
use tictactoe_rl::config::TrainingConfig;
use tictactoe_rl::players::{Agent, Player, RandomPlayer};
use tictactoe_rl::policy::PolicyStore;
use tictactoe_rl::state_key::StateKey;
use tictactoe_rl::Game;

#[derive(Parser)]
#[command(about = "Tic-tac-toe agent that learns state values by self-play")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Train both sides by self-play and save their policies
    Train {
        /// JSON training config; fields left out keep their defaults
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        episodes: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Directory for policy_p1, policy_p2 and the dated archives
        #[arg(long, default_value = ".")]
        out: PathBuf,
        #[arg(long)]
        resume_p1: Option<PathBuf>,
        #[arg(long)]
        resume_p2: Option<PathBuf>,
    },
    /// Play against a trained policy
    Play {
        #[arg(long, default_value = "policy_p1")]
        policy: PathBuf,
        /// Take the first move yourself
        #[arg(long)]
        human_first: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Pit a trained policy against a random player
    Evaluate {
        #[arg(long, default_value = "policy_p1")]
        policy: PathBuf,
        #[arg(long, default_value_t = 1_000)]
        games: usize,
        /// Let the policy move second
        #[arg(long)]
        as_second: bool,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Show the best-valued states of a policy file
    Inspect {
        #[arg(long, default_value = "policy_p1")]
        policy: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn rng_from(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_entropy, StdRng::seed_from_u64)
}

/// A missing or broken policy is fatal here: playing without one would just
/// be random play.
fn load_policy(path: &Path) -> Result<PolicyStore> {
    PolicyStore::load(path)
        .with_context(|| format!("cannot play without a policy ({})", path.display()))
}

fn train(
    config: Option<PathBuf>,
    episodes: Option<usize>,
    seed: Option<u64>,
    out: PathBuf,
    resume_p1: Option<PathBuf>,
    resume_p2: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::default(),
    };
    config.episodes = episodes.unwrap_or(config.episodes);
    config.seed = seed.or(config.seed);
    config.resume_p1 = resume_p1.or(config.resume_p1);
    config.resume_p2 = resume_p2.or(config.resume_p2);

    let (p1, p2, stats) = tictactoe_rl::train(&config)?;
    println!("{stats}");

    fs::create_dir_all(&out).with_context(|| format!("failed to create {}", out.display()))?;
    for (policy, name) in [(&p1, "p1"), (&p2, "p2")] {
        for path in [out.join(format!("policy_{name}")), PolicyStore::archive_path(&out, name)] {
            policy.save(&path)?;
            info!("saved {} states to {}", policy.len(), path.display());
        }
    }
    Ok(())
}

fn play(policy: PathBuf, human_first: bool, seed: Option<u64>) -> Result<()> {
    let policy = load_policy(&policy)?;
    info!("policy holds {} states", policy.len());
    let human_mark = if human_first { Mark::Cross } else { Mark::Nought };
    let human = Box::new(HumanPlayer::new("You", human_mark, io::stdin().lock()));
    let computer = Box::new(Agent::new("computer", human_mark.other(), 0.0, policy)?);
    let mut game = Game::new(human, computer);
    let mut rng = rng_from(seed);
    let status = loop {
        let mover = game.current_player().name().to_owned();
        let status = game.play_turn(&mut rng)?;
        if mover != "You" {
            println!("The computer played.");
        }
        if status.is_over() {
            break status;
        }
    };
    println!("{}", game.board);
    match status {
        GameStatus::Win(mark) if mark == human_mark => println!("Congratulations, you have won!"),
        GameStatus::Win(_) => println!("The computer wins."),
        _ => println!("The game ended in a draw."),
    }
    Ok(())
}

fn evaluate(policy: PathBuf, games: usize, as_second: bool, seed: Option<u64>) -> Result<()> {
    let policy = load_policy(&policy)?;
    let mark = if as_second { Mark::Nought } else { Mark::Cross };
    let mut agent = Agent::new("computer", mark, 0.0, policy)?;
    let mut random = RandomPlayer::new("random", mark.other());
    let mut rng = rng_from(seed);
    let stats = tictactoe_rl::evaluate(&mut agent, &mut random, games, false, &mut rng)?;
    println!("{} as {}: {stats}", agent.name(), mark);
    Ok(())
}

fn inspect(policy: PathBuf, top: usize) -> Result<()> {
    let store = load_policy(&policy)?;
    println!("{} holds {} states", policy.display(), store.len());
    for (key, value) in store.top(top) {
        let board = StateKey::decode(key.as_str())?;
        println!("value {value:.4}  {key}\n{board}");
    }
    Ok(())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match Cli::parse().command {
        Command::Train {
            config,
            episodes,
            seed,
            out,
            resume_p1,
            resume_p2,
        } => train(config, episodes, seed, out, resume_p1, resume_p2),
        Command::Play {
            policy,
            human_first,
            seed,
        } => play(policy, human_first, seed),
        Command::Evaluate {
            policy,
            games,
            as_second,
            seed,
        } => evaluate(policy, games, as_second, seed),
        Command::Inspect { policy, top } => inspect(policy, top),
    }
}
