//! Self-play training of two state-value agents.

use crate::board::{Board, GameStatus, Mark};
use crate::config::TrainingConfig;
use crate::error::Result;
use crate::players::{Agent, Player};
use crate::policy::PolicyStore;
use crate::state_key::StateKey;
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;

pub const P1_NAME: &str = "p1";
pub const P2_NAME: &str = "p2";

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Idle,
    EpisodeInProgress,
    EpisodeTerminal(GameStatus),
    PolicyUpdate,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct TrainingStats {
    pub episodes: usize,
    pub cross_wins: usize,
    pub nought_wins: usize,
    pub draws: usize,
}

impl TrainingStats {
    fn record(&mut self, status: GameStatus) {
        self.episodes += 1;
        match status {
            GameStatus::Win(Mark::Cross) => self.cross_wins += 1,
            GameStatus::Win(Mark::Nought) => self.nought_wins += 1,
            GameStatus::Draw => self.draws += 1,
            GameStatus::InProgress => {}
        }
    }
}

impl fmt::Display for TrainingStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} episodes: X won {}, O won {}, {} draws",
            self.episodes, self.cross_wins, self.nought_wins, self.draws
        )
    }
}

/// Plays two agents against each other and updates their policies after
/// every episode. The first agent always plays `Mark::Cross` and moves first.
pub struct Trainer<R: Rng> {
    config: TrainingConfig,
    agents: [Agent; 2],
    board: Board,
    rng: R,
    phase: Phase,
    stats: TrainingStats,
    trajectory: Vec<(Mark, StateKey)>,
}

impl<R: Rng> Trainer<R> {
    pub fn new(
        config: TrainingConfig,
        mut first: Agent,
        mut second: Agent,
        rng: R,
    ) -> Result<Self> {
        config.validate()?;
        first.set_mark(Mark::Cross);
        second.set_mark(Mark::Nought);
        first.reset_history();
        second.reset_history();
        Ok(Trainer {
            config,
            agents: [first, second],
            board: Board::new(),
            rng,
            phase: Phase::Idle,
            stats: TrainingStats::default(),
            trajectory: Vec::with_capacity(9),
        })
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn stats(&self) -> TrainingStats {
        self.stats
    }

    /// Every board produced in the most recent episode, with the mark that
    /// produced it, in the order they were played.
    pub fn last_episode(&self) -> &[(Mark, StateKey)] {
        &self.trajectory
    }

    pub fn agents(&self) -> &[Agent; 2] {
        &self.agents
    }

    pub fn into_agents(self) -> [Agent; 2] {
        self.agents
    }

    /// Plays one episode from an empty board and applies the policy update.
    ///
    /// Each move fills a cell, so an episode ends after at most nine moves.
    pub fn play_episode(&mut self) -> Result<GameStatus> {
        self.board.reset();
        self.trajectory.clear();
        self.phase = Phase::EpisodeInProgress;
        let mut turn = 0;
        let status = loop {
            let agent = &mut self.agents[turn];
            let mv = agent.choose_move(&self.board, &mut self.rng)?;
            self.board.place(mv, agent.mark())?;
            let key = self.board.state_key();
            self.trajectory.push((agent.mark(), key.clone()));
            agent.record(key);
            match self.board.status() {
                GameStatus::InProgress => turn = 1 - turn,
                terminal => break terminal,
            }
        };
        self.phase = Phase::EpisodeTerminal(status);
        debug!("episode {} ended with {status:?}\n{}", self.stats.episodes + 1, self.board);

        self.phase = Phase::PolicyUpdate;
        self.feed_rewards(status);
        self.stats.record(status);
        self.phase = Phase::Idle;
        Ok(status)
    }

    fn feed_rewards(&mut self, status: GameStatus) {
        let rewards = self.config.rewards;
        let (first, second) = match status {
            GameStatus::Win(Mark::Cross) => (rewards.win, rewards.loss),
            GameStatus::Win(Mark::Nought) => (rewards.loss, rewards.win),
            GameStatus::Draw => (rewards.draw_first, rewards.draw_second),
            GameStatus::InProgress => return,
        };
        for (agent, reward) in self.agents.iter_mut().zip([first, second]) {
            agent.feed_reward(reward, self.config.learning_rate, self.config.discount);
            agent.reset_history();
        }
    }

    fn decay_exploration(&mut self) -> Result<()> {
        let Some(decay) = self.config.exploration_decay else {
            return Ok(());
        };
        for agent in &mut self.agents {
            let rate = (agent.exploration_rate() * decay.factor).max(decay.floor);
            if rate < agent.exploration_rate() {
                agent.set_exploration_rate(rate)?;
                debug!("{} exploration rate is now {rate:.3}", agent.name());
            }
        }
        Ok(())
    }

    /// Runs `config.episodes` episodes.
    pub fn train(&mut self) -> Result<TrainingStats> {
        info!("training for {} episodes", self.config.episodes);
        for episode in 1..=self.config.episodes {
            self.play_episode()?;
            if let Some(decay) = self.config.exploration_decay {
                if episode % decay.every == 0 {
                    self.decay_exploration()?;
                }
            }
            if self.config.log_every > 0 && episode % self.config.log_every == 0 {
                info!(
                    "{}; {} and {} states known",
                    self.stats,
                    self.agents[0].policy().len(),
                    self.agents[1].policy().len()
                );
            }
        }
        info!("training finished: {}", self.stats);
        Ok(self.stats)
    }
}

/// Training entry point: builds both agents from `config` (resuming from
/// existing policy files when configured) and trains them.
///
/// Returns the first and second player's policies.
pub fn train(config: &TrainingConfig) -> Result<(PolicyStore, PolicyStore, TrainingStats)> {
    config.validate()?;
    let p1_policy = config
        .resume_p1
        .as_ref()
        .map(PolicyStore::load_or_default)
        .unwrap_or_default();
    let p2_policy = config
        .resume_p2
        .as_ref()
        .map(PolicyStore::load_or_default)
        .unwrap_or_default();
    let first = Agent::new(P1_NAME, Mark::Cross, config.p1_exploration_rate, p1_policy)?;
    let second = Agent::new(P2_NAME, Mark::Nought, config.p2_exploration_rate, p2_policy)?;
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut trainer = Trainer::new(config.clone(), first, second, rng)?;
    let stats = trainer.train()?;
    let [first, second] = trainer.into_agents();
    Ok((first.into_policy(), second.into_policy(), stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExplorationDecay;

    fn trainer(config: TrainingConfig, seed: u64) -> Trainer<StdRng> {
        let first = Agent::new(
            P1_NAME,
            Mark::Cross,
            config.p1_exploration_rate,
            PolicyStore::new(),
        )
        .unwrap();
        let second = Agent::new(
            P2_NAME,
            Mark::Nought,
            config.p2_exploration_rate,
            PolicyStore::new(),
        )
        .unwrap();
        Trainer::new(config, first, second, StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn episode_ends_idle_with_terminal_status() {
        let mut trainer = trainer(TrainingConfig::default(), 1);
        assert_eq!(trainer.phase(), Phase::Idle);
        let status = trainer.play_episode().unwrap();
        assert!(status.is_over());
        assert_eq!(trainer.phase(), Phase::Idle);
        assert_eq!(trainer.stats().episodes, 1);
        assert!(trainer.agents().iter().all(|agent| agent.history().is_empty()));
    }

    #[test]
    fn both_sides_learn_from_an_episode() {
        let mut trainer = trainer(TrainingConfig::default(), 2);
        trainer.play_episode().unwrap();
        let [first, second] = trainer.agents();
        // X moves at least three times and O at least twice before a result.
        assert!(first.policy().len() >= 3);
        assert!(second.policy().len() >= 2);
    }

    #[test]
    fn winner_states_gain_value() {
        let config = TrainingConfig {
            p1_exploration_rate: 1.0,
            p2_exploration_rate: 1.0,
            ..TrainingConfig::default()
        };
        let mut trainer = trainer(config, 4);
        let status = loop {
            let status = trainer.play_episode().unwrap();
            if status == GameStatus::Win(Mark::Cross) {
                break status;
            }
        };
        assert_eq!(status, GameStatus::Win(Mark::Cross));
        let final_key = trainer.board.state_key();
        // The winning board has been visited exactly once by X.
        let value = trainer.agents()[0].policy().get(&final_key);
        assert!((value - 0.2 * 0.9).abs() < 1e-12);
    }

    /// Plays random episodes until one ends with `wanted`, returning both
    /// policies as they were before that episode.
    fn play_until(trainer: &mut Trainer<StdRng>, wanted: GameStatus) -> [PolicyStore; 2] {
        loop {
            let [first, second] = trainer.agents();
            let before = [first.policy().clone(), second.policy().clone()];
            if trainer.play_episode().unwrap() == wanted {
                return before;
            }
        }
    }

    /// Checks each side's last board moved into its reward after one update.
    fn assert_final_rewards(
        trainer: &Trainer<StdRng>,
        before: &[PolicyStore; 2],
        rewards: [f64; 2],
    ) {
        let config = &trainer.config;
        for (side, mark) in [Mark::Cross, Mark::Nought].into_iter().enumerate() {
            let (_, key) = trainer
                .last_episode()
                .iter()
                .rev()
                .find(|(mover, _)| *mover == mark)
                .unwrap();
            let old = before[side].get(key);
            let expected = old + config.learning_rate * (config.discount * rewards[side] - old);
            let value = trainer.agents()[side].policy().get(key);
            assert!((value - expected).abs() < 1e-12, "{mark}: {value} != {expected}");
        }
    }

    fn random_play() -> TrainingConfig {
        TrainingConfig {
            p1_exploration_rate: 1.0,
            p2_exploration_rate: 1.0,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn nought_win_rewards_second_player() {
        let mut trainer = trainer(random_play(), 5);
        let before = play_until(&mut trainer, GameStatus::Win(Mark::Nought));
        assert_final_rewards(&trainer, &before, [0.0, 1.0]);
    }

    #[test]
    fn draw_rewards_both_players_equally() {
        let mut trainer = trainer(random_play(), 6);
        let before = play_until(&mut trainer, GameStatus::Draw);
        assert_final_rewards(&trainer, &before, [0.5, 0.5]);
        // Seen for the first time, X's full board gets lr * gamma * 0.5.
        let (_, last) = trainer.last_episode().last().unwrap();
        if before[0].get(last) == 0.0 {
            let value = trainer.agents()[0].policy().get(last);
            assert!((value - 0.2 * 0.9 * 0.5).abs() < 1e-12);
        }
    }

    #[test]
    fn cross_win_rewards_first_player() {
        let mut trainer = trainer(random_play(), 7);
        let before = play_until(&mut trainer, GameStatus::Win(Mark::Cross));
        assert_final_rewards(&trainer, &before, [1.0, 0.0]);
    }

    #[test]
    fn same_seed_same_policies() {
        let config = TrainingConfig {
            episodes: 200,
            log_every: 0,
            ..TrainingConfig::default()
        };
        let mut a = trainer(config.clone(), 42);
        let mut b = trainer(config, 42);
        assert_eq!(a.train().unwrap(), b.train().unwrap());
        let [a1, a2] = a.into_agents();
        let [b1, b2] = b.into_agents();
        assert_eq!(a1.into_policy(), b1.into_policy());
        assert_eq!(a2.into_policy(), b2.into_policy());
    }

    #[test]
    fn exploration_decays_to_floor() {
        let config = TrainingConfig {
            episodes: 40,
            log_every: 0,
            p1_exploration_rate: 0.8,
            p2_exploration_rate: 0.4,
            exploration_decay: Some(ExplorationDecay {
                every: 10,
                factor: 0.5,
                floor: 0.15,
            }),
            ..TrainingConfig::default()
        };
        let mut trainer = trainer(config, 8);
        trainer.train().unwrap();
        let [first, second] = trainer.agents();
        assert!((first.exploration_rate() - 0.15).abs() < 1e-12);
        assert!((second.exploration_rate() - 0.15).abs() < 1e-12);
    }

    #[test]
    fn train_entry_point_counts_every_episode() {
        let config = TrainingConfig {
            episodes: 300,
            seed: Some(13),
            log_every: 100,
            ..TrainingConfig::default()
        };
        let (p1, p2, stats) = train(&config).unwrap();
        assert_eq!(stats.episodes, 300);
        assert_eq!(stats.cross_wins + stats.nought_wins + stats.draws, 300);
        assert!(!p1.is_empty());
        assert!(!p2.is_empty());
    }
}
