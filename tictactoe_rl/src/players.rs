use crate::board::{Board, Mark, Move};
use crate::error::{check_unit_interval, Error, Result};
use crate::policy::{PolicyStore, StateValues};
use crate::state_key::StateKey;
use rand::prelude::SliceRandom;
use rand::{Rng, RngCore};

pub trait Player {
    fn name(&self) -> &str;
    fn mark(&self) -> Mark;
    fn set_mark(&mut self, mark: Mark);
    fn choose_move(&mut self, board: &Board, rng: &mut dyn RngCore) -> Result<Move>;
}

impl<P: Player + ?Sized> Player for &mut P {
    fn name(&self) -> &str {
        (**self).name()
    }
    fn mark(&self) -> Mark {
        (**self).mark()
    }
    fn set_mark(&mut self, mark: Mark) {
        (**self).set_mark(mark)
    }
    fn choose_move(&mut self, board: &Board, rng: &mut dyn RngCore) -> Result<Move> {
        (**self).choose_move(board, rng)
    }
}

/// Epsilon-greedy move selection.
///
/// With probability `exploration_rate` a uniformly random legal move is
/// returned and `values` is not consulted. Otherwise every legal move is
/// tried on a copy of the board and the resulting state with the highest
/// value wins. The running maximum is replaced on `>=`, so among equally
/// valued moves the last one in `legal_moves` is picked.
pub fn choose_move<V, R>(
    legal_moves: &[Move],
    board: &Board,
    mark: Mark,
    exploration_rate: f64,
    values: &V,
    rng: &mut R,
) -> Result<Move>
where
    V: StateValues + ?Sized,
    R: Rng + ?Sized,
{
    check_unit_interval("exploration rate", exploration_rate)?;
    let Some(&first) = legal_moves.first() else {
        return Err(Error::invalid_state("no legal moves to choose from"));
    };
    if rng.gen_bool(exploration_rate) {
        return Ok(*legal_moves.choose(rng).unwrap_or(&first));
    }
    let mut best = first;
    let mut best_value = f64::NEG_INFINITY;
    for &mv in legal_moves {
        let key = board.with_move(mv, mark)?.state_key();
        let value = values.value(&key);
        if value >= best_value {
            best_value = value;
            best = mv;
        }
    }
    Ok(best)
}

/// Policy-backed player. While training it remembers the key of every board
/// it produced so the episode outcome can be fed back through them.
#[derive(Debug)]
pub struct Agent {
    name: String,
    mark: Mark,
    exploration_rate: f64,
    policy: PolicyStore,
    history: Vec<StateKey>,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        mark: Mark,
        exploration_rate: f64,
        policy: PolicyStore,
    ) -> Result<Self> {
        check_unit_interval("exploration rate", exploration_rate)?;
        Ok(Agent {
            name: name.into(),
            mark,
            exploration_rate,
            policy,
            history: Vec::with_capacity(5),
        })
    }

    pub fn exploration_rate(&self) -> f64 {
        self.exploration_rate
    }

    pub fn set_exploration_rate(&mut self, exploration_rate: f64) -> Result<()> {
        check_unit_interval("exploration rate", exploration_rate)?;
        self.exploration_rate = exploration_rate;
        Ok(())
    }

    pub fn policy(&self) -> &PolicyStore {
        &self.policy
    }

    pub fn into_policy(self) -> PolicyStore {
        self.policy
    }

    pub fn record(&mut self, key: StateKey) {
        self.history.push(key);
    }

    pub fn history(&self) -> &[StateKey] {
        &self.history
    }

    pub fn reset_history(&mut self) {
        self.history.clear();
    }

    /// Backward temporal-difference pass over this episode's states, most
    /// recent first: `V(s) += lr * (gamma * target - V(s))`, after which the
    /// updated `V(s)` becomes the target for the state before it.
    pub fn feed_reward(&mut self, reward: f64, learning_rate: f64, discount: f64) {
        let mut target = reward;
        for key in self.history.iter().rev() {
            let value = self.policy.get(key);
            let updated = value + learning_rate * (discount * target - value);
            self.policy.set(key.clone(), updated);
            target = updated;
        }
    }
}

impl Player for Agent {
    fn name(&self) -> &str {
        &self.name
    }
    fn mark(&self) -> Mark {
        self.mark
    }
    fn set_mark(&mut self, mark: Mark) {
        self.mark = mark;
    }
    fn choose_move(&mut self, board: &Board, rng: &mut dyn RngCore) -> Result<Move> {
        choose_move(
            &board.available_moves(),
            board,
            self.mark,
            self.exploration_rate,
            &self.policy,
            rng,
        )
    }
}

/// Plays a uniformly random legal move.
#[derive(Debug)]
pub struct RandomPlayer {
    pub name: String,
    pub mark: Mark,
}

impl RandomPlayer {
    pub fn new(name: impl Into<String>, mark: Mark) -> Self {
        RandomPlayer {
            name: name.into(),
            mark,
        }
    }
}

impl Player for RandomPlayer {
    fn name(&self) -> &str {
        &self.name
    }
    fn mark(&self) -> Mark {
        self.mark
    }
    fn set_mark(&mut self, mark: Mark) {
        self.mark = mark;
    }
    fn choose_move(&mut self, board: &Board, rng: &mut dyn RngCore) -> Result<Move> {
        board
            .available_moves()
            .choose(rng)
            .copied()
            .ok_or_else(|| Error::invalid_state("no legal moves to choose from"))
    }
}
