use crate::board::{Board, GameStatus, Mark};
use crate::error::{Error, Result};
use crate::players::Player;
use rand::RngCore;
use std::{fmt, mem};

pub mod board;
pub mod config;
pub mod error;
pub mod players;
pub mod policy;
pub mod state_key;
pub mod training;

pub use crate::training::train;

/// One game between two players. The board is mutated only here; players
/// just propose moves.
pub struct Game<'a> {
    pub board: Board,
    current_player: Box<dyn Player + 'a>,
    other_player: Box<dyn Player + 'a>,
}

impl<'a> Game<'a> {
    /// `player2` gets the mark opposite to `player1`; whoever holds
    /// `Mark::Cross` moves first.
    pub fn new(player1: Box<dyn Player + 'a>, mut player2: Box<dyn Player + 'a>) -> Self {
        player2.set_mark(player1.mark().other());
        let (current_player, other_player) = if player1.mark() == Mark::Cross {
            (player1, player2)
        } else {
            (player2, player1)
        };
        Game {
            board: Board::new(),
            current_player,
            other_player,
        }
    }

    pub fn current_player(&self) -> &dyn Player {
        self.current_player.as_ref()
    }

    pub fn other_player(&self) -> &dyn Player {
        self.other_player.as_ref()
    }

    pub fn swap_players(&mut self) {
        mem::swap(&mut self.current_player, &mut self.other_player);
    }

    pub fn status(&self) -> GameStatus {
        self.board.status()
    }

    /// Lets the player to move pick a move and applies it. Players are
    /// swapped afterwards unless the game is over, so on a win
    /// `current_player` is the winner.
    pub fn play_turn(&mut self, rng: &mut dyn RngCore) -> Result<GameStatus> {
        if self.board.status().is_over() {
            return Err(Error::invalid_state("the game is already over"));
        }
        let mv = self.current_player.choose_move(&self.board, rng)?;
        self.board.place(mv, self.current_player.mark())?;
        let status = self.board.status();
        if status == GameStatus::InProgress {
            self.swap_players();
        }
        Ok(status)
    }

    pub fn play_out(&mut self, rng: &mut dyn RngCore) -> Result<GameStatus> {
        loop {
            let status = self.play_turn(rng)?;
            if status.is_over() {
                return Ok(status);
            }
        }
    }
}

/// Results of a match, counted from one player's point of view.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct MatchStats {
    pub wins: usize,
    pub losses: usize,
    pub draws: usize,
}

impl MatchStats {
    pub fn record(&mut self, status: GameStatus, mark: Mark) {
        match status {
            GameStatus::Win(winner) if winner == mark => self.wins += 1,
            GameStatus::Win(_) => self.losses += 1,
            GameStatus::Draw => self.draws += 1,
            GameStatus::InProgress => {}
        }
    }

    pub fn games(&self) -> usize {
        self.wins + self.losses + self.draws
    }

    pub fn win_rate(&self) -> f64 {
        match self.games() {
            0 => 0.0,
            games => self.wins as f64 / games as f64,
        }
    }
}

impl fmt::Display for MatchStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} games: {} won, {} lost, {} drawn ({:.1}% wins)",
            self.games(),
            self.wins,
            self.losses,
            self.draws,
            self.win_rate() * 100.0
        )
    }
}

/// Plays `games` games of `player` against `opponent` and counts the
/// results for `player`. With `alternate` the first move switches sides
/// every game; otherwise `player` keeps its current mark.
pub fn evaluate(
    player: &mut dyn Player,
    opponent: &mut dyn Player,
    games: usize,
    alternate: bool,
    rng: &mut dyn RngCore,
) -> Result<MatchStats> {
    let initial = player.mark();
    let mut stats = MatchStats::default();
    for game_index in 0..games {
        let mark = if alternate && game_index % 2 == 1 {
            initial.other()
        } else {
            initial
        };
        player.set_mark(mark);
        let mut game = Game::new(Box::new(&mut *player), Box::new(&mut *opponent));
        let status = game.play_out(rng)?;
        stats.record(status, mark);
    }
    player.set_mark(initial);
    Ok(stats)
}
