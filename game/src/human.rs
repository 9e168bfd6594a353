use std::io::{self, BufRead, Write};
use rand::RngCore;
use tictactoe_rl::board::{Board, Mark, Move, BOARD_COLS, BOARD_ROWS};
use tictactoe_rl::error::{Error, Result};
use tictactoe_rl::players::Player;

/// Reads moves as `row col` (both 1-3) from `input`, asking again until the
/// answer names an empty cell.
pub struct HumanPlayer<R> {
    pub name: String,
    pub mark: Mark,
    input: R,
}

impl<R: BufRead> HumanPlayer<R> {
    pub fn new(name: impl Into<String>, mark: Mark, input: R) -> Self {
        HumanPlayer {
            name: name.into(),
            mark,
            input,
        }
    }

    fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let read = self.input.read_line(&mut line).map_err(|source| Error::Io {
            operation: "read a move".to_owned(),
            source,
        })?;
        if read == 0 {
            return Err(Error::invalid_state("input closed before a move was entered"));
        }
        Ok(line)
    }
}

fn parse_move(line: &str) -> Option<Move> {
    let mut numbers = line
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|part| !part.is_empty())
        .map(|part| part.parse::<usize>().ok());
    let row = numbers.next()??;
    let col = numbers.next()??;
    if numbers.next().is_some() {
        return None;
    }
    ((1..=BOARD_ROWS).contains(&row) && (1..=BOARD_COLS).contains(&col)).then(|| (row - 1, col - 1))
}

impl<R: BufRead> Player for HumanPlayer<R> {
    fn name(&self) -> &str {
        &self.name
    }
    fn mark(&self) -> Mark {
        self.mark
    }
    fn set_mark(&mut self, mark: Mark) {
        self.mark = mark;
    }
    fn choose_move(&mut self, board: &Board, _rng: &mut dyn RngCore) -> Result<Move> {
        println!("{board}");
        loop {
            print!("{}, enter your move as `row col` (1-3): ", self.name);
            io::stdout().flush().ok();
            let line = self.read_line()?;
            match parse_move(&line) {
                Some(mv) if board.is_empty_cell(mv) => return Ok(mv),
                Some(_) => println!("That square is taken, please choose another one."),
                None => println!("Unknown move {:?}, please try again.", line.trim()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    #[test]
    fn parses_row_and_column() {
        assert_eq!(parse_move("1 3\n"), Some((0, 2)));
        assert_eq!(parse_move("2,2"), Some((1, 1)));
        assert_eq!(parse_move("0 1"), None);
        assert_eq!(parse_move("1 4"), None);
        assert_eq!(parse_move("x y"), None);
        assert_eq!(parse_move("1 2 3"), None);
    }

    #[test]
    fn asks_again_until_cell_is_free() {
        let board = Board::from_rows([[1, 0, 0], [0, 0, 0], [0, 0, 0]]).unwrap();
        let input = Cursor::new("nonsense\n1 1\n3 3\n");
        let mut human = HumanPlayer::new("tester", Mark::Nought, input);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(human.choose_move(&board, &mut rng).unwrap(), (2, 2));
    }

    #[test]
    fn closed_input_is_an_error() {
        let mut human = HumanPlayer::new("tester", Mark::Nought, Cursor::new(""));
        let mut rng = StdRng::seed_from_u64(0);
        assert!(human.choose_move(&Board::new(), &mut rng).is_err());
    }
}
