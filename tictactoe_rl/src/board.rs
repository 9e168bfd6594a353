use crate::error::{Error, Result};
use crate::state_key::StateKey;
use itertools::Itertools;
use ndarray::prelude::*;
use std::{fmt, ops::Deref};

pub const BOARD_ROWS: usize = 3;
pub const BOARD_COLS: usize = 3;

const EMPTY: i8 = 0;
const WIN_SUM: i8 = BOARD_COLS as i8;

/// Player identity. The numeric value is what gets written into the board.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Mark {
    Cross = 1,
    Nought = -1,
}

/// `(row, column)` of an empty cell.
pub type Move = (usize, usize);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum GameStatus {
    InProgress,
    Win(Mark),
    Draw,
}

/// A complete line of the grid, in the order the rule checker scans them.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Line {
    Row(usize),
    Column(usize),
    Diagonal,
    AntiDiagonal,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Board {
    cells: Array2<i8>,
}

impl Mark {
    pub fn other(self) -> Self {
        match self {
            Self::Cross => Mark::Nought,
            Self::Nought => Mark::Cross,
        }
    }
    pub fn value(self) -> i8 {
        self as i8
    }
    pub fn from_value(value: i8) -> Option<Self> {
        match value {
            1 => Some(Mark::Cross),
            -1 => Some(Mark::Nought),
            _ => None,
        }
    }
    pub fn as_char(self) -> char {
        match self {
            Self::Cross => 'X',
            Self::Nought => 'O',
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl GameStatus {
    pub fn is_over(self) -> bool {
        self != GameStatus::InProgress
    }
}

impl Deref for Board {
    type Target = Array2<i8>;
    fn deref(&self) -> &Self::Target {
        &self.cells
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for row in self.cells.rows() {
            writeln!(f, "{}", row.iter().map(|&cell| cell_char(cell)).join(" "))?;
        }
        Ok(())
    }
}

fn cell_char(cell: i8) -> char {
    Mark::from_value(cell).map_or('-', Mark::as_char)
}

impl Board {
    pub fn new() -> Self {
        Board {
            cells: Array2::from_elem((BOARD_ROWS, BOARD_COLS), EMPTY),
        }
    }

    pub fn from_rows(rows: [[i8; BOARD_COLS]; BOARD_ROWS]) -> Result<Self> {
        Self::from_array(arr2(&rows))
    }

    /// Rejects arrays of the wrong shape or with a cell outside `{0, 1, -1}`.
    pub fn from_array(cells: Array2<i8>) -> Result<Self> {
        if cells.dim() != (BOARD_ROWS, BOARD_COLS) {
            return Err(Error::configuration(format!(
                "board must be {BOARD_ROWS}x{BOARD_COLS}, got {}x{}",
                cells.nrows(),
                cells.ncols()
            )));
        }
        if let Some(((row, col), value)) = cells
            .indexed_iter()
            .find(|(_, &value)| value != EMPTY && Mark::from_value(value).is_none())
        {
            return Err(Error::configuration(format!(
                "cell ({row}, {col}) holds {value}, expected one of 0, 1, -1"
            )));
        }
        Ok(Board { cells })
    }

    /// Cell values in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = i8> + '_ {
        self.cells.iter().copied()
    }

    pub fn is_empty_cell(&self, mv: Move) -> bool {
        self.cells.get(mv).is_some_and(|&value| value == EMPTY)
    }

    /// Empty cells in row-major order.
    pub fn available_moves(&self) -> Vec<Move> {
        self.cells
            .indexed_iter()
            .filter(|(_, &value)| value == EMPTY)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().all(|&value| value != EMPTY)
    }

    pub fn place(&mut self, mv: Move, mark: Mark) -> Result<()> {
        match self.cells.get_mut(mv) {
            None => Err(Error::invalid_state(format!(
                "move {mv:?} is outside the {BOARD_ROWS}x{BOARD_COLS} board"
            ))),
            Some(cell) if *cell != EMPTY => Err(Error::invalid_state(format!(
                "cell {mv:?} is already taken by {}",
                cell_char(*cell)
            ))),
            Some(cell) => {
                *cell = mark.value();
                Ok(())
            }
        }
    }

    /// The board that results from `mark` playing `mv`; `self` is left untouched.
    pub fn with_move(&self, mv: Move, mark: Mark) -> Result<Board> {
        let mut next = self.clone();
        next.place(mv, mark)?;
        Ok(next)
    }

    pub fn reset(&mut self) {
        self.cells.fill(EMPTY);
    }

    pub fn state_key(&self) -> StateKey {
        StateKey::encode(self)
    }

    fn line_sums(&self) -> impl Iterator<Item = (Line, i8)> + '_ {
        let rows = self
            .cells
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| (Line::Row(i), row.sum()));
        let columns = self
            .cells
            .columns()
            .into_iter()
            .enumerate()
            .map(|(i, column)| (Line::Column(i), column.sum()));
        let diagonal = (Line::Diagonal, self.cells.diag().sum());
        let anti_diagonal = (
            Line::AntiDiagonal,
            (0..BOARD_ROWS)
                .map(|i| self.cells[[i, BOARD_COLS - 1 - i]])
                .sum::<i8>(),
        );
        rows.chain(columns).chain([diagonal, anti_diagonal])
    }

    pub fn winning_lines(&self, mark: Mark) -> Vec<Line> {
        let target = mark.value() * WIN_SUM;
        self.line_sums()
            .filter(|&(_, sum)| sum == target)
            .map(|(line, _)| line)
            .collect()
    }

    /// Terminal status of the board.
    ///
    /// Lines are scanned rows first, then columns, then the main diagonal and
    /// the anti-diagonal; the first complete line decides the winner. Both
    /// sides owning a complete line cannot happen with alternating moves.
    pub fn status(&self) -> GameStatus {
        let winner = self.line_sums().find_map(|(_, sum)| match sum {
            WIN_SUM => Some(Mark::Cross),
            s if s == -WIN_SUM => Some(Mark::Nought),
            _ => None,
        });
        match winner {
            Some(mark) => {
                debug_assert!(
                    self.winning_lines(mark.other()).is_empty(),
                    "both players own a complete line:\n{self}"
                );
                GameStatus::Win(mark)
            }
            None if self.is_full() => GameStatus::Draw,
            None => GameStatus::InProgress,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_board_is_empty_and_in_progress() {
        let board = Board::new();
        assert_eq!(board.available_moves().len(), 9);
        assert_eq!(board.available_moves()[0], (0, 0));
        assert_eq!(board.available_moves()[8], (2, 2));
        assert_eq!(board.status(), GameStatus::InProgress);
    }

    #[test]
    fn row_of_crosses_wins() {
        let board = Board::from_rows([[1, 1, 1], [-1, -1, 0], [0, 0, 0]]).unwrap();
        assert_eq!(board.status(), GameStatus::Win(Mark::Cross));
        assert_eq!(board.winning_lines(Mark::Cross), vec![Line::Row(0)]);
    }

    #[test]
    fn column_of_noughts_wins() {
        let board = Board::from_rows([[1, -1, 1], [0, -1, 1], [0, -1, 0]]).unwrap();
        assert_eq!(board.status(), GameStatus::Win(Mark::Nought));
        assert_eq!(board.winning_lines(Mark::Nought), vec![Line::Column(1)]);
    }

    #[test]
    fn each_diagonal_is_checked_on_its_own() {
        let main = Board::from_rows([[-1, 1, 1], [0, -1, 1], [0, 0, -1]]).unwrap();
        assert_eq!(main.status(), GameStatus::Win(Mark::Nought));
        let anti = Board::from_rows([[-1, -1, 1], [0, 1, 0], [1, 0, -1]]).unwrap();
        assert_eq!(anti.status(), GameStatus::Win(Mark::Cross));
        // Main diagonal sums to +1, anti-diagonal to -3.
        let mixed = Board::from_rows([[1, 1, -1], [1, -1, 0], [-1, 0, 1]]).unwrap();
        assert_eq!(mixed.status(), GameStatus::Win(Mark::Nought));
        assert_eq!(mixed.winning_lines(Mark::Nought), vec![Line::AntiDiagonal]);
    }

    #[test]
    fn full_board_without_line_is_draw() {
        let board = Board::from_rows([[1, -1, 1], [1, -1, -1], [-1, 1, 1]]).unwrap();
        assert_eq!(board.status(), GameStatus::Draw);
    }

    #[test]
    fn partial_board_without_line_is_in_progress() {
        let board = Board::from_rows([[1, -1, 0], [0, 1, 0], [0, 0, -1]]).unwrap();
        assert_eq!(board.status(), GameStatus::InProgress);
        assert!(!board.status().is_over());
    }

    #[test]
    fn place_rejects_taken_and_outside_cells() {
        let mut board = Board::new();
        board.place((1, 1), Mark::Cross).unwrap();
        assert!(matches!(
            board.place((1, 1), Mark::Nought),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(
            board.place((3, 0), Mark::Nought),
            Err(Error::InvalidState { .. })
        ));
        assert_eq!(board[[1, 1]], 1);
        assert!(!board.available_moves().contains(&(1, 1)));
    }

    #[test]
    fn with_move_leaves_original_untouched() {
        let board = Board::new();
        let next = board.with_move((0, 2), Mark::Nought).unwrap();
        assert_eq!(next[[0, 2]], -1);
        assert!(board.is_empty_cell((0, 2)));
    }

    #[test]
    fn malformed_boards_are_rejected() {
        assert!(matches!(
            Board::from_array(Array2::zeros((3, 4))),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            Board::from_array(Array2::zeros((0, 0))),
            Err(Error::Configuration { .. })
        ));
        assert!(matches!(
            Board::from_rows([[0, 2, 0], [0, 0, 0], [0, 0, 0]]),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn reset_clears_marks() {
        let mut board = Board::from_rows([[1, -1, 1], [0, 0, 0], [0, 0, 0]]).unwrap();
        board.reset();
        assert_eq!(board, Board::new());
    }

    #[test]
    fn display_draws_marks() {
        let board = Board::from_rows([[1, 0, -1], [0, 0, 0], [0, 0, 0]]).unwrap();
        assert_eq!(board.to_string(), "X - O\n- - -\n- - -\n");
    }

    #[test]
    fn marks_flip() {
        assert_eq!(Mark::Cross.other(), Mark::Nought);
        assert_eq!(Mark::Nought.value(), -1);
        assert_eq!(Mark::from_value(1), Some(Mark::Cross));
        assert_eq!(Mark::from_value(0), None);
    }
}
