//! Board -> key encoding shared by training and play.
//!
//! Keys are the text a NumPy float vector of the flattened board prints as,
//! e.g. `[ 1.  1.  0.  0. -1.  0.  0.  0. -1.]`, so pickled policies keyed by
//! NumPy boards load as they are. Every cell is rendered, in row-major order,
//! so the encoding is injective.

use crate::board::{Board, BOARD_COLS, BOARD_ROWS};
use itertools::Itertools;
use ndarray::Array2;
use std::{borrow::Borrow, fmt};
use thiserror::Error;

/// Version of the key layout. Bump whenever `encode` changes.
pub const KEY_FORMAT_VERSION: u32 = 1;

#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct StateKey(String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed state key '{key}': {reason}")]
pub struct KeyError {
    pub key: String,
    pub reason: String,
}

impl StateKey {
    pub fn encode(board: &Board) -> Self {
        let signed = board.cells().any(|cell| cell < 0);
        let body = board.cells().map(|cell| cell_text(cell, signed)).join(" ");
        StateKey(format!("[{body}]"))
    }

    /// Accepts `key` only if it is exactly what `encode` produces for some board.
    pub fn parse(key: &str) -> Result<Self, KeyError> {
        Self::decode(key)?;
        Ok(StateKey(key.to_owned()))
    }

    pub fn decode(key: &str) -> Result<Board, KeyError> {
        let error = |reason: String| KeyError {
            key: key.to_owned(),
            reason,
        };
        let body = key
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| error("missing brackets".to_owned()))?;
        let cells = body
            .split_whitespace()
            .map(|token| match token {
                "1." => Ok(1),
                "0." => Ok(0),
                "-1." => Ok(-1),
                other => Err(error(format!("unexpected cell '{other}'"))),
            })
            .collect::<Result<Vec<i8>, _>>()?;
        let count = cells.len();
        let cells = Array2::from_shape_vec((BOARD_ROWS, BOARD_COLS), cells)
            .map_err(|_| {
                error(format!(
                    "expected {} cells, got {count}",
                    BOARD_ROWS * BOARD_COLS
                ))
            })?;
        let board = Board::from_array(cells).map_err(|e| error(e.to_string()))?;
        if Self::encode(&board).as_str() != key {
            return Err(error("cell spacing is not canonical".to_owned()));
        }
        Ok(board)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

fn cell_text(cell: i8, signed: bool) -> &'static str {
    match (cell, signed) {
        (-1, _) => "-1.",
        (1, true) => " 1.",
        (1, false) => "1.",
        (_, true) => " 0.",
        (_, false) => "0.",
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for StateKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&Board> for StateKey {
    fn from(board: &Board) -> Self {
        Self::encode(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Mark;

    #[test]
    fn empty_board_key() {
        assert_eq!(
            Board::new().state_key().as_str(),
            "[0. 0. 0. 0. 0. 0. 0. 0. 0.]"
        );
    }

    #[test]
    fn signed_board_key_is_padded() {
        let board = Board::from_rows([[1, 1, 0], [0, -1, 0], [0, 0, -1]]).unwrap();
        assert_eq!(
            board.state_key().as_str(),
            "[ 1.  1.  0.  0. -1.  0.  0.  0. -1.]"
        );
        let crosses_only = Board::from_rows([[1, 0, 0], [0, 0, 0], [0, 0, 0]]).unwrap();
        assert_eq!(
            crosses_only.state_key().as_str(),
            "[1. 0. 0. 0. 0. 0. 0. 0. 0.]"
        );
    }

    #[test]
    fn encoding_is_row_major() {
        let top_right = Board::new().with_move((0, 2), Mark::Cross).unwrap();
        let bottom_left = Board::new().with_move((2, 0), Mark::Cross).unwrap();
        assert_ne!(top_right.state_key(), bottom_left.state_key());
        assert_eq!(
            top_right.state_key().as_str(),
            "[0. 0. 1. 0. 0. 0. 0. 0. 0.]"
        );
    }

    #[test]
    fn distinct_boards_have_distinct_keys() {
        // Every board reachable by placing up to two marks anywhere.
        let mut boards = vec![Board::new()];
        for mark in [Mark::Cross, Mark::Nought] {
            let mut next = Vec::new();
            for board in &boards {
                for mv in board.available_moves() {
                    next.push(board.with_move(mv, mark).unwrap());
                }
            }
            boards.extend(next);
        }
        let unique_boards = boards.iter().map(|b| b.to_string()).unique().count();
        let unique_keys = boards.iter().map(Board::state_key).unique().count();
        assert_eq!(unique_boards, unique_keys);
    }

    #[test]
    fn identical_boards_share_a_key() {
        let a = Board::from_rows([[1, -1, 0], [0, 1, 0], [0, 0, -1]]).unwrap();
        let b = Board::new()
            .with_move((0, 0), Mark::Cross)
            .and_then(|b| b.with_move((0, 1), Mark::Nought))
            .and_then(|b| b.with_move((1, 1), Mark::Cross))
            .and_then(|b| b.with_move((2, 2), Mark::Nought))
            .unwrap();
        assert_eq!(a.state_key(), b.state_key());
    }

    #[test]
    fn decode_inverts_encode() {
        let board = Board::from_rows([[1, -1, 0], [0, 1, 0], [0, 0, -1]]).unwrap();
        let key = board.state_key();
        assert_eq!(StateKey::decode(key.as_str()).unwrap(), board);
        assert_eq!(StateKey::parse(key.as_str()).unwrap(), key);
    }

    #[test]
    fn decode_rejects_malformed_keys() {
        for key in [
            "0. 0. 0. 0. 0. 0. 0. 0. 0.",
            "[0. 0. 0.]",
            "[0. 0. 0. 0. 2. 0. 0. 0. 0.]",
            "[1. -1. 0. 0. 0. 0. 0. 0. 0.]",
            "[0 0 0 0 0 0 0 0 0]",
        ] {
            assert!(StateKey::decode(key).is_err(), "{key} should be rejected");
        }
    }
}
