//! Situational hints injected into task-phase prompts
//!
//! The Sudoku task reads the board the puzzle window keeps on disk, solves
//! it, and tells the model the next correct move together with the board.

use std::fmt::Write as _;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::{Error, Result};

/// Hint returned when the board has no solution
pub const NO_SOLUTION_HINT: &str = "No hints available. Puzzle may be complete or unsolvable.";

/// Hint returned when every cell is filled
pub const COMPLETE_HINT: &str = "No empty cells found.";

/// Supplies read-only grounding text for the prompt
#[async_trait]
pub trait HintProvider: Send + Sync {
    async fn hint(&self) -> Result<String>;
}

/// A 9x9 Sudoku grid, 0 marks an empty cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Board {
    cells: [[u8; 9]; 9],
}

impl Board {
    #[must_use]
    pub const fn new(cells: [[u8; 9]; 9]) -> Self {
        Self { cells }
    }

    /// Parse a board from text
    ///
    /// Non-digit characters are ignored; blank lines are skipped. Each
    /// remaining line must hold exactly nine digits.
    ///
    /// # Errors
    ///
    /// Returns error unless there are exactly nine rows of nine digits
    pub fn parse(text: &str) -> Result<Self> {
        let mut cells = [[0u8; 9]; 9];
        let mut rows = 0;

        for (line_no, line) in text.lines().enumerate() {
            #[allow(clippy::cast_possible_truncation)]
            let digits: Vec<u8> = line
                .chars()
                .filter_map(|c| c.to_digit(10))
                .map(|d| d as u8)
                .collect();
            if digits.is_empty() {
                continue;
            }
            if digits.len() != 9 {
                return Err(Error::Hint(format!(
                    "line {} has {} digits, expected 9",
                    line_no + 1,
                    digits.len()
                )));
            }
            if rows == 9 {
                return Err(Error::Hint("board has more than 9 rows".to_string()));
            }
            cells[rows].copy_from_slice(&digits);
            rows += 1;
        }

        if rows != 9 {
            return Err(Error::Hint(format!("board has {rows} rows, expected 9")));
        }

        Ok(Self { cells })
    }

    #[must_use]
    pub const fn get(&self, row: usize, col: usize) -> u8 {
        self.cells[row][col]
    }

    /// First empty cell in row-major order
    #[must_use]
    pub fn first_empty(&self) -> Option<(usize, usize)> {
        (0..81)
            .map(|i| (i / 9, i % 9))
            .find(|&(r, c)| self.cells[r][c] == 0)
    }

    /// Whether `value` can go at (`row`, `col`) without a row, column or box clash
    #[must_use]
    pub fn can_place(&self, row: usize, col: usize, value: u8) -> bool {
        for i in 0..9 {
            if (i != col && self.cells[row][i] == value) || (i != row && self.cells[i][col] == value)
            {
                return false;
            }
        }
        let (box_row, box_col) = (3 * (row / 3), 3 * (col / 3));
        for r in box_row..box_row + 3 {
            for c in box_col..box_col + 3 {
                if (r, c) != (row, col) && self.cells[r][c] == value {
                    return false;
                }
            }
        }
        true
    }

    /// Whether the given digits break no rule
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        (0..81).map(|i| (i / 9, i % 9)).all(|(r, c)| {
            let v = self.cells[r][c];
            v == 0 || (v <= 9 && self.can_place(r, c, v))
        })
    }

    /// Solve by backtracking, returning the first solution found
    #[must_use]
    pub fn solve(&self) -> Option<Self> {
        if !self.is_consistent() {
            return None;
        }
        let mut solved = *self;
        solved.fill().then_some(solved)
    }

    fn fill(&mut self) -> bool {
        let Some((row, col)) = self.first_empty() else {
            return true;
        };
        for value in 1..=9 {
            if self.can_place(row, col, value) {
                self.cells[row][col] = value;
                if self.fill() {
                    return true;
                }
                self.cells[row][col] = 0;
            }
        }
        false
    }

    /// Next correct move as (row, column, value), zero-based
    #[must_use]
    pub fn next_move(&self) -> Option<(usize, usize, u8)> {
        let (row, col) = self.first_empty()?;
        let solved = self.solve()?;
        Some((row, col, solved.get(row, col)))
    }

    /// Board rendered for the model, `_` for empty cells
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(9 * 18);
        for row in &self.cells {
            let line: Vec<String> = row
                .iter()
                .map(|&v| if v == 0 { "_".to_string() } else { v.to_string() })
                .collect();
            let _ = writeln!(out, "{}", line.join(" "));
        }
        out
    }

    /// Hint sentence for the current board
    #[must_use]
    pub fn hint(&self) -> String {
        if self.first_empty().is_none() {
            return COMPLETE_HINT.to_string();
        }
        match self.next_move() {
            Some((row, col, value)) => format!(
                "A correct next move is to place {value} at row {}, column {}. The board looks like this: {}",
                row + 1,
                col + 1,
                self.render()
            ),
            None => NO_SOLUTION_HINT.to_string(),
        }
    }
}

/// Hints from the Sudoku board file shared with the puzzle window
#[derive(Debug, Clone)]
pub struct SudokuHints {
    board_path: PathBuf,
}

impl SudokuHints {
    #[must_use]
    pub fn new(board_path: impl Into<PathBuf>) -> Self {
        Self {
            board_path: board_path.into(),
        }
    }
}

#[async_trait]
impl HintProvider for SudokuHints {
    async fn hint(&self) -> Result<String> {
        let path = self.board_path.clone();
        let hint = tokio::task::spawn_blocking(move || -> Result<String> {
            let text = std::fs::read_to_string(&path).map_err(|e| {
                Error::Hint(format!("failed to read board {}: {e}", path.display()))
            })?;
            Ok(Board::parse(&text)?.hint())
        })
        .await
        .map_err(|e| Error::Hint(format!("hint worker failed: {e}")))??;

        tracing::debug!(hint = %hint, "sudoku hint");
        Ok(hint)
    }
}
