use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: usize = 15;
pub const WIN_LENGTH: usize = 5;

/// The four axes through a cell: horizontal, vertical and both diagonals
const AXES: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbol {
    X,
    O,
}

impl Symbol {
    pub fn as_str(self) -> &'static str {
        match self {
            Symbol::X => "X",
            Symbol::O => "O",
        }
    }
}

/// N×N grid. On the wire each cell is `""`, `"X"` or `"O"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<String>>", try_from = "Vec<Vec<String>>")]
pub struct Board {
    cells: [[Option<Symbol>; BOARD_SIZE]; BOARD_SIZE],
}

impl Default for Board {
    fn default() -> Self {
        Self {
            cells: [[None; BOARD_SIZE]; BOARD_SIZE],
        }
    }
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Converts signed wire coordinates into a cell position, if on the board.
    pub fn position(row: i32, col: i32) -> Option<(usize, usize)> {
        let row = usize::try_from(row).ok()?;
        let col = usize::try_from(col).ok()?;
        (row < BOARD_SIZE && col < BOARD_SIZE).then_some((row, col))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<Symbol> {
        self.cells.get(row)?.get(col).copied().flatten()
    }

    pub fn is_empty_at(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_none()
    }

    /// Caller guarantees the position is on the board and empty.
    pub(crate) fn place(&mut self, row: usize, col: usize, symbol: Symbol) {
        debug_assert!(self.cells[row][col].is_none(), "cell overwritten");
        self.cells[row][col] = Some(symbol);
    }

    /// Place only if the position is on the board and empty.
    pub(crate) fn try_place(&mut self, row: usize, col: usize, symbol: Symbol) -> bool {
        match self.cells.get_mut(row).and_then(|cells| cells.get_mut(col)) {
            Some(cell) if cell.is_none() => {
                *cell = Some(symbol);
                true
            }
            _ => false,
        }
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().flatten().filter(|c| c.is_some()).count()
    }

    pub fn is_full(&self) -> bool {
        self.filled_count() == BOARD_SIZE * BOARD_SIZE
    }

    /// True when the symbol at (row, col) completes five in a row on any axis.
    pub fn is_winning_move(&self, row: usize, col: usize) -> bool {
        let Some(symbol) = self.get(row, col) else {
            return false;
        };

        AXES.iter().any(|&(dr, dc)| {
            let run = 1 + self.run_length(row, col, dr, dc, symbol)
                + self.run_length(row, col, -dr, -dc, symbol);
            run >= WIN_LENGTH
        })
    }

    /// Consecutive `symbol` cells outward from (row, col), excluding the cell itself.
    fn run_length(&self, row: usize, col: usize, dr: isize, dc: isize, symbol: Symbol) -> usize {
        let mut count = 0;
        let (mut r, mut c) = (row, col);
        loop {
            let (Some(next_r), Some(next_c)) = (r.checked_add_signed(dr), c.checked_add_signed(dc))
            else {
                break;
            };
            if self.get(next_r, next_c) != Some(symbol) {
                break;
            }
            count += 1;
            (r, c) = (next_r, next_c);
        }
        count
    }
}

impl From<Board> for Vec<Vec<String>> {
    fn from(board: Board) -> Self {
        board
            .cells
            .iter()
            .map(|row| {
                row.iter()
                    .map(|cell| cell.map(Symbol::as_str).unwrap_or_default().to_string())
                    .collect()
            })
            .collect()
    }
}

impl TryFrom<Vec<Vec<String>>> for Board {
    type Error = String;

    fn try_from(rows: Vec<Vec<String>>) -> Result<Self, Self::Error> {
        if rows.len() != BOARD_SIZE {
            return Err(format!("expected {BOARD_SIZE} rows, got {}", rows.len()));
        }
        let mut board = Board::new();
        for (r, row) in rows.iter().enumerate() {
            if row.len() != BOARD_SIZE {
                return Err(format!("row {r} has {} cells", row.len()));
            }
            for (c, cell) in row.iter().enumerate() {
                board.cells[r][c] = match cell.as_str() {
                    "" => None,
                    "X" => Some(Symbol::X),
                    "O" => Some(Symbol::O),
                    other => return Err(format!("invalid cell value {other:?}")),
                };
            }
        }
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with(cells: &[(usize, usize)], symbol: Symbol) -> Board {
        let mut board = Board::new();
        for &(r, c) in cells {
            board.place(r, c, symbol);
        }
        board
    }

    #[test]
    fn position_rejects_off_board_coordinates() {
        assert_eq!(Board::position(0, 0), Some((0, 0)));
        assert_eq!(Board::position(14, 14), Some((14, 14)));
        assert_eq!(Board::position(-1, 3), None);
        assert_eq!(Board::position(3, 15), None);
    }

    #[test]
    fn five_horizontal_wins_from_any_cell_of_the_run() {
        let cells = [(7, 6), (7, 7), (7, 8), (7, 9), (7, 10)];
        let board = board_with(&cells, Symbol::X);
        for (r, c) in cells {
            assert!(board.is_winning_move(r, c));
        }
    }

    #[test]
    fn vertical_and_diagonals_win() {
        let vertical = board_with(&[(0, 3), (1, 3), (2, 3), (3, 3), (4, 3)], Symbol::O);
        assert!(vertical.is_winning_move(4, 3));

        let diagonal = board_with(&[(2, 2), (3, 3), (4, 4), (5, 5), (6, 6)], Symbol::X);
        assert!(diagonal.is_winning_move(4, 4));

        let anti = board_with(&[(10, 0), (9, 1), (8, 2), (7, 3), (6, 4)], Symbol::X);
        assert!(anti.is_winning_move(10, 0));
    }

    #[test]
    fn four_in_a_row_is_not_a_win() {
        let board = board_with(&[(0, 0), (0, 1), (0, 2), (0, 3)], Symbol::X);
        assert!(!board.is_winning_move(0, 3));
    }

    #[test]
    fn run_breaks_on_opposing_symbol() {
        let mut board = board_with(&[(5, 0), (5, 1), (5, 3), (5, 4)], Symbol::X);
        board.place(5, 2, Symbol::O);
        assert!(!board.is_winning_move(5, 4));
        assert!(!board.is_winning_move(5, 2));
    }

    #[test]
    fn run_stops_at_board_edge() {
        let board = board_with(&[(14, 11), (14, 12), (14, 13), (14, 14)], Symbol::O);
        assert!(!board.is_winning_move(14, 14));
    }

    #[test]
    fn serializes_as_string_grid() {
        let board = board_with(&[(0, 1)], Symbol::X);
        let json = serde_json::to_value(&board).unwrap();
        assert_eq!(json[0][0], "");
        assert_eq!(json[0][1], "X");
        assert_eq!(json.as_array().unwrap().len(), BOARD_SIZE);

        let back: Board = serde_json::from_value(json).unwrap();
        assert_eq!(back, board);
    }

    #[test]
    fn rejects_unknown_cell_values() {
        let mut rows = vec![vec![String::new(); BOARD_SIZE]; BOARD_SIZE];
        rows[3][3] = "Z".into();
        assert!(Board::try_from(rows).is_err());
    }
}
