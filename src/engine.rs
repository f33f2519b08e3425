use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::movement::{resolve_movements, Movement, Position, Snapshot, SnapshotTile};
use crate::slide::slide_line;
use crate::tile::{Tile, TileId, TileStore};

/// Smallest allowed board side.
pub const MIN_SIDE: usize = 4;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Up,
    Down,
    Left,
    Right,
}

impl Move {
    /// All directions in a fixed order: `[Up, Down, Left, Right]`.
    pub const ALL: [Move; 4] = [Move::Up, Move::Down, Move::Left, Move::Right];
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Move::Up => "up",
            Move::Down => "down",
            Move::Left => "left",
            Move::Right => "right",
        };
        f.write_str(s)
    }
}

/// Board construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Tile value that wins the game.
    pub win_value: u32,
    /// Chance that a spawned tile is a 4 instead of a 2.
    pub four_probability: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self { width: 4, height: 4, win_value: 2048, four_probability: 0.2 }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("board must be at least 4x4, got {width}x{height}")]
    TooSmall { width: usize, height: usize },
    #[error("win value {0} is not a power of two >= 4")]
    WinValue(u32),
    #[error("four probability {0} is outside [0, 1]")]
    FourProbability(f64),
}

impl GameConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < MIN_SIDE || self.height < MIN_SIDE {
            return Err(ConfigError::TooSmall { width: self.width, height: self.height });
        }
        if !self.win_value.is_power_of_two() || self.win_value < 4 {
            return Err(ConfigError::WinValue(self.win_value));
        }
        if !(0.0..=1.0).contains(&self.four_probability) {
            return Err(ConfigError::FourProbability(self.four_probability));
        }
        Ok(())
    }
}

/// A tile placed by the spawn policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spawn {
    pub position: Position,
    pub tile_id: TileId,
    pub value: u32,
}

/// Summary of one call to [`Board::make_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub direction: Move,
    /// False if the slide left every cell unchanged (nothing spawned).
    pub moved: bool,
    pub points_gained: u64,
    pub spawned: Option<Spawn>,
}

#[derive(Debug, Clone)]
struct MoveRecord {
    before: Snapshot,
    after: Snapshot,
}

/// A W×H 2048 board.
///
/// Cells hold tile IDs; tiles live in an ID-keyed arena owned by the board.
/// A turn is `make_move`, then (after consumers have read
/// `movements_since_last_move`) `complete_move`.
#[derive(Debug, Clone)]
pub struct Board {
    config: GameConfig,
    cells: Vec<Option<TileId>>,
    store: TileStore,
    points: u64,
    won: bool,
    last_move: Option<MoveRecord>,
    awaiting_completion: bool,
}

impl Board {
    /// Empty board with default rules.
    ///
    /// Panics if either side is below 4.
    ///
    /// ```
    /// use grid_2048::engine::Board;
    /// let b = Board::new(5, 4);
    /// assert_eq!((b.width(), b.height(), b.count_empty()), (5, 4, 20));
    /// ```
    pub fn new(width: usize, height: usize) -> Self {
        Self::with_config(GameConfig { width, height, ..GameConfig::default() })
    }

    /// Empty board with the given configuration.
    ///
    /// Panics if the configuration is invalid; use [`GameConfig::validate`]
    /// first to report the problem instead.
    pub fn with_config(config: GameConfig) -> Self {
        if let Err(e) = config.validate() {
            panic!("invalid board configuration: {e}");
        }
        Self {
            config,
            cells: vec![None; config.width * config.height],
            store: TileStore::new(),
            points: 0,
            won: false,
            last_move: None,
            awaiting_completion: false,
        }
    }

    /// Board seeded with two random tiles, ready to play.
    ///
    /// ```
    /// use grid_2048::engine::{Board, GameConfig};
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(7);
    /// let b = Board::new_game(GameConfig::default(), &mut rng);
    /// assert_eq!(b.count_empty(), 14);
    /// ```
    pub fn new_game<R: Rng + ?Sized>(config: GameConfig, rng: &mut R) -> Self {
        let mut board = Self::with_config(config);
        board.spawn_random_tile(rng);
        board.spawn_random_tile(rng);
        board
    }

    /// Build a board from rows of face values (0 = empty). Tiles get IDs in
    /// row-major order.
    ///
    /// Panics on sides below 4 or values that are not powers of two.
    ///
    /// ```
    /// use grid_2048::engine::Board;
    /// let b = Board::from_rows(&[[2, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 4]]);
    /// assert_eq!(b.value_at(3, 3), 4);
    /// ```
    pub fn from_rows<const W: usize>(rows: &[[u32; W]]) -> Self {
        let (width, height) = (W, rows.len());
        let mut board = Self::new(width, height);
        for (row, values) in rows.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                if value == 0 {
                    continue;
                }
                assert!(value >= 2 && value.is_power_of_two(), "invalid tile value {value} at ({row}, {col})");
                let id = board.store.create(value);
                board.cells[row * width + col] = Some(id);
            }
        }
        board.refresh_won();
        board
    }

    #[inline]
    pub fn width(&self) -> usize { self.config.width }

    #[inline]
    pub fn height(&self) -> usize { self.config.height }

    #[inline]
    pub fn config(&self) -> &GameConfig { &self.config }

    /// Total points earned from merges so far.
    #[inline]
    pub fn points(&self) -> u64 { self.points }

    /// The tile at `(row, col)`, or `None` for an empty cell.
    ///
    /// Panics if the coordinate is outside the board.
    pub fn tile_at(&self, row: usize, col: usize) -> Option<&Tile> {
        let id = self.cells[self.index(row, col)]?;
        self.store.get(id)
    }

    /// Face value at `(row, col)`; 0 for an empty cell.
    pub fn value_at(&self, row: usize, col: usize) -> u32 {
        self.cells[self.index(row, col)].map_or(0, |id| self.store.value(id))
    }

    /// Number of tiles currently on the board.
    #[inline]
    pub fn tile_count(&self) -> usize { self.store.len() }

    pub fn count_empty(&self) -> usize {
        self.cells.iter().filter(|c| c.is_none()).count()
    }

    /// Highest face value on the board, 0 if empty.
    pub fn highest_tile(&self) -> u32 {
        self.store.iter().map(Tile::value).max().unwrap_or(0)
    }

    /// True once any tile has reached the win value. Never resets.
    #[inline]
    pub fn is_game_won(&self) -> bool { self.won }

    /// True if the board is full and no two adjacent cells share a value.
    ///
    /// ```
    /// use grid_2048::engine::Board;
    /// let stuck = Board::from_rows(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
    /// assert!(stuck.is_over());
    /// ```
    pub fn is_over(&self) -> bool {
        let (w, h) = (self.width(), self.height());
        for row in 0..h {
            for col in 0..w {
                let value = self.value_at(row, col);
                if value == 0 {
                    return false;
                }
                if col + 1 < w && value == self.value_at(row, col + 1) {
                    return false;
                }
                if row + 1 < h && value == self.value_at(row + 1, col) {
                    return false;
                }
            }
        }
        true
    }

    /// True if the tile was produced by a merge during the current turn.
    pub fn is_tile_merged(&self, id: TileId) -> bool {
        self.store.get(id).is_some_and(|t| t.merged_from().len() > 1)
    }

    /// Face values row-major, 0 for empty cells.
    pub fn cell_values(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.map_or(0, |id| self.store.value(id))).collect()
    }

    /// Copy of the current cells, detached from the board.
    pub fn snapshot(&self) -> Snapshot {
        let cells = self
            .cells
            .iter()
            .map(|c| c.and_then(|id| self.store.get(id)).map(SnapshotTile::from))
            .collect();
        Snapshot::new(self.width(), self.height(), cells)
    }

    /// Slide and merge every line toward `direction` without spawning or
    /// recording a move. Returns the points earned.
    ///
    /// ```
    /// use grid_2048::engine::{Board, Move};
    /// let mut b = Board::from_rows(&[[2, 2, 2, 2], [0; 4], [0; 4], [0; 4]]);
    /// assert_eq!(b.shift(Move::Left), 8);
    /// assert_eq!(&b.cell_values()[..4], &[4, 4, 0, 0]);
    /// ```
    pub fn shift(&mut self, direction: Move) -> u64 {
        let lines = match direction {
            Move::Left | Move::Right => self.height(),
            Move::Up | Move::Down => self.width(),
        };
        let mut gained = 0;
        for k in 0..lines {
            let indices = self.line_indices(direction, k);
            let mut line: Vec<Option<TileId>> = indices.iter().map(|&i| self.cells[i]).collect();
            gained += slide_line(&mut line, &mut self.store);
            for (&i, cell) in indices.iter().zip(line) {
                self.cells[i] = cell;
            }
        }
        self.points += gained;
        self.refresh_won();
        gained
    }

    /// Play one turn: slide toward `direction`, then spawn one tile if the
    /// board changed. A move that changes nothing spawns nothing.
    ///
    /// ```
    /// use grid_2048::engine::{Board, Move};
    /// use rand::{rngs::StdRng, SeedableRng};
    /// let mut rng = StdRng::seed_from_u64(1);
    /// let mut b = Board::from_rows(&[[0, 0, 2, 2], [0; 4], [0; 4], [0; 4]]);
    /// let outcome = b.make_move(Move::Left, &mut rng);
    /// assert!(outcome.moved);
    /// assert_eq!(b.points(), 4);
    /// assert_eq!(b.movements_since_last_move().len(), 2);
    /// b.complete_move();
    /// ```
    pub fn make_move<R: Rng + ?Sized>(&mut self, direction: Move, rng: &mut R) -> MoveOutcome {
        if self.awaiting_completion {
            warn!(%direction, "move started before the previous move was completed; merge flags are stale");
        }
        let before = self.snapshot();
        let points_gained = self.shift(direction);
        let moved = self.cell_values() != before.values();
        let spawned = if moved { self.spawn_random_tile(rng) } else { None };
        let after = self.snapshot();
        self.last_move = Some(MoveRecord { before, after });
        self.awaiting_completion = true;

        debug!(%direction, moved, points_gained, points = self.points, "move");
        trace!(board = %self, "board after move");
        MoveOutcome { direction, moved, points_gained, spawned }
    }

    /// Convenience: like `make_move` but uses thread-local RNG.
    pub fn make_move_thread(&mut self, direction: Move) -> MoveOutcome {
        let mut rng = rand::thread_rng();
        self.make_move(direction, &mut rng)
    }

    /// Place a 2 (80%) or 4 (20%) in a uniformly chosen empty cell.
    ///
    /// No-op on a full board.
    pub fn spawn_random_tile<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<Spawn> {
        self.refresh_won();
        let empty: Vec<usize> = self
            .cells
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.is_none().then_some(i))
            .collect();
        if empty.is_empty() {
            debug!("no empty cell to spawn into");
            return None;
        }
        let index = empty[rng.gen_range(0..empty.len())];
        let value = if rng.gen::<f64>() > 1.0 - self.config.four_probability { 4 } else { 2 };
        let tile_id = self.store.create(value);
        self.cells[index] = Some(tile_id);

        let position = Position::new(index / self.width(), index % self.width());
        debug!(%position, value, id = %tile_id, "spawn");
        Some(Spawn { position, tile_id, value })
    }

    /// Tile displacements of the most recent `make_move`; empty before the
    /// first move. Valid until the next `make_move`.
    pub fn movements_since_last_move(&self) -> Vec<Movement> {
        self.last_move
            .as_ref()
            .map(|m| resolve_movements(&m.before, &m.after))
            .unwrap_or_default()
    }

    /// Close the current turn: clear every tile's merge flags so they can
    /// merge again. Call once after consuming the move's movements.
    pub fn complete_move(&mut self) {
        self.store.clear_turn_flags();
        self.awaiting_completion = false;
    }

    #[inline]
    fn index(&self, row: usize, col: usize) -> usize {
        assert!(
            row < self.height() && col < self.width(),
            "cell ({row}, {col}) outside {}x{} board",
            self.width(),
            self.height()
        );
        row * self.width() + col
    }

    /// Cell indices of line `k`, front (direction of travel) first.
    fn line_indices(&self, direction: Move, k: usize) -> Vec<usize> {
        let (w, h) = (self.width(), self.height());
        match direction {
            Move::Left => (0..w).map(|c| k * w + c).collect(),
            Move::Right => (0..w).rev().map(|c| k * w + c).collect(),
            Move::Up => (0..h).map(|r| r * w + k).collect(),
            Move::Down => (0..h).rev().map(|r| r * w + k).collect(),
        }
    }

    fn refresh_won(&mut self) {
        if !self.won && self.highest_tile() >= self.config.win_value {
            debug!(win_value = self.config.win_value, "win reached");
            self.won = true;
        }
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let divider = "-".repeat(8 * self.width());
        writeln!(f)?;
        for row in 0..self.height() {
            if row > 0 {
                writeln!(f, "{divider}")?;
            }
            let cells: Vec<String> = (0..self.width()).map(|col| format_val(self.value_at(row, col))).collect();
            writeln!(f, "{}", cells.join("|"))?;
        }
        Ok(())
    }
}

fn format_val(val: u32) -> String {
    match val {
        0 => String::from("       "),
        x => format!("{x:^7}"),
    }
}
