use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::engine::{Board, Move, MoveOutcome, Spawn};
use crate::movement::Snapshot;

const MAGIC: &[u8; 4] = b"G2T1"; // ASCII magic
const VERSION: u8 = 1;
const HEADER_LEN: usize = 4 + 1;
const CHECKSUM_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub start_unix_s: u64,
    pub elapsed_s: f32,
    pub final_points: u64,
    pub highest_tile: u32,
    pub won: bool,
    pub seed: Option<u64>,
    pub policy: Option<String>,
}

/// One effective move and its consequences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub direction: Move,
    /// Board points after the move.
    pub points: u64,
    pub spawned: Option<Spawn>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    pub meta: Meta,
    /// Board after the two opening spawns.
    pub initial: Snapshot,
    pub steps: Vec<Step>,
    pub final_board: Snapshot,
}

#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("postcard error: {0}")]
    Postcard(#[from] postcard::Error),
    #[error("invalid magic or version")]
    MagicOrVersion,
    #[error("file too short or malformed")]
    Malformed,
    #[error("checksum mismatch")]
    Checksum,
}

/// Collects steps while a game is played.
#[derive(Debug)]
pub struct Recorder {
    started: Instant,
    start_unix_s: u64,
    initial: Snapshot,
    steps: Vec<Step>,
}

impl Recorder {
    pub fn new(board: &Board) -> Self {
        Self {
            started: Instant::now(),
            start_unix_s: now_unix_seconds(),
            initial: board.snapshot(),
            steps: Vec::with_capacity(1024),
        }
    }

    /// Record a move. No-op moves are skipped.
    pub fn record(&mut self, outcome: &MoveOutcome, board: &Board) {
        if !outcome.moved {
            return;
        }
        self.steps.push(Step { direction: outcome.direction, points: board.points(), spawned: outcome.spawned });
    }

    #[inline]
    pub fn steps(&self) -> usize { self.steps.len() }

    pub fn finish(self, board: &Board, seed: Option<u64>, policy: Option<String>) -> Run {
        let meta = Meta {
            width: board.width() as u32,
            height: board.height() as u32,
            steps: self.steps.len() as u32,
            start_unix_s: self.start_unix_s,
            elapsed_s: self.started.elapsed().as_secs_f32(),
            final_points: board.points(),
            highest_tile: board.highest_tile(),
            won: board.is_game_won(),
            seed,
            policy,
        };
        Run { meta, initial: self.initial, steps: self.steps, final_board: board.snapshot() }
    }
}

pub fn encode_run(run: &Run) -> Result<Vec<u8>, TraceError> {
    assert_eq!(run.steps.len(), run.meta.steps as usize);

    let mut buf = Vec::with_capacity(HEADER_LEN + 64 + run.steps.len() * 16);
    buf.extend_from_slice(MAGIC);
    buf.push(VERSION);
    let mut buf = postcard::to_extend(run, buf)?;

    // Trailer: CRC32C of all preceding bytes
    let checksum = crc32c::crc32c(&buf);
    buf.extend_from_slice(&checksum.to_le_bytes());
    Ok(buf)
}

pub fn write_run_to_path<P: AsRef<Path>>(path: P, run: &Run) -> Result<(), TraceError> {
    let data = encode_run(run)?;
    let mut f = fs::File::create(path)?;
    f.write_all(&data)?;
    Ok(())
}

pub fn parse_run_bytes(bytes: &[u8]) -> Result<Run, TraceError> {
    if bytes.len() < HEADER_LEN + CHECKSUM_LEN {
        return Err(TraceError::Malformed);
    }

    // Validate checksum first to avoid decoding garbage
    let (content, trailer) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    let file_crc = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if file_crc != crc32c::crc32c(content) {
        return Err(TraceError::Checksum);
    }

    if &content[..4] != MAGIC || content[4] != VERSION {
        return Err(TraceError::MagicOrVersion);
    }
    let run: Run = postcard::from_bytes(&content[HEADER_LEN..])?;
    if !run.initial.is_well_formed() || !run.final_board.is_well_formed() {
        return Err(TraceError::Malformed);
    }
    Ok(run)
}

pub fn parse_run_file<P: AsRef<Path>>(path: P) -> Result<Run, TraceError> {
    let data = fs::read(path)?;
    parse_run_bytes(&data)
}

pub fn now_unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GameConfig;
    use crate::policy::Greedy;
    use rand::{rngs::StdRng, SeedableRng};
    use tempfile::NamedTempFile;

    fn play_short_game() -> Run {
        let mut rng = StdRng::seed_from_u64(99);
        let mut board = Board::new_game(GameConfig::default(), &mut rng);
        let mut rec = Recorder::new(&board);
        for _ in 0..25 {
            let Some(dir) = Greedy.best_move(&board) else { break };
            let outcome = board.make_move(dir, &mut rng);
            rec.record(&outcome, &board);
            board.complete_move();
        }
        rec.finish(&board, Some(99), Some("greedy".to_string()))
    }

    #[test]
    fn recorder_fills_meta() {
        let run = play_short_game();
        assert_eq!(run.meta.steps as usize, run.steps.len());
        assert_eq!(run.meta.width, 4);
        assert_eq!(run.meta.seed, Some(99));
        assert_eq!(run.steps.last().map(|s| s.points), Some(run.meta.final_points));
        assert!(run.steps.iter().all(|s| s.spawned.is_some()));
    }

    #[test]
    fn noop_moves_are_not_recorded() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut board = Board::from_rows(&[[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let mut rec = Recorder::new(&board);
        let outcome = board.make_move(Move::Left, &mut rng);
        rec.record(&outcome, &board);
        assert_eq!(rec.steps(), 0);
    }

    #[test]
    fn round_trip_file() {
        let run = play_short_game();
        let tmp = NamedTempFile::new().unwrap();
        write_run_to_path(tmp.path(), &run).unwrap();
        let loaded = parse_run_file(tmp.path()).unwrap();
        assert_eq!(loaded, run);
    }

    #[test]
    fn checksum_mismatch() {
        let mut bytes = encode_run(&play_short_game()).unwrap();
        bytes[HEADER_LEN + 1] ^= 0xFF;
        let err = parse_run_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TraceError::Checksum));
    }

    #[test]
    fn bad_magic() {
        let mut bytes = encode_run(&play_short_game()).unwrap();
        bytes[0] = b'X';
        let len = bytes.len();
        let crc = crc32c::crc32c(&bytes[..len - CHECKSUM_LEN]);
        bytes[len - CHECKSUM_LEN..].copy_from_slice(&crc.to_le_bytes());
        let err = parse_run_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TraceError::MagicOrVersion));
    }

    #[test]
    fn snapshot_with_missing_cells_is_rejected() {
        use crate::movement::SnapshotTile;

        #[derive(Serialize)]
        struct RawSnapshot {
            width: usize,
            height: usize,
            cells: Vec<Option<SnapshotTile>>,
        }

        let raw = RawSnapshot { width: 4, height: 4, cells: vec![None; 5] };
        let short: Snapshot = postcard::from_bytes(&postcard::to_allocvec(&raw).unwrap()).unwrap();
        let mut run = play_short_game();
        run.final_board = short;
        let bytes = encode_run(&run).unwrap();
        let err = parse_run_bytes(&bytes).unwrap_err();
        assert!(matches!(err, TraceError::Malformed));
    }

    #[test]
    fn truncated_input() {
        let err = parse_run_bytes(b"G2T").unwrap_err();
        assert!(matches!(err, TraceError::Malformed));
    }
}
