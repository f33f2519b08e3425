//! grid-2048: a 2048 grid/merge engine with movement reconstruction
//!
//! This crate provides:
//! - A W×H `Board` (`engine` module) that slides, merges and spawns tiles,
//!   tracks points, and detects win and stuck boards
//! - Stable tile identities (`tile` module) that survive slides and merges
//! - Per-tile movement records between two snapshots (`movement` module),
//!   for driving animations without coupling the engine to a renderer
//! - Simple move policies (`policy`) and a binary run trace format (`trace`)
//!
//! Quick start:
//! ```
//! use grid_2048::engine::{Board, GameConfig, Move};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let mut board = Board::new_game(GameConfig::default(), &mut rng);
//!
//! let outcome = board.make_move(Move::Left, &mut rng);
//! for m in board.movements_since_last_move() {
//!     // hand `m.from -> m.to` to the renderer
//!     assert!(m.value >= 2);
//! }
//! board.complete_move();
//! assert!(outcome.points_gained <= board.points());
//! ```
//!
//! Full loop (simplest possible)
//! ```
//! use grid_2048::engine::{Board, GameConfig};
//! use grid_2048::policy::Greedy;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let mut rng = StdRng::seed_from_u64(123);
//! let mut b = Board::new_game(GameConfig::default(), &mut rng);
//! let mut moves = 0u32;
//!
//! // Keep doctests fast
//! while !b.is_over() && moves < 8 {
//!     let Some(dir) = Greedy.best_move(&b) else { break };
//!     b.make_move(dir, &mut rng);
//!     b.complete_move();
//!     moves += 1;
//! }
//! assert!(moves > 0);
//! ```
//!
pub mod engine;
pub mod movement;
pub mod policy;
pub(crate) mod slide;
pub mod tile;
pub mod trace;
