//! Move choosers for driving games without a human.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::engine::{Board, Move};

/// Result of sliding a cloned board one step, without spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preview {
    pub dir: Move,
    pub points_gained: u64,
    pub empty_after: usize,
}

/// Slide a copy of `board` toward `dir`. `None` if nothing would change.
pub fn preview(board: &Board, dir: Move) -> Option<Preview> {
    let mut next = board.clone();
    next.complete_move();
    let points_gained = next.shift(dir);
    if next.cell_values() == board.cell_values() {
        return None;
    }
    Some(Preview { dir, points_gained, empty_after: next.count_empty() })
}

/// Directions that would change the board, in `[Up, Down, Left, Right]` order.
pub fn legal_moves(board: &Board) -> Vec<Move> {
    Move::ALL.into_iter().filter(|&dir| preview(board, dir).is_some()).collect()
}

/// One-ply lookahead: most points, then most empty cells. Ties go to the
/// earlier direction in `[Up, Down, Left, Right]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Greedy;

impl Greedy {
    pub fn new() -> Self { Greedy }

    pub fn best_move(&self, board: &Board) -> Option<Move> {
        let mut best: Option<Preview> = None;
        for dir in Move::ALL {
            let Some(p) = preview(board, dir) else { continue };
            let better = match best {
                None => true,
                Some(b) => (p.points_gained, p.empty_after) > (b.points_gained, b.empty_after),
            };
            if better {
                best = Some(p);
            }
        }
        best.map(|p| p.dir)
    }
}

/// Uniformly random legal direction.
pub fn random_move<R: Rng + ?Sized>(board: &Board, rng: &mut R) -> Option<Move> {
    legal_moves(board).choose(rng).copied()
}

/// Policy selector used by the runners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Greedy,
    Random,
}

impl Policy {
    pub fn next_move<R: Rng + ?Sized>(self, board: &Board, rng: &mut R) -> Option<Move> {
        match self {
            Policy::Greedy => Greedy.best_move(board),
            Policy::Random => random_move(board, rng),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn preview_leaves_board_untouched() {
        let b = Board::from_rows(&[[2, 2, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let p = preview(&b, Move::Left).unwrap();
        assert_eq!(p.points_gained, 4);
        assert_eq!(p.empty_after, 15);
        assert_eq!(b.value_at(0, 1), 2);
        assert_eq!(b.points(), 0);
    }

    #[test]
    fn blocked_directions_are_illegal() {
        let b = Board::from_rows(&[[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(legal_moves(&b), vec![Move::Down, Move::Right]);
    }

    #[test]
    fn greedy_prefers_merges() {
        let b = Board::from_rows(&[[2, 0, 0, 0], [2, 0, 0, 0], [4, 8, 0, 0], [0; 4]]);
        // Up and Down both merge the pair of 2s; Up comes first
        assert_eq!(Greedy::new().best_move(&b), Some(Move::Up));
    }

    #[test]
    fn no_move_on_stuck_board() {
        let b = Board::from_rows(&[[2, 4, 2, 4], [4, 2, 4, 2], [2, 4, 2, 4], [4, 2, 4, 2]]);
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(Greedy.best_move(&b), None);
        assert_eq!(random_move(&b, &mut rng), None);
        assert_eq!(Policy::Random.next_move(&b, &mut rng), None);
    }

    #[test]
    fn random_move_is_legal() {
        let b = Board::from_rows(&[[2, 4, 0, 0], [0; 4], [0; 4], [0; 4]]);
        let mut rng = StdRng::seed_from_u64(12);
        for _ in 0..20 {
            let dir = random_move(&b, &mut rng).unwrap();
            assert!(dir == Move::Down || dir == Move::Right);
        }
    }
}
