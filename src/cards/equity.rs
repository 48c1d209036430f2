//! Monte-Carlo equity against a weighted range.
//!
//! Each trial samples a villain combo from the range (weighted, excluding
//! combos that collide with the hero or board), rolls out the remaining
//! board uniformly, and scores win/tie/loss as 1/0.5/0. On a complete
//! board the rollout disappears and the weighted enumeration is exact.

use rand::rngs::StdRng;
use rand::SeedableRng;

use super::eval::rank_with_board;
use super::{Card, Deck};
use crate::error::SolverError;
use crate::range::{sample_combo, Combo, Range};

/// Hard ceiling on Monte-Carlo trials per equity call.
pub const MAX_TRIALS: usize = 200_000;

/// Default trial count; keeps standard error under ~0.01.
pub const DEFAULT_TRIALS: usize = 10_000;

/// Hero equity against a weighted villain range on a partial board.
///
/// Passing zero trials selects [`DEFAULT_TRIALS`]; anything above
/// [`MAX_TRIALS`] is clamped. Deterministic for a fixed `seed`. Fails
/// with [`SolverError::NoViableSample`] when every villain combo collides
/// with the hero or the board.
pub fn equity(
    hero: Combo,
    villain: &Range,
    board: &[Card],
    trials: usize,
    seed: u64,
) -> Result<f64, SolverError> {
    let mut dead = board.to_vec();
    dead.extend_from_slice(&hero.cards());
    let dist = villain.normalized(&dead);
    if dist.is_empty() {
        return Err(SolverError::NoViableSample);
    }

    if board.len() == 5 {
        return Ok(exact_river_equity(hero, &dist, board));
    }

    let trials = if trials == 0 { DEFAULT_TRIALS } else { trials }.min(MAX_TRIALS);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut score = 0.0;
    for _ in 0..trials {
        let vc = sample_combo(&dist, &mut rng).expect("distribution is non-empty");

        let mut used = dead.clone();
        used.extend_from_slice(&vc.cards());
        let mut deck = Deck::without(&used);

        let mut full_board = board.to_vec();
        full_board.extend(deck.draw_n(&mut rng, 5 - board.len()));

        score += score_showdown(hero, vc, &full_board);
    }
    Ok(score / trials as f64)
}

/// Exact weighted equity on a complete board.
fn exact_river_equity(hero: Combo, dist: &[(Combo, f64)], board: &[Card]) -> f64 {
    let hero_rank = rank_with_board(hero.cards(), board);
    let mut score = 0.0;
    for &(vc, p) in dist {
        let villain_rank = rank_with_board(vc.cards(), board);
        score += p * match hero_rank.cmp(&villain_rank) {
            std::cmp::Ordering::Greater => 1.0,
            std::cmp::Ordering::Equal => 0.5,
            std::cmp::Ordering::Less => 0.0,
        };
    }
    score
}

fn score_showdown(hero: Combo, villain: Combo, board: &[Card]) -> f64 {
    let h = rank_with_board(hero.cards(), board);
    let v = rank_with_board(villain.cards(), board);
    match h.cmp(&v) {
        std::cmp::Ordering::Greater => 1.0,
        std::cmp::Ordering::Equal => 0.5,
        std::cmp::Ordering::Less => 0.0,
    }
}
