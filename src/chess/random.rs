use super::board::Board;
use rand::seq::SliceRandom;
use rand::Rng;

/// Play up to `max_plies` uniformly random legal moves from the initial
/// position and return the resulting FEN. Stops early if the game ends.
pub fn random_legal_fen<R: Rng + ?Sized>(rng: &mut R, max_plies: usize) -> String {
    let mut board = Board::new();
    let plies = rng.gen_range(0..=max_plies);
    for _ in 0..plies {
        if board.is_game_over() {
            break;
        }
        let moves = board.legal_moves();
        match moves.choose(rng) {
            Some(&mv) => board.apply(mv),
            None => break,
        }
    }
    board.to_fen()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_random_positions_are_parseable() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let fen = random_legal_fen(&mut rng, 14);
            let board = Board::from_fen(&fen).unwrap();
            assert!(board.fullmove_number() <= 8);
        }
    }

    #[test]
    fn test_zero_plies_yields_start_position() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(random_legal_fen(&mut rng, 0), super::super::STARTING_FEN);
    }
}
