use crate::chess::Color;
use serde::{Deserialize, Serialize};

/// Centipawn value substituted for a forced mate before clamping
pub const MATE_SCORE: i32 = 100_000;

/// Reported evaluations are clamped into `[-CP_LIMIT, CP_LIMIT]`
pub const CP_LIMIT: i32 = 2_000;

/// Engine evaluation as reported, relative to the side to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Score {
    Cp(i32),
    /// Moves to mate; positive when the side to move mates, zero or negative when it is mated
    Mate(i32),
}

impl Score {
    /// Centipawns from the side to move's point of view, mates mapped to ±`MATE_SCORE`
    pub fn relative_centipawns(&self) -> i32 {
        match *self {
            Score::Cp(cp) => cp,
            Score::Mate(moves) if moves > 0 => MATE_SCORE,
            Score::Mate(_) => -MATE_SCORE,
        }
    }

    /// Centipawns from White's point of view
    pub fn white_centipawns(&self, side_to_move: Color) -> i32 {
        let cp = self.relative_centipawns();
        match side_to_move {
            Color::White => cp,
            Color::Black => -cp,
        }
    }
}

pub fn clamp_cp(cp: i32) -> i32 {
    cp.clamp(-CP_LIMIT, CP_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_saturates_at_bounds() {
        for cp in [-100_000, -2_001, -50_000] {
            assert_eq!(clamp_cp(cp), -CP_LIMIT);
        }
        for cp in [2_001, 99_999, i32::MAX] {
            assert_eq!(clamp_cp(cp), CP_LIMIT);
        }
        assert_eq!(clamp_cp(-2_000), -2_000);
        assert_eq!(clamp_cp(137), 137);
    }

    #[test]
    fn test_mate_scores_map_to_mate_constant() {
        assert_eq!(Score::Mate(3).relative_centipawns(), MATE_SCORE);
        assert_eq!(Score::Mate(-2).relative_centipawns(), -MATE_SCORE);
        assert_eq!(Score::Mate(0).relative_centipawns(), -MATE_SCORE);
        assert_eq!(Score::Mate(1).white_centipawns(Color::Black), -MATE_SCORE);
        assert_eq!(Score::Mate(0).white_centipawns(Color::Black), MATE_SCORE);
    }

    #[test]
    fn test_white_perspective_flips_for_black() {
        assert_eq!(Score::Cp(45).white_centipawns(Color::White), 45);
        assert_eq!(Score::Cp(45).white_centipawns(Color::Black), -45);
    }
}
