use super::error::ChessError;
use super::piece::PieceType;
use super::square::Square;
use std::fmt;
use std::str::FromStr;

/// A move in long algebraic (UCI) form: `e2e4`, `e7e8q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Move {
    pub from: Square,
    pub to: Square,
    pub promotion: Option<PieceType>,
}

impl Move {
    pub const fn new_unchecked(from: Square, to: Square, promotion: Option<PieceType>) -> Self {
        Self {
            from,
            to,
            promotion,
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        match self.promotion {
            Some(piece) => write!(f, "{}", piece.uci_letter()),
            None => Ok(()),
        }
    }
}

impl FromStr for Move {
    type Err = ChessError;

    /// Shape check only; legality is the board's business
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !s.is_ascii() || !(4..=5).contains(&s.len()) {
            return Err(ChessError::InvalidMove(format!("'{s}' is not UCI notation")));
        }

        let from: Square = s[0..2].parse()?;
        let to: Square = s[2..4].parse()?;
        let promotion = match s.get(4..) {
            Some("") | None => None,
            Some(letter) => match letter.parse::<PieceType>()? {
                piece @ (PieceType::Queen | PieceType::Rook | PieceType::Bishop | PieceType::Knight) => {
                    Some(piece)
                }
                other => {
                    return Err(ChessError::InvalidMove(format!("cannot promote to {other}")))
                }
            },
        };
        if from == to {
            return Err(ChessError::InvalidMove(format!("'{s}' does not move")));
        }
        Ok(Self::new_unchecked(from, to, promotion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uci_notation() {
        let mv: Move = "e7e8q".parse().unwrap();
        assert_eq!(mv.promotion, Some(PieceType::Queen));
        assert_eq!(mv.to_string(), "e7e8q");
        assert!("e7e8k".parse::<Move>().is_err());
        assert!("e2e2".parse::<Move>().is_err());
        assert!("e2".parse::<Move>().is_err());
    }
}
